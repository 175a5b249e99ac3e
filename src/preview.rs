//! Live Preview Renderer and the editor session around it.
//!
//! The source is decoded once when the editor opens and reduced once to a
//! working copy no larger than the surface needs at [`MAX_ZOOM`]. Every
//! change to the [`EditSpec`] repaints a small fixed surface synchronously
//! from that copy. The crop and rotation come from the same
//! [`plan_transform`] call the final encode uses, planned against the full
//! source size, so the preview shows exactly the framing that will be
//! uploaded. Only the pixels it samples from and the resampling filter
//! differ.

use crate::imaging::{
    BackendError, EditSpec, OutputBounds, TransformPlan, decode_image, plan_transform,
    render_plan_scaled,
};
use crate::types::ItemId;
use image::{DynamicImage, GenericImageView};

/// Upper bound of the editor's zoom control.
pub const MAX_ZOOM: f64 = 3.0;

/// Renders framings of one decoded source onto a fixed-size surface.
pub struct PreviewRenderer {
    source_dims: (u32, u32),
    working: DynamicImage,
    /// Working size over source size, per axis.
    scale: (f64, f64),
    surface: (u32, u32),
}

impl PreviewRenderer {
    /// Decode `source` once for repeated rendering.
    pub fn new(source: &[u8], surface: (u32, u32)) -> Result<Self, BackendError> {
        Ok(Self::from_image(decode_image(source)?, surface))
    }

    pub fn from_image(source: DynamicImage, surface: (u32, u32)) -> Self {
        let surface = (surface.0.max(1), surface.1.max(1));
        let (src_w, src_h) = source.dimensions();
        let working = working_copy(source, surface);
        let (work_w, work_h) = working.dimensions();
        Self {
            source_dims: (src_w, src_h),
            scale: (
                work_w as f64 / src_w.max(1) as f64,
                work_h as f64 / src_h.max(1) as f64,
            ),
            working,
            surface,
        }
    }

    pub fn source_dimensions(&self) -> (u32, u32) {
        self.source_dims
    }

    /// Size of the reduced copy every repaint samples from.
    pub fn working_dimensions(&self) -> (u32, u32) {
        self.working.dimensions()
    }

    pub fn surface(&self) -> (u32, u32) {
        self.surface
    }

    pub fn plan(&self, spec: &EditSpec) -> TransformPlan {
        plan_transform(
            self.source_dims,
            spec,
            OutputBounds::Surface {
                width: self.surface.0,
                height: self.surface.1,
            },
        )
    }

    pub fn render(&self, spec: &EditSpec) -> DynamicImage {
        render_plan_scaled(&self.working, self.scale, &self.plan(spec))
    }
}

/// Shrink `source` so that its shorter edge, cropped at full zoom, still
/// covers the surface's longer edge. Never enlarges.
fn working_copy(source: DynamicImage, surface: (u32, u32)) -> DynamicImage {
    let (src_w, src_h) = source.dimensions();
    let needed = surface.0.max(surface.1) as f64 * MAX_ZOOM;
    let factor = needed / src_w.min(src_h).max(1) as f64;
    let source = DynamicImage::ImageRgb8(source.to_rgb8());
    if factor >= 1.0 {
        return source;
    }
    let work_w = ((src_w as f64 * factor).round() as u32).max(1);
    let work_h = ((src_h as f64 * factor).round() as u32).max(1);
    source.thumbnail_exact(work_w, work_h)
}

/// One item open in the editor.
///
/// Mutators repaint immediately. [`apply`](Self::apply) hands the spec on
/// for a new transform; [`close`](Self::close) discards it.
pub struct EditSession {
    item: ItemId,
    renderer: PreviewRenderer,
    spec: EditSpec,
    frame: DynamicImage,
}

impl EditSession {
    /// Open the editor with the default framing.
    pub fn open(item: ItemId, renderer: PreviewRenderer) -> Self {
        let spec = EditSpec::default();
        let frame = renderer.render(&spec);
        Self {
            item,
            renderer,
            spec,
            frame,
        }
    }

    pub fn item(&self) -> ItemId {
        self.item
    }

    pub fn spec(&self) -> EditSpec {
        self.spec
    }

    /// The most recent rendering.
    pub fn frame(&self) -> &DynamicImage {
        &self.frame
    }

    pub fn renderer(&self) -> &PreviewRenderer {
        &self.renderer
    }

    fn repaint(&mut self) -> &DynamicImage {
        self.spec = self.spec.sanitized();
        self.frame = self.renderer.render(&self.spec);
        &self.frame
    }

    /// Turn a further 90° clockwise.
    pub fn rotate_cw(&mut self) -> &DynamicImage {
        self.spec.rotation = self.spec.rotation.turned_cw();
        self.repaint()
    }

    pub fn set_zoom(&mut self, zoom: f64) -> &DynamicImage {
        self.spec.zoom = if zoom.is_finite() {
            zoom.clamp(1.0, MAX_ZOOM)
        } else {
            1.0
        };
        self.repaint()
    }

    pub fn set_pan(&mut self, pan_x: f64, pan_y: f64) -> &DynamicImage {
        self.spec.pan_x = pan_x;
        self.spec.pan_y = pan_y;
        self.repaint()
    }

    /// Drag by a surface-pixel delta.
    ///
    /// Dragging the picture right moves the crop center left. One surface
    /// pixel covers `crop / surface` source pixels, so the pan moves by that
    /// many source pixels, expressed as a fraction of the source size.
    pub fn drag(&mut self, dx: f64, dy: f64) -> &DynamicImage {
        let plan = self.renderer.plan(&self.spec);
        let (src_w, src_h) = self.renderer.source_dimensions();
        let (out_w, out_h) = plan.output;
        // Undo the rotation so the drag is expressed in source axes
        let (sx, sy) = match self.spec.rotation.degrees() {
            90 => (dy, -dx),
            180 => (-dx, -dy),
            270 => (-dy, dx),
            _ => (dx, dy),
        };
        let (crop_w, crop_h) = (plan.crop.width as f64, plan.crop.height as f64);
        let (view_w, view_h) = if self.spec.rotation.swaps_axes() {
            (out_h as f64, out_w as f64)
        } else {
            (out_w as f64, out_h as f64)
        };
        self.spec.pan_x -= sx * crop_w / view_w / src_w.max(1) as f64;
        self.spec.pan_y -= sy * crop_h / view_h / src_h.max(1) as f64;
        self.repaint()
    }

    /// Back to the default framing.
    pub fn reset(&mut self) -> &DynamicImage {
        self.spec = EditSpec::default();
        self.repaint()
    }

    /// Confirm the framing. The spec is carried into a new transform.
    pub fn apply(self) -> (ItemId, EditSpec) {
        (self.item, self.spec.sanitized())
    }

    /// Leave without applying; the spec is discarded.
    pub fn close(self) -> ItemId {
        self.item
    }
}
