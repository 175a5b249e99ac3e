//! Pure geometry for cropping, rotating and sizing listing photos.
//!
//! All functions here are pure and testable without any I/O or images.
//! The final encode and the live preview both go through [`plan_transform`],
//! so the crop and rotation a user sees are exactly the ones that get encoded;
//! only the output box differs.
//!
//! Pixel dimensions are integers. Rounding is half-away-from-zero
//! (`f64::round`) and every dimension is floored at 1 pixel.

use super::params::{EditSpec, Rotation};

/// Listing photos are always framed 4:3 (width:height).
pub const CROP_ASPECT: (u32, u32) = (4, 3);

/// Region of the source image selected for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// How large the rendered output may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputBounds {
    /// Cap the longer edge; never upscale. Used for the final encode.
    MaxEdge(u32),
    /// Fit inside a fixed surface, scaling up or down. Used for the preview.
    Surface { width: u32, height: u32 },
}

/// Everything needed to render one framing of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformPlan {
    pub crop: CropRect,
    pub rotation: Rotation,
    /// Final (width, height) after rotation and scaling.
    pub output: (u32, u32),
}

fn round_px(value: f64) -> u32 {
    value.round().max(1.0) as u32
}

/// Largest crop of `aspect` that fits inside `source`.
///
/// Starts full-width; if that is too tall, goes full-height instead.
///
/// # Examples
/// ```
/// # use disc_intake::imaging::calculations::base_crop_size;
/// assert_eq!(base_crop_size((1920, 1080), (4, 3)), (1440, 1080));
/// assert_eq!(base_crop_size((3000, 4000), (4, 3)), (3000, 2250));
/// ```
pub fn base_crop_size(source: (u32, u32), aspect: (u32, u32)) -> (u32, u32) {
    let (w, h) = (source.0.max(1), source.1.max(1));
    let (aspect_w, aspect_h) = aspect;

    let crop_h = round_px(w as f64 * aspect_h as f64 / aspect_w as f64);
    if crop_h > h {
        let crop_w = round_px(h as f64 * aspect_w as f64 / aspect_h as f64);
        (crop_w.min(w), h)
    } else {
        (w, crop_h)
    }
}

/// Shrink a crop by the zoom factor. Zoom below 1 is treated as 1.
pub fn zoomed_crop_size(size: (u32, u32), zoom: f64) -> (u32, u32) {
    let zoom = if zoom.is_finite() { zoom.max(1.0) } else { 1.0 };
    (
        round_px(size.0 as f64 / zoom),
        round_px(size.1 as f64 / zoom),
    )
}

/// Center a crop of `size` on the normalized pan point, then clamp it inside
/// the source.
pub fn place_crop(source: (u32, u32), size: (u32, u32), pan_x: f64, pan_y: f64) -> CropRect {
    let (w, h) = (source.0.max(1), source.1.max(1));
    let width = size.0.clamp(1, w);
    let height = size.1.clamp(1, h);

    let center_x = pan_x.clamp(0.0, 1.0) * w as f64;
    let center_y = pan_y.clamp(0.0, 1.0) * h as f64;

    let x = (center_x - width as f64 / 2.0).round().clamp(0.0, (w - width) as f64);
    let y = (center_y - height as f64 / 2.0)
        .round()
        .clamp(0.0, (h - height) as f64);

    CropRect {
        x: x as u32,
        y: y as u32,
        width,
        height,
    }
}

/// Crop rectangle for an edit spec: 4:3 base crop, zoomed, panned, clamped.
pub fn crop_rect(source: (u32, u32), spec: &EditSpec) -> CropRect {
    let base = base_crop_size(source, CROP_ASPECT);
    let size = zoomed_crop_size(base, spec.zoom);
    place_crop(source, size, spec.pan_x, spec.pan_y)
}

/// Dimensions of a `(width, height)` box after rotation.
pub fn rotated_size(size: (u32, u32), rotation: Rotation) -> (u32, u32) {
    if rotation.swaps_axes() {
        (size.1, size.0)
    } else {
        size
    }
}

/// Scale so the longer edge is at most `max_edge`. Never upscales.
///
/// # Examples
/// ```
/// # use disc_intake::imaging::calculations::fit_max_edge;
/// assert_eq!(fit_max_edge((4000, 3000), 1600), (1600, 1200));
/// assert_eq!(fit_max_edge((800, 600), 1600), (800, 600));
/// ```
pub fn fit_max_edge(size: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (w, h) = (size.0.max(1), size.1.max(1));
    let longest = w.max(h) as f64;
    let scale = (max_edge.max(1) as f64 / longest).min(1.0);
    (round_px(w as f64 * scale), round_px(h as f64 * scale))
}

/// Scale uniformly to the largest size that fits inside `bounds`.
pub fn fit_within(size: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (w, h) = (size.0.max(1) as f64, size.1.max(1) as f64);
    let scale = (bounds.0.max(1) as f64 / w).min(bounds.1.max(1) as f64 / h);
    (round_px(w * scale), round_px(h * scale))
}

/// Compute crop, rotation and output size for a source and framing.
///
/// Shared by the off-thread encode and the live preview.
pub fn plan_transform(source: (u32, u32), spec: &EditSpec, bounds: OutputBounds) -> TransformPlan {
    let spec = spec.sanitized();
    let crop = crop_rect(source, &spec);
    let rotated = rotated_size((crop.width, crop.height), spec.rotation);
    let output = match bounds {
        OutputBounds::MaxEdge(max_edge) => fit_max_edge(rotated, max_edge),
        OutputBounds::Surface { width, height } => fit_within(rotated, (width, height)),
    };
    TransformPlan {
        crop,
        rotation: spec.rotation,
        output,
    }
}
