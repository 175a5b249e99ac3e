//! High-level image operations.
//!
//! These functions combine the geometry in [`calculations`](super::calculations)
//! with pixel work on an already-decoded image. A [`TransformPlan`] becomes
//! pixels in one of two ways:
//!
//! - [`render_plan`] works on the full-resolution source (final encode).
//! - [`render_plan_scaled`] works on a reduced copy of the source and
//!   resamples the crop to the output size before rotating (live preview).
//!
//! Both take the crop, rotation and output size from the same plan.

use super::calculations::{CropRect, OutputBounds, TransformPlan, plan_transform, rotated_size};
use super::params::{Rotation, TransformParams};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Crop, rotate and cover-resize a decoded image according to `plan`.
///
/// The resize fills the whole output box and trims any overflow, so a
/// rounding mismatch between the rotated crop and the output box never
/// leaves empty borders.
pub fn render_plan(img: &DynamicImage, plan: &TransformPlan, filter: FilterType) -> DynamicImage {
    let CropRect {
        x,
        y,
        width,
        height,
    } = plan.crop;
    let rotated = rotate(img.crop_imm(x, y, width, height), plan.rotation);

    let (out_w, out_h) = plan.output;
    if rotated.dimensions() == (out_w, out_h) {
        rotated
    } else {
        rotated.resize_to_fill(out_w, out_h, filter)
    }
}

fn rotate(img: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::None => img,
        Rotation::Cw90 => img.rotate90(),
        Rotation::Cw180 => img.rotate180(),
        Rotation::Cw270 => img.rotate270(),
    }
}

/// Map a source-space crop into a copy scaled by `scale`, kept inside `bounds`.
fn scale_crop(crop: CropRect, scale: (f64, f64), bounds: (u32, u32)) -> CropRect {
    let (max_w, max_h) = (bounds.0.max(1), bounds.1.max(1));
    let x = ((crop.x as f64 * scale.0).round() as u32).min(max_w - 1);
    let y = ((crop.y as f64 * scale.1).round() as u32).min(max_h - 1);
    CropRect {
        x,
        y,
        width: ((crop.width as f64 * scale.0).round() as u32).clamp(1, max_w - x),
        height: ((crop.height as f64 * scale.1).round() as u32).clamp(1, max_h - y),
    }
}

/// Render `plan` from `working`, a copy of the planned source scaled by
/// `scale` (working size / source size, per axis).
///
/// The crop is resampled straight to the pre-rotation output size, then
/// the small result is rotated. The work depends on the working copy and
/// the output box, never on the full source.
pub fn render_plan_scaled(
    working: &DynamicImage,
    scale: (f64, f64),
    plan: &TransformPlan,
) -> DynamicImage {
    let CropRect {
        x,
        y,
        width,
        height,
    } = scale_crop(plan.crop, scale, working.dimensions());
    let cropped = working.crop_imm(x, y, width, height);

    // Quarter turns are their own inverse for sizes
    let (out_w, out_h) = rotated_size(plan.output, plan.rotation);
    let resized = if (width, height) == (out_w, out_h) {
        cropped
    } else if out_w <= width && out_h <= height {
        cropped.thumbnail_exact(out_w, out_h)
    } else {
        cropped.resize_exact(out_w, out_h, FilterType::Triangle)
    };
    rotate(resized, plan.rotation)
}

/// Full-resolution transform of a decoded image (Lanczos3, max-edge cap).
pub fn transform_decoded(img: &DynamicImage, params: &TransformParams) -> DynamicImage {
    let plan = plan_transform(
        img.dimensions(),
        &params.spec,
        OutputBounds::MaxEdge(params.max_edge_px),
    );
    render_plan(img, &plan, FilterType::Lanczos3)
}
