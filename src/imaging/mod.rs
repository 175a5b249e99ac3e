//! Image processing: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `ImageReader` + EXIF orientation |
//! | **Crop geometry** | [`calculations::plan_transform`] |
//! | **Crop / rotate / cover** | [`operations::render_plan`], [`operations::render_plan_scaled`] |
//! | **Encode** | `image::codecs::jpeg::JpegEncoder` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop and sizing math (unit testable)
//! - **Parameters**: Data structures describing a framing and an encode
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Pixel work shared by the final encode and the preview

pub mod backend;
pub mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{CROP_ASPECT, CropRect, OutputBounds, TransformPlan, plan_transform};
pub use operations::{render_plan, render_plan_scaled, transform_decoded};
pub use params::{EditSpec, Quality, Rotation, TransformParams};
pub use rust_backend::{RustBackend, decode_image, encode_jpeg};
