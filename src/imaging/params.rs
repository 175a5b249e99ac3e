//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the pipeline (which decides what framing the user asked
//! for) and the [`backend`](super::backend) (which does the actual pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100). Built from the 0–1 fraction
//!   the embedding page configures.
//! - [`Rotation`]: quarter-turn rotation applied after cropping.
//! - [`EditSpec`]: the live-editable framing: rotation, zoom, pan center.
//! - [`TransformParams`]: everything the Transform Engine needs besides the
//!   source bytes.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    /// Convert a 0–1 quality factor, the way canvas encoders take it.
    pub fn from_fraction(fraction: f32) -> Self {
        if !fraction.is_finite() {
            return Self::default();
        }
        Self::new((fraction * 100.0).round().max(0.0) as u32)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Clockwise quarter-turn rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Parse any multiple of 90 degrees, including negative turns.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(match degrees.rem_euclid(360) {
            0 => Rotation::None,
            90 => Rotation::Cw90,
            180 => Rotation::Cw180,
            _ => Rotation::Cw270,
        })
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// Next quarter turn clockwise (the editor's "rotate" button).
    pub fn turned_cw(self) -> Self {
        match self {
            Rotation::None => Rotation::Cw90,
            Rotation::Cw90 => Rotation::Cw180,
            Rotation::Cw180 => Rotation::Cw270,
            Rotation::Cw270 => Rotation::None,
        }
    }

    /// 90° and 270° turns swap output width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Rotation::from_degrees(value as i32)
            .ok_or_else(|| format!("rotation must be a multiple of 90, got {value}"))
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> u16 {
        rotation.degrees()
    }
}

/// Live-editable framing for one item.
///
/// `pan_x`/`pan_y` locate the crop center as a fraction of the source's
/// width and height. `zoom` of 1 keeps the largest 4:3 crop; larger values
/// tighten it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditSpec {
    pub rotation: Rotation,
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for EditSpec {
    fn default() -> Self {
        Self {
            rotation: Rotation::None,
            zoom: 1.0,
            pan_x: 0.5,
            pan_y: 0.5,
        }
    }
}

impl EditSpec {
    /// Clamp every field into its valid domain. NaN falls back to the default.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let unit = |v: f64, fallback: f64| {
            if v.is_finite() {
                v.clamp(0.0, 1.0)
            } else {
                fallback
            }
        };
        Self {
            rotation: self.rotation,
            zoom: if self.zoom.is_finite() {
                self.zoom.max(1.0)
            } else {
                defaults.zoom
            },
            pan_x: unit(self.pan_x, defaults.pan_x),
            pan_y: unit(self.pan_y, defaults.pan_y),
        }
    }
}

/// Full specification for one Transform Engine run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub spec: EditSpec,
    /// Cap on the longer output edge. Never upscales.
    pub max_edge_px: u32,
    pub quality: Quality,
}
