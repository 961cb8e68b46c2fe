//! Lanes: parametric bands stacked across a road

use roadkit_core::{IndexSpan, ParamCurve};
use serde::{Deserialize, Serialize};

/// How a lane maps its texture across and along the road.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UvSettings {
    /// Scale `u` by `width / max_width` so texels keep their size when the
    /// lane narrows
    pub constant_width: bool,
    /// Swap the left and right `u`
    pub flip: bool,
    pub u_min: f32,
    pub u_max: f32,
    /// `v` per world unit along the curve
    pub tiling: f32,
}

impl Default for UvSettings {
    fn default() -> Self {
        Self {
            constant_width: false,
            flip: false,
            u_min: 0.0,
            u_max: 1.0,
            tiling: 0.25,
        }
    }
}

impl UvSettings {
    /// `(u_left, u_right)` for a lane currently `width` wide whose widest
    /// point is `max_width`.
    pub fn u_pair(&self, width: f32, max_width: f32) -> (f32, f32) {
        let mut u_max = self.u_max;
        if self.constant_width && max_width > f32::EPSILON {
            u_max = self.u_min + (self.u_max - self.u_min) * (width / max_width).clamp(0.0, 1.0);
        }
        if self.flip {
            (u_max, self.u_min)
        } else {
            (self.u_min, u_max)
        }
    }
}

fn default_width() -> ParamCurve {
    ParamCurve::constant(3.5)
}

/// A parametric band composited into the road cross-section.
///
/// `width` and `y_offset` are evaluated at the lane's own progress
/// (0 at its span start, 1 at its end).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub materials: Vec<String>,
    /// Rides alongside the stack without pushing other lanes outward
    #[serde(default)]
    pub ignore_for_width_calculation: bool,
    /// Continues through intersections
    #[serde(default = "default_true")]
    pub main_road_part: bool,
    #[serde(default)]
    pub span: IndexSpan,
    #[serde(default = "default_width")]
    pub width: ParamCurve,
    /// Added to the offsets of the lanes stacked before this one
    #[serde(default)]
    pub y_offset: ParamCurve,
    #[serde(default)]
    pub uv: UvSettings,
}

fn default_true() -> bool {
    true
}

impl Lane {
    pub fn new(name: impl Into<String>, span: IndexSpan, width: ParamCurve) -> Self {
        Self {
            name: name.into(),
            span,
            width,
            y_offset: ParamCurve::default(),
            uv: UvSettings::default(),
            materials: vec!["asphalt".into()],
            ignore_for_width_calculation: false,
            main_road_part: true,
        }
    }

    /// Width at `progress`, never negative.
    pub fn width_at(&self, progress: f32) -> f32 {
        self.width.evaluate(progress).max(0.0)
    }

    pub fn y_offset_at(&self, progress: f32) -> f32 {
        self.y_offset.evaluate(progress)
    }

    pub fn max_width(&self) -> f32 {
        self.width.max_value().max(0.0)
    }

    /// Lanes that cannot produce geometry: flat everywhere.
    pub fn is_flat(&self) -> bool {
        self.max_width() <= f32::EPSILON && self.y_offset.is_zero()
    }
}
