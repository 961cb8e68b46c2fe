//! Level-of-detail strides and switch heights

use serde::{Deserialize, Serialize};

/// Road size at which the default switch heights apply unscaled.
const REFERENCE_SIZE: f32 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodSettings {
    /// Sample stride per LOD level; level 0 should be 1
    pub strides: Vec<usize>,
    /// Screen-relative switch height per level. Missing entries default to
    /// `0.5^(k + 1)`.
    pub screen_heights: Vec<f32>,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            strides: vec![1, 3, 6],
            screen_heights: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodLevel {
    pub stride: usize,
    /// Switch away from this level below this fraction of screen height
    pub screen_relative_height: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LodGroup {
    pub levels: Vec<LodLevel>,
    pub size: f32,
}

impl LodSettings {
    pub fn level_count(&self) -> usize {
        self.strides.len().max(1)
    }

    pub fn stride(&self, level: usize) -> usize {
        self.strides.get(level).copied().unwrap_or(1).max(1)
    }

    /// Switch heights for a road whose bounds span `size` world units.
    /// Larger roads stay detailed down to smaller screen fractions.
    pub fn build_group(&self, size: f32) -> LodGroup {
        let scale = if size.is_finite() && size > 0.0 {
            (REFERENCE_SIZE / size).clamp(0.1, 4.0)
        } else {
            1.0
        };
        let mut levels = Vec::with_capacity(self.level_count());
        let mut previous = 1.0_f32;
        for k in 0..self.level_count() {
            let base = self
                .screen_heights
                .get(k)
                .copied()
                .unwrap_or_else(|| 0.5_f32.powi(k as i32 + 1));
            let height = (base * scale).clamp(0.0001, previous * 0.999);
            previous = height;
            levels.push(LodLevel {
                stride: self.stride(k),
                screen_relative_height: height,
            });
        }
        LodGroup { levels, size }
    }
}
