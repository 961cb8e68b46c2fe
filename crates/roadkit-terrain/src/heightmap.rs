//! Heightmap storage, sampling and PNG I/O

use std::path::Path;

use roadkit_core::{ContentHash, Result, RoadError};

/// A grid of normalized heights with bilinear sampling
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    /// Row-major height values normalized to [0..1]
    heights: Vec<f32>,
    /// Samples along X
    pub width: u32,
    /// Samples along Z
    pub depth: u32,
}

impl Heightmap {
    /// Load a heightmap from a grayscale PNG file.
    /// Values are normalized to [0..1] regardless of bit depth.
    pub fn from_png(path: &Path) -> Result<Self> {
        let img = image::open(path).map_err(|e| {
            RoadError::ImageError(format!("Failed to load heightmap '{}': {}", path.display(), e))
        })?;

        let gray = img.into_luma16();
        let width = gray.width();
        let depth = gray.height();

        let heights: Vec<f32> = gray.pixels().map(|p| p.0[0] as f32 / 65535.0).collect();

        Self::from_raw(heights, width, depth)
    }

    /// Write the heightmap as a 16-bit grayscale PNG.
    pub fn to_png(&self, path: &Path) -> Result<()> {
        let pixels: Vec<u16> = self
            .heights
            .iter()
            .map(|h| (h.clamp(0.0, 1.0) * 65535.0).round() as u16)
            .collect();
        let img: image::ImageBuffer<image::Luma<u16>, Vec<u16>> =
            image::ImageBuffer::from_raw(self.width, self.depth, pixels).ok_or_else(|| {
                RoadError::ImageError("heightmap buffer does not match its size".into())
            })?;
        img.save(path).map_err(|e| {
            RoadError::ImageError(format!("Failed to save heightmap '{}': {}", path.display(), e))
        })
    }

    /// Create a heightmap from raw float data
    pub fn from_raw(heights: Vec<f32>, width: u32, depth: u32) -> Result<Self> {
        if width < 2 || depth < 2 {
            return Err(RoadError::ConfigError(format!(
                "heightmap must be at least 2x2, got {}x{}",
                width, depth
            )));
        }
        if heights.len() != (width * depth) as usize {
            return Err(RoadError::ConfigError(format!(
                "heightmap has {} samples, expected {}x{}",
                heights.len(),
                width,
                depth
            )));
        }
        Ok(Self {
            heights,
            width,
            depth,
        })
    }

    /// A flat heightmap at `height`.
    pub fn flat(width: u32, depth: u32, height: f32) -> Result<Self> {
        Self::from_raw(vec![height; (width.max(2) * depth.max(2)) as usize], width.max(2), depth.max(2))
    }

    /// Bilinear sample at normalized UV coordinates (0..1, 0..1).
    /// Returns interpolated height in [0..1].
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let u = u.clamp(0.0, 1.0);
        let v = v.clamp(0.0, 1.0);

        let fx = u * (self.width - 1) as f32;
        let fz = v * (self.depth - 1) as f32;

        let x0 = (fx as u32).min(self.width - 2);
        let z0 = (fz as u32).min(self.depth - 2);
        let x1 = x0 + 1;
        let z1 = z0 + 1;

        let tx = fx - x0 as f32;
        let tz = fz - z0 as f32;

        let h00 = self.get(x0, z0);
        let h10 = self.get(x1, z0);
        let h01 = self.get(x0, z1);
        let h11 = self.get(x1, z1);

        let h0 = h00 * (1.0 - tx) + h10 * tx;
        let h1 = h01 * (1.0 - tx) + h11 * tx;

        h0 * (1.0 - tz) + h1 * tz
    }

    pub fn get(&self, x: u32, z: u32) -> f32 {
        self.heights[(z * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, z: u32, height: f32) {
        self.heights[(z * self.width + x) as usize] = height;
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn fingerprint(&self) -> ContentHash {
        ContentHash::builder()
            .u32s(&[self.width, self.depth])
            .f32s(&self.heights)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_sampling_returns_correct_values() {
        // 3x3 heightmap: center pixel is 1.0, edges are 0.0
        let heights = vec![
            0.0, 0.0, 0.0,
            0.0, 1.0, 0.0,
            0.0, 0.0, 0.0,
        ];
        let hm = Heightmap::from_raw(heights, 3, 3).unwrap();

        let center = hm.sample(0.5, 0.5);
        assert!((center - 1.0).abs() < 0.01);

        let corner = hm.sample(0.0, 0.0);
        assert!((corner - 0.0).abs() < 0.01);
    }

    #[test]
    fn test_rejects_mismatched_sizes() {
        assert!(Heightmap::from_raw(vec![0.0; 5], 2, 2).is_err());
        assert!(Heightmap::from_raw(vec![0.0; 3], 3, 1).is_err());
    }

    #[test]
    fn test_png_round_trip() {
        let dir = std::env::temp_dir().join(format!("roadkit_hm_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hm.png");

        let hm = Heightmap::from_raw(vec![0.0, 0.25, 0.5, 1.0], 2, 2).unwrap();
        hm.to_png(&path).unwrap();
        let loaded = Heightmap::from_png(&path).unwrap();

        assert_eq!((loaded.width, loaded.depth), (2, 2));
        for (a, b) in hm.heights().iter().zip(loaded.heights()) {
            assert!((a - b).abs() < 1e-4);
        }

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(&dir).ok();
    }

    #[test]
    fn test_fingerprint_tracks_edits() {
        let mut hm = Heightmap::flat(4, 4, 0.5).unwrap();
        let before = hm.fingerprint();
        hm.set(1, 2, 0.6);
        assert_ne!(before, hm.fingerprint());
    }
}
