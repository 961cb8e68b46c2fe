//! Neighbourhood smoothing of carved falloff cells

use crate::heightmap::Heightmap;

/// A cell queued for smoothing after carving.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothCell {
    pub x: u32,
    pub z: u32,
    /// Neighbourhood radius in cells
    pub radius: u32,
    /// Blend factor toward the neighbourhood average, 0..1
    pub amount: f32,
}

/// Blend each queued cell toward the distance-weighted average of its
/// neighbourhood.
///
/// Reads from a snapshot of the grid, so the result does not depend on the
/// order of `cells`. Cells for which `is_locked` returns true are used as
/// neighbours but never written.
pub fn smooth_cells<F>(heightmap: &mut Heightmap, cells: &[SmoothCell], is_locked: F)
where
    F: Fn(u32, u32) -> bool,
{
    let snapshot = heightmap.clone();
    for cell in cells {
        if cell.radius == 0 || cell.amount <= 0.0 || is_locked(cell.x, cell.z) {
            continue;
        }
        let r = cell.radius as i64;
        let mut sum = 0.0;
        let mut weight_sum = 0.0;
        for dz in -r..=r {
            for dx in -r..=r {
                let nx = cell.x as i64 + dx;
                let nz = cell.z as i64 + dz;
                if nx < 0 || nz < 0 || nx >= snapshot.width as i64 || nz >= snapshot.depth as i64 {
                    continue;
                }
                let dist = ((dx * dx + dz * dz) as f32).sqrt();
                if dist > r as f32 {
                    continue;
                }
                let w = 1.0 - dist / (r as f32 + 1.0);
                sum += snapshot.get(nx as u32, nz as u32) * w;
                weight_sum += w;
            }
        }
        if weight_sum <= 0.0 {
            continue;
        }
        let current = snapshot.get(cell.x, cell.z);
        let average = sum / weight_sum;
        let amount = cell.amount.clamp(0.0, 1.0);
        heightmap.set(cell.x, cell.z, current + (average - current) * amount);
    }
}
