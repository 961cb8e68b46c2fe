//! Heightmap carving along road footprints.
//!
//! A [`CarveSession`] collects, per grid cell, the closest road edit that
//! reaches it. Several roads (or several intervals of one road) can feed
//! the same session; a cell is always shaped by the nearest centerline,
//! so overlapping edits do not fight each other. The session is fresh for
//! every terrain pass.
//!
//! Every cell under a registered surface is seeded as a zero-distance
//! candidate, so it snaps to the surface even where no road path reaches.
//!
//! Applying the session starts from the terrain's committed snapshot, which
//! makes repeated passes over unchanged roads reproduce the same grid.

use glam::{Vec2, Vec3};
use roadkit_core::math::{closest_on_segment_xz, distance_xz, POINT_EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::footprint::SurfaceFootprint;
use crate::smooth::{smooth_cells, SmoothCell};
use crate::terrain::{GridTerrain, TerrainSurface};

/// Authored carving parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarveSettings {
    /// Width of the falloff band beyond the flat zone, in world units
    pub radius: f32,
    /// Slope of the falloff band in degrees; the band rises `tan(angle)`
    /// per grid cell
    pub angle: f32,
    /// The terrain under the road sits this far below the road surface
    pub height_offset: f32,
    /// Neighbourhood radius of the final smoothing pass, in cells
    pub smoothing_radius: u32,
    /// Blend toward the neighbourhood average, 0..1
    pub smoothing_amount: f32,
}

impl Default for CarveSettings {
    fn default() -> Self {
        Self {
            radius: 10.0,
            angle: 30.0,
            height_offset: 0.05,
            smoothing_radius: 1,
            smoothing_amount: 0.5,
        }
    }
}

/// One point of a road path to carve along.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarveSample {
    /// Centerline position (road surface height)
    pub position: Vec3,
    /// Half of the visible lane stack width
    pub half_width: f32,
    /// Width of lanes that ride alongside the stack (shoulders)
    pub extra_width: f32,
}

impl CarveSample {
    fn is_finite(&self) -> bool {
        self.position.is_finite() && self.half_width.is_finite() && self.extra_width.is_finite()
    }

    fn flat_width(&self) -> f32 {
        self.half_width.max(0.0) + self.extra_width.max(0.0)
    }
}

/// Which way a cell moved relative to its committed height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarveDirection {
    Lowering,
    Raising,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f32,
    road_height: f32,
    flat_width: f32,
    settings: CarveSettings,
}

/// Summary of an applied carve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CarveReport {
    /// Cells whose height changed
    pub cells_modified: usize,
    /// Cells under the road surface or its flat zone
    pub cells_finished: usize,
    /// Falloff cells passed through smoothing
    pub cells_smoothed: usize,
}

#[derive(Debug, Clone, Copy)]
struct SurfaceBounds {
    min: Vec2,
    max: Vec2,
    settings: CarveSettings,
}

/// Accumulates closest-wins carving edits for one terrain pass.
#[derive(Debug, Default)]
pub struct CarveSession {
    candidates: HashMap<(u32, u32), Candidate>,
    footprint: SurfaceFootprint,
    surfaces: Vec<SurfaceBounds>,
}

impl CarveSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generated surface (road lanes, intersection) whose cells
    /// snap to the surface height.
    ///
    /// With `seed` settings every cell under the surface is carved, sitting
    /// `height_offset` below it. Without, only cells some road path reaches
    /// are snapped.
    pub fn add_surface(&mut self, vertices: &[Vec3], triangles: &[u32], seed: Option<CarveSettings>) {
        let Some(settings) = seed else {
            self.footprint.add_mesh(vertices, triangles);
            return;
        };
        let used = triangles.iter().filter_map(|&i| vertices.get(i as usize));
        let Some((min, max)) = used.fold(None, |acc: Option<(Vec2, Vec2)>, v| {
            let p = Vec2::new(v.x, v.z);
            Some(acc.map_or((p, p), |(lo, hi)| (lo.min(p), hi.max(p))))
        }) else {
            return;
        };
        if !min.is_finite() || !max.is_finite() {
            log::debug!("skipping non-finite carve surface");
            return;
        }
        self.footprint.add_mesh(vertices, triangles);
        self.surfaces.push(SurfaceBounds { min, max, settings });
    }

    /// Number of cells that currently have a carving candidate.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Record the cells reached by a road path.
    ///
    /// Non-finite samples are skipped along with the two path pieces that
    /// touch them.
    pub fn carve_path(&mut self, terrain: &GridTerrain, path: &[CarveSample], settings: CarveSettings) {
        let radius = settings.radius.max(0.0);

        let pieces: Vec<(CarveSample, CarveSample)> = match path {
            [single] => vec![(*single, *single)],
            _ => path.windows(2).map(|w| (w[0], w[1])).collect(),
        };

        for (a, b) in pieces {
            if !a.is_finite() || !b.is_finite() {
                log::debug!("skipping non-finite carve sample");
                continue;
            }
            let reach = a.flat_width().max(b.flat_width()) + radius;
            let lo = Vec2::new(a.position.x.min(b.position.x), a.position.z.min(b.position.z)) - Vec2::splat(reach);
            let hi = Vec2::new(a.position.x.max(b.position.x), a.position.z.max(b.position.z)) + Vec2::splat(reach);
            let Some((x0, z0, x1, z1)) = cell_window(terrain, lo, hi) else {
                continue;
            };

            for gz in z0..=z1 {
                for gx in x0..=x1 {
                    let p = terrain.grid_to_world(gx, gz);
                    let (distance, t) = if (b.position - a.position).length() <= POINT_EPSILON {
                        (distance_xz(p, a.position), 0.0)
                    } else {
                        closest_on_segment_xz(p, a.position, b.position)
                    };
                    let flat_width = a.flat_width() + (b.flat_width() - a.flat_width()) * t;
                    if distance > flat_width + radius {
                        continue;
                    }
                    let candidate = Candidate {
                        distance,
                        road_height: a.position.y + (b.position.y - a.position.y) * t
                            - settings.height_offset,
                        flat_width,
                        settings,
                    };
                    match self.candidates.get(&(gx, gz)) {
                        Some(existing) if existing.distance <= distance => {}
                        _ => {
                            self.candidates.insert((gx, gz), candidate);
                        }
                    }
                }
            }
        }
    }

    fn seed_surfaces(&mut self, terrain: &GridTerrain) {
        for surface in &self.surfaces {
            let Some((x0, z0, x1, z1)) = cell_window(terrain, surface.min, surface.max) else {
                continue;
            };
            for gz in z0..=z1 {
                for gx in x0..=x1 {
                    let p = terrain.grid_to_world(gx, gz);
                    let Some(height) = self.footprint.height_at(p.x, p.z) else {
                        continue;
                    };
                    let candidate = Candidate {
                        distance: 0.0,
                        road_height: height - surface.settings.height_offset,
                        flat_width: 0.0,
                        settings: surface.settings,
                    };
                    match self.candidates.get(&(gx, gz)) {
                        Some(existing) if existing.distance <= 0.0 => {}
                        _ => {
                            self.candidates.insert((gx, gz), candidate);
                        }
                    }
                }
            }
        }
    }

    /// Write the carve into `terrain`, starting from its committed heights.
    pub fn apply(mut self, terrain: &mut GridTerrain) -> CarveReport {
        self.seed_surfaces(terrain);
        let bounds = terrain.bounds();
        let cell = terrain.cell_size();
        let grid_unit = (cell.x + cell.y) * 0.5;
        let original = terrain.original().clone();
        let mut result = original.clone();
        let mut report = CarveReport::default();

        let mut cells: Vec<((u32, u32), Candidate)> = self.candidates.into_iter().collect();
        cells.sort_by_key(|(key, _)| (key.1, key.0));

        let mut finished: HashSet<(u32, u32)> = HashSet::new();
        let mut queued: Vec<(SmoothCell, CarveDirection)> = Vec::new();

        for ((gx, gz), c) in &cells {
            let (gx, gz) = (*gx, *gz);
            let world = terrain.grid_to_world(gx, gz);
            let before = bounds.to_world_height(original.get(gx, gz));

            let target = if let Some(surface) = self.footprint.height_at(world.x, world.z) {
                finished.insert((gx, gz));
                surface - c.settings.height_offset
            } else if c.distance <= c.flat_width {
                finished.insert((gx, gz));
                c.road_height
            } else {
                let slope = c.settings.angle.clamp(0.0, 89.9).to_radians().tan();
                let rise = (c.distance - c.flat_width) / grid_unit * slope;
                if before > c.road_height {
                    queued.push((smooth_cell(gx, gz, &c.settings), CarveDirection::Lowering));
                    before.min(c.road_height + rise)
                } else {
                    queued.push((smooth_cell(gx, gz, &c.settings), CarveDirection::Raising));
                    before.max(c.road_height - rise)
                }
            };

            let normalized = bounds.to_normalized_height(target);
            if normalized != original.get(gx, gz) {
                report.cells_modified += 1;
            }
            result.set(gx, gz, normalized);
        }
        report.cells_finished = finished.len();

        let smooth: Vec<SmoothCell> = queued.iter().map(|(c, _)| *c).collect();
        smooth_cells(&mut result, &smooth, |x, z| finished.contains(&(x, z)));
        report.cells_smoothed = smooth.iter().filter(|c| c.radius > 0 && c.amount > 0.0).count();

        // Smoothing must not undo the direction of the edit.
        for (cell, direction) in &queued {
            let before = original.get(cell.x, cell.z);
            let h = result.get(cell.x, cell.z);
            let clamped = match direction {
                CarveDirection::Lowering => h.min(before),
                CarveDirection::Raising => h.max(before),
            };
            result.set(cell.x, cell.z, clamped);
        }

        if let Err(e) = terrain.set_heightmap(result) {
            log::warn!("carve result rejected by terrain: {}", e);
        }
        log::debug!(
            "carved {} cells ({} finished, {} smoothed)",
            report.cells_modified,
            report.cells_finished,
            report.cells_smoothed
        );
        report
    }
}

/// Grid cells whose world position lies inside the XZ box `[lo, hi]`.
fn cell_window(terrain: &GridTerrain, lo: Vec2, hi: Vec2) -> Option<(u32, u32, u32, u32)> {
    let (width, depth) = terrain.resolution();
    let lo = terrain.world_to_grid(lo.x, lo.y);
    let hi = terrain.world_to_grid(hi.x, hi.y);
    if hi.x < 0.0 || hi.y < 0.0 || lo.x > (width - 1) as f32 || lo.y > (depth - 1) as f32 {
        return None;
    }
    Some((
        lo.x.max(0.0).ceil() as u32,
        lo.y.max(0.0).ceil() as u32,
        (hi.x.floor().max(0.0) as u32).min(width - 1),
        (hi.y.floor().max(0.0) as u32).min(depth - 1),
    ))
}

fn smooth_cell(x: u32, z: u32, settings: &CarveSettings) -> SmoothCell {
    SmoothCell {
        x,
        z,
        radius: settings.smoothing_radius,
        amount: settings.smoothing_amount,
    }
}
