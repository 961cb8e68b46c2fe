//! A road: authored definition plus everything generated from it.

use roadkit_core::{ContentHash, IndexSpan, ObjectId, Result, RoadError};
use roadkit_prefab::{generate_prefab_line, PrefabLibrary, PrefabLine, PrefabLineOutput};
use roadkit_road::{extrude_lanes, ColliderMesh, ConnectionEnd, Curve, Lane, LodSettings, ResampledCurve, RoadMesh};
use roadkit_terrain::{conform_vertices, HeightProbe};

use crate::format::{RoadDef, TerrainInterval};

/// Inputs shared by every road during one regeneration.
pub struct RegenContext<'a> {
    pub detail_level: f32,
    pub lod: &'a LodSettings,
    pub library: &'a PrefabLibrary,
    /// Ground used for conforming; `None` skips it
    pub probe: Option<&'a dyn HeightProbe>,
    /// Mixed into each prefab line's seed
    pub seed: u64,
}

/// Anything that owns an index span into its road's curve.
pub trait SpanOwner {
    fn span_mut(&mut self) -> &mut IndexSpan;
}

impl SpanOwner for Lane {
    fn span_mut(&mut self) -> &mut IndexSpan {
        &mut self.span
    }
}

impl SpanOwner for PrefabLine {
    fn span_mut(&mut self) -> &mut IndexSpan {
        &mut self.span
    }
}

impl SpanOwner for TerrainInterval {
    fn span_mut(&mut self) -> &mut IndexSpan {
        &mut self.span
    }
}

/// Output of the last regeneration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedRoad {
    pub resampled: ResampledCurve,
    pub mesh: RoadMesh,
    /// One output per prefab line, in authored order
    pub prefab_lines: Vec<PrefabLineOutput>,
}

impl GeneratedRoad {
    pub fn fingerprint(&self) -> ContentHash {
        let mut hasher = ContentHash::builder();
        hasher.bytes(self.mesh.fingerprint().as_bytes());
        for line in &self.prefab_lines {
            hasher.bytes(line.fingerprint().as_bytes());
        }
        hasher.finish()
    }

    pub fn prefab_object_count(&self) -> usize {
        self.prefab_lines.iter().map(|l| l.objects.len()).sum()
    }
}

pub struct RoadObject {
    pub id: ObjectId,
    pub def: RoadDef,
    start_connection: Option<ObjectId>,
    end_connection: Option<ObjectId>,
    generated: Option<GeneratedRoad>,
}

impl RoadObject {
    pub fn new(def: RoadDef) -> Self {
        Self {
            id: ObjectId::new(),
            def,
            start_connection: None,
            end_connection: None,
            generated: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn curve(&self) -> &Curve {
        &self.def.curve
    }

    /// Intersection attached at `end`.
    pub fn connection(&self, end: ConnectionEnd) -> Option<ObjectId> {
        match end {
            ConnectionEnd::Start => self.start_connection,
            ConnectionEnd::End => self.end_connection,
        }
    }

    pub(crate) fn set_connection(&mut self, end: ConnectionEnd, intersection: Option<ObjectId>) {
        match end {
            ConnectionEnd::Start => self.start_connection = intersection,
            ConnectionEnd::End => self.end_connection = intersection,
        }
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionEnd, ObjectId)> + '_ {
        [ConnectionEnd::Start, ConnectionEnd::End]
            .into_iter()
            .filter_map(|end| self.connection(end).map(|id| (end, id)))
    }

    pub fn is_connected(&self) -> bool {
        self.start_connection.is_some() || self.end_connection.is_some()
    }

    pub fn generated(&self) -> Option<&GeneratedRoad> {
        self.generated.as_ref()
    }

    pub fn detail_level(&self, fallback: f32) -> f32 {
        self.def
            .detail_level
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(fallback)
    }

    /// Validate topology and bring the point list and spans into shape.
    pub fn prepare(&mut self) -> Result<()> {
        if !self.def.curve.is_valid() {
            return Err(RoadError::InvalidTopology(format!(
                "road '{}' has {} points",
                self.def.name,
                self.def.curve.point_count()
            )));
        }
        if self.def.curve.cyclic && self.is_connected() {
            return Err(RoadError::InvalidTopology(format!(
                "cyclic road '{}' cannot attach to intersections",
                self.def.name
            )));
        }
        self.def.curve.enforce_cyclic();
        let point_count = self.def.curve.point_count();
        for span in self.def.spans_mut() {
            span.clamp_to(point_count);
        }
        Ok(())
    }

    /// Resample with every lane, prefab line and interval boundary as a seam.
    pub fn calculate_points(&self, detail_level: f32) -> ResampledCurve {
        self.def
            .curve
            .resample(self.detail_level(detail_level), &self.def.seams())
    }

    /// Resample and extrude. On failure the road keeps no geometry.
    pub fn rebuild_mesh(&mut self, ctx: &RegenContext<'_>) -> Result<()> {
        if let Err(e) = self.prepare() {
            self.generated = None;
            return Err(e);
        }
        let resampled = self.calculate_points(ctx.detail_level);
        let mut mesh = match extrude_lanes(&resampled, &self.def.lanes, ctx.lod) {
            Ok(mesh) => mesh,
            Err(e) => {
                log::error!("road '{}' not generated: {}", self.def.name, e);
                self.generated = None;
                return Err(e);
            }
        };

        if let (Some(settings), Some(probe)) = (self.def.conform, ctx.probe) {
            if self.def.curve.cyclic {
                log::debug!("cyclic road '{}' is not conformed", self.def.name);
            } else {
                let mut collider = ColliderMesh::default();
                for lane in &mut mesh.lanes {
                    for lod in &mut lane.lods {
                        lod.vertices = conform_vertices(probe, &lod.vertices, &[], settings);
                        lod.recalculate_normals();
                        lod.recalculate_tangents();
                    }
                    if let Some(surface) = lane.lods.first() {
                        collider.append(surface);
                    }
                }
                mesh.collider = collider;
            }
        }

        self.generated = Some(GeneratedRoad {
            resampled,
            mesh,
            prefab_lines: Vec::new(),
        });
        Ok(())
    }

    /// Place every prefab line on the last resampled curve. Returns the
    /// number of placed objects. Lines are all-or-nothing: when one fails,
    /// none are kept.
    pub fn rebuild_prefab_lines(&mut self, ctx: &RegenContext<'_>) -> Result<usize> {
        let Some(generated) = self.generated.as_mut() else {
            return Ok(0);
        };
        generated.prefab_lines.clear();

        let mut outputs = Vec::with_capacity(self.def.prefab_lines.len());
        for line in &self.def.prefab_lines {
            let mut line = line.clone();
            line.seed = line.seed.wrapping_add(ctx.seed);
            match generate_prefab_line(&generated.resampled, &line, ctx.library, ctx.probe) {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    log::error!("prefab line '{}' on road '{}' skipped: {}", line.prefab, self.def.name, e);
                    return Err(e);
                }
            }
        }
        generated.prefab_lines = outputs;
        Ok(generated.prefab_object_count())
    }
}
