//! The road network: the public editing and regeneration surface.
//!
//! A network owns its roads, the intersections they attach to, an optional
//! terrain and the prefab library. Every structural edit refuses degenerate
//! outcomes without mutating anything, fixes up the index spans of lanes,
//! prefab lines and terrain intervals, and regenerates what it touched.
//!
//! Regeneration of a set of roads runs in a fixed order: resample and
//! extrude each road (conforming to the committed ground), refresh the
//! intersections attached to them, carve the terrain in one closest-wins
//! pass over every deforming road, notify the detail sink, and finally
//! place prefab lines on the carved terrain.

use glam::Vec3;
use roadkit_core::{ContentHash, IndexSpan, ObjectId, PointId, Result, RoadError, SplitSide};
use roadkit_prefab::{PrefabDef, PrefabLibrary};
use roadkit_road::{connection_record, AnchorPoint, ConnectionEnd, Handle, Intersection, ResampledCurve};
use roadkit_terrain::{
    CarveReport, CarveSample, CarveSession, CarveSettings, GridTerrain, HeightProbe, TerrainSurface,
};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::RoadkitConfig;
use crate::format::{ProjectMetadata, RoadDef, TerrainDef};
use crate::plate::PlateIntersection;
use crate::road_object::{RegenContext, RoadObject, SpanOwner};

/// Host-side clearing of vegetation and detail meshes under roads.
pub trait DetailSink {
    fn clear_details(&mut self, road: ObjectId, footprint: &[CarveSample]);
    fn clear_trees(&mut self, road: ObjectId, footprint: &[CarveSample]);
}

/// An intersection node with its authored name and size.
pub struct IntersectionEntry {
    pub name: String,
    pub radius: f32,
    pub node: Box<dyn Intersection>,
}

/// What a regeneration produced.
#[derive(Debug, Default)]
pub struct RegenerationSummary {
    pub roads: usize,
    /// LOD 0 vertices over all regenerated roads
    pub vertices: usize,
    pub triangles: usize,
    pub prefab_objects: usize,
    pub carve: Option<CarveReport>,
    /// Roads (or their prefab lines) that failed, with the reason
    pub failures: Vec<(ObjectId, RoadError)>,
}

/// Result of splitting a road.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOutcome {
    /// The road holding the tail of the split curve
    pub new_road: ObjectId,
    /// First point of the new road, the copy of the split point
    pub boundary_point: PointId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoveOutcome {
    Removed(AnchorPoint),
    /// The road was down to two points and has been deleted
    RoadDeleted,
}

#[derive(Debug, Clone, Copy)]
struct RegenFlags {
    update_terrain: bool,
    update_details: bool,
    update_trees: bool,
}

pub struct RoadNetwork {
    pub project: ProjectMetadata,
    pub config: RoadkitConfig,
    roads: BTreeMap<ObjectId, RoadObject>,
    intersections: BTreeMap<ObjectId, IntersectionEntry>,
    terrain: Option<GridTerrain>,
    terrain_def: Option<TerrainDef>,
    prefab_defs: BTreeMap<String, PrefabDef>,
    library: PrefabLibrary,
    detail_sink: Option<Box<dyn DetailSink>>,
}

impl RoadNetwork {
    pub fn new(name: impl Into<String>, config: RoadkitConfig) -> Self {
        Self {
            project: ProjectMetadata {
                name: name.into(),
                version: "1.0".to_string(),
                description: None,
            },
            config,
            roads: BTreeMap::new(),
            intersections: BTreeMap::new(),
            terrain: None,
            terrain_def: None,
            prefab_defs: BTreeMap::new(),
            library: PrefabLibrary::new(),
            detail_sink: None,
        }
    }

    // --- terrain, prefabs, detail sink ---

    pub fn set_terrain(&mut self, terrain: GridTerrain, def: TerrainDef) {
        self.terrain = Some(terrain);
        self.terrain_def = Some(def);
    }

    pub fn terrain(&self) -> Option<&GridTerrain> {
        self.terrain.as_ref()
    }

    pub fn terrain_mut(&mut self) -> Option<&mut GridTerrain> {
        self.terrain.as_mut()
    }

    pub fn terrain_def(&self) -> Option<&TerrainDef> {
        self.terrain_def.as_ref()
    }

    pub fn add_prefab(&mut self, name: impl Into<String>, def: PrefabDef) {
        let name = name.into();
        self.library.insert(name.clone(), def.build());
        self.prefab_defs.insert(name, def);
    }

    pub fn prefab_defs(&self) -> &BTreeMap<String, PrefabDef> {
        &self.prefab_defs
    }

    pub fn library(&self) -> &PrefabLibrary {
        &self.library
    }

    pub fn set_detail_sink(&mut self, sink: Box<dyn DetailSink>) {
        self.detail_sink = Some(sink);
    }

    // --- roads ---

    pub fn add_road(&mut self, def: RoadDef) -> ObjectId {
        let road = RoadObject::new(def);
        let id = road.id;
        log::debug!("added road '{}' ({})", road.name(), id);
        self.roads.insert(id, road);
        id
    }

    pub fn road(&self, id: ObjectId) -> Option<&RoadObject> {
        self.roads.get(&id)
    }

    pub fn road_mut(&mut self, id: ObjectId) -> Option<&mut RoadObject> {
        self.roads.get_mut(&id)
    }

    pub fn roads(&self) -> impl Iterator<Item = &RoadObject> {
        self.roads.values()
    }

    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    pub fn find_road(&self, name: &str) -> Option<ObjectId> {
        self.roads.values().find(|r| r.name() == name).map(|r| r.id)
    }

    fn road_entry(&mut self, id: ObjectId) -> Result<&mut RoadObject> {
        self.roads
            .get_mut(&id)
            .ok_or_else(|| RoadError::NotFound(format!("road {}", id)))
    }

    /// Remove a road, detaching it from its intersections first.
    pub fn delete_road(&mut self, id: ObjectId) -> Result<RoadDef> {
        let road = self
            .roads
            .remove(&id)
            .ok_or_else(|| RoadError::NotFound(format!("road {}", id)))?;
        for (end, node_id) in road.connections() {
            if let Some(entry) = self.intersections.get_mut(&node_id) {
                entry.node.disconnect(id, end);
                if let Err(e) = entry.node.regenerate(false, false) {
                    log::warn!("intersection '{}' failed to regenerate: {}", entry.name, e);
                }
            }
        }
        if road.def.deform_terrain {
            self.carve_terrain();
        }
        log::info!("deleted road '{}'", road.name());
        Ok(road.def)
    }

    // --- intersections ---

    /// Add a plate intersection.
    pub fn add_intersection(&mut self, name: impl Into<String>, radius: f32) -> ObjectId {
        let id = ObjectId::new();
        self.insert_intersection(name, radius, Box::new(PlateIntersection::new(id, radius)));
        id
    }

    /// Add an externally implemented intersection node.
    pub fn insert_intersection(&mut self, name: impl Into<String>, radius: f32, node: Box<dyn Intersection>) {
        let entry = IntersectionEntry {
            name: name.into(),
            radius,
            node,
        };
        self.intersections.insert(entry.node.id(), entry);
    }

    pub fn intersection(&self, id: ObjectId) -> Option<&IntersectionEntry> {
        self.intersections.get(&id)
    }

    pub fn intersections(&self) -> impl Iterator<Item = &IntersectionEntry> {
        self.intersections.values()
    }

    pub fn find_intersection(&self, name: &str) -> Option<ObjectId> {
        self.intersections
            .values()
            .find(|e| e.name == name)
            .map(|e| e.node.id())
    }

    /// Attach `end` of a road to an intersection.
    pub fn connect(&mut self, road_id: ObjectId, end: ConnectionEnd, intersection: ObjectId) -> Result<()> {
        let road = self
            .roads
            .get_mut(&road_id)
            .ok_or_else(|| RoadError::NotFound(format!("road {}", road_id)))?;
        let entry = self
            .intersections
            .get_mut(&intersection)
            .ok_or_else(|| RoadError::NotFound(format!("intersection {}", intersection)))?;

        if road.def.curve.cyclic {
            return Err(refused(RoadError::InvalidTopology(format!(
                "cyclic road '{}' cannot attach to intersections",
                road.name()
            ))));
        }
        match road.connection(end) {
            Some(existing) if existing != intersection => {
                return Err(refused(RoadError::InvalidTopology(format!(
                    "{:?} of road '{}' is already attached to intersection {}",
                    end,
                    road.name(),
                    existing
                ))));
            }
            _ => {}
        }
        let record = connection_record(&road.def.curve, &road.def.lanes, end).ok_or_else(|| {
            refused(RoadError::InvalidTopology(format!(
                "road '{}' has too few points to connect",
                road.name()
            )))
        })?;

        entry.node.connect(road_id, record);
        road.set_connection(end, Some(intersection));
        entry.node.regenerate(true, false)?;
        log::info!("connected {:?} of road '{}' to '{}'", end, road.name(), entry.name);
        Ok(())
    }

    /// Detach `end` of a road from whatever it is attached to.
    pub fn disconnect(&mut self, road_id: ObjectId, end: ConnectionEnd) -> Result<()> {
        let road = self.road_entry(road_id)?;
        let Some(node_id) = road.connection(end) else {
            return Ok(());
        };
        road.set_connection(end, None);
        if let Some(entry) = self.intersections.get_mut(&node_id) {
            entry.node.disconnect(road_id, end);
            entry.node.regenerate(true, false)?;
        }
        Ok(())
    }

    // --- regeneration ---

    /// Regenerate one road and everything that depends on it.
    ///
    /// A road that fell below two points is deleted. Failures abort this
    /// road's generation and are returned.
    pub fn regenerate(
        &mut self,
        road: ObjectId,
        update_terrain: bool,
        update_details: bool,
        update_trees: bool,
    ) -> Result<RegenerationSummary> {
        if !self.roads.contains_key(&road) {
            return Err(RoadError::NotFound(format!("road {}", road)));
        }
        let mut summary = self.run(
            &[road],
            RegenFlags {
                update_terrain,
                update_details,
                update_trees,
            },
        );
        match summary.failures.pop() {
            Some((_, e)) => Err(e),
            None => Ok(summary),
        }
    }

    /// Regenerate every road. Failing roads are reported in the summary;
    /// the rest still regenerate.
    pub fn regenerate_all(&mut self, update_terrain: bool, update_details: bool, update_trees: bool) -> RegenerationSummary {
        let ids: Vec<ObjectId> = self.roads.keys().copied().collect();
        self.run(
            &ids,
            RegenFlags {
                update_terrain,
                update_details,
                update_trees,
            },
        )
    }

    fn run(&mut self, ids: &[ObjectId], flags: RegenFlags) -> RegenerationSummary {
        let mut summary = RegenerationSummary::default();

        // roads below two points destroy themselves
        let mut live = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.roads.get(&id) {
                Some(road) if !road.def.curve.is_valid() => {
                    log::warn!("road '{}' has fewer than two points, deleting it", road.name());
                    let name = road.name().to_string();
                    if let Err(e) = self.delete_road(id) {
                        log::warn!("could not delete road '{}': {}", name, e);
                    }
                    summary.failures.push((
                        id,
                        RoadError::InvalidTopology(format!("road '{}' had fewer than two points", name)),
                    ));
                }
                Some(_) => live.push(id),
                None => {}
            }
        }

        // 1. resample, extrude, conform to committed ground
        {
            let committed = self.terrain.as_ref().map(|t| t.committed());
            let ctx = RegenContext {
                detail_level: self.config.detail_level,
                lod: &self.config.lod,
                library: &self.library,
                probe: committed.as_ref().map(|p| p as &dyn HeightProbe),
                seed: self.config.seed,
            };
            for id in &live {
                if let Some(road) = self.roads.get_mut(id) {
                    if let Err(e) = road.rebuild_mesh(&ctx) {
                        summary.failures.push((*id, e));
                    }
                }
            }
        }

        // 2. intersections attached to these roads
        let mut touched = BTreeSet::new();
        for id in &live {
            let Some(road) = self.roads.get(id) else {
                continue;
            };
            for (end, node_id) in road.connections() {
                let Some(entry) = self.intersections.get_mut(&node_id) else {
                    continue;
                };
                if let Some(record) = connection_record(&road.def.curve, &road.def.lanes, end) {
                    entry.node.connect(*id, record);
                    touched.insert(node_id);
                }
            }
        }
        for node_id in touched {
            if let Some(entry) = self.intersections.get_mut(&node_id) {
                if let Err(e) = entry.node.regenerate(flags.update_terrain, flags.update_details) {
                    log::warn!("intersection '{}' failed to regenerate: {}", entry.name, e);
                }
            }
        }

        // 3. terrain
        if flags.update_terrain {
            summary.carve = self.carve_terrain();
        }

        // 4. details and trees under the regenerated roads
        if flags.update_details || flags.update_trees {
            if let Some(sink) = self.detail_sink.as_mut() {
                for id in &live {
                    let Some(generated) = self.roads.get(id).and_then(|r| r.generated()) else {
                        continue;
                    };
                    let footprint = generated.mesh.carve_samples(None);
                    if flags.update_details {
                        sink.clear_details(*id, &footprint);
                    }
                    if flags.update_trees {
                        sink.clear_trees(*id, &footprint);
                    }
                }
            }
        }

        // 5. prefab lines, on the carved terrain
        {
            let ctx = RegenContext {
                detail_level: self.config.detail_level,
                lod: &self.config.lod,
                library: &self.library,
                probe: self.terrain.as_ref().map(|t| t as &dyn HeightProbe),
                seed: self.config.seed,
            };
            for id in &live {
                if let Some(road) = self.roads.get_mut(id) {
                    if let Err(e) = road.rebuild_prefab_lines(&ctx) {
                        summary.failures.push((*id, e));
                    }
                }
            }
        }

        for id in &live {
            let Some(generated) = self.roads.get(id).and_then(|r| r.generated()) else {
                continue;
            };
            summary.roads += 1;
            for surface in generated.mesh.surfaces() {
                summary.vertices += surface.vertex_count();
                summary.triangles += surface.triangle_count();
            }
            summary.prefab_objects += generated.prefab_object_count();
        }
        log::info!(
            "regenerated {} roads: {} vertices, {} triangles, {} prefab objects",
            summary.roads,
            summary.vertices,
            summary.triangles,
            summary.prefab_objects
        );
        summary
    }

    /// One closest-wins carving pass over every deforming road, applied on
    /// top of the committed terrain. `None` without terrain.
    fn carve_terrain(&mut self) -> Option<CarveReport> {
        let terrain = self.terrain.as_mut()?;
        let mut session = CarveSession::new();

        for road in self.roads.values() {
            if !road.def.deform_terrain {
                continue;
            }
            if road.def.curve.cyclic {
                log::debug!("cyclic road '{}' does not carve terrain", road.name());
                continue;
            }
            let Some(generated) = road.generated() else {
                continue;
            };
            // Roads carved by interval only snap where an interval reaches.
            let seed = road.def.terrain_intervals.is_empty().then_some(road.def.carve);
            for surface in generated.mesh.surfaces() {
                session.add_surface(&surface.vertices, &surface.triangles, seed);
            }
            if road.def.terrain_intervals.is_empty() {
                session.carve_path(terrain, &generated.mesh.carve_samples(None), road.def.carve);
            } else {
                for interval in &road.def.terrain_intervals {
                    let samples = generated.mesh.carve_samples(Some(&interval.span));
                    session.carve_path(terrain, &samples, interval.settings);
                }
            }
        }
        for entry in self.intersections.values() {
            let Some(surface) = entry.node.surface() else {
                continue;
            };
            let settings = entry
                .node
                .connections()
                .iter()
                .filter_map(|(road, _)| self.roads.get(road))
                .find(|r| r.def.deform_terrain)
                .map_or_else(CarveSettings::default, |r| r.def.carve);
            session.add_surface(&surface.vertices, &surface.triangles, Some(settings));
        }

        let report = session.apply(terrain);
        log::info!(
            "terrain carved: {} cells modified, {} finished, {} smoothed",
            report.cells_modified,
            report.cells_finished,
            report.cells_smoothed
        );
        Some(report)
    }

    fn terrain_follows(&self, road: ObjectId) -> bool {
        self.terrain.is_some() && self.roads.get(&road).is_some_and(|r| r.def.deform_terrain)
    }

    /// Regenerate after an edit; failures are logged, the edit stands.
    fn regenerate_after_edit(&mut self, ids: &[ObjectId]) {
        let update_terrain = ids.iter().any(|id| self.terrain_follows(*id));
        let summary = self.run(
            ids,
            RegenFlags {
                update_terrain,
                update_details: false,
                update_trees: false,
            },
        );
        for (id, e) in &summary.failures {
            log::warn!("regeneration of road {} after edit failed: {}", id, e);
        }
    }

    // --- structural edits ---

    /// Split a road at interior point `point_index` into two roads.
    ///
    /// Lanes, prefab lines and terrain intervals are partitioned between
    /// the two; the end connection moves to the new road.
    pub fn split_segment(&mut self, road_id: ObjectId, point_index: usize, large_movement: bool) -> Result<SplitOutcome> {
        let name = {
            let road = self.road_entry(road_id)?;
            road.name().to_string()
        };
        let tail_name = self.unique_road_name(&name);

        let road = self.road_entry(road_id)?;
        let tail_curve = road.def.curve.split(point_index, large_movement).map_err(refused)?;
        let boundary_point = tail_curve.points[0].id;

        let mut tail_def = RoadDef {
            name: tail_name,
            curve: tail_curve,
            lanes: Vec::new(),
            prefab_lines: Vec::new(),
            terrain_intervals: Vec::new(),
            ..road.def.clone()
        };
        let (head, tail) = partition_spans(std::mem::take(&mut road.def.lanes), point_index);
        road.def.lanes = head;
        tail_def.lanes = tail;
        let (head, tail) = partition_spans(std::mem::take(&mut road.def.prefab_lines), point_index);
        road.def.prefab_lines = head;
        tail_def.prefab_lines = tail;
        let (head, tail) = partition_spans(std::mem::take(&mut road.def.terrain_intervals), point_index);
        road.def.terrain_intervals = head;
        tail_def.terrain_intervals = tail;

        let end_node = road.connection(ConnectionEnd::End);
        road.set_connection(ConnectionEnd::End, None);

        let new_road = self.add_road(tail_def);
        if let Some(node_id) = end_node {
            if let Some(entry) = self.intersections.get_mut(&node_id) {
                entry.node.disconnect(road_id, ConnectionEnd::End);
            }
            if let Some(tail) = self.roads.get_mut(&new_road) {
                tail.set_connection(ConnectionEnd::End, Some(node_id));
            }
        }

        log::info!("split road '{}' at point {}", name, point_index);
        self.regenerate_after_edit(&[road_id, new_road]);
        Ok(SplitOutcome {
            new_road,
            boundary_point,
        })
    }

    /// Insert a point on `segment` nearest to `target`. Returns its index.
    pub fn insert_point(&mut self, road_id: ObjectId, segment: usize, target: Vec3) -> Result<usize> {
        let road = self.road_entry(road_id)?;
        let (index, t) = road.def.curve.insert_point(segment, target).map_err(refused)?;
        for span in road.def.spans_mut() {
            span.on_insert(segment, t);
        }
        log::debug!("inserted point {} into road '{}'", index, road.name());
        self.regenerate_after_edit(&[road_id]);
        Ok(index)
    }

    /// Remove point `index`. A two-point road is deleted instead; removing
    /// an end attached to an intersection is refused.
    pub fn remove_point(&mut self, road_id: ObjectId, index: usize) -> Result<RemoveOutcome> {
        let road = self.road_entry(road_id)?;
        let count = road.def.curve.point_count();
        if index >= count {
            return Err(RoadError::IndexOutOfRange { index, len: count });
        }
        let end = if index == 0 {
            Some(ConnectionEnd::Start)
        } else if index + 1 == count {
            Some(ConnectionEnd::End)
        } else {
            None
        };
        if let Some(end) = end.filter(|e| road.connection(*e).is_some()) {
            return Err(refused(RoadError::InvalidTopology(format!(
                "point {} of road '{}' is attached to an intersection ({:?})",
                index,
                road.name(),
                end
            ))));
        }

        if count <= 2 {
            self.delete_road(road_id)?;
            return Ok(RemoveOutcome::RoadDeleted);
        }

        let removed = road.def.curve.remove_point(index).map_err(refused)?;
        let remaining = road.def.curve.point_count();
        for span in road.def.spans_mut() {
            span.on_remove(index, remaining);
        }
        self.regenerate_after_edit(&[road_id]);
        Ok(RemoveOutcome::Removed(removed))
    }

    /// Move an anchor or handle and regenerate.
    pub fn move_point(
        &mut self,
        road_id: ObjectId,
        index: usize,
        handle: Handle,
        target: Vec3,
        independent: bool,
    ) -> Result<()> {
        let road = self.road_entry(road_id)?;
        let count = road.def.curve.point_count();
        let point = road
            .def
            .curve
            .points
            .get_mut(index)
            .ok_or(RoadError::IndexOutOfRange { index, len: count })?;
        point.move_handle(handle, target, independent);
        self.regenerate_after_edit(&[road_id]);
        Ok(())
    }

    /// Overwrite an anchor's position and tangents, keeping its id. Returns
    /// the previous state.
    pub fn replace_point(&mut self, road_id: ObjectId, index: usize, point: &AnchorPoint) -> Result<AnchorPoint> {
        let road = self.road_entry(road_id)?;
        let count = road.def.curve.point_count();
        let slot = road
            .def
            .curve
            .points
            .get_mut(index)
            .ok_or(RoadError::IndexOutOfRange { index, len: count })?;
        let previous = slot.clone();
        slot.position = point.position;
        slot.left_tangent = point.left_tangent;
        slot.right_tangent = point.right_tangent;
        self.regenerate_after_edit(&[road_id]);
        Ok(previous)
    }

    /// Extend a road past one of its ends. Returns the new point's index.
    pub fn continue_road(&mut self, road_id: ObjectId, end: ConnectionEnd, position: Vec3) -> Result<usize> {
        let road = self.road_entry(road_id)?;
        if road.connection(end).is_some() {
            return Err(refused(RoadError::InvalidTopology(format!(
                "{:?} of road '{}' is attached to an intersection",
                end,
                road.name()
            ))));
        }
        if road.def.curve.cyclic {
            return Err(refused(RoadError::InvalidTopology(format!(
                "cyclic road '{}' has no free end",
                road.name()
            ))));
        }

        let index = match end {
            ConnectionEnd::End => {
                let last_segment = road.def.curve.segment_count().saturating_sub(1);
                let index = road.def.curve.push_point(position);
                for span in road.def.spans_mut() {
                    extend_span_end(span, last_segment);
                }
                index
            }
            ConnectionEnd::Start => {
                road.def.curve.prepend_point(position);
                for span in road.def.spans_mut() {
                    extend_span_start(span);
                }
                0
            }
        };
        self.regenerate_after_edit(&[road_id]);
        Ok(index)
    }

    /// Resample a road with its seams. Does not touch generated geometry.
    pub fn calculate_points(&mut self, road_id: ObjectId) -> Result<ResampledCurve> {
        let detail = self.config.detail_level;
        let road = self.road_entry(road_id)?;
        road.prepare()?;
        Ok(road.calculate_points(detail))
    }

    /// Drop every anchor of a road onto the committed ground. Without a
    /// terrain nothing happens. Returns how many anchors found ground.
    pub fn snap_points_to_terrain(&mut self, road_id: ObjectId) -> Result<usize> {
        let probe_height = self.config.probe_height;
        let offset = self.config.height_offset;
        let Some(terrain) = self.terrain.as_ref() else {
            log::debug!("no terrain to snap to");
            return Ok(0);
        };
        let road = self
            .roads
            .get_mut(&road_id)
            .ok_or_else(|| RoadError::NotFound(format!("road {}", road_id)))?;
        let snapped = road
            .def
            .curve
            .snap_to_terrain(&terrain.committed(), probe_height, offset);
        log::info!("snapped {} of {} points of road '{}'", snapped, road.def.curve.point_count(), road.name());
        self.regenerate_after_edit(&[road_id]);
        Ok(snapped)
    }

    /// Fingerprint of all generated geometry and the terrain grid. Objects
    /// are visited by name, so reloading a project reproduces it.
    pub fn fingerprint(&self) -> ContentHash {
        let mut roads: Vec<&RoadObject> = self.roads.values().collect();
        roads.sort_by(|a, b| a.name().cmp(b.name()));
        let mut intersections: Vec<&IntersectionEntry> = self.intersections.values().collect();
        intersections.sort_by(|a, b| a.name.cmp(&b.name));

        let mut hasher = ContentHash::builder();
        for road in roads {
            match road.generated() {
                Some(generated) => hasher.bytes(generated.fingerprint().as_bytes()),
                None => hasher.bytes(&[0]),
            };
        }
        for entry in intersections {
            if let Some(surface) = entry.node.surface() {
                hasher.bytes(surface.fingerprint().as_bytes());
            }
        }
        if let Some(terrain) = &self.terrain {
            hasher.bytes(terrain.heightmap().fingerprint().as_bytes());
        }
        hasher.finish()
    }

    fn unique_road_name(&self, base: &str) -> String {
        (2..)
            .map(|n| format!("{}-{}", base, n))
            .find(|candidate| self.find_road(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }
}

fn refused(e: RoadError) -> RoadError {
    log::warn!("refused: {}", e);
    e
}

/// Split dependents between the head and tail curves of a split.
fn partition_spans<T: SpanOwner + Clone>(items: Vec<T>, split_point: usize) -> (Vec<T>, Vec<T>) {
    let mut head = Vec::new();
    let mut tail = Vec::new();
    for mut item in items {
        match item.span_mut().partition_for_split(split_point) {
            SplitSide::First(span) => {
                *item.span_mut() = span;
                head.push(item);
            }
            SplitSide::Second(span) => {
                *item.span_mut() = span;
                tail.push(item);
            }
            SplitSide::Both(first, second) => {
                let mut copy = item.clone();
                *item.span_mut() = first;
                *copy.span_mut() = second;
                head.push(item);
                tail.push(copy);
            }
        }
    }
    (head, tail)
}

/// Spans reaching the old last segment's end grow onto the new segment.
fn extend_span_end(span: &mut IndexSpan, last_segment: usize) {
    if span.end_index == last_segment && span.end_offset >= 1.0 {
        span.end_index += 1;
    }
}

/// Everything shifts up by one; spans touching the start grow onto the new
/// first segment.
fn extend_span_start(span: &mut IndexSpan) {
    let touches_start = span.start_index == 0 && span.start_offset <= 0.0;
    if !touches_start {
        span.start_index += 1;
    }
    span.end_index += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadkit_core::ParamCurve;
    use roadkit_prefab::PrefabLine;
    use roadkit_road::{Curve, Lane};
    use roadkit_terrain::{Heightmap, TerrainBounds};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn lane(start: usize, end: usize) -> Lane {
        Lane::new("lane", IndexSpan::new(start, end), ParamCurve::constant(4.0))
    }

    fn partial_lane(segment: usize, from: f32, to: f32) -> Lane {
        Lane::new(
            "partial",
            IndexSpan::new(segment, segment).with_offsets(from, to),
            ParamCurve::constant(4.0),
        )
    }

    fn straight_road(name: &str, xs: &[f32], y: f32) -> RoadDef {
        let positions: Vec<Vec3> = xs.iter().map(|x| Vec3::new(*x, y, 0.0)).collect();
        RoadDef::new(name, Curve::from_positions(&positions))
    }

    fn terrain() -> (GridTerrain, TerrainDef) {
        let def = TerrainDef {
            resolution: [51, 51],
            base_height: 0.5,
            origin: Vec3::new(-50.0, -10.0, -50.0),
            size: Vec3::new(100.0, 20.0, 100.0),
            ..Default::default()
        };
        let heightmap = Heightmap::flat(51, 51, 0.5).unwrap();
        (GridTerrain::new(heightmap, TerrainBounds::new(def.origin, def.size)), def)
    }

    fn assert_spans_valid(network: &RoadNetwork) {
        for road in network.roads() {
            let count = road.def.curve.point_count();
            for span in road.def.spans() {
                assert!(span.is_valid(count), "{:?} invalid for {} points", span, count);
            }
        }
    }

    #[test]
    fn test_regeneration_is_idempotent() {
        let mut network = RoadNetwork::new("test", RoadkitConfig::default());
        let (grid, def) = terrain();
        network.set_terrain(grid, def);
        network.add_prefab("post", PrefabDef::Box { size: Vec3::new(0.2, 1.0, 1.0) });

        let mut road = straight_road("main", &[-20.0, 0.0, 20.0], -2.0);
        road.deform_terrain = true;
        road.lanes.push(lane(0, 1));
        let mut posts = PrefabLine::new("post", IndexSpan::new(0, 1));
        posts.bend_to_curve = false;
        posts.rotation_arc = 30.0;
        posts.conform = Some(Default::default());
        road.prefab_lines.push(posts);
        network.add_road(road);

        let original = network.terrain().unwrap().heightmap().fingerprint();
        let first = network.regenerate_all(true, false, false);
        assert!(first.failures.is_empty());
        assert!(first.carve.unwrap().cells_modified > 0);
        assert!(first.prefab_objects > 0);
        let after_first = network.fingerprint();
        assert_ne!(network.terrain().unwrap().heightmap().fingerprint(), original);

        network.regenerate_all(true, false, false);
        assert_eq!(network.fingerprint(), after_first);
    }

    #[test]
    fn test_split_partitions_lanes() {
        let mut network = RoadNetwork::new("test", RoadkitConfig::default());
        let mut road = straight_road("main", &[0.0, 10.0, 20.0], 0.0);
        road.lanes.push(lane(0, 1));
        road.lanes.push(lane(1, 1));
        let id = network.add_road(road);
        network.regenerate_all(false, false, false);

        let outcome = network.split_segment(id, 1, false).unwrap();
        let head = network.road(id).unwrap();
        let tail = network.road(outcome.new_road).unwrap();

        assert_eq!(head.curve().point_count(), 2);
        assert_eq!(tail.curve().point_count(), 2);
        assert_eq!(tail.name(), "main-2");
        assert_eq!(tail.curve().points[0].id, outcome.boundary_point);

        assert_eq!(head.def.lanes.len(), 1);
        assert_eq!(head.def.lanes[0].span, IndexSpan::new(0, 0));
        assert_eq!(tail.def.lanes.len(), 1);
        assert_eq!(tail.def.lanes[0].span, IndexSpan::new(0, 0));

        assert!(head.generated().is_some() && tail.generated().is_some());
        assert_spans_valid(&network);
    }

    #[test]
    fn test_split_refuses_end_points() {
        let mut network = RoadNetwork::new("test", RoadkitConfig::default());
        let id = network.add_road(straight_road("main", &[0.0, 10.0, 20.0], 0.0));
        assert!(matches!(
            network.split_segment(id, 2, false),
            Err(RoadError::InvalidTopology(_))
        ));
        assert_eq!(network.road_count(), 1);
        assert_eq!(network.road(id).unwrap().curve().point_count(), 3);
    }

    #[test]
    fn test_insert_and_remove_keep_spans_valid() {
        let mut network = RoadNetwork::new("test", RoadkitConfig::default());
        let mut road = straight_road("main", &[0.0, 10.0, 20.0], 0.0);
        road.lanes.push(lane(0, 1));
        road.lanes.push(partial_lane(1, 0.25, 0.75));
        let id = network.add_road(road);

        let index = network.insert_point(id, 0, Vec3::new(5.0, 0.0, 1.0)).unwrap();
        assert_eq!(index, 1);
        let road = network.road(id).unwrap();
        assert_eq!(road.curve().point_count(), 4);
        assert_eq!(road.def.lanes[0].span.end_index, 2);
        assert_eq!(road.def.lanes[1].span.start_index, 2);
        assert_spans_valid(&network);

        network.remove_point(id, 3).unwrap();
        network.remove_point(id, 1).unwrap();
        assert_eq!(network.road(id).unwrap().curve().point_count(), 2);
        assert_spans_valid(&network);

        assert_eq!(network.remove_point(id, 0).unwrap(), RemoveOutcome::RoadDeleted);
        assert_eq!(network.road_count(), 0);
    }

    #[test]
    fn test_intersection_surface_carves_beyond_road_reach() {
        let mut network = RoadNetwork::new("test", RoadkitConfig::default());
        let (grid, def) = terrain();
        network.set_terrain(grid, def);

        let mut road = straight_road("main", &[-40.0, 0.0], -3.0);
        road.deform_terrain = true;
        road.carve = CarveSettings {
            radius: 4.0,
            ..Default::default()
        };
        road.lanes.push(lane(0, 0));
        let offset = road.carve.height_offset;
        let id = network.add_road(road);
        let node = network.add_intersection("plaza", 12.0);
        network.connect(id, ConnectionEnd::End, node).unwrap();

        let summary = network.regenerate_all(true, false, false);
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);

        let terrain = network.terrain().unwrap();
        let height = |x: f32| terrain.height_at(x, 0.0).unwrap();
        // the road reaches 6 units past its end, the plate 12
        assert!((height(10.0) - (-3.0 - offset)).abs() < 1e-3, "got {}", height(10.0));
        assert!((height(-20.0) - (-3.0 - offset)).abs() < 1e-3);
        assert!(height(30.0).abs() < 1e-3);
    }

    #[test]
    fn test_connections_guard_road_ends() {
        let mut network = RoadNetwork::new("test", RoadkitConfig::default());
        let mut road = straight_road("main", &[0.0, 10.0], 0.0);
        road.lanes.push(lane(0, 0));
        let id = network.add_road(road);
        let node = network.add_intersection("junction", 5.0);

        network.connect(id, ConnectionEnd::End, node).unwrap();
        let entry = network.intersection(node).unwrap();
        assert_eq!(entry.node.connected_lanes(id).last().map(|r| r.end_index), Some(0));
        assert!(entry.node.surface().is_some());

        assert!(matches!(
            network.remove_point(id, 1),
            Err(RoadError::InvalidTopology(_))
        ));
        assert!(matches!(
            network.continue_road(id, ConnectionEnd::End, Vec3::new(20.0, 0.0, 0.0)),
            Err(RoadError::InvalidTopology(_))
        ));

        let index = network
            .continue_road(id, ConnectionEnd::Start, Vec3::new(-10.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(index, 0);
        let road = network.road(id).unwrap();
        assert_eq!(road.curve().point_count(), 3);
        assert_eq!(road.def.lanes[0].span, IndexSpan::new(0, 1));

        network.delete_road(id).unwrap();
        assert!(network.intersection(node).unwrap().node.connections().is_empty());
    }

    #[test]
    fn test_cyclic_roads_cannot_connect() {
        let mut network = RoadNetwork::new("test", RoadkitConfig::default());
        let mut road = straight_road("ring", &[0.0, 10.0, 0.0], 0.0);
        road.curve.cyclic = true;
        let id = network.add_road(road);
        let node = network.add_intersection("junction", 5.0);
        assert!(matches!(
            network.connect(id, ConnectionEnd::Start, node),
            Err(RoadError::InvalidTopology(_))
        ));
        assert!(network.road(id).unwrap().connection(ConnectionEnd::Start).is_none());
    }

    #[test]
    fn test_missing_prefab_fails_regeneration() {
        let mut network = RoadNetwork::new("test", RoadkitConfig::default());
        let mut road = straight_road("main", &[0.0, 10.0], 0.0);
        road.lanes.push(lane(0, 0));
        road.prefab_lines.push(PrefabLine::new("lamp", IndexSpan::new(0, 0)));
        let id = network.add_road(road);
        assert!(matches!(
            network.regenerate(id, false, false, false),
            Err(RoadError::MissingAsset(_))
        ));
        // the road surface itself still exists
        assert!(network.road(id).unwrap().generated().is_some());
    }

    #[derive(Default)]
    struct Recorder {
        details: usize,
        trees: usize,
    }

    struct SharedSink(Rc<RefCell<Recorder>>);

    impl DetailSink for SharedSink {
        fn clear_details(&mut self, _road: ObjectId, footprint: &[CarveSample]) {
            assert!(!footprint.is_empty());
            self.0.borrow_mut().details += 1;
        }

        fn clear_trees(&mut self, _road: ObjectId, _footprint: &[CarveSample]) {
            self.0.borrow_mut().trees += 1;
        }
    }

    #[test]
    fn test_detail_sink_sees_regenerated_roads() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut network = RoadNetwork::new("test", RoadkitConfig::default());
        network.set_detail_sink(Box::new(SharedSink(recorder.clone())));
        let mut road = straight_road("main", &[0.0, 10.0], 0.0);
        road.lanes.push(lane(0, 0));
        let id = network.add_road(road);

        network.regenerate(id, false, true, false).unwrap();
        network.regenerate(id, false, true, true).unwrap();
        assert_eq!(recorder.borrow().details, 2);
        assert_eq!(recorder.borrow().trees, 1);
    }

    #[test]
    fn test_snapping_without_terrain_is_skipped() {
        let mut network = RoadNetwork::new("test", RoadkitConfig::default());
        let id = network.add_road(straight_road("main", &[0.0, 10.0], 3.0));
        assert_eq!(network.snap_points_to_terrain(id).unwrap(), 0);

        let (grid, def) = terrain();
        network.set_terrain(grid, def);
        assert_eq!(network.snap_points_to_terrain(id).unwrap(), 2);
        let road = network.road(id).unwrap();
        assert!(road.curve().points.iter().all(|p| p.position.y.abs() < 1e-4));
    }

    #[test]
    fn test_calculate_points_hits_lane_seams() {
        let mut network = RoadNetwork::new("test", RoadkitConfig::default());
        let mut road = straight_road("main", &[0.0, 10.0], 0.0);
        road.lanes.push(partial_lane(0, 0.33, 0.66));
        let id = network.add_road(road);
        let curve = network.calculate_points(id).unwrap();
        assert!(curve.samples.iter().any(|s| s.seam && (s.t - 0.33).abs() < 1e-6));
        assert!(curve.samples.iter().any(|s| s.seam && (s.t - 0.66).abs() < 1e-6));
    }
}
