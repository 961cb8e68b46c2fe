//! Project inspection

use anyhow::Result;
use roadkit_core::IndexSpan;
use roadkit_scene::{RoadNetwork, RoadObject};

use super::{open_project, road_by_name};

pub fn run(project: &str, road: Option<&str>) -> Result<()> {
    let mut network = open_project(project)?;

    match road {
        Some(name) => {
            let id = road_by_name(&network, name)?;
            if let Some(road) = network.road(id) {
                print_road(&network, road);
            }
            let resampled = network.calculate_points(id)?;
            println!();
            println!(
                "Resampled: {} samples, length {:.2}",
                resampled.len(),
                resampled.total_length
            );
            for (i, sample) in resampled.samples.iter().enumerate() {
                println!(
                    "  {:4}  [{:8.2}, {:8.2}, {:8.2}]  segment {} t {:.3}  at {:8.2}{}",
                    i,
                    sample.position.x,
                    sample.position.y,
                    sample.position.z,
                    sample.segment,
                    sample.t,
                    sample.distance,
                    if sample.seam { "  seam" } else { "" }
                );
            }
        }
        None => print_project(&network),
    }
    Ok(())
}

fn print_project(network: &RoadNetwork) {
    println!("Project: {}", network.project.name);
    if let Some(description) = &network.project.description {
        println!("  {}", description);
    }
    match network.terrain_def() {
        Some(terrain) => println!(
            "Terrain: {} at [{}, {}, {}] size [{}, {}, {}]",
            terrain.heightmap.as_deref().unwrap_or("flat grid"),
            terrain.origin.x,
            terrain.origin.y,
            terrain.origin.z,
            terrain.size.x,
            terrain.size.y,
            terrain.size.z
        ),
        None => println!("Terrain: none"),
    }
    let prefabs: Vec<&str> = network.library().names().collect();
    if !prefabs.is_empty() {
        println!("Prefabs: {}", prefabs.join(", "));
    }

    let mut roads: Vec<&RoadObject> = network.roads().collect();
    roads.sort_by(|a, b| a.name().cmp(b.name()));
    for road in roads {
        println!();
        print_road(network, road);
    }

    let mut intersections: Vec<_> = network.intersections().collect();
    intersections.sort_by(|a, b| a.name.cmp(&b.name));
    for entry in intersections {
        println!();
        println!("Intersection: {} (radius {})", entry.name, entry.radius);
        for (road, end) in entry.node.connections() {
            let name = network.road(road).map(|r| r.name()).unwrap_or("?");
            println!("  {} {:?}", name, end);
        }
    }
}

fn print_road(network: &RoadNetwork, road: &RoadObject) {
    let curve = road.curve();
    println!(
        "Road: {} ({} points{}{})",
        road.name(),
        curve.point_count(),
        if curve.cyclic { ", cyclic" } else { "" },
        if road.def.deform_terrain { ", deforms terrain" } else { "" }
    );
    for (i, point) in curve.points.iter().enumerate() {
        println!(
            "  point {:2}  [{:.2}, {:.2}, {:.2}]",
            i, point.position.x, point.position.y, point.position.z
        );
    }
    for lane in &road.def.lanes {
        println!(
            "  lane '{}' {}  width {:.2}  materials [{}]",
            lane.name,
            span_label(&lane.span),
            lane.max_width(),
            lane.materials.join(", ")
        );
    }
    for line in &road.def.prefab_lines {
        println!("  prefab line '{}' {}", line.prefab, span_label(&line.span));
    }
    for interval in &road.def.terrain_intervals {
        println!(
            "  terrain interval {}  radius {}",
            span_label(&interval.span),
            interval.settings.radius
        );
    }
    for (end, node) in road.connections() {
        let name = network.intersection(node).map(|e| e.name.as_str()).unwrap_or("?");
        println!("  {:?} -> {}", end, name);
    }
}

fn span_label(span: &IndexSpan) -> String {
    format!(
        "{}+{:.2}..{}+{:.2}",
        span.start_index, span.start_offset, span.end_index, span.end_offset
    )
}
