//! Full regeneration of a project

use anyhow::{Context, Result};
use roadkit_terrain::TerrainSurface;
use std::path::Path;

use super::open_project;

pub struct BuildArgs {
    pub project: String,
    pub no_terrain: bool,
    pub heightmap_out: Option<String>,
}

pub fn run(args: BuildArgs) -> Result<()> {
    let mut network = open_project(&args.project)?;
    let summary = network.regenerate_all(!args.no_terrain, false, false);

    println!("Project: {}", network.project.name);
    println!("  Roads generated: {}/{}", summary.roads, network.road_count());
    println!("  Vertices:        {}", summary.vertices);
    println!("  Triangles:       {}", summary.triangles);
    println!("  Prefab objects:  {}", summary.prefab_objects);
    if let Some(carve) = summary.carve {
        println!(
            "  Terrain cells:   {} carved, {} finished, {} smoothed",
            carve.cells_modified, carve.cells_finished, carve.cells_smoothed
        );
    }
    println!("  Fingerprint:     {}", network.fingerprint().to_prefixed_hex());

    for (id, error) in &summary.failures {
        let name = network.road(*id).map(|r| r.name().to_string()).unwrap_or_else(|| id.to_string());
        eprintln!("  FAILED {}: {}", name, error);
    }

    if let Some(out) = &args.heightmap_out {
        let terrain = network
            .terrain()
            .context("Project has no terrain to write")?;
        terrain
            .heightmap()
            .to_png(Path::new(out))
            .with_context(|| format!("Failed to write heightmap: {}", out))?;
        println!("Wrote heightmap: {}", out);
    }

    if !summary.failures.is_empty() {
        anyhow::bail!("{} road(s) failed to generate", summary.failures.len());
    }
    Ok(())
}
