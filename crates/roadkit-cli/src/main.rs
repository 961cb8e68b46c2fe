//! Roadkit CLI - Command-line editing host for road networks

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{build, edit, init, inspect};

#[derive(Parser)]
#[command(name = "roadkit")]
#[command(about = "Procedural roads, prefab lines and terrain carving from TOML projects", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new Roadkit project
    Init {
        /// Project name/directory
        name: String,
    },

    /// Regenerate every road and report what was built
    Build {
        /// Path to project file
        project: String,

        /// Skip terrain carving
        #[arg(long)]
        no_terrain: bool,

        /// Write the carved heightmap to this PNG
        #[arg(long)]
        heightmap_out: Option<String>,
    },

    /// Show roads, lanes and connections of a project
    Inspect {
        /// Path to project file
        project: String,

        /// Only this road, with its resampled points
        #[arg(long)]
        road: Option<String>,
    },

    /// Split a road at an interior point
    Split {
        /// Path to project file
        project: String,

        #[arg(long)]
        road: String,

        /// Index of the split point
        #[arg(long)]
        point: usize,

        /// Push the two copies further apart
        #[arg(long)]
        large: bool,
    },

    /// Insert a point into a road segment
    Insert {
        /// Path to project file
        project: String,

        #[arg(long)]
        road: String,

        #[arg(long)]
        segment: usize,

        /// Target position (comma-separated x,y,z)
        #[arg(long, value_parser = parse_vec3)]
        at: [f32; 3],
    },

    /// Remove a point from a road
    Remove {
        /// Path to project file
        project: String,

        #[arg(long)]
        road: String,

        #[arg(long)]
        point: usize,
    },

    /// Drop road points onto the terrain
    Snap {
        /// Path to project file
        project: String,

        /// Only this road (defaults to all roads)
        #[arg(long)]
        road: Option<String>,
    },
}

fn parse_vec3(s: &str) -> Result<[f32; 3], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected 3 comma-separated values, got {}", parts.len()));
    }
    let x: f32 = parts[0].trim().parse().map_err(|e| format!("invalid x: {}", e))?;
    let y: f32 = parts[1].trim().parse().map_err(|e| format!("invalid y: {}", e))?;
    let z: f32 = parts[2].trim().parse().map_err(|e| format!("invalid z: {}", e))?;
    Ok([x, y, z])
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { name } => init::run(&name),
        Commands::Build {
            project,
            no_terrain,
            heightmap_out,
        } => build::run(build::BuildArgs {
            project,
            no_terrain,
            heightmap_out,
        }),
        Commands::Inspect { project, road } => inspect::run(&project, road.as_deref()),
        Commands::Split {
            project,
            road,
            point,
            large,
        } => edit::split(&project, &road, point, large),
        Commands::Insert {
            project,
            road,
            segment,
            at,
        } => edit::insert(&project, &road, segment, at),
        Commands::Remove { project, road, point } => edit::remove(&project, &road, point),
        Commands::Snap { project, road } => edit::snap(&project, road.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_vec3() {
        assert_eq!(parse_vec3("1, 2.5,-3").unwrap(), [1.0, 2.5, -3.0]);
        assert!(parse_vec3("1,2").is_err());
        assert!(parse_vec3("1,x,2").is_err());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
