#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Classifies urban parcels by shape.
//!
//! ```text
//! parcel_morph run parcels.geojson --output-dir results [--config morph.toml] [--clusters 4] [--seed 42] [--min-area 0.01] [--skip-density]
//! parcel_morph density parcels.geojson --output grid.geojson [--cell-size 50] [--buffer 100]
//! parcel_morph config [--config morph.toml]
//! ```
//!
//! Input coordinates must be in a projected CRS with meter units.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use parcel_morph_cli_utils::IndicatifProgress;
use parcel_morph_density::density_grid;
use parcel_morph_io::{
    config::{load_config, render_config},
    grid::write_grid_geojson,
    parcels::{load_parcels, write_parcels_geojson},
    reports::{write_json, write_orientation_bins_csv, write_summary_csv},
};
use parcel_morph_morphology::{clean::clean_geometry, pipeline};
use parcel_morph_morphology_models::config::MorphologyConfig;

#[derive(Parser)]
#[command(
    name = "parcel_morph",
    about = "Measure, clean, and cluster urban parcels by shape"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write every output
    Run {
        /// Parcel `GeoJSON` FeatureCollection (projected, meters)
        input: PathBuf,
        /// Directory receiving the outputs (created if missing)
        #[arg(long)]
        output_dir: PathBuf,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of morphological classes
        #[arg(long)]
        clusters: Option<usize>,
        /// Clustering seed
        #[arg(long)]
        seed: Option<u64>,
        /// Sliver threshold in square meters (exclusive)
        #[arg(long)]
        min_area: Option<f64>,
        /// Skip the fishnet density grid
        #[arg(long)]
        skip_density: bool,
    },
    /// Count parcels per fishnet grid cell
    Density {
        /// Parcel `GeoJSON` FeatureCollection (projected, meters)
        input: PathBuf,
        /// Output grid `GeoJSON`
        #[arg(long)]
        output: PathBuf,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Grid cell side length in meters
        #[arg(long)]
        cell_size: Option<f64>,
        /// Padding around the parcel extent in meters
        #[arg(long)]
        buffer: Option<f64>,
    },
    /// Print the effective configuration as TOML
    Config {
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

const PARCELS_FILE: &str = "parcels_classified.geojson";
const SUMMARY_FILE: &str = "cluster_summary.csv";
const ORIENTATION_FILE: &str = "orientation_bins.csv";
const REPORTS_FILE: &str = "stage_reports.json";
const GRAIN_SIZE_FILE: &str = "grain_size.json";
const GRID_FILE: &str = "density_grid.geojson";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = parcel_morph_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            output_dir,
            config,
            clusters,
            seed,
            min_area,
            skip_density,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(k) = clusters {
                config.cluster_count = k;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if let Some(min_area) = min_area {
                config.min_area_m2 = min_area;
            }
            config.validate()?;

            let progress = IndicatifProgress::parcels_bar(&multi, "Measuring parcels");
            run(&input, &output_dir, &config, skip_density, progress.as_ref())?;
        }
        Commands::Density {
            input,
            output,
            config,
            cell_size,
            buffer,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(cell_size) = cell_size {
                config.density.cell_size_m = cell_size;
            }
            if let Some(buffer) = buffer {
                config.density.buffer_m = buffer;
            }
            config.density.validate()?;

            let raw = load_parcels(&input, &config.area_override_field)?;
            let parcels = clean_geometry(raw).records;
            let shapes: Vec<_> = parcels.iter().map(|p| &p.shape).collect();
            let grid = density_grid(&shapes, &config.density)?;
            write_grid_geojson(&output, &grid)?;
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            config.validate()?;
            print!("{}", render_config(&config)?);
        }
    }

    Ok(())
}

fn run(
    input: &Path,
    output_dir: &Path,
    config: &MorphologyConfig,
    skip_density: bool,
    progress: &dyn parcel_morph_morphology::progress::ProgressCallback,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = load_parcels(input, &config.area_override_field)?;
    let out = pipeline::run(raw, config, progress)?;

    std::fs::create_dir_all(output_dir)?;
    write_parcels_geojson(&output_dir.join(PARCELS_FILE), &out.parcels)?;
    write_summary_csv(&output_dir.join(SUMMARY_FILE), &out.summary)?;
    write_orientation_bins_csv(&output_dir.join(ORIENTATION_FILE), &out.orientation_bins)?;
    write_json(&output_dir.join(REPORTS_FILE), &out.reports)?;
    write_json(&output_dir.join(GRAIN_SIZE_FILE), &out.area_statistics)?;

    for row in &out.summary {
        log::info!(
            "Cluster {}: {} parcel(s), mean area {:.1} m2, compactness {:.3}, \
             rectangularity {:.3}, orientation {:.1} deg",
            row.morpho_cluster,
            row.parcel_count,
            row.area_m2,
            row.compactness_idx,
            row.rectangularity_idx,
            row.orientation_angle
        );
    }

    if skip_density {
        log::info!("Skipping density grid");
    } else {
        let shapes: Vec<_> = out.parcels.iter().map(|p| &p.parcel.shape).collect();
        let grid = density_grid(&shapes, &config.density)?;
        write_grid_geojson(&output_dir.join(GRID_FILE), &grid)?;
    }

    Ok(())
}
