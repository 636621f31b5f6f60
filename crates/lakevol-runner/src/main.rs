//! lakevol CLI: lake water area and storage volume from imagery and a DEM.

use clap::{Parser, Subcommand};
use lakevol_common::{DemExtent, EngineConfig, PolygonPolicy};
use lakevol_raster::read_elevation;
use lakevol_runner::{parse_dates, Analysis, RunnerError};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lakevol")]
#[command(author, version, about = "Lake water area and storage volume estimation", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure water area and volume for a series of images
    Analyze {
        /// Multi-band GeoTIFF images
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Elevation model GeoTIFF
        #[arg(long)]
        dem: Option<PathBuf>,
        /// Also report the volume at this water level (m)
        #[arg(long)]
        base_level: Option<f64>,
        /// Known basin-floor elevation below the DEM (m)
        #[arg(long)]
        reference_floor: Option<f64>,
        /// Comma-separated YYYY-MM-DD dates, one per image
        #[arg(long)]
        dates: Option<String>,
        #[command(flatten)]
        engine: EngineArgs,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the elevation/area/volume table of a DEM
    Curve {
        /// Elevation model GeoTIFF
        dem: PathBuf,
        /// Known basin-floor elevation below the DEM (m)
        #[arg(long)]
        reference_floor: Option<f64>,
        #[command(flatten)]
        engine: EngineArgs,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct EngineArgs {
    /// YAML engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Polygon selection: largest-only or merge-all
    #[arg(long)]
    policy: Option<String>,
    /// DEM extent: full, polygon-margin or polygon-margin:<metres>
    #[arg(long)]
    dem_extent: Option<String>,
}

impl EngineArgs {
    fn load(&self) -> Result<EngineConfig, RunnerError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_yaml_file(path)?,
            None => EngineConfig::default(),
        };
        if let Some(policy) = &self.policy {
            config.water.polygon_policy = policy.parse::<PolygonPolicy>()?;
        }
        if let Some(extent) = &self.dem_extent {
            config.curve.dem_extent = extent.parse::<DemExtent>()?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<(), RunnerError> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!(path = %path.display(), "results written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Serialize)]
struct FrequencySummary {
    images: u32,
    skipped: usize,
    shape: Option<(usize, usize)>,
    /// Pixels that were water in every image.
    permanent_pixels: usize,
    /// Pixels that were water in at least one image.
    ever_wet_pixels: usize,
}

fn run(cli: Cli) -> Result<(), RunnerError> {
    match cli.command {
        Commands::Analyze {
            images,
            dem,
            base_level,
            reference_floor,
            dates,
            engine,
            output,
        } => {
            let config = engine.load()?;
            let dates = match &dates {
                Some(list) => parse_dates(list)?,
                None => Vec::new(),
            };

            let mut analysis = Analysis::new(config);
            if let Some(path) = &dem {
                analysis = analysis.with_dem(read_elevation(path)?, file_name(path));
            }
            if let Some(floor) = reference_floor {
                analysis = analysis.with_reference_floor(floor);
            }
            if let Some(level) = base_level {
                analysis = analysis.with_base_level(level);
            }

            let run = analysis.run_files(&images, &dates);
            let percent = run.frequency.percent();
            let frequency = FrequencySummary {
                images: run.frequency.images(),
                skipped: run.frequency_skipped,
                shape: run.frequency.shape(),
                permanent_pixels: percent.as_ref().map_or(0, |p| p.iter().filter(|&&v| v == 100).count()),
                ever_wet_pixels: percent.as_ref().map_or(0, |p| p.iter().filter(|&&v| v > 0).count()),
            };
            let report = serde_json::json!({
                "results": run.outcomes,
                "frequency": frequency,
            });
            write_json(&report, output.as_deref())
        }
        Commands::Curve {
            dem,
            reference_floor,
            engine,
            output,
        } => {
            let config = engine.load()?;
            let mut analysis = Analysis::new(config).with_dem(read_elevation(&dem)?, file_name(&dem));
            if let Some(floor) = reference_floor {
                analysis = analysis.with_reference_floor(floor);
            }
            let Some(curve) = analysis.full_curve() else {
                return Ok(());
            };
            let report = serde_json::json!({
                "dem": file_name(&dem),
                "status": curve.status(),
                "floor": curve.floor(),
                "min_elevation": curve.min_elevation(),
                "max_elevation": curve.max_elevation(),
                "max_volume_m3": curve.max_volume_m3(),
                "rows": curve.rows(&analysis.config().units),
            });
            write_json(&report, output.as_deref())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "lakevol failed");
            ExitCode::FAILURE
        }
    }
}
