use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

// Define modules used by main
mod ensemble;
mod grid;
mod params;
mod radiograph;
mod render;

use epoch_common::{AnalysisConfig, Snapshot};
use ensemble::ParticleEnsemble;
use grid::SimulationBox;
use params::RadiographParams;
use radiograph::{compute_radiograph, Radiograph};

/// Create a synthetic radiograph from EPOCH particle data.
///
/// Particles of one species are projected along z onto a detector plane and
/// histogrammed with their weights. The figure shows, from left to right:
/// the x-y histogram at the simulation plane (z = 0), a side-on image built
/// from y-histograms at evenly spaced planes up to the detector, the x-y
/// histogram at the detector plane, and the detector y-lineout integrated
/// over x.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name of the particle species
    particle_name: String,

    /// Path to the SDF file
    file_name: PathBuf,

    /// Detector position in mm [default: 100]
    #[arg(short = 'p', long = "pos")]
    pos: Option<f64>,

    /// Histogram resolution in the x direction [default: 200]
    #[arg(short = 'x', long)]
    x_res: Option<usize>,

    /// Histogram resolution in the y direction [default: 1500]
    #[arg(short = 'y', long)]
    y_res: Option<usize>,

    /// Resolution of the side-on sweep [default: 1000]
    #[arg(short = 'd', long)]
    detector_res: Option<usize>,

    /// Output image path (.png)
    #[arg(short, long, default_value = "radiograph.png")]
    output: PathBuf,

    /// Also write the detector lineout as CSV (y_m, weighted_count)
    #[arg(long)]
    lineout_csv: Option<PathBuf>,

    /// Remove particles with zero longitudinal momentum instead of failing
    #[arg(long)]
    drop_transverse: bool,

    /// Optional TOML config file supplying defaults for the options above
    #[arg(long)]
    config: Option<PathBuf>,

    /// List the blocks in the SDF file and exit
    #[arg(long)]
    list_blocks: bool,
}

/// Merges command-line options over the config file values.
fn resolve_params(args: &Args, config: &AnalysisConfig) -> Result<RadiographParams> {
    let mut merged = config.radiograph.clone();
    if let Some(pos) = args.pos {
        merged.detector_position_mm = pos;
    }
    if let Some(x_res) = args.x_res {
        merged.x_resolution = x_res;
    }
    if let Some(y_res) = args.y_res {
        merged.y_resolution = y_res;
    }
    if let Some(detector_res) = args.detector_res {
        merged.detector_resolution = detector_res;
    }
    let params = RadiographParams::from_config(&merged).context("Invalid radiograph parameters")?;
    Ok(params)
}

fn log_blocks(snapshot: &Snapshot) {
    info!("{} blocks in snapshot:", snapshot.len());
    for block in snapshot.blocks() {
        info!("  {:<40} {}", block.name, block.describe());
    }
}

/// Writes the detector lineout as a two-column CSV table.
fn write_lineout_csv(radiograph: &Radiograph, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file '{}'", path.display()))?;
    writer.write_record(["y_m", "weighted_count"])?;
    for (y, count) in radiograph.lineout.centers().iter().zip(radiograph.lineout.counts()) {
        writer.write_record(&[format!("{:.6e}", y), format!("{:.6e}", count)])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run_with_args(args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_with_args(args: Args) -> Result<()> {
    info!("Starting Synthetic Radiograph...");

    // --- Load Configuration ---
    let config = match &args.config {
        Some(path) => {
            let config = AnalysisConfig::load(path)?;
            info!("Loaded configuration from {}", path.display());
            config
        }
        None => AnalysisConfig::default(),
    };
    let params = resolve_params(&args, &config)?;
    debug!("Radiograph parameters: {:#?}", params);

    // --- Load EPOCH data ---
    let snapshot = Snapshot::open(&args.file_name)
        .with_context(|| format!("Failed to load snapshot '{}'", args.file_name.display()))?;
    if args.list_blocks {
        log_blocks(&snapshot);
        return Ok(());
    }

    let sim_box = SimulationBox::from_snapshot(&snapshot).context("Failed to read the simulation grid")?;
    info!(
        "Simulation box: x [{:.4e}, {:.4e}] m, y [{:.4e}, {:.4e}] m",
        sim_box.x_min, sim_box.x_max, sim_box.y_min, sim_box.y_max
    );

    let mut ensemble = ParticleEnsemble::from_snapshot(&snapshot, &args.particle_name).with_context(|| {
        format!(
            "Failed to load species '{}' (species in file: {:?})",
            args.particle_name,
            snapshot.species()
        )
    })?;
    if ensemble.is_empty() {
        warn!("Species '{}' has no particles; the radiograph will be empty.", args.particle_name);
    }
    let transverse = ensemble.count_transverse();
    if transverse > 0 {
        if args.drop_transverse {
            ensemble.drop_transverse();
            warn!("Dropped {} particles with zero longitudinal momentum.", transverse);
        } else {
            anyhow::bail!(
                "{} particles have zero longitudinal momentum (pz = 0); rerun with --drop-transverse to ignore them",
                transverse
            );
        }
    }

    // --- Reduce ---
    let progress_bar = ProgressBar::new(params.sweep_slices as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} slices ({percent}%) [{eta}]")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );
    let start_time = Instant::now();
    let radiograph = compute_radiograph(&ensemble, &sim_box, &params, &progress_bar)?;
    progress_bar.finish_with_message("Side-on sweep complete");
    info!("Reduction finished in {:.2?}", start_time.elapsed());

    // --- Render ---
    let size = (config.output.width, config.output.height);
    render::render_radiograph(&radiograph, &args.output, size)
        .with_context(|| format!("Failed to render radiograph to '{}'", args.output.display()))?;
    info!("Radiograph saved to {}", args.output.display());

    if let Some(path) = &args.lineout_csv {
        write_lineout_csv(&radiograph, path)?;
        info!("Detector lineout saved to {}", path.display());
    }

    info!("Synthetic Radiograph Complete.");
    Ok(())
}
