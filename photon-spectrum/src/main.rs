use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use epoch_common::{AnalysisConfig, Snapshot};
use log::{debug, info, LevelFilter};
use std::path::{Path, PathBuf};

mod render;
mod spectrum;

use spectrum::{compute_spectrum, load_photon_data, Spectrum, SpectrumParams};

/// Plot the photon energy spectrum of an EPOCH SDF file.
///
/// Photon energies are histogrammed into logarithmically spaced buckets,
/// each photon contributing its macro-particle weight, and drawn on
/// log-log axes.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the SDF file
    file_name: PathBuf,

    /// Minimum photon energy in eV [default: 100]
    #[arg(short = 'e', long)]
    energy_min: Option<f64>,

    /// Maximum photon energy in eV [default: 1e6]
    #[arg(short = 'E', long)]
    energy_max: Option<f64>,

    /// Number of energy buckets [default: 100]
    #[arg(short, long)]
    resolution: Option<usize>,

    /// Name of the photon species [default: Photon]
    #[arg(short, long)]
    photon: Option<String>,

    /// Particle variable holding the photon energy [default: "QED energy"]
    #[arg(long)]
    energy_field: Option<String>,

    /// Output image path (.png)
    #[arg(short, long, default_value = "photon_spectrum.png")]
    output: PathBuf,

    /// Also write the spectrum as CSV (energy_ev, weighted_count)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Optional TOML config file supplying defaults for the options above
    #[arg(long)]
    config: Option<PathBuf>,

    /// List the blocks in the SDF file and exit
    #[arg(long)]
    list_blocks: bool,
}

/// Resolved species, energy field and binning.
#[derive(Debug)]
struct Selection {
    species: String,
    energy_field: String,
    params: SpectrumParams,
}

fn resolve(args: &Args, config: &AnalysisConfig) -> Result<Selection> {
    let mut merged = config.spectrum.clone();
    if let Some(energy_min) = args.energy_min {
        merged.energy_min_ev = energy_min;
    }
    if let Some(energy_max) = args.energy_max {
        merged.energy_max_ev = energy_max;
    }
    if let Some(resolution) = args.resolution {
        merged.resolution = resolution;
    }
    if let Some(photon) = &args.photon {
        merged.species = photon.clone();
    }
    if let Some(field) = &args.energy_field {
        merged.energy_field = field.clone();
    }
    let params = SpectrumParams::from_config(&merged).context("Invalid spectrum parameters")?;
    Ok(Selection { species: merged.species, energy_field: merged.energy_field, params })
}

fn write_spectrum_csv(spectrum: &Spectrum, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file '{}'", path.display()))?;
    writer.write_record(["energy_ev", "weighted_count"])?;
    for (energy, count) in spectrum.energies.iter().zip(&spectrum.counts) {
        writer.write_record(&[format!("{:.6e}", energy), format!("{:.6e}", count)])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    // Initialize logger
    Builder::from_default_env().filter(None, LevelFilter::Info).init();

    info!("Starting Photon Spectrum...");
    info!("Input file: {}", args.file_name.display());

    let config = match &args.config {
        Some(path) => {
            let config = AnalysisConfig::load(path)?;
            info!("Loaded configuration from {}", path.display());
            config
        }
        None => AnalysisConfig::default(),
    };
    let selection = resolve(&args, &config)?;
    debug!("Spectrum selection: {:#?}", selection);

    let snapshot = Snapshot::open(&args.file_name)
        .with_context(|| format!("Failed to load snapshot '{}'", args.file_name.display()))?;
    if args.list_blocks {
        info!("{} blocks in snapshot:", snapshot.len());
        for block in snapshot.blocks() {
            info!("  {:<40} {}", block.name, block.describe());
        }
        return Ok(());
    }

    let (energies, weights) = load_photon_data(&snapshot, &selection.species, &selection.energy_field)
        .with_context(|| {
            format!(
                "Failed to load '{}' energies of species '{}' (species in file: {:?})",
                selection.energy_field,
                selection.species,
                snapshot.species()
            )
        })?;

    let spectrum = compute_spectrum(&energies, &weights, &selection.params)?;
    let edges = spectrum.log_histogram.edges();
    info!(
        "Histogram bounds: ln(E/eV) in [{:.4}, {:.4}] over {} buckets",
        edges[0],
        edges[edges.len() - 1],
        spectrum.counts.len()
    );
    info!("Histogram: {:?}", spectrum.counts);
    info!(
        "Total weight in range: {:.4e} ({} photons outside the energy bounds)",
        spectrum.total(),
        spectrum.dropped
    );

    let size = (config.output.width, config.output.height);
    render::render_spectrum(&spectrum, &args.output, size)
        .with_context(|| format!("Failed to render spectrum to '{}'", args.output.display()))?;
    info!("Spectrum saved to {}", args.output.display());

    if let Some(path) = &args.csv {
        write_spectrum_csv(&spectrum, path)?;
        info!("Spectrum table saved to {}", path.display());
    }

    info!("Photon Spectrum Complete.");
    Ok(())
}
