use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Settings for the photon spectrum tool
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SpectrumConfig {
    #[serde(default = "default_energy_min_ev")]
    pub energy_min_ev: f64,
    #[serde(default = "default_energy_max_ev")]
    pub energy_max_ev: f64,
    #[serde(default = "default_spectrum_resolution")]
    pub resolution: usize,
    #[serde(default = "default_species")]
    pub species: String,
    /// Field holding the particle energy in joules.
    #[serde(default = "default_energy_field")]
    pub energy_field: String,
}

// Settings for the synthetic radiograph tool
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RadiographConfig {
    #[serde(default = "default_detector_position_mm")]
    pub detector_position_mm: f64,
    #[serde(default = "default_x_resolution")]
    pub x_resolution: usize,
    #[serde(default = "default_y_resolution")]
    pub y_resolution: usize,
    /// Number of slices in the side-on sweep.
    #[serde(default = "default_detector_resolution")]
    pub detector_resolution: usize,
}

// Rendered image size
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

/// Analysis configuration, loaded from an optional TOML file. Every field
/// has a default, so any subset of sections may be given.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub spectrum: SpectrumConfig,
    #[serde(default)]
    pub radiograph: RadiographConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        SpectrumConfig {
            energy_min_ev: default_energy_min_ev(),
            energy_max_ev: default_energy_max_ev(),
            resolution: default_spectrum_resolution(),
            species: default_species(),
            energy_field: default_energy_field(),
        }
    }
}

impl Default for RadiographConfig {
    fn default() -> Self {
        RadiographConfig {
            detector_position_mm: default_detector_position_mm(),
            x_resolution: default_x_resolution(),
            y_resolution: default_y_resolution(),
            detector_resolution: default_detector_resolution(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig { width: default_width(), height: default_height() }
    }
}

impl AnalysisConfig {
    /// Loads the analysis configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.spectrum;
        if !(s.energy_min_ev > 0.0 && s.energy_max_ev.is_finite()) {
            anyhow::bail!("spectrum energy bounds must be positive and finite.");
        }
        if s.energy_min_ev >= s.energy_max_ev {
            anyhow::bail!("spectrum energy_min_ev must be below energy_max_ev.");
        }
        if s.resolution == 0 {
            anyhow::bail!("spectrum resolution must be greater than 0.");
        }
        let r = &self.radiograph;
        if !(r.detector_position_mm.is_finite() && r.detector_position_mm >= 0.0) {
            anyhow::bail!("detector_position_mm must be finite and non-negative.");
        }
        if r.x_resolution == 0 || r.y_resolution == 0 || r.detector_resolution == 0 {
            anyhow::bail!("radiograph resolutions must be greater than 0.");
        }
        if self.output.width == 0 || self.output.height == 0 {
            anyhow::bail!("output image size must be non-zero.");
        }
        Ok(())
    }
}

fn default_energy_min_ev() -> f64 {
    100.0
}

fn default_energy_max_ev() -> f64 {
    1e6
}

fn default_spectrum_resolution() -> usize {
    100
}

fn default_species() -> String {
    "Photon".to_string()
}

fn default_energy_field() -> String {
    "QED energy".to_string()
}

fn default_detector_position_mm() -> f64 {
    100.0
}

fn default_x_resolution() -> usize {
    200
}

fn default_y_resolution() -> usize {
    1500
}

fn default_detector_resolution() -> usize {
    1000
}

fn default_width() -> u32 {
    1600
}

fn default_height() -> u32 {
    900
}
