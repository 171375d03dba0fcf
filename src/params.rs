use epoch_common::{AnalysisError, AnalysisResult, RadiographConfig};

/// Millimetres to metres, for the detector position given on the command line.
pub const MM_TO_M: f64 = 1e-3;

/// Radiograph parameters resolved from the command line and configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiographParams {
    /// Distance from the simulation plane to the detector plane (m).
    pub detector_distance: f64,
    pub x_resolution: usize,
    pub y_resolution: usize,
    /// Number of planes in the side-on sweep.
    pub sweep_slices: usize,
}

impl RadiographParams {
    pub fn new(
        detector_distance: f64,
        x_resolution: usize,
        y_resolution: usize,
        sweep_slices: usize,
    ) -> AnalysisResult<Self> {
        let params = RadiographParams { detector_distance, x_resolution, y_resolution, sweep_slices };
        params.validate()?;
        Ok(params)
    }

    /// Builds parameters from config values, converting the detector position to metres.
    pub fn from_config(config: &RadiographConfig) -> AnalysisResult<Self> {
        Self::new(
            config.detector_position_mm * MM_TO_M,
            config.x_resolution,
            config.y_resolution,
            config.detector_resolution,
        )
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.detector_distance.is_finite() && self.detector_distance >= 0.0) {
            return Err(AnalysisError::domain(format!(
                "detector distance must be finite and non-negative, got {}",
                self.detector_distance
            )));
        }
        if self.x_resolution == 0 || self.y_resolution == 0 || self.sweep_slices == 0 {
            return Err(AnalysisError::domain(format!(
                "resolutions must be positive (x: {}, y: {}, sweep: {})",
                self.x_resolution, self.y_resolution, self.sweep_slices
            )));
        }
        Ok(())
    }

    /// Midpoints of `sweep_slices` equal slices of `[0, detector_distance]`.
    pub fn sweep_distances(&self) -> Vec<f64> {
        let step = self.detector_distance / self.sweep_slices as f64;
        epoch_common::linspace(0.0, self.detector_distance, self.sweep_slices + 1)
            .into_iter()
            .take(self.sweep_slices)
            .map(|z| z + 0.5 * step)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_convert_millimetres() {
        let params = RadiographParams::from_config(&RadiographConfig::default()).unwrap();
        assert!((params.detector_distance - 0.1).abs() < 1e-15);
        assert_eq!((params.x_resolution, params.y_resolution, params.sweep_slices), (200, 1500, 1000));
    }

    #[test]
    fn sweep_uses_slice_midpoints() {
        let params = RadiographParams::new(1.0, 1, 1, 4).unwrap();
        assert_eq!(params.sweep_distances(), vec![0.125, 0.375, 0.625, 0.875]);
    }

    #[test]
    fn sweep_at_zero_distance_stays_on_source_plane() {
        let params = RadiographParams::new(0.0, 1, 1, 3).unwrap();
        assert_eq!(params.sweep_distances(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn invalid_values_are_domain_errors() {
        assert!(matches!(RadiographParams::new(-1.0, 1, 1, 1), Err(AnalysisError::DomainError(_))));
        assert!(matches!(RadiographParams::new(f64::NAN, 1, 1, 1), Err(AnalysisError::DomainError(_))));
        assert!(matches!(RadiographParams::new(1.0, 0, 1, 1), Err(AnalysisError::DomainError(_))));
        assert!(matches!(RadiographParams::new(1.0, 1, 1, 0), Err(AnalysisError::DomainError(_))));
    }
}
