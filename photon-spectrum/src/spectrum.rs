//! Log-binned photon energy spectrum.

use epoch_common::{particle_key, AnalysisError, AnalysisResult, Histogram1D, Snapshot, SpectrumConfig};
use log::{debug, info, warn};

/// Joules per electron-volt, used to convert EPOCH energies to eV.
pub const JOULES_PER_EV: f64 = 1.602e-19;

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumParams {
    pub energy_min_ev: f64,
    pub energy_max_ev: f64,
    /// Number of log-spaced buckets.
    pub resolution: usize,
}

impl SpectrumParams {
    pub fn new(energy_min_ev: f64, energy_max_ev: f64, resolution: usize) -> AnalysisResult<Self> {
        let params = SpectrumParams { energy_min_ev, energy_max_ev, resolution };
        params.validate()?;
        Ok(params)
    }

    pub fn from_config(config: &SpectrumConfig) -> AnalysisResult<Self> {
        Self::new(config.energy_min_ev, config.energy_max_ev, config.resolution)
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        let (lo, hi) = (self.energy_min_ev, self.energy_max_ev);
        if !(lo > 0.0 && hi > 0.0 && lo.is_finite() && hi.is_finite()) {
            return Err(AnalysisError::domain(format!(
                "energy bounds must be positive and finite, got [{}, {}] eV",
                lo, hi
            )));
        }
        if lo >= hi {
            return Err(AnalysisError::domain(format!(
                "minimum energy {} eV must be below maximum energy {} eV",
                lo, hi
            )));
        }
        if self.resolution == 0 {
            return Err(AnalysisError::domain("spectrum resolution must be positive"));
        }
        Ok(())
    }
}

/// Weighted photon counts per log-energy bucket.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Histogram over ln(E / eV).
    pub log_histogram: Histogram1D,
    /// Bucket centres converted back to eV.
    pub energies: Vec<f64>,
    pub counts: Vec<f64>,
    /// Particles whose energy fell outside the bounds.
    pub dropped: usize,
}

impl Spectrum {
    pub fn total(&self) -> f64 {
        self.log_histogram.total()
    }

    /// `(energy, count)` pairs with a non-zero count.
    pub fn nonzero_points(&self) -> Vec<(f64, f64)> {
        self.energies
            .iter()
            .zip(&self.counts)
            .filter(|&(_, &c)| c > 0.0)
            .map(|(&e, &c)| (e, c))
            .collect()
    }
}

/// Histograms `ln(energy)` into `resolution` equal buckets spanning
/// `[ln(min), ln(max)]`, each particle contributing its weight.
///
/// Energies must be strictly positive; those outside the bounds are dropped.
pub fn compute_spectrum(energies_ev: &[f64], weights: &[f64], params: &SpectrumParams) -> AnalysisResult<Spectrum> {
    params.validate()?;
    if energies_ev.len() != weights.len() {
        return Err(AnalysisError::ShapeMismatch {
            field: "weights".to_string(),
            expected: energies_ev.len(),
            found: weights.len(),
        });
    }
    if let Some((idx, &energy)) = energies_ev.iter().enumerate().find(|(_, e)| !(**e > 0.0 && e.is_finite())) {
        return Err(AnalysisError::domain(format!(
            "particle {} has energy {} eV; the log spectrum needs strictly positive energies",
            idx, energy
        )));
    }

    let log_min = params.energy_min_ev.ln();
    let log_max = params.energy_max_ev.ln();
    let mut log_histogram = Histogram1D::new(params.resolution, log_min, log_max)?;
    let mut dropped = 0;
    for (&energy, &weight) in energies_ev.iter().zip(weights) {
        if !log_histogram.fill(energy.ln(), weight) {
            dropped += 1;
        }
    }
    if dropped > 0 {
        warn!(
            "{} of {} particles lie outside [{:e}, {:e}] eV and were dropped.",
            dropped,
            energies_ev.len(),
            params.energy_min_ev,
            params.energy_max_ev
        );
    }

    let energies = log_histogram.centers().into_iter().map(f64::exp).collect();
    let counts = log_histogram.counts().to_vec();
    debug!("Spectrum: ln(E) in [{}, {}], counts {:?}", log_min, log_max, counts);

    Ok(Spectrum { log_histogram, energies, counts, dropped })
}

/// Reads photon energies (converted to eV) and weights for `species`.
pub fn load_photon_data(snapshot: &Snapshot, species: &str, energy_field: &str) -> AnalysisResult<(Vec<f64>, Vec<f64>)> {
    let energies: Vec<f64> = snapshot
        .array(&particle_key(energy_field, species))?
        .iter()
        .map(|e| e / JOULES_PER_EV)
        .collect();
    let weights = snapshot.array(&particle_key("Weight", species))?.to_vec();
    if energies.len() != weights.len() {
        return Err(AnalysisError::ShapeMismatch {
            field: particle_key("Weight", species),
            expected: energies.len(),
            found: weights.len(),
        });
    }
    info!("Loaded {} '{}' particles.", energies.len(), species);
    Ok((energies, weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use epoch_common::Block;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn three_decades_in_two_buckets() {
        let params = SpectrumParams::new(1e2, 1e4, 2).unwrap();
        let spectrum = compute_spectrum(&[1e2, 1e3, 1e4], &[1.0, 1.0, 1.0], &params).unwrap();
        assert_eq!(spectrum.counts.len(), 2);
        assert_eq!(spectrum.total(), 3.0);
        // The lower and upper bounds land in the outer buckets; 1e3 sits on the
        // shared edge and goes to exactly one of them.
        assert!(spectrum.counts.iter().all(|&c| c >= 1.0));
        assert_eq!(spectrum.dropped, 0);
    }

    #[test]
    fn bucket_centres_are_geometric_means_of_edges() {
        let params = SpectrumParams::new(1e2, 1e6, 4).unwrap();
        let spectrum = compute_spectrum(&[], &[], &params).unwrap();
        let expected = [(1e2_f64 * 1e3).sqrt(), (1e3_f64 * 1e4).sqrt(), (1e5_f64 * 1e6).sqrt()];
        assert!((spectrum.energies[0] / expected[0] - 1.0).abs() < 1e-12);
        assert!((spectrum.energies[1] / expected[1] - 1.0).abs() < 1e-12);
        assert!((spectrum.energies[3] / expected[2] - 1.0).abs() < 1e-12);
        assert!(spectrum.counts.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn total_equals_weight_inside_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let energies: Vec<f64> = (0..2000).map(|_| 10f64.powf(rng.random_range(1.0..7.0))).collect();
        let weights: Vec<f64> = (0..2000).map(|_| rng.random_range(0.1..3.0)).collect();
        let params = SpectrumParams::new(1e2, 1e6, 50).unwrap();
        let spectrum = compute_spectrum(&energies, &weights, &params).unwrap();

        let inside: f64 = energies
            .iter()
            .zip(&weights)
            .filter(|&(&e, _)| e.ln() >= params.energy_min_ev.ln() && e.ln() <= params.energy_max_ev.ln())
            .map(|(_, &w)| w)
            .sum();
        assert!((spectrum.total() - inside).abs() < 1e-9 * inside);
        assert!(spectrum.dropped > 0);
    }

    #[test]
    fn non_positive_energy_is_a_domain_error() {
        let params = SpectrumParams::new(1e2, 1e6, 10).unwrap();
        for bad in [0.0, -5.0, f64::NAN] {
            let err = compute_spectrum(&[1e3, bad], &[1.0, 1.0], &params).unwrap_err();
            assert!(matches!(err, AnalysisError::DomainError(_)));
        }
    }

    #[test]
    fn invalid_bounds_are_domain_errors() {
        assert!(matches!(SpectrumParams::new(0.0, 1e6, 10), Err(AnalysisError::DomainError(_))));
        assert!(matches!(SpectrumParams::new(1e6, 1e2, 10), Err(AnalysisError::DomainError(_))));
        assert!(matches!(SpectrumParams::new(1e3, 1e3, 10), Err(AnalysisError::DomainError(_))));
        assert!(matches!(SpectrumParams::new(1e2, 1e6, 0), Err(AnalysisError::DomainError(_))));
    }

    #[test]
    fn mismatched_weights_are_rejected() {
        let params = SpectrumParams::new(1e2, 1e6, 10).unwrap();
        let err = compute_spectrum(&[1e3, 1e4], &[1.0], &params).unwrap_err();
        assert!(matches!(err, AnalysisError::ShapeMismatch { .. }));
    }

    #[test]
    fn nonzero_points_skip_empty_buckets() {
        let params = SpectrumParams::new(1.0, 1e4, 4).unwrap();
        let spectrum = compute_spectrum(&[5.0, 5.0, 5e3], &[1.0, 2.0, 4.0], &params).unwrap();
        let points = spectrum.nonzero_points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].1, 3.0);
        assert_eq!(points[1].1, 4.0);
    }

    #[test]
    fn energies_are_converted_from_joules() {
        let snapshot = Snapshot::new("test", 0, 0.0)
            .with_block(Block::point_variable("Particles/QED energy/Photon", vec![JOULES_PER_EV * 1e3]))
            .with_block(Block::point_variable("Particles/Weight/Photon", vec![2.0]));
        let (energies, weights) = load_photon_data(&snapshot, "Photon", "QED energy").unwrap();
        assert!((energies[0] - 1e3).abs() < 1e-9);
        assert_eq!(weights, vec![2.0]);

        let err = load_photon_data(&snapshot, "Gamma", "QED energy").unwrap_err();
        assert!(matches!(err, AnalysisError::DataNotFound { .. }));
    }
}
