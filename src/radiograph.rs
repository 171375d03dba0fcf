//! Synthetic radiograph: weighted histograms of a particle species projected
//! onto planes downstream of the simulation.

use crate::ensemble::{ParticleEnsemble, ProjectedPoints};
use crate::grid::{PlotFrame, SimulationBox};
use crate::params::RadiographParams;
use epoch_common::{linspace, AnalysisResult, BinAxis, Histogram1D, Histogram2D};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::time::Instant;

/// Side-on view: one y-histogram per sweep plane, stored slice-major
/// (`counts[slice * ny + iy]`).
#[derive(Debug, Clone, PartialEq)]
pub struct SideOnImage {
    /// Distance of each slice (slice midpoints) from the simulation plane.
    pub distances: Vec<f64>,
    /// Edges of the slices along z, `distances.len() + 1` entries.
    pub distance_edges: Vec<f64>,
    pub y_axis: BinAxis,
    pub counts: Vec<f64>,
}

impl SideOnImage {
    pub fn slices(&self) -> usize {
        self.distances.len()
    }

    pub fn max_count(&self) -> f64 {
        self.counts.iter().copied().fold(0.0, f64::max)
    }
}

/// Everything the radiograph figure shows.
#[derive(Debug, Clone)]
pub struct Radiograph {
    pub params: RadiographParams,
    pub sim_box: SimulationBox,
    pub frame: PlotFrame,
    /// Particles on the simulation plane (z = 0).
    pub source: Histogram2D,
    /// Particles on the detector plane.
    pub detector: Histogram2D,
    pub side_on: SideOnImage,
    /// Detector-plane y histogram integrated over x.
    pub lineout: Histogram1D,
}

/// Weighted 2D histogram of projected points over the frame.
fn plane_histogram(
    plane: &ProjectedPoints,
    weights: &[f64],
    frame: &PlotFrame,
    params: &RadiographParams,
) -> AnalysisResult<Histogram2D> {
    Histogram2D::from_weighted(
        &plane.x,
        &plane.y,
        weights,
        frame.x_axis(params.x_resolution)?,
        frame.y_axis(params.y_resolution)?,
    )
}

/// Projects the ensemble onto each sweep plane and histograms y.
///
/// Slices are independent and run in parallel; `progress` is advanced once
/// per finished slice.
pub fn side_on_sweep(
    ensemble: &ParticleEnsemble,
    frame: &PlotFrame,
    params: &RadiographParams,
    progress: &ProgressBar,
) -> AnalysisResult<SideOnImage> {
    let y_axis = frame.y_axis(params.y_resolution)?;
    let distances = params.sweep_distances();

    let rows = distances
        .par_iter()
        .map(|&distance| -> AnalysisResult<Vec<f64>> {
            let projected = ensemble.project(distance)?;
            let hist = Histogram1D::from_weighted(
                &projected.y,
                &ensemble.weight,
                params.y_resolution,
                frame.y_lo,
                frame.y_hi,
            )?;
            progress.inc(1);
            Ok(hist.into_counts())
        })
        .collect::<AnalysisResult<Vec<_>>>()?;

    Ok(SideOnImage {
        distance_edges: linspace(0.0, params.detector_distance, params.sweep_slices + 1),
        distances,
        y_axis,
        counts: rows.concat(),
    })
}

/// Runs the full radiograph reduction for one species.
pub fn compute_radiograph(
    ensemble: &ParticleEnsemble,
    sim_box: &SimulationBox,
    params: &RadiographParams,
    progress: &ProgressBar,
) -> AnalysisResult<Radiograph> {
    params.validate()?;

    // --- Plane projections and shared frame ---
    let source_plane = ensemble.project(0.0)?;
    let detector_plane = ensemble.project(params.detector_distance)?;
    let frame = PlotFrame::enclosing(sim_box, &[&source_plane, &detector_plane]);
    debug_assert!(frame.contains_box(sim_box));
    debug!("Projected {} particles to z = {:.4e} m", detector_plane.len(), detector_plane.distance);
    info!(
        "Plot frame: x [{:.4e}, {:.4e}] m, y [{:.4e}, {:.4e}] m",
        frame.x_lo, frame.x_hi, frame.y_lo, frame.y_hi
    );

    // --- Plane histograms ---
    let source = plane_histogram(&source_plane, &ensemble.weight, &frame, params)?;
    let detector = plane_histogram(&detector_plane, &ensemble.weight, &frame, params)?;
    let lineout = Histogram1D::from_weighted(
        &detector_plane.y,
        &ensemble.weight,
        params.y_resolution,
        frame.y_lo,
        frame.y_hi,
    )?;

    let binned = detector.total();
    let total = ensemble.total_weight();
    if (total - binned).abs() > 1e-9 * total.abs().max(1.0) {
        warn!(
            "Detector histogram holds weight {:.4e} of {:.4e}; the rest projected to non-finite positions.",
            binned, total
        );
    }

    // --- Side-on sweep ---
    info!(
        "Creating side-on image: {} slices over {:.4e} m...",
        params.sweep_slices, params.detector_distance
    );
    let start_time = Instant::now();
    let side_on = side_on_sweep(ensemble, &frame, params, progress)?;
    debug!(
        "Side-on sweep finished in {:.2?} ({} particles x {} slices)",
        start_time.elapsed(),
        ensemble.len(),
        side_on.slices()
    );

    Ok(Radiograph {
        params: params.clone(),
        sim_box: *sim_box,
        frame,
        source,
        detector,
        side_on,
        lineout,
    })
}

#[cfg(test)]
impl SideOnImage {
    /// Histogram row of one slice.
    fn row(&self, slice: usize) -> &[f64] {
        let ny = self.y_axis.bins();
        &self.counts[slice * ny..(slice + 1) * ny]
    }
}
