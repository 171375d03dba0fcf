use crate::ensemble::ProjectedPoints;
use epoch_common::{AnalysisError, AnalysisResult, BinAxis, Snapshot, GRID_KEY};

/// Fraction of the frame span added on each side of the radiograph panels.
pub const FRAME_PADDING: f64 = 0.1;

/// Transverse extent of the simulation box, from the first and last grid node
/// along x and y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl SimulationBox {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> AnalysisResult<Self> {
        let finite = [x_min, x_max, y_min, y_max].iter().all(|v| v.is_finite());
        if !finite || x_min >= x_max || y_min >= y_max {
            return Err(AnalysisError::domain(format!(
                "simulation box [{}, {}] x [{}, {}] is empty or not finite",
                x_min, x_max, y_min, y_max
            )));
        }
        Ok(SimulationBox { x_min, x_max, y_min, y_max })
    }

    /// Builds the box from grid node coordinates along x and y.
    pub fn from_axes(x_grid: &[f64], y_grid: &[f64]) -> AnalysisResult<Self> {
        if x_grid.len() < 2 || y_grid.len() < 2 {
            return Err(AnalysisError::domain(format!(
                "grid needs at least two nodes per axis, got {} x {}",
                x_grid.len(),
                y_grid.len()
            )));
        }
        Self::new(x_grid[0], x_grid[x_grid.len() - 1], y_grid[0], y_grid[y_grid.len() - 1])
    }

    /// Reads the box from the snapshot's simulation grid.
    pub fn from_snapshot(snapshot: &Snapshot) -> AnalysisResult<Self> {
        Self::from_axes(snapshot.mesh_axis(GRID_KEY, 0)?, snapshot.mesh_axis(GRID_KEY, 1)?)
    }

    /// Corner points of the box as a closed path.
    pub fn outline(&self) -> [(f64, f64); 5] {
        [
            (self.x_min, self.y_min),
            (self.x_max, self.y_min),
            (self.x_max, self.y_max),
            (self.x_min, self.y_max),
            (self.x_min, self.y_min),
        ]
    }
}

/// Shared x/y range of all radiograph panels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotFrame {
    pub x_lo: f64,
    pub x_hi: f64,
    pub y_lo: f64,
    pub y_hi: f64,
}

impl PlotFrame {
    /// Smallest frame holding the simulation box and every finite projected
    /// point at each of `planes`, padded by [`FRAME_PADDING`] of its span on
    /// every side.
    pub fn enclosing(sim_box: &SimulationBox, planes: &[&ProjectedPoints]) -> Self {
        let (mut x_lo, mut x_hi) = (sim_box.x_min, sim_box.x_max);
        let (mut y_lo, mut y_hi) = (sim_box.y_min, sim_box.y_max);
        for plane in planes {
            if let Some((lo, hi)) = plane.x_extent() {
                x_lo = x_lo.min(lo);
                x_hi = x_hi.max(hi);
            }
            if let Some((lo, hi)) = plane.y_extent() {
                y_lo = y_lo.min(lo);
                y_hi = y_hi.max(hi);
            }
        }
        let x_pad = FRAME_PADDING * (x_hi - x_lo);
        let y_pad = FRAME_PADDING * (y_hi - y_lo);
        PlotFrame { x_lo: x_lo - x_pad, x_hi: x_hi + x_pad, y_lo: y_lo - y_pad, y_hi: y_hi + y_pad }
    }

    pub fn x_axis(&self, bins: usize) -> AnalysisResult<BinAxis> {
        BinAxis::new(bins, self.x_lo, self.x_hi)
    }

    pub fn y_axis(&self, bins: usize) -> AnalysisResult<BinAxis> {
        BinAxis::new(bins, self.y_lo, self.y_hi)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_lo && x <= self.x_hi && y >= self.y_lo && y <= self.y_hi
    }

    pub fn contains_box(&self, sim_box: &SimulationBox) -> bool {
        sim_box.outline().iter().all(|&(x, y)| self.contains(x, y))
    }
}
