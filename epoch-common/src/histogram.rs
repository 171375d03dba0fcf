//! Weighted histograms over equal-width bins.
//!
//! Bins are half-open `[edge[i], edge[i + 1])` except the last one, which
//! also includes the upper edge. Values outside `[lo, hi]` (and NaN) are
//! dropped. Edges are generated the same way for 1D and 2D histograms, so a
//! value always lands in the same bin regardless of which histogram it is
//! filled into.

use crate::error::{AnalysisError, AnalysisResult};

/// `num` evenly spaced samples over `[start, stop]`, with the last sample
/// pinned to `stop`.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut values: Vec<f64> = (0..num).map(|i| i as f64 * step + start).collect();
            values[num - 1] = stop;
            values
        }
    }
}

/// One histogram axis: `bins` equal-width bins over `[lo, hi]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinAxis {
    edges: Vec<f64>,
}

impl BinAxis {
    pub fn new(bins: usize, lo: f64, hi: f64) -> AnalysisResult<Self> {
        if bins == 0 {
            return Err(AnalysisError::domain("histogram needs at least one bin"));
        }
        if !lo.is_finite() || !hi.is_finite() {
            return Err(AnalysisError::domain(format!(
                "histogram range must be finite, got [{}, {}]",
                lo, hi
            )));
        }
        if lo >= hi {
            return Err(AnalysisError::domain(format!(
                "histogram range is empty: lower bound {} is not below upper bound {}",
                lo, hi
            )));
        }
        Ok(BinAxis { edges: linspace(lo, hi, bins + 1) })
    }

    pub fn bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn lo(&self) -> f64 {
        self.edges[0]
    }

    pub fn hi(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Midpoint of every bin.
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Bin holding `value`, or `None` when it falls outside the axis.
    #[inline]
    pub fn index(&self, value: f64) -> Option<usize> {
        let (lo, hi) = (self.lo(), self.hi());
        // Comparisons with NaN are false, so NaN is rejected here too.
        if !(value >= lo && value <= hi) {
            return None;
        }
        let bins = self.bins();
        // Arithmetic guess, then nudge it so the edge comparison is exact.
        let mut idx = (((value - lo) / (hi - lo)) * bins as f64) as usize;
        if idx >= bins {
            idx = bins - 1;
        }
        while idx > 0 && value < self.edges[idx] {
            idx -= 1;
        }
        while idx + 1 < bins && value >= self.edges[idx + 1] {
            idx += 1;
        }
        Some(idx)
    }
}

/// Weighted 1D histogram. `edges().len() == counts().len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram1D {
    axis: BinAxis,
    counts: Vec<f64>,
}

impl Histogram1D {
    /// Creates an empty histogram.
    pub fn new(bins: usize, lo: f64, hi: f64) -> AnalysisResult<Self> {
        let axis = BinAxis::new(bins, lo, hi)?;
        Ok(Histogram1D { counts: vec![0.0; bins], axis })
    }

    /// Builds a histogram of `values`, each contributing its matching weight.
    pub fn from_weighted(
        values: &[f64],
        weights: &[f64],
        bins: usize,
        lo: f64,
        hi: f64,
    ) -> AnalysisResult<Self> {
        if values.len() != weights.len() {
            return Err(AnalysisError::ShapeMismatch {
                field: "weights".to_string(),
                expected: values.len(),
                found: weights.len(),
            });
        }
        let mut hist = Histogram1D::new(bins, lo, hi)?;
        for (&value, &weight) in values.iter().zip(weights) {
            hist.fill(value, weight);
        }
        Ok(hist)
    }

    /// Adds `weight` to the bin holding `value`. Returns `false` if the value
    /// was outside the range and got dropped.
    #[inline]
    pub fn fill(&mut self, value: f64, weight: f64) -> bool {
        match self.axis.index(value) {
            Some(idx) => {
                self.counts[idx] += weight;
                true
            }
            None => false,
        }
    }

    pub fn axis(&self) -> &BinAxis {
        &self.axis
    }

    pub fn edges(&self) -> &[f64] {
        self.axis.edges()
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn into_counts(self) -> Vec<f64> {
        self.counts
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn centers(&self) -> Vec<f64> {
        self.axis.centers()
    }

    /// Sum of all accumulated weights.
    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }
}

/// Weighted 2D histogram stored row-major by x: `counts[ix * ny + iy]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram2D {
    x_axis: BinAxis,
    y_axis: BinAxis,
    counts: Vec<f64>,
}

impl Histogram2D {
    pub fn new(x_axis: BinAxis, y_axis: BinAxis) -> Self {
        let counts = vec![0.0; x_axis.bins() * y_axis.bins()];
        Histogram2D { x_axis, y_axis, counts }
    }

    /// Builds a histogram of the points `(xs[i], ys[i])` weighted by `weights[i]`.
    pub fn from_weighted(
        xs: &[f64],
        ys: &[f64],
        weights: &[f64],
        x_axis: BinAxis,
        y_axis: BinAxis,
    ) -> AnalysisResult<Self> {
        for (field, len) in [("y", ys.len()), ("weights", weights.len())] {
            if len != xs.len() {
                return Err(AnalysisError::ShapeMismatch {
                    field: field.to_string(),
                    expected: xs.len(),
                    found: len,
                });
            }
        }
        let mut hist = Histogram2D::new(x_axis, y_axis);
        for ((&x, &y), &w) in xs.iter().zip(ys).zip(weights) {
            hist.fill(x, y, w);
        }
        Ok(hist)
    }

    #[inline]
    pub fn fill(&mut self, x: f64, y: f64, weight: f64) -> bool {
        match (self.x_axis.index(x), self.y_axis.index(y)) {
            (Some(ix), Some(iy)) => {
                let ny = self.y_axis.bins();
                self.counts[ix * ny + iy] += weight;
                true
            }
            _ => false,
        }
    }

    /// `(nx, ny)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.x_axis.bins(), self.y_axis.bins())
    }

    pub fn get(&self, ix: usize, iy: usize) -> f64 {
        self.counts[ix * self.y_axis.bins() + iy]
    }

    pub fn x_axis(&self) -> &BinAxis {
        &self.x_axis
    }

    pub fn y_axis(&self) -> &BinAxis {
        &self.y_axis
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    pub fn max_count(&self) -> f64 {
        self.counts.iter().copied().fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_pins_both_ends() {
        let v = linspace(-1.0, 2.0, 7);
        assert_eq!(v.len(), 7);
        assert_eq!(v[0], -1.0);
        assert_eq!(v[6], 2.0);
        assert!((v[2] - 0.0).abs() < 1e-15);
    }

    #[test]
    fn edges_have_one_more_entry_than_counts() {
        let h = Histogram1D::new(5, 0.0, 1.0).unwrap();
        assert_eq!(h.edges().len(), h.counts().len() + 1);
        assert_eq!(h.centers().len(), 5);
    }

    #[test]
    fn bins_are_half_open_with_closed_last_bin() {
        let axis = BinAxis::new(4, 0.0, 4.0).unwrap();
        assert_eq!(axis.index(0.0), Some(0));
        assert_eq!(axis.index(1.0), Some(1));
        assert_eq!(axis.index(3.999), Some(3));
        assert_eq!(axis.index(4.0), Some(3));
        assert_eq!(axis.index(4.0001), None);
        assert_eq!(axis.index(-1e-12), None);
        assert_eq!(axis.index(f64::NAN), None);
        assert_eq!(axis.index(f64::INFINITY), None);
    }

    #[test]
    fn index_agrees_with_edges_for_awkward_ranges() {
        let axis = BinAxis::new(1500, -3.7e-5, 8.1e-5).unwrap();
        let edges = axis.edges().to_vec();
        for (i, w) in edges.windows(2).enumerate() {
            assert_eq!(axis.index(w[0]), Some(i));
            let mid = 0.5 * (w[0] + w[1]);
            assert_eq!(axis.index(mid), Some(i));
        }
    }

    #[test]
    fn weighted_fill_drops_out_of_range_values() {
        let values = [0.5, 1.5, 2.5, 10.0, -3.0];
        let weights = [1.0, 2.0, 3.0, 100.0, 100.0];
        let h = Histogram1D::from_weighted(&values, &weights, 3, 0.0, 3.0).unwrap();
        assert_eq!(h.counts(), &[1.0, 2.0, 3.0]);
        assert_eq!(h.total(), 6.0);
    }

    #[test]
    fn invalid_ranges_are_domain_errors() {
        assert!(matches!(Histogram1D::new(0, 0.0, 1.0), Err(AnalysisError::DomainError(_))));
        assert!(matches!(Histogram1D::new(3, 1.0, 1.0), Err(AnalysisError::DomainError(_))));
        assert!(matches!(Histogram1D::new(3, 2.0, 1.0), Err(AnalysisError::DomainError(_))));
        assert!(matches!(
            Histogram1D::new(3, 0.0, f64::INFINITY),
            Err(AnalysisError::DomainError(_))
        ));
    }

    #[test]
    fn mismatched_weights_are_rejected() {
        let err = Histogram1D::from_weighted(&[1.0, 2.0], &[1.0], 2, 0.0, 3.0).unwrap_err();
        assert!(matches!(err, AnalysisError::ShapeMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn histogram_2d_uses_x_major_layout() {
        let x_axis = BinAxis::new(2, 0.0, 2.0).unwrap();
        let y_axis = BinAxis::new(3, 0.0, 3.0).unwrap();
        let h = Histogram2D::from_weighted(
            &[0.5, 1.5, 1.5, 5.0],
            &[2.5, 0.5, 0.5, 0.5],
            &[1.0, 2.0, 0.5, 9.0],
            x_axis,
            y_axis,
        )
        .unwrap();
        assert_eq!(h.shape(), (2, 3));
        assert_eq!(h.get(0, 2), 1.0);
        assert_eq!(h.get(1, 0), 2.5);
        assert_eq!(h.counts()[3], 2.5);
        assert_eq!(h.total(), 3.5);
        assert_eq!(h.max_count(), 2.5);
    }
}
