use crate::spectrum::Spectrum;
use anyhow::Result;
use log::warn;
use plotters::prelude::*;
use std::path::Path;

/// Log-log plot of weighted count against photon energy. Empty buckets are
/// left out since they have no logarithm.
pub fn render_spectrum(spectrum: &Spectrum, path: &Path, size: (u32, u32)) -> Result<()> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let points = spectrum.nonzero_points();
    let e_lo = spectrum.energies.first().copied().unwrap_or(1.0);
    let e_hi = spectrum.energies.last().copied().unwrap_or(10.0);
    let (e_lo, e_hi) = if e_hi > e_lo { (e_lo, e_hi) } else { (e_lo, e_lo * 10.0) };

    let (count_lo, count_hi) = match points.iter().map(|&(_, c)| c).fold(None, |acc: Option<(f64, f64)>, c| {
        Some(acc.map_or((c, c), |(lo, hi)| (lo.min(c), hi.max(c))))
    }) {
        Some((lo, hi)) if hi > lo => (lo / 2.0, hi * 2.0),
        Some((lo, _)) => (lo / 10.0, lo * 10.0),
        None => {
            warn!("Spectrum has no counts in range; drawing empty axes.");
            (1.0, 10.0)
        }
    };

    let mut chart = ChartBuilder::on(&root)
        .caption("Photon energy spectrum", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d((e_lo..e_hi).log_scale(), (count_lo..count_hi).log_scale())?;

    chart
        .configure_mesh()
        .x_desc("Energy (eV)")
        .y_desc("Weighted count")
        .x_label_formatter(&|v| format!("{:.0e}", v))
        .y_label_formatter(&|v| format!("{:.0e}", v))
        .draw()?;

    chart.draw_series(LineSeries::new(points.iter().copied(), BLACK.stroke_width(2)))?;
    chart.draw_series(points.iter().map(|&p| Circle::new(p, 3, BLACK.filled())))?;

    root.present()?;
    Ok(())
}
