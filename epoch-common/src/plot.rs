//! Plotting helpers shared by the analysis binaries.

use anyhow::Result;
use palette::{FromColor, Hsv, Srgb};
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::element::DashedPathElement;
use plotters::prelude::*;

/// Chart with linear f64 axes drawn into a bitmap.
pub type Chart2d<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Maps `t` in `[0, 1]` to a colour running from dark violet through blue,
/// green and yellow to red. Values outside the range are clamped.
pub fn heat_color(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) as f32 } else { 0.0 };
    let hsv = Hsv::new(270.0 * (1.0 - t), 0.85, 0.25 + 0.75 * t.sqrt());
    let rgb = Srgb::from_color(hsv);
    RGBColor(
        (rgb.red * 255.0).round() as u8,
        (rgb.green * 255.0).round() as u8,
        (rgb.blue * 255.0).round() as u8,
    )
}

/// Draws a binned image. `values` is x-major: `values[ix * ny + iy]`, with
/// `nx = x_edges.len() - 1` and `ny = y_edges.len() - 1`.
///
/// Empty bins keep the background colour of the plotting area, which is
/// filled with the bottom of the colour scale.
pub fn draw_heatmap(
    chart: &mut Chart2d<'_, '_>,
    x_edges: &[f64],
    y_edges: &[f64],
    values: &[f64],
    max: f64,
) -> Result<()> {
    let nx = x_edges.len().saturating_sub(1);
    let ny = y_edges.len().saturating_sub(1);
    if values.len() != nx * ny {
        anyhow::bail!("heatmap has {} values for a {}x{} grid", values.len(), nx, ny);
    }
    chart.plotting_area().fill(&heat_color(0.0))?;
    if max <= 0.0 {
        return Ok(());
    }

    let cells = (0..nx).flat_map(|ix| (0..ny).map(move |iy| (ix, iy))).filter_map(|(ix, iy)| {
        let value = values[ix * ny + iy];
        (value > 0.0).then(|| {
            Rectangle::new(
                [(x_edges[ix], y_edges[iy]), (x_edges[ix + 1], y_edges[iy + 1])],
                heat_color(value / max).filled(),
            )
        })
    });
    chart.draw_series(cells)?;
    Ok(())
}

/// Draws a dashed closed polyline, e.g. the simulation box.
pub fn draw_outline(chart: &mut Chart2d<'_, '_>, points: &[(f64, f64)]) -> Result<()> {
    let dashed = DashedPathElement::new(points.iter().copied(), 8, 5, BLACK.stroke_width(2));
    chart.draw_series(std::iter::once(dashed))?;
    Ok(())
}

/// Vertical colour scale from zero to `max`.
pub fn draw_colorbar(area: &DrawingArea<BitMapBackend<'_>, Shift>, max: f64) -> Result<()> {
    const STEPS: usize = 100;
    let top = if max > 0.0 { max } else { 1.0 };

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..1.0, 0.0..top)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(0)
        .y_label_formatter(&|v| format!("{:.2e}", v))
        .draw()?;

    chart.draw_series((0..STEPS).map(|i| {
        let lo = top * i as f64 / STEPS as f64;
        let hi = top * (i + 1) as f64 / STEPS as f64;
        Rectangle::new([(0.0, lo), (1.0, hi)], heat_color(i as f64 / (STEPS - 1) as f64).filled())
    }))?;
    Ok(())
}
