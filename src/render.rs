use crate::radiograph::Radiograph;
use anyhow::Result;
use epoch_common::plot::{draw_colorbar, draw_heatmap, draw_outline, Chart2d};
use epoch_common::Histogram2D;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn sci(v: &f64) -> String {
    format!("{:.1e}", v)
}

fn configure_axes(chart: &mut Chart2d<'_, '_>, x_desc: &str, y_desc: &str) -> Result<()> {
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .x_labels(4)
        .y_labels(8)
        .x_label_formatter(&sci)
        .y_label_formatter(&sci)
        .draw()?;
    Ok(())
}

/// Heatmap of one transverse plane with the simulation box and a colorbar.
fn draw_plane(area: &Area<'_>, caption: &str, hist: &Histogram2D, radiograph: &Radiograph) -> Result<()> {
    let frame = &radiograph.frame;
    let (width, _) = area.dim_in_pixel();
    let (map_area, bar_area) = area.split_horizontally(width * 4 / 5);

    let mut chart = ChartBuilder::on(&map_area)
        .caption(caption, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(frame.x_lo..frame.x_hi, frame.y_lo..frame.y_hi)?;
    configure_axes(&mut chart, "x (m)", "y (m)")?;

    let max = hist.max_count();
    draw_heatmap(&mut chart, hist.x_axis().edges(), hist.y_axis().edges(), hist.counts(), max)?;
    draw_outline(&mut chart, &radiograph.sim_box.outline())?;
    draw_colorbar(&bar_area, max)
}

fn draw_side_on(area: &Area<'_>, radiograph: &Radiograph) -> Result<()> {
    let frame = &radiograph.frame;
    let side_on = &radiograph.side_on;
    let (width, _) = area.dim_in_pixel();
    let (map_area, bar_area) = area.split_horizontally(width * 9 / 10);

    // A zero detector distance collapses the sweep onto the source plane.
    let z_hi = if radiograph.params.detector_distance > 0.0 { radiograph.params.detector_distance } else { 1.0 };

    let mut chart = ChartBuilder::on(&map_area)
        .caption("Side-on sweep", ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..z_hi, frame.y_lo..frame.y_hi)?;
    configure_axes(&mut chart, "z (m)", "y (m)")?;

    let max = side_on.max_count();
    draw_heatmap(&mut chart, &side_on.distance_edges, side_on.y_axis.edges(), &side_on.counts, max)?;
    draw_colorbar(&bar_area, max)
}

fn draw_lineout(area: &Area<'_>, radiograph: &Radiograph) -> Result<()> {
    let frame = &radiograph.frame;
    let lineout = &radiograph.lineout;
    let max = lineout.counts().iter().copied().fold(0.0, f64::max);
    let x_hi = if max > 0.0 { max * 1.1 } else { 1.0 };

    let mut chart = ChartBuilder::on(area)
        .caption("Detector lineout", ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..x_hi, frame.y_lo..frame.y_hi)?;
    configure_axes(&mut chart, "weighted count", "y (m)")?;

    let points = lineout.counts().iter().copied().zip(lineout.centers());
    chart.draw_series(LineSeries::new(points, &BLUE))?;
    Ok(())
}

/// Renders the six-column radiograph figure: source plane, side-on sweep
/// (three columns), detector plane and detector lineout.
pub fn render_radiograph(radiograph: &Radiograph, path: &Path, size: (u32, u32)) -> Result<()> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let column = size.0 / 6;
    let (source_area, rest) = root.split_horizontally(column);
    let (side_on_area, rest) = rest.split_horizontally(3 * column);
    let (detector_area, lineout_area) = rest.split_horizontally(column);

    draw_plane(&source_area, "z = 0", &radiograph.source, radiograph)?;
    draw_side_on(&side_on_area, radiograph)?;
    let detector_caption = format!("z = {:.1} mm", radiograph.params.detector_distance * 1e3);
    draw_plane(&detector_area, &detector_caption, &radiograph.detector, radiograph)?;
    draw_lineout(&lineout_area, radiograph)?;

    root.present()?;
    Ok(())
}
