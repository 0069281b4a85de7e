//! SVG diagnostic charts drawn with Plotters.
//!
//! Dates are plotted on a numeric axis (days since the first plotted date)
//! and formatted back to `YYYY-MM-DD` in the tick labels.

use std::error::Error;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::app::pipeline::RunOutput;
use crate::domain::Component;
use crate::error::AppError;

pub const CV_RMSE_FILE: &str = "cv_rmse.svg";
pub const ACTUAL_VS_PREDICTED_FILE: &str = "actual_vs_predicted.svg";
pub const RESIDUALS_FILE: &str = "residuals.svg";
pub const RESIDUAL_HISTOGRAM_FILE: &str = "residual_histogram.svg";
pub const FORECAST_FILE: &str = "forecast.svg";
pub const COMPONENTS_FILE: &str = "components.svg";

pub const HISTOGRAM_BINS: usize = 20;

const CHART_SIZE: (u32, u32) = (1000, 600);
const PANEL_HEIGHT: u32 = 300;

const ACTUAL_COLOR: RGBColor = RGBColor(20, 20, 20);
const FORECAST_COLOR: RGBColor = RGBColor(0, 114, 178);
const TEST_COLOR: RGBColor = RGBColor(213, 94, 0);
const MUTED_COLOR: RGBColor = RGBColor(150, 150, 150);

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;
type DrawResult = Result<(), Box<dyn Error>>;

/// One histogram bar: `[lo, hi)` and how many values fell into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
}

/// Write every chart into `dir` (created if missing) and return the paths written.
///
/// The CV chart is skipped when cross-validation did not run.
pub fn write_charts(dir: &Path, run: &RunOutput) -> Result<Vec<PathBuf>, AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::output(format!("Failed to create plot directory '{}': {e}", dir.display())))?;

    let mut written = Vec::new();
    if !run.cv_rows.is_empty() {
        written.push(render(dir, CV_RMSE_FILE, CHART_SIZE, |root| draw_cv_rmse(root, run))?);
    }
    written.push(render(dir, ACTUAL_VS_PREDICTED_FILE, CHART_SIZE, |root| {
        draw_actual_vs_predicted(root, run)
    })?);
    written.push(render(dir, RESIDUALS_FILE, CHART_SIZE, |root| draw_residuals(root, run))?);
    written.push(render(dir, RESIDUAL_HISTOGRAM_FILE, CHART_SIZE, |root| {
        draw_residual_histogram(root, run)
    })?);
    written.push(render(dir, FORECAST_FILE, CHART_SIZE, |root| draw_forecast(root, run))?);

    let panels = component_panels(run);
    let size = (CHART_SIZE.0, PANEL_HEIGHT * panels.len().max(1) as u32);
    written.push(render(dir, COMPONENTS_FILE, size, |root| draw_components(root, &panels))?);

    tracing::info!(dir = %dir.display(), charts = written.len(), "wrote SVG charts");
    Ok(written)
}

fn render<F>(dir: &Path, file: &str, size: (u32, u32), draw: F) -> Result<PathBuf, AppError>
where
    F: FnOnce(&Area<'_>) -> DrawResult,
{
    let path = dir.join(file);
    let result = {
        let root = SVGBackend::new(&path, size).into_drawing_area();
        root.fill(&WHITE)
            .map_err(Box::<dyn Error>::from)
            .and_then(|_| draw(&root))
            .and_then(|_| root.present().map_err(Box::<dyn Error>::from))
    };
    result.map_err(|e| AppError::output(format!("Failed to draw '{}': {e}", path.display())))?;
    Ok(path)
}

/// Equal-width bins spanning `[min, max]`; the maximum lands in the last bin.
pub fn histogram_bins(values: &[f64], n_bins: usize) -> Vec<HistogramBin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || n_bins == 0 {
        return Vec::new();
    }
    let mut lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if hi - lo < 1e-12 {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / n_bins as f64;
    let mut bins: Vec<HistogramBin> = (0..n_bins)
        .map(|i| HistogramBin {
            lo: lo + i as f64 * width,
            hi: lo + (i + 1) as f64 * width,
            count: 0,
        })
        .collect();
    for v in finite {
        let idx = (((v - lo) / width).floor() as usize).min(n_bins - 1);
        bins[idx].count += 1;
    }
    bins
}

fn draw_cv_rmse(root: &Area<'_>, run: &RunOutput) -> DrawResult {
    let errors: Vec<(f64, f64)> = run
        .cv_rows
        .iter()
        .map(|r| (r.horizon_days() as f64, (r.y - r.yhat).abs()))
        .collect();
    let rmse: Vec<(f64, f64)> = run
        .performance
        .iter()
        .map(|p| (p.horizon_days as f64, p.rmse))
        .collect();

    let (x0, x1) = padded_bounds(errors.iter().map(|p| p.0));
    let (_, y1) = padded_bounds(errors.iter().chain(&rmse).map(|p| p.1));

    let mut chart = ChartBuilder::on(root)
        .caption("Cross-validation error by horizon", ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, 0.0..y1)?;
    chart
        .configure_mesh()
        .x_desc("horizon (days)")
        .y_desc("clicks")
        .draw()?;

    chart
        .draw_series(errors.iter().map(|&p| Circle::new(p, 2, MUTED_COLOR.mix(0.5).filled())))?
        .label("|error| per prediction")
        .legend(|(x, y)| Circle::new((x, y), 3, MUTED_COLOR.filled()));
    chart
        .draw_series(LineSeries::new(rmse.iter().copied(), FORECAST_COLOR.stroke_width(2)))?
        .label("rolling RMSE")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], FORECAST_COLOR));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_actual_vs_predicted(root: &Area<'_>, run: &RunOutput) -> DrawResult {
    let Some(origin) = run.residuals.first().map(|r| r.date) else {
        return Ok(());
    };
    let actual: Vec<(f64, f64)> = run.residuals.iter().map(|r| (day_offset(origin, r.date), r.actual)).collect();
    let predicted: Vec<(f64, f64)> =
        run.residuals.iter().map(|r| (day_offset(origin, r.date), r.predicted)).collect();

    let (x0, x1) = padded_bounds(actual.iter().map(|p| p.0));
    let (y0, y1) = padded_bounds(actual.iter().chain(&predicted).map(|p| p.1));

    let mut chart = ChartBuilder::on(root)
        .caption("Test window: actual vs predicted", ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart
        .configure_mesh()
        .x_desc("date")
        .y_desc("clicks")
        .x_labels(6)
        .x_label_formatter(&|v| date_label(origin, *v))
        .draw()?;

    chart
        .draw_series(LineSeries::new(actual.iter().copied(), ACTUAL_COLOR))?
        .label("actual")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], ACTUAL_COLOR));
    chart.draw_series(actual.iter().map(|&p| Circle::new(p, 2, ACTUAL_COLOR.filled())))?;
    chart
        .draw_series(LineSeries::new(predicted.iter().copied(), FORECAST_COLOR.stroke_width(2)))?
        .label("predicted")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], FORECAST_COLOR));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_residuals(root: &Area<'_>, run: &RunOutput) -> DrawResult {
    let Some(origin) = run.residuals.first().map(|r| r.date) else {
        return Ok(());
    };
    let points: Vec<(f64, f64)> = run
        .residuals
        .iter()
        .map(|r| (day_offset(origin, r.date), r.residual))
        .collect();

    let (x0, x1) = padded_bounds(points.iter().map(|p| p.0));
    let (y0, y1) = padded_bounds(points.iter().map(|p| p.1).chain([0.0]));

    let mut chart = ChartBuilder::on(root)
        .caption("Test residuals (actual - predicted)", ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart
        .configure_mesh()
        .x_desc("date")
        .y_desc("clicks")
        .x_labels(6)
        .x_label_formatter(&|v| date_label(origin, *v))
        .draw()?;

    chart.draw_series(LineSeries::new([(x0, 0.0), (x1, 0.0)], MUTED_COLOR))?;
    chart.draw_series(LineSeries::new(points.iter().copied(), TEST_COLOR.mix(0.6)))?;
    chart.draw_series(points.iter().map(|&p| Circle::new(p, 3, TEST_COLOR.filled())))?;
    Ok(())
}

fn draw_residual_histogram(root: &Area<'_>, run: &RunOutput) -> DrawResult {
    let values: Vec<f64> = run.residuals.iter().map(|r| r.residual).collect();
    let bins = histogram_bins(&values, HISTOGRAM_BINS);
    let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
        return Ok(());
    };
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64;

    let mut chart = ChartBuilder::on(root)
        .caption("Distribution of test residuals", ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(first.lo..last.hi, 0.0..max_count * 1.1)?;
    chart
        .configure_mesh()
        .x_desc("residual (clicks)")
        .y_desc("days")
        .draw()?;

    chart.draw_series(bins.iter().map(|b| {
        Rectangle::new([(b.lo, 0.0), (b.hi, b.count as f64)], FORECAST_COLOR.mix(0.7).filled())
    }))?;
    chart.draw_series(
        bins.iter()
            .map(|b| Rectangle::new([(b.lo, 0.0), (b.hi, b.count as f64)], WHITE.stroke_width(1))),
    )?;
    Ok(())
}

fn draw_forecast(root: &Area<'_>, run: &RunOutput) -> DrawResult {
    let Some(origin) = run.forecast.first().map(|r| r.ds) else {
        return Ok(());
    };
    let yhat: Vec<(f64, f64)> = run.forecast.iter().map(|r| (day_offset(origin, r.ds), r.yhat)).collect();
    let mut band: Vec<(f64, f64)> = run
        .forecast
        .iter()
        .map(|r| (day_offset(origin, r.ds), r.yhat_lower))
        .collect();
    band.extend(run.forecast.iter().rev().map(|r| (day_offset(origin, r.ds), r.yhat_upper)));
    let train: Vec<(f64, f64)> = run.train.iter().map(|o| (day_offset(origin, o.date), o.clicks)).collect();
    let test: Vec<(f64, f64)> = run.test.iter().map(|o| (day_offset(origin, o.date), o.clicks)).collect();

    let (x0, x1) = padded_bounds(yhat.iter().chain(&test).map(|p| p.0));
    let (y0, y1) = padded_bounds(band.iter().chain(&train).chain(&test).map(|p| p.1));

    let mut chart = ChartBuilder::on(root)
        .caption("Forecast", ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart
        .configure_mesh()
        .x_desc("date")
        .y_desc("clicks")
        .x_labels(8)
        .x_label_formatter(&|v| date_label(origin, *v))
        .draw()?;

    chart
        .draw_series(std::iter::once(Polygon::new(band, FORECAST_COLOR.mix(0.2).filled())))?
        .label("interval")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], FORECAST_COLOR.mix(0.2).filled()));
    chart
        .draw_series(train.iter().map(|&p| Circle::new(p, 1, ACTUAL_COLOR.filled())))?
        .label("train (capped)")
        .legend(|(x, y)| Circle::new((x, y), 3, ACTUAL_COLOR.filled()));
    chart
        .draw_series(test.iter().map(|&p| Circle::new(p, 2, TEST_COLOR.filled())))?
        .label("test")
        .legend(|(x, y)| Circle::new((x, y), 3, TEST_COLOR.filled()));
    chart
        .draw_series(LineSeries::new(yhat.iter().copied(), FORECAST_COLOR.stroke_width(2)))?
        .label("yhat")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], FORECAST_COLOR));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// One panel of the components chart.
#[derive(Debug, Clone)]
struct Panel {
    title: &'static str,
    x_desc: &'static str,
    origin: NaiveDate,
    axis: PanelAxis,
    points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelAxis {
    Date,
    Weekday,
    DayOfYear,
}

fn component_panels(run: &RunOutput) -> Vec<Panel> {
    let model = &run.model;
    let mut panels = Vec::new();
    let Some(origin) = run.forecast.first().map(|r| r.ds) else {
        return panels;
    };

    let along_forecast = |component: Component| -> Vec<(f64, f64)> {
        run.forecast
            .iter()
            .map(|r| (day_offset(origin, r.ds), r.component(component)))
            .collect()
    };

    panels.push(Panel {
        title: "trend",
        x_desc: "date",
        origin,
        axis: PanelAxis::Date,
        points: along_forecast(Component::Trend),
    });
    if model.has_component(Component::Holidays) {
        panels.push(Panel {
            title: "holidays",
            x_desc: "date",
            origin,
            axis: PanelAxis::Date,
            points: along_forecast(Component::Holidays),
        });
    }
    if model.has_component(Component::Weekly) {
        let sunday = first_weekday_on_or_after(model.history_start(), Weekday::Sun);
        let dates: Vec<NaiveDate> = (0..7).map(|i| sunday + Duration::days(i)).collect();
        let values = model.component_profile(Component::Weekly, &dates);
        panels.push(Panel {
            title: "weekly",
            x_desc: "day of week",
            origin: sunday,
            axis: PanelAxis::Weekday,
            points: values.into_iter().enumerate().map(|(i, v)| (i as f64, v)).collect(),
        });
    }
    if model.has_component(Component::Yearly) {
        let jan1 = NaiveDate::from_ymd_opt(model.history_start().year(), 1, 1).unwrap_or(model.history_start());
        let dates: Vec<NaiveDate> = (0..365).map(|i| jan1 + Duration::days(i)).collect();
        let values = model.component_profile(Component::Yearly, &dates);
        panels.push(Panel {
            title: "yearly",
            x_desc: "day of year",
            origin: jan1,
            axis: PanelAxis::DayOfYear,
            points: values.into_iter().enumerate().map(|(i, v)| (i as f64, v)).collect(),
        });
    }
    panels
}

fn draw_components(root: &Area<'_>, panels: &[Panel]) -> DrawResult {
    if panels.is_empty() {
        return Ok(());
    }
    for (area, panel) in root.split_evenly((panels.len(), 1)).iter().zip(panels) {
        draw_panel(area, panel)?;
    }
    Ok(())
}

fn draw_panel(area: &Area<'_>, panel: &Panel) -> DrawResult {
    let (x0, x1) = match panel.axis {
        PanelAxis::Weekday => (-0.5, 6.5),
        _ => padded_bounds(panel.points.iter().map(|p| p.0)),
    };
    let (y0, y1) = padded_bounds(panel.points.iter().map(|p| p.1));

    let mut chart = ChartBuilder::on(area)
        .caption(panel.title, ("sans-serif", 18))
        .margin(8)
        .x_label_area_size(35)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    let origin = panel.origin;
    let axis = panel.axis;
    let formatter = move |v: &f64| match axis {
        PanelAxis::Date => date_label(origin, *v),
        PanelAxis::Weekday => weekday_label(*v),
        PanelAxis::DayOfYear => (origin + Duration::days(v.round() as i64)).format("%b %d").to_string(),
    };
    chart
        .configure_mesh()
        .x_desc(panel.x_desc)
        .y_desc("clicks")
        .x_labels(if axis == PanelAxis::Weekday { 7 } else { 8 })
        .x_label_formatter(&formatter)
        .draw()?;

    chart.draw_series(LineSeries::new(panel.points.iter().copied(), FORECAST_COLOR.stroke_width(2)))?;
    if axis == PanelAxis::Weekday {
        chart.draw_series(panel.points.iter().map(|&p| Circle::new(p, 3, FORECAST_COLOR.filled())))?;
    }
    Ok(())
}

fn day_offset(origin: NaiveDate, date: NaiveDate) -> f64 {
    (date - origin).num_days() as f64
}

fn date_label(origin: NaiveDate, x: f64) -> String {
    (origin + Duration::days(x.round() as i64)).format("%Y-%m-%d").to_string()
}

fn weekday_label(x: f64) -> String {
    const NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    let i = x.round();
    if (0.0..7.0).contains(&i) {
        NAMES[i as usize].to_string()
    } else {
        String::new()
    }
}

fn first_weekday_on_or_after(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() as i64 - date.weekday().num_days_from_monday() as i64) % 7;
    date + Duration::days(ahead)
}

/// Min/max of `values` padded by 5% (or by 1 when the span is zero).
fn padded_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let span = hi - lo;
    if span < 1e-12 {
        return (lo - 1.0, hi + 1.0);
    }
    (lo - 0.05 * span, hi + 0.05 * span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_counts_every_value() {
        let values: Vec<f64> = (0..=10).map(f64::from).collect();
        let bins = histogram_bins(&values, 5);
        let counts: Vec<usize> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 2, 2, 2, 3]);
        assert!((bins[0].lo - 0.0).abs() < 1e-12);
        assert!((bins[4].hi - 10.0).abs() < 1e-12);
    }

    #[test]
    fn histogram_of_constant_values() {
        let bins = histogram_bins(&[3.0, 3.0, 3.0], 4);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 3);
        assert!(histogram_bins(&[], 4).is_empty());
    }

    #[test]
    fn padded_bounds_handles_flat_and_empty_input() {
        assert_eq!(padded_bounds([2.0, 2.0].into_iter()), (1.0, 3.0));
        assert_eq!(padded_bounds(std::iter::empty()), (0.0, 1.0));
        let (lo, hi) = padded_bounds([0.0, 10.0].into_iter());
        assert!((lo + 0.5).abs() < 1e-12 && (hi - 10.5).abs() < 1e-12);
    }

    #[test]
    fn weekday_helpers() {
        let wed = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(
            first_weekday_on_or_after(wed, Weekday::Sun),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()
        );
        assert_eq!(first_weekday_on_or_after(wed, Weekday::Wed), wed);
        assert_eq!(weekday_label(0.0), "Sun");
        assert_eq!(weekday_label(6.2), "Sat");
        assert_eq!(weekday_label(-1.0), "");
    }

    #[test]
    fn writes_all_charts_for_a_run() {
        use crate::domain::ForecastConfig;
        use std::io::Write;

        let mut csv = tempfile::NamedTempFile::new().unwrap();
        writeln!(csv, "Date,Clicks").unwrap();
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        for i in 0..200 {
            let date = start + Duration::days(i);
            let weekend = if date.weekday().num_days_from_monday() >= 5 { -10.0 } else { 0.0 };
            writeln!(csv, "{date},{}", 100.0 + 0.1 * i as f64 + weekend).unwrap();
        }

        let mut config = ForecastConfig::for_csv(csv.path());
        config.cv.initial_days = 60;
        config.cv.horizon_days = 20;
        config.model.uncertainty_samples = 50;
        let run = crate::app::pipeline::run_forecast(&config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let written = write_charts(dir.path(), &run).unwrap();
        assert_eq!(written.len(), 6);
        for path in &written {
            let svg = std::fs::read_to_string(path).unwrap();
            assert!(svg.contains("<svg"), "{}", path.display());
        }
    }
}
