//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - training points: `o`, test points: `x`
//! - forecast: `-` line, interval bounds: `.`
//! - start of the forecast horizon: `|`

use chrono::NaiveDate;

use crate::app::pipeline::RunOutput;
use crate::domain::{ForecastRow, Observation};

const LEGEND: &str = "o train  x test  - yhat  . interval  | forecast start";

/// Render the forecast of a finished run.
pub fn render_forecast_plot(run: &RunOutput, width: usize, height: usize) -> String {
    render_series_plot(&run.train, &run.test, &run.forecast, width, height)
}

/// Render history, held-out points, and forecast rows on one grid.
pub fn render_series_plot(
    train: &[Observation],
    test: &[Observation],
    forecast: &[ForecastRow],
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let all_dates = train
        .iter()
        .chain(test)
        .map(|o| o.date)
        .chain(forecast.iter().map(|r| r.ds));
    let (Some(d_min), Some(d_max)) = (all_dates.clone().min(), all_dates.max()) else {
        return "Plot: (no data)\n".to_string();
    };
    let x_span = ((d_max - d_min).num_days() as f64).max(1.0);
    let x = |d: NaiveDate| (d - d_min).num_days() as f64;

    let yhat: Vec<(f64, f64)> = forecast.iter().map(|r| (x(r.ds), r.yhat)).collect();
    let lower: Vec<(f64, f64)> = forecast.iter().map(|r| (x(r.ds), r.yhat_lower)).collect();
    let upper: Vec<(f64, f64)> = forecast.iter().map(|r| (x(r.ds), r.yhat_upper)).collect();

    let ys = train
        .iter()
        .chain(test)
        .map(|o| o.clicks)
        .chain(forecast.iter().flat_map(|r| [r.yhat, r.yhat_lower, r.yhat_upper]));
    let (y_min, y_max) = y_range(ys).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Lines only claim empty cells, so draw order sets precedence.
    draw_curve(&mut grid, &yhat, x_span, y_min, y_max, '-');
    draw_curve(&mut grid, &lower, x_span, y_min, y_max, '.');
    draw_curve(&mut grid, &upper, x_span, y_min, y_max, '.');

    let last_train = train.last().map(|o| o.date);
    if let Some(start) = forecast.iter().map(|r| r.ds).find(|&d| last_train.is_some_and(|t| d > t)) {
        let col = map_x(x(start), x_span, width);
        draw_line(&mut grid, col, 0, col, height - 1, '|');
    }

    for (obs, ch) in train.iter().map(|o| (o, 'o')).chain(test.iter().map(|o| (o, 'x'))) {
        let col = map_x(x(obs.date), x_span, width);
        let row = map_y(obs.clicks, y_min, y_max, height);
        grid[row][col] = ch;
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: dates=[{d_min}, {d_max}] | clicks=[{y_min:.2}, {y_max:.2}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out.push_str(LEGEND);
    out.push('\n');

    out
}

fn y_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for y in values.filter(|y| y.is_finite()) {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else if min_y.is_finite() {
        Some((min_y - 0.5, min_y + 0.5))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_span: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = (x / x_span).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_span: f64, y_min: f64, y_max: f64, ch: char) {
    if curve.is_empty() {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        if !y.is_finite() {
            continue;
        }
        let col = map_x(x, x_span, width);
        let row = map_y(y, y_min, y_max, height);
        match prev {
            Some((c0, r0)) => draw_line(grid, c0, r0, col, row, ch),
            None => draw_line(grid, col, row, col, row, ch),
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish). Only empty cells are written.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
