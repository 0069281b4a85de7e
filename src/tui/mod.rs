//! Ratatui-based terminal UI.
//!
//! `clickcast view` runs the forecasting pipeline once, then shows the results
//! as chart tabs (forecast, test window, residuals, CV RMSE) under a metrics
//! header.

use std::io;
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use plotters::style::RGBColor;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
};

use crate::app::pipeline::{RunOutput, run_forecast};
use crate::domain::ForecastConfig;
use crate::error::AppError;

mod plotters_chart;

use plotters_chart::{ChartSeries, SeriesChart, SeriesKind};

const YHAT_COLOR: RGBColor = RGBColor(0, 255, 255);
const BAND_COLOR: RGBColor = RGBColor(90, 90, 140);
const ACTUAL_COLOR: RGBColor = RGBColor(255, 255, 255);
const TEST_COLOR: RGBColor = RGBColor(255, 80, 80);
const RESIDUAL_COLOR: RGBColor = RGBColor(255, 220, 0);
const MUTED_COLOR: RGBColor = RGBColor(120, 120, 120);

/// Run the forecast and start the TUI.
pub fn run(config: ForecastConfig) -> Result<(), AppError> {
    // Fit before taking over the terminal so errors print normally.
    let output = run_forecast(&config)?;

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::output(format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(config, output);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::output(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::output(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Chart tabs, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChartTab {
    Forecast,
    TestWindow,
    Residuals,
    CvRmse,
}

impl ChartTab {
    const ALL: [ChartTab; 4] = [
        ChartTab::Forecast,
        ChartTab::TestWindow,
        ChartTab::Residuals,
        ChartTab::CvRmse,
    ];

    fn title(self) -> &'static str {
        match self {
            ChartTab::Forecast => "Forecast",
            ChartTab::TestWindow => "Test window",
            ChartTab::Residuals => "Residuals",
            ChartTab::CvRmse => "CV RMSE",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|&t| t == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// How x values map back to labels.
#[derive(Debug, Clone, Copy)]
enum XAxis {
    /// Days since `origin`.
    Date(NaiveDate),
    HorizonDays,
}

impl XAxis {
    fn format(self, v: f64) -> String {
        match self {
            XAxis::Date(origin) => (origin + chrono::Duration::days(v.round() as i64))
                .format("%m-%d")
                .to_string(),
            XAxis::HorizonDays => format!("{v:.0}d"),
        }
    }
}

/// Everything needed to draw one tab.
struct ChartData {
    series: Vec<ChartSeries>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    x_axis: XAxis,
    x_label: &'static str,
    y_label: &'static str,
}

struct App {
    config: ForecastConfig,
    run: RunOutput,
    tab: ChartTab,
}

impl App {
    fn new(config: ForecastConfig, run: RunOutput) -> Self {
        Self {
            config,
            run,
            tab: ChartTab::Forecast,
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::output(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::output(format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::output(format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the app should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Right | KeyCode::Tab => self.tab = self.tab.next(),
            KeyCode::Left | KeyCode::BackTab => self.tab = self.tab.prev(),
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                self.tab = ChartTab::ALL[idx];
            }
            _ => {}
        }
        false
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_tabs(frame, chunks[1]);
        self.draw_chart(frame, chunks[2]);
        self.draw_footer(frame, chunks[3]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let run = &self.run;
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("clickcast", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" - {}", self.config.csv_path.display())),
        ]));

        lines.push(Line::from(Span::styled(
            format!(
                "rows: {} | train: {} | test: {} | threshold: {:.1} (capped {}) | holidays: {}",
                run.ingest.rows_used(),
                run.train.len(),
                run.test.len(),
                run.spikes.threshold,
                run.capped_rows,
                run.holidays.len(),
            ),
            Style::default().fg(Color::Gray),
        )));

        let mape = run
            .accuracy
            .mape
            .map(|m| format!("{m:.2}%"))
            .unwrap_or_else(|| "n/a".to_string());
        let cv = match run.performance.last() {
            Some(p) => format!("CV rmse@{}d={:.2} coverage={:.0}%", p.horizon_days, p.rmse, 100.0 * p.coverage),
            None => "CV skipped".to_string(),
        };
        lines.push(Line::from(Span::styled(
            format!(
                "test MAE={:.2} | RMSE={:.2} | MAPE={mape} | {cv}",
                run.accuracy.mae, run.accuracy.rmse
            ),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_tabs(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let titles: Vec<Line> = ChartTab::ALL
            .iter()
            .enumerate()
            .map(|(i, t)| Line::from(format!("{} {}", i + 1, t.title())))
            .collect();
        let tabs = Tabs::new(titles)
            .select(self.tab.index())
            .block(Block::default().borders(Borders::ALL))
            .style(Style::default().fg(Color::Gray))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White));
        frame.render_widget(tabs, area);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title(self.tab.title()).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(data) = chart_data(&self.run, self.tab) else {
            let msg = Paragraph::new("Nothing to show (cross-validation was skipped or the table is empty).")
                .style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        };

        let x_axis = data.x_axis;
        let fmt_x = move |v: f64| x_axis.format(v);
        let (chart_rect, insets) = chart_layout(inner);
        let widget = SeriesChart {
            series: &data.series,
            x_bounds: data.x_bounds,
            y_bounds: data.y_bounds,
            x_label: data.x_label,
            y_label: data.y_label,
            fmt_x: &fmt_x,
            fmt_y: fmt_axis_y,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, &data);
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "←/→ or Tab switch chart  1-4 jump  q quit";
        let line = Line::from(vec![Span::styled(help, Style::default().fg(Color::Gray))]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Build the series and bounds for one tab (`None` when there is nothing to plot).
fn chart_data(run: &RunOutput, tab: ChartTab) -> Option<ChartData> {
    let day = |origin: NaiveDate, d: NaiveDate| (d - origin).num_days() as f64;

    let (series, x_axis, x_label, y_label) = match tab {
        ChartTab::Forecast => {
            let origin = run.forecast.first()?.ds;
            let series = vec![
                line(run.forecast.iter().map(|r| (day(origin, r.ds), r.yhat_lower)), BAND_COLOR),
                line(run.forecast.iter().map(|r| (day(origin, r.ds), r.yhat_upper)), BAND_COLOR),
                dots(run.train.iter().map(|o| (day(origin, o.date), o.clicks)), ACTUAL_COLOR),
                dots(run.test.iter().map(|o| (day(origin, o.date), o.clicks)), TEST_COLOR),
                line(run.forecast.iter().map(|r| (day(origin, r.ds), r.yhat)), YHAT_COLOR),
            ];
            (series, XAxis::Date(origin), "date", "clicks")
        }
        ChartTab::TestWindow => {
            let origin = run.residuals.first()?.date;
            let series = vec![
                line(run.residuals.iter().map(|r| (day(origin, r.date), r.actual)), ACTUAL_COLOR),
                dots(run.residuals.iter().map(|r| (day(origin, r.date), r.actual)), ACTUAL_COLOR),
                line(run.residuals.iter().map(|r| (day(origin, r.date), r.predicted)), YHAT_COLOR),
            ];
            (series, XAxis::Date(origin), "date", "clicks")
        }
        ChartTab::Residuals => {
            let origin = run.residuals.first()?.date;
            let last = day(origin, run.residuals.last()?.date);
            let series = vec![
                line([(0.0, 0.0), (last, 0.0)].into_iter(), MUTED_COLOR),
                line(run.residuals.iter().map(|r| (day(origin, r.date), r.residual)), RESIDUAL_COLOR),
                dots(run.residuals.iter().map(|r| (day(origin, r.date), r.residual)), RESIDUAL_COLOR),
            ];
            (series, XAxis::Date(origin), "date", "residual")
        }
        ChartTab::CvRmse => {
            if run.cv_rows.is_empty() {
                return None;
            }
            let series = vec![
                dots(
                    run.cv_rows.iter().map(|r| (r.horizon_days() as f64, (r.y - r.yhat).abs())),
                    MUTED_COLOR,
                ),
                line(run.performance.iter().map(|p| (p.horizon_days as f64, p.rmse)), YHAT_COLOR),
            ];
            (series, XAxis::HorizonDays, "horizon", "clicks")
        }
    };

    let x_bounds = bounds(series.iter().flat_map(|s| s.points.iter().map(|p| p.0)), 0.0)?;
    let y_bounds = bounds(series.iter().flat_map(|s| s.points.iter().map(|p| p.1)), 0.05)?;

    Some(ChartData {
        series,
        x_bounds,
        y_bounds,
        x_axis,
        x_label,
        y_label,
    })
}

fn line(points: impl Iterator<Item = (f64, f64)>, color: RGBColor) -> ChartSeries {
    ChartSeries {
        points: points.collect(),
        color,
        kind: SeriesKind::Line,
    }
}

fn dots(points: impl Iterator<Item = (f64, f64)>, color: RGBColor) -> ChartSeries {
    ChartSeries {
        points: points.collect(),
        color,
        kind: SeriesKind::Dots,
    }
}

/// Min/max of finite values, padded by `pad` of the span; flat ranges are widened by 1.
fn bounds(values: impl Iterator<Item = f64>, pad: f64) -> Option<[f64; 2]> {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return None;
    }
    if hi - lo < 1e-12 {
        return Some([lo - 1.0, hi + 1.0]);
    }
    let p = (hi - lo) * pad;
    Some([lo - p, hi + p])
}

fn fmt_axis_y(v: f64) -> String {
    format!("{v:.0}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(frame: &mut ratatui::Frame<'_>, inner: Rect, chart: Rect, insets: AxisInsets, data: &ChartData) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);
    let [x0, x1] = data.x_bounds;
    let [y0, y1] = data.y_bounds;

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = data.x_axis.format(x0 + u * (x1 - x0));
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label_len = label.len() as u16;
        let start = x.saturating_sub(label_len / 2);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = fmt_axis_y(y0 + u * (y1 - y0));
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new(data.x_label)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new(data.y_label).style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
