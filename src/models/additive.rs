//! Decomposable additive forecasting model.
//!
//! ```text
//! y(t) = trend(t) + yearly(t) + weekly(t) + holidays(t) + ε
//! ```
//!
//! The fitter relies on two primitive operations, mirroring a regression
//! model with a fixed design:
//! - build a design row for a date (for the penalised least-squares fit)
//! - split a prediction back into its components (for output and plots)
//!
//! Coefficients get Gaussian priors expressed as ridge penalties
//! `λ = σ_ref² / scale²`, so a larger prior scale means a weaker penalty.

use std::ops::Range;

use chrono::{Duration, NaiveDate};
use nalgebra::{DMatrix, DVector};

use crate::domain::{Component, ForecastRow, ModelConfig, Observation};
use crate::error::AppError;
use crate::math::{epoch_days, fill_fourier_row, solve_ridge};
use crate::models::trend::{piecewise_linear, select_changepoints};
use crate::models::uncertainty::{IntervalInputs, TrendParams, sample_intervals};
use crate::prep::holidays::{HolidayFeature, active_features, holiday_features};

pub const YEARLY_PERIOD: f64 = 365.25;
pub const WEEKLY_PERIOD: f64 = 7.0;

/// Assumed observation noise (scaled units) used to turn prior scales into penalties.
const REFERENCE_NOISE_SD: f64 = 0.1;

/// Prior scale of the base slope and offset.
const BASE_TREND_PRIOR_SCALE: f64 = 5.0;

/// Column layout of the design matrix.
#[derive(Debug, Clone)]
pub struct DesignLayout {
    /// Intercept `m` and slope `k` occupy columns 0 and 1.
    pub changepoints: Range<usize>,
    pub yearly: Option<Range<usize>>,
    pub weekly: Option<Range<usize>>,
    pub holidays: Range<usize>,
    pub n_cols: usize,
}

impl DesignLayout {
    fn new(config: &ModelConfig, n_changepoints: usize, n_holidays: usize) -> Self {
        let mut next = 2;
        let mut block = |width: usize| {
            let r = next..next + width;
            next += width;
            r
        };

        let changepoints = block(n_changepoints);
        let yearly = (config.yearly_seasonality && config.yearly_order > 0)
            .then(|| block(2 * config.yearly_order));
        let weekly = (config.weekly_seasonality && config.weekly_order > 0)
            .then(|| block(2 * config.weekly_order));
        let holidays = block(n_holidays);

        Self {
            changepoints,
            yearly,
            weekly,
            holidays,
            n_cols: next,
        }
    }

    fn penalties(&self, config: &ModelConfig) -> Vec<f64> {
        let lambda = |scale: f64| (REFERENCE_NOISE_SD * REFERENCE_NOISE_SD) / (scale * scale);
        let mut out = vec![0.0; self.n_cols];
        out[0] = lambda(BASE_TREND_PRIOR_SCALE);
        out[1] = lambda(BASE_TREND_PRIOR_SCALE);
        for i in self.changepoints.clone() {
            out[i] = lambda(config.changepoint_prior_scale);
        }
        for range in [&self.yearly, &self.weekly].into_iter().flatten() {
            for i in range.clone() {
                out[i] = lambda(config.seasonality_prior_scale);
            }
        }
        for i in self.holidays.clone() {
            out[i] = lambda(config.holidays_prior_scale);
        }
        out
    }
}

/// A fitted additive model.
#[derive(Debug, Clone)]
pub struct FittedModel {
    config: ModelConfig,
    start: NaiveDate,
    history_end: NaiveDate,
    /// History span in days (time is scaled to `[0, 1]` over it).
    t_scale: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    holidays: Vec<HolidayFeature>,
    layout: DesignLayout,
    beta: Vec<f64>,
    sigma_obs: f64,
    history_dates: Vec<NaiveDate>,
}

/// Fit the model to a history sorted by date.
pub fn fit(config: &ModelConfig, history: &[Observation]) -> Result<FittedModel, AppError> {
    validate_config(config)?;
    if history.len() < 2 {
        return Err(AppError::data(format!(
            "Model needs at least 2 rows to fit, got {}.",
            history.len()
        )));
    }

    let start = history[0].date;
    let history_end = history[history.len() - 1].date;
    let t_scale = (history_end - start).num_days() as f64;
    if t_scale <= 0.0 {
        return Err(AppError::data("History spans a single day; cannot scale time."));
    }

    let y_scale = history.iter().map(|o| o.clicks.abs()).fold(0.0, f64::max);
    let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

    let dates: Vec<NaiveDate> = history.iter().map(|o| o.date).collect();
    let t: Vec<f64> = dates.iter().map(|&d| (d - start).num_days() as f64 / t_scale).collect();
    let changepoints = select_changepoints(&t, config.n_changepoints, config.changepoint_range);
    let holidays = active_features(holiday_features(&config.holidays), &dates);
    let layout = DesignLayout::new(config, changepoints.len(), holidays.len());

    let mut model = FittedModel {
        config: config.clone(),
        start,
        history_end,
        t_scale,
        y_scale,
        changepoints,
        holidays,
        layout,
        beta: Vec::new(),
        sigma_obs: 0.0,
        history_dates: dates,
    };

    let p = model.layout.n_cols;
    let n = history.len();
    let mut x = DMatrix::<f64>::zeros(n, p);
    let mut row = vec![0.0; p];
    for (i, &date) in model.history_dates.iter().enumerate() {
        model.fill_design_row(date, &mut row);
        for (j, &v) in row.iter().enumerate() {
            x[(i, j)] = v;
        }
    }
    let y = DVector::from_iterator(n, history.iter().map(|o| o.clicks / y_scale));

    let penalties = model.layout.penalties(config);
    let beta = solve_ridge(&x, &y, &penalties).ok_or_else(|| {
        AppError::output("Least-squares solve failed for the additive model (ill-conditioned design).")
    })?;

    let fitted = &x * &beta;
    let sse: f64 = y.iter().zip(fitted.iter()).map(|(a, b)| (a - b).powi(2)).sum();
    model.sigma_obs = (sse / n as f64).sqrt();
    model.beta = beta.iter().copied().collect();

    tracing::debug!(
        rows = n,
        columns = p,
        changepoints = model.changepoints.len(),
        holiday_columns = model.holidays.len(),
        sigma_obs = model.sigma_obs * y_scale,
        "fitted additive model"
    );

    Ok(model)
}

fn validate_config(config: &ModelConfig) -> Result<(), AppError> {
    if !(0.0..=1.0).contains(&config.changepoint_range) {
        return Err(AppError::input(format!(
            "Changepoint range must be in [0, 1], got {}.",
            config.changepoint_range
        )));
    }
    for (name, scale) in [
        ("changepoint", config.changepoint_prior_scale),
        ("seasonality", config.seasonality_prior_scale),
        ("holidays", config.holidays_prior_scale),
    ] {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(AppError::input(format!(
                "The {name} prior scale must be finite and > 0, got {scale}."
            )));
        }
    }
    if !(config.interval_width > 0.0 && config.interval_width < 1.0) {
        return Err(AppError::input(format!(
            "Interval width must be in (0, 1), got {}.",
            config.interval_width
        )));
    }
    Ok(())
}

impl FittedModel {
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn history_start(&self) -> NaiveDate {
        self.start
    }

    pub fn history_end(&self) -> NaiveDate {
        self.history_end
    }

    pub fn n_history(&self) -> usize {
        self.history_dates.len()
    }

    pub fn layout(&self) -> &DesignLayout {
        &self.layout
    }

    /// In-sample residual scale, in clicks.
    pub fn sigma_obs(&self) -> f64 {
        self.sigma_obs * self.y_scale
    }

    /// Potential changepoint dates.
    pub fn changepoint_dates(&self) -> Vec<NaiveDate> {
        self.changepoints
            .iter()
            .map(|&t| self.start + Duration::days((t * self.t_scale).round() as i64))
            .collect()
    }

    /// Labels of the holiday indicator columns (e.g. `spike_+1`).
    pub fn holiday_labels(&self) -> Vec<String> {
        self.holidays.iter().map(HolidayFeature::label).collect()
    }

    /// Daily dates following the history (optionally preceded by the history dates).
    pub fn make_future_dates(&self, periods: usize, include_history: bool) -> Vec<NaiveDate> {
        let mut out = Vec::with_capacity(periods + self.history_dates.len());
        if include_history {
            out.extend_from_slice(&self.history_dates);
        }
        out.extend((1..=periods as i64).map(|d| self.history_end + Duration::days(d)));
        out
    }

    /// Predict every date, with component breakdown and uncertainty bounds.
    pub fn predict(&self, dates: &[NaiveDate]) -> Result<Vec<ForecastRow>, AppError> {
        let t: Vec<f64> = dates.iter().map(|&d| self.scaled_time(d)).collect();

        let mut rows = Vec::with_capacity(dates.len());
        let mut additive_scaled = Vec::with_capacity(dates.len());
        for (&ds, &ti) in dates.iter().zip(t.iter()) {
            let trend = self.trend_scaled(ti);
            let yearly = self.seasonal_scaled(Component::Yearly, ds);
            let weekly = self.seasonal_scaled(Component::Weekly, ds);
            let holidays = self.seasonal_scaled(Component::Holidays, ds);
            let additive = yearly + weekly + holidays;
            let yhat = trend + additive;
            if !yhat.is_finite() {
                return Err(AppError::output(format!("Non-finite prediction for {ds}.")));
            }
            additive_scaled.push(additive);

            let s = self.y_scale;
            rows.push(ForecastRow {
                ds,
                trend: trend * s,
                yearly: yearly * s,
                weekly: weekly * s,
                holidays: holidays * s,
                additive_terms: additive * s,
                yhat: yhat * s,
                yhat_lower: yhat * s,
                yhat_upper: yhat * s,
            });
        }

        if self.config.uncertainty_samples > 0 && !dates.is_empty() {
            let deltas = &self.beta[self.layout.changepoints.clone()];
            let inputs = IntervalInputs {
                t: &t,
                additive: &additive_scaled,
                trend: TrendParams {
                    k: self.beta[1],
                    m: self.beta[0],
                    deltas,
                    changepoints: &self.changepoints,
                },
                sigma_obs: self.sigma_obs,
            };
            let bounds = sample_intervals(
                &inputs,
                self.config.interval_width,
                self.config.uncertainty_samples,
                self.config.seed,
            )?;
            for (row, (lo, hi)) in rows.iter_mut().zip(bounds) {
                row.yhat_lower = lo * self.y_scale;
                row.yhat_upper = hi * self.y_scale;
            }
        }

        Ok(rows)
    }

    /// A single component evaluated on arbitrary dates, in clicks.
    pub fn component_profile(&self, component: Component, dates: &[NaiveDate]) -> Vec<f64> {
        dates
            .iter()
            .map(|&d| {
                let v = match component {
                    Component::Trend => self.trend_scaled(self.scaled_time(d)),
                    _ => self.seasonal_scaled(component, d),
                };
                v * self.y_scale
            })
            .collect()
    }

    /// Whether a component is part of the fitted design.
    pub fn has_component(&self, component: Component) -> bool {
        match component {
            Component::Trend => true,
            Component::Yearly => self.layout.yearly.is_some(),
            Component::Weekly => self.layout.weekly.is_some(),
            Component::Holidays => !self.layout.holidays.is_empty(),
        }
    }

    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.t_scale
    }

    fn trend_scaled(&self, t: f64) -> f64 {
        piecewise_linear(
            t,
            self.beta[1],
            self.beta[0],
            &self.beta[self.layout.changepoints.clone()],
            &self.changepoints,
        )
    }

    fn seasonal_scaled(&self, component: Component, date: NaiveDate) -> f64 {
        let range = match component {
            Component::Trend => return 0.0,
            Component::Yearly => self.layout.yearly.clone(),
            Component::Weekly => self.layout.weekly.clone(),
            Component::Holidays => Some(self.layout.holidays.clone()),
        };
        let Some(range) = range else { return 0.0 };
        if range.is_empty() {
            return 0.0;
        }

        let mut row = vec![0.0; range.len()];
        self.fill_block(component, date, &mut row);
        row.iter().zip(&self.beta[range]).map(|(x, b)| x * b).sum()
    }

    fn fill_design_row(&self, date: NaiveDate, out: &mut [f64]) {
        let t = self.scaled_time(date);
        out[0] = 1.0;
        out[1] = t;
        for (slot, &s) in out[self.layout.changepoints.clone()].iter_mut().zip(&self.changepoints) {
            *slot = (t - s).max(0.0);
        }
        for component in [Component::Yearly, Component::Weekly] {
            let range = match component {
                Component::Yearly => self.layout.yearly.clone(),
                _ => self.layout.weekly.clone(),
            };
            if let Some(range) = range {
                self.fill_block(component, date, &mut out[range]);
            }
        }
        let holidays = self.layout.holidays.clone();
        self.fill_block(Component::Holidays, date, &mut out[holidays]);
    }

    fn fill_block(&self, component: Component, date: NaiveDate, out: &mut [f64]) {
        match component {
            Component::Yearly => fill_fourier_row(epoch_days(date), YEARLY_PERIOD, self.config.yearly_order, out),
            Component::Weekly => fill_fourier_row(epoch_days(date), WEEKLY_PERIOD, self.config.weekly_order, out),
            Component::Holidays => {
                for (slot, feature) in out.iter_mut().zip(&self.holidays) {
                    *slot = if feature.is_active(date) { 1.0 } else { 0.0 };
                }
            }
            Component::Trend => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Holiday;
    use std::f64::consts::PI;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn synthetic(n: usize, f: impl Fn(usize, NaiveDate) -> f64) -> Vec<Observation> {
        let start = d(2022, 1, 1);
        (0..n)
            .map(|i| {
                let date = start + Duration::days(i as i64);
                Observation::new(date, f(i, date))
            })
            .collect()
    }

    fn weekly_wave(date: NaiveDate) -> f64 {
        10.0 * (2.0 * PI * epoch_days(date) / WEEKLY_PERIOD).sin()
    }

    #[test]
    fn recovers_trend_and_weekly_cycle() {
        let history = synthetic(200, |i, date| 100.0 + 0.5 * i as f64 + weekly_wave(date));
        let config = ModelConfig {
            yearly_seasonality: false,
            uncertainty_samples: 0,
            ..ModelConfig::default()
        };

        let model = fit(&config, &history).unwrap();
        let dates: Vec<NaiveDate> = history.iter().map(|o| o.date).collect();
        let rows = model.predict(&dates).unwrap();

        for (row, obs) in rows.iter().zip(history.iter()) {
            assert!((row.yhat - obs.clicks).abs() < 1.0, "{}: {} vs {}", row.ds, row.yhat, obs.clicks);
            assert!((row.yhat - (row.trend + row.additive_terms)).abs() < 1e-9);
            assert_eq!(row.yearly, 0.0);
        }
        assert!(model.sigma_obs() < 1.0);

        // Extrapolation keeps the slope and the weekly phase.
        let future = model.make_future_dates(14, false);
        assert_eq!(future[0], d(2022, 7, 20));
        let ahead = model.predict(&future).unwrap();
        for row in &ahead {
            let i = (row.ds - d(2022, 1, 1)).num_days() as f64;
            let expected = 100.0 + 0.5 * i + weekly_wave(row.ds);
            assert!((row.yhat - expected).abs() < 3.0, "{}: {} vs {expected}", row.ds, row.yhat);
        }
    }

    #[test]
    fn holiday_effect_is_learned() {
        let spike_days = [d(2022, 2, 10), d(2022, 4, 1), d(2022, 6, 15)];
        let history = synthetic(240, |_, date| {
            let mut y = 50.0;
            if spike_days.contains(&date) {
                y += 40.0;
            }
            if spike_days.iter().any(|&s| s + Duration::days(1) == date) {
                y += 20.0;
            }
            y
        });
        let config = ModelConfig {
            yearly_seasonality: false,
            weekly_seasonality: false,
            uncertainty_samples: 0,
            holidays: spike_days
                .iter()
                .map(|&date| Holiday {
                    name: "spike".to_string(),
                    date,
                    lower_window: 0,
                    upper_window: 1,
                })
                .collect(),
            ..ModelConfig::default()
        };

        let model = fit(&config, &history).unwrap();
        assert_eq!(model.holiday_labels(), ["spike_+0", "spike_+1"]);

        let rows = model.predict(&[d(2022, 4, 1), d(2022, 4, 2), d(2022, 4, 20)]).unwrap();
        assert!((rows[0].holidays - 40.0).abs() < 2.0, "got {}", rows[0].holidays);
        assert!((rows[1].holidays - 20.0).abs() < 2.0, "got {}", rows[1].holidays);
        assert_eq!(rows[2].holidays, 0.0);
    }

    #[test]
    fn intervals_contain_point_forecast() {
        let history = synthetic(120, |i, date| 200.0 + i as f64 + weekly_wave(date) + ((i * 7919) % 13) as f64);
        let config = ModelConfig {
            yearly_seasonality: false,
            uncertainty_samples: 300,
            ..ModelConfig::default()
        };
        let model = fit(&config, &history).unwrap();
        let dates = model.make_future_dates(30, true);
        assert_eq!(dates.len(), 150);

        let rows = model.predict(&dates).unwrap();
        for row in &rows {
            assert!(row.yhat_lower <= row.yhat && row.yhat <= row.yhat_upper, "{row:?}");
        }
    }

    #[test]
    fn rejects_degenerate_history() {
        let config = ModelConfig::default();
        let one = synthetic(1, |_, _| 1.0);
        assert_eq!(fit(&config, &one).unwrap_err().exit_code(), crate::error::EXIT_DATA);

        let same_day = vec![Observation::new(d(2024, 1, 1), 1.0), Observation::new(d(2024, 1, 1), 2.0)];
        assert!(fit(&config, &same_day).is_err());

        let bad = ModelConfig {
            changepoint_prior_scale: 0.0,
            ..ModelConfig::default()
        };
        assert_eq!(
            fit(&bad, &synthetic(10, |i, _| i as f64)).unwrap_err().exit_code(),
            crate::error::EXIT_INPUT
        );
    }

    #[test]
    fn layout_orders_blocks() {
        let config = ModelConfig::default();
        let layout = DesignLayout::new(&config, 25, 3);
        assert_eq!(layout.changepoints, 2..27);
        assert_eq!(layout.yearly, Some(27..47));
        assert_eq!(layout.weekly, Some(47..53));
        assert_eq!(layout.holidays, 53..56);
        assert_eq!(layout.n_cols, 56);
    }
}
