//! Simulation-based uncertainty intervals.
//!
//! Each simulated path:
//! - keeps the fitted trend up to the end of the history (`t <= 1`)
//! - past the history, adds new changepoints at the historical rate
//!   (Poisson count, uniform locations) with Laplace-distributed slope changes
//!   whose scale is the mean absolute fitted change
//! - adds Gaussian observation noise with the in-sample residual scale
//!
//! The interval bounds are per-date quantiles over all paths.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Exp, Normal, Poisson};

use crate::error::AppError;
use crate::math::quantile_sorted;
use crate::models::trend::piecewise_linear;

/// Offset added to the Laplace scale so a flat fitted trend still samples.
const LAPLACE_EPS: f64 = 1e-8;

/// Fitted trend parameters in scaled units.
#[derive(Debug, Clone)]
pub struct TrendParams<'a> {
    pub k: f64,
    pub m: f64,
    pub deltas: &'a [f64],
    pub changepoints: &'a [f64],
}

/// Inputs for interval simulation (all in scaled `y` units).
#[derive(Debug, Clone)]
pub struct IntervalInputs<'a> {
    /// Scaled time of every predicted date.
    pub t: &'a [f64],
    /// Non-trend part of the prediction (seasonality + holidays) per date.
    pub additive: &'a [f64],
    pub trend: TrendParams<'a>,
    pub sigma_obs: f64,
}

/// Simulate `n_samples` paths and return `(lower, upper)` per date, in scaled units.
pub fn sample_intervals(
    inputs: &IntervalInputs<'_>,
    interval_width: f64,
    n_samples: usize,
    seed: u64,
) -> Result<Vec<(f64, f64)>, AppError> {
    if !(interval_width > 0.0 && interval_width < 1.0) {
        return Err(AppError::input(format!(
            "Interval width must be in (0, 1), got {interval_width}."
        )));
    }
    let n_dates = inputs.t.len();
    if n_samples == 0 || n_dates == 0 {
        return Ok(Vec::new());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, inputs.sigma_obs.max(0.0))
        .map_err(|e| AppError::output(format!("Noise distribution error: {e}")))?;

    let t_max = inputs.t.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let future_span = (t_max - 1.0).max(0.0);
    let change_rate = inputs.trend.changepoints.len() as f64 * future_span;
    let laplace_scale = mean_abs(inputs.trend.deltas) + LAPLACE_EPS;
    let magnitude = Exp::new(1.0 / laplace_scale)
        .map_err(|e| AppError::output(format!("Trend change distribution error: {e}")))?;
    let poisson = if change_rate > 0.0 {
        Some(
            Poisson::new(change_rate)
                .map_err(|e| AppError::output(format!("Changepoint count distribution error: {e}")))?,
        )
    } else {
        None
    };

    // samples[date][path]
    let mut samples = vec![Vec::with_capacity(n_samples); n_dates];
    let mut deltas: Vec<f64> = Vec::new();
    let mut changepoints: Vec<f64> = Vec::new();

    for _ in 0..n_samples {
        deltas.clear();
        changepoints.clear();
        deltas.extend_from_slice(inputs.trend.deltas);
        changepoints.extend_from_slice(inputs.trend.changepoints);

        if let Some(poisson) = &poisson {
            let n_new: f64 = poisson.sample(&mut rng);
            for _ in 0..n_new as usize {
                changepoints.push(1.0 + rng.r#gen::<f64>() * future_span);
                let size = magnitude.sample(&mut rng);
                deltas.push(if rng.gen_bool(0.5) { size } else { -size });
            }
        }

        for (i, (&t, &additive)) in inputs.t.iter().zip(inputs.additive.iter()).enumerate() {
            let trend = piecewise_linear(t, inputs.trend.k, inputs.trend.m, &deltas, &changepoints);
            samples[i].push(trend + additive + noise.sample(&mut rng));
        }
    }

    let lower_q = (1.0 - interval_width) / 2.0;
    let upper_q = 1.0 - lower_q;
    Ok(samples
        .into_iter()
        .map(|mut paths| {
            paths.sort_by(|a, b| a.total_cmp(b));
            (quantile_sorted(&paths, lower_q), quantile_sorted(&paths, upper_q))
        })
        .collect())
}

fn mean_abs(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64
}
