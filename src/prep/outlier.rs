//! Percentile-threshold spike detection and capping.
//!
//! A spike is a day whose clicks are strictly above the `q`-quantile of the
//! observed series. Spikes are detected on the raw series; capping then
//! replaces every value above the threshold with the threshold itself.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::Observation;
use crate::error::AppError;
use crate::math::quantile;

/// Threshold and the observations that exceeded it.
#[derive(Debug, Clone, Serialize)]
pub struct SpikeReport {
    pub quantile: f64,
    pub threshold: f64,
    pub spikes: Vec<Observation>,
}

impl SpikeReport {
    pub fn spike_dates(&self) -> Vec<NaiveDate> {
        self.spikes.iter().map(|o| o.date).collect()
    }
}

/// Compute the spike threshold and collect the days above it.
pub fn detect_spikes(series: &[Observation], q: f64) -> Result<SpikeReport, AppError> {
    let values: Vec<f64> = series.iter().map(|o| o.clicks).collect();
    let threshold = quantile(&values, q).ok_or_else(|| {
        AppError::input(format!(
            "Cannot compute the {q} quantile of {} values (quantile must be in [0, 1]).",
            values.len()
        ))
    })?;

    let spikes = series.iter().copied().filter(|o| o.clicks > threshold).collect();

    Ok(SpikeReport {
        quantile: q,
        threshold,
        spikes,
    })
}

/// Clip every value above `threshold` to `threshold`; returns how many changed.
pub fn cap_outliers(series: &mut [Observation], threshold: f64) -> usize {
    let mut capped = 0usize;
    for obs in series.iter_mut() {
        if obs.clicks > threshold {
            obs.clicks = threshold;
            capped += 1;
        }
    }
    capped
}
