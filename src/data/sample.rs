//! Synthetic daily click tables for demos and tests.
//!
//! clicks(t) = level(t) * (1 + weekly(t) + yearly(t)) * noise * spike
//!
//! - level grows linearly from `base`
//! - weekly dips on weekends, yearly peaks in late autumn
//! - noise is log-normal; spikes multiply the day by 2x..4x

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::LogNormal;

use crate::domain::{Observation, default_extended_spike_dates};
use crate::error::AppError;

/// Range of the multiplicative jump applied on spike days.
const SPIKE_MULTIPLIER: (f64, f64) = (2.0, 4.0);

#[derive(Debug, Clone)]
pub struct SampleSpec {
    pub start: NaiveDate,
    pub days: usize,
    /// Clicks on the first day before seasonality.
    pub base: f64,
    /// Relative level growth per day.
    pub trend_per_day: f64,
    pub weekly_amplitude: f64,
    pub yearly_amplitude: f64,
    /// Log-scale standard deviation of the noise.
    pub noise_sigma: f64,
    pub spike_prob: f64,
    /// Days that always spike (when inside the range).
    pub forced_spikes: Vec<NaiveDate>,
    pub seed: u64,
}

impl SampleSpec {
    pub fn new(start: NaiveDate, days: usize, base: f64, spike_prob: f64, seed: u64) -> Self {
        Self {
            start,
            days,
            base,
            trend_per_day: 0.0005,
            weekly_amplitude: 0.15,
            yearly_amplitude: 0.1,
            noise_sigma: 0.05,
            spike_prob,
            forced_spikes: default_extended_spike_dates(),
            seed,
        }
    }
}

/// Generate the click table described by `spec`.
pub fn generate_clicks(spec: &SampleSpec) -> Result<Vec<Observation>, AppError> {
    if spec.days == 0 {
        return Err(AppError::input("Sample must have at least one day."));
    }
    if !(spec.base.is_finite() && spec.base > 0.0) {
        return Err(AppError::input("Sample base level must be finite and > 0."));
    }
    if !(0.0..1.0).contains(&spec.spike_prob) {
        return Err(AppError::input("Spike probability must be in [0, 1)."));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let noise = LogNormal::new(0.0, spec.noise_sigma)
        .map_err(|e| AppError::input(format!("Noise distribution error: {e}")))?;

    let mut out = Vec::with_capacity(spec.days);
    for i in 0..spec.days {
        let date = spec.start + Duration::days(i as i64);
        let level = spec.base * (1.0 + spec.trend_per_day * i as f64);
        let seasonal = 1.0 + spec.weekly_amplitude * weekly_shape(date) + spec.yearly_amplitude * yearly_shape(date);

        let mut clicks = level * seasonal.max(0.05) * noise.sample(&mut rng);
        let spike = spec.forced_spikes.contains(&date) || rng.gen_bool(spec.spike_prob);
        if spike {
            clicks *= rng.gen_range(SPIKE_MULTIPLIER.0..SPIKE_MULTIPLIER.1);
        }

        out.push(Observation::new(date, clicks.round()));
    }
    Ok(out)
}

/// Write a `Date,Clicks` CSV.
pub fn write_clicks_csv(path: &Path, rows: &[Observation]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::output(format!("Failed to create sample CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    let write_err = |e: std::io::Error| AppError::output(format!("Failed to write sample CSV: {e}"));

    writeln!(out, "Date,Clicks").map_err(write_err)?;
    for o in rows {
        writeln!(out, "{},{:.0}", o.date.format("%Y-%m-%d"), o.clicks).map_err(write_err)?;
    }
    out.flush().map_err(write_err)
}

/// +1 midweek, about -1 on weekends.
fn weekly_shape(date: NaiveDate) -> f64 {
    match date.weekday().num_days_from_monday() {
        5 | 6 => -1.0,
        0 | 4 => 0.3,
        _ => 0.6,
    }
}

/// Peaks around late November.
fn yearly_shape(date: NaiveDate) -> f64 {
    let doy = date.ordinal0() as f64;
    (2.0 * PI * (doy - 240.0) / 365.25).sin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(days: usize, seed: u64) -> SampleSpec {
        SampleSpec::new(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), days, 1000.0, 0.02, seed)
    }

    #[test]
    fn same_seed_same_table() {
        let a = generate_clicks(&spec(100, 7)).unwrap();
        let b = generate_clicks(&spec(100, 7)).unwrap();
        let c = generate_clicks(&spec(100, 8)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn daily_consecutive_positive_rows() {
        let rows = generate_clicks(&spec(400, 1)).unwrap();
        assert_eq!(rows.len(), 400);
        assert!(rows.windows(2).all(|w| w[1].date - w[0].date == Duration::days(1)));
        assert!(rows.iter().all(|o| o.clicks > 0.0 && o.clicks.fract() == 0.0));
    }

    #[test]
    fn forced_spikes_stand_out() {
        let rows = generate_clicks(&spec(365, 3)).unwrap();
        let black_friday = NaiveDate::from_ymd_opt(2023, 11, 24).unwrap();
        let spike = rows.iter().find(|o| o.date == black_friday).unwrap().clicks;
        let week_before: Vec<f64> = rows
            .iter()
            .filter(|o| o.date < black_friday && o.date >= black_friday - Duration::days(7))
            .map(|o| o.clicks)
            .collect();
        let max_before = week_before.iter().copied().fold(0.0, f64::max);
        // Noise is ~5%, the jump at least 2x; a random spike the week before
        // can't be ruled out, so compare with the weekly median.
        let mut sorted = week_before.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        assert!(spike > 1.5 * sorted[sorted.len() / 2], "{spike} vs {max_before}");
    }

    #[test]
    fn written_table_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clicks.csv");
        let rows = generate_clicks(&spec(30, 5)).unwrap();
        write_clicks_csv(&path, &rows).unwrap();

        let series = crate::io::load_clicks(&path).unwrap();
        assert_eq!(series.observations, rows);
    }

    #[test]
    fn rejects_bad_specs() {
        assert!(generate_clicks(&spec(0, 1)).is_err());
        let mut s = spec(10, 1);
        s.spike_prob = 1.5;
        assert!(generate_clicks(&s).is_err());
    }
}
