//! Simulated historical forecasts (time-series cross-validation).
//!
//! Cutoffs are laid out backwards from the end of the history:
//!
//! ```text
//! |---- initial ----|.....|== horizon ==|
//!                   cutoff_0   ...   cutoff_k = last - horizon
//! ```
//!
//! For each cutoff a fresh model is fitted on data `<= cutoff` and used to
//! predict `(cutoff, cutoff + horizon]`. Folds are independent and run in
//! parallel.

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;

use crate::domain::{CvRow, CvSettings, ModelConfig, Observation};
use crate::error::AppError;
use crate::models::{WEEKLY_PERIOD, YEARLY_PERIOD, fit};

/// Cutoff dates (ascending) for the given history dates.
pub fn generate_cutoffs(dates: &[NaiveDate], cv: &CvSettings) -> Result<Vec<NaiveDate>, AppError> {
    validate_settings(cv)?;
    let (Some(&first), Some(&last)) = (dates.iter().min(), dates.iter().max()) else {
        return Err(AppError::data("Cross-validation needs a non-empty history."));
    };

    let horizon = Duration::days(cv.horizon_days);
    let period = Duration::days(cv.period_days);
    let initial = Duration::days(cv.initial_days);

    let mut cutoff = last - horizon;
    if cutoff < first {
        return Err(AppError::data(format!(
            "Less data than the {}-day horizon.",
            cv.horizon_days
        )));
    }

    let mut out = vec![cutoff];
    while out[out.len() - 1] >= first + initial {
        cutoff -= period;
        let has_window_data = dates.iter().any(|&d| d > cutoff && d <= cutoff + horizon);
        if cutoff < last && !has_window_data {
            if let Some(&closest) = dates.iter().filter(|&&d| d <= cutoff).max() {
                cutoff = closest - horizon;
            }
        }
        out.push(cutoff);
    }
    // The last cutoff fell inside the initial window.
    out.pop();

    if out.is_empty() {
        return Err(AppError::data(
            "Less data than horizon after the initial window. Make horizon or initial shorter.",
        ));
    }
    out.reverse();
    Ok(out)
}

/// Refit on every cutoff and collect out-of-sample predictions, ordered by cutoff then date.
pub fn cross_validate(
    config: &ModelConfig,
    history: &[Observation],
    cv: &CvSettings,
) -> Result<Vec<CvRow>, AppError> {
    let dates: Vec<NaiveDate> = history.iter().map(|o| o.date).collect();
    let cutoffs = generate_cutoffs(&dates, cv)?;

    let longest_period = [
        (config.yearly_seasonality, YEARLY_PERIOD),
        (config.weekly_seasonality, WEEKLY_PERIOD),
    ]
    .iter()
    .filter(|(enabled, _)| *enabled)
    .map(|&(_, p)| p)
    .fold(0.0, f64::max);
    if (cv.initial_days as f64) < longest_period {
        tracing::warn!(
            initial_days = cv.initial_days,
            longest_period,
            "initial window is shorter than the longest seasonal period; early folds will extrapolate seasonality"
        );
    }

    tracing::info!(
        folds = cutoffs.len(),
        first_cutoff = %cutoffs[0],
        last_cutoff = %cutoffs[cutoffs.len() - 1],
        horizon_days = cv.horizon_days,
        "running cross-validation"
    );

    let horizon = Duration::days(cv.horizon_days);
    let folds: Vec<Vec<CvRow>> = cutoffs
        .par_iter()
        .map(|&cutoff| run_fold(config, history, cutoff, cutoff + horizon))
        .collect::<Result<_, _>>()?;

    Ok(folds.into_iter().flatten().collect())
}

fn run_fold(
    config: &ModelConfig,
    history: &[Observation],
    cutoff: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<CvRow>, AppError> {
    let train: Vec<Observation> = history.iter().copied().filter(|o| o.date <= cutoff).collect();
    if train.len() < 2 {
        return Err(AppError::data(format!(
            "Less than two rows before cutoff {cutoff}. Increase the initial window."
        )));
    }
    let target: Vec<Observation> = history
        .iter()
        .copied()
        .filter(|o| o.date > cutoff && o.date <= end)
        .collect();

    let model = fit(config, &train)?;
    let dates: Vec<NaiveDate> = target.iter().map(|o| o.date).collect();
    let predictions = model.predict(&dates)?;

    tracing::debug!(%cutoff, train_rows = train.len(), predicted = target.len(), "cv fold done");

    Ok(predictions
        .into_iter()
        .zip(target)
        .map(|(p, obs)| CvRow {
            ds: p.ds,
            cutoff,
            y: obs.clicks,
            yhat: p.yhat,
            yhat_lower: p.yhat_lower,
            yhat_upper: p.yhat_upper,
        })
        .collect())
}

fn validate_settings(cv: &CvSettings) -> Result<(), AppError> {
    if cv.horizon_days <= 0 || cv.period_days <= 0 || cv.initial_days < 0 {
        return Err(AppError::input(format!(
            "Cross-validation windows must be positive (initial={}, period={}, horizon={}).",
            cv.initial_days, cv.period_days, cv.horizon_days
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn daily(start: NaiveDate, n: i64) -> Vec<NaiveDate> {
        (0..n).map(|i| start + Duration::days(i)).collect()
    }

    fn settings(initial: i64, period: i64, horizon: i64) -> CvSettings {
        CvSettings {
            initial_days: initial,
            period_days: period,
            horizon_days: horizon,
            rolling_window: 0.1,
        }
    }

    #[test]
    fn cutoffs_step_back_by_period() {
        // 100 days: 2024-01-01 .. 2024-04-09.
        let dates = daily(d(2024, 1, 1), 100);
        let cutoffs = generate_cutoffs(&dates, &settings(40, 20, 30)).unwrap();
        // last - 30 = 03-10, then 02-19 (= first + 49). The next candidate
        // (01-30, first + 29) is inside the initial window and dropped.
        assert_eq!(cutoffs, vec![d(2024, 2, 19), d(2024, 3, 10)]);
    }

    #[test]
    fn cutoffs_skip_gaps() {
        // Data for January and then again from April.
        let mut dates = daily(d(2024, 1, 1), 31);
        dates.extend(daily(d(2024, 4, 1), 30));
        let cutoffs = generate_cutoffs(&dates, &settings(10, 10, 10)).unwrap();
        // Every window must contain data.
        for c in &cutoffs {
            let end = *c + Duration::days(10);
            assert!(dates.iter().any(|&x| x > *c && x <= end), "empty window after {c}");
        }
        // 03-21 has an empty window, so it jumps to 01-31 - 10 days.
        assert_eq!(
            cutoffs,
            vec![d(2024, 1, 11), d(2024, 1, 21), d(2024, 3, 31), d(2024, 4, 10), d(2024, 4, 20)]
        );
    }

    #[test]
    fn too_little_data_is_an_error() {
        let dates = daily(d(2024, 1, 1), 20);
        assert!(generate_cutoffs(&dates, &settings(0, 5, 30)).is_err());
        assert!(generate_cutoffs(&dates, &settings(15, 5, 10)).is_err());
        assert!(generate_cutoffs(&dates, &settings(0, 0, 10)).is_err());
    }

    #[test]
    fn folds_predict_only_their_window() {
        let start = d(2023, 1, 1);
        let history: Vec<Observation> = daily(start, 120)
            .into_iter()
            .enumerate()
            .map(|(i, date)| Observation::new(date, 50.0 + i as f64))
            .collect();
        let config = ModelConfig {
            yearly_seasonality: false,
            uncertainty_samples: 50,
            ..ModelConfig::default()
        };

        let rows = cross_validate(&config, &history, &settings(60, 15, 14)).unwrap();
        assert!(!rows.is_empty());
        for r in &rows {
            let h = r.horizon_days();
            assert!((1..=14).contains(&h), "horizon {h}");
            // A clean linear series is easy to forecast.
            assert!((r.yhat - r.y).abs() < 5.0, "{r:?}");
        }
        // Rows are grouped by ascending cutoff.
        assert!(rows.windows(2).all(|w| w[0].cutoff <= w[1].cutoff));
    }
}
