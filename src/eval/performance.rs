//! Accuracy of cross-validation predictions as a function of forecast horizon.

use crate::domain::{CvRow, PerformanceRow};
use crate::error::AppError;

/// Aggregate CV rows into one row per horizon.
///
/// Each output row averages the `rolling_window` fraction of CV points
/// closest to (and not beyond) its horizon. When the window cuts through a
/// horizon, that horizon's points contribute proportionally. Horizons too
/// short to fill a window are left out.
pub fn performance_metrics(rows: &[CvRow], rolling_window: f64) -> Result<Vec<PerformanceRow>, AppError> {
    if rows.is_empty() {
        return Err(AppError::data("No cross-validation rows to evaluate."));
    }
    if !(0.0..=1.0).contains(&rolling_window) {
        return Err(AppError::input(format!(
            "Rolling window must be in [0, 1], got {rolling_window}."
        )));
    }

    let mut sorted: Vec<&CvRow> = rows.iter().collect();
    sorted.sort_by_key(|r| r.horizon_days());

    let n = sorted.len();
    let w = ((rolling_window * n as f64) as usize).clamp(1, n);

    let h: Vec<i64> = sorted.iter().map(|r| r.horizon_days()).collect();
    let se: Vec<f64> = sorted.iter().map(|r| (r.y - r.yhat).powi(2)).collect();
    let ae: Vec<f64> = sorted.iter().map(|r| (r.y - r.yhat).abs()).collect();
    let covered: Vec<f64> = sorted
        .iter()
        .map(|r| if r.y >= r.yhat_lower && r.y <= r.yhat_upper { 1.0 } else { 0.0 })
        .collect();

    let skip_mape = sorted.iter().any(|r| r.y.abs() < 1e-8);
    if skip_mape {
        tracing::info!("skipping MAPE: some actual values are zero");
    }

    let (horizons, mse) = rolling_mean_by_h(&se, &h, w);
    let (_, mae) = rolling_mean_by_h(&ae, &h, w);
    let (_, coverage) = rolling_mean_by_h(&covered, &h, w);
    let mape = if skip_mape {
        None
    } else {
        let ape: Vec<f64> = sorted.iter().map(|r| ((r.y - r.yhat) / r.y).abs()).collect();
        Some(rolling_mean_by_h(&ape, &h, w).1)
    };

    Ok(horizons
        .iter()
        .enumerate()
        .map(|(i, &horizon_days)| PerformanceRow {
            horizon_days,
            mse: mse[i],
            rmse: mse[i].sqrt(),
            mae: mae[i],
            mape: mape.as_ref().map(|m| 100.0 * m[i]),
            coverage: coverage[i],
        })
        .collect())
}

/// Trailing mean of `x` over the last `w` points for each unique value of `h`.
///
/// `h` must be sorted ascending.
fn rolling_mean_by_h(x: &[f64], h: &[i64], w: usize) -> (Vec<i64>, Vec<f64>) {
    let mut hs: Vec<i64> = Vec::new();
    let mut sums: Vec<f64> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    for (&xi, &hi) in x.iter().zip(h) {
        if hs.last() == Some(&hi) {
            let last = sums.len() - 1;
            sums[last] += xi;
            counts[last] += 1;
        } else {
            hs.push(hi);
            sums.push(xi);
            counts.push(1);
        }
    }

    let mut res = vec![f64::NAN; hs.len()];
    let mut trailing = hs.len() as isize - 1;
    let mut x_sum = 0.0;
    let mut n_sum = 0usize;
    for i in (0..hs.len()).rev() {
        x_sum += sums[i];
        n_sum += counts[i];
        while n_sum >= w && trailing >= 0 {
            let excess_n = (n_sum - w) as f64;
            let excess_x = excess_n * sums[i] / counts[i] as f64;
            let t = trailing as usize;
            res[t] = (x_sum - excess_x) / w as f64;
            x_sum -= sums[t];
            n_sum -= counts[t];
            trailing -= 1;
        }
    }

    let first = (trailing + 1) as usize;
    (hs[first..].to_vec(), res[first..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn row(h: i64, y: f64, yhat: f64) -> CvRow {
        let cutoff = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        CvRow {
            ds: cutoff + Duration::days(h),
            cutoff,
            y,
            yhat,
            yhat_lower: yhat - 1.5,
            yhat_upper: yhat + 1.5,
        }
    }

    #[test]
    fn rolling_mean_one_point_per_horizon() {
        let (h, m) = rolling_mean_by_h(&[1.0, 4.0, 9.0, 16.0], &[1, 2, 3, 4], 2);
        assert_eq!(h, vec![2, 3, 4]);
        assert_eq!(m, vec![2.5, 6.5, 12.5]);
    }

    #[test]
    fn rolling_mean_weights_partial_horizons() {
        // Two points at h=1, one at h=2, window of two.
        let (h, m) = rolling_mean_by_h(&[1.0, 3.0, 5.0], &[1, 1, 2], 2);
        assert_eq!(h, vec![1, 2]);
        assert!((m[0] - 2.0).abs() < 1e-12);
        assert!((m[1] - 3.5).abs() < 1e-12);
    }

    #[test]
    fn metrics_per_horizon() {
        let rows = vec![
            row(1, 10.0, 11.0),
            row(1, 10.0, 9.0),
            row(2, 10.0, 12.0),
            row(2, 10.0, 8.0),
        ];
        // 10% of 4 rows rounds down to 0, bumped to a window of one.
        let perf = performance_metrics(&rows, 0.1).unwrap();
        assert_eq!(perf.len(), 2);
        assert_eq!(perf[0].horizon_days, 1);
        assert!((perf[0].mae - 1.0).abs() < 1e-12);
        assert!((perf[1].rmse - 2.0).abs() < 1e-12);
        assert!((perf[0].coverage - 1.0).abs() < 1e-12);
        assert!((perf[1].coverage - 0.0).abs() < 1e-12);
        assert!((perf[1].mape.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn zero_actuals_drop_mape() {
        let rows = vec![row(1, 0.0, 1.0), row(2, 10.0, 9.0)];
        let perf = performance_metrics(&rows, 0.5).unwrap();
        assert!(perf.iter().all(|p| p.mape.is_none()));
    }

    #[test]
    fn empty_rows_are_an_error() {
        assert!(performance_metrics(&[], 0.1).is_err());
    }
}
