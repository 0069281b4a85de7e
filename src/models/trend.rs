//! Piecewise-linear trend with changepoints.
//!
//! With scaled time `t ∈ [0, 1]` over the history, the trend is
//!
//! ```text
//! g(t) = k·t + m + Σ_j δ_j · max(t - s_j, 0)
//! ```
//!
//! which is continuous at every changepoint `s_j` and changes slope by `δ_j`.

/// Place up to `n_changepoints` changepoints uniformly (by row index) in the
/// first `range` fraction of the history.
///
/// `t` must be sorted ascending. The first row is never a changepoint.
pub fn select_changepoints(t: &[f64], n_changepoints: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range.clamp(0.0, 1.0)).floor() as usize;
    let n = n_changepoints.min(hist_size.saturating_sub(1));
    if n == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    (1..=n)
        .map(|i| {
            let idx = (last * i as f64 / n as f64).round_ties_even() as usize;
            t[idx.min(t.len() - 1)]
        })
        .collect()
}

/// Evaluate the trend at scaled time `t`.
pub fn piecewise_linear(t: f64, k: f64, m: f64, deltas: &[f64], changepoints: &[f64]) -> f64 {
    let bends: f64 = deltas
        .iter()
        .zip(changepoints.iter())
        .map(|(&delta, &s)| delta * (t - s).max(0.0))
        .sum();
    k * t + m + bends
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changepoints_stay_in_range() {
        let t: Vec<f64> = (0..100).map(|i| i as f64 / 99.0).collect();
        let cps = select_changepoints(&t, 25, 0.8);
        assert_eq!(cps.len(), 25);
        assert!(cps.iter().all(|&s| s > 0.0 && s <= 0.8));
        assert!(cps.windows(2).all(|w| w[0] <= w[1]));
        // Last changepoint sits on the last row inside the range.
        assert!((cps[24] - t[79]).abs() < 1e-12);
    }

    #[test]
    fn short_history_limits_changepoints() {
        let t = [0.0, 0.5, 1.0];
        // hist_size = floor(3 * 0.8) = 2 -> at most one changepoint.
        assert_eq!(select_changepoints(&t, 25, 0.8), vec![0.5]);
        assert!(select_changepoints(&t[..2], 25, 0.8).is_empty());
    }

    #[test]
    fn trend_bends_at_changepoint() {
        let cps = [0.5];
        let deltas = [2.0];
        assert!((piecewise_linear(0.25, 1.0, 0.0, &deltas, &cps) - 0.25).abs() < 1e-12);
        assert!((piecewise_linear(0.5, 1.0, 0.0, &deltas, &cps) - 0.5).abs() < 1e-12);
        // Slope is 3 after the changepoint.
        assert!((piecewise_linear(1.0, 1.0, 0.0, &deltas, &cps) - 2.0).abs() < 1e-12);
    }
}
