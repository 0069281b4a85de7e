//! Fourier basis for seasonal components.
//!
//! A seasonality with period `P` and order `N` contributes `2N` columns:
//!
//! - `sin(2π·k·t / P)`, `cos(2π·k·t / P)` for `k = 1..=N`
//!
//! `t` is measured in days since 1970-01-01 so that the phase of a seasonal
//! pattern does not depend on where the history starts.

use std::f64::consts::PI;

use chrono::NaiveDate;

/// Days since the Unix epoch (may be fractional for future extensions).
pub fn epoch_days(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
    (date - epoch).num_days() as f64
}

/// Fill `out` (length `2 * order`) with the Fourier features of `t`.
pub fn fill_fourier_row(t: f64, period: f64, order: usize, out: &mut [f64]) {
    for k in 0..order {
        let x = 2.0 * PI * (k as f64 + 1.0) * t / period;
        out[2 * k] = x.sin();
        out[2 * k + 1] = x.cos();
    }
}
