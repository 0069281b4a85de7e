//! Reporting utilities: largest test misses and formatted terminal output.

use std::cmp::Ordering;

use crate::domain::TestResidual;

pub mod format;

pub use format::*;

/// Test days the forecast missed most in each direction (top-N each side).
#[derive(Debug, Clone)]
pub struct LargestMisses {
    /// Actual above forecast (positive residual).
    pub under: Vec<TestResidual>,
    /// Actual below forecast (negative residual).
    pub over: Vec<TestResidual>,
}

/// Rank test residuals by size in each direction.
pub fn largest_misses(residuals: &[TestResidual], top_n: usize) -> LargestMisses {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| b.residual.partial_cmp(&a.residual).unwrap_or(Ordering::Equal));

    let under = sorted.iter().filter(|r| r.residual > 0.0).take(top_n).copied().collect();
    let over = sorted.iter().rev().filter(|r| r.residual < 0.0).take(top_n).copied().collect();

    LargestMisses { under, over }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn residual(day: u32, residual: f64) -> TestResidual {
        TestResidual {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            actual: 100.0 + residual,
            predicted: 100.0,
            residual,
        }
    }

    #[test]
    fn largest_misses_basic() {
        let residuals = vec![residual(1, 0.0), residual(2, 5.0), residual(3, -7.0), residual(4, 2.0)];

        let misses = largest_misses(&residuals, 1);
        assert_eq!(misses.under.len(), 1);
        assert_eq!(misses.under[0].date.to_string(), "2024-01-02");
        assert_eq!(misses.over.len(), 1);
        assert_eq!(misses.over[0].date.to_string(), "2024-01-03");

        let misses = largest_misses(&residuals, 10);
        assert_eq!(misses.under.len(), 2);
        assert_eq!(misses.over.len(), 1);
    }
}
