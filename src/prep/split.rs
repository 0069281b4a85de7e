//! Positional train/test split.

use crate::domain::Observation;
use crate::error::AppError;

/// Minimum number of training rows the model can be fitted on.
pub const MIN_TRAIN_ROWS: usize = 2;

/// Split off the last `test_len` rows as the test window.
pub fn train_test_split(
    series: &[Observation],
    test_len: usize,
) -> Result<(Vec<Observation>, Vec<Observation>), AppError> {
    if test_len == 0 {
        return Err(AppError::input("Test window must hold at least one row."));
    }
    if series.len() < test_len + MIN_TRAIN_ROWS {
        return Err(AppError::data(format!(
            "Need at least {} rows for a {test_len}-row test window, got {}.",
            test_len + MIN_TRAIN_ROWS,
            series.len()
        )));
    }

    let (train, test) = series.split_at(series.len() - test_len);
    Ok((train.to_vec(), test.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series(n: usize) -> Vec<Observation> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| Observation::new(start + Duration::days(i as i64), i as f64))
            .collect()
    }

    #[test]
    fn last_rows_are_test() {
        let s = series(200);
        let (train, test) = train_test_split(&s, 60).unwrap();

        assert_eq!(test.len(), 60);
        assert_eq!(train.len(), 140);
        assert_eq!(test[0], s[140]);
        assert_eq!(test.last(), s.last());
        assert!(train.last().unwrap().date < test[0].date);

        let mut joined = train.clone();
        joined.extend_from_slice(&test);
        assert_eq!(joined, s);
    }

    #[test]
    fn too_short_is_a_data_error() {
        let err = train_test_split(&series(61), 60).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
        assert!(train_test_split(&series(62), 60).is_ok());
    }
}
