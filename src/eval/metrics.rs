//! Point-forecast accuracy metrics.

use crate::domain::AccuracyMetrics;
use crate::error::AppError;

fn check_pair(actual: &[f64], predicted: &[f64]) -> Result<(), AppError> {
    if actual.len() != predicted.len() {
        return Err(AppError::output(format!(
            "Metric inputs differ in length: {} actual vs {} predicted.",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(AppError::output("Metric inputs are empty."));
    }
    Ok(())
}

/// Mean absolute error.
pub fn mae(actual: &[f64], predicted: &[f64]) -> Result<f64, AppError> {
    check_pair(actual, predicted)?;
    let sum: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();
    Ok(sum / actual.len() as f64)
}

/// Root mean squared error.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64, AppError> {
    check_pair(actual, predicted)?;
    let sum: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    Ok((sum / actual.len() as f64).sqrt())
}

/// Mean absolute percentage error, in percent.
///
/// Zero actuals are skipped; `None` when nothing is left to average.
pub fn mape(actual: &[f64], predicted: &[f64]) -> Result<Option<f64>, AppError> {
    check_pair(actual, predicted)?;
    let terms: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if terms.is_empty() {
        return Ok(None);
    }
    Ok(Some(100.0 * terms.iter().sum::<f64>() / terms.len() as f64))
}

/// MAE, RMSE and MAPE in one pass over the inputs.
pub fn accuracy(actual: &[f64], predicted: &[f64]) -> Result<AccuracyMetrics, AppError> {
    Ok(AccuracyMetrics {
        mae: mae(actual, predicted)?,
        rmse: rmse(actual, predicted)?,
        mape: mape(actual, predicted)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_computed_pair() {
        let m = accuracy(&[10.0, 20.0], &[12.0, 18.0]).unwrap();
        assert!((m.mae - 2.0).abs() < 1e-12);
        assert!((m.rmse - 2.0).abs() < 1e-12);
        assert!((m.mape.unwrap() - 15.0).abs() < 1e-12);
    }

    #[test]
    fn rmse_penalises_large_errors() {
        let actual = [0.0, 0.0, 0.0, 0.0];
        let predicted = [0.0, 0.0, 0.0, 4.0];
        assert!((mae(&actual, &predicted).unwrap() - 1.0).abs() < 1e-12);
        assert!((rmse(&actual, &predicted).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn mape_skips_zero_actuals() {
        assert_eq!(mape(&[0.0, 10.0], &[5.0, 11.0]).unwrap(), Some(10.0));
        assert_eq!(mape(&[0.0, 0.0], &[5.0, 11.0]).unwrap(), None);
    }

    #[test]
    fn mismatched_lengths_are_errors() {
        assert!(mae(&[1.0], &[1.0, 2.0]).is_err());
        assert!(rmse(&[], &[]).is_err());
    }
}
