//! Export forecast and cross-validation tables to CSV.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{CvRow, ForecastRow};
use crate::error::AppError;

/// Write `ds,yhat,yhat_lower,yhat_upper`, one row per forecast date.
pub fn write_forecast_csv(path: &Path, rows: &[ForecastRow]) -> Result<(), AppError> {
    let mut out = create(path)?;
    writeln!(out, "ds,yhat,yhat_lower,yhat_upper").map_err(|e| write_error(path, e))?;
    for r in rows {
        writeln!(
            out,
            "{},{:.6},{:.6},{:.6}",
            r.ds.format("%Y-%m-%d"),
            r.yhat,
            r.yhat_lower,
            r.yhat_upper
        )
        .map_err(|e| write_error(path, e))?;
    }
    out.flush().map_err(|e| write_error(path, e))
}

/// Write the raw cross-validation predictions.
pub fn write_cv_csv(path: &Path, rows: &[CvRow]) -> Result<(), AppError> {
    let mut out = create(path)?;
    writeln!(out, "ds,cutoff,horizon_days,y,yhat,yhat_lower,yhat_upper").map_err(|e| write_error(path, e))?;
    for r in rows {
        writeln!(
            out,
            "{},{},{},{:.6},{:.6},{:.6},{:.6}",
            r.ds.format("%Y-%m-%d"),
            r.cutoff.format("%Y-%m-%d"),
            r.horizon_days(),
            r.y,
            r.yhat,
            r.yhat_lower,
            r.yhat_upper
        )
        .map_err(|e| write_error(path, e))?;
    }
    out.flush().map_err(|e| write_error(path, e))
}

fn create(path: &Path) -> Result<BufWriter<File>, AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::output(format!("Failed to create '{}': {e}", path.display())))?;
    Ok(BufWriter::new(file))
}

fn write_error(path: &Path, e: std::io::Error) -> AppError {
    AppError::output(format!("Failed to write '{}': {e}", path.display()))
}
