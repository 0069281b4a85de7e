//! Run summary as JSON.
//!
//! The summary is the "portable" record of a run:
//! - the configuration the run used
//! - the spike threshold and the holiday table size
//! - test-window accuracy and the cross-validation performance table

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::app::pipeline::RunOutput;
use crate::domain::{AccuracyMetrics, DatasetStats, ForecastConfig, PerformanceRow};
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub config: &'a ForecastConfig,
    pub input: InputSummary<'a>,
    pub spikes: SpikeSummary,
    pub split: SplitSummary,
    pub model: ModelSummary,
    pub test_metrics: AccuracyMetrics,
    pub cv_performance: &'a [PerformanceRow],
}

#[derive(Debug, Serialize)]
pub struct InputSummary<'a> {
    pub stats: &'a DatasetStats,
    pub rows_read: usize,
    pub rows_skipped: usize,
}

#[derive(Debug, Serialize)]
pub struct SpikeSummary {
    pub quantile: f64,
    pub threshold: f64,
    pub spike_dates: Vec<NaiveDate>,
    pub capped_rows: usize,
    pub holiday_rows: usize,
}

#[derive(Debug, Serialize)]
pub struct SplitSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub test_start: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub history_start: NaiveDate,
    pub history_end: NaiveDate,
    pub changepoints: Vec<NaiveDate>,
    pub holiday_columns: Vec<String>,
    pub sigma_obs: f64,
}

impl<'a> RunSummary<'a> {
    pub fn new(config: &'a ForecastConfig, run: &'a RunOutput) -> Self {
        Self {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            config,
            input: InputSummary {
                stats: &run.ingest.stats,
                rows_read: run.ingest.rows_read,
                rows_skipped: run.ingest.row_errors.len(),
            },
            spikes: SpikeSummary {
                quantile: run.spikes.quantile,
                threshold: run.spikes.threshold,
                spike_dates: run.spikes.spike_dates(),
                capped_rows: run.capped_rows,
                holiday_rows: run.holidays.len(),
            },
            split: SplitSummary {
                train_rows: run.train.len(),
                test_rows: run.test.len(),
                test_start: run.test.first().map(|o| o.date),
            },
            model: ModelSummary {
                history_start: run.model.history_start(),
                history_end: run.model.history_end(),
                changepoints: run.model.changepoint_dates(),
                holiday_columns: run.model.holiday_labels(),
                sigma_obs: run.model.sigma_obs(),
            },
            test_metrics: run.accuracy,
            cv_performance: &run.performance,
        }
    }
}

/// Write the run summary to `path` as pretty-printed JSON.
pub fn write_summary_json(path: &Path, config: &ForecastConfig, run: &RunOutput) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::output(format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &RunSummary::new(config, run))
        .map_err(|e| AppError::output(format!("Failed to write summary JSON: {e}")))?;
    // Small summaries stay in the buffer until here.
    out.flush()
        .map_err(|e| AppError::output(format!("Failed to write summary JSON '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::run_forecast;
    use chrono::Duration;

    fn small_run(dir: &Path) -> (ForecastConfig, RunOutput) {
        let csv = dir.join("clicks.csv");
        let mut body = String::from("Date,Clicks\n");
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        for i in 0..120 {
            let spike = if i == 40 { 500.0 } else { 0.0 };
            body.push_str(&format!("{},{}\n", start + Duration::days(i), 100.0 + i as f64 + spike));
        }
        std::fs::write(&csv, body).unwrap();

        let mut config = ForecastConfig::for_csv(&csv);
        config.skip_cv = true;
        config.test_days = 20;
        config.forecast_days = 20;
        config.model.yearly_seasonality = false;
        config.model.uncertainty_samples = 0;
        let run = run_forecast(&config).unwrap();
        (config, run)
    }

    #[test]
    fn summary_json_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let (config, run) = small_run(dir.path());
        let path = dir.path().join("summary.json");

        write_summary_json(&path, &config, &run).unwrap();
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(json["tool"], "clickcast");
        let threshold = json["spikes"]["threshold"].as_f64().unwrap();
        assert!((threshold - run.spikes.threshold).abs() < 1e-9);
        assert_eq!(json["split"]["train_rows"], 100);
        assert_eq!(json["split"]["test_rows"], 20);
        assert_eq!(json["split"]["test_start"], "2023-04-11");
        let mae = json["test_metrics"]["mae"].as_f64().unwrap();
        assert!((mae - run.accuracy.mae).abs() < 1e-9);
        assert!(json["test_metrics"]["rmse"].is_number());
        assert_eq!(json["cv_performance"].as_array().map(Vec::len), Some(0));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn full_device_is_an_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let (config, run) = small_run(dir.path());
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }

        let err = write_summary_json(full, &config, &run).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_OUTPUT);
    }
}
