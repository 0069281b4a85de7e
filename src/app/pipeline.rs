//! Shared forecasting pipeline used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> spike capping -> holidays -> split -> fit -> cross-validate -> forecast -> score
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use crate::domain::{
    AccuracyMetrics, CvRow, ForecastConfig, ForecastRow, Holiday, ModelConfig, Observation, PerformanceRow,
    TestResidual,
};
use crate::error::AppError;
use crate::eval::{accuracy, cross_validate, performance_metrics};
use crate::io::ingest::{IngestedSeries, load_clicks};
use crate::models::{FittedModel, fit};
use crate::prep::{SpikeReport, cap_outliers, detect_spikes, spike_holidays, train_test_split};

/// All computed outputs of a single forecasting run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedSeries,
    pub spikes: SpikeReport,
    /// The full series after capping.
    pub capped: Vec<Observation>,
    pub capped_rows: usize,
    pub holidays: Vec<Holiday>,
    pub train: Vec<Observation>,
    pub test: Vec<Observation>,
    pub model: FittedModel,
    /// Empty when cross-validation was skipped.
    pub cv_rows: Vec<CvRow>,
    pub performance: Vec<PerformanceRow>,
    /// History fit followed by the future horizon.
    pub forecast: Vec<ForecastRow>,
    pub accuracy: AccuracyMetrics,
    pub residuals: Vec<TestResidual>,
}

impl RunOutput {
    /// Forecast rows past the end of the training data.
    pub fn future(&self) -> &[ForecastRow] {
        &self.forecast[self.model.n_history().min(self.forecast.len())..]
    }
}

/// Execute the full forecasting pipeline and return the computed outputs.
pub fn run_forecast(config: &ForecastConfig) -> Result<RunOutput, AppError> {
    // 1) Load the click table.
    let ingest = load_clicks(&config.csv_path)?;
    tracing::info!(
        rows = ingest.rows_used(),
        skipped = ingest.row_errors.len(),
        first = %ingest.stats.first_date,
        last = %ingest.stats.last_date,
        "loaded click table"
    );

    // 2) Detect spikes on the raw series, then cap them.
    let spikes = detect_spikes(&ingest.observations, config.spike_quantile)?;
    let mut capped = ingest.observations.clone();
    let capped_rows = cap_outliers(&mut capped, spikes.threshold);
    tracing::info!(
        quantile = spikes.quantile,
        threshold = spikes.threshold,
        capped = capped_rows,
        "capped outliers"
    );

    // 3) Spikes become holiday regressors.
    let holidays = spike_holidays(
        &spikes.spike_dates(),
        &config.extended_spike_dates,
        config.spike_upper_window,
        config.extended_upper_window,
    );

    // 4) Positional hold-out.
    let (train, test) = train_test_split(&capped, config.test_days)?;
    tracing::info!(train = train.len(), test = test.len(), "split series");

    // 5) Fit on the training rows.
    let model_config = ModelConfig {
        holidays: holidays.clone(),
        ..config.model.clone()
    };
    let model = fit(&model_config, &train)?;
    tracing::info!(
        columns = model.layout().n_cols,
        holiday_columns = model.holiday_labels().len(),
        sigma_obs = model.sigma_obs(),
        "fitted model"
    );

    // 6) Simulated historical forecasts on the training rows.
    let (cv_rows, performance) = if config.skip_cv {
        tracing::info!("cross-validation skipped");
        (Vec::new(), Vec::new())
    } else {
        let rows = cross_validate(&model_config, &train, &config.cv)?;
        let performance = performance_metrics(&rows, config.cv.rolling_window)?;
        (rows, performance)
    };

    // 7) Forecast history + horizon and score against the test window.
    let dates = model.make_future_dates(config.forecast_days, true);
    let forecast = model.predict(&dates)?;
    let (accuracy, residuals) = score_test_window(&forecast[model.n_history()..], &test)?;
    tracing::info!(
        mae = accuracy.mae,
        rmse = accuracy.rmse,
        mape = ?accuracy.mape,
        "scored test window"
    );

    Ok(RunOutput {
        ingest,
        spikes,
        capped,
        capped_rows,
        holidays,
        train,
        test,
        model,
        cv_rows,
        performance,
        forecast,
        accuracy,
        residuals,
    })
}

/// Pair future forecast rows with test rows by position.
fn score_test_window(
    future: &[ForecastRow],
    test: &[Observation],
) -> Result<(AccuracyMetrics, Vec<TestResidual>), AppError> {
    if future.len() < test.len() {
        return Err(AppError::input(format!(
            "Forecast horizon ({} days) is shorter than the test window ({} rows).",
            future.len(),
            test.len()
        )));
    }

    let pairs = future.iter().zip(test);
    let mismatched = pairs.clone().filter(|(f, o)| f.ds != o.date).count();
    if mismatched > 0 {
        tracing::warn!(
            mismatched,
            "test dates do not line up with forecast dates; scoring by position"
        );
    }

    let residuals: Vec<TestResidual> = pairs
        .map(|(f, o)| TestResidual {
            date: o.date,
            actual: o.clicks,
            predicted: f.yhat,
            residual: o.clicks - f.yhat,
        })
        .collect();
    let actual: Vec<f64> = residuals.iter().map(|r| r.actual).collect();
    let predicted: Vec<f64> = residuals.iter().map(|r| r.predicted).collect();

    Ok((accuracy(&actual, &predicted)?, residuals))
}
