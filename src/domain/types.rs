//! Shared domain types.
//!
//! These types are intentionally kept small and serializable so they can be:
//!
//! - used in-memory during fitting and cross-validation
//! - exported to CSV/JSON
//! - rendered by the plot and TUI front-ends

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default output file for the forecast table.
pub const DEFAULT_FORECAST_FILE: &str = "web_traffic_forecast_results.csv";

/// Spike dates that get an extended (two-day) holiday window by default.
///
/// Black Friday and Cyber Monday 2023.
pub const DEFAULT_EXTENDED_SPIKE_DATES: [&str; 2] = ["2023-11-24", "2023-11-27"];

/// One row of the click table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub clicks: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, clicks: f64) -> Self {
        Self { date, clicks }
    }
}

/// Summary stats about the rows actually used.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub n_rows: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub clicks_min: f64,
    pub clicks_max: f64,
    pub clicks_mean: f64,
}

/// A holiday/event row passed to the model as an exogenous regressor.
///
/// The effect is active from `date + lower_window` to `date + upper_window`
/// (inclusive, in days), with one coefficient per offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub name: String,
    pub date: NaiveDate,
    pub lower_window: i64,
    pub upper_window: i64,
}

/// Seasonal or trend component of the additive model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Trend,
    Yearly,
    Weekly,
    Holidays,
}

impl Component {
    pub fn display_name(self) -> &'static str {
        match self {
            Component::Trend => "trend",
            Component::Yearly => "yearly",
            Component::Weekly => "weekly",
            Component::Holidays => "holidays",
        }
    }
}

/// Model prediction for one date.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastRow {
    pub ds: NaiveDate,
    pub trend: f64,
    pub yearly: f64,
    pub weekly: f64,
    pub holidays: f64,
    /// `yearly + weekly + holidays`.
    pub additive_terms: f64,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

impl ForecastRow {
    pub fn component(&self, component: Component) -> f64 {
        match component {
            Component::Trend => self.trend,
            Component::Yearly => self.yearly,
            Component::Weekly => self.weekly,
            Component::Holidays => self.holidays,
        }
    }
}

/// One out-of-sample prediction produced during cross-validation.
#[derive(Debug, Clone, Serialize)]
pub struct CvRow {
    pub ds: NaiveDate,
    pub cutoff: NaiveDate,
    pub y: f64,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

impl CvRow {
    /// Days between the cutoff and the predicted date.
    pub fn horizon_days(&self) -> i64 {
        (self.ds - self.cutoff).num_days()
    }
}

/// Rolling accuracy at one forecast horizon.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceRow {
    pub horizon_days: i64,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Omitted when any actual value is (close to) zero.
    pub mape: Option<f64>,
    pub coverage: f64,
}

/// Point-forecast accuracy on the held-out test window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccuracyMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Percent. `None` when every actual value is zero.
    pub mape: Option<f64>,
}

/// Actual vs predicted on one test date.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TestResidual {
    pub date: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
    pub residual: f64,
}

/// Additive model hyper-parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub yearly_seasonality: bool,
    pub weekly_seasonality: bool,
    pub yearly_order: usize,
    pub weekly_order: usize,

    /// Maximum number of potential trend changepoints.
    pub n_changepoints: usize,
    /// Fraction of the history in which changepoints may be placed.
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub holidays_prior_scale: f64,

    /// Width of the uncertainty interval (0.8 = 10%..90%).
    pub interval_width: f64,
    /// Number of simulated paths for the interval (0 disables intervals).
    pub uncertainty_samples: usize,
    /// RNG seed for uncertainty sampling.
    pub seed: u64,

    pub holidays: Vec<Holiday>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            yearly_seasonality: true,
            weekly_seasonality: true,
            yearly_order: 10,
            weekly_order: 3,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            holidays_prior_scale: 10.0,
            interval_width: 0.8,
            uncertainty_samples: 1000,
            seed: 42,
            holidays: Vec::new(),
        }
    }
}

/// Cross-validation windows, all in days.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CvSettings {
    pub initial_days: i64,
    pub period_days: i64,
    pub horizon_days: i64,
    /// Fraction of CV points averaged per horizon in the performance table.
    pub rolling_window: f64,
}

impl Default for CvSettings {
    fn default() -> Self {
        Self {
            initial_days: 365,
            period_days: 30,
            horizon_days: 60,
            rolling_window: 0.1,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone, Serialize)]
pub struct ForecastConfig {
    pub csv_path: PathBuf,
    pub output_path: PathBuf,

    /// Percentile (0..1) above which a day counts as a spike.
    pub spike_quantile: f64,
    /// Spike dates that get `extended_upper_window` instead of `spike_upper_window`.
    pub extended_spike_dates: Vec<NaiveDate>,
    pub spike_upper_window: i64,
    pub extended_upper_window: i64,

    /// Rows held out at the end of the table.
    pub test_days: usize,
    /// Days forecast past the end of the training data.
    pub forecast_days: usize,

    pub cv: CvSettings,
    /// Skip cross-validation entirely.
    pub skip_cv: bool,
    pub model: ModelConfig,

    /// SVG output directory (`None` disables the SVG charts).
    pub plot_dir: Option<PathBuf>,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_cv: Option<PathBuf>,
    pub export_summary: Option<PathBuf>,
}

impl ForecastConfig {
    /// Default configuration for a given input file.
    pub fn for_csv(csv_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            output_path: PathBuf::from(DEFAULT_FORECAST_FILE),
            spike_quantile: 0.95,
            extended_spike_dates: default_extended_spike_dates(),
            spike_upper_window: 1,
            extended_upper_window: 2,
            test_days: 60,
            forecast_days: 60,
            cv: CvSettings::default(),
            skip_cv: false,
            model: ModelConfig::default(),
            plot_dir: Some(PathBuf::from("plots")),
            plot: true,
            plot_width: 100,
            plot_height: 25,
            export_cv: None,
            export_summary: None,
        }
    }
}

pub fn default_extended_spike_dates() -> Vec<NaiveDate> {
    DEFAULT_EXTENDED_SPIKE_DATES
        .iter()
        .filter_map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_extended_dates_parse() {
        let dates = default_extended_spike_dates();
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2023, 11, 24).unwrap());
    }

    #[test]
    fn cv_row_horizon_in_days() {
        let row = CvRow {
            ds: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            cutoff: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            y: 1.0,
            yhat: 1.0,
            yhat_lower: 1.0,
            yhat_upper: 1.0,
        };
        assert_eq!(row.horizon_days(), 9);
    }
}
