//! Command-line parsing for the click forecaster.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_EXTENDED_SPIKE_DATES, DEFAULT_FORECAST_FILE};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "clickcast", version, about = "Daily web-traffic click forecaster")]
pub struct Cli {
    /// More log output (debug).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Less log output (warnings only).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cap spikes, fit, cross-validate, forecast, score and write the forecast CSV.
    Run(RunArgs),
    /// Write a synthetic `Date,Clicks` CSV.
    Sample(SampleArgs),
    /// Run the forecast and browse the results in a terminal UI.
    ///
    /// This uses the same underlying pipeline as `clickcast run`, but renders results
    /// in a terminal UI using Ratatui.
    View(RunArgs),
}

/// Options for a forecasting run.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Input CSV with `Date` and `Clicks` columns (prompts when omitted).
    #[arg(short = 'f', long = "file", value_name = "CSV")]
    pub file: Option<PathBuf>,

    /// Forecast output CSV.
    #[arg(short = 'o', long, default_value = DEFAULT_FORECAST_FILE)]
    pub output: PathBuf,

    /// Percentile (0..1) above which a day counts as a spike.
    #[arg(long, default_value_t = 0.95)]
    pub spike_quantile: f64,

    /// Spike date that gets the extended holiday window (repeatable).
    #[arg(long = "extended-spike", value_name = "DATE", default_values = DEFAULT_EXTENDED_SPIKE_DATES)]
    pub extended_spikes: Vec<NaiveDate>,

    /// Days after an ordinary spike that share its effect.
    #[arg(long, default_value_t = 1)]
    pub spike_window: i64,

    /// Days after an extended spike that share its effect.
    #[arg(long, default_value_t = 2)]
    pub extended_window: i64,

    /// Rows held out at the end of the table for scoring.
    #[arg(long, default_value_t = 60)]
    pub test_days: usize,

    /// Days to forecast past the end of the training rows.
    #[arg(long, default_value_t = 60)]
    pub horizon: usize,

    #[command(flatten)]
    pub cv: CvArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Directory for the SVG diagnostic charts.
    #[arg(long, default_value = "plots")]
    pub plot_dir: PathBuf,

    /// Do not write SVG charts.
    #[arg(long)]
    pub no_svg: bool,

    /// Skip the ASCII forecast plot in the terminal.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export the raw cross-validation predictions to CSV.
    #[arg(long = "export-cv", value_name = "CSV")]
    pub export_cv: Option<PathBuf>,

    /// Export a JSON summary of the run.
    #[arg(long = "export-summary", value_name = "JSON")]
    pub export_summary: Option<PathBuf>,
}

/// Cross-validation windows.
#[derive(Debug, Args, Clone)]
pub struct CvArgs {
    /// Minimum training span (days) before the first cutoff.
    #[arg(long, default_value_t = 365)]
    pub cv_initial: i64,

    /// Spacing (days) between cutoffs.
    #[arg(long, default_value_t = 30)]
    pub cv_period: i64,

    /// Days forecast after each cutoff.
    #[arg(long, default_value_t = 60)]
    pub cv_horizon: i64,

    /// Fraction of CV points averaged per horizon.
    #[arg(long, default_value_t = 0.1)]
    pub rolling_window: f64,

    /// Skip cross-validation.
    #[arg(long)]
    pub no_cv: bool,
}

/// Additive model hyper-parameters.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Number of potential trend changepoints.
    #[arg(long, default_value_t = 25)]
    pub changepoints: usize,

    /// Fraction of history in which changepoints are placed.
    #[arg(long, default_value_t = 0.8)]
    pub changepoint_range: f64,

    /// Trend flexibility.
    #[arg(long, default_value_t = 0.05)]
    pub changepoint_prior_scale: f64,

    /// Seasonality strength.
    #[arg(long, default_value_t = 10.0)]
    pub seasonality_prior_scale: f64,

    /// Spike effect strength.
    #[arg(long, default_value_t = 10.0)]
    pub holidays_prior_scale: f64,

    /// Fourier order of the yearly cycle.
    #[arg(long, default_value_t = 10)]
    pub yearly_order: usize,

    /// Fourier order of the weekly cycle.
    #[arg(long, default_value_t = 3)]
    pub weekly_order: usize,

    /// Disable yearly seasonality.
    #[arg(long)]
    pub no_yearly: bool,

    /// Disable weekly seasonality.
    #[arg(long)]
    pub no_weekly: bool,

    /// Uncertainty interval width.
    #[arg(long, default_value_t = 0.8)]
    pub interval_width: f64,

    /// Simulated paths per interval (0 disables intervals).
    #[arg(long, default_value_t = 1000)]
    pub uncertainty_samples: usize,

    /// Random seed for interval simulation.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Options for generating a synthetic click table.
#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Output CSV path.
    #[arg(short = 'o', long, default_value = "clicks.csv")]
    pub output: PathBuf,

    /// First date of the table.
    #[arg(long, default_value = "2021-01-01")]
    pub start: NaiveDate,

    /// Number of daily rows.
    #[arg(long, default_value_t = 1095)]
    pub days: usize,

    /// Clicks on the first day, before seasonality.
    #[arg(long, default_value_t = 1000.0)]
    pub base: f64,

    /// Daily probability of a traffic spike.
    #[arg(long, default_value_t = 0.02)]
    pub spike_prob: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::parse_from(["clickcast", "run", "-f", "x.csv"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.file, Some(PathBuf::from("x.csv")));
        assert_eq!(args.test_days, 60);
        assert_eq!(args.cv.cv_initial, 365);
        assert_eq!(args.extended_spikes.len(), 2);
        assert!(!cli.verbose);
    }

    #[test]
    fn extended_spikes_override_defaults() {
        let cli = Cli::parse_from(["clickcast", "-q", "run", "--extended-spike", "2024-12-24"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.extended_spikes, vec![NaiveDate::from_ymd_opt(2024, 12, 24).unwrap()]);
        assert!(cli.quiet);
    }

    #[test]
    fn terminal_plot_is_only_switched_off() {
        let cli = Cli::parse_from(["clickcast", "run"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(!args.no_plot);

        let cli = Cli::parse_from(["clickcast", "run", "--no-plot"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.no_plot);

        assert!(Cli::try_parse_from(["clickcast", "run", "--plot"]).is_err());
    }

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
