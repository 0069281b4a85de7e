//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - generates synthetic click tables
//! - runs the forecasting pipeline
//! - prints reports/plots
//! - writes the forecast CSV, charts and optional exports

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Command, RunArgs, SampleArgs};
use crate::domain::{CvSettings, ForecastConfig, ModelConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `clickcast` binary.
pub fn run() -> Result<(), AppError> {
    // `clickcast` and `clickcast -f clicks.csv` behave like `clickcast run ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => {
            init_logging(cli.verbose, cli.quiet);
            handle_run(args)
        }
        Command::Sample(args) => {
            init_logging(cli.verbose, cli.quiet);
            handle_sample(args)
        }
        // The terminal belongs to the UI; log lines would tear the screen.
        Command::View(args) => handle_view(args),
    }
}

/// Install the stderr `fmt` subscriber. `RUST_LOG` wins over the flags.
fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "clickcast=debug"
    } else if quiet {
        "clickcast=warn"
    } else {
        "clickcast=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let csv_path = resolve_csv_path(&args)?;
    let config = forecast_config_from_args(&args, csv_path);
    let run = pipeline::run_forecast(&config)?;

    println!("{}", crate::report::format_run_summary(&run, &config));

    if config.plot {
        println!(
            "{}",
            crate::plot::render_forecast_plot(&run, config.plot_width, config.plot_height)
        );
    }

    let misses = crate::report::largest_misses(&run.residuals, 5);
    println!("{}", crate::report::format_largest_misses(&misses));

    let mut written: Vec<PathBuf> = Vec::new();

    crate::io::write_forecast_csv(&config.output_path, &run.forecast)?;
    written.push(config.output_path.clone());

    if let Some(dir) = &config.plot_dir {
        written.extend(crate::plot::write_charts(dir, &run)?);
    }
    if let Some(path) = &config.export_cv {
        crate::io::write_cv_csv(path, &run.cv_rows)?;
        written.push(path.clone());
    }
    if let Some(path) = &config.export_summary {
        crate::io::write_summary_json(path, &config, &run)?;
        written.push(path.clone());
    }

    info!(files = written.len(), "run complete");
    println!("{}", crate::report::format_outputs(&written));
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let spec = crate::data::SampleSpec::new(args.start, args.days, args.base, args.spike_prob, args.seed);
    let rows = crate::data::generate_clicks(&spec)?;
    crate::data::write_clicks_csv(&args.output, &rows)?;

    info!(rows = rows.len(), seed = args.seed, "sample written");
    println!("Wrote {} rows to {}", rows.len(), args.output.display());
    Ok(())
}

fn handle_view(args: RunArgs) -> Result<(), AppError> {
    let csv_path = resolve_csv_path(&args)?;
    crate::tui::run(forecast_config_from_args(&args, csv_path))
}

fn resolve_csv_path(args: &RunArgs) -> Result<PathBuf, AppError> {
    match &args.file {
        Some(path) => crate::cli::picker::validate_csv_path(path),
        None => crate::cli::picker::prompt_for_csv_path(),
    }
}

pub fn forecast_config_from_args(args: &RunArgs, csv_path: PathBuf) -> ForecastConfig {
    let m = &args.model;
    ForecastConfig {
        csv_path,
        output_path: args.output.clone(),
        spike_quantile: args.spike_quantile,
        extended_spike_dates: args.extended_spikes.clone(),
        spike_upper_window: args.spike_window,
        extended_upper_window: args.extended_window,
        test_days: args.test_days,
        forecast_days: args.horizon,
        cv: CvSettings {
            initial_days: args.cv.cv_initial,
            period_days: args.cv.cv_period,
            horizon_days: args.cv.cv_horizon,
            rolling_window: args.cv.rolling_window,
        },
        skip_cv: args.cv.no_cv,
        model: ModelConfig {
            yearly_seasonality: !m.no_yearly,
            weekly_seasonality: !m.no_weekly,
            yearly_order: m.yearly_order,
            weekly_order: m.weekly_order,
            n_changepoints: m.changepoints,
            changepoint_range: m.changepoint_range,
            changepoint_prior_scale: m.changepoint_prior_scale,
            seasonality_prior_scale: m.seasonality_prior_scale,
            holidays_prior_scale: m.holidays_prior_scale,
            interval_width: m.interval_width,
            uncertainty_samples: m.uncertainty_samples,
            seed: m.seed,
            // Filled by the pipeline from the detected spikes.
            holidays: Vec::new(),
        },
        plot_dir: (!args.no_svg).then(|| args.plot_dir.clone()),
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_cv: args.export_cv.clone(),
        export_summary: args.export_summary.clone(),
    }
}

/// Rewrite argv so `clickcast` defaults to `clickcast run`.
///
/// Rules:
/// - `clickcast`                      -> `clickcast run`
/// - `clickcast -f x.csv ...`         -> `clickcast run -f x.csv ...`
/// - `clickcast --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "sample" | "view");
    if is_subcommand {
        return argv;
    }

    // `-v`/`-q` are global, so `clickcast -v run` must stay as is.
    let is_global_flag = matches!(arg1.as_str(), "-v" | "--verbose" | "-q" | "--quiet");
    if is_global_flag && argv.get(2).is_some_and(|a| matches!(a.as_str(), "run" | "sample" | "view")) {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_runs() {
        assert_eq!(rewrite_args(argv(&["clickcast"])), argv(&["clickcast", "run"]));
    }

    #[test]
    fn leading_flag_inserts_run() {
        assert_eq!(
            rewrite_args(argv(&["clickcast", "-f", "x.csv"])),
            argv(&["clickcast", "run", "-f", "x.csv"])
        );
        assert_eq!(
            rewrite_args(argv(&["clickcast", "-v", "-f", "x.csv"])),
            argv(&["clickcast", "run", "-v", "-f", "x.csv"])
        );
    }

    #[test]
    fn subcommands_help_and_globals_pass_through() {
        for args in [
            &["clickcast", "sample"][..],
            &["clickcast", "view", "-f", "x.csv"],
            &["clickcast", "--help"],
            &["clickcast", "-V"],
            &["clickcast", "-q", "sample"],
        ] {
            assert_eq!(rewrite_args(argv(args)), argv(args));
        }
    }

    #[test]
    fn config_follows_flags() {
        let cli = Cli::parse_from(rewrite_args(argv(&[
            "clickcast",
            "-f",
            "x.csv",
            "--no-svg",
            "--no-plot",
            "--no-weekly",
            "--cv-period",
            "15",
            "--horizon",
            "90",
        ])));
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = forecast_config_from_args(&args, PathBuf::from("x.csv"));

        assert_eq!(config.plot_dir, None);
        assert!(!config.plot);
        assert!(!config.model.weekly_seasonality);
        assert!(config.model.yearly_seasonality);
        assert_eq!(config.cv.period_days, 15);
        assert_eq!(config.forecast_days, 90);
        assert_eq!(config.extended_spike_dates, crate::domain::default_extended_spike_dates());
    }
}
