//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::PathBuf;

use crate::app::pipeline::RunOutput;
use crate::domain::{ForecastConfig, Observation, PerformanceRow, TestResidual};
use crate::report::LargestMisses;

/// Row errors listed individually before the rest are summarized.
const MAX_LISTED_ROW_ERRORS: usize = 5;
/// Horizons shown from the CV performance table.
const PERFORMANCE_ROWS_SHOWN: usize = 6;

/// Format the full run summary (input, spikes, split, model, CV, test scores).
pub fn format_run_summary(run: &RunOutput, config: &ForecastConfig) -> String {
    let mut out = String::new();
    let stats = &run.ingest.stats;

    out.push_str("=== clickcast - Web Traffic Forecast ===\n");
    let _ = writeln!(out, "Input: {}", config.csv_path.display());
    let _ = writeln!(
        out,
        "Rows: n={} (read={}, skipped={}) | dates=[{}, {}] | clicks=[{:.1}, {:.1}] mean={:.1}",
        stats.n_rows,
        run.ingest.rows_read,
        run.ingest.row_errors.len(),
        stats.first_date,
        stats.last_date,
        stats.clicks_min,
        stats.clicks_max,
        stats.clicks_mean,
    );
    for e in run.ingest.row_errors.iter().take(MAX_LISTED_ROW_ERRORS) {
        let _ = writeln!(out, "  line {}: {}", e.line, truncate(&e.message, 72));
    }
    if run.ingest.row_errors.len() > MAX_LISTED_ROW_ERRORS {
        let _ = writeln!(
            out,
            "  ... and {} more",
            run.ingest.row_errors.len() - MAX_LISTED_ROW_ERRORS
        );
    }
    if run.ingest.reordered {
        out.push_str("  (rows were sorted by date)\n");
    }

    let extended: BTreeSet<_> = run
        .holidays
        .iter()
        .filter(|h| h.upper_window == config.extended_upper_window && config.extended_spike_dates.contains(&h.date))
        .map(|h| h.date.to_string())
        .collect();
    out.push_str("\nSpikes:\n");
    let _ = writeln!(
        out,
        "- threshold: {:.2} (q={:.2}) | spikes={} | capped={}",
        run.spikes.threshold,
        run.spikes.quantile,
        run.spikes.spikes.len(),
        run.capped_rows,
    );
    let _ = writeln!(
        out,
        "- holidays : {} rows, window +{}d ({} extended to +{}d{})",
        run.holidays.len(),
        config.spike_upper_window,
        extended.len(),
        config.extended_upper_window,
        if extended.is_empty() {
            String::new()
        } else {
            format!(": {}", extended.into_iter().collect::<Vec<_>>().join(", "))
        },
    );

    out.push_str("\nSplit:\n");
    let _ = writeln!(out, "- train: {}", fmt_span(&run.train));
    let _ = writeln!(out, "- test : {}", fmt_span(&run.test));

    let layout = run.model.layout();
    out.push_str("\nModel:\n");
    let _ = writeln!(
        out,
        "- columns: {} (changepoints={}, yearly={}, weekly={}, holidays={})",
        layout.n_cols,
        layout.changepoints.len(),
        layout.yearly.as_ref().map_or(0, |r| r.len()),
        layout.weekly.as_ref().map_or(0, |r| r.len()),
        layout.holidays.len(),
    );
    let labels = run.model.holiday_labels();
    if !labels.is_empty() {
        let _ = writeln!(out, "- holiday columns: {}", labels.join(", "));
    }
    let _ = writeln!(out, "- sigma_obs: {:.3} clicks", run.model.sigma_obs());

    out.push_str("\nCross-validation:\n");
    if run.cv_rows.is_empty() {
        out.push_str("- skipped\n");
    } else {
        let folds: BTreeSet<_> = run.cv_rows.iter().map(|r| r.cutoff).collect();
        let _ = writeln!(
            out,
            "- folds={} | predictions={} | initial={}d period={}d horizon={}d",
            folds.len(),
            run.cv_rows.len(),
            config.cv.initial_days,
            config.cv.period_days,
            config.cv.horizon_days,
        );
        out.push_str(&format_performance_table(&run.performance));
    }

    out.push_str("\nTest window:\n");
    let _ = writeln!(
        out,
        "- MAE : {:.3}\n- RMSE: {:.3}\n- MAPE: {}",
        run.accuracy.mae,
        run.accuracy.rmse,
        fmt_pct(run.accuracy.mape),
    );
    out.push('\n');

    out
}

/// Performance at a handful of evenly spaced horizons.
pub fn format_performance_table(rows: &[PerformanceRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>8} {:>12} {:>10} {:>10} {:>8} {:>9}",
        "horizon", "mse", "rmse", "mae", "mape", "coverage"
    );
    let _ = writeln!(out, "{:-<8} {:-<12} {:-<10} {:-<10} {:-<8} {:-<9}", "", "", "", "", "", "");
    for i in select_evenly(rows.len(), PERFORMANCE_ROWS_SHOWN) {
        let r = &rows[i];
        let _ = writeln!(
            out,
            "{:>7}d {:>12.2} {:>10.3} {:>10.3} {:>8} {:>8.1}%",
            r.horizon_days,
            r.mse,
            r.rmse,
            r.mae,
            fmt_pct(r.mape),
            100.0 * r.coverage,
        );
    }
    out
}

/// Format the largest over/under forecast days.
pub fn format_largest_misses(misses: &LargestMisses) -> String {
    let mut out = String::new();

    out.push_str("Largest under-forecasts (actual above forecast):\n");
    out.push_str(&format_residual_table(&misses.under));
    out.push('\n');

    out.push_str("Largest over-forecasts (actual below forecast):\n");
    out.push_str(&format_residual_table(&misses.over));

    out
}

/// List of files written by the run.
pub fn format_outputs(paths: &[PathBuf]) -> String {
    let mut out = String::from("Wrote:\n");
    for p in paths {
        let _ = writeln!(out, "- {}", p.display());
    }
    out
}

fn format_residual_table(rows: &[TestResidual]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<12} {:>12} {:>12} {:>12}", "date", "actual", "predicted", "residual").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<12} {:-<12} {:-<12}", "", "", "", "").trim_end());
    out.push('\n');
    for r in rows {
        let _ = writeln!(
            out,
            "{:<12} {:>12.2} {:>12.2} {:>12.2}",
            r.date.to_string(),
            r.actual,
            r.predicted,
            r.residual
        );
    }
    out
}

/// Indices of up to `k` rows spread evenly over `0..len`, first and last included.
fn select_evenly(len: usize, k: usize) -> Vec<usize> {
    if len <= k {
        return (0..len).collect();
    }
    if k <= 1 {
        return vec![len - 1];
    }
    let mut idx: Vec<usize> = (0..k)
        .map(|i| ((i as f64) * (len - 1) as f64 / (k - 1) as f64).round() as usize)
        .collect();
    idx.dedup();
    idx
}

fn fmt_span(rows: &[Observation]) -> String {
    match (rows.first(), rows.last()) {
        (Some(a), Some(b)) => format!("n={} [{}, {}]", rows.len(), a.date, b.date),
        _ => "n=0".to_string(),
    }
}

fn fmt_pct(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}%")).unwrap_or_else(|| "n/a".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_evenly_includes_ends() {
        assert_eq!(select_evenly(3, 6), vec![0, 1, 2]);
        assert_eq!(select_evenly(11, 6), vec![0, 2, 4, 6, 8, 10]);
        assert_eq!(select_evenly(0, 6), Vec::<usize>::new());
    }

    #[test]
    fn percent_formatting() {
        assert_eq!(fmt_pct(Some(15.0)), "15.00%");
        assert_eq!(fmt_pct(None), "n/a");
    }

    #[test]
    fn truncate_long_messages() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd.");
    }

    #[test]
    fn performance_table_lists_rows() {
        let rows: Vec<PerformanceRow> = (1..=3)
            .map(|h| PerformanceRow {
                horizon_days: h,
                mse: 4.0,
                rmse: 2.0,
                mae: 1.5,
                mape: None,
                coverage: 0.8,
            })
            .collect();
        let table = format_performance_table(&rows);
        assert_eq!(table.lines().count(), 5);
        assert!(table.contains("      3d"));
        assert!(table.contains("n/a"));
        assert!(table.contains("80.0%"));
    }
}
