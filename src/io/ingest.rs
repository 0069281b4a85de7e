//! CSV ingest and normalization.
//!
//! Turns a `Date,Clicks` CSV into a date-ordered series of observations that
//! is safe to fit.
//!
//! - Strict schema for the two required columns (exit code 2)
//! - Row-level validation: bad rows are skipped and reported
//! - Duplicate dates are rejected; unsorted input is sorted

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::domain::{DatasetStats, Observation};
use crate::error::AppError;
use crate::math::mean;

pub const DATE_COLUMN: &str = "date";
pub const CLICKS_COLUMN: &str = "clicks";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: ordered observations + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedSeries {
    pub observations: Vec<Observation>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    /// Whether the input had to be reordered by date.
    pub reordered: bool,
}

impl IngestedSeries {
    pub fn rows_used(&self) -> usize {
        self.observations.len()
    }
}

/// Load the click table from `path`.
pub fn load_clicks(path: &Path) -> Result<IngestedSeries, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_clicks(file)
}

/// Whether the CSV at `path` has both required columns (headers only).
pub fn has_click_columns(path: &Path) -> bool {
    let Ok(mut reader) = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path) else {
        return false;
    };
    match reader.headers() {
        Ok(headers) => {
            let map = build_header_map(headers);
            map.contains_key(DATE_COLUMN) && map.contains_key(CLICKS_COLUMN)
        }
        Err(_) => false,
    }
}

/// Same as [`load_clicks`] for any reader.
pub fn read_clicks<R: std::io::Read>(reader: R) -> Result<IngestedSeries, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    for column in [DATE_COLUMN, CLICKS_COLUMN] {
        if !header_map.contains_key(column) {
            return Err(AppError::input(format!(
                "Missing required column: `{column}` (found: {}).",
                headers.iter().collect::<Vec<_>>().join(", ")
            )));
        }
    }

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map) {
            Ok(obs) => observations.push(obs),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        tracing::warn!(skipped = row_errors.len(), "skipped malformed rows");
    }
    if observations.is_empty() {
        return Err(AppError::data("No valid rows remain after parsing the CSV."));
    }

    let reordered = !observations.windows(2).all(|w| w[0].date <= w[1].date);
    if reordered {
        tracing::warn!("input rows are not in date order; sorting by date");
        observations.sort_by_key(|o| o.date);
    }
    if let Some(dup) = observations.windows(2).find(|w| w[0].date == w[1].date) {
        return Err(AppError::input(format!(
            "Duplicate date {} in input; expected one row per day.",
            dup[0].date
        )));
    }

    let stats = compute_stats(&observations)
        .ok_or_else(|| AppError::data("No valid rows remain after parsing the CSV."))?;

    Ok(IngestedSeries {
        observations,
        stats,
        row_errors,
        rows_read,
        reordered,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        // First occurrence wins on repeated headers.
        .filter(|(name, _)| seen.insert(name.clone()))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<Observation, String> {
    let date = parse_date(get_required(record, header_map, DATE_COLUMN)?)?;
    let raw = get_required(record, header_map, CLICKS_COLUMN)?;
    let clicks = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid clicks value '{raw}'."))?;
    if !clicks.is_finite() {
        return Err(format!("Non-finite clicks value '{raw}'."));
    }
    Ok(Observation::new(date, clicks))
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, YYYY/MM/DD, DD/MM/YYYY, DD-MM-YYYY, or an ISO timestamp."
    ))
}

fn compute_stats(observations: &[Observation]) -> Option<DatasetStats> {
    let first = observations.first()?;
    let last = observations.last()?;
    let clicks: Vec<f64> = observations.iter().map(|o| o.clicks).collect();

    Some(DatasetStats {
        n_rows: observations.len(),
        first_date: first.date,
        last_date: last.date,
        clicks_min: clicks.iter().copied().fold(f64::INFINITY, f64::min),
        clicks_max: clicks.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        clicks_mean: mean(&clicks),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn reads_file_with_bom_and_mixed_case_headers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "\u{feff}Date , CLICKS\n2024-01-01,10\n2024-01-02, 12.5\n").unwrap();

        let series = load_clicks(file.path()).unwrap();
        assert_eq!(series.rows_used(), 2);
        assert_eq!(series.observations[1], Observation::new(d(2024, 1, 2), 12.5));
        assert_eq!(series.stats.first_date, d(2024, 1, 1));
        assert!((series.stats.clicks_mean - 11.25).abs() < 1e-12);
        assert!(series.row_errors.is_empty());
    }

    #[test]
    fn skips_bad_rows_and_reports_lines() {
        let csv = "Date,Clicks\n2024-01-01,10\nnot-a-date,5\n2024-01-03,abc\n2024-01-04,NaN\n2024-01-05,7\n";
        let series = read_clicks(csv.as_bytes()).unwrap();
        assert_eq!(series.rows_read, 5);
        assert_eq!(series.rows_used(), 2);
        let lines: Vec<usize> = series.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn sorts_unordered_rows() {
        let csv = "Date,Clicks\n2024-01-03,3\n2024-01-01,1\n2024-01-02,2\n";
        let series = read_clicks(csv.as_bytes()).unwrap();
        assert!(series.reordered);
        let clicks: Vec<f64> = series.observations.iter().map(|o| o.clicks).collect();
        assert_eq!(clicks, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn duplicate_dates_are_input_errors() {
        let csv = "Date,Clicks\n2024-01-01,1\n2024-01-01,2\n";
        let err = read_clicks(csv.as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }

    #[test]
    fn missing_column_and_empty_table() {
        let err = read_clicks("Date,Visits\n2024-01-01,1\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);

        let err = read_clicks("Date,Clicks\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
    }

    #[test]
    fn missing_file_is_input_error() {
        let err = load_clicks(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }

    #[test]
    fn date_formats() {
        assert_eq!(parse_date("2024-02-29").unwrap(), d(2024, 2, 29));
        assert_eq!(parse_date("2024/02/29").unwrap(), d(2024, 2, 29));
        assert_eq!(parse_date("29/02/2024").unwrap(), d(2024, 2, 29));
        assert_eq!(parse_date("29-02-2024").unwrap(), d(2024, 2, 29));
        assert_eq!(parse_date("2024-02-29T13:45:00").unwrap(), d(2024, 2, 29));
        assert_eq!(parse_date("2024-02-29T13:45:00+02:00").unwrap(), d(2024, 2, 29));
        assert!(parse_date("Feb 29").is_err());
    }
}
