//! Interactive input-file picker for `clickcast run` / `clickcast view`.
//!
//! Kept apart from clap: clap parses flags, the picker only runs when `-f` is
//! missing. Candidates are `*.csv` files below the working directory; files
//! whose header lacks `Date`/`Clicks` are listed but marked, so a stray export
//! is easy to spot before the run fails on it.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::io::has_click_columns;

const MAX_DEPTH: usize = 4;

/// Directories that never hold input tables (build output, VCS, our own plots).
const SKIPPED_DIRS: [&str; 4] = [".git", "target", "node_modules", "plots"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvCandidate {
    pub path: PathBuf,
    pub has_click_columns: bool,
}

/// Ask the user for an input CSV.
pub fn prompt_for_csv_path() -> Result<PathBuf, AppError> {
    let candidates = discover_csv_files(Path::new("."));
    if candidates.is_empty() {
        return Err(AppError::input(
            "No .csv files found. Pass one with `clickcast -f <file.csv>` or create one with `clickcast sample`.",
        ));
    }

    println!("Input tables:");
    for (i, c) in candidates.iter().enumerate() {
        let note = if c.has_click_columns { "" } else { "  (no Date/Clicks header)" };
        println!("{:>3}) {}{note}", i + 1, display_path(&c.path));
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("File number or path [1-{}, q quits]: ", candidates.len());
        io::stdout()
            .flush()
            .map_err(|e| AppError::input(format!("Failed to write prompt: {e}")))?;

        let Some(line) = lines.next() else {
            return Err(AppError::input(
                "No input file chosen. Pass one with `clickcast -f <file.csv>`.",
            ));
        };
        let line = line.map_err(|e| AppError::input(format!("Failed to read input: {e}")))?;

        match resolve_choice(line.trim(), &candidates) {
            Choice::Quit => return Err(AppError::input("Canceled.")),
            Choice::Path(path) => match validate_csv_path(&path) {
                Ok(path) => return Ok(path),
                Err(err) => println!("{err}"),
            },
            Choice::OutOfRange(n) => println!("No file numbered {n}."),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Choice {
    Quit,
    Path(PathBuf),
    OutOfRange(usize),
}

fn resolve_choice(input: &str, candidates: &[CsvCandidate]) -> Choice {
    if input.eq_ignore_ascii_case("q") {
        return Choice::Quit;
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=candidates.len()).contains(&n) => Choice::Path(candidates[n - 1].path.clone()),
        Ok(n) => Choice::OutOfRange(n),
        Err(_) => Choice::Path(PathBuf::from(input)),
    }
}

/// Check that `path` is an existing `.csv` file.
pub fn validate_csv_path(path: &Path) -> Result<PathBuf, AppError> {
    let meta = fs::metadata(path)
        .map_err(|_| AppError::input(format!("Input file not found: {}", path.display())))?;
    if meta.is_dir() {
        return Err(AppError::input(format!("{} is a directory, not a CSV file.", path.display())));
    }
    if !is_csv(path) {
        return Err(AppError::input(format!(
            "Expected a .csv click table, got {}.",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

/// `*.csv` files under `root`, sorted by path. Walks at most `MAX_DEPTH` levels.
pub fn discover_csv_files(root: &Path) -> Vec<CsvCandidate> {
    let mut found = Vec::new();
    let mut pending = vec![(root.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(kind) = entry.file_type() else {
                continue;
            };
            if kind.is_dir() {
                let skipped = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| SKIPPED_DIRS.contains(&n));
                if !skipped && depth < MAX_DEPTH {
                    pending.push((path, depth + 1));
                }
            } else if kind.is_file() && is_csv(&path) {
                found.push(CsvCandidate {
                    has_click_columns: has_click_columns(&path),
                    path,
                });
            }
        }
    }

    found.sort_by_key(|c| display_path(&c.path));
    found
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn display_path(path: &Path) -> String {
    path.strip_prefix("./").unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(found: &[CsvCandidate]) -> Vec<String> {
        found
            .iter()
            .filter_map(|c| c.path.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect()
    }

    #[test]
    fn lists_csv_files_and_marks_headers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "Date,Clicks\n2024-01-01,3\n").unwrap();
        fs::write(dir.path().join("a.CSV"), "day,visits\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("plots")).unwrap();
        fs::write(dir.path().join("plots").join("c.csv"), "Date,Clicks\n").unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data").join("d.csv"), "\u{feff}date , CLICKS\n").unwrap();

        let found = discover_csv_files(dir.path());
        assert_eq!(names(&found), ["a.CSV", "b.csv", "d.csv"]);
        let flags: Vec<bool> = found.iter().map(|c| c.has_click_columns).collect();
        assert_eq!(flags, [false, true, true]);
    }

    #[test]
    fn choices_map_to_paths() {
        let candidates = vec![CsvCandidate {
            path: PathBuf::from("clicks.csv"),
            has_click_columns: true,
        }];
        assert_eq!(resolve_choice("Q", &candidates), Choice::Quit);
        assert_eq!(resolve_choice("1", &candidates), Choice::Path(PathBuf::from("clicks.csv")));
        assert_eq!(resolve_choice("2", &candidates), Choice::OutOfRange(2));
        assert_eq!(resolve_choice("other.csv", &candidates), Choice::Path(PathBuf::from("other.csv")));
    }

    #[test]
    fn rejects_non_csv_paths() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        fs::write(&txt, "").unwrap();
        assert!(validate_csv_path(&txt).is_err());
        assert!(validate_csv_path(dir.path()).is_err());
        assert!(validate_csv_path(&dir.path().join("missing.csv")).is_err());
    }
}
