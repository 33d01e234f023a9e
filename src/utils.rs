//! Helpers for locating input files in the monitored directory.
//!

use anyhow::{Context, Result};
use glob::{glob_with, MatchOptions, Pattern};
use std::path::{Path, PathBuf};

/// Extensions (compared case-insensitively) of files that hold station records.
pub const STATION_EXTENSIONS: [&str; 2] = ["txt", "csv"];

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(wanted))
}

/// Whether `path` names a `.txt` or `.csv` file.
pub fn is_station_file(path: &Path) -> bool {
    STATION_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
}

/// Whether `path` is a `.csv` file, whose first line is a header.
#[inline]
pub fn is_csv(path: &Path) -> bool {
    has_extension(path, "csv")
}

/// Lists the station files directly inside `dir` (non-recursive), sorted.
///
/// Returns an error if `dir` cannot be read.
pub fn list_station_files(dir: &Path) -> Result<Vec<PathBuf>> {
    // glob swallows a missing root, so check it first
    std::fs::read_dir(dir).with_context(|| format!("cannot read directory {}", dir.display()))?;

    let pattern = format!("{}/*", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let mut files: Vec<PathBuf> = glob_with(&pattern, options)?
        .flatten()
        .filter(|path| path.is_file() && is_station_file(path))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn recognises_extensions_case_insensitively() {
        assert!(is_station_file(Path::new("data/a.txt")));
        assert!(is_station_file(Path::new("data/a.TXT")));
        assert!(is_station_file(Path::new("data/b.Csv")));
        assert!(!is_station_file(Path::new("data/b.json")));
        assert!(!is_station_file(Path::new("data/txt")));
        assert!(is_csv(Path::new("x.CSV")));
        assert!(!is_csv(Path::new("x.txt")));
    }

    #[test]
    fn lists_only_direct_station_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.csv"), "h\n").unwrap();
        fs::write(dir.path().join("a.TXT"), "").unwrap();
        fs::write(dir.path().join("notes.md"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.txt"), "").unwrap();

        let names: Vec<String> = list_station_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.TXT", "b.csv"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(list_station_files(&dir.path().join("gone")).is_err());
    }
}
