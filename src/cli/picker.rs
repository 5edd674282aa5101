//! Snapshot path resolution.
//!
//! Precedence: `--data` flag, then `FFMM_DATA` (a `.env` file is honored),
//! then `ffmm_merged.parquet` in the working directory. When the resolved file
//! is missing, the error lists snapshot files found nearby so the user can pass
//! one with `--data`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::DEFAULT_SNAPSHOT;
use crate::error::AppError;

/// Default directory recursion depth for finding snapshot files.
const DEFAULT_SEARCH_DEPTH: usize = 3;

/// Environment variable naming the snapshot file.
pub const DATA_ENV: &str = "FFMM_DATA";

/// Pick the snapshot path from the flag, the environment, or the default.
pub fn resolve_snapshot_path(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    match std::env::var(DATA_ENV) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => PathBuf::from(DEFAULT_SNAPSHOT),
    }
}

/// Validate the provided path points to an existing snapshot file.
pub fn validate_snapshot_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        let found = discover_snapshots();
        let hint = if found.is_empty() {
            "No .parquet or .csv files found under the current directory.".to_string()
        } else {
            let listed: Vec<String> = found.iter().map(|p| pretty_path(p)).collect();
            format!("Snapshot files found: {}", listed.join(", "))
        };
        return Err(AppError::load(format!(
            "Snapshot not found: '{}'. Pass one with --data or set {DATA_ENV}. {hint}",
            path.display()
        )));
    }
    if path.is_dir() {
        return Err(AppError::load(format!(
            "Expected a file, got a directory: {}",
            path.display()
        )));
    }
    if !is_snapshot_file(path) {
        return Err(AppError::load(format!(
            "Expected a .parquet or .csv snapshot (got: {}).",
            path.display()
        )));
    }

    Ok(path.to_path_buf())
}

/// Discover snapshot files under the current directory (deterministic order).
pub fn discover_snapshots() -> Vec<PathBuf> {
    find_snapshots(Path::new("."), DEFAULT_SEARCH_DEPTH)
}

fn find_snapshots(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    find_snapshots_inner(root, 0, max_depth, &mut out);
    out.sort_by_key(|p| pretty_path(p));
    out
}

fn find_snapshots_inner(root: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }

    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };

        if file_type.is_dir() {
            if should_skip_dir(&path) {
                continue;
            }
            find_snapshots_inner(&path, depth + 1, max_depth, out);
            continue;
        }

        if file_type.is_file() && is_snapshot_file(&path) {
            out.push(path);
        }
    }
}

fn is_snapshot_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("parquet") || ext.eq_ignore_ascii_case("csv"))
        == Some(true)
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules" | "logs")
}

fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}
