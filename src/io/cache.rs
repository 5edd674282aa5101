//! Memoized snapshot loads.
//!
//! The snapshot is refreshed out of band, never within a session, so a load is
//! keyed by path + modification time. A rewritten file gets a new key and is
//! read again on the next request.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::AppError;
use crate::io::ingest::{Dataset, LoadOptions, load_dataset};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: PathBuf,
    modified: Option<SystemTime>,
}

#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: HashMap<CacheKey, Arc<Dataset>>,
    loads: usize,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached table for `path`, loading it if the file changed.
    pub fn get_or_load(&mut self, path: &Path, options: &LoadOptions) -> Result<Arc<Dataset>, AppError> {
        let key = cache_key(path)?;
        if let Some(hit) = self.entries.get(&key) {
            tracing::debug!(path = %path.display(), "snapshot cache hit");
            return Ok(Arc::clone(hit));
        }

        let dataset = Arc::new(load_dataset(path, options)?);
        self.loads += 1;
        // Older versions of the same file are never asked for again.
        self.entries.retain(|k, _| k.path != key.path);
        self.entries.insert(key, Arc::clone(&dataset));
        Ok(dataset)
    }

    /// Number of actual reads performed.
    pub fn loads(&self) -> usize {
        self.loads
    }
}

fn cache_key(path: &Path) -> Result<CacheKey, AppError> {
    let meta = std::fs::metadata(path).map_err(|e| {
        AppError::load(format!("Snapshot not found: '{}': {e}", path.display()))
    })?;
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    Ok(CacheKey {
        path,
        modified: meta.modified().ok(),
    })
}
