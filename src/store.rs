//! Versioned artifact store for tabular datasets
//!
//! Every stage writes its output here and the next stage reads it back,
//! so stages never pass data by direct reference. Each saved dataset is
//! an immutable `(name, version)` Parquet file; an explicit resolution
//! table in `index.json` maps each name to its current version, which is
//! what `"latest"` resolves through. The table is last-write-wins and
//! assumes a single active pipeline run; concurrent runs need external
//! locking or per-run namespacing.

use chrono::Utc;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PipelineError, Result};

/// Version alias that resolves through the index to the current version.
pub const LATEST: &str = "latest";

/// Resolution table: dataset name to current version, plus the full
/// version history for auditability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreIndex {
    current: HashMap<String, String>,
    versions: HashMap<String, Vec<String>>,
}

/// Durable key-value store from `(name, version)` to a dataset.
pub struct ArtifactStore {
    root: PathBuf,
    index: StoreIndex,
}

impl ArtifactStore {
    /// Open (or create) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        let index_path = root.join("index.json");
        let index = if index_path.exists() {
            let text = std::fs::read_to_string(&index_path)?;
            serde_json::from_str(&text)?
        } else {
            StoreIndex::default()
        };

        Ok(Self { root, index })
    }

    /// Save a dataset under `name`. The version defaults to a UTC
    /// timestamp; the current-version pointer for `name` is always
    /// rebound to the saved version.
    pub fn save(&mut self, name: &str, df: &DataFrame, version: Option<&str>) -> Result<String> {
        let version = match version {
            Some(v) => v.to_string(),
            None => Utc::now().format("%Y%m%d_%H%M%S").to_string(),
        };

        let path = self.dataset_path(name, &version);
        let file = File::create(&path)?;
        let mut out = df.clone();
        ParquetWriter::new(file)
            .finish(&mut out)
            .map_err(|e| PipelineError::Data(e.to_string()))?;

        self.index
            .versions
            .entry(name.to_string())
            .or_default()
            .push(version.clone());
        self.index
            .current
            .insert(name.to_string(), version.clone());
        self.save_index()?;

        info!(name, version = %version, rows = df.height(), "stored dataset");
        Ok(version)
    }

    /// Load a dataset by name and version; `"latest"` resolves through
    /// the current-version table.
    pub fn load(&self, name: &str, version: &str) -> Result<DataFrame> {
        let resolved = if version == LATEST {
            self.index.current.get(name).ok_or_else(|| {
                PipelineError::ArtifactNotFound(format!("no versions stored for '{}'", name))
            })?
        } else {
            version
        };

        let path = self.dataset_path(name, resolved);
        if !path.exists() {
            return Err(PipelineError::ArtifactNotFound(format!(
                "'{}' version '{}' ({})",
                name,
                resolved,
                path.display()
            )));
        }

        let file = File::open(&path)?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| PipelineError::Data(e.to_string()))
    }

    /// Load the current version of a dataset.
    pub fn load_latest(&self, name: &str) -> Result<DataFrame> {
        self.load(name, LATEST)
    }

    /// Current version of a dataset, if any is stored.
    pub fn current_version(&self, name: &str) -> Option<&str> {
        self.index.current.get(name).map(|s| s.as_str())
    }

    /// All versions recorded for a dataset, oldest first.
    pub fn versions(&self, name: &str) -> Vec<String> {
        self.index.versions.get(name).cloned().unwrap_or_default()
    }

    /// Names of all stored datasets.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.index.current.keys().cloned().collect();
        names.sort();
        names
    }

    fn dataset_path(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(format!("{}_v{}.parquet", name, version))
    }

    fn save_index(&self) -> Result<()> {
        let index_path = self.root.join("index.json");
        let text = serde_json::to_string_pretty(&self.index)?;
        std::fs::write(index_path, text)?;
        Ok(())
    }
}
