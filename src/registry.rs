//! Model registry with candidate and production stages
//!
//! Every trained model is registered as a versioned candidate; the gate
//! decides whether the candidate's artifact is also bound to the
//! production stage. Version resolution goes through an explicit index
//! table persisted next to the artifacts, so "latest" is always an
//! index lookup, never a filesystem convention.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::model::GbdtClassifier;
use crate::store::LATEST;
use crate::training::EvaluationReport;

pub const CANDIDATE: &str = "candidate";
pub const PRODUCTION: &str = "production";

const INDEX_FILE: &str = "index.json";

/// Outcome of the promotion gate. Rejection is a normal result, not an
/// error; the pipeline finishes cleanly either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GateDecision {
    Promoted {
        version: String,
        f1_score: f64,
    },
    Rejected {
        version: String,
        f1_score: f64,
        threshold: f64,
    },
}

/// Version table for both stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryIndex {
    /// Stage name to its current version
    current: HashMap<String, String>,
    /// Stage name to every version ever registered, oldest first
    versions: HashMap<String, Vec<String>>,
}

/// Filesystem-backed model registry.
pub struct ModelRegistry {
    root: PathBuf,
    index: RegistryIndex,
}

impl ModelRegistry {
    /// Open a registry rooted at `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let index_path = root.join(INDEX_FILE);
        let index = if index_path.exists() {
            let json = fs::read_to_string(&index_path)?;
            serde_json::from_str(&json)?
        } else {
            RegistryIndex::default()
        };

        Ok(Self { root, index })
    }

    /// Register a trained model as the new candidate. Returns the
    /// version it was registered under.
    pub fn register_candidate(
        &mut self,
        model: &GbdtClassifier,
        version: Option<&str>,
    ) -> Result<String> {
        let version = version
            .map(|v| v.to_string())
            .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string());

        let bytes = bincode::serialize(model)
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;
        fs::write(self.artifact_path(CANDIDATE, &version), bytes)?;

        self.bind(CANDIDATE, &version);
        self.save_index()?;

        info!(version = %version, "registered candidate model");
        Ok(version)
    }

    /// Apply the promotion gate to the current candidate. Promotion
    /// copies the candidate artifact to the production stage; a
    /// shortfall logs and returns `Rejected` without touching
    /// production. Re-gating the same version is a no-op beyond
    /// rewriting the same binding.
    pub fn gate(&mut self, report: &EvaluationReport, f1_threshold: f64) -> Result<GateDecision> {
        let version = report.model_version.clone();
        let f1 = report.metrics.f1_score;

        let candidate_path = self.artifact_path(CANDIDATE, &version);
        if !candidate_path.exists() {
            return Err(PipelineError::ArtifactNotFound(format!(
                "candidate model version {}",
                version
            )));
        }

        if f1 < f1_threshold {
            warn!(
                version = %version,
                f1_score = f1,
                threshold = f1_threshold,
                "candidate rejected by promotion gate"
            );
            return Ok(GateDecision::Rejected {
                version,
                f1_score: f1,
                threshold: f1_threshold,
            });
        }

        fs::copy(&candidate_path, self.artifact_path(PRODUCTION, &version))?;
        self.bind(PRODUCTION, &version);
        self.save_index()?;

        info!(version = %version, f1_score = f1, "candidate promoted to production");
        Ok(GateDecision::Promoted {
            version,
            f1_score: f1,
        })
    }

    /// Load a model from a stage. `LATEST` resolves through the index.
    pub fn load(&self, stage: &str, version: &str) -> Result<GbdtClassifier> {
        let resolved = if version == LATEST {
            self.current_version(stage).ok_or_else(|| {
                PipelineError::ArtifactNotFound(format!("no {} model registered", stage))
            })?
        } else {
            version.to_string()
        };

        let path = self.artifact_path(stage, &resolved);
        let bytes = fs::read(&path).map_err(|e| {
            PipelineError::ArtifactNotFound(format!(
                "{} model version {}: {}",
                stage, resolved, e
            ))
        })?;
        bincode::deserialize(&bytes).map_err(|e| PipelineError::Serialization(e.to_string()))
    }

    /// Load whatever currently serves production traffic.
    pub fn load_production(&self) -> Result<GbdtClassifier> {
        self.load(PRODUCTION, LATEST)
    }

    pub fn current_version(&self, stage: &str) -> Option<String> {
        self.index.current.get(stage).cloned()
    }

    pub fn versions(&self, stage: &str) -> Vec<String> {
        self.index.versions.get(stage).cloned().unwrap_or_default()
    }

    fn bind(&mut self, stage: &str, version: &str) {
        self.index
            .current
            .insert(stage.to_string(), version.to_string());
        let history = self.index.versions.entry(stage.to_string()).or_default();
        if !history.iter().any(|v| v == version) {
            history.push(version.to_string());
        }
    }

    fn artifact_path(&self, stage: &str, version: &str) -> PathBuf {
        self.root.join(format!("{}_v{}.bin", stage, version))
    }

    fn save_index(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.index)?;
        fs::write(self.root.join(INDEX_FILE), json)?;
        Ok(())
    }
}
