//! Held-out evaluation and the persisted evaluation report
//!
//! The report written after training doubles as the performance baseline
//! the model drift monitor compares against.

use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::model::metrics::ClassificationMetrics;
use crate::model::GbdtClassifier;
use crate::training::{to_feature_matrix, to_labels};

/// Evaluation result tied to the exact model and dataset versions it
/// was computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_version: String,
    pub dataset_version: String,
    pub metrics: ClassificationMetrics,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationReport {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::ArtifactNotFound(format!(
                "evaluation report at {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Scores a fitted model against a processed held-out frame.
pub struct Evaluator;

impl Evaluator {
    pub fn evaluate(
        model: &GbdtClassifier,
        test: &DataFrame,
        target: &str,
    ) -> Result<ClassificationMetrics> {
        let (x, _) = to_feature_matrix(test, target)?;
        let y = to_labels(test, target)?;

        let pred = model.predict(&x)?;
        let proba = model.predict_proba(&x)?;
        let metrics = ClassificationMetrics::compute(&y, &pred, &proba)?;

        info!(
            f1 = metrics.f1_score,
            precision = metrics.precision,
            recall = metrics.recall,
            roc_auc = metrics.roc_auc,
            "evaluated candidate on held-out test set"
        );

        Ok(metrics)
    }

    /// Evaluate and wrap the result in a versioned report.
    pub fn report(
        model: &GbdtClassifier,
        test: &DataFrame,
        target: &str,
        model_version: &str,
        dataset_version: &str,
    ) -> Result<EvaluationReport> {
        Ok(EvaluationReport {
            model_version: model_version.to_string(),
            dataset_version: dataset_version.to_string(),
            metrics: Self::evaluate(model, test, target)?,
            evaluated_at: Utc::now(),
        })
    }
}
