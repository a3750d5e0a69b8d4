//! Performance drift: re-scoring production on the drift holdout
//!
//! The drift holdout was carved off before training and never touched
//! by the transform fit or the tuner, so scoring it with the production
//! model and comparing against the promotion-time baseline measures
//! pure degradation, not leakage.

use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::model::GbdtClassifier;
use crate::training::{Evaluator, EvaluationReport};
use crate::transform::{FittedTransform, TransformPipeline};

/// Result of one performance drift check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDriftReport {
    pub model_version: String,
    pub baseline_f1: f64,
    pub current_f1: f64,
    pub degradation: f64,
    pub drift_detected: bool,
    pub checked_at: DateTime<Utc>,
}

impl ModelDriftReport {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::ArtifactNotFound(format!(
                "model drift report at {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Compares production F1 on fresh labeled data to the baseline.
pub struct ModelDriftMonitor {
    /// F1 drop below baseline that counts as drift
    degradation_threshold: f64,
}

impl ModelDriftMonitor {
    pub fn new() -> Self {
        Self {
            degradation_threshold: 0.05,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.degradation_threshold = threshold;
        self
    }

    /// Score `model` on the raw labeled holdout and compare F1 against
    /// the baseline report. The holdout is transformed with the frozen
    /// production transform, never refitted.
    pub fn check(
        &self,
        model: &GbdtClassifier,
        transform: &FittedTransform,
        holdout: &DataFrame,
        target: &str,
        baseline: &EvaluationReport,
    ) -> Result<ModelDriftReport> {
        let features = holdout.drop(target)?;
        let mut processed = TransformPipeline::apply(&features, transform)?;
        let labels = holdout
            .column(target)?
            .as_materialized_series()
            .clone()
            .with_name("target".into());
        processed.with_column(labels)?;

        let metrics = Evaluator::evaluate(model, &processed, "target")?;

        let degradation = baseline.metrics.f1_score - metrics.f1_score;
        let drift_detected = degradation > self.degradation_threshold;

        if drift_detected {
            warn!(
                model_version = %baseline.model_version,
                baseline_f1 = baseline.metrics.f1_score,
                current_f1 = metrics.f1_score,
                degradation,
                "model performance drift detected"
            );
        } else {
            info!(
                baseline_f1 = baseline.metrics.f1_score,
                current_f1 = metrics.f1_score,
                "model performance within tolerance"
            );
        }

        Ok(ModelDriftReport {
            model_version: baseline.model_version.clone(),
            baseline_f1: baseline.metrics.f1_score,
            current_f1: metrics.f1_score,
            degradation,
            drift_detected,
            checked_at: Utc::now(),
        })
    }
}

impl Default for ModelDriftMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DataConfig, FeatureConfig, ModelParams, RatioSpec, SchemaConfig, ValidationConfig,
    };
    use crate::model::metrics::ClassificationMetrics;
    use crate::training::to_feature_matrix;
    use crate::training::to_labels;
    use polars::prelude::*;

    fn config() -> (DataConfig, FeatureConfig) {
        (
            DataConfig {
                schema: SchemaConfig {
                    numerical_features: vec![
                        "person_age".to_string(),
                        "loan_amnt".to_string(),
                        "person_income".to_string(),
                        "cb_person_cred_hist_length".to_string(),
                    ],
                    categorical_features: vec!["loan_grade".to_string()],
                    target: "loan_status".to_string(),
                },
                validation: ValidationConfig {
                    max_age: 100.0,
                    max_emp_length: 60.0,
                },
            },
            FeatureConfig {
                ratios_to_create: vec![RatioSpec {
                    name: "loan_to_income".to_string(),
                    numerator: "loan_amnt".to_string(),
                    denominator: "person_income".to_string(),
                }],
            },
        )
    }

    fn labeled_frame(n: usize) -> DataFrame {
        let ages: Vec<f64> = (0..n).map(|i| 25.0 + (i % 30) as f64).collect();
        let amounts: Vec<f64> = (0..n)
            .map(|i| if i % 2 == 0 { 5_000.0 } else { 25_000.0 })
            .collect();
        let incomes: Vec<f64> = (0..n).map(|i| 40_000.0 + (i % 10) as f64 * 1_000.0).collect();
        let hist: Vec<f64> = (0..n).map(|i| 2.0 + (i % 8) as f64).collect();
        let grades: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "A" } else { "D" }).collect();
        let status: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();

        df!(
            "person_age" => &ages,
            "loan_amnt" => &amounts,
            "person_income" => &incomes,
            "cb_person_cred_hist_length" => &hist,
            "loan_grade" => &grades,
            "loan_status" => &status
        )
        .unwrap()
    }

    fn baseline_with_f1(f1: f64) -> EvaluationReport {
        EvaluationReport {
            model_version: "v1".to_string(),
            dataset_version: "d1".to_string(),
            metrics: ClassificationMetrics {
                f1_score: f1,
                precision: f1,
                recall: f1,
                roc_auc: 0.9,
            },
            evaluated_at: Utc::now(),
        }
    }

    fn fit_model_and_transform() -> (GbdtClassifier, FittedTransform) {
        let (data_cfg, feat_cfg) = config();
        let train = labeled_frame(60);
        let features = train.drop("loan_status").unwrap();

        let pipeline = TransformPipeline::new(&data_cfg, &feat_cfg);
        let (fitted, mut processed) = pipeline.fit_transform(&features).unwrap();
        let labels = train
            .column("loan_status")
            .unwrap()
            .as_materialized_series()
            .clone()
            .with_name("target".into());
        processed.with_column(labels).unwrap();

        let (x, names) = to_feature_matrix(&processed, "target").unwrap();
        let y = to_labels(&processed, "target").unwrap();
        let params = ModelParams {
            n_estimators: 15,
            max_depth: 3,
            learning_rate: 0.3,
            subsample: 1.0,
            scale_pos_weight: 1.0,
        };
        let mut model = GbdtClassifier::new(params, 42);
        model.fit(&x, &y, &names).unwrap();
        (model, fitted)
    }

    #[test]
    fn test_stable_model_no_drift() {
        let (model, transform) = fit_model_and_transform();
        let holdout = labeled_frame(40);

        // Baseline matches what the model actually achieves on this data
        let report = ModelDriftMonitor::new()
            .check(&model, &transform, &holdout, "loan_status", &baseline_with_f1(0.95))
            .unwrap();

        assert!(!report.drift_detected);
        assert!(report.current_f1 > 0.9);
    }

    #[test]
    fn test_inflated_baseline_triggers_drift() {
        let (model, transform) = fit_model_and_transform();
        let holdout = labeled_frame(40);

        // A baseline far above achievable performance reads as degradation
        let report = ModelDriftMonitor::new()
            .check(&model, &transform, &holdout, "loan_status", &baseline_with_f1(1.5))
            .unwrap();

        assert!(report.drift_detected);
        assert!(report.degradation > 0.05);
    }
}
