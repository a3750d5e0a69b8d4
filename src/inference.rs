//! Online scoring service
//!
//! Loads the production model and its frozen transform once, then
//! scores applications from memory. `reload` swaps in newer artifacts
//! in place; nothing is loaded implicitly at call time, so a service
//! that started is a service that can score.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::model::GbdtClassifier;
use crate::registry::{ModelRegistry, PRODUCTION};
use crate::training::to_feature_matrix;
use crate::transform::{FittedTransform, TransformPipeline};

/// One raw loan application, as received from the caller.
/// `loan_percent_income` is derived here, never supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanApplication {
    pub person_age: f64,
    pub person_income: f64,
    pub person_emp_length: f64,
    pub person_home_ownership: String,
    pub loan_intent: String,
    pub loan_grade: String,
    pub loan_amnt: f64,
    pub loan_int_rate: f64,
    pub cb_person_default_on_file: String,
    pub cb_person_cred_hist_length: f64,
}

impl LoanApplication {
    /// Single-row frame with the derived percent-income column.
    fn to_frame(&self) -> Result<DataFrame> {
        let percent_income = if self.person_income != 0.0 {
            self.loan_amnt / self.person_income
        } else {
            0.0
        };

        Ok(df!(
            "person_age" => &[self.person_age],
            "person_income" => &[self.person_income],
            "person_emp_length" => &[self.person_emp_length],
            "person_home_ownership" => &[self.person_home_ownership.as_str()],
            "loan_intent" => &[self.loan_intent.as_str()],
            "loan_grade" => &[self.loan_grade.as_str()],
            "loan_amnt" => &[self.loan_amnt],
            "loan_int_rate" => &[self.loan_int_rate],
            "loan_percent_income" => &[percent_income],
            "cb_person_default_on_file" => &[self.cb_person_default_on_file.as_str()],
            "cb_person_cred_hist_length" => &[self.cb_person_cred_hist_length]
        )?)
    }
}

/// Scoring result for one application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Probability of default in [0, 1]
    pub default_probability: f64,
    /// Probability rescaled to a 0-100 risk score
    pub risk_score: f64,
    /// Hard default prediction at the 0.5 threshold
    pub predicted_default: bool,
    /// Version of the model that produced the score
    pub model_version: String,
}

/// In-memory production model plus its transform.
#[derive(Debug)]
pub struct ScoringService {
    model: GbdtClassifier,
    transform: FittedTransform,
    model_version: String,
    registry_dir: PathBuf,
    transform_path: PathBuf,
}

impl ScoringService {
    /// Load the current production model and fitted transform.
    pub fn load(registry_dir: impl AsRef<Path>, transform_path: impl AsRef<Path>) -> Result<Self> {
        let registry = ModelRegistry::open(registry_dir.as_ref())?;
        let model = registry.load_production()?;
        let model_version = registry.current_version(PRODUCTION).ok_or_else(|| {
            PipelineError::ArtifactNotFound("no production model registered".to_string())
        })?;
        let transform = FittedTransform::load(transform_path.as_ref())?;

        info!(model_version = %model_version, "scoring service loaded");

        Ok(Self {
            model,
            transform,
            model_version,
            registry_dir: registry_dir.as_ref().to_path_buf(),
            transform_path: transform_path.as_ref().to_path_buf(),
        })
    }

    /// Re-read artifacts from disk, picking up a newly promoted model.
    pub fn reload(&mut self) -> Result<()> {
        let fresh = Self::load(&self.registry_dir, &self.transform_path)?;
        *self = fresh;
        Ok(())
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Score one application.
    pub fn score(&self, application: &LoanApplication) -> Result<ScoreResult> {
        let frame = application.to_frame()?;
        let processed = TransformPipeline::apply(&frame, &self.transform)?;
        // processed frames here carry features only, no target column
        let (x, _) = to_feature_matrix(&processed, "target")?;
        let proba = self.model.predict_proba(&x)?;
        let p = proba[0];

        Ok(ScoreResult {
            default_probability: p,
            risk_score: p * 100.0,
            predicted_default: p >= 0.5,
            model_version: self.model_version.clone(),
        })
    }

    /// Score every row of a raw feature frame, returning the frame with
    /// probability, risk score, and prediction columns appended.
    pub fn score_frame(&self, frame: &DataFrame) -> Result<DataFrame> {
        let processed = TransformPipeline::apply(frame, &self.transform)?;
        let (x, _) = to_feature_matrix(&processed, "target")?;
        let proba = self.model.predict_proba(&x)?;

        let probabilities: Vec<f64> = proba.to_vec();
        let risk_scores: Vec<f64> = probabilities.iter().map(|p| p * 100.0).collect();
        let predictions: Vec<i64> = probabilities
            .iter()
            .map(|&p| if p >= 0.5 { 1 } else { 0 })
            .collect();

        let mut out = frame.clone();
        out.with_column(Series::new("default_probability".into(), probabilities))?;
        out.with_column(Series::new("risk_score".into(), risk_scores))?;
        out.with_column(Series::new("predicted_default".into(), predictions))?;
        Ok(out)
    }

    /// Batch scoring: read applications from CSV, write the scored
    /// frame back out.
    pub fn predict_batch(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<usize> {
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(input.as_ref().to_path_buf()))
            .map_err(|e| PipelineError::Data(e.to_string()))?
            .finish()?;

        let mut scored = self.score_frame(&frame)?;
        let file = std::fs::File::create(output.as_ref())?;
        CsvWriter::new(file).finish(&mut scored)?;

        info!(
            rows = scored.height(),
            output = %output.as_ref().display(),
            "batch scoring complete"
        );
        Ok(scored.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataConfig, FeatureConfig, ModelParams, TrainingConfig};
    use crate::training::Trainer;

    fn training_frame(n: usize) -> DataFrame {
        let ages: Vec<f64> = (0..n).map(|i| 25.0 + (i % 30) as f64).collect();
        let incomes: Vec<f64> = (0..n).map(|i| 40_000.0 + (i % 10) as f64 * 2_000.0).collect();
        let emp: Vec<f64> = (0..n).map(|i| (i % 10) as f64).collect();
        let ownership: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "RENT" } else { "OWN" }).collect();
        let intent: Vec<&str> = (0..n)
            .map(|i| if i % 3 == 0 { "EDUCATION" } else { "VENTURE" })
            .collect();
        let grades: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "A" } else { "D" }).collect();
        let amounts: Vec<f64> = (0..n)
            .map(|i| if i % 2 == 0 { 4_000.0 } else { 28_000.0 })
            .collect();
        let rates: Vec<f64> = (0..n).map(|i| 6.0 + (i % 2) as f64 * 10.0).collect();
        let pct: Vec<f64> = amounts
            .iter()
            .zip(incomes.iter())
            .map(|(a, inc)| a / inc)
            .collect();
        let default_on_file: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "N" } else { "Y" }).collect();
        let hist: Vec<f64> = (0..n).map(|i| 2.0 + (i % 8) as f64).collect();
        let status: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();

        df!(
            "person_age" => &ages,
            "person_income" => &incomes,
            "person_emp_length" => &emp,
            "person_home_ownership" => &ownership,
            "loan_intent" => &intent,
            "loan_grade" => &grades,
            "loan_amnt" => &amounts,
            "loan_int_rate" => &rates,
            "loan_percent_income" => &pct,
            "cb_person_default_on_file" => &default_on_file,
            "cb_person_cred_hist_length" => &hist,
            "loan_status" => &status
        )
        .unwrap()
    }

    fn deploy(dir: &Path) -> (PathBuf, PathBuf) {
        let data_cfg = DataConfig::default();
        let feat_cfg = FeatureConfig::default();
        let train = training_frame(60);
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

        let config = TrainingConfig {
            params: ModelParams {
                n_estimators: 15,
                max_depth: 3,
                learning_rate: 0.3,
                subsample: 1.0,
                scale_pos_weight: 1.0,
            },
            ..TrainingConfig::default()
        };
        let model = Trainer::new(config).fit(&processed, "target").unwrap();

        let registry_dir = dir.join("registry");
        let mut registry = ModelRegistry::open(&registry_dir).unwrap();
        let version = registry.register_candidate(&model, Some("v1")).unwrap();
        let report = crate::training::EvaluationReport {
            model_version: version,
            dataset_version: "d1".to_string(),
            metrics: crate::model::metrics::ClassificationMetrics {
                f1_score: 0.95,
                precision: 0.95,
                recall: 0.95,
                roc_auc: 0.99,
            },
            evaluated_at: chrono::Utc::now(),
        };
        registry.gate(&report, 0.80).unwrap();

        let transform_path = dir.join("transform.json");
        fitted.save(&transform_path).unwrap();
        (registry_dir, transform_path)
    }

    fn risky_application() -> LoanApplication {
        LoanApplication {
            person_age: 26.0,
            person_income: 42_000.0,
            person_emp_length: 1.0,
            person_home_ownership: "OWN".to_string(),
            loan_intent: "VENTURE".to_string(),
            loan_grade: "D".to_string(),
            loan_amnt: 28_000.0,
            loan_int_rate: 16.0,
            cb_person_default_on_file: "Y".to_string(),
            cb_person_cred_hist_length: 3.0,
        }
    }

    #[test]
    fn test_score_single_application() {
        let dir = tempfile::tempdir().unwrap();
        let (registry_dir, transform_path) = deploy(dir.path());

        let service = ScoringService::load(&registry_dir, &transform_path).unwrap();
        let result = service.score(&risky_application()).unwrap();

        assert!(result.default_probability >= 0.0 && result.default_probability <= 1.0);
        assert!((result.risk_score - result.default_probability * 100.0).abs() < 1e-9);
        assert_eq!(result.model_version, "v1");
        // The training data labels high-amount grade-D loans as defaults
        assert!(result.predicted_default);
    }

    #[test]
    fn test_score_frame_appends_columns() {
        let dir = tempfile::tempdir().unwrap();
        let (registry_dir, transform_path) = deploy(dir.path());
        let service = ScoringService::load(&registry_dir, &transform_path).unwrap();

        let frame = training_frame(10).drop("loan_status").unwrap();
        let scored = service.score_frame(&frame).unwrap();

        assert!(scored.column("default_probability").is_ok());
        assert!(scored.column("risk_score").is_ok());
        assert!(scored.column("predicted_default").is_ok());
        assert_eq!(scored.height(), 10);
    }

    #[test]
    fn test_load_without_production_model_errors() {
        let dir = tempfile::tempdir().unwrap();
        let registry_dir = dir.path().join("registry");
        ModelRegistry::open(&registry_dir).unwrap();

        let err = ScoringService::load(&registry_dir, dir.path().join("missing.json"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactNotFound(_)));
    }

    #[test]
    fn test_reload_picks_up_new_version() {
        let dir = tempfile::tempdir().unwrap();
        let (registry_dir, transform_path) = deploy(dir.path());
        let mut service = ScoringService::load(&registry_dir, &transform_path).unwrap();
        assert_eq!(service.model_version(), "v1");

        // promote a second version
        let mut registry = ModelRegistry::open(&registry_dir).unwrap();
        let model = registry.load_production().unwrap();
        registry.register_candidate(&model, Some("v2")).unwrap();
        let report = crate::training::EvaluationReport {
            model_version: "v2".to_string(),
            dataset_version: "d1".to_string(),
            metrics: crate::model::metrics::ClassificationMetrics {
                f1_score: 0.95,
                precision: 0.95,
                recall: 0.95,
                roc_auc: 0.99,
            },
            evaluated_at: chrono::Utc::now(),
        };
        registry.gate(&report, 0.80).unwrap();

        service.reload().unwrap();
        assert_eq!(service.model_version(), "v2");
    }
}
