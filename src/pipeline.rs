//! End-to-end pipeline orchestration
//!
//! The training run is a fixed sequence of stages, each reading its
//! input from the artifact store and writing its output back, so every
//! intermediate dataset is versioned and reproducible. The first failing
//! stage aborts the run; a gate rejection is not a failure, the run
//! completes and reports the decision.

use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{DataConfig, FeatureConfig, TrainingConfig};
use crate::data::{Splitter, Validator};
use crate::error::{PipelineError, Result};
use crate::monitoring::{AlertEvent, AlertScan, DataDriftMonitor, ModelDriftMonitor};
use crate::registry::{GateDecision, ModelRegistry};
use crate::store::{ArtifactStore, LATEST};
use crate::training::{
    to_feature_matrix, to_labels, Evaluator, EvaluationReport, RandomizedSearch, Trainer,
};
use crate::transform::{FittedTransform, TransformPipeline};

/// Dataset names used across stages.
pub const RAW_VALIDATED: &str = "train_validated";
pub const TRAIN_FINAL: &str = "train_final";
pub const TEST_FINAL: &str = "test_final";
pub const DRIFT_HOLDOUT: &str = "drift_test";
pub const TRAIN_PROCESSED: &str = "train_processed";
pub const TEST_PROCESSED: &str = "test_processed";

/// Column name carrying the label through processed frames.
pub const TARGET: &str = "target";

/// Result of one complete training run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub dataset_version: String,
    pub model_version: String,
    pub report: EvaluationReport,
    pub decision: GateDecision,
}

/// Filesystem layout of one pipeline deployment.
pub struct PipelineLayout {
    pub store_dir: PathBuf,
    pub registry_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl PipelineLayout {
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            store_dir: root.join("datasets"),
            registry_dir: root.join("models"),
            reports_dir: root.join("reports"),
        }
    }

    pub fn transform_path(&self) -> PathBuf {
        self.reports_dir.join("transform.json")
    }

    pub fn evaluation_path(&self) -> PathBuf {
        self.reports_dir.join("evaluation.json")
    }

    pub fn data_drift_path(&self) -> PathBuf {
        self.reports_dir.join("data_drift.json")
    }

    pub fn model_drift_path(&self) -> PathBuf {
        self.reports_dir.join("model_drift.json")
    }
}

/// Runs the offline training pipeline and the monitoring pass.
pub struct Orchestrator {
    layout: PipelineLayout,
    data_config: DataConfig,
    feature_config: FeatureConfig,
    training_config: TrainingConfig,
    /// When set, the tuned parameters are written back to this training
    /// document after the search.
    training_config_path: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(
        layout: PipelineLayout,
        data_config: DataConfig,
        feature_config: FeatureConfig,
        training_config: TrainingConfig,
    ) -> Self {
        Self {
            layout,
            data_config,
            feature_config,
            training_config,
            training_config_path: None,
        }
    }

    pub fn with_training_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.training_config_path = Some(path.into());
        self
    }

    /// Run the full training pipeline on a raw labeled frame.
    pub fn run(&mut self, raw: DataFrame) -> Result<PipelineOutcome> {
        std::fs::create_dir_all(&self.layout.reports_dir)?;
        let mut store = ArtifactStore::open(&self.layout.store_dir)?;
        let version = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let target = self.data_config.schema.target.clone();

        // 1. validation
        let validator = Validator::new(&self.data_config);
        let validated = validator.validate(&raw)?;
        store.save(RAW_VALIDATED, &validated, Some(&version))?;

        // 2. stratified three-way split
        let splitter = Splitter::new(self.training_config.seed);
        let splits = splitter.split(&validated, &target)?;
        store.save(TRAIN_FINAL, &splits.train, Some(&version))?;
        store.save(TEST_FINAL, &splits.test, Some(&version))?;
        store.save(DRIFT_HOLDOUT, &splits.drift, Some(&version))?;

        // 3. fit the transform on train only, apply to train and test
        let pipeline = TransformPipeline::new(&self.data_config, &self.feature_config);
        let train_features = splits.train.drop(&target)?;
        let test_features = splits.test.drop(&target)?;

        let (fitted, train_processed) = pipeline.fit_transform(&train_features)?;
        let test_processed = TransformPipeline::apply(&test_features, &fitted)?;
        fitted.save(self.layout.transform_path())?;

        let train_processed =
            Self::attach_target(train_processed, &splits.train, &target)?;
        let test_processed = Self::attach_target(test_processed, &splits.test, &target)?;
        store.save(TRAIN_PROCESSED, &train_processed, Some(&version))?;
        store.save(TEST_PROCESSED, &test_processed, Some(&version))?;

        // 4. hyperparameter search, winner written back to the config
        let (x, feature_names) = to_feature_matrix(&train_processed, TARGET)?;
        let y = to_labels(&train_processed, TARGET)?;
        let search = RandomizedSearch::from_config(&self.training_config);
        let outcome = search.search(&x, &y, &feature_names)?;
        self.training_config.params = outcome.best_params;
        if let Some(path) = &self.training_config_path {
            self.training_config.save(path)?;
        }

        // 5. final training on the full processed training set
        let trainer = Trainer::new(self.training_config.clone());
        let model = trainer.fit(&train_processed, TARGET)?;

        // 6. held-out evaluation
        let mut registry = ModelRegistry::open(&self.layout.registry_dir)?;
        let model_version = registry.register_candidate(&model, Some(&version))?;
        let report = Evaluator::report(
            &model,
            &test_processed,
            TARGET,
            &model_version,
            &version,
        )?;
        report.save(self.layout.evaluation_path())?;

        // 7. promotion gate
        let decision = registry.gate(&report, self.training_config.gate.f1_threshold)?;

        info!(
            dataset_version = %version,
            model_version = %model_version,
            f1 = report.metrics.f1_score,
            promoted = matches!(decision, GateDecision::Promoted { .. }),
            "pipeline run complete"
        );

        Ok(PipelineOutcome {
            dataset_version: version,
            model_version,
            report,
            decision,
        })
    }

    /// Run the monitoring pass: data drift on the raw holdout,
    /// performance drift against the evaluation baseline, then the
    /// alert scan over everything written.
    pub fn monitor(&self) -> Result<Vec<AlertEvent>> {
        let store = ArtifactStore::open(&self.layout.store_dir)?;
        let train = store.load(TRAIN_FINAL, LATEST)?;
        let holdout = store.load(DRIFT_HOLDOUT, LATEST)?;
        let target = self.data_config.schema.target.clone();

        let data_monitor =
            DataDriftMonitor::new(self.data_config.schema.numerical_features.clone());
        let data_report = data_monitor.scan(&train, &holdout)?;
        data_report.save(self.layout.data_drift_path())?;

        let registry = ModelRegistry::open(&self.layout.registry_dir)?;
        let model = registry.load_production()?;
        let transform = FittedTransform::load(self.layout.transform_path())?;
        let baseline = EvaluationReport::load(self.layout.evaluation_path())?;

        let model_monitor = ModelDriftMonitor::new();
        let model_report =
            model_monitor.check(&model, &transform, &holdout, &target, &baseline)?;
        model_report.save(self.layout.model_drift_path())?;

        let scan = AlertScan::new(self.training_config.gate.sla_f1_threshold);
        Ok(scan.run(Some(&data_report), Some(&model_report), Some(&baseline)))
    }

    fn attach_target(
        mut processed: DataFrame,
        source: &DataFrame,
        target: &str,
    ) -> Result<DataFrame> {
        let labels = source
            .column(target)
            .map_err(|_| PipelineError::FeatureNotFound(target.to_string()))?
            .as_materialized_series()
            .clone()
            .with_name(TARGET.into());
        processed.with_column(labels)?;
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SearchSpace, TuningConfig};

    fn raw_frame(n: usize) -> DataFrame {
        let ages: Vec<f64> = (0..n).map(|i| 22.0 + (i % 40) as f64).collect();
        let incomes: Vec<f64> = (0..n).map(|i| 35_000.0 + (i % 12) as f64 * 3_000.0).collect();
        let emp: Vec<f64> = (0..n).map(|i| (i % 12) as f64).collect();
        let ownership: Vec<&str> = (0..n)
            .map(|i| match i % 3 {
                0 => "RENT",
                1 => "OWN",
                _ => "MORTGAGE",
            })
            .collect();
        let intent: Vec<&str> = (0..n)
            .map(|i| if i % 2 == 0 { "EDUCATION" } else { "VENTURE" })
            .collect();
        let grades: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "A" } else { "D" }).collect();
        let amounts: Vec<f64> = (0..n)
            .map(|i| if i % 2 == 0 { 4_000.0 } else { 27_000.0 })
            .collect();
        let rates: Vec<f64> = (0..n).map(|i| 6.0 + (i % 2) as f64 * 9.0).collect();
        let pct: Vec<f64> = amounts
            .iter()
            .zip(incomes.iter())
            .map(|(a, inc)| a / inc)
            .collect();
        let default_on_file: Vec<&str> =
            (0..n).map(|i| if i % 2 == 0 { "N" } else { "Y" }).collect();
        let hist: Vec<f64> = (0..n).map(|i| 2.0 + (i % 9) as f64).collect();
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

    fn quick_training_config() -> TrainingConfig {
        TrainingConfig {
            search_space: SearchSpace {
                n_estimators: vec![10],
                max_depth: vec![3],
                learning_rate: vec![0.3],
                subsample: vec![1.0],
                scale_pos_weight: vec![1.0],
            },
            tuning: TuningConfig {
                n_iter: 1,
                cv_folds: 2,
            },
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_full_run_promotes_learnable_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = Orchestrator::new(
            PipelineLayout::under(dir.path()),
            DataConfig::default(),
            FeatureConfig::default(),
            quick_training_config(),
        );

        let outcome = orchestrator.run(raw_frame(120)).unwrap();

        // separable toy data trains a model the gate should promote
        assert!(matches!(outcome.decision, GateDecision::Promoted { .. }));
        assert!(outcome.report.metrics.f1_score > 0.8);

        // all intermediate datasets landed in the store
        let store = ArtifactStore::open(dir.path().join("datasets")).unwrap();
        for name in [
            RAW_VALIDATED,
            TRAIN_FINAL,
            TEST_FINAL,
            DRIFT_HOLDOUT,
            TRAIN_PROCESSED,
            TEST_PROCESSED,
        ] {
            assert!(store.load(name, LATEST).is_ok(), "missing {}", name);
        }
    }

    #[test]
    fn test_monitor_after_run_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = Orchestrator::new(
            PipelineLayout::under(dir.path()),
            DataConfig::default(),
            FeatureConfig::default(),
            quick_training_config(),
        );
        orchestrator.run(raw_frame(120)).unwrap();

        // holdout comes from the same distribution, so no alerts
        let events = orchestrator.monitor().unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_tuned_params_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("training.yaml");
        let mut orchestrator = Orchestrator::new(
            PipelineLayout::under(dir.path()),
            DataConfig::default(),
            FeatureConfig::default(),
            quick_training_config(),
        )
        .with_training_config_path(&config_path);

        orchestrator.run(raw_frame(120)).unwrap();

        let written = TrainingConfig::load(&config_path).unwrap();
        // the single-entry search space pins the tuned values
        assert_eq!(written.params.n_estimators, 10);
        assert_eq!(written.params.max_depth, 3);
    }

    #[test]
    fn test_missing_column_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = Orchestrator::new(
            PipelineLayout::under(dir.path()),
            DataConfig::default(),
            FeatureConfig::default(),
            quick_training_config(),
        );

        let incomplete = raw_frame(50).drop("loan_grade").unwrap();
        let err = orchestrator.run(incomplete).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }
}
