//! Configuration documents for the pipeline
//!
//! Three YAML documents drive a run: the data document (schema and
//! validation thresholds), the feature document (declarative ratio
//! features), and the training document (model parameters, search space,
//! and gate/SLA thresholds). All are loaded at stage entry and never
//! mutated mid-stage, with one exception: the tuner rewrites the tuned
//! parameter section of the training document after search.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Dataset schema: feature lists and the target column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub numerical_features: Vec<String>,
    pub categorical_features: Vec<String>,
    pub target: String,
}

/// Plausibility thresholds applied by the validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum plausible applicant age
    pub max_age: f64,
    /// Maximum plausible employment length in years
    pub max_emp_length: f64,
}

/// Data document: schema plus validation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub schema: SchemaConfig,
    pub validation: ValidationConfig,
}

impl DataConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::Config(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// All columns the validator requires to be present.
    pub fn required_columns(&self) -> Vec<String> {
        let mut cols = self.schema.numerical_features.clone();
        cols.extend(self.schema.categorical_features.clone());
        cols.push(self.schema.target.clone());
        cols
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            schema: SchemaConfig {
                numerical_features: vec![
                    "person_age".to_string(),
                    "person_income".to_string(),
                    "person_emp_length".to_string(),
                    "loan_amnt".to_string(),
                    "loan_int_rate".to_string(),
                    "loan_percent_income".to_string(),
                    "cb_person_cred_hist_length".to_string(),
                ],
                categorical_features: vec![
                    "person_home_ownership".to_string(),
                    "loan_intent".to_string(),
                    "loan_grade".to_string(),
                    "cb_person_default_on_file".to_string(),
                ],
                target: "loan_status".to_string(),
            },
            validation: ValidationConfig {
                max_age: 100.0,
                max_emp_length: 60.0,
            },
        }
    }
}

/// One derived ratio feature: numerator / denominator, with a zero
/// denominator (and 0/0) producing 0 rather than infinity or NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioSpec {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
}

/// Feature document: declaratively defined ratio features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub ratios_to_create: Vec<RatioSpec>,
}

impl FeatureConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::Config(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            ratios_to_create: vec![RatioSpec {
                name: "loan_to_income".to_string(),
                numerator: "loan_amnt".to_string(),
                denominator: "person_income".to_string(),
            }],
        }
    }
}

/// Model hyperparameters, both tuned values and search-space entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    /// Weight applied to positive-class gradients (class imbalance)
    pub scale_pos_weight: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 6,
            learning_rate: 0.1,
            subsample: 0.8,
            scale_pos_weight: 1.0,
        }
    }
}

/// Discrete hyperparameter search space for the tuner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSpace {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub subsample: Vec<f64>,
    pub scale_pos_weight: Vec<f64>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200, 500],
            max_depth: vec![3, 6, 10],
            learning_rate: vec![0.01, 0.1, 0.2],
            subsample: vec![0.8, 1.0],
            scale_pos_weight: vec![1.0, 3.0, 5.0],
        }
    }
}

/// Promotion gate and monitoring thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Minimum F1 score the candidate must reach to be promoted
    pub f1_threshold: f64,
    /// SLA floor used by the alert scan
    pub sla_f1_threshold: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            f1_threshold: 0.80,
            sla_f1_threshold: 0.80,
        }
    }
}

/// Tuner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    pub n_iter: usize,
    pub cv_folds: usize,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            n_iter: 10,
            cv_folds: 3,
        }
    }
}

/// Training document: tuned parameters, search space, tuner settings,
/// gate thresholds, and the run seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub params: ModelParams,
    pub search_space: SearchSpace,
    pub tuning: TuningConfig,
    pub gate: GateConfig,
    pub seed: u64,
}

impl TrainingConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::Config(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Persist the document, including a tuned parameter section.
    /// This is the tuner's stateful handoff to the trainer.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Sized,
    {
        let text = serde_yaml::to_string(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(self.clone())
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            params: ModelParams::default(),
            search_space: SearchSpace::default(),
            tuning: TuningConfig::default(),
            gate: GateConfig::default(),
            seed: 42,
        }
    }
}
