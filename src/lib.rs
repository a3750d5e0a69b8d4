//! Credit risk scoring pipeline
//!
//! An offline-to-online ML pipeline for loan default prediction:
//! validated data flows through stratified splitting, a fit-once
//! transform, randomized hyperparameter search, and gradient-boosted
//! training; candidates pass a promotion gate before production, and
//! drift monitoring watches the deployed model afterwards.
//!
//! # Modules
//!
//! - [`config`] - YAML configuration documents
//! - [`data`] - Validation and stratified splitting
//! - [`transform`] - Ratio features, imputation, one-hot encoding
//! - [`model`] - Gradient boosted trees and metrics
//! - [`training`] - Hyperparameter search, training, evaluation
//! - [`registry`] - Versioned model registry with the promotion gate
//! - [`store`] - Versioned dataset store
//! - [`monitoring`] - Data drift, performance drift, alerts
//! - [`inference`] - Online scoring service
//! - [`pipeline`] - End-to-end orchestration

pub mod config;
pub mod data;
pub mod error;
pub mod inference;
pub mod model;
pub mod monitoring;
pub mod pipeline;
pub mod registry;
pub mod store;
pub mod training;
pub mod transform;

pub use error::{PipelineError, Result};

/// Common imports for pipeline consumers.
pub mod prelude {
    pub use crate::config::{DataConfig, FeatureConfig, TrainingConfig};
    pub use crate::error::{PipelineError, Result};
    pub use crate::inference::{LoanApplication, ScoreResult, ScoringService};
    pub use crate::model::GbdtClassifier;
    pub use crate::monitoring::{AlertScan, DataDriftMonitor, ModelDriftMonitor};
    pub use crate::pipeline::{Orchestrator, PipelineLayout, PipelineOutcome};
    pub use crate::registry::{GateDecision, ModelRegistry};
    pub use crate::store::ArtifactStore;
    pub use crate::training::{Evaluator, RandomizedSearch, Trainer};
    pub use crate::transform::{FittedTransform, TransformPipeline};
}
