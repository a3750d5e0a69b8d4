//! Classifier and evaluation metrics

pub mod gbdt;
pub mod metrics;
pub mod tree;

pub use gbdt::GbdtClassifier;
pub use metrics::ClassificationMetrics;
pub use tree::RegressionTree;
