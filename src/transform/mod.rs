//! Fit-once/apply-many feature transformation
//!
//! The pipeline derives ratio features, imputes missing values, and
//! one-hot encodes categoricals. Every statistic is learned from the
//! training partition during `fit` and frozen into a [`FittedTransform`];
//! `apply` only ever replays that frozen state, which is what keeps
//! test and future data from leaking into the model.

pub mod encoder;
pub mod imputer;
pub mod pipeline;
pub mod ratios;

pub use encoder::OneHotEncoder;
pub use imputer::{ImputeStrategy, Imputer};
pub use pipeline::{FittedTransform, TransformPipeline};
pub use ratios::RatioEngine;
