//! Data-phase stages: validation and splitting

pub mod splits;
pub mod validation;

pub use splits::{SplitSet, Splitter};
pub use validation::Validator;
