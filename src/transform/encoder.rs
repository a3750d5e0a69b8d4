//! One-hot encoding with a frozen category vocabulary
//!
//! The vocabulary is the sorted set of categories seen at fit time.
//! A value unseen at fit time encodes to the all-zero indicator vector,
//! never an error, so inference on novel categories degrades gracefully.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};

/// Fitted one-hot encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Column name to its sorted category vocabulary. BTreeMap keeps the
    /// column iteration order stable across fit/apply.
    vocab: BTreeMap<String, Vec<String>>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self {
            vocab: BTreeMap::new(),
            is_fitted: false,
        }
    }

    /// Learn the category vocabulary of each column.
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        for name in columns {
            let col = df
                .column(name)
                .map_err(|_| PipelineError::FeatureNotFound(name.clone()))?;
            let ca = col
                .str()
                .map_err(|e| PipelineError::Data(e.to_string()))?;

            let mut categories: Vec<String> = ca
                .into_iter()
                .flatten()
                .map(|s| s.to_string())
                .collect();
            categories.sort();
            categories.dedup();

            self.vocab.insert(name.clone(), categories);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Indicator column names in output order.
    pub fn output_names(&self) -> Vec<String> {
        self.vocab
            .iter()
            .flat_map(|(col, cats)| cats.iter().map(move |c| format!("{}_{}", col, c)))
            .collect()
    }

    /// Build the indicator columns for `df`, one `Series` per
    /// (column, category) pair in vocabulary order.
    pub fn transform(&self, df: &DataFrame) -> Result<Vec<Series>> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted);
        }

        let mut out = Vec::new();
        for (name, categories) in &self.vocab {
            let col = df
                .column(name)
                .map_err(|_| PipelineError::FeatureNotFound(name.clone()))?;
            let ca = col
                .str()
                .map_err(|e| PipelineError::Data(e.to_string()))?;
            let values: Vec<Option<&str>> = ca.into_iter().collect();

            for category in categories {
                let indicators: Vec<f64> = values
                    .iter()
                    .map(|v| match v {
                        Some(v) if *v == category.as_str() => 1.0,
                        _ => 0.0,
                    })
                    .collect();
                out.push(Series::new(
                    format!("{}_{}", name, category).into(),
                    indicators,
                ));
            }
        }

        Ok(out)
    }
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new()
    }
}
