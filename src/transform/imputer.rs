//! Missing-value imputation
//!
//! Fill values are learned once at fit time and replayed at apply time;
//! the imputer never recomputes statistics from the frame it is
//! transforming.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PipelineError, Result};

/// Imputation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Per-column median (numeric columns)
    Median,
    /// Per-column most frequent value (categorical columns)
    MostFrequent,
}

/// Learned fill value for one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum FillValue {
    Numeric(f64),
    Categorical(String),
}

/// Fitted imputer holding one learned fill value per column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fills: HashMap<String, FillValue>,
    is_fitted: bool,
}

impl Imputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fills: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Learn fill values for `columns` from `df`.
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        for name in columns {
            let col = df
                .column(name)
                .map_err(|_| PipelineError::FeatureNotFound(name.clone()))?;

            let fill = match self.strategy {
                ImputeStrategy::Median => {
                    let casted = col.cast(&DataType::Float64)?;
                    let ca = casted.f64().map_err(|e| PipelineError::Data(e.to_string()))?;
                    FillValue::Numeric(ca.median().unwrap_or(0.0))
                }
                ImputeStrategy::MostFrequent => {
                    let ca = col
                        .str()
                        .map_err(|e| PipelineError::Data(e.to_string()))?;
                    FillValue::Categorical(Self::mode(ca))
                }
            };
            self.fills.insert(name.clone(), fill);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace nulls in every fitted column with the learned fill value.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted);
        }

        let mut result = df.clone();
        for (name, fill) in &self.fills {
            let col = match df.column(name) {
                Ok(c) => c,
                Err(_) => continue,
            };

            let filled: Series = match fill {
                FillValue::Numeric(value) => {
                    let casted = col.cast(&DataType::Float64)?;
                    let ca = casted.f64().map_err(|e| PipelineError::Data(e.to_string()))?;
                    let values: Vec<f64> = ca
                        .into_iter()
                        .map(|v| {
                            let v = v.unwrap_or(*value);
                            if v.is_nan() {
                                *value
                            } else {
                                v
                            }
                        })
                        .collect();
                    Series::new(name.as_str().into(), values)
                }
                FillValue::Categorical(value) => {
                    let ca = col
                        .str()
                        .map_err(|e| PipelineError::Data(e.to_string()))?;
                    let values: Vec<String> = ca
                        .into_iter()
                        .map(|v| v.unwrap_or(value.as_str()).to_string())
                        .collect();
                    Series::new(name.as_str().into(), values)
                }
            };
            result = result.with_column(filled)?.clone();
        }

        Ok(result)
    }

    /// Learned fill value for a numeric column, if fitted.
    pub fn numeric_fill(&self, column: &str) -> Option<f64> {
        match self.fills.get(column) {
            Some(FillValue::Numeric(v)) => Some(*v),
            _ => None,
        }
    }

    fn mode(ca: &StringChunked) -> String {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for v in ca.into_iter().flatten() {
            *counts.entry(v).or_insert(0) += 1;
        }
        counts
            .into_iter()
            // break count ties lexicographically so fit is deterministic
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
            .map(|(v, _)| v.to_string())
            .unwrap_or_default()
    }
}
