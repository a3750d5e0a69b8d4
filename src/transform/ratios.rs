//! Derived ratio features
//!
//! Ratios are declared as `{name, numerator, denominator}` in the
//! feature document. A zero denominator produces a ratio of 0, as does
//! 0/0 or a missing operand; the model never sees infinities or NaNs
//! from this step. One ratio is built in: credit-history length
//! relative to age.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::RatioSpec;
use crate::error::{PipelineError, Result};

/// Name of the built-in credit-history/age ratio column.
pub const CRED_HIST_AGE_RATIO: &str = "cred_hist_age_ratio";

/// Applies declarative ratio features plus the built-in ratio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioEngine {
    specs: Vec<RatioSpec>,
}

impl RatioEngine {
    pub fn new(specs: Vec<RatioSpec>) -> Self {
        Self { specs }
    }

    /// Output column names this engine appends, in order.
    pub fn output_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.specs.iter().map(|s| s.name.clone()).collect();
        names.push(CRED_HIST_AGE_RATIO.to_string());
        names
    }

    /// Append all ratio columns to `df`. Deterministic: the same input
    /// always yields the same derived columns.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();

        for spec in &self.specs {
            let series = Self::ratio_series(df, &spec.name, &spec.numerator, &spec.denominator)?;
            result = result.with_column(series)?.clone();
        }

        let built_in = Self::ratio_series(
            df,
            CRED_HIST_AGE_RATIO,
            "cb_person_cred_hist_length",
            "person_age",
        )?;
        result = result.with_column(built_in)?.clone();

        Ok(result)
    }

    fn ratio_series(df: &DataFrame, name: &str, num: &str, den: &str) -> Result<Series> {
        let numerator = Self::f64_values(df, num)?;
        let denominator = Self::f64_values(df, den)?;

        let values: Vec<f64> = numerator
            .iter()
            .zip(denominator.iter())
            .map(|(n, d)| match (n, d) {
                (Some(n), Some(d)) if *d != 0.0 => {
                    let r = n / d;
                    if r.is_finite() {
                        r
                    } else {
                        0.0
                    }
                }
                // zero denominator, 0/0, or missing operand
                _ => 0.0,
            })
            .collect();

        Ok(Series::new(name.into(), values))
    }

    fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
        let col = df
            .column(name)
            .map_err(|_| PipelineError::FeatureNotFound(name.to_string()))?;
        let casted = col.cast(&DataType::Float64)?;
        Ok(casted
            .f64()
            .map_err(|e| PipelineError::Data(e.to_string()))?
            .into_iter()
            .collect())
    }
}
