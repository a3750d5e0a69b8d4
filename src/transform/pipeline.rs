//! The composite transform pipeline
//!
//! `fit` learns ratio specs, imputation values, and category
//! vocabularies from the training partition and freezes them, together
//! with the authoritative output column schema, into a
//! [`FittedTransform`]. `apply` replays that state on any frame. The
//! downstream classifier indexes features positionally, so `apply`
//! verifies its output against the frozen schema and aborts on any
//! disagreement instead of proceeding with misaligned columns.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{DataConfig, FeatureConfig};
use crate::error::{PipelineError, Result};
use crate::transform::encoder::OneHotEncoder;
use crate::transform::imputer::{ImputeStrategy, Imputer};
use crate::transform::ratios::RatioEngine;

/// Frozen state of a fitted transform pipeline.
///
/// Contains every learned parameter, so a deserialized copy can be
/// applied without re-deriving any statistic from new data. Exclusively
/// owned by the training run that produced it; consumers apply it
/// read-only and never refit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedTransform {
    ratios: RatioEngine,
    numeric_imputer: Imputer,
    categorical_imputer: Imputer,
    encoder: OneHotEncoder,
    numeric_features: Vec<String>,
    /// Authoritative output schema: numeric features, then one-hot
    /// indicators, then ratio features.
    output_columns: Vec<String>,
}

impl FittedTransform {
    /// The output column schema every `apply` call must reproduce.
    pub fn output_columns(&self) -> &[String] {
        &self.output_columns
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::ArtifactNotFound(format!(
                "fitted transform at {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Fit-once/apply-many transform pipeline: ratio derivation, then
/// imputation, then one-hot encoding.
pub struct TransformPipeline {
    numeric_features: Vec<String>,
    categorical_features: Vec<String>,
    ratio_specs: FeatureConfig,
}

impl TransformPipeline {
    pub fn new(data_cfg: &DataConfig, feat_cfg: &FeatureConfig) -> Self {
        Self {
            numeric_features: data_cfg.schema.numerical_features.clone(),
            categorical_features: data_cfg.schema.categorical_features.clone(),
            ratio_specs: feat_cfg.clone(),
        }
    }

    /// Learn all transform state from the training features.
    pub fn fit(&self, train_features: &DataFrame) -> Result<FittedTransform> {
        let ratios = RatioEngine::new(self.ratio_specs.ratios_to_create.clone());
        let derived = ratios.apply(train_features)?;

        let mut numeric_imputer = Imputer::new(ImputeStrategy::Median);
        numeric_imputer.fit(&derived, &self.numeric_features)?;

        let mut categorical_imputer = Imputer::new(ImputeStrategy::MostFrequent);
        categorical_imputer.fit(&derived, &self.categorical_features)?;

        // Encode on the imputed frame so the vocabulary includes the
        // fill value even when it only appears as a null replacement.
        let imputed = categorical_imputer.transform(&derived)?;
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&imputed, &self.categorical_features)?;

        let mut output_columns = self.numeric_features.clone();
        output_columns.extend(encoder.output_names());
        output_columns.extend(ratios.output_names());

        Ok(FittedTransform {
            ratios,
            numeric_imputer,
            categorical_imputer,
            encoder,
            numeric_features: self.numeric_features.clone(),
            output_columns,
        })
    }

    /// Fit on the training features and immediately transform them.
    pub fn fit_transform(&self, train_features: &DataFrame) -> Result<(FittedTransform, DataFrame)> {
        let fitted = self.fit(train_features)?;
        let transformed = Self::apply(train_features, &fitted)?;
        Ok((fitted, transformed))
    }

    /// Apply a fitted transform to any feature frame, reproducing the
    /// exact fit-time output schema.
    pub fn apply(features: &DataFrame, fitted: &FittedTransform) -> Result<DataFrame> {
        let derived = fitted.ratios.apply(features)?;
        let imputed = fitted.numeric_imputer.transform(&derived)?;
        let imputed = fitted.categorical_imputer.transform(&imputed)?;

        let mut columns: Vec<Column> = Vec::new();

        for name in &fitted.numeric_features {
            let col = imputed
                .column(name)
                .map_err(|_| PipelineError::FeatureNotFound(name.clone()))?;
            columns.push(col.cast(&DataType::Float64)?);
        }

        for series in fitted.encoder.transform(&imputed)? {
            columns.push(series.into());
        }

        for name in fitted.ratios.output_names() {
            let col = imputed
                .column(&name)
                .map_err(|_| PipelineError::FeatureNotFound(name.clone()))?;
            columns.push(col.cast(&DataType::Float64)?);
        }

        let out = DataFrame::new(columns)?;
        Self::check_schema(&out, fitted)?;
        Ok(out)
    }

    fn check_schema(df: &DataFrame, fitted: &FittedTransform) -> Result<()> {
        let actual: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        if actual != fitted.output_columns {
            return Err(PipelineError::FeatureSchemaMismatch {
                expected: fitted.output_columns.join(","),
                actual: actual.join(","),
            });
        }
        Ok(())
    }
}
