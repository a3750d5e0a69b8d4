//! Stratified train/test/drift splitting
//!
//! Two-stage split of a validated dataset: first carve off a drift
//! holdout, then split the remainder into train and test. Both stages
//! stratify by target label so every partition preserves the default
//! rate, and both draw from one seeded RNG so the same input and seed
//! always produce identical partitions.

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::info;

use crate::error::{PipelineError, Result};

/// The three disjoint partitions of one validated dataset.
#[derive(Debug)]
pub struct SplitSet {
    pub train: DataFrame,
    pub test: DataFrame,
    pub drift: DataFrame,
}

/// Stratified three-way splitter.
pub struct Splitter {
    seed: u64,
    /// Fraction held out for drift monitoring (stage 1)
    drift_fraction: f64,
    /// Fraction of the remainder held out for testing (stage 2)
    test_fraction: f64,
}

impl Splitter {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            drift_fraction: 0.15,
            test_fraction: 0.20,
        }
    }

    pub fn with_fractions(mut self, drift: f64, test: f64) -> Self {
        self.drift_fraction = drift;
        self.test_fraction = test;
        self
    }

    /// Partition `df` into train/test/drift, stratified by `target`.
    pub fn split(&self, df: &DataFrame, target: &str) -> Result<SplitSet> {
        let labels = Self::target_labels(df, target)?;

        // Per-class index buckets, in a BTreeMap so iteration order is
        // stable across runs regardless of label hashing.
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, label) in labels.iter().enumerate() {
            class_indices.entry(*label).or_default().push(idx);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut drift_idx = Vec::new();
        let mut test_idx = Vec::new();
        let mut train_idx = Vec::new();

        for (label, indices) in &class_indices {
            let mut pool = indices.clone();
            pool.shuffle(&mut rng);

            let n = pool.len();
            let n_drift = Self::partition_size(n, self.drift_fraction, *label, "drift holdout")?;
            let remainder = n - n_drift;
            let n_test =
                Self::partition_size(remainder, self.test_fraction, *label, "test split")?;

            drift_idx.extend(pool.drain(..n_drift));
            test_idx.extend(pool.drain(..n_test));
            train_idx.extend(pool);
        }

        // Restore original row order within each partition so the output
        // is byte-identical for a given input and seed.
        drift_idx.sort_unstable();
        test_idx.sort_unstable();
        train_idx.sort_unstable();

        let split = SplitSet {
            train: Self::take_rows(df, &train_idx)?,
            test: Self::take_rows(df, &test_idx)?,
            drift: Self::take_rows(df, &drift_idx)?,
        };

        info!(
            train = split.train.height(),
            test = split.test.height(),
            drift = split.drift.height(),
            "created stratified splits"
        );

        Ok(split)
    }

    /// Rows allocated to the carved-off partition of one stratum.
    /// Both the carved partition and what remains must be non-empty.
    fn partition_size(n: usize, fraction: f64, label: i64, stage: &str) -> Result<usize> {
        let k = ((n as f64) * fraction).round() as usize;
        let k = k.max(1);
        if n < 2 || k >= n {
            return Err(PipelineError::InsufficientData(format!(
                "stratum for label {} has {} rows, too few for the {}",
                label, n, stage
            )));
        }
        Ok(k)
    }

    fn target_labels(df: &DataFrame, target: &str) -> Result<Vec<i64>> {
        let col = df
            .column(target)
            .map_err(|_| PipelineError::FeatureNotFound(target.to_string()))?;
        let casted = col.cast(&DataType::Float64)?;
        let ca = casted.f64().map_err(|e| PipelineError::Data(e.to_string()))?;
        Ok(ca
            .into_iter()
            .map(|v| v.unwrap_or(0.0).round() as i64)
            .collect())
    }

    fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
        let idx: IdxCa = indices
            .iter()
            .map(|&i| Some(i as IdxSize))
            .collect::<IdxCa>();
        Ok(df.take(&idx)?)
    }
}
