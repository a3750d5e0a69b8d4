//! Randomized hyperparameter search with stratified cross-validation
//!
//! Samples parameter combinations from the discrete search space, scores
//! each by mean F1 over stratified k-fold cross-validation, and returns
//! the best. Ties keep the earlier combination, so a fixed seed always
//! selects the same parameters.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::{ModelParams, SearchSpace, TrainingConfig};
use crate::error::{PipelineError, Result};
use crate::model::metrics::ClassificationMetrics;
use crate::model::GbdtClassifier;

/// One evaluated parameter combination.
#[derive(Debug, Clone)]
pub struct Trial {
    pub params: ModelParams,
    pub mean_f1: f64,
}

/// Search result: the winning combination and every trial behind it.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best_params: ModelParams,
    pub best_score: f64,
    pub trials: Vec<Trial>,
}

/// Randomized search over a discrete hyperparameter space.
pub struct RandomizedSearch {
    space: SearchSpace,
    n_iter: usize,
    cv_folds: usize,
    seed: u64,
}

impl RandomizedSearch {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            space: config.search_space.clone(),
            n_iter: config.tuning.n_iter,
            cv_folds: config.tuning.cv_folds,
            seed: config.seed,
        }
    }

    /// Run the search on the processed training features.
    pub fn search(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        feature_names: &[String],
    ) -> Result<SearchOutcome> {
        let folds = self.stratified_folds(y)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut trials = Vec::with_capacity(self.n_iter);
        let mut seen = HashSet::new();
        let mut best: Option<(ModelParams, f64)> = None;

        let mut attempts = 0;
        while trials.len() < self.n_iter && attempts < self.n_iter * 20 {
            attempts += 1;
            let params = self.sample(&mut rng)?;
            if !seen.insert(Self::combo_key(&params)) {
                continue;
            }

            let mean_f1 = self.cross_validate(x, y, feature_names, &params, &folds)?;
            debug!(?params, mean_f1, "scored hyperparameter combination");

            // strict improvement only, so earlier combinations win ties
            if best.as_ref().map_or(true, |(_, s)| mean_f1 > *s) {
                best = Some((params.clone(), mean_f1));
            }
            trials.push(Trial { params, mean_f1 });
        }

        let (best_params, best_score) = best.ok_or_else(|| {
            PipelineError::Training("hyperparameter search produced no trials".to_string())
        })?;

        info!(
            ?best_params,
            best_score,
            n_trials = trials.len(),
            "hyperparameter search complete"
        );

        Ok(SearchOutcome {
            best_params,
            best_score,
            trials,
        })
    }

    fn sample(&self, rng: &mut ChaCha8Rng) -> Result<ModelParams> {
        Ok(ModelParams {
            n_estimators: *Self::choose(&self.space.n_estimators, rng, "n_estimators")?,
            max_depth: *Self::choose(&self.space.max_depth, rng, "max_depth")?,
            learning_rate: *Self::choose(&self.space.learning_rate, rng, "learning_rate")?,
            subsample: *Self::choose(&self.space.subsample, rng, "subsample")?,
            scale_pos_weight: *Self::choose(
                &self.space.scale_pos_weight,
                rng,
                "scale_pos_weight",
            )?,
        })
    }

    fn choose<'a, T>(values: &'a [T], rng: &mut ChaCha8Rng, name: &str) -> Result<&'a T> {
        values.choose(rng).ok_or_else(|| {
            PipelineError::Config(format!("search space for {} is empty", name))
        })
    }

    fn combo_key(params: &ModelParams) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            params.n_estimators,
            params.max_depth,
            params.learning_rate,
            params.subsample,
            params.scale_pos_weight
        )
    }

    /// Stratified fold assignment: within each class, shuffled indices
    /// are dealt round-robin across folds.
    fn stratified_folds(&self, y: &Array1<f64>) -> Result<Vec<Vec<usize>>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(1));
        let mut folds = vec![Vec::new(); self.cv_folds];

        for class in [0.0, 1.0] {
            let mut indices: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, &v)| (v - class).abs() < 0.5)
                .map(|(i, _)| i)
                .collect();
            if indices.len() < self.cv_folds {
                return Err(PipelineError::InsufficientData(format!(
                    "class {} has {} rows, fewer than {} folds",
                    class,
                    indices.len(),
                    self.cv_folds
                )));
            }
            indices.shuffle(&mut rng);
            for (i, idx) in indices.into_iter().enumerate() {
                folds[i % self.cv_folds].push(idx);
            }
        }

        for fold in &mut folds {
            fold.sort_unstable();
        }
        Ok(folds)
    }

    fn cross_validate(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        feature_names: &[String],
        params: &ModelParams,
        folds: &[Vec<usize>],
    ) -> Result<f64> {
        let mut scores = Vec::with_capacity(folds.len());

        for (k, holdout) in folds.iter().enumerate() {
            let train_idx: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != k)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();

            let x_train = x.select(Axis(0), &train_idx);
            let y_train: Array1<f64> =
                Array1::from_vec(train_idx.iter().map(|&i| y[i]).collect());
            let x_val = x.select(Axis(0), holdout);
            let y_val: Array1<f64> =
                Array1::from_vec(holdout.iter().map(|&i| y[i]).collect());

            let mut model = GbdtClassifier::new(params.clone(), self.seed);
            model.fit(&x_train, &y_train, feature_names)?;

            let pred = model.predict(&x_val)?;
            let proba = model.predict_proba(&x_val)?;
            let metrics = ClassificationMetrics::compute(&y_val, &pred, &proba)?;
            scores.push(metrics.f1_score);
        }

        Ok(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}
