//! Final model training on the full processed training set

use polars::prelude::DataFrame;
use tracing::info;

use crate::config::TrainingConfig;
use crate::error::Result;
use crate::model::GbdtClassifier;
use crate::training::{to_feature_matrix, to_labels};

/// Trains the candidate classifier with the tuned parameters.
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Fit on a processed frame that carries features plus `target`.
    pub fn fit(&self, train: &DataFrame, target: &str) -> Result<GbdtClassifier> {
        let (x, feature_names) = to_feature_matrix(train, target)?;
        let y = to_labels(train, target)?;

        info!(
            rows = x.nrows(),
            features = x.ncols(),
            n_estimators = self.config.params.n_estimators,
            max_depth = self.config.params.max_depth,
            "training candidate model"
        );

        let mut model = GbdtClassifier::new(self.config.params.clone(), self.config.seed);
        model.fit(&x, &y, &feature_names)?;

        let mut importances = model.feature_importances();
        importances.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (name, value) in importances.iter().take(5) {
            info!(feature = %name, importance = value, "top feature");
        }

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelParams;
    use polars::prelude::*;

    #[test]
    fn test_trainer_fits_on_frame() {
        let n = 40;
        let signal: Vec<f64> = (0..n)
            .map(|i| if i % 2 == 0 { -3.0 } else { 3.0 })
            .collect();
        let target: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();
        let df = df!("signal" => &signal, "target" => &target).unwrap();

        let config = TrainingConfig {
            params: ModelParams {
                n_estimators: 10,
                max_depth: 2,
                learning_rate: 0.3,
                subsample: 1.0,
                scale_pos_weight: 1.0,
            },
            ..TrainingConfig::default()
        };

        let model = Trainer::new(config).fit(&df, "target").unwrap();
        let (x, _) = to_feature_matrix(&df, "target").unwrap();
        let pred = model.predict(&x).unwrap();
        let correct = pred
            .iter()
            .zip(target.iter())
            .filter(|(p, t)| (*p - *t).abs() < 0.5)
            .count();
        assert!(correct as f64 / n as f64 > 0.9);
    }
}
