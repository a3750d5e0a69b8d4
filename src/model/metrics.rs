//! Binary classification metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Metric set reported for every evaluated model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub f1_score: f64,
    pub precision: f64,
    pub recall: f64,
    pub roc_auc: f64,
}

impl ClassificationMetrics {
    /// Compute all metrics from true labels, hard predictions, and
    /// positive-class probabilities.
    pub fn compute(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        y_proba: &Array1<f64>,
    ) -> Result<Self> {
        if y_true.len() != y_pred.len() || y_true.len() != y_proba.len() {
            return Err(PipelineError::Data(format!(
                "metric inputs must align ({} labels, {} predictions, {} scores)",
                y_true.len(),
                y_pred.len(),
                y_proba.len()
            )));
        }
        if y_true.is_empty() {
            return Err(PipelineError::InsufficientData(
                "cannot score an empty evaluation set".to_string(),
            ));
        }

        let mut tp = 0.0;
        let mut fp = 0.0;
        let mut fn_ = 0.0;
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            let truth = t > 0.5;
            let pred = p > 0.5;
            match (truth, pred) {
                (true, true) => tp += 1.0,
                (false, true) => fp += 1.0,
                (true, false) => fn_ += 1.0,
                (false, false) => {}
            }
        }

        let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            f1_score,
            precision,
            recall,
            roc_auc: roc_auc(y_true, y_proba),
        })
    }
}

/// Rank-based ROC AUC with average ranks for tied scores. Returns 0.5
/// when one of the classes is absent.
pub fn roc_auc(y_true: &Array1<f64>, y_score: &Array1<f64>) -> f64 {
    let n = y_true.len();
    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        y_score[a]
            .partial_cmp(&y_score[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && y_score[order[j + 1]] == y_score[order[i]] {
            j += 1;
        }
        // average rank across the tie group, ranks are 1-based
        let avg = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(&t, _)| t > 0.5)
        .map(|(_, &r)| r)
        .sum();

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    (pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_predictions() {
        let y = array![1.0, 0.0, 1.0, 0.0];
        let pred = array![1.0, 0.0, 1.0, 0.0];
        let proba = array![0.9, 0.1, 0.8, 0.2];

        let m = ClassificationMetrics::compute(&y, &pred, &proba).unwrap();
        assert!((m.f1_score - 1.0).abs() < 1e-12);
        assert!((m.precision - 1.0).abs() < 1e-12);
        assert!((m.recall - 1.0).abs() < 1e-12);
        assert!((m.roc_auc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_confusion_counts() {
        // tp=1, fp=1, fn=1, tn=1
        let y = array![1.0, 1.0, 0.0, 0.0];
        let pred = array![1.0, 0.0, 1.0, 0.0];
        let proba = array![0.8, 0.4, 0.6, 0.2];

        let m = ClassificationMetrics::compute(&y, &pred, &proba).unwrap();
        assert!((m.precision - 0.5).abs() < 1e-12);
        assert!((m.recall - 0.5).abs() < 1e-12);
        assert!((m.f1_score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_no_positive_predictions_is_zero_not_nan() {
        let y = array![1.0, 0.0];
        let pred = array![0.0, 0.0];
        let proba = array![0.3, 0.2];

        let m = ClassificationMetrics::compute(&y, &pred, &proba).unwrap();
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.f1_score, 0.0);
    }

    #[test]
    fn test_auc_with_tied_scores() {
        let y = array![1.0, 0.0, 1.0, 0.0];
        let proba = array![0.5, 0.5, 0.5, 0.5];
        assert!((roc_auc(&y, &proba) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_auc_is_half() {
        let y = array![1.0, 1.0];
        let proba = array![0.9, 0.8];
        assert!((roc_auc(&y, &proba) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input_errors() {
        let y: Array1<f64> = array![];
        assert!(ClassificationMetrics::compute(&y, &y.clone(), &y.clone()).is_err());
    }
}
