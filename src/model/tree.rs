//! Regression tree used as the boosting base learner
//!
//! Splits minimize the sum of squared errors of the child means, found
//! per feature with a single sorted sweep over prefix sums.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A node in the fitted tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Regression tree with depth and leaf-size limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Option<TreeNode>,
    max_depth: usize,
    min_samples_leaf: usize,
}

impl RegressionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: 6,
            min_samples_leaf: 1,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Fit the tree to targets `y`.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(PipelineError::Training(format!(
                "tree fit requires matching non-empty inputs ({} rows, {} targets)",
                x.nrows(),
                y.len()
            )));
        }
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build_node(x, y, &indices, 0));
        Ok(())
    }

    /// Predict one value per row.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PipelineError::NotFitted)?;
        Ok((0..x.nrows())
            .map(|i| Self::predict_row(root, &x.row(i).to_owned()))
            .collect())
    }

    fn predict_row(node: &TreeNode, row: &Array1<f64>) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
            } => {
                if row[*feature_idx] <= *threshold {
                    Self::predict_row(left, row)
                } else {
                    Self::predict_row(right, row)
                }
            }
        }
    }

    fn build_node(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
    ) -> TreeNode {
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;

        if depth >= self.max_depth || indices.len() < 2 * self.min_samples_leaf {
            return TreeNode::Leaf {
                value: mean,
                n_samples: indices.len(),
            };
        }

        match self.best_split(x, y, indices) {
            Some((feature_idx, threshold)) => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, feature_idx]] <= threshold);

                if left_idx.len() < self.min_samples_leaf
                    || right_idx.len() < self.min_samples_leaf
                {
                    return TreeNode::Leaf {
                        value: mean,
                        n_samples: indices.len(),
                    };
                }

                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left: Box::new(self.build_node(x, y, &left_idx, depth + 1)),
                    right: Box::new(self.build_node(x, y, &right_idx, depth + 1)),
                }
            }
            None => TreeNode::Leaf {
                value: mean,
                n_samples: indices.len(),
            },
        }
    }

    /// Best (feature, threshold) by SSE reduction, or None when no split
    /// improves on the parent.
    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
    ) -> Option<(usize, f64)> {
        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n;

        let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, sse)

        for feature_idx in 0..x.ncols() {
            let mut pairs: Vec<(f64, f64)> = indices
                .iter()
                .map(|&i| (x[[i, feature_idx]], y[i]))
                .collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            for (k, &(value, target)) in pairs.iter().enumerate() {
                left_sum += target;
                left_sq += target * target;

                let left_n = (k + 1) as f64;
                let right_n = n - left_n;
                if (k + 1) < self.min_samples_leaf
                    || (indices.len() - k - 1) < self.min_samples_leaf
                {
                    continue;
                }
                // no valid threshold between equal feature values
                if k + 1 < pairs.len() && pairs[k + 1].0 <= value {
                    continue;
                }
                if right_n == 0.0 {
                    break;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);

                if sse < best.map_or(parent_sse, |(_, _, b)| b) {
                    let threshold = (value + pairs[k + 1].0) / 2.0;
                    best = Some((feature_idx, threshold, sse));
                }
            }
        }

        best.map(|(f, t, _)| (f, t))
    }
}

impl Default for RegressionTree {
    fn default() -> Self {
        Self::new()
    }
}
