//! Hyperparameter search, final training, and evaluation

pub mod evaluate;
pub mod trainer;
pub mod tuner;

pub use evaluate::{EvaluationReport, Evaluator};
pub use trainer::Trainer;
pub use tuner::RandomizedSearch;

use ndarray::{Array1, Array2};
use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Convert a processed frame into a feature matrix, excluding `target`.
/// Returns the matrix and its column names in frame order.
pub fn to_feature_matrix(df: &DataFrame, target: &str) -> Result<(Array2<f64>, Vec<String>)> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|s| s != target)
        .collect();

    let mut casted = Vec::with_capacity(names.len());
    for name in &names {
        let col = df
            .column(name)
            .map_err(|_| PipelineError::FeatureNotFound(name.clone()))?
            .cast(&DataType::Float64)?;
        casted.push(col);
    }
    let chunked: Vec<&Float64Chunked> = casted
        .iter()
        .map(|c| c.f64().map_err(|e| PipelineError::Data(e.to_string())))
        .collect::<Result<_>>()?;

    let n_rows = df.height();
    let n_cols = names.len();
    let mut data = Vec::with_capacity(n_rows * n_cols);
    for row in 0..n_rows {
        for ca in &chunked {
            data.push(ca.get(row).unwrap_or(f64::NAN));
        }
    }

    let matrix = Array2::from_shape_vec((n_rows, n_cols), data)
        .map_err(|e| PipelineError::Data(e.to_string()))?;
    Ok((matrix, names))
}

/// Extract 0/1 labels from the target column.
pub fn to_labels(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    let col = df
        .column(target)
        .map_err(|_| PipelineError::FeatureNotFound(target.to_string()))?
        .cast(&DataType::Float64)?;
    let ca = col.f64().map_err(|e| PipelineError::Data(e.to_string()))?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_excludes_target_and_keeps_order() {
        let df = df!(
            "a" => &[1.0, 2.0],
            "target" => &[0.0, 1.0],
            "b" => &[3.0, 4.0]
        )
        .unwrap();

        let (x, names) = to_feature_matrix(&df, "target").unwrap();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(x.shape(), &[2, 2]);
        assert_eq!(x[[1, 1]], 4.0);

        let y = to_labels(&df, "target").unwrap();
        assert_eq!(y.to_vec(), vec![0.0, 1.0]);
    }
}
