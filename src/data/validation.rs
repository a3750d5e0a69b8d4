//! Raw-data validation
//!
//! Applies schema and logical-consistency rules to a raw dataset before
//! anything downstream sees it. The column check is fatal; the numeric
//! rules are soft filters that drop offending rows with a logged count.

use polars::prelude::*;
use tracing::warn;

use crate::config::DataConfig;
use crate::error::{PipelineError, Result};

/// Minimum legal working age assumed by the employment-length
/// consistency rule.
const MIN_WORKING_AGE: f64 = 14.0;

/// Schema and plausibility validator for raw loan applications.
pub struct Validator {
    config: DataConfig,
}

impl Validator {
    pub fn new(config: &DataConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Validate a raw dataset, returning the cleaned frame.
    ///
    /// Rules, in order:
    /// 1. every schema column present, or the run stops with a schema error;
    /// 2. rows with `person_age` above the configured maximum are dropped;
    /// 3. rows with `person_emp_length` above the configured maximum are dropped;
    /// 4. rows where employment length exceeds `age - 14` are dropped.
    ///
    /// The numeric filters are independent and cumulative; a row failing
    /// several rules is removed once. Null values pass the numeric
    /// filters (imputation handles them later).
    pub fn validate(&self, df: &DataFrame) -> Result<DataFrame> {
        self.check_columns(df)?;

        let max_age = self.config.validation.max_age;
        let max_emp = self.config.validation.max_emp_length;

        let mut result = df.clone();

        result = Self::filter_with_count(&result, "person_age above maximum", |frame| {
            let age = Self::f64_column(frame, "person_age")?;
            Ok(age
                .into_iter()
                .map(|v| v.map_or(true, |x| x <= max_age))
                .collect())
        })?;

        result = Self::filter_with_count(&result, "person_emp_length above maximum", |frame| {
            let emp = Self::f64_column(frame, "person_emp_length")?;
            Ok(emp
                .into_iter()
                .map(|v| v.map_or(true, |x| x <= max_emp))
                .collect())
        })?;

        result = Self::filter_with_count(&result, "person_emp_length exceeds age - 14", |frame| {
            let age = Self::f64_column(frame, "person_age")?;
            let emp = Self::f64_column(frame, "person_emp_length")?;
            Ok(age
                .into_iter()
                .zip(emp.into_iter())
                .map(|(a, e)| match (a, e) {
                    (Some(a), Some(e)) => e <= a - MIN_WORKING_AGE,
                    _ => true,
                })
                .collect())
        })?;

        Ok(result)
    }

    fn check_columns(&self, df: &DataFrame) -> Result<()> {
        let present: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let missing: Vec<String> = self
            .config
            .required_columns()
            .into_iter()
            .filter(|c| !present.contains(c))
            .collect();

        if !missing.is_empty() {
            return Err(PipelineError::Schema(format!(
                "missing required columns: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    fn filter_with_count<F>(df: &DataFrame, rule: &str, build_mask: F) -> Result<DataFrame>
    where
        F: Fn(&DataFrame) -> Result<BooleanChunked>,
    {
        let mask = build_mask(df)?;
        let dropped = mask.iter().filter(|v| *v == Some(false)).count();
        if dropped > 0 {
            warn!(rule, dropped, "dropping rows failing validation rule");
        }
        Ok(df.filter(&mask)?)
    }

    fn f64_column(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
        let col = df
            .column(name)
            .map_err(|_| PipelineError::FeatureNotFound(name.to_string()))?;
        let casted = col.cast(&DataType::Float64)?;
        Ok(casted
            .f64()
            .map_err(|e| PipelineError::Data(e.to_string()))?
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataConfig;

    fn full_frame(ages: &[f64], emp: &[f64]) -> DataFrame {
        let n = ages.len();
        df!(
            "person_age" => ages,
            "person_income" => &vec![50_000.0; n],
            "person_emp_length" => emp,
            "loan_amnt" => &vec![10_000.0; n],
            "loan_int_rate" => &vec![11.0; n],
            "loan_percent_income" => &vec![0.2; n],
            "cb_person_cred_hist_length" => &vec![4.0; n],
            "person_home_ownership" => &vec!["RENT"; n],
            "loan_intent" => &vec!["EDUCATION"; n],
            "loan_grade" => &vec!["B"; n],
            "cb_person_default_on_file" => &vec!["N"; n],
            "loan_status" => &vec![0i64; n]
        )
        .unwrap()
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let df = df!("person_age" => &[30.0]).unwrap();
        let validator = Validator::new(&DataConfig::default());
        let err = validator.validate(&df).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_age_outlier_removed() {
        // One applicant aged 120 against a configured max of 100
        let df = full_frame(&[30.0, 120.0, 45.0], &[5.0, 5.0, 5.0]);
        let validator = Validator::new(&DataConfig::default());
        let cleaned = validator.validate(&df).unwrap();
        assert_eq!(cleaned.height(), df.height() - 1);
    }

    #[test]
    fn test_emp_length_outlier_removed() {
        let df = full_frame(&[30.0, 40.0], &[5.0, 70.0]);
        let validator = Validator::new(&DataConfig::default());
        let cleaned = validator.validate(&df).unwrap();
        assert_eq!(cleaned.height(), 1);
    }

    #[test]
    fn test_emp_length_age_consistency() {
        // 20-year-old with 10 years employment: 10 > 20 - 14
        let df = full_frame(&[20.0, 40.0], &[10.0, 10.0]);
        let validator = Validator::new(&DataConfig::default());
        let cleaned = validator.validate(&df).unwrap();
        assert_eq!(cleaned.height(), 1);
    }

    #[test]
    fn test_row_failing_two_rules_removed_once() {
        // age 120 also fails the consistency rule; total removed is 1
        let df = full_frame(&[120.0, 30.0], &[110.0, 5.0]);
        let validator = Validator::new(&DataConfig::default());
        let cleaned = validator.validate(&df).unwrap();
        assert_eq!(cleaned.height(), 1);
    }
}
