//! Statistical imputation methods.
//!
//! Provides mean and constant fills over extracted column values.

use crate::error::{PrepError, Result};
use crate::profiler::statistics::mean;
use crate::utils::observed;

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Replace every missing entry with the mean of the observed values.
    ///
    /// A column with missing entries but no observed value cannot be filled
    /// and yields [`PrepError::EmptyColumn`].
    pub fn fill_mean(name: &str, values: &[Option<f64>]) -> Result<Vec<f64>> {
        if values.iter().all(Option::is_some) {
            return Ok(values.iter().flatten().copied().collect());
        }
        let fill = mean(&observed(values)).ok_or_else(|| PrepError::EmptyColumn(name.to_string()))?;
        Ok(Self::fill_constant(values, fill))
    }

    /// Replace every missing entry with `value`.
    pub fn fill_constant(values: &[Option<f64>], value: f64) -> Vec<f64> {
        values.iter().map(|v| v.unwrap_or(value)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_mean_basic() {
        let filled = StatisticalImputer::fill_mean("y", &[Some(10.0), None, Some(30.0)]).unwrap();
        assert_eq!(filled, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_fill_mean_complete_column_unchanged() {
        let filled = StatisticalImputer::fill_mean("y", &[Some(1.0), Some(2.0)]).unwrap();
        assert_eq!(filled, vec![1.0, 2.0]);
    }

    #[test]
    fn test_fill_mean_all_missing() {
        let err = StatisticalImputer::fill_mean("z", &[None, None, None]).unwrap_err();
        assert!(matches!(err, PrepError::EmptyColumn(c) if c == "z"));
    }

    #[test]
    fn test_fill_mean_zero_rows() {
        assert!(StatisticalImputer::fill_mean("z", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_fill_constant() {
        assert_eq!(
            StatisticalImputer::fill_constant(&[None, Some(2.0)], -1.0),
            vec![-1.0, 2.0]
        );
    }
}
