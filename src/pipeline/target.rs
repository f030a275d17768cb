//! Binary target validation and extraction
//!
//! The target must be a 0/1 column (integer, float or boolean) without nulls.

use polars::prelude::*;

use crate::error::{BinningError, Result};

/// Tolerance for floating point comparison when checking binary 0/1 values
const TOLERANCE: f64 = 1e-9;

/// Validate a binary target column and return it as `0`/`1` per row
pub fn binary_target(df: &DataFrame, target: &str) -> Result<Vec<u8>> {
    let target_col = df.column(target).map_err(|_| {
        BinningError::config(format!("Target column '{}' not found", target))
    })?;

    let invalid = |reason: String| BinningError::InvalidColumn {
        column: target.to_string(),
        reason,
    };

    if target_col.len() == 0 {
        return Err(invalid("target column is empty".to_string()));
    }

    if target_col.null_count() > 0 {
        return Err(invalid(format!(
            "target contains {} null value(s)",
            target_col.null_count()
        )));
    }

    if !(target_col.dtype().is_primitive_numeric() || target_col.dtype() == &DataType::Boolean) {
        return Err(invalid(format!(
            "target must be numeric 0/1, found dtype {}",
            target_col.dtype()
        )));
    }

    // Cast to Float64 first to handle integer, float and boolean types uniformly
    let float_col = target_col.cast(&DataType::Float64)?;
    float_col
        .f64()?
        .into_iter()
        .map(|v| match v {
            Some(v) if v.abs() < TOLERANCE => Ok(0u8),
            Some(v) if (v - 1.0).abs() < TOLERANCE => Ok(1u8),
            Some(v) => Err(invalid(format!("target must be binary (0/1), found {}", v))),
            None => Err(invalid("target contains null values".to_string())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_target() {
        let df = df! { "y" => [0i32, 1, 1, 0] }.unwrap();
        assert_eq!(binary_target(&df, "y").unwrap(), vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_float_and_bool_targets() {
        let df = df! {
            "f" => [0.0f64, 1.0, 1.0],
            "b" => [false, true, false],
        }
        .unwrap();
        assert_eq!(binary_target(&df, "f").unwrap(), vec![0, 1, 1]);
        assert_eq!(binary_target(&df, "b").unwrap(), vec![0, 1, 0]);
    }

    #[test]
    fn test_non_binary_target_rejected() {
        let df = df! { "y" => [0i32, 1, 2] }.unwrap();
        let err = binary_target(&df, "y").unwrap_err();
        assert!(err.to_string().contains("binary"));
    }

    #[test]
    fn test_null_target_rejected() {
        let df = df! { "y" => [Some(0i32), None, Some(1)] }.unwrap();
        assert!(matches!(
            binary_target(&df, "y"),
            Err(BinningError::InvalidColumn { .. })
        ));
    }

    #[test]
    fn test_string_target_rejected() {
        let df = df! { "y" => ["yes", "no"] }.unwrap();
        assert!(binary_target(&df, "y").is_err());
    }

    #[test]
    fn test_missing_target_column() {
        let df = df! { "y" => [0i32, 1] }.unwrap();
        assert!(matches!(
            binary_target(&df, "target"),
            Err(BinningError::InvalidConfiguration(_))
        ));
    }
}
