//! Feature column classification and extraction

use polars::prelude::*;
use serde::Serialize;

use crate::error::{BinningError, Result};

/// How a feature is binned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureKind::Numeric => write!(f, "numeric"),
            FeatureKind::Categorical => write!(f, "categorical"),
        }
    }
}

/// Classify a column from its dtype; `None` for dtypes that cannot be binned
pub fn kind_of(dtype: &DataType) -> Option<FeatureKind> {
    if dtype.is_primitive_numeric() {
        Some(FeatureKind::Numeric)
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        Some(FeatureKind::Categorical)
    } else {
        None
    }
}

/// Raw values of one feature. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValues {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl FeatureValues {
    /// Read a column as the requested kind
    pub fn from_column(df: &DataFrame, name: &str, kind: FeatureKind) -> Result<Self> {
        match kind {
            FeatureKind::Numeric => numeric_values(df, name).map(FeatureValues::Numeric),
            FeatureKind::Categorical => {
                categorical_values(df, name).map(FeatureValues::Categorical)
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FeatureValues::Numeric(v) => v.len(),
            FeatureValues::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureValues::Numeric(_) => FeatureKind::Numeric,
            FeatureValues::Categorical(_) => FeatureKind::Categorical,
        }
    }

    /// Number of non-missing values
    pub fn present(&self) -> usize {
        match self {
            FeatureValues::Numeric(v) => v.iter().flatten().count(),
            FeatureValues::Categorical(v) => v.iter().flatten().count(),
        }
    }
}

/// Column cast to `f64`; nulls and NaN become `None`.
///
/// Text that does not parse as a number is an error rather than a missing
/// value, so a wrongly forced column fails instead of binning only nulls.
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = df.column(name)?;
    let float_col = col.cast(&DataType::Float64)?;
    if float_col.null_count() > col.null_count() {
        return Err(BinningError::config(format!(
            "Column '{}' holds {} values that are not numbers",
            name,
            float_col.null_count() - col.null_count()
        )));
    }
    Ok(float_col
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Column cast to text (numbers forced categorical keep their string form)
pub fn categorical_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = df.column(name)?;
    let str_col = col.cast(&DataType::String)?;
    Ok(str_col
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}
