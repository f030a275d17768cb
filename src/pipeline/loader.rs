//! Dataset loading and saving for CSV and Parquet files

use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

/// Default number of CSV rows scanned for schema inference
pub const DEFAULT_INFER_SCHEMA_LENGTH: usize = 10_000;

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Lazily scan a dataset (CSV or Parquet based on extension)
pub fn scan_dataset(path: &Path, infer_schema_length: usize) -> Result<LazyFrame> {
    let extension = extension_of(path);

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(infer_schema_length))
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    Ok(lf)
}

/// Load a dataset fully into memory
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    scan_dataset(path, infer_schema_length)?
        .collect()
        .with_context(|| format!("Failed to read dataset: {}", path.display()))
}

/// Column names without reading the data
pub fn get_column_names(path: &Path, infer_schema_length: usize) -> Result<Vec<String>> {
    let schema = scan_dataset(path, infer_schema_length)?
        .collect_schema()
        .with_context(|| format!("Failed to read schema: {}", path.display()))?;
    Ok(schema.iter_names().map(|n| n.to_string()).collect())
}

/// Save a frame as CSV or Parquet based on the extension
pub fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    let extension = extension_of(path);

    match extension.as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        _ => anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            extension
        ),
    }

    Ok(())
}
