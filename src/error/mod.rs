//! Error handling for the roll-up pipeline.

use std::io;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Errors raised while building aggregated tables
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required column is absent from an input table
    #[error("Schema error: {table} table is missing column(s) {}", .columns.join(", "))]
    Schema {
        /// Which input table was inspected
        table: String,
        /// The missing column names
        columns: Vec<String>,
    },

    /// A join or level contract was violated
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// No taxonomy produced any output
    #[error("No data: {0}")]
    NoData(String),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Record (de)serialization through `serde_arrow`
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_arrow::Error),

    /// Manifest or config JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a schema error for a single missing column
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            columns: vec![column.into()],
        }
    }

    /// Whether this is one of the errors raised by the transform itself
    /// rather than by an I/O collaborator
    #[must_use]
    pub const fn is_core(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. } | Self::Integrity(_) | Self::NoData(_)
        )
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fail with a schema error naming every column of `required` absent from `present`
pub fn ensure_columns<'a>(
    table: &str,
    present: impl IntoIterator<Item = &'a str> + Clone,
    required: &[&str],
) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|col| !present.clone().into_iter().any(|name| name == **col))
        .map(|col| (*col).to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Schema {
            table: table.to_string(),
            columns: missing,
        })
    }
}
