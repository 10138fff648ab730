//! Where the per-taxonomy input tables come from.

use std::collections::BTreeMap;

use arrow::record_batch::RecordBatch;
use log::info;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::io::read_csv;
use crate::taxonomy::Taxonomy;

/// Supplies the raw leaf metric table and the employment table of a taxonomy
pub trait InputSource: Send + Sync {
    /// Leaf-level metric table with `year`, the four level columns and metrics
    fn leaf_table(&self, taxonomy: Taxonomy) -> Result<RecordBatch>;

    /// Employment counts with `taxonomy`, `year`, `level`, `code`, `value`
    fn employment_table(&self, taxonomy: Taxonomy) -> Result<RecordBatch>;
}

/// Reads both tables from delimited text files named by a [`PipelineConfig`]
#[derive(Debug, Clone)]
pub struct CsvSource {
    config: PipelineConfig,
}

impl CsvSource {
    /// Source resolving paths and the delimiter from `config`
    #[must_use]
    pub const fn new(config: PipelineConfig) -> Self {
        Self { config }
    }
}

impl InputSource for CsvSource {
    fn leaf_table(&self, taxonomy: Taxonomy) -> Result<RecordBatch> {
        let path = self.config.leaf_path(taxonomy);
        info!("[{taxonomy}] reading leaf metrics from {}", path.display());
        let levels = taxonomy.level_columns();
        let text_columns: Vec<&str> = levels.iter().map(String::as_str).collect();
        read_csv(&path, self.config.delimiter, &text_columns)
    }

    fn employment_table(&self, taxonomy: Taxonomy) -> Result<RecordBatch> {
        let path = self.config.employment_path(taxonomy);
        info!("[{taxonomy}] reading employment from {}", path.display());
        read_csv(&path, self.config.delimiter, &["taxonomy", "code"])
    }
}

/// Tables held in memory, mainly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: BTreeMap<Taxonomy, (RecordBatch, RecordBatch)>,
}

impl MemorySource {
    /// Empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the leaf and employment tables of a taxonomy
    #[must_use]
    pub fn with_taxonomy(
        mut self,
        taxonomy: Taxonomy,
        leaf: RecordBatch,
        employment: RecordBatch,
    ) -> Self {
        self.tables.insert(taxonomy, (leaf, employment));
        self
    }

    fn entry(&self, taxonomy: Taxonomy) -> Result<&(RecordBatch, RecordBatch)> {
        self.tables
            .get(&taxonomy)
            .ok_or_else(|| Error::Config(format!("no input tables registered for {taxonomy}")))
    }
}

impl InputSource for MemorySource {
    fn leaf_table(&self, taxonomy: Taxonomy) -> Result<RecordBatch> {
        Ok(self.entry(taxonomy)?.0.clone())
    }

    fn employment_table(&self, taxonomy: Taxonomy) -> Result<RecordBatch> {
        Ok(self.entry(taxonomy)?.1.clone())
    }
}
