//! Hierarchy codec for classification-coded leaf tables
//!
//! Splits the four `"<code> <label>"` classification columns of a raw leaf
//! table into code and label columns, normalizes codes (leaf codes
//! zero-padded, coarser codes unpadded) and types the metric columns.

pub mod codes;

use arrow::array::{Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use log::debug;

use crate::config::MetricNaming;
use crate::error::{Error, Result};
use crate::taxonomy::{LEVELS, Taxonomy};
use crate::utils::{downcast_array, get_column, log_warning, value_f64, value_str};

pub use codes::{is_ancestor_code, pad_leaf_code, split_code_label, strip_code, zero_pad};

/// Name of the table checked by the codec, used in schema errors
pub const LEAF_TABLE: &str = "leaf";

/// A metric column of the leaf table
#[derive(Debug, Clone)]
pub struct MetricColumn {
    /// Column name, including its namespace prefix
    pub name: String,
    /// Values; null or NaN means missing
    pub values: Float64Array,
}

/// A leaf table after code splitting and type normalization
#[derive(Debug, Clone)]
pub struct LeafTable {
    /// Taxonomy the codes belong to
    pub taxonomy: Taxonomy,
    /// Observation year of each row
    pub year: Int64Array,
    codes: Vec<StringArray>,
    labels: Vec<StringArray>,
    /// Metric columns in input order
    pub metrics: Vec<MetricColumn>,
    /// Employment weight per row, once attached
    pub emp: Option<Float64Array>,
}

impl LeafTable {
    /// Number of leaf rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.year.len()
    }

    /// Code column for a level in 1..=4
    #[must_use]
    pub fn codes(&self, level: u8) -> Option<&StringArray> {
        self.codes.get(usize::from(level).wrapping_sub(1))
    }

    /// Label column for a level in 1..=4
    #[must_use]
    pub fn labels(&self, level: u8) -> Option<&StringArray> {
        self.labels.get(usize::from(level).wrapping_sub(1))
    }

    /// Year of a row, `None` when missing
    #[must_use]
    pub fn year_at(&self, row: usize) -> Option<i64> {
        (!self.year.is_null(row)).then(|| self.year.value(row))
    }

    /// Code of a row at a level (empty when the level is unknown)
    #[must_use]
    pub fn code_at(&self, level: u8, row: usize) -> &str {
        self.codes(level)
            .and_then(|codes| value_str(codes, row))
            .unwrap_or_default()
    }

    /// Label of a row at a level (empty when the level is unknown)
    #[must_use]
    pub fn label_at(&self, level: u8, row: usize) -> &str {
        self.labels(level)
            .and_then(|labels| value_str(labels, row))
            .unwrap_or_default()
    }

    /// Employment weight of a row, `None` when missing or not attached
    #[must_use]
    pub fn emp_at(&self, row: usize) -> Option<f64> {
        self.emp.as_ref().and_then(|emp| value_f64(emp, row))
    }

    /// Metric column names in input order
    #[must_use]
    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Metric columns of a table, in column order
#[must_use]
pub fn metric_columns(batch: &RecordBatch, naming: &MetricNaming) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .filter(|name| naming.is_metric(name))
        .collect()
}

/// Split and normalize a raw leaf table.
///
/// Fails with a schema error, before any processing, when `year`, any of
/// the four classification columns or every metric column is absent.
pub fn prepare_leaf_table(
    raw: &RecordBatch,
    taxonomy: Taxonomy,
    naming: &MetricNaming,
) -> Result<LeafTable> {
    let schema = raw.schema();
    let level_columns = taxonomy.level_columns();
    let mut required: Vec<&str> = vec!["year"];
    required.extend(level_columns.iter().map(String::as_str));
    crate::error::ensure_columns(
        LEAF_TABLE,
        schema.fields().iter().map(|f| f.name().as_str()),
        &required,
    )?;

    let metric_names = metric_columns(raw, naming);
    if metric_names.is_empty() {
        return Err(Error::missing_column(
            LEAF_TABLE,
            format!("{}*", naming.metric_prefix),
        ));
    }

    let year_column = get_column(raw, LEAF_TABLE, "year", &DataType::Int64)?;
    let year = downcast_array::<Int64Array>(&year_column, "year")?.clone();

    let mut level_codes = Vec::with_capacity(LEVELS.len());
    let mut level_labels = Vec::with_capacity(LEVELS.len());
    for (level, column_name) in LEVELS.into_iter().zip(&level_columns) {
        let column = get_column(raw, LEAF_TABLE, column_name, &DataType::Utf8)?;
        let cells = downcast_array::<StringArray>(&column, column_name)?;
        let (split_codes, split_labels) = split_level(cells, level);
        level_codes.push(split_codes);
        level_labels.push(split_labels);
    }

    let metrics = metric_names
        .into_iter()
        .map(|name| {
            let column = get_column(raw, LEAF_TABLE, &name, &DataType::Float64)?;
            let values = downcast_array::<Float64Array>(&column, &name)?.clone();
            Ok(MetricColumn { name, values })
        })
        .collect::<Result<Vec<_>>>()?;

    let table = LeafTable {
        taxonomy,
        year,
        codes: level_codes,
        labels: level_labels,
        metrics,
        emp: None,
    };

    let mismatches = count_prefix_mismatches(&table);
    if mismatches > 0 {
        log_warning(
            &format!("{mismatches} rows have a coarse code that is not a prefix of their leaf code"),
            Some(taxonomy),
        );
    }
    debug!(
        "[{taxonomy}] prepared {} leaf rows with {} metrics",
        table.num_rows(),
        table.metrics.len()
    );

    Ok(table)
}

/// Split one classification column into normalized codes and labels
fn split_level(cells: &StringArray, level: u8) -> (StringArray, StringArray) {
    let (codes, labels): (Vec<String>, Vec<String>) = (0..cells.len())
        .map(|row| {
            let (code, label) = value_str(cells, row).map_or(("", ""), split_code_label);
            let code = if level == 4 {
                pad_leaf_code(code)
            } else {
                strip_code(code)
            };
            (code, label.to_string())
        })
        .unzip();

    (StringArray::from(codes), StringArray::from(labels))
}

/// Rows whose level 1-3 code is not a prefix of the row's leaf code
#[must_use]
pub fn count_prefix_mismatches(table: &LeafTable) -> usize {
    (0..table.num_rows())
        .filter(|&row| {
            let leaf = table.code_at(4, row);
            [1u8, 2, 3]
                .iter()
                .any(|&level| !is_ancestor_code(table.code_at(level, row), level, leaf))
        })
        .count()
}
