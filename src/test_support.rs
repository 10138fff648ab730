//! Builders for small leaf and employment tables used by unit tests

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;

use crate::config::MetricNaming;
use crate::hierarchy::{LeafTable, prepare_leaf_table};
use crate::taxonomy::{LEVELS, Taxonomy};
use crate::utils::batch_from_columns;
use crate::weights::{EmploymentWeights, attach_employment, stack_employment_levels};

/// One leaf row: year, 4-digit code, metric values
pub type Row<'a> = (i64, &'a str, Vec<Option<f64>>);

/// Raw leaf table whose level columns are derived from the leaf code,
/// labelled `"G<prefix>"`
pub fn raw_leaf_batch(taxonomy: Taxonomy, metrics: &[&str], rows: &[Row<'_>]) -> RecordBatch {
    let mut columns: Vec<(String, ArrayRef, bool)> = vec![(
        "year".to_string(),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.0))) as ArrayRef,
        false,
    )];
    for level in LEVELS {
        let cells: Vec<String> = rows
            .iter()
            .map(|(_, code, _)| {
                let prefix: String = code.chars().take(usize::from(level)).collect();
                format!("{prefix} G{prefix}")
            })
            .collect();
        columns.push((
            taxonomy.level_column(level),
            Arc::new(StringArray::from(cells)) as ArrayRef,
            false,
        ));
    }
    for (idx, name) in metrics.iter().enumerate() {
        let values: Float64Array = rows.iter().map(|r| r.2[idx]).collect();
        columns.push((name.to_string(), Arc::new(values) as ArrayRef, true));
    }
    batch_from_columns(columns).unwrap()
}

/// Prepared SSYK 2012 leaf table
pub fn leaf_table(metrics: &[&str], rows: &[Row<'_>]) -> LeafTable {
    let raw = raw_leaf_batch(Taxonomy::Ssyk2012, metrics, rows);
    prepare_leaf_table(&raw, Taxonomy::Ssyk2012, &MetricNaming::default()).unwrap()
}

/// Prepared SSYK 2012 leaf table with `(code, weight)` employment attached
pub fn weighted_leaf_table(
    metrics: &[&str],
    rows: &[Row<'_>],
    weights: &[(&str, f64)],
) -> LeafTable {
    let counts: Vec<(String, f64)> = weights
        .iter()
        .map(|(code, value)| ((*code).to_string(), *value))
        .collect();
    let records = stack_employment_levels(Taxonomy::Ssyk2012, 2022, &counts);
    let weights = EmploymentWeights::from_records(&records, Taxonomy::Ssyk2012).unwrap();
    attach_employment(leaf_table(metrics, rows), &weights)
}
