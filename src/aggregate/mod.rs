//! Roll-up of leaf metrics to coarser classification levels
//!
//! Levels 1-3 are computed by grouping leaf rows on `(year, code, label)` of
//! the target level and averaging every metric, either weighted by
//! employment or unweighted. Level 4 is the leaf table itself, relabelled
//! into the common output schema.

pub mod schema;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::children::ChildCounts;
use crate::error::{Error, Result};
use crate::hierarchy::{LeafTable, MetricColumn};
use crate::taxonomy::LEAF_LEVEL;
use crate::utils::value_f64;

pub use schema::{
    CODE_COLUMN, LABEL_COLUMN, LEVEL_COLUMN, N_CHILDREN_COLUMN, TAXONOMY_COLUMN, YEAR_COLUMN,
    output_schema,
};

/// How metric values of a group are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    /// Employment-weighted mean
    Weighted,
    /// Unweighted arithmetic mean
    Simple,
}

impl AggregationMethod {
    /// Both methods, weighted first
    pub const ALL: [Self; 2] = [Self::Weighted, Self::Simple];

    /// Lowercase name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Weighted => "weighted",
            Self::Simple => "simple",
        }
    }

    /// Combine one metric over the rows of a group.
    ///
    /// Each metric is masked on its own present values, so metrics with
    /// different missingness in the same group get different denominators.
    #[must_use]
    pub fn reduce(self, table: &LeafTable, metric: &MetricColumn, rows: &[usize]) -> Option<f64> {
        match self {
            Self::Weighted => weighted_mean(
                rows.iter()
                    .map(|&row| (value_f64(&metric.values, row), table.emp_at(row))),
            ),
            Self::Simple => simple_mean(rows.iter().map(|&row| value_f64(&metric.values, row))),
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Weighted mean over `(value, weight)` pairs.
///
/// Pairs with a missing value or weight add nothing to the numerator or the
/// denominator. A zero denominator yields `None`.
#[must_use]
pub fn weighted_mean(pairs: impl IntoIterator<Item = (Option<f64>, Option<f64>)>) -> Option<f64> {
    let (numerator, denominator) = pairs
        .into_iter()
        .filter_map(|(value, weight)| Some((value?, weight?)))
        .fold((0.0, 0.0), |(num, den), (value, weight)| {
            (num + value * weight, den + weight)
        });

    (denominator != 0.0).then(|| numerator / denominator)
}

/// Arithmetic mean of the present values; `None` when none are present
#[must_use]
pub fn simple_mean(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

    (count > 0).then(|| sum / count as f64)
}

/// Aggregate the leaf table to `level` (1, 2 or 3).
///
/// Produces one row per `(year, code, label)` of the target level, ordered
/// by that key, with the child count for the level attached. Rows without
/// a year do not belong to any group.
pub fn aggregate_level(
    table: &LeafTable,
    counts: &ChildCounts,
    level: u8,
    method: AggregationMethod,
) -> Result<RecordBatch> {
    if !(1..LEAF_LEVEL).contains(&level) {
        return Err(Error::Integrity(format!(
            "only levels 1-3 can be aggregated from level 4, got level {level}"
        )));
    }
    if method == AggregationMethod::Weighted && table.emp.is_none() {
        return Err(Error::Integrity(
            "weighted aggregation needs employment weights attached".to_string(),
        ));
    }

    let mut groups: BTreeMap<(i64, &str, &str), Vec<usize>> = BTreeMap::new();
    for row in 0..table.num_rows() {
        if let Some(year) = table.year_at(row) {
            groups
                .entry((year, table.code_at(level, row), table.label_at(level, row)))
                .or_default()
                .push(row);
        }
    }

    let mut codes = Vec::with_capacity(groups.len());
    let mut labels = Vec::with_capacity(groups.len());
    let mut years = Vec::with_capacity(groups.len());
    let mut n_children = Vec::with_capacity(groups.len());
    let mut metric_values: Vec<Vec<Option<f64>>> =
        vec![Vec::with_capacity(groups.len()); table.metrics.len()];

    for ((year, code, label), rows) in &groups {
        codes.push(*code);
        labels.push(*label);
        years.push(*year);
        n_children.push(counts.get(level, *year, code));
        for (metric, values) in table.metrics.iter().zip(metric_values.iter_mut()) {
            values.push(method.reduce(table, metric, rows));
        }
    }
    debug!(
        "[{}] level {level} {method}: {} groups from {} leaf rows",
        table.taxonomy,
        groups.len(),
        table.num_rows()
    );

    let metrics = metric_values
        .into_iter()
        .map(|values| Arc::new(Float64Array::from(values)) as ArrayRef)
        .collect();

    level_batch(
        table,
        level,
        Arc::new(StringArray::from(codes)),
        Arc::new(StringArray::from(labels)),
        Arc::new(Int64Array::from(years)),
        Arc::new(Int64Array::from(n_children)),
        metrics,
    )
}

/// The leaf level in output form: every leaf row, metric values untouched,
/// with its child count (always 1).
pub fn base_level_four(table: &LeafTable, counts: &ChildCounts) -> Result<RecordBatch> {
    let n_children: Int64Array = (0..table.num_rows())
        .map(|row| {
            table
                .year_at(row)
                .and_then(|year| counts.get(LEAF_LEVEL, year, table.code_at(LEAF_LEVEL, row)))
        })
        .collect();

    let (Some(codes), Some(labels)) = (table.codes(LEAF_LEVEL), table.labels(LEAF_LEVEL)) else {
        return Err(Error::Integrity("leaf table has no level-4 codes".to_string()));
    };
    let metrics = table
        .metrics
        .iter()
        .map(|metric| Arc::new(metric.values.clone()) as ArrayRef)
        .collect();

    level_batch(
        table,
        LEAF_LEVEL,
        Arc::new(codes.clone()),
        Arc::new(labels.clone()),
        Arc::new(table.year.clone()),
        Arc::new(n_children),
        metrics,
    )
}

/// Assemble one level's rows under the output schema
fn level_batch(
    table: &LeafTable,
    level: u8,
    codes: ArrayRef,
    labels: ArrayRef,
    years: ArrayRef,
    n_children: ArrayRef,
    metrics: Vec<ArrayRef>,
) -> Result<RecordBatch> {
    let num_rows = codes.len();
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec![table.taxonomy.name(); num_rows])),
        Arc::new(Int32Array::from(vec![i32::from(level); num_rows])),
        codes,
        labels,
        years,
        n_children,
    ];
    columns.extend(metrics);

    Ok(RecordBatch::try_new(
        output_schema(&table.metric_names()),
        columns,
    )?)
}
