//! Percentile ranks of aggregated metrics within `(year, level)` cohorts.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;

use crate::aggregate::{LEVEL_COLUMN, YEAR_COLUMN};
use crate::config::MetricNaming;
use crate::error::Result;
use crate::utils::{downcast_array, get_column, value_f64};

const AGGREGATED_TABLE: &str = "aggregated";

/// Fractional ranks in `(0, 1]`: rank / number of present values, ties
/// sharing their average rank. Missing values get no rank.
#[must_use]
pub fn fractional_ranks(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut present: Vec<(f64, usize)> = values
        .iter()
        .enumerate()
        .filter_map(|(idx, value)| value.filter(|v| !v.is_nan()).map(|v| (v, idx)))
        .collect();
    present.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let count = present.len() as f64;
    let mut ranks = vec![None; values.len()];
    let mut start = 0;
    while start < present.len() {
        let mut end = start + 1;
        while end < present.len() && present[end].0 == present[start].0 {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let average_rank = (start + 1 + end) as f64 / 2.0;
        for &(_, idx) in &present[start..end] {
            ranks[idx] = Some(average_rank / count);
        }
        start = end;
    }
    ranks
}

/// Append one percentile-rank column per metric.
///
/// Ranks are computed independently inside every `(year, level)` cohort, so
/// codes are only compared with same-granularity peers of the same year.
/// Rows without a year are not ranked.
pub fn add_percentile_ranks(
    batch: &RecordBatch,
    metrics: &[&str],
    naming: &MetricNaming,
) -> Result<RecordBatch> {
    let year_column = get_column(batch, AGGREGATED_TABLE, YEAR_COLUMN, &DataType::Int64)?;
    let years = downcast_array::<Int64Array>(&year_column, YEAR_COLUMN)?;
    let level_column = get_column(batch, AGGREGATED_TABLE, LEVEL_COLUMN, &DataType::Int32)?;
    let levels = downcast_array::<Int32Array>(&level_column, LEVEL_COLUMN)?;

    let mut cohorts: FxHashMap<(i64, i32), Vec<usize>> = FxHashMap::default();
    for row in 0..batch.num_rows() {
        if years.is_null(row) || levels.is_null(row) {
            continue;
        }
        cohorts
            .entry((years.value(row), levels.value(row)))
            .or_default()
            .push(row);
    }

    let mut fields: Vec<Arc<Field>> = batch.schema().fields().iter().cloned().collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

    for metric in metrics {
        let column = get_column(batch, AGGREGATED_TABLE, metric, &DataType::Float64)?;
        let values = downcast_array::<Float64Array>(&column, metric)?;

        let mut ranks: Vec<Option<f64>> = vec![None; batch.num_rows()];
        for rows in cohorts.values() {
            let cohort_values: Vec<Option<f64>> =
                rows.iter().map(|&row| value_f64(values, row)).collect();
            for (&row, rank) in rows.iter().zip(fractional_ranks(&cohort_values)) {
                ranks[row] = rank;
            }
        }

        fields.push(Arc::new(Field::new(
            naming.rank_column(metric),
            DataType::Float64,
            true,
        )));
        columns.push(Arc::new(Float64Array::from(ranks)));
    }

    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?)
}
