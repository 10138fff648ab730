use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use daioe_rollup::io::write_csv;
use daioe_rollup::Taxonomy;

/// One leaf row: year, 4-digit leaf code, one value per metric
pub type LeafRow<'a> = (i64, &'a str, Vec<Option<f64>>);

/// Leaf table whose level columns hold `"<prefix> Group <prefix>"`
#[must_use]
pub fn leaf_batch(taxonomy: Taxonomy, metrics: &[&str], rows: &[LeafRow<'_>]) -> RecordBatch {
    let mut fields = vec![Field::new("year", DataType::Int64, true)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(Int64Array::from_iter_values(
        rows.iter().map(|r| r.0),
    ))];

    for level in 1..=4usize {
        let cells: Vec<String> = rows
            .iter()
            .map(|(_, code, _)| {
                let prefix = &code[..level];
                format!("{prefix} Group {prefix}")
            })
            .collect();
        fields.push(Field::new(
            taxonomy.level_column(level as u8),
            DataType::Utf8,
            true,
        ));
        columns.push(Arc::new(StringArray::from(cells)));
    }

    for (idx, metric) in metrics.iter().enumerate() {
        fields.push(Field::new(*metric, DataType::Float64, true));
        columns.push(Arc::new(
            rows.iter().map(|r| r.2[idx]).collect::<Float64Array>(),
        ));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
}

/// Level-4 employment rows of one taxonomy and year
#[must_use]
pub fn employment_batch(taxonomy: Taxonomy, year: i64, counts: &[(&str, Option<f64>)]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("taxonomy", DataType::Utf8, true),
        Field::new("year", DataType::Int64, true),
        Field::new("level", DataType::Int64, true),
        Field::new("code", DataType::Utf8, true),
        Field::new("value", DataType::Float64, true),
    ]);
    let n = counts.len();
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(StringArray::from(vec![taxonomy.name(); n])),
            Arc::new(Int64Array::from(vec![year; n])),
            Arc::new(Int64Array::from(vec![4; n])),
            Arc::new(StringArray::from_iter_values(counts.iter().map(|c| c.0))),
            Arc::new(counts.iter().map(|c| c.1).collect::<Float64Array>()),
        ],
    )
    .unwrap()
}

/// Write both input tables of a taxonomy under their default file names
pub fn write_inputs(dir: &Path, taxonomy: Taxonomy, leaf: &RecordBatch, employment: &RecordBatch) {
    write_csv(&dir.join(format!("daioe_{taxonomy}.csv")), leaf, ',').unwrap();
    write_csv(&dir.join(format!("employment_{taxonomy}.csv")), employment, ',').unwrap();
}

fn column<'a, A: Array + 'static>(batch: &'a RecordBatch, name: &str) -> &'a A {
    batch
        .column_by_name(name)
        .unwrap_or_else(|| panic!("missing column {name}"))
        .as_any()
        .downcast_ref::<A>()
        .unwrap_or_else(|| panic!("column {name} has unexpected type"))
}

#[must_use]
pub fn f64_values(batch: &RecordBatch, name: &str) -> Vec<Option<f64>> {
    let array = column::<Float64Array>(batch, name);
    (0..array.len())
        .map(|i| (!array.is_null(i)).then(|| array.value(i)))
        .collect()
}

#[must_use]
pub fn i64_values(batch: &RecordBatch, name: &str) -> Vec<Option<i64>> {
    let array = column::<Int64Array>(batch, name);
    (0..array.len())
        .map(|i| (!array.is_null(i)).then(|| array.value(i)))
        .collect()
}

#[must_use]
pub fn str_values(batch: &RecordBatch, name: &str) -> Vec<String> {
    let array = column::<StringArray>(batch, name);
    (0..array.len()).map(|i| array.value(i).to_string()).collect()
}

/// Row of the output entry `(level, code, year)`
#[must_use]
pub fn find_row(batch: &RecordBatch, level: i32, code: &str, year: i64) -> usize {
    let levels = column::<Int32Array>(batch, "level");
    let codes = column::<StringArray>(batch, "code");
    let years = column::<Int64Array>(batch, "year");
    (0..batch.num_rows())
        .find(|&i| {
            levels.value(i) == level
                && codes.value(i) == code
                && !years.is_null(i)
                && years.value(i) == year
        })
        .unwrap_or_else(|| panic!("no row for level {level} code {code} year {year}"))
}

/// Rows of one output level
#[must_use]
pub fn level_rows(batch: &RecordBatch, level: i32) -> Vec<usize> {
    let levels = column::<Int32Array>(batch, "level");
    (0..batch.num_rows())
        .filter(|&i| levels.value(i) == level)
        .collect()
}

/// Metric value at one output row
#[must_use]
pub fn value_at(batch: &RecordBatch, name: &str, row: usize) -> Option<f64> {
    f64_values(batch, name)[row]
}

pub fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.unwrap_or_else(|| panic!("expected {expected}, got missing"));
    assert!(
        (actual - expected).abs() < 1e-12,
        "expected {expected}, got {actual}"
    );
}
