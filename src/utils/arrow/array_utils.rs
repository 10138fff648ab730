//! Utilities for working with Arrow arrays.
//!
//! This module provides helpers for extracting typed columns from record
//! batches, normalizing their data types, and reading nullable values.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::compute::kernels::cast::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use log::debug;

use crate::error::{Error, Result};

/// Get a column from a record batch, casting it to `expected_type` when needed
///
/// # Arguments
///
/// * `batch` - The record batch containing the column
/// * `table` - Name of the input table (for error messages)
/// * `column_name` - The name of the column to extract
/// * `expected_type` - The data type the caller works with
///
/// # Returns
///
/// * `Ok(ArrayRef)` - The column array, converted if necessary
/// * `Err(Error::Schema)` - If the column is absent
/// * `Err(Error::Arrow)` - If the column cannot be cast
pub fn get_column(
    batch: &RecordBatch,
    table: &str,
    column_name: &str,
    expected_type: &DataType,
) -> Result<ArrayRef> {
    let idx = batch
        .schema()
        .index_of(column_name)
        .map_err(|_| Error::missing_column(table, column_name))?;

    let column = batch.column(idx);
    if column.data_type() == expected_type {
        return Ok(Arc::clone(column));
    }

    debug!(
        "Converting column '{column_name}' from {:?} to {expected_type:?}",
        column.data_type()
    );
    Ok(cast(column, expected_type)?)
}

/// Downcast a column to a specific array type with clear error messages
pub fn downcast_array<'a, A: Array + 'static>(
    array: &'a ArrayRef,
    column_name: &str,
) -> Result<&'a A> {
    array.as_any().downcast_ref::<A>().ok_or_else(|| {
        Error::Arrow(ArrowError::CastError(format!(
            "column '{column_name}' has unexpected type {:?}",
            array.data_type()
        )))
    })
}

/// Read a float, treating both null slots and NaN as missing
#[inline]
#[must_use]
pub fn value_f64(array: &Float64Array, index: usize) -> Option<f64> {
    if array.is_null(index) {
        return None;
    }
    let value = array.value(index);
    (!value.is_nan()).then_some(value)
}

/// Read a string slot, `None` when null
#[inline]
#[must_use]
pub fn value_str(array: &StringArray, index: usize) -> Option<&str> {
    (!array.is_null(index)).then(|| array.value(index))
}

/// Build a record batch from named columns, deriving the schema from the arrays
pub fn batch_from_columns(columns: Vec<(String, ArrayRef, bool)>) -> Result<RecordBatch> {
    let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = columns
        .into_iter()
        .map(|(name, array, nullable)| {
            (Field::new(name, array.data_type().clone(), nullable), array)
        })
        .unzip();

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}
