//! Employment weights for leaf occupations
//!
//! Reads the tidy employment table (`taxonomy, year, level, code, value`),
//! keeps the level-4 rows of one taxonomy and left-joins them onto the leaf
//! table by 4-digit code. The join is many-to-one: two weights for the same
//! code is an integrity error, never a silent row duplication.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, FieldRef};
use arrow::record_batch::RecordBatch;
use log::{debug, info};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ensure_columns};
use crate::hierarchy::{LeafTable, pad_leaf_code};
use crate::taxonomy::{LEAF_LEVEL, LEVELS, Taxonomy};
use crate::utils::{batch_from_columns, get_column, log_warning, value_f64};

/// Name of the employment table, used in schema errors
pub const EMPLOYMENT_TABLE: &str = "employment";

/// Columns every employment table must carry
pub const EMPLOYMENT_COLUMNS: [&str; 5] = ["taxonomy", "year", "level", "code", "value"];

/// Leaf code of the "unspecified occupation" bucket
pub const UNSPECIFIED_CODE: &str = "0002";

/// One row of the tidy employment table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmploymentRecord {
    /// Taxonomy name, e.g. `ssyk2012`
    pub taxonomy: String,
    /// Reference year of the count
    pub year: i64,
    /// Classification level of `code`
    pub level: i64,
    /// Classification code
    pub code: String,
    /// Headcount; `None` when not reported
    pub value: Option<f64>,
}

impl EmploymentRecord {
    /// Arrow fields of the canonical employment schema
    #[must_use]
    pub fn fields() -> Vec<FieldRef> {
        vec![
            Arc::new(Field::new("taxonomy", DataType::Utf8, false)),
            Arc::new(Field::new("year", DataType::Int64, false)),
            Arc::new(Field::new("level", DataType::Int64, false)),
            Arc::new(Field::new("code", DataType::Utf8, false)),
            Arc::new(Field::new("value", DataType::Float64, true)),
        ]
    }

    /// Convert a record batch with employment columns into records
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        ensure_columns(
            EMPLOYMENT_TABLE,
            batch
                .schema_ref()
                .fields()
                .iter()
                .map(|f| f.name().as_str()),
            &EMPLOYMENT_COLUMNS,
        )?;

        let columns = Self::fields()
            .iter()
            .map(|field| {
                let array = get_column(batch, EMPLOYMENT_TABLE, field.name(), field.data_type())?;
                Ok((field.name().clone(), array, true))
            })
            .collect::<Result<Vec<(String, ArrayRef, bool)>>>()?;
        let normalized = batch_from_columns(columns)?;

        serde_arrow::from_record_batch(&normalized).map_err(|e| {
            Error::Integrity(format!(
                "employment table has null taxonomy, year, level or code: {e}"
            ))
        })
    }

    /// Convert records into a record batch with the canonical schema
    pub fn to_record_batch(records: &[Self]) -> Result<RecordBatch> {
        Ok(serde_arrow::to_record_batch(&Self::fields(), &records)?)
    }
}

/// Level-4 employment weights of one taxonomy, keyed by padded leaf code
#[derive(Debug, Clone)]
pub struct EmploymentWeights {
    /// Year the weights refer to
    pub year: i64,
    weights: FxHashMap<String, Option<f64>>,
    records: Vec<EmploymentRecord>,
}

impl EmploymentWeights {
    /// Extract the level-4 weights of `taxonomy` from an employment table.
    ///
    /// When the level-4 rows span several years the latest one is used.
    pub fn from_table(batch: &RecordBatch, taxonomy: Taxonomy) -> Result<Self> {
        let records = EmploymentRecord::from_record_batch(batch)?;
        Self::from_records(&records, taxonomy)
    }

    /// Extract the level-4 weights of `taxonomy` from decoded records
    pub fn from_records(records: &[EmploymentRecord], taxonomy: Taxonomy) -> Result<Self> {
        let leaf_rows: Vec<&EmploymentRecord> = records
            .iter()
            .filter(|r| {
                r.level == i64::from(LEAF_LEVEL) && r.taxonomy.eq_ignore_ascii_case(taxonomy.name())
            })
            .collect();

        let year = leaf_rows
            .iter()
            .map(|r| r.year)
            .max()
            .ok_or_else(|| {
                Error::Integrity(format!(
                    "employment table has no level-4 rows for taxonomy '{taxonomy}'"
                ))
            })?;

        if leaf_rows.iter().any(|r| r.year != year) {
            info!("[{taxonomy}] employment table spans several years, using {year}");
        }

        let mut weights = FxHashMap::default();
        let mut used = Vec::new();
        for record in leaf_rows.into_iter().filter(|r| r.year == year) {
            let code = pad_leaf_code(&record.code);
            if weights.insert(code.clone(), record.value).is_some() {
                return Err(Error::Integrity(format!(
                    "employment join is not many-to-one: code {code} has several weights in {year}"
                )));
            }
            used.push(EmploymentRecord {
                code,
                ..record.clone()
            });
        }
        debug!("[{taxonomy}] {} level-4 weights for {year}", weights.len());

        Ok(Self {
            year,
            weights,
            records: used,
        })
    }

    /// Number of weighted leaf codes
    #[must_use]
    pub fn code_count(&self) -> usize {
        self.weights.len()
    }

    /// Level-4 rows the weights were taken from, codes padded
    #[must_use]
    pub fn records(&self) -> &[EmploymentRecord] {
        &self.records
    }

    /// Weight of a padded leaf code; `None` when absent or unreported
    #[must_use]
    pub fn get(&self, code4: &str) -> Option<f64> {
        self.weights.get(code4).copied().flatten()
    }
}

/// Left-join the weights onto the leaf table as its `emp` column.
///
/// Rows without a matching weight keep a missing weight and are not dropped.
#[must_use]
pub fn attach_employment(mut table: LeafTable, weights: &EmploymentWeights) -> LeafTable {
    let emp: Float64Array = (0..table.num_rows())
        .map(|row| weights.get(table.code_at(LEAF_LEVEL, row)))
        .collect();

    let unmatched = count_missing(&emp);
    if unmatched > 0 {
        log_warning(
            &format!(
                "{unmatched} leaf rows have no employment weight ({} codes weighted)",
                weights.code_count()
            ),
            Some(table.taxonomy),
        );
    }

    table.emp = Some(emp);
    table
}

/// Rows whose weight is null or NaN
fn count_missing(emp: &Float64Array) -> usize {
    (0..emp.len())
        .filter(|&row| value_f64(emp, row).is_none())
        .count()
}

/// Build the tidy 4-level employment table from raw leaf headcounts.
///
/// Coarser levels hold the sum over leaf codes sharing the level's prefix.
/// The unspecified bucket is dropped. Rows are sorted by `(year, level, code)`.
#[must_use]
pub fn stack_employment_levels(
    taxonomy: Taxonomy,
    year: i64,
    leaf_counts: &[(String, f64)],
) -> Vec<EmploymentRecord> {
    let mut sums: BTreeMap<(i64, String), f64> = BTreeMap::new();
    for (code, value) in leaf_counts {
        let code = pad_leaf_code(code);
        if code == UNSPECIFIED_CODE {
            continue;
        }
        for level in LEVELS {
            let prefix: String = code.chars().take(usize::from(level)).collect();
            *sums.entry((i64::from(level), prefix)).or_insert(0.0) += value;
        }
    }

    sums.into_iter()
        .map(|((level, code), value)| EmploymentRecord {
            taxonomy: taxonomy.name().to_string(),
            year,
            level,
            code,
            value: Some(value),
        })
        .collect()
}
