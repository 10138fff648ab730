//! Output schema shared by every level and both methods.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};

/// Taxonomy name column
pub const TAXONOMY_COLUMN: &str = "taxonomy";
/// Classification level column
pub const LEVEL_COLUMN: &str = "level";
/// Code column
pub const CODE_COLUMN: &str = "code";
/// Label column
pub const LABEL_COLUMN: &str = "label";
/// Year column
pub const YEAR_COLUMN: &str = "year";
/// Direct-descendant count column
pub const N_CHILDREN_COLUMN: &str = "n_children";

/// Key columns preceding the metric columns
fn key_fields() -> Vec<Field> {
    vec![
        Field::new(TAXONOMY_COLUMN, DataType::Utf8, false),
        Field::new(LEVEL_COLUMN, DataType::Int32, false),
        Field::new(CODE_COLUMN, DataType::Utf8, false),
        Field::new(LABEL_COLUMN, DataType::Utf8, false),
        Field::new(YEAR_COLUMN, DataType::Int64, true),
        Field::new(N_CHILDREN_COLUMN, DataType::Int64, true),
    ]
}

/// Schema of an aggregated table before percentile ranks are added
#[must_use]
pub fn output_schema(metrics: &[&str]) -> SchemaRef {
    let mut fields = key_fields();
    fields.extend(
        metrics
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, true)),
    );
    Arc::new(Schema::new(fields))
}
