//! Roll occupation-level AI-exposure indices up a four-level occupational
//! classification, producing employment-weighted and simple-average tables
//! with per-cohort percentile ranks.

pub mod aggregate;
pub mod children;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod io;
pub mod pipeline;
pub mod rank;
pub mod taxonomy;
pub mod utils;
pub mod weights;

#[cfg(test)]
mod test_support;

// Core types
pub use config::{MetricNaming, PipelineConfig};
pub use error::{Error, Result};
pub use taxonomy::Taxonomy;

// Pipeline stages
pub use aggregate::{AggregationMethod, aggregate_level, base_level_four};
pub use children::{ChildCounts, compute_child_counts};
pub use hierarchy::{LeafTable, prepare_leaf_table};
pub use rank::add_percentile_ranks;
pub use weights::{EmploymentRecord, EmploymentWeights, attach_employment};

// Driver and I/O
pub use io::{CsvSource, InputSource, MemorySource, OutputFormat, OutputStore};
pub use pipeline::{
    MemoizedPipeline, PipelinePayload, PipelineResults, TaxonomyOutput, run_pipeline,
    run_taxonomy, run_weighting,
};

// Arrow types
pub use arrow::record_batch::RecordBatch;
