//! Pipeline driver
//!
//! Runs, per taxonomy: input validation, hierarchy codec, employment join,
//! child counts, level roll-ups for both methods, percentile ranks and the
//! final `(level, code, year)` ordering. Taxonomies are independent: a
//! failure in one never prevents the others from producing output.

pub mod payload;

use std::collections::BTreeMap;
use std::time::Instant;

use arrow::array::{Array, ArrayRef, Int32Array, Int64Array, StringArray, UInt32Array};
use arrow::compute::{concat_batches, take};
use arrow::record_batch::RecordBatch;
use log::{debug, error, info};
use rayon::prelude::*;

use crate::aggregate::{
    AggregationMethod, CODE_COLUMN, LEVEL_COLUMN, YEAR_COLUMN, aggregate_level, base_level_four,
    output_schema,
};
use crate::children::{ChildCounts, compute_child_counts};
use crate::config::{MetricNaming, PipelineConfig};
use crate::error::{Error, Result};
use crate::hierarchy::{LeafTable, prepare_leaf_table};
use crate::io::InputSource;
use crate::rank::add_percentile_ranks;
use crate::taxonomy::{AGGREGATED_LEVELS, Taxonomy};
use crate::utils::{downcast_array, log_operation_complete, log_operation_start};
use crate::weights::{EmploymentRecord, EmploymentWeights, attach_employment};

pub use payload::{MemoizedPipeline, PipelinePayload};

/// Both aggregated tables of one taxonomy
#[derive(Debug, Clone)]
pub struct TaxonomyOutput {
    /// Taxonomy the tables describe
    pub taxonomy: Taxonomy,
    /// Year of the employment counts used as weights
    pub employment_year: i64,
    /// Level-4 employment rows used as weights, in employment schema
    pub employment: RecordBatch,
    /// Employment-weighted table
    pub weighted: RecordBatch,
    /// Simple-average table
    pub simple: RecordBatch,
}

impl TaxonomyOutput {
    /// Table produced by `method`
    #[must_use]
    pub const fn table(&self, method: AggregationMethod) -> &RecordBatch {
        match method {
            AggregationMethod::Weighted => &self.weighted,
            AggregationMethod::Simple => &self.simple,
        }
    }
}

/// Outcome of a multi-taxonomy run.
///
/// A failed taxonomy is absent from `outputs` and listed in `failures`.
#[derive(Debug, Default)]
pub struct PipelineResults {
    /// Successful taxonomies
    pub outputs: BTreeMap<Taxonomy, TaxonomyOutput>,
    /// Taxonomies that failed, with the error that stopped them
    pub failures: BTreeMap<Taxonomy, Error>,
    /// Taxonomies in the order they were requested
    pub order: Vec<Taxonomy>,
}

impl PipelineResults {
    /// Successful outputs in request order, then any others in taxonomy order
    pub fn ordered_outputs(&self) -> impl Iterator<Item = &TaxonomyOutput> {
        let requested = self.order.iter().filter_map(|t| self.outputs.get(t));
        let rest = self
            .outputs
            .iter()
            .filter(|(taxonomy, _)| !self.order.contains(*taxonomy))
            .map(|(_, output)| output);
        requested.chain(rest)
    }
}

/// Fetch the inputs of one taxonomy from `source` and process them
pub fn run_weighting(
    source: &dyn InputSource,
    taxonomy: Taxonomy,
    naming: &MetricNaming,
) -> Result<TaxonomyOutput> {
    log_operation_start("loading inputs", taxonomy);
    let leaf = source.leaf_table(taxonomy)?;
    let employment = source.employment_table(taxonomy)?;
    run_taxonomy(taxonomy, &leaf, &employment, naming)
}

/// Process one taxonomy from in-memory leaf and employment tables
pub fn run_taxonomy(
    taxonomy: Taxonomy,
    leaf: &RecordBatch,
    employment: &RecordBatch,
    naming: &MetricNaming,
) -> Result<TaxonomyOutput> {
    let start = Instant::now();

    let prepared = prepare_leaf_table(leaf, taxonomy, naming)?;
    let weights = EmploymentWeights::from_table(employment, taxonomy)?;
    let prepared = attach_employment(prepared, &weights);
    let counts = compute_child_counts(&prepared);

    let weighted = build_method_table(&prepared, &counts, AggregationMethod::Weighted, naming)?;
    let simple = build_method_table(&prepared, &counts, AggregationMethod::Simple, naming)?;

    log_operation_complete(
        "aggregated",
        taxonomy,
        weighted.num_rows(),
        Some(start.elapsed()),
    );

    Ok(TaxonomyOutput {
        taxonomy,
        employment_year: weights.year,
        employment: EmploymentRecord::to_record_batch(weights.records())?,
        weighted,
        simple,
    })
}

/// All four levels under one method, ranked and sorted
pub fn build_method_table(
    table: &LeafTable,
    counts: &ChildCounts,
    method: AggregationMethod,
    naming: &MetricNaming,
) -> Result<RecordBatch> {
    let mut levels = AGGREGATED_LEVELS
        .iter()
        .map(|&level| aggregate_level(table, counts, level, method))
        .collect::<Result<Vec<_>>>()?;
    levels.push(base_level_four(table, counts)?);

    let metrics = table.metric_names();
    let combined = concat_batches(&output_schema(&metrics), &levels)?;
    debug!(
        "[{}] {method}: {} rows across all levels",
        table.taxonomy,
        combined.num_rows()
    );

    let ranked = add_percentile_ranks(&combined, &metrics, naming)?;
    sort_output(&ranked)
}

/// Stable sort of an output table by `(level, code, year)`; null years
/// come last within a code
pub fn sort_output(batch: &RecordBatch) -> Result<RecordBatch> {
    let level_column = column(batch, LEVEL_COLUMN)?;
    let levels = downcast_array::<Int32Array>(&level_column, LEVEL_COLUMN)?;
    let code_column = column(batch, CODE_COLUMN)?;
    let codes = downcast_array::<StringArray>(&code_column, CODE_COLUMN)?;
    let year_column = column(batch, YEAR_COLUMN)?;
    let years = downcast_array::<Int64Array>(&year_column, YEAR_COLUMN)?;

    if u32::try_from(batch.num_rows()).is_err() {
        return Err(Error::Integrity(format!(
            "output table has too many rows to sort ({})",
            batch.num_rows()
        )));
    }
    let key = |row: u32| {
        let row = row as usize;
        let year = (!years.is_null(row)).then(|| years.value(row));
        (levels.value(row), codes.value(row), year.is_none(), year)
    };
    let mut order: Vec<u32> = (0..batch.num_rows() as u32).collect();
    order.sort_by(|&a, &b| key(a).cmp(&key(b)));

    if order.windows(2).all(|w| w[0] < w[1]) {
        return Ok(batch.clone());
    }

    let indices = UInt32Array::from(order);
    let columns = batch
        .columns()
        .iter()
        .map(|col| take(col.as_ref(), &indices, None))
        .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;
    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

fn column(batch: &RecordBatch, name: &str) -> Result<ArrayRef> {
    batch
        .column_by_name(name)
        .cloned()
        .ok_or_else(|| Error::missing_column("aggregated", name))
}

/// Process every configured taxonomy, in parallel when configured.
///
/// Fails with [`Error::NoData`] only when no taxonomy succeeded.
pub fn run_pipeline(source: &dyn InputSource, config: &PipelineConfig) -> Result<PipelineResults> {
    config.validate()?;
    let naming = &config.naming;
    let run = |taxonomy: &Taxonomy| (*taxonomy, run_weighting(source, *taxonomy, naming));

    let outcomes: Vec<(Taxonomy, Result<TaxonomyOutput>)> =
        if config.parallel && config.taxonomies.len() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads.max(1))
                .build()
                .map_err(|e| Error::Config(format!("could not build worker pool: {e}")))?;
            pool.install(|| config.taxonomies.par_iter().map(run).collect())
        } else {
            config.taxonomies.iter().map(run).collect()
        };

    let mut results = PipelineResults {
        order: config.taxonomies.clone(),
        ..PipelineResults::default()
    };
    for (taxonomy, outcome) in outcomes {
        match outcome {
            Ok(output) => {
                info!(
                    "[{taxonomy}] weighted rows={}, simple rows={}, employment year={}",
                    output.weighted.num_rows(),
                    output.simple.num_rows(),
                    output.employment_year
                );
                results.outputs.insert(taxonomy, output);
            }
            Err(e) => {
                error!("[{taxonomy}] processing failed: {e}");
                results.failures.insert(taxonomy, e);
            }
        }
    }

    if results.outputs.is_empty() {
        let reasons: Vec<String> = results
            .failures
            .iter()
            .map(|(taxonomy, e)| format!("{taxonomy}: {e}"))
            .collect();
        return Err(Error::NoData(format!(
            "no taxonomy produced aggregated data ({})",
            reasons.join("; ")
        )));
    }

    Ok(results)
}
