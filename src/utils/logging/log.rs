//! Logging utilities
//!
//! This module provides standardized logging functions for pipeline stages.

use crate::taxonomy::Taxonomy;

/// Log a stage start with consistent format
///
/// # Arguments
/// * `operation` - Description of the stage
/// * `taxonomy` - Taxonomy being processed
pub fn log_operation_start(operation: &str, taxonomy: Taxonomy) {
    log::info!("[{taxonomy}] {operation}");
}

/// Log a stage completion with consistent format
///
/// # Arguments
/// * `operation` - Description of the stage
/// * `taxonomy` - Taxonomy that was processed
/// * `rows` - Number of rows produced
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(
    operation: &str,
    taxonomy: Taxonomy,
    rows: usize,
    elapsed: Option<std::time::Duration>,
) {
    if let Some(duration) = elapsed {
        log::info!("[{taxonomy}] {operation}: {rows} rows in {duration:?}");
    } else {
        log::info!("[{taxonomy}] {operation}: {rows} rows");
    }
}

/// Log a non-fatal anomaly with consistent format
pub fn log_warning(message: &str, taxonomy: Option<Taxonomy>) {
    if let Some(taxonomy) = taxonomy {
        log::warn!("[{taxonomy}] {message}");
    } else {
        log::warn!("{message}");
    }
}
