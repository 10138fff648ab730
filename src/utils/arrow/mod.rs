//! Arrow data handling utilities
//!
//! This module contains utilities for extracting typed columns and
//! nullable values from Arrow record batches.

pub mod array_utils;

// Re-export commonly used functions for convenience
pub use array_utils::{batch_from_columns, downcast_array, get_column, value_f64, value_str};
