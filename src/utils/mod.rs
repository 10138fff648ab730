//! Shared helpers for Arrow column access and stage logging

pub mod arrow;
pub mod logging;

pub use self::arrow::{batch_from_columns, downcast_array, get_column, value_f64, value_str};
pub use logging::{log_operation_complete, log_operation_start, log_warning};
