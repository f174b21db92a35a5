//! This module defines the core value types of the engine: the SQL-like
//! `DataType` descriptor and the `Column` identity built on top of it,
//! including the lineage-based naming of derived and exception columns.

pub mod column;
pub mod data_type;

// Re-export the main type(s) for easier access.
pub use column::{exception_col_id, is_exception_col_id, original_col_id, Column};
pub use data_type::DataType;
