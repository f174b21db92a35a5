//! Row-level I/O: delimited rows, null masks, schemas and sampling.

pub mod null_mask;
pub mod rows;
pub mod sampler;
pub mod schema;

pub use null_mask::{format_null_mask, null_mask, parse_null_mask};
pub use rows::{RowReader, RowWriter};
pub use sampler::{BlockSampler, RowSampler};
pub use schema::{HeaderSchema, SchemaSource};
