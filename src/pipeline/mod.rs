//! The apply pipelines: tree building over a sample, compression of raw rows,
//! and decompression (with optional validation) of transformed rows.

pub mod builder;
pub mod compress;
pub mod decompress;
pub mod validation;

pub use builder::TreeBuilder;
pub use compress::{ColumnNullStats, CompressionPipeline, CompressionStats, ExpressionManager};
pub use decompress::{DecompressionContext, DecompressionStats};
pub use validation::{FieldDiff, LengthDiff, RowValidator, ValidationDiff};
