//! This file is the root of the `colshape` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring the top-level modules (`types`, `operators`, `patterns`,
//!     `expression`, `pipeline`, `io`) so the Rust compiler knows they exist.
//! 2.  Re-exporting the types most callers need, plus a few one-call helpers
//!     that chain sampling, tree building and the apply pipelines.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod config;
pub mod error;
pub mod expression;
pub mod io;
pub mod operators;
pub mod patterns;
pub mod pipeline;
pub mod types;

#[doc(hidden)]
pub use log as __log;

//==================================================================================
// 2. Public Surface
//==================================================================================
pub use config::ColshapeConfig;
pub use error::{ColshapeError, PatternNotApplicable, Result};
pub use expression::{CompressionNode, DecompressionNode, ExpressionNode, ExpressionTree, TreeType};
pub use observability::init_logging;
pub use pipeline::{
    CompressionPipeline, CompressionStats, DecompressionContext, DecompressionStats, TreeBuilder,
};
pub use types::{Column, DataType};

use std::io::BufRead;

use io::{RowReader, RowSampler};

/// Draws a detection sample from delimited rows. `nb_rows` is the number of
/// rows in `input`.
pub fn sample_rows<R: BufRead>(
    input: R,
    nb_rows: usize,
    sampler: &mut dyn RowSampler,
    config: &ColshapeConfig,
) -> Result<Vec<Vec<String>>> {
    let mut rows = RowReader::new(input, &config.format.delimiter);
    sampler.sample(&mut rows, nb_rows)
}

/// Builds a compression tree for `columns` from sample rows.
pub fn build_tree(
    columns: &[Column],
    sample: &[Vec<String>],
    config: &ColshapeConfig,
) -> Result<ExpressionTree> {
    let tree = TreeBuilder::new(config).build(columns, sample)?;
    log::info!(
        "built tree: {} levels, {} nodes, {} output columns",
        tree.levels().len(),
        tree.nodes().len(),
        tree.get_out_columns().len()
    );
    Ok(tree)
}
