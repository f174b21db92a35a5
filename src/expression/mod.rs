//! The expression-tree data structure: nodes, levels, topology and recomposition.

pub mod node;
pub mod tree;

pub use node::{CompressionNode, DecompressionNode, ExpressionNode, NodeBase};
pub use tree::{ColumnEntry, ExpressionTree, TreeType};
