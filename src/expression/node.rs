// In: src/expression/node.rs

//! Expression nodes: one applied pattern, with its columns and operator parameters.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::operators::{self, OperatorInfo};
use crate::types::Column;

/// Fields shared by compression and decompression nodes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeBase {
    /// Pattern identity plus variant key, e.g. `"CharSetSplit:??DD"`.
    pub p_id: String,
    /// Detector family name, e.g. `"DictPattern"`.
    pub p_name: String,
    pub cols_in: Vec<Column>,
    /// Inputs fully replaced by this node. The rest of `cols_in` are
    /// metadata inputs that flow through unchanged.
    pub cols_in_consumed: Vec<Column>,
    pub cols_out: Vec<Column>,
    pub operator_info: OperatorInfo,
    /// Diagnostics only (coverage, null_coverage, ...).
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
    pub pattern_signature: String,
    #[serde(default)]
    pub parents: BTreeSet<String>,
    #[serde(default)]
    pub children: BTreeSet<String>,
}

impl NodeBase {
    pub fn is_consumed(&self, col_id: &str) -> bool {
        self.cols_in_consumed.iter().any(|c| c.col_id == col_id)
    }

    /// Inputs that are read but not replaced.
    pub fn unconsumed_inputs(&self) -> impl Iterator<Item = &Column> + '_ {
        self.cols_in
            .iter()
            .filter(move |c| !self.is_consumed(&c.col_id))
    }

    /// The identity used to deduplicate nodes when merging trees.
    pub fn merge_key(&self) -> (String, String, Vec<String>, Vec<String>) {
        let mut ins: Vec<String> = self.cols_in.iter().map(|c| c.col_id.clone()).collect();
        let mut outs: Vec<String> = self.cols_out.iter().map(|c| c.col_id.clone()).collect();
        ins.sort();
        outs.sort();
        (self.p_name.clone(), self.pattern_signature.clone(), ins, outs)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CompressionNode {
    #[serde(flatten)]
    pub base: NodeBase,
    /// Exception columns receiving the values this node could not encode.
    pub cols_ex: Vec<Column>,
}

impl CompressionNode {
    /// Derives the node that undoes `self`: it reads the outputs plus the
    /// metadata inputs and rebuilds the consumed inputs.
    pub fn to_decompression_node(&self) -> DecompressionNode {
        let base = &self.base;
        let mut cols_in = base.cols_out.clone();
        cols_in.extend(base.unconsumed_inputs().cloned());
        DecompressionNode {
            base: NodeBase {
                p_id: base.p_id.clone(),
                p_name: base.p_name.clone(),
                cols_in,
                cols_in_consumed: base.cols_out.clone(),
                cols_out: base.cols_in_consumed.clone(),
                operator_info: operators::inverse_operator_info(&base.operator_info),
                details: base.details.clone(),
                pattern_signature: base.pattern_signature.clone(),
                parents: BTreeSet::new(),
                children: BTreeSet::new(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DecompressionNode {
    #[serde(flatten)]
    pub base: NodeBase,
}

/// A node of either kind. Serialized without a tag: compression nodes are
/// recognised by their `cols_ex` field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ExpressionNode {
    Compression(CompressionNode),
    Decompression(DecompressionNode),
}

impl ExpressionNode {
    pub fn base(&self) -> &NodeBase {
        match self {
            ExpressionNode::Compression(n) => &n.base,
            ExpressionNode::Decompression(n) => &n.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut NodeBase {
        match self {
            ExpressionNode::Compression(n) => &mut n.base,
            ExpressionNode::Decompression(n) => &mut n.base,
        }
    }

    /// Exception columns; always empty for decompression nodes.
    pub fn cols_ex(&self) -> &[Column] {
        match self {
            ExpressionNode::Compression(n) => &n.cols_ex,
            ExpressionNode::Decompression(_) => &[],
        }
    }

    pub fn is_compression(&self) -> bool {
        matches!(self, ExpressionNode::Compression(_))
    }

    /// A copy with the tree relations cleared, ready for `add_level` on another tree.
    pub fn detached(&self) -> ExpressionNode {
        let mut node = self.clone();
        let base = node.base_mut();
        base.parents.clear();
        base.children.clear();
        node
    }
}

impl From<CompressionNode> for ExpressionNode {
    fn from(node: CompressionNode) -> Self {
        ExpressionNode::Compression(node)
    }
}

impl From<DecompressionNode> for ExpressionNode {
    fn from(node: DecompressionNode) -> Self {
        ExpressionNode::Decompression(node)
    }
}
