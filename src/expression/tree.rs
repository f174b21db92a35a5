// In: src/expression/tree.rs

//! The expression tree: a DAG of applied patterns, built one level at a time.
//!
//! Nodes are owned by the tree and addressed by `"{level}_{index}"` ids. Every
//! column the tree has seen is tracked with the nodes producing it
//! (`output_of`) and reading it (`input_of`), which is all that is needed to
//! answer the structural questions asked by the pipelines:
//! - roots (`get_in_columns`) and leaves (`get_out_columns`),
//! - a replay order (`get_topological_order`),
//! - independent sub-DAGs (`get_connected_components`) and their recomposition (`merge`).

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::node::{ExpressionNode, NodeBase};
use crate::error::{ColshapeError, Result};
use crate::types::{is_exception_col_id, Column};

//==================================================================================
// 1. Data Model
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TreeType {
    Compression,
    Decompression,
}

/// Everything the tree knows about one column.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ColumnEntry {
    pub col_info: Column,
    pub output_of: BTreeSet<String>,
    pub input_of: BTreeSet<String>,
}

impl ColumnEntry {
    fn new(col_info: Column) -> Self {
        Self {
            col_info,
            output_of: BTreeSet::new(),
            input_of: BTreeSet::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExpressionTree {
    #[serde(rename = "type")]
    tree_type: TreeType,
    levels: Vec<Vec<String>>,
    nodes: BTreeMap<String, ExpressionNode>,
    columns: BTreeMap<String, ColumnEntry>,
    /// Root column ids, in positional order.
    in_columns: Vec<String>,
}

impl ExpressionTree {
    pub fn new(tree_type: TreeType, in_columns: &[Column]) -> Self {
        let mut tree = Self {
            tree_type,
            levels: Vec::new(),
            nodes: BTreeMap::new(),
            columns: BTreeMap::new(),
            in_columns: Vec::with_capacity(in_columns.len()),
        };
        for col in in_columns {
            if tree.columns.contains_key(&col.col_id) {
                continue;
            }
            tree.in_columns.push(col.col_id.clone());
            tree.columns
                .insert(col.col_id.clone(), ColumnEntry::new(col.clone()));
        }
        tree
    }

    //==============================================================================
    // 2. Level Append
    //==============================================================================

    /// Appends one level of nodes and wires them into the graph.
    ///
    /// Every input must already be known to the tree. Decompression trees may
    /// also read columns produced by another node of the same level. In a
    /// compression tree a non-exception column has a single producer.
    /// Returns the ids given to the new nodes; an empty batch adds no level.
    pub fn add_level(&mut self, nodes: Vec<ExpressionNode>) -> Result<Vec<String>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        self.validate_level(&nodes)?;

        let level_idx = self.levels.len();
        let mut staged = Vec::with_capacity(nodes.len());
        for (idx, mut node) in nodes.into_iter().enumerate() {
            let id = format!("{}_{}", level_idx, idx);
            {
                let base = node.base_mut();
                base.parents.clear();
                base.children.clear();
            }
            for col in node.base().cols_out.iter().chain(node.cols_ex()) {
                self.columns
                    .entry(col.col_id.clone())
                    .or_insert_with(|| ColumnEntry::new(col.clone()))
                    .output_of
                    .insert(id.clone());
            }
            staged.push((id, node));
        }

        for (id, node) in staged.iter_mut() {
            let mut parents = BTreeSet::new();
            for col in &node.base().cols_in {
                if let Some(entry) = self.columns.get_mut(&col.col_id) {
                    entry.input_of.insert(id.clone());
                    parents.extend(
                        entry
                            .output_of
                            .iter()
                            .filter(|p| p.as_str() != id.as_str())
                            .cloned(),
                    );
                }
            }
            node.base_mut().parents = parents;
        }

        let links: Vec<(String, String)> = staged
            .iter()
            .flat_map(|(id, node)| {
                node.base()
                    .parents
                    .iter()
                    .map(move |p| (p.clone(), id.clone()))
            })
            .collect();

        let mut level = Vec::with_capacity(staged.len());
        for (id, node) in staged {
            level.push(id.clone());
            self.nodes.insert(id, node);
        }
        for (parent, child) in links {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.base_mut().children.insert(child);
            }
        }
        self.levels.push(level.clone());
        Ok(level)
    }

    fn validate_level(&self, nodes: &[ExpressionNode]) -> Result<()> {
        let expect_compression = self.tree_type == TreeType::Compression;
        let same_level_outputs: HashSet<&str> = if expect_compression {
            HashSet::new()
        } else {
            nodes
                .iter()
                .flat_map(|n| n.base().cols_out.iter().map(|c| c.col_id.as_str()))
                .collect()
        };

        let mut produced: HashSet<&str> = HashSet::new();
        for node in nodes {
            let base = node.base();
            if node.is_compression() != expect_compression {
                return Err(ColshapeError::InvalidTree(format!(
                    "node {} does not match a {:?} tree",
                    base.p_id, self.tree_type
                )));
            }
            for col in &base.cols_in_consumed {
                if !base.cols_in.iter().any(|c| c.col_id == col.col_id) {
                    return Err(ColshapeError::InvalidTree(format!(
                        "node {} consumes {} which is not one of its inputs",
                        base.p_id, col.col_id
                    )));
                }
            }
            for col in &base.cols_in {
                if !self.columns.contains_key(&col.col_id)
                    && !same_level_outputs.contains(col.col_id.as_str())
                {
                    return Err(ColshapeError::SchemaMismatch(format!(
                        "node {} references unknown column {}",
                        base.p_id, col.col_id
                    )));
                }
            }
            if expect_compression {
                for col in &base.cols_out {
                    if is_exception_col_id(&col.col_id) {
                        continue;
                    }
                    if self.columns.contains_key(&col.col_id) || !produced.insert(col.col_id.as_str()) {
                        return Err(ColshapeError::InvalidTree(format!(
                            "column {} would have more than one producer",
                            col.col_id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    //==============================================================================
    // 3. Accessors
    //==============================================================================

    pub fn tree_type(&self) -> TreeType {
        self.tree_type
    }

    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    pub fn nodes(&self) -> &BTreeMap<String, ExpressionNode> {
        &self.nodes
    }

    pub fn node(&self, node_id: &str) -> Option<&ExpressionNode> {
        self.nodes.get(node_id)
    }

    pub fn columns(&self) -> &BTreeMap<String, ColumnEntry> {
        &self.columns
    }

    pub fn column(&self, col_id: &str) -> Option<&ColumnEntry> {
        self.columns.get(col_id)
    }

    /// Nodes of one level, in insertion order.
    pub fn level_nodes(&self, level: usize) -> Vec<(&str, &ExpressionNode)> {
        self.levels
            .get(level)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.nodes.get(id).map(|n| (id.as_str(), n)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn node_base(&self, node_id: &str) -> Option<&NodeBase> {
        self.nodes.get(node_id).map(|n| n.base())
    }

    /// `true` if some node replaces `col_id`.
    pub fn is_consumed(&self, col_id: &str) -> bool {
        self.columns.get(col_id).map_or(false, |entry| {
            entry.input_of.iter().any(|n| {
                self.node_base(n)
                    .map_or(false, |base| base.is_consumed(col_id))
            })
        })
    }

    /// `true` if `col_id` is an output of a node with the given `p_name`.
    pub fn is_output_of_pattern(&self, col_id: &str, p_name: &str) -> bool {
        self.producers_match(col_id, |base| base.p_name == p_name)
    }

    /// `true` if `col_id` is an output of a node with the given signature.
    pub fn is_output_of_signature(&self, col_id: &str, signature: &str) -> bool {
        self.producers_match(col_id, |base| base.pattern_signature == signature)
    }

    fn producers_match<F: Fn(&NodeBase) -> bool>(&self, col_id: &str, pred: F) -> bool {
        self.columns.get(col_id).map_or(false, |entry| {
            entry
                .output_of
                .iter()
                .any(|n| self.node_base(n).map_or(false, &pred))
        })
    }

    //==============================================================================
    // 4. Column Sets
    //==============================================================================

    /// Root columns, in positional order.
    pub fn get_in_columns(&self) -> Vec<Column> {
        self.in_columns
            .iter()
            .filter_map(|id| self.columns.get(id).map(|e| e.col_info.clone()))
            .collect()
    }

    /// Columns no node consumes: the physical output of a compression tree, or
    /// the reconstructed columns of a decompression tree (exception columns are
    /// excluded there). Ordered roots first, then node outputs in level order.
    pub fn get_out_columns(&self) -> Vec<Column> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for col_id in self.columns_in_creation_order() {
            if !seen.insert(col_id) {
                continue;
            }
            if self.tree_type == TreeType::Decompression && is_exception_col_id(col_id) {
                continue;
            }
            if !self.is_consumed(col_id) {
                if let Some(entry) = self.columns.get(col_id) {
                    out.push(entry.col_info.clone());
                }
            }
        }
        out
    }

    /// Columns neither produced nor read by any node.
    pub fn get_unused_columns(&self) -> Vec<Column> {
        self.in_columns
            .iter()
            .filter_map(|id| self.columns.get(id))
            .filter(|e| e.output_of.is_empty() && e.input_of.is_empty())
            .map(|e| e.col_info.clone())
            .collect()
    }

    fn columns_in_creation_order(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.in_columns.iter().map(|s| s.as_str()).collect();
        for level in &self.levels {
            for node_id in level {
                if let Some(node) = self.nodes.get(node_id) {
                    ids.extend(node.base().cols_out.iter().map(|c| c.col_id.as_str()));
                    ids.extend(node.cols_ex().iter().map(|c| c.col_id.as_str()));
                }
            }
        }
        ids
    }

    //==============================================================================
    // 5. Graph Algorithms
    //==============================================================================

    /// Reverse postorder over `children`: every node comes after all of its ancestors.
    pub fn get_topological_order(&self) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut postorder: Vec<String> = Vec::with_capacity(self.nodes.len());

        for start in self.levels.iter().flatten() {
            if !visited.insert(start.as_str()) {
                continue;
            }
            // (node, its children, next child to visit)
            let mut stack: Vec<(&str, Vec<&str>, usize)> =
                vec![(start.as_str(), self.children_of(start), 0)];
            while let Some((node_id, children, next)) = stack.last_mut() {
                if let Some(child) = children.get(*next).copied() {
                    *next += 1;
                    if visited.insert(child) {
                        let grandchildren = self.children_of(child);
                        stack.push((child, grandchildren, 0));
                    }
                } else {
                    postorder.push(node_id.to_string());
                    stack.pop();
                }
            }
        }
        postorder.reverse();
        postorder
    }

    fn children_of(&self, node_id: &str) -> Vec<&str> {
        self.node_base(node_id)
            .map(|b| b.children.iter().map(|c| c.as_str()).collect())
            .unwrap_or_default()
    }

    /// Partitions the node ids into groups connected through parent/child links
    /// or through a shared column. Groups and their members follow level order.
    pub fn connected_node_groups(&self) -> Vec<Vec<String>> {
        let order: Vec<&str> = self.levels.iter().flatten().map(|s| s.as_str()).collect();
        let rank: HashMap<&str, usize> = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut assigned: HashSet<&str> = HashSet::new();
        let mut groups = Vec::new();
        for &start in &order {
            if !assigned.insert(start) {
                continue;
            }
            let mut group = vec![start];
            let mut stack = vec![start];
            while let Some(node_id) = stack.pop() {
                for next in self.neighbours(node_id) {
                    if assigned.insert(next) {
                        group.push(next);
                        stack.push(next);
                    }
                }
            }
            group.sort_by_key(|id| rank.get(id).copied().unwrap_or(usize::MAX));
            groups.push(group.into_iter().map(|s| s.to_string()).collect());
        }
        groups
    }

    fn neighbours(&self, node_id: &str) -> Vec<&str> {
        let Some(node) = self.nodes.get(node_id) else {
            return Vec::new();
        };
        let base = node.base();
        let mut out: Vec<&str> = Vec::new();
        out.extend(base.parents.iter().map(|s| s.as_str()));
        out.extend(base.children.iter().map(|s| s.as_str()));
        for col in base.cols_in.iter() {
            if let Some(entry) = self.columns.get(&col.col_id) {
                out.extend(entry.input_of.iter().map(|s| s.as_str()));
            }
        }
        for col in base.cols_out.iter().chain(node.cols_ex()) {
            if let Some(entry) = self.columns.get(&col.col_id) {
                out.extend(entry.output_of.iter().map(|s| s.as_str()));
            }
        }
        out
    }

    /// Splits the tree into independent trees, one per connected group of
    /// nodes. Each keeps only the roots that feed it; nodes are renumbered.
    pub fn get_connected_components(&self) -> Result<Vec<ExpressionTree>> {
        let mut components = Vec::new();
        for group in self.connected_node_groups() {
            let members: HashSet<&str> = group.iter().map(|s| s.as_str()).collect();
            let fed: HashSet<&str> = group
                .iter()
                .filter_map(|id| self.node_base(id))
                .flat_map(|b| b.cols_in.iter().map(|c| c.col_id.as_str()))
                .collect();
            let roots: Vec<Column> = self
                .get_in_columns()
                .into_iter()
                .filter(|c| fed.contains(c.col_id.as_str()))
                .collect();

            let mut component = ExpressionTree::new(self.tree_type, &roots);
            for level in &self.levels {
                let nodes: Vec<ExpressionNode> = level
                    .iter()
                    .filter(|id| members.contains(id.as_str()))
                    .filter_map(|id| self.nodes.get(id).map(|n| n.detached()))
                    .collect();
                component.add_level(nodes)?;
            }
            components.push(component);
        }
        Ok(components)
    }

    //==============================================================================
    // 6. Merge
    //==============================================================================

    /// Combines two trees of the same type into a new one.
    ///
    /// Components of `b` with exactly the roots of a component of `a` are
    /// unioned with it level by level (duplicate nodes dropped, extra trailing
    /// levels kept). Components with disjoint roots are concatenated level by
    /// level. Partially overlapping roots are rejected.
    pub fn merge(a: &ExpressionTree, b: &ExpressionTree) -> Result<ExpressionTree> {
        if a.tree_type != b.tree_type {
            return Err(ColshapeError::InvalidTree(format!(
                "cannot merge a {:?} tree with a {:?} tree",
                a.tree_type, b.tree_type
            )));
        }

        struct Group {
            roots: BTreeSet<String>,
            levels: Vec<Vec<ExpressionNode>>,
        }

        fn to_group(tree: &ExpressionTree) -> Group {
            Group {
                roots: tree.in_columns.iter().cloned().collect(),
                levels: tree
                    .levels
                    .iter()
                    .map(|ids| {
                        ids.iter()
                            .filter_map(|id| tree.nodes.get(id).map(|n| n.detached()))
                            .collect()
                    })
                    .collect(),
            }
        }

        let mut groups: Vec<Group> = a.get_connected_components()?.iter().map(to_group).collect();

        for component in b.get_connected_components()? {
            let incoming = to_group(&component);
            if let Some(group) = groups.iter_mut().find(|g| g.roots == incoming.roots) {
                let mut known: HashSet<_> = group
                    .levels
                    .iter()
                    .flatten()
                    .map(|n| n.base().merge_key())
                    .collect();
                for (k, level) in incoming.levels.into_iter().enumerate() {
                    if group.levels.len() <= k {
                        group.levels.push(Vec::new());
                    }
                    for node in level {
                        if known.insert(node.base().merge_key()) {
                            group.levels[k].push(node);
                        }
                    }
                }
            } else if groups.iter().any(|g| !g.roots.is_disjoint(&incoming.roots)) {
                return Err(ColshapeError::InvalidTree(format!(
                    "component rooted at {:?} partially overlaps an existing component",
                    incoming.roots
                )));
            } else {
                groups.push(incoming);
            }
        }

        let mut roots = a.get_in_columns();
        for col in b.get_in_columns() {
            if !a.columns.contains_key(&col.col_id) {
                roots.push(col);
            }
        }
        let mut merged = ExpressionTree::new(a.tree_type, &roots);
        let depth = groups.iter().map(|g| g.levels.len()).max().unwrap_or(0);
        for k in 0..depth {
            let level: Vec<ExpressionNode> = groups
                .iter()
                .filter_map(|g| g.levels.get(k))
                .flat_map(|nodes| nodes.iter().cloned())
                .collect();
            merged.add_level(level)?;
        }
        Ok(merged)
    }

    //==============================================================================
    // 7. Decompression Tree
    //==============================================================================

    /// Builds the tree that undoes `self`: levels in reverse, every node
    /// replaced by its decompression counterpart. Its roots are this tree's
    /// output columns (exception columns included); its outputs are this tree's roots.
    pub fn to_decompression_tree(&self) -> Result<ExpressionTree> {
        if self.tree_type != TreeType::Compression {
            return Err(ColshapeError::InvalidTree(
                "only a compression tree can be inverted".into(),
            ));
        }
        let mut dec = ExpressionTree::new(TreeType::Decompression, &self.get_out_columns());
        for level in self.levels.iter().rev() {
            let nodes: Vec<ExpressionNode> = level
                .iter()
                .filter_map(|id| match self.nodes.get(id) {
                    Some(ExpressionNode::Compression(n)) => Some(n.to_decompression_node().into()),
                    _ => None,
                })
                .collect();
            dec.add_level(nodes)?;
        }
        Ok(dec)
    }

    //==============================================================================
    // 8. Serialization
    //==============================================================================

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn ids(cols: &[Column]) -> Vec<&str> {
        cols.iter().map(|c| c.col_id.as_str()).collect()
    }

    /// 0 -> a -> (a1, a2), 1 -> b, 2 unused
    fn sample_tree() -> ExpressionTree {
        let mut tree = ExpressionTree::new(TreeType::Compression, &roots(&["0", "1", "2"]));
        tree.add_level(vec![
            node("P", &["0"], &["0"], &["a"]),
            node("Q", &["1"], &["1"], &["b"]),
        ])
        .unwrap();
        tree.add_level(vec![node("R", &["a"], &["a"], &["a1", "a2"])])
            .unwrap();
        tree
    }

    #[test]
    fn test_add_level_wires_relations() {
        let tree = sample_tree();
        assert_eq!(tree.levels(), &[vec!["0_0", "0_1"], vec!["1_0"]]);
        let r = tree.node("1_0").unwrap().base();
        assert_eq!(r.parents.iter().collect::<Vec<_>>(), vec!["0_0"]);
        assert!(tree.node("0_0").unwrap().base().children.contains("1_0"));
        assert!(tree.column("0__ex").unwrap().output_of.contains("0_0"));
        assert!(tree.column("a").unwrap().input_of.contains("1_0"));
    }

    #[test]
    fn test_column_sets() {
        let tree = sample_tree();
        assert_eq!(ids(&tree.get_in_columns()), vec!["0", "1", "2"]);
        assert_eq!(
            ids(&tree.get_out_columns()),
            vec!["2", "0__ex", "b", "1__ex", "a1", "a2", "a__ex"]
        );
        assert_eq!(ids(&tree.get_unused_columns()), vec!["2"]);
    }

    #[test]
    fn test_add_level_rejects_bad_nodes() {
        let mut tree = sample_tree();
        let unknown = tree.add_level(vec![node("S", &["zz"], &["zz"], &["s"])]);
        assert!(matches!(unknown, Err(ColshapeError::SchemaMismatch(_))));

        let dup = tree.add_level(vec![node("S", &["b"], &["b"], &["a1"])]);
        assert!(matches!(dup, Err(ColshapeError::InvalidTree(_))));

        let mut dec = ExpressionTree::new(TreeType::Decompression, &roots(&["0"]));
        let wrong_kind = dec.add_level(vec![node("S", &["0"], &["0"], &["s"])]);
        assert!(matches!(wrong_kind, Err(ColshapeError::InvalidTree(_))));
        assert_eq!(tree.levels().len(), 2);
    }

    #[test]
    fn test_topological_order_respects_children() {
        let tree = sample_tree();
        let order = tree.get_topological_order();
        assert_eq!(order.len(), 3);
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("0_0") < pos("1_0"));
    }

    #[test]
    fn test_connected_components() {
        let tree = sample_tree();
        let groups = tree.connected_node_groups();
        assert_eq!(groups, vec![vec!["0_0", "1_0"], vec!["0_1"]]);

        let comps = tree.get_connected_components().unwrap();
        assert_eq!(comps.len(), 2);
        assert_eq!(ids(&comps[0].get_in_columns()), vec!["0"]);
        assert_eq!(comps[0].levels().len(), 2);
        assert_eq!(ids(&comps[1].get_in_columns()), vec!["1"]);
    }

    #[test]
    fn test_shared_first_level_input_joins_components() {
        let mut tree = ExpressionTree::new(TreeType::Compression, &roots(&["0"]));
        tree.add_level(vec![
            node("P", &["0"], &["0"], &["p"]),
            node("Q", &["0"], &["0"], &["q"]),
        ])
        .unwrap();
        assert_eq!(tree.connected_node_groups().len(), 1);
    }

    #[test]
    fn test_merge_disjoint_and_identical_roots() {
        let mut a = ExpressionTree::new(TreeType::Compression, &roots(&["0"]));
        a.add_level(vec![node("P", &["0"], &["0"], &["p"])]).unwrap();
        let mut b = ExpressionTree::new(TreeType::Compression, &roots(&["1"]));
        b.add_level(vec![node("Q", &["1"], &["1"], &["q"])]).unwrap();
        b.add_level(vec![node("R", &["q"], &["q"], &["r"])]).unwrap();

        let ab = ExpressionTree::merge(&a, &b).unwrap();
        assert_eq!(ids(&ab.get_in_columns()), vec!["0", "1"]);
        assert_eq!(ab.levels(), &[vec!["0_0", "0_1"], vec!["1_0"]]);

        // Same roots: the duplicate is dropped, the longer history kept.
        let mut a2 = ExpressionTree::new(TreeType::Compression, &roots(&["1"]));
        a2.add_level(vec![node("Q", &["1"], &["1"], &["q"])]).unwrap();
        let merged = ExpressionTree::merge(&a2, &b).unwrap();
        assert_eq!(merged.nodes().len(), 2);
        assert_eq!(merged.levels().len(), 2);
    }

    #[test]
    fn test_merge_rejects_partial_overlap() {
        let mut a = ExpressionTree::new(TreeType::Compression, &roots(&["0", "1"]));
        a.add_level(vec![node("C", &["0", "1"], &["1"], &[])]).unwrap();
        let mut b = ExpressionTree::new(TreeType::Compression, &roots(&["1"]));
        b.add_level(vec![node("P", &["1"], &["1"], &["p"])]).unwrap();
        assert!(matches!(
            ExpressionTree::merge(&a, &b),
            Err(ColshapeError::InvalidTree(_))
        ));
    }

    #[test]
    fn test_decompression_tree_mirrors_compression() {
        let tree = sample_tree();
        let dec = tree.to_decompression_tree().unwrap();
        assert_eq!(dec.tree_type(), TreeType::Decompression);
        assert_eq!(dec.levels().len(), 2);
        // The first decompression level undoes the last compression level.
        let (_, first) = dec.level_nodes(0)[0];
        assert_eq!(first.base().p_name, "R");
        assert_eq!(ids(&dec.get_out_columns()), vec!["2", "0", "1"]);

        let order = dec.get_topological_order();
        let pos = |p: &str| {
            order
                .iter()
                .position(|id| dec.node(id).unwrap().base().p_name == p)
                .unwrap()
        };
        assert!(pos("R") < pos("P"));
    }

    #[test]
    fn test_serde_round_trip() {
        let tree = sample_tree();
        let json = tree.to_json_string().unwrap();
        assert!(json.contains("\"type\": \"compression\""));
        let back = ExpressionTree::from_json_str(&json).unwrap();
        assert_eq!(back, tree);
    }
}
