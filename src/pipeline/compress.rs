// In: src/pipeline/compress.rs

//! The compression-apply pipeline: raw rows in, transformed rows out.
//!
//! Each tree level is driven by one `ExpressionManager`, whose output columns
//! are the input columns of the next one. Row resolution inside a level:
//! - nodes are tried in level order; a node is skipped when one of its inputs
//!   was already claimed by an earlier winner in this row;
//! - the first node whose forward operator succeeds wins and claims its
//!   consumed inputs;
//! - every unclaimed non-null input is then passed through if it is an output
//!   of the level, or written to its exception column otherwise.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

use crate::config::ColshapeConfig;
use crate::error::{ColshapeError, Result};
use crate::expression::ExpressionTree;
use crate::io::{format_null_mask, null_mask, RowReader, RowWriter};
use crate::operators::{make_operator, Transform};
use crate::types::{exception_col_id, Column};

//==================================================================================
// 1. Per-Level Manager
//==================================================================================

/// One node of a level, with its columns resolved to row positions.
#[derive(Debug, Clone)]
struct PreparedNode {
    node_id: String,
    in_pos: Vec<usize>,
    consumed_pos: Vec<usize>,
    out_pos: Vec<usize>,
    transform: Transform,
}

/// Applies one level of a compression tree to rows laid out as `in_columns`.
#[derive(Debug, Clone)]
pub struct ExpressionManager {
    level: usize,
    in_columns: Vec<Column>,
    out_columns: Vec<Column>,
    out_positions: HashMap<String, usize>,
    nodes: Vec<PreparedNode>,
    null_token: String,
}

impl ExpressionManager {
    /// Prepares level `level` of `tree` for rows laid out as `in_columns`.
    ///
    /// Output columns are ordered: inputs no node reads, then for each node
    /// its outputs, its exception columns and its pass-through inputs.
    pub fn new(
        tree: &ExpressionTree,
        level: usize,
        in_columns: &[Column],
        null_token: &str,
    ) -> Result<Self> {
        let in_positions: HashMap<&str, usize> = in_columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.col_id.as_str(), i))
            .collect();
        let level_nodes = tree.level_nodes(level);

        let mut read: HashSet<&str> = HashSet::new();
        let mut consumed: HashSet<&str> = HashSet::new();
        for (_, node) in &level_nodes {
            let base = node.base();
            for col in &base.cols_in {
                if !in_positions.contains_key(col.col_id.as_str()) {
                    return Err(ColshapeError::SchemaMismatch(format!(
                        "level {} node {} reads column {} which is not an input of the level",
                        level, base.p_id, col.col_id
                    )));
                }
                read.insert(col.col_id.as_str());
            }
            for col in &base.cols_in_consumed {
                consumed.insert(col.col_id.as_str());
            }
        }

        let mut out_columns: Vec<Column> = Vec::new();
        let mut out_positions: HashMap<String, usize> = HashMap::new();
        let mut push_out = |col: &Column, out_columns: &mut Vec<Column>| {
            if !out_positions.contains_key(&col.col_id) {
                out_positions.insert(col.col_id.clone(), out_columns.len());
                out_columns.push(col.clone());
            }
        };

        for col in in_columns {
            if !read.contains(col.col_id.as_str()) {
                push_out(col, &mut out_columns);
            }
        }
        for (_, node) in &level_nodes {
            let base = node.base();
            for col in base.cols_out.iter().chain(node.cols_ex()) {
                push_out(col, &mut out_columns);
            }
            for col in base.unconsumed_inputs() {
                if !consumed.contains(col.col_id.as_str()) {
                    push_out(col, &mut out_columns);
                }
            }
        }

        let positions_of = |cols: &[Column], index: &dyn Fn(&str) -> Option<usize>| {
            cols.iter()
                .map(|c| {
                    index(c.col_id.as_str()).ok_or_else(|| {
                        ColshapeError::InternalInconsistency(format!(
                            "column {} has no position in level {}",
                            c.col_id, level
                        ))
                    })
                })
                .collect::<Result<Vec<usize>>>()
        };
        let in_index = |id: &str| in_positions.get(id).copied();
        let out_index = |id: &str| out_positions.get(id).copied();

        let mut nodes = Vec::with_capacity(level_nodes.len());
        for (node_id, node) in &level_nodes {
            let base = node.base();
            let transform =
                make_operator(&base.cols_in, &base.cols_out, &base.operator_info, null_token)?;
            nodes.push(PreparedNode {
                node_id: node_id.to_string(),
                in_pos: positions_of(&base.cols_in, &in_index)?,
                consumed_pos: positions_of(&base.cols_in_consumed, &in_index)?,
                out_pos: positions_of(&base.cols_out, &out_index)?,
                transform,
            });
        }

        log::debug!(
            "level {}: {} nodes, {} -> {} columns",
            level,
            nodes.len(),
            in_columns.len(),
            out_columns.len()
        );

        Ok(Self {
            level,
            in_columns: in_columns.to_vec(),
            out_columns,
            out_positions,
            nodes,
            null_token: null_token.to_string(),
        })
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn in_columns(&self) -> &[Column] {
        &self.in_columns
    }

    pub fn out_columns(&self) -> &[Column] {
        &self.out_columns
    }

    /// Column names of the transformed rows, joined by `delimiter`.
    pub fn out_header(&self, delimiter: &str) -> String {
        self.out_columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(delimiter)
    }

    /// A `CREATE TABLE` statement for the transformed rows.
    pub fn out_schema_sql(&self, table_name: &str) -> String {
        let cols: Vec<String> = self
            .out_columns
            .iter()
            .map(|c| format!("  \"{}\" {}", c.name, c.datatype))
            .collect();
        format!("CREATE TABLE \"{}\"(\n{}\n);\n", table_name, cols.join(",\n"))
    }

    /// Transforms one row laid out as `in_columns`.
    pub fn apply_row<S: AsRef<str>>(&self, row: &[S]) -> Result<Vec<String>> {
        if row.len() != self.in_columns.len() {
            return Err(ColshapeError::SchemaMismatch(format!(
                "level {} expects {} fields, row has {}",
                self.level,
                self.in_columns.len(),
                row.len()
            )));
        }
        let null = self.null_token.as_str();
        let mut out = vec![self.null_token.clone(); self.out_columns.len()];
        let mut claimed = vec![false; row.len()];

        for node in &self.nodes {
            if node.in_pos.iter().any(|&p| claimed[p]) {
                continue;
            }
            let values: Vec<&str> = node.in_pos.iter().map(|&p| row[p].as_ref()).collect();
            let encoded = match node.transform.apply(&values) {
                // A null output would read back as a deliberate null.
                Ok(encoded) if encoded.iter().all(|v| v != null) => encoded,
                _ => continue,
            };
            for (&pos, value) in node.out_pos.iter().zip(encoded) {
                out[pos] = value;
            }
            for &p in &node.consumed_pos {
                claimed[p] = true;
            }
        }

        for (i, value) in row.iter().enumerate() {
            let value = value.as_ref();
            if claimed[i] || value == null {
                continue;
            }
            let col_id = &self.in_columns[i].col_id;
            let target = self
                .out_positions
                .get(col_id)
                .or_else(|| self.out_positions.get(&exception_col_id(col_id)));
            match target {
                Some(&pos) => out[pos] = value.to_string(),
                None => {
                    return Err(ColshapeError::InternalInconsistency(format!(
                        "column {} was not encoded and has no exception column at level {}",
                        col_id, self.level
                    )))
                }
            }
        }
        Ok(out)
    }

    /// Ids of the nodes of this level, in resolution order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.iter().map(|n| n.node_id.as_str())
    }
}

//==================================================================================
// 2. Whole-Tree Pipeline
//==================================================================================

/// Null statistics of one compressed column.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ColumnNullStats {
    pub col_id: String,
    pub null_count: u64,
    pub null_ratio: f64,
}

/// Summary of one compression run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CompressionStats {
    pub total_rows: u64,
    pub valid_rows: u64,
    /// 1-based input line numbers dropped by `skip_invalid_rows`.
    pub skipped_lines: Vec<u64>,
    pub out_columns: Vec<ColumnNullStats>,
}

/// Chains the level managers of a compression tree.
#[derive(Debug, Clone)]
pub struct CompressionPipeline {
    in_columns: Vec<Column>,
    managers: Vec<ExpressionManager>,
    null_token: String,
}

impl CompressionPipeline {
    pub fn new(tree: &ExpressionTree, null_token: &str) -> Result<Self> {
        let in_columns = tree.get_in_columns();
        let mut managers: Vec<ExpressionManager> = Vec::with_capacity(tree.levels().len());
        let mut level_columns = in_columns.clone();
        for level in 0..tree.levels().len() {
            let manager = ExpressionManager::new(tree, level, &level_columns, null_token)?;
            level_columns = manager.out_columns().to_vec();
            managers.push(manager);
        }
        Ok(Self {
            in_columns,
            managers,
            null_token: null_token.to_string(),
        })
    }

    pub fn in_columns(&self) -> &[Column] {
        &self.in_columns
    }

    pub fn managers(&self) -> &[ExpressionManager] {
        &self.managers
    }

    /// Layout of the rows produced by `compress_row`.
    pub fn compressed_columns(&self) -> &[Column] {
        self.managers
            .last()
            .map_or(self.in_columns.as_slice(), |m| m.out_columns())
    }

    /// Runs every level over one raw row.
    pub fn compress_row<S: AsRef<str>>(&self, row: &[S]) -> Result<Vec<String>> {
        let mut current: Vec<String> = row.iter().map(|v| v.as_ref().to_string()).collect();
        if current.len() != self.in_columns.len() {
            return Err(ColshapeError::SchemaMismatch(format!(
                "expected {} fields, row has {}",
                self.in_columns.len(),
                current.len()
            )));
        }
        for manager in &self.managers {
            current = manager.apply_row(&current)?;
        }
        Ok(current)
    }

    /// Compresses delimited rows from `input`, writing transformed rows to
    /// `data_out` and one null-mask row (over the raw columns) to `mask_out`.
    ///
    /// Rows skipped under `skip_invalid_rows` are absent from both outputs, so
    /// the output no longer lines up with `input` row for row; their line
    /// numbers are listed in `CompressionStats::skipped_lines`.
    pub fn compress_stream<R: BufRead, W: Write, M: Write>(
        &self,
        input: R,
        data_out: W,
        mask_out: M,
        config: &ColshapeConfig,
    ) -> Result<CompressionStats> {
        let delimiter = config.format.delimiter.as_str();
        let mut reader = RowReader::new(input, delimiter);
        let mut data = RowWriter::new(data_out, delimiter);
        let mut mask = RowWriter::new(mask_out, delimiter);

        let out_len = self.compressed_columns().len();
        let mut null_counts = vec![0u64; out_len];
        let mut stats = CompressionStats::default();

        while let Some(row) = reader.next_row()? {
            stats.total_rows += 1;
            if row.len() != self.in_columns.len() {
                if config.skip_invalid_rows {
                    log::warn!(
                        "skipping line {}: {} fields, expected {}",
                        reader.line_no(),
                        row.len(),
                        self.in_columns.len()
                    );
                    stats.skipped_lines.push(reader.line_no());
                    continue;
                }
                return Err(ColshapeError::SchemaMismatch(format!(
                    "line {} has {} fields, expected {}",
                    reader.line_no(),
                    row.len(),
                    self.in_columns.len()
                )));
            }
            let compressed = self.compress_row(&row)?;
            for (count, value) in null_counts.iter_mut().zip(&compressed) {
                if *value == self.null_token {
                    *count += 1;
                }
            }
            data.write_row(&compressed)?;
            mask.write_line(&format_null_mask(
                &null_mask(&row, &self.null_token),
                delimiter,
            ))?;
            stats.valid_rows += 1;
        }
        data.flush()?;
        mask.flush()?;

        stats.out_columns = self
            .compressed_columns()
            .iter()
            .zip(null_counts)
            .map(|(col, null_count)| ColumnNullStats {
                col_id: col.col_id.clone(),
                null_count,
                null_ratio: if stats.valid_rows == 0 {
                    0.0
                } else {
                    null_count as f64 / stats.valid_rows as f64
                },
            })
            .collect();

        log::info!(
            "compressed {} of {} rows into {} columns",
            stats.valid_rows,
            stats.total_rows,
            out_len
        );
        log_metric!(
            "event" = "compress_stream",
            "total_rows" = &stats.total_rows,
            "valid_rows" = &stats.valid_rows
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{CompressionNode, ExpressionNode, NodeBase, TreeType};
    use crate::operators::OperatorInfo;
    use crate::types::DataType;
    use std::collections::{BTreeMap, BTreeSet};

    fn col(id: &str) -> Column {
        Column::new(id, format!("c{}", id), DataType::varchar(8))
    }

    fn comp_node(
        p_id: &str,
        ins: Vec<Column>,
        consumed: Vec<Column>,
        outs: Vec<Column>,
        info: OperatorInfo,
    ) -> ExpressionNode {
        let cols_ex = consumed.iter().map(|c| c.exception_column()).collect();
        CompressionNode {
            base: NodeBase {
                p_id: p_id.into(),
                p_name: p_id.into(),
                cols_in: ins,
                cols_in_consumed: consumed,
                cols_out: outs,
                operator_info: info,
                details: BTreeMap::new(),
                pattern_signature: p_id.into(),
                parents: BTreeSet::new(),
                children: BTreeSet::new(),
            },
            cols_ex,
        }
        .into()
    }

    /// Column "0" dictionary-coded, column "1" left alone.
    fn dict_tree() -> ExpressionTree {
        let mut tree = ExpressionTree::new(TreeType::Compression, &[col("0"), col("1")]);
        let out = col("0").derive_output(1, 0, 0, DataType::simple("tinyint"));
        tree.add_level(vec![comp_node(
            "DictPattern",
            vec![col("0")],
            vec![col("0")],
            vec![out],
            OperatorInfo::Dictionary {
                keys: vec!["a".into(), "b".into()],
            },
        )])
        .unwrap();
        tree
    }

    #[test]
    fn test_level_layout_and_routing() {
        let tree = dict_tree();
        let manager = ExpressionManager::new(&tree, 0, &[col("0"), col("1")], "null").unwrap();
        let ids: Vec<&str> = manager.out_columns().iter().map(|c| c.col_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "0__1_0_0", "0__ex"]);
        assert_eq!(manager.out_header("|"), "c1|c0__1_0_0|c0__ex");
        assert_eq!(manager.level(), 0);
        assert_eq!(manager.node_ids().collect::<Vec<_>>(), vec!["0_0"]);

        assert_eq!(manager.apply_row(&["b", "x"]).unwrap(), vec!["x", "1", "null"]);
        assert_eq!(manager.apply_row(&["zz", "x"]).unwrap(), vec!["x", "null", "zz"]);
        assert_eq!(manager.apply_row(&["null", "null"]).unwrap(), vec!["null", "null", "null"]);
        assert!(matches!(
            manager.apply_row(&["a"]),
            Err(ColshapeError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_first_applicable_node_wins() {
        let mut tree = ExpressionTree::new(TreeType::Compression, &[col("0")]);
        let c = col("0");
        tree.add_level(vec![
            comp_node(
                "ConstantPatternDetector",
                vec![c.clone()],
                vec![c.clone()],
                vec![],
                OperatorInfo::Constant { value: "X".into() },
            ),
            comp_node(
                "DictPattern",
                vec![c.clone()],
                vec![c.clone()],
                vec![c.derive_output(1, 0, 0, DataType::simple("tinyint"))],
                OperatorInfo::Dictionary {
                    keys: vec!["X".into(), "Y".into()],
                },
            ),
        ])
        .unwrap();
        let manager = ExpressionManager::new(&tree, 0, &[c], "null").unwrap();
        // Layout: exception column shared by both nodes, then the dictionary code.
        let ids: Vec<&str> = manager.out_columns().iter().map(|c| c.col_id.as_str()).collect();
        assert_eq!(ids, vec!["0__ex", "0__1_0_0"]);
        assert_eq!(manager.apply_row(&["X"]).unwrap(), vec!["null", "null"]);
        assert_eq!(manager.apply_row(&["Y"]).unwrap(), vec!["null", "1"]);
        assert_eq!(manager.apply_row(&["Z"]).unwrap(), vec!["Z", "null"]);
    }

    #[test]
    fn test_unknown_input_is_a_schema_mismatch() {
        let tree = dict_tree();
        assert!(matches!(
            ExpressionManager::new(&tree, 0, &[col("1")], "null"),
            Err(ColshapeError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_schema_dump() {
        let tree = dict_tree();
        let pipeline = CompressionPipeline::new(&tree, "null").unwrap();
        let sql = pipeline.managers()[0].out_schema_sql("t");
        assert!(sql.starts_with("CREATE TABLE \"t\"("));
        assert!(sql.contains("\"c0__1_0_0\" tinyint"));
    }

    #[test]
    fn test_stream_writes_data_mask_and_stats() {
        let tree = dict_tree();
        let pipeline = CompressionPipeline::new(&tree, "null").unwrap();
        let input = "a|x\nb|null\nq|y\n";
        let mut data = Vec::<u8>::new();
        let mut mask = Vec::<u8>::new();
        let stats = pipeline
            .compress_stream(input.as_bytes(), &mut data, &mut mask, &ColshapeConfig::default())
            .unwrap();
        assert_eq!(String::from_utf8(data).unwrap(), "x|0|null\nnull|1|null\ny|null|q\n");
        assert_eq!(String::from_utf8(mask).unwrap(), "0|0\n0|1\n0|0\n");
        assert_eq!(stats.total_rows, 3);
        assert_eq!(stats.valid_rows, 3);
        assert!(stats.skipped_lines.is_empty());
        assert_eq!(stats.out_columns[2].null_count, 2);
    }

    #[test]
    fn test_invalid_rows_abort_or_skip() {
        let tree = dict_tree();
        let pipeline = CompressionPipeline::new(&tree, "null").unwrap();
        let input = "a|x\nbad\nb|y\n";

        let strict = pipeline.compress_stream(
            input.as_bytes(),
            Vec::<u8>::new(),
            Vec::<u8>::new(),
            &ColshapeConfig::default(),
        );
        assert!(matches!(strict, Err(ColshapeError::SchemaMismatch(_))));

        let lenient = ColshapeConfig {
            skip_invalid_rows: true,
            ..ColshapeConfig::default()
        };
        let stats = pipeline
            .compress_stream(input.as_bytes(), Vec::<u8>::new(), Vec::<u8>::new(), &lenient)
            .unwrap();
        assert_eq!((stats.total_rows, stats.valid_rows), (3, 2));
        assert_eq!(stats.skipped_lines, vec![2]);
    }
}
