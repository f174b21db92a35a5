// In: src/pipeline/decompress.rs

//! The decompression-apply pipeline: compressed rows plus null masks back to raw rows.
//!
//! Per row, every column value lives in a slot. Slots are seeded in this order,
//! later steps never overwriting earlier ones except where noted:
//! 1. the compressed columns, by position;
//! 2. non-null exception values, which overwrite the column they stand for;
//! 3. null-mask bits of the original columns.
//!
//! Inverse nodes then run in topological order. A node with an empty input
//! slot, or whose operator reports `PatternNotApplicable`, is skipped. Outputs
//! only fill empty slots.

use bitvec::prelude::*;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

use super::compress::CompressionPipeline;
use super::validation::RowValidator;
use crate::config::ColshapeConfig;
use crate::error::{ColshapeError, Result};
use crate::expression::{ExpressionTree, TreeType};
use crate::io::{parse_null_mask, RowReader, RowWriter};
use crate::operators::{make_inverse_operator, Transform};
use crate::types::{original_col_id, Column};

//==================================================================================
// 1. Prepared Context
//==================================================================================

#[derive(Debug, Clone)]
struct InverseNode {
    node_id: String,
    in_slots: Vec<usize>,
    out_slots: Vec<usize>,
    transform: Transform,
}

/// Everything needed to rebuild rows, resolved once per tree.
#[derive(Debug, Clone)]
pub struct DecompressionContext {
    compressed_columns: Vec<Column>,
    original_columns: Vec<Column>,
    slot_count: usize,
    compressed_slots: Vec<usize>,
    /// (compressed position of an exception column, slot of its original column)
    exception_pairs: Vec<(usize, usize)>,
    original_slots: Vec<usize>,
    schedule: Vec<InverseNode>,
    null_token: String,
}

fn slot_of(slots: &mut HashMap<String, usize>, col_id: &str) -> usize {
    let next = slots.len();
    *slots.entry(col_id.to_string()).or_insert(next)
}

impl DecompressionContext {
    /// Prepares a decompression tree for rows laid out as `compressed_columns`,
    /// rebuilding rows laid out as `original_columns`.
    pub fn new(
        dec_tree: &ExpressionTree,
        compressed_columns: &[Column],
        original_columns: &[Column],
        null_token: &str,
    ) -> Result<Self> {
        if dec_tree.tree_type() != TreeType::Decompression {
            return Err(ColshapeError::InvalidTree(
                "decompression needs a decompression tree".into(),
            ));
        }

        let mut slots: HashMap<String, usize> = HashMap::new();
        for col_id in dec_tree.columns().keys() {
            slot_of(&mut slots, col_id);
        }
        let compressed_slots: Vec<usize> = compressed_columns
            .iter()
            .map(|c| slot_of(&mut slots, &c.col_id))
            .collect();
        let original_slots: Vec<usize> = original_columns
            .iter()
            .map(|c| slot_of(&mut slots, &c.col_id))
            .collect();
        let mut exception_pairs = Vec::new();
        for (pos, col) in compressed_columns.iter().enumerate() {
            if let Some(original) = original_col_id(&col.col_id) {
                exception_pairs.push((pos, slot_of(&mut slots, original)));
            }
        }

        let mut schedule = Vec::with_capacity(dec_tree.nodes().len());
        for node_id in dec_tree.get_topological_order() {
            let Some(node) = dec_tree.node(&node_id) else {
                continue;
            };
            let base = node.base();
            let transform =
                make_inverse_operator(&base.cols_in, &base.cols_out, &base.operator_info, null_token)?;
            schedule.push(InverseNode {
                in_slots: base.cols_in.iter().map(|c| slot_of(&mut slots, &c.col_id)).collect(),
                out_slots: base.cols_out.iter().map(|c| slot_of(&mut slots, &c.col_id)).collect(),
                node_id,
                transform,
            });
        }

        log::debug!(
            "decompression schedule of {} nodes over {} columns",
            schedule.len(),
            slots.len()
        );

        Ok(Self {
            compressed_columns: compressed_columns.to_vec(),
            original_columns: original_columns.to_vec(),
            slot_count: slots.len(),
            compressed_slots,
            exception_pairs,
            original_slots,
            schedule,
            null_token: null_token.to_string(),
        })
    }

    /// Derives the decompression tree and the compressed layout from a
    /// compression tree.
    pub fn from_compression_tree(tree: &ExpressionTree, null_token: &str) -> Result<Self> {
        let pipeline = CompressionPipeline::new(tree, null_token)?;
        let dec_tree = tree.to_decompression_tree()?;
        Self::new(
            &dec_tree,
            pipeline.compressed_columns(),
            pipeline.in_columns(),
            null_token,
        )
    }

    pub fn compressed_columns(&self) -> &[Column] {
        &self.compressed_columns
    }

    pub fn original_columns(&self) -> &[Column] {
        &self.original_columns
    }

    /// Ids of the inverse nodes, in replay order.
    pub fn schedule(&self) -> impl Iterator<Item = &str> + '_ {
        self.schedule.iter().map(|n| n.node_id.as_str())
    }

    //==============================================================================
    // 2. Row Replay
    //==============================================================================

    /// Rebuilds one original row from a compressed row and its null mask.
    pub fn decompress_row<S: AsRef<str>>(&self, row: &[S], mask: &BitSlice) -> Result<Vec<String>> {
        if row.len() != self.compressed_columns.len() {
            return Err(ColshapeError::SchemaMismatch(format!(
                "expected {} compressed fields, row has {}",
                self.compressed_columns.len(),
                row.len()
            )));
        }
        if mask.len() != self.original_columns.len() {
            return Err(ColshapeError::SchemaMismatch(format!(
                "expected {} null-mask bits, got {}",
                self.original_columns.len(),
                mask.len()
            )));
        }

        let mut values: Vec<Option<String>> = vec![None; self.slot_count];
        for (&slot, value) in self.compressed_slots.iter().zip(row) {
            values[slot] = Some(value.as_ref().to_string());
        }
        for &(pos, slot) in &self.exception_pairs {
            let value = row[pos].as_ref();
            if value != self.null_token {
                values[slot] = Some(value.to_string());
            }
        }
        for (&slot, is_null) in self.original_slots.iter().zip(mask.iter().by_vals()) {
            if is_null {
                values[slot].get_or_insert_with(|| self.null_token.clone());
            }
        }

        for node in &self.schedule {
            let inputs: Option<Vec<&str>> = node
                .in_slots
                .iter()
                .map(|&s| values[s].as_deref())
                .collect();
            let Some(inputs) = inputs else {
                continue;
            };
            let Ok(decoded) = node.transform.apply(&inputs) else {
                continue;
            };
            for (&slot, value) in node.out_slots.iter().zip(decoded) {
                values[slot].get_or_insert(value);
            }
        }

        self.original_slots
            .iter()
            .zip(&self.original_columns)
            .map(|(&slot, col)| {
                values[slot].clone().ok_or_else(|| {
                    ColshapeError::InternalInconsistency(format!(
                        "column {} was not rebuilt",
                        col.col_id
                    ))
                })
            })
            .collect()
    }

    //==============================================================================
    // 3. Stream Driver
    //==============================================================================

    /// Decompresses delimited rows from `data` with their masks from `mask`.
    pub fn decompress_stream<D: BufRead, M: BufRead, W: Write>(
        &self,
        data: D,
        mask: M,
        out: W,
        config: &ColshapeConfig,
    ) -> Result<DecompressionStats> {
        self.run::<D, M, W, std::io::Empty>(data, mask, out, None, config)
    }

    /// Like `decompress_stream`, also comparing every rebuilt row with the
    /// matching row of `ground_truth`.
    pub fn decompress_and_validate<D: BufRead, M: BufRead, W: Write, G: BufRead>(
        &self,
        data: D,
        mask: M,
        out: W,
        ground_truth: G,
        config: &ColshapeConfig,
    ) -> Result<DecompressionStats> {
        self.run(data, mask, out, Some(ground_truth), config)
    }

    fn run<D: BufRead, M: BufRead, W: Write, G: BufRead>(
        &self,
        data: D,
        mask: M,
        out: W,
        ground_truth: Option<G>,
        config: &ColshapeConfig,
    ) -> Result<DecompressionStats> {
        let delimiter = config.format.delimiter.as_str();
        let mut data = RowReader::new(data, delimiter);
        let mut masks = RowReader::new(mask, delimiter);
        let mut truth = ground_truth.map(|g| RowReader::new(g, delimiter));
        let mut writer = RowWriter::new(out, delimiter);
        let mut validator = RowValidator::new(config.validation.stop_on_first_mismatch);
        let mut stats = DecompressionStats::default();

        while let Some(row) = data.next_row()? {
            let mask_line = masks.next_line()?.ok_or_else(|| {
                ColshapeError::SchemaMismatch(format!(
                    "null mask ends before data row {}",
                    data.line_no()
                ))
            })?;
            let mask = parse_null_mask(mask_line, delimiter)?;
            let rebuilt = self.decompress_row(&row, &mask)?;
            stats.total_rows += 1;

            if let Some(truth) = truth.as_mut() {
                let expected = truth.next_row()?.ok_or_else(|| {
                    ColshapeError::SchemaMismatch(format!(
                        "ground truth ends before row {}",
                        stats.total_rows
                    ))
                })?;
                validator.check(stats.total_rows, &self.original_columns, &expected, &rebuilt)?;
            }
            writer.write_row(&rebuilt)?;
        }
        writer.flush()?;

        if masks.next_line()?.is_some() {
            return Err(ColshapeError::SchemaMismatch(format!(
                "null mask has more rows than the {} data rows",
                stats.total_rows
            )));
        }
        if let Some(truth) = truth.as_mut() {
            let mut expected_rows = stats.total_rows;
            while truth.next_line()?.is_some() {
                expected_rows += 1;
            }
            validator.check_row_count(expected_rows, stats.total_rows)?;
        }

        stats.validated_rows = validator.checked_rows();
        stats.mismatched_rows = validator.mismatched_rows();
        log::info!(
            "decompressed {} rows ({} validated, {} mismatches)",
            stats.total_rows,
            stats.validated_rows,
            stats.mismatched_rows
        );
        Ok(stats)
    }
}

/// Summary of one decompression run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DecompressionStats {
    pub total_rows: u64,
    pub validated_rows: u64,
    pub mismatched_rows: u64,
}
