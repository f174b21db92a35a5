// In: src/patterns/mod.rs

//! Pattern detectors: column-local algorithms that discover operator parameters
//! from sample rows.
//!
//! One detection round works on one level of the tree:
//! 1. `init_pattern_detectors` builds the enabled detectors, each selecting the
//!    columns it can work on (`select_column`, which consults the tree).
//! 2. Every sample row is fed to every detector (`observe`).
//! 3. Each detector reports per-column candidates (`evaluate`).
//! 4. The selector keeps a conflict-free subset, which the detectors turn into
//!    compression nodes (`to_compression_node`) for the next level.

pub mod char_set_split;
pub mod column_correlation;
pub mod constant;
pub mod dictionary;
pub mod number_as_string;
pub mod selector;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::ColshapeConfig;
use crate::expression::{CompressionNode, ExpressionTree, NodeBase};
use crate::operators::{self, OperatorInfo};
use crate::types::Column;

pub use self::char_set_split::CharSetSplitDetector;
pub use self::column_correlation::ColumnCorrelationDetector;
pub use self::constant::ConstantDetector;
pub use self::dictionary::DictionaryDetector;
pub use self::number_as_string::NumberAsStringDetector;
pub use self::selector::{CoverageSelector, PatternSelector};

//==================================================================================
// 1. Detector Kinds
//==================================================================================

/// The closed set of detector families. The serialized names are the
/// `p_name`s written into expression nodes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorKind {
    #[serde(rename = "ConstantPatternDetector")]
    Constant,
    #[serde(rename = "DictPattern")]
    Dictionary,
    NumberAsString,
    CharSetSplit,
    ColumnCorrelation,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 5] = [
        DetectorKind::Constant,
        DetectorKind::Dictionary,
        DetectorKind::NumberAsString,
        DetectorKind::CharSetSplit,
        DetectorKind::ColumnCorrelation,
    ];

    pub fn p_name(self) -> &'static str {
        match self {
            DetectorKind::Constant => "ConstantPatternDetector",
            DetectorKind::Dictionary => "DictPattern",
            DetectorKind::NumberAsString => "NumberAsString",
            DetectorKind::CharSetSplit => "CharSetSplit",
            DetectorKind::ColumnCorrelation => "ColumnCorrelation",
        }
    }
}

//==================================================================================
// 2. Detection Context & Candidates
//==================================================================================

/// What a detector may look at while selecting columns.
#[derive(Clone, Copy)]
pub struct DetectionContext<'a> {
    /// The tree built so far (loop prevention, lineage checks).
    pub tree: &'a ExpressionTree,
    /// The columns of the rows about to be observed, in row order.
    pub columns: &'a [Column],
    pub null_token: &'a str,
}

/// A pattern found on one column, ready to become a compression node.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternCandidate {
    pub p_id: String,
    /// Share of observed rows the forward operator would encode.
    pub coverage: f64,
    pub null_coverage: f64,
    pub cols_in: Vec<Column>,
    pub cols_in_consumed: Vec<Column>,
    pub cols_out: Vec<Column>,
    pub cols_ex: Vec<Column>,
    pub operator_info: OperatorInfo,
    pub details: BTreeMap<String, serde_json::Value>,
}

impl PatternCandidate {
    /// Ids of the columns this candidate replaces.
    pub fn consumed_ids(&self) -> BTreeSet<&str> {
        self.cols_in_consumed.iter().map(|c| c.col_id.as_str()).collect()
    }

    /// Ids of the inputs this candidate only reads.
    pub fn metadata_ids(&self) -> BTreeSet<&str> {
        let consumed = self.consumed_ids();
        self.cols_in
            .iter()
            .map(|c| c.col_id.as_str())
            .filter(|id| !consumed.contains(id))
            .collect()
    }
}

/// Row, null and match counts of one column.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnCounters {
    pub rows: u64,
    pub nulls: u64,
}

impl ColumnCounters {
    pub fn ratio(&self, n: u64) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            n as f64 / self.rows as f64
        }
    }

    pub fn non_null(&self) -> u64 {
        self.rows - self.nulls
    }
}

//==================================================================================
// 3. The Detector Contract
//==================================================================================

pub trait PatternDetector {
    fn kind(&self) -> DetectorKind;

    /// Position of this detector among the enabled ones; part of derived column ids.
    fn detector_id(&self) -> usize;

    fn name(&self) -> &'static str {
        self.kind().p_name()
    }

    /// Identity used to refuse re-applying this pattern to its own output.
    fn signature(&self) -> String {
        self.name().to_string()
    }

    fn select_column(&self, ctx: &DetectionContext<'_>, col: &Column) -> bool;

    /// Feeds one row, laid out as `DetectionContext::columns`.
    fn observe(&mut self, row: &[&str]);

    /// Candidates keyed by the id of the column they consume.
    fn evaluate(&self) -> BTreeMap<String, Vec<PatternCandidate>>;

    fn to_compression_node(&self, candidate: &PatternCandidate) -> CompressionNode {
        let mut details = candidate.details.clone();
        details.insert("coverage".into(), candidate.coverage.into());
        details.insert("null_coverage".into(), candidate.null_coverage.into());
        CompressionNode {
            base: NodeBase {
                p_id: candidate.p_id.clone(),
                p_name: self.name().to_string(),
                cols_in: candidate.cols_in.clone(),
                cols_in_consumed: candidate.cols_in_consumed.clone(),
                cols_out: candidate.cols_out.clone(),
                operator_info: candidate.operator_info.clone(),
                details,
                pattern_signature: self.signature(),
                parents: BTreeSet::new(),
                children: BTreeSet::new(),
            },
            cols_ex: candidate.cols_ex.clone(),
        }
    }

    fn inverse_operator_info(&self, operator_info: &OperatorInfo) -> OperatorInfo {
        operators::inverse_operator_info(operator_info)
    }
}

/// Selection rules every detector applies first: never an exception column,
/// never a column this same pattern produced.
pub fn is_selectable(ctx: &DetectionContext<'_>, col: &Column, signature: &str) -> bool {
    !col.is_exception() && !ctx.tree.is_output_of_signature(&col.col_id, signature)
}

/// The `(row position, column)` pairs a detector selects.
pub fn selected_columns<D: PatternDetector + ?Sized>(
    detector: &D,
    ctx: &DetectionContext<'_>,
) -> Vec<(usize, Column)> {
    ctx.columns
        .iter()
        .enumerate()
        .filter(|(_, col)| detector.select_column(ctx, col))
        .map(|(pos, col)| (pos, col.clone()))
        .collect()
}

/// Builds the enabled detectors, in configuration order.
pub fn init_pattern_detectors(
    config: &ColshapeConfig,
    ctx: &DetectionContext<'_>,
) -> Vec<Box<dyn PatternDetector>> {
    let params = &config.detectors;
    config
        .enabled_detectors
        .iter()
        .enumerate()
        .map(|(detector_id, kind)| -> Box<dyn PatternDetector> {
            match kind {
                DetectorKind::Constant => {
                    Box::new(ConstantDetector::new(detector_id, &params.constant, ctx))
                }
                DetectorKind::Dictionary => {
                    Box::new(DictionaryDetector::new(detector_id, &params.dictionary, ctx))
                }
                DetectorKind::NumberAsString => Box::new(NumberAsStringDetector::new(
                    detector_id,
                    &params.number_as_string,
                    ctx,
                )),
                DetectorKind::CharSetSplit => Box::new(CharSetSplitDetector::new(
                    detector_id,
                    &params.char_set_split,
                    ctx,
                )),
                DetectorKind::ColumnCorrelation => Box::new(ColumnCorrelationDetector::new(
                    detector_id,
                    &params.column_correlation,
                    ctx,
                )),
            }
        })
        .collect()
}
