//! Detects numbers stored as text, keeping their formatting in prefix/suffix columns.

use std::collections::BTreeMap;

use super::{
    is_selectable, selected_columns, ColumnCounters, DetectionContext, DetectorKind,
    PatternCandidate, PatternDetector,
};
use crate::config::NumberAsStringConfig;
use crate::operators::number_as_string::split_number;
use crate::operators::OperatorInfo;
use crate::types::{Column, DataType};

/// Above this precision the numeric output falls back to `double`.
const MAX_DECIMAL_PRECISION: usize = 18;

#[derive(Default)]
struct Extents {
    matches: u64,
    max_prefix_len: usize,
    max_suffix_len: usize,
    max_int_digits: usize,
    max_frac_digits: usize,
}

struct ColumnState {
    pos: usize,
    col: Column,
    counters: ColumnCounters,
    extents: Extents,
}

pub struct NumberAsStringDetector {
    detector_id: usize,
    config: NumberAsStringConfig,
    null_token: String,
    columns: Vec<ColumnState>,
}

impl NumberAsStringDetector {
    pub fn new(
        detector_id: usize,
        config: &NumberAsStringConfig,
        ctx: &DetectionContext<'_>,
    ) -> Self {
        let mut detector = Self {
            detector_id,
            config: config.clone(),
            null_token: ctx.null_token.to_string(),
            columns: Vec::new(),
        };
        detector.columns = selected_columns(&detector, ctx)
            .into_iter()
            .map(|(pos, col)| ColumnState {
                pos,
                col,
                counters: ColumnCounters::default(),
                extents: Extents::default(),
            })
            .collect();
        detector
    }
}

fn number_datatype(extents: &Extents) -> DataType {
    let precision = (extents.max_int_digits + extents.max_frac_digits).max(1);
    if precision > MAX_DECIMAL_PRECISION {
        DataType::simple("double")
    } else {
        DataType::decimal(precision, extents.max_frac_digits)
    }
}

impl PatternDetector for NumberAsStringDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::NumberAsString
    }

    fn detector_id(&self) -> usize {
        self.detector_id
    }

    fn select_column(&self, ctx: &DetectionContext<'_>, col: &Column) -> bool {
        is_selectable(ctx, col, &self.signature()) && col.datatype.is_string()
    }

    fn observe(&mut self, row: &[&str]) {
        for state in self.columns.iter_mut() {
            let Some(&attr) = row.get(state.pos) else {
                continue;
            };
            state.counters.rows += 1;
            if attr == self.null_token {
                state.counters.nulls += 1;
                continue;
            }
            let Some(parts) = split_number(attr) else {
                continue;
            };
            let (prefix_len, suffix_len) = (parts.prefix_len(), parts.suffix_len());
            if prefix_len > self.config.max_prefix_len || suffix_len > self.config.max_suffix_len {
                continue;
            }
            let ext = &mut state.extents;
            ext.matches += 1;
            ext.max_prefix_len = ext.max_prefix_len.max(prefix_len);
            ext.max_suffix_len = ext.max_suffix_len.max(suffix_len);
            ext.max_int_digits = ext.max_int_digits.max(parts.int_digits);
            ext.max_frac_digits = ext.max_frac_digits.max(parts.frac_digits);
        }
    }

    fn evaluate(&self) -> BTreeMap<String, Vec<PatternCandidate>> {
        let mut res = BTreeMap::new();
        for state in &self.columns {
            let ext = &state.extents;
            if ext.matches == 0 {
                continue;
            }

            let mut cols_out = vec![state.col.derive_output(
                self.detector_id,
                0,
                0,
                number_datatype(ext),
            )];
            if ext.max_prefix_len > 0 {
                cols_out.push(state.col.derive_output(
                    self.detector_id,
                    0,
                    cols_out.len(),
                    DataType::varchar(ext.max_prefix_len),
                ));
            }
            if ext.max_suffix_len > 0 {
                cols_out.push(state.col.derive_output(
                    self.detector_id,
                    0,
                    cols_out.len(),
                    DataType::varchar(ext.max_suffix_len),
                ));
            }

            let candidate = PatternCandidate {
                p_id: self.name().to_string(),
                coverage: state.counters.ratio(ext.matches),
                null_coverage: state.counters.ratio(state.counters.nulls),
                cols_in: vec![state.col.clone()],
                cols_in_consumed: vec![state.col.clone()],
                cols_out,
                cols_ex: vec![state.col.exception_column()],
                operator_info: OperatorInfo::NumberAsString {
                    max_prefix_len: ext.max_prefix_len,
                    max_suffix_len: ext.max_suffix_len,
                },
                details: BTreeMap::new(),
            };
            res.insert(state.col.col_id.clone(), vec![candidate]);
        }
        res
    }
}
