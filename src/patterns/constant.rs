//! Detects columns dominated by a single value.

use hashbrown::HashMap;
use std::collections::BTreeMap;

use super::{
    is_selectable, selected_columns, ColumnCounters, DetectionContext, DetectorKind,
    PatternCandidate, PatternDetector,
};
use crate::config::ConstantConfig;
use crate::operators::OperatorInfo;
use crate::types::Column;

struct ColumnState {
    pos: usize,
    col: Column,
    counters: ColumnCounters,
    values: HashMap<String, u64>,
}

pub struct ConstantDetector {
    detector_id: usize,
    min_constant_ratio: f64,
    null_token: String,
    columns: Vec<ColumnState>,
}

impl ConstantDetector {
    pub fn new(detector_id: usize, config: &ConstantConfig, ctx: &DetectionContext<'_>) -> Self {
        let mut detector = Self {
            detector_id,
            min_constant_ratio: config.min_constant_ratio,
            null_token: ctx.null_token.to_string(),
            columns: Vec::new(),
        };
        detector.columns = selected_columns(&detector, ctx)
            .into_iter()
            .map(|(pos, col)| ColumnState {
                pos,
                col,
                counters: ColumnCounters::default(),
                values: HashMap::new(),
            })
            .collect();
        detector
    }
}

impl PatternDetector for ConstantDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Constant
    }

    fn detector_id(&self) -> usize {
        self.detector_id
    }

    fn select_column(&self, ctx: &DetectionContext<'_>, col: &Column) -> bool {
        is_selectable(ctx, col, &self.signature())
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
            *state.values.entry_ref(attr).or_insert(0) += 1;
        }
    }

    fn evaluate(&self) -> BTreeMap<String, Vec<PatternCandidate>> {
        let mut res = BTreeMap::new();
        for state in &self.columns {
            let non_null = state.counters.non_null();
            // Most frequent value; ties go to the smallest one.
            let top = state
                .values
                .iter()
                .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.cmp(va)));
            let Some((value, &count)) = top else {
                continue;
            };
            if non_null == 0 || (count as f64 / non_null as f64) < self.min_constant_ratio {
                continue;
            }

            let candidate = PatternCandidate {
                p_id: self.name().to_string(),
                coverage: state.counters.ratio(count),
                null_coverage: state.counters.ratio(state.counters.nulls),
                cols_in: vec![state.col.clone()],
                cols_in_consumed: vec![state.col.clone()],
                cols_out: Vec::new(),
                cols_ex: vec![state.col.exception_column()],
                operator_info: OperatorInfo::Constant {
                    value: value.clone(),
                },
                details: BTreeMap::new(),
            };
            log::debug!(
                "constant candidate on {}: '{}' covers {:.3}",
                state.col.col_id,
                value,
                candidate.coverage
            );
            res.insert(state.col.col_id.clone(), vec![candidate]);
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExpressionTree, TreeType};
    use crate::types::DataType;

    #[test]
    fn test_dominant_value_is_detected() {
        let cols = vec![
            Column::new("0", "flag", DataType::varchar(1)),
            Column::new("1", "other", DataType::varchar(1)),
        ];
        let tree = ExpressionTree::new(TreeType::Compression, &cols);
        let ctx = DetectionContext {
            tree: &tree,
            columns: &cols,
            null_token: "null",
        };
        let mut det = ConstantDetector::new(
            0,
            &ConstantConfig {
                min_constant_ratio: 0.5,
            },
            &ctx,
        );
        for row in [["X", "a"], ["X", "b"], ["X", "c"], ["Y", "d"]] {
            det.observe(&row);
        }
        let res = det.evaluate();
        assert_eq!(res.len(), 1);
        let cand = &res["0"][0];
        assert_eq!(cand.coverage, 0.75);
        assert_eq!(cand.operator_info, OperatorInfo::Constant { value: "X".into() });
        assert_eq!(cand.cols_ex[0].col_id, "0__ex");
        assert!(cand.cols_out.is_empty());
    }

    #[test]
    fn test_nulls_do_not_count_against_the_ratio() {
        let cols = vec![Column::new("0", "c", DataType::varchar(1))];
        let tree = ExpressionTree::new(TreeType::Compression, &cols);
        let ctx = DetectionContext {
            tree: &tree,
            columns: &cols,
            null_token: "null",
        };
        let mut det = ConstantDetector::new(0, &ConstantConfig::default(), &ctx);
        for v in ["null", "null", "Z"] {
            det.observe(&[v]);
        }
        let cand = &det.evaluate()["0"][0];
        assert!((cand.coverage - 1.0 / 3.0).abs() < 1e-9);
        assert!((cand.null_coverage - 2.0 / 3.0).abs() < 1e-9);
    }
}
