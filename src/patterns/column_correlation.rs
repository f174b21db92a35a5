//! Detects functional dependencies between dictionary-coded columns: when the
//! code of `source` predicts the code of `target`, `target` need not be stored.

use hashbrown::HashMap;
use std::collections::BTreeMap;

use super::{
    is_selectable, selected_columns, DetectionContext, DetectorKind, PatternCandidate,
    PatternDetector,
};
use crate::config::ColumnCorrelationConfig;
use crate::operators::OperatorInfo;
use crate::types::Column;

/// Observed `(source, target)` co-occurrences of one ordered column pair.
#[derive(Default)]
struct PairState {
    counts: HashMap<(String, String), u64>,
    /// Rows where either side was null.
    nulls: u64,
}

pub struct ColumnCorrelationDetector {
    detector_id: usize,
    min_correlation: f64,
    null_token: String,
    columns: Vec<(usize, Column)>,
    /// Indexed by `(i, j)` into `columns`, `i != j`.
    pairs: HashMap<(usize, usize), PairState>,
    rows: u64,
}

/// Compares dictionary codes numerically when both parse, textually otherwise.
fn code_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

impl ColumnCorrelationDetector {
    pub fn new(
        detector_id: usize,
        config: &ColumnCorrelationConfig,
        ctx: &DetectionContext<'_>,
    ) -> Self {
        let mut detector = Self {
            detector_id,
            min_correlation: config.min_correlation,
            null_token: ctx.null_token.to_string(),
            columns: Vec::new(),
            pairs: HashMap::new(),
            rows: 0,
        };
        detector.columns = selected_columns(&detector, ctx);
        let n = detector.columns.len();
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    detector.pairs.insert((i, j), PairState::default());
                }
            }
        }
        detector
    }

    /// The majority target of every source code, and how many rows it explains.
    fn majority_mapping(state: &PairState) -> (BTreeMap<String, String>, u64) {
        let mut best: HashMap<&str, (&str, u64)> = HashMap::new();
        for ((source, target), &count) in &state.counts {
            let entry = best.entry(source.as_str()).or_insert((target.as_str(), 0));
            let better = count > entry.1
                || (count == entry.1 && code_order(target, entry.0).is_lt());
            if better {
                *entry = (target.as_str(), count);
            }
        }
        let explained = best.values().map(|(_, c)| c).sum();
        let mapping = best
            .into_iter()
            .map(|(s, (t, _))| (s.to_string(), t.to_string()))
            .collect();
        (mapping, explained)
    }
}

impl PatternDetector for ColumnCorrelationDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::ColumnCorrelation
    }

    fn detector_id(&self) -> usize {
        self.detector_id
    }

    fn select_column(&self, ctx: &DetectionContext<'_>, col: &Column) -> bool {
        is_selectable(ctx, col, &self.signature())
            && ctx
                .tree
                .is_output_of_pattern(&col.col_id, DetectorKind::Dictionary.p_name())
    }

    fn observe(&mut self, row: &[&str]) {
        self.rows += 1;
        for (&(i, j), state) in self.pairs.iter_mut() {
            let (Some(&source), Some(&target)) =
                (row.get(self.columns[i].0), row.get(self.columns[j].0))
            else {
                continue;
            };
            if source == self.null_token || target == self.null_token {
                state.nulls += 1;
                continue;
            }
            *state
                .counts
                .entry((source.to_string(), target.to_string()))
                .or_insert(0) += 1;
        }
    }

    fn evaluate(&self) -> BTreeMap<String, Vec<PatternCandidate>> {
        let mut res: BTreeMap<String, Vec<PatternCandidate>> = BTreeMap::new();
        if self.rows == 0 {
            return res;
        }
        let mut keys: Vec<&(usize, usize)> = self.pairs.keys().collect();
        keys.sort();

        for &(i, j) in keys {
            let Some(state) = self.pairs.get(&(i, j)) else {
                continue;
            };
            let (mapping, explained) = Self::majority_mapping(state);
            let coverage = explained as f64 / self.rows as f64;
            if coverage < self.min_correlation {
                continue;
            }
            let (source, target) = (&self.columns[i].1, &self.columns[j].1);
            log::debug!(
                "correlation {} -> {} explains {:.3} of rows",
                source.col_id,
                target.col_id,
                coverage
            );

            let candidate = PatternCandidate {
                p_id: format!("{}:{}", self.name(), source.col_id),
                coverage,
                null_coverage: state.nulls as f64 / self.rows as f64,
                cols_in: vec![source.clone(), target.clone()],
                cols_in_consumed: vec![target.clone()],
                cols_out: Vec::new(),
                cols_ex: vec![target.exception_column()],
                operator_info: OperatorInfo::ColumnCorrelation { mapping },
                details: BTreeMap::new(),
            };
            res.entry(target.col_id.clone()).or_default().push(candidate);
        }
        res
    }
}
