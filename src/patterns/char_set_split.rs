//! Detects strings with a stable character-class structure, e.g. `"AB12"` and
//! `"CD34"` share the pattern string `"??DD"` and split into `"AB" | "12"`.

use hashbrown::HashMap;
use std::collections::BTreeMap;

use super::{
    is_selectable, selected_columns, ColumnCounters, DetectionContext, DetectorKind,
    PatternCandidate, PatternDetector,
};
use crate::config::CharSetSplitConfig;
use crate::operators::char_set_split::{run_sequence, CharClassifier};
use crate::operators::OperatorInfo;
use crate::types::{Column, DataType};

#[derive(Default)]
struct RunStats {
    count: u64,
    /// Longest segment seen for each run, in characters.
    max_lens: Vec<usize>,
}

struct ColumnState {
    pos: usize,
    col: Column,
    counters: ColumnCounters,
    patterns: HashMap<String, u64>,
    /// Keyed by the collapsed run sequence.
    runs: HashMap<String, RunStats>,
}

pub struct CharSetSplitDetector {
    detector_id: usize,
    config: CharSetSplitConfig,
    classifier: CharClassifier,
    null_token: String,
    columns: Vec<ColumnState>,
}

/// Run sequence of a pattern string plus the length of every run.
fn runs_with_lengths(pattern: &str) -> (String, Vec<usize>) {
    let mut runs = String::new();
    let mut lens: Vec<usize> = Vec::new();
    let mut last = None;
    for c in pattern.chars() {
        if last == Some(c) {
            if let Some(len) = lens.last_mut() {
                *len += 1;
            }
        } else {
            runs.push(c);
            lens.push(1);
            last = Some(c);
        }
    }
    (runs, lens)
}

impl CharSetSplitDetector {
    pub fn new(detector_id: usize, config: &CharSetSplitConfig, ctx: &DetectionContext<'_>) -> Self {
        let mut detector = Self {
            detector_id,
            config: config.clone(),
            classifier: CharClassifier::new(&config.char_sets, config.default_placeholder),
            null_token: ctx.null_token.to_string(),
            columns: Vec::new(),
        };
        detector.columns = selected_columns(&detector, ctx)
            .into_iter()
            .map(|(pos, col)| ColumnState {
                pos,
                col,
                counters: ColumnCounters::default(),
                patterns: HashMap::new(),
                runs: HashMap::new(),
            })
            .collect();
        detector
    }
}

impl PatternDetector for CharSetSplitDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::CharSetSplit
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
            let pattern = self.classifier.pattern_string(attr);
            let (runs, lens) = runs_with_lengths(&pattern);
            *state.patterns.entry(pattern).or_insert(0) += 1;

            let stats = state.runs.entry(runs).or_default();
            stats.count += 1;
            if stats.max_lens.len() < lens.len() {
                stats.max_lens.resize(lens.len(), 0);
            }
            for (max, len) in stats.max_lens.iter_mut().zip(lens) {
                *max = (*max).max(len);
            }
        }
    }

    fn evaluate(&self) -> BTreeMap<String, Vec<PatternCandidate>> {
        let mut res = BTreeMap::new();
        for state in &self.columns {
            // Most frequent pattern string; ties go to the smallest one.
            let dominant = state
                .patterns
                .iter()
                .max_by(|(pa, ca), (pb, cb)| ca.cmp(cb).then_with(|| pb.cmp(pa)))
                .map(|(p, _)| p.clone());
            let Some(pattern_string) = dominant else {
                continue;
            };
            let runs = run_sequence(&pattern_string);
            if runs.is_empty() || (runs.len() == 1 && self.config.drop_single_char_pattern) {
                continue;
            }
            let run_key: String = runs.iter().collect();
            let Some(stats) = state.runs.get(&run_key) else {
                continue;
            };

            let cols_out = stats
                .max_lens
                .iter()
                .enumerate()
                .map(|(i, &len)| {
                    state
                        .col
                        .derive_output(self.detector_id, 0, i, DataType::varchar(len))
                })
                .collect();

            let mut details = BTreeMap::new();
            details.insert("nb_patterns".to_string(), state.patterns.len().into());

            let candidate = PatternCandidate {
                p_id: format!("{}:{}", self.name(), pattern_string),
                coverage: state.counters.ratio(stats.count),
                null_coverage: state.counters.ratio(state.counters.nulls),
                cols_in: vec![state.col.clone()],
                cols_in_consumed: vec![state.col.clone()],
                cols_out,
                cols_ex: vec![state.col.exception_column()],
                operator_info: OperatorInfo::CharSetSplit {
                    pattern_string,
                    char_sets: self.config.char_sets.clone(),
                    default_placeholder: self.config.default_placeholder,
                },
                details,
            };
            res.insert(state.col.col_id.clone(), vec![candidate]);
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExpressionTree, TreeType};

    fn evaluate(values: &[&str]) -> BTreeMap<String, Vec<PatternCandidate>> {
        let cols = vec![Column::new("0", "code", DataType::varchar(8))];
        let tree = ExpressionTree::new(TreeType::Compression, &cols);
        let ctx = DetectionContext {
            tree: &tree,
            columns: &cols,
            null_token: "null",
        };
        let mut det = CharSetSplitDetector::new(3, &CharSetSplitConfig::default(), &ctx);
        for &v in values {
            det.observe(&[v]);
        }
        det.evaluate()
    }

    #[test]
    fn test_runs_with_lengths() {
        assert_eq!(runs_with_lengths("??DD?"), ("?D?".to_string(), vec![2, 2, 1]));
        assert_eq!(runs_with_lengths(""), (String::new(), vec![]));
    }

    #[test]
    fn test_dominant_pattern_and_coverage() {
        let res = evaluate(&["AB12", "CD34", "X999", "1234"]);
        let cand = &res["0"][0];
        assert_eq!(cand.p_id, "CharSetSplit:??DD");
        // "X999" has another pattern string but the same run sequence.
        assert_eq!(cand.coverage, 0.75);
        let types: Vec<String> = cand.cols_out.iter().map(|c| c.datatype.to_sql_str()).collect();
        assert_eq!(types, vec!["varchar(2)", "varchar(3)"]);
        assert_eq!(cand.cols_out[1].col_id, "0__3_0_1");
    }

    #[test]
    fn test_single_run_patterns_are_dropped() {
        assert!(evaluate(&["1234", "5678"]).is_empty());
    }
}
