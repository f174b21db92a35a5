//! Pattern selection policy: which candidates of one detection round become nodes.

use std::collections::BTreeSet;

use super::PatternCandidate;

/// A candidate tagged with the index of the detector that produced it.
pub type RankedCandidate = (usize, PatternCandidate);

pub trait PatternSelector {
    /// Returns the accepted candidates, in the order they should become nodes.
    fn select(&self, candidates: Vec<RankedCandidate>) -> Vec<RankedCandidate>;
}

/// Greedy selection by coverage.
///
/// A candidate is accepted when none of its consumed columns is consumed or
/// read by an accepted candidate, and none of the columns it reads is consumed
/// by one. Levels built this way stay acyclic once inverted.
#[derive(Debug, Clone)]
pub struct CoverageSelector {
    pub min_col_coverage: f64,
}

impl PatternSelector for CoverageSelector {
    fn select(&self, mut candidates: Vec<RankedCandidate>) -> Vec<RankedCandidate> {
        candidates.retain(|(_, c)| c.coverage >= self.min_col_coverage && c.coverage > 0.0);
        // Stable: equal coverage keeps detector order.
        candidates.sort_by(|(_, a), (_, b)| b.coverage.total_cmp(&a.coverage));

        let mut consumed: BTreeSet<String> = BTreeSet::new();
        let mut read: BTreeSet<String> = BTreeSet::new();
        let mut accepted = Vec::new();
        for (detector_idx, candidate) in candidates {
            let own_consumed = candidate.consumed_ids();
            let own_read = candidate.metadata_ids();
            let conflict = own_consumed
                .iter()
                .any(|id| consumed.contains(*id) || read.contains(*id))
                || own_read.iter().any(|id| consumed.contains(*id));
            if conflict {
                log::debug!("selector drops {} (column conflict)", candidate.p_id);
                continue;
            }
            consumed.extend(own_consumed.iter().map(|s| s.to_string()));
            read.extend(own_read.iter().map(|s| s.to_string()));
            log_metric!(
                "event" = "select_pattern",
                "p_id" = &candidate.p_id,
                "coverage" = &candidate.coverage
            );
            accepted.push((detector_idx, candidate));
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::OperatorInfo;
    use crate::types::{Column, DataType};
    use std::collections::BTreeMap;

    fn cand(p_id: &str, ins: &[&str], consumed: &[&str], coverage: f64) -> PatternCandidate {
        let cols = |ids: &[&str]| {
            ids.iter()
                .map(|id| Column::new(*id, *id, DataType::varchar(4)))
                .collect::<Vec<_>>()
        };
        PatternCandidate {
            p_id: p_id.to_string(),
            coverage,
            null_coverage: 0.0,
            cols_in: cols(ins),
            cols_in_consumed: cols(consumed),
            cols_out: vec![],
            cols_ex: vec![],
            operator_info: OperatorInfo::Constant { value: "x".into() },
            details: BTreeMap::new(),
        }
    }

    fn selected(cands: Vec<RankedCandidate>, min: f64) -> Vec<String> {
        CoverageSelector {
            min_col_coverage: min,
        }
        .select(cands)
        .into_iter()
        .map(|(_, c)| c.p_id)
        .collect()
    }

    #[test]
    fn test_best_coverage_wins_each_column() {
        let cands = vec![
            (0, cand("const0", &["0"], &["0"], 0.6)),
            (1, cand("dict0", &["0"], &["0"], 0.9)),
            (1, cand("dict1", &["1"], &["1"], 0.1)),
        ];
        assert_eq!(selected(cands, 0.2), vec!["dict0"]);
    }

    #[test]
    fn test_mutual_correlations_are_not_both_kept() {
        let cands = vec![
            (4, cand("a->b", &["a", "b"], &["b"], 0.95)),
            (4, cand("b->a", &["b", "a"], &["a"], 1.0)),
            (4, cand("a->c", &["a", "c"], &["c"], 0.9)),
        ];
        // b->a consumes a, which both other candidates only read.
        assert_eq!(selected(cands, 0.2), vec!["b->a"]);
    }

    #[test]
    fn test_shared_metadata_inputs_are_allowed() {
        let cands = vec![
            (4, cand("a->b", &["a", "b"], &["b"], 0.95)),
            (4, cand("a->c", &["a", "c"], &["c"], 0.9)),
        ];
        assert_eq!(selected(cands, 0.2), vec!["a->b", "a->c"]);
    }
}
