//! Detects low-cardinality string columns and assigns dense integer codes.

use hashbrown::HashMap;
use num_traits::{Bounded, ToPrimitive};
use std::collections::BTreeMap;

use super::{
    is_selectable, selected_columns, ColumnCounters, DetectionContext, DetectorKind,
    PatternCandidate, PatternDetector,
};
use crate::config::DictionaryConfig;
use crate::operators::OperatorInfo;
use crate::types::{Column, DataType};

fn fits<T: Bounded + ToPrimitive>(max_code: u64) -> bool {
    T::max_value().to_u64().map_or(false, |max| max_code <= max)
}

/// The narrowest SQL integer type able to hold codes `0..=max_code`.
pub fn code_datatype(max_code: u64) -> DataType {
    let name = if fits::<i8>(max_code) {
        "tinyint"
    } else if fits::<i16>(max_code) {
        "smallint"
    } else if fits::<i32>(max_code) {
        "int"
    } else {
        "bigint"
    };
    DataType::simple(name)
}

#[derive(Debug, Clone, Copy)]
struct KeyStats {
    count: u64,
    first_seen: u64,
}

struct ColumnState {
    pos: usize,
    col: Column,
    counters: ColumnCounters,
    keys: HashMap<String, KeyStats>,
}

pub struct DictionaryDetector {
    detector_id: usize,
    config: DictionaryConfig,
    null_token: String,
    columns: Vec<ColumnState>,
}

impl DictionaryDetector {
    pub fn new(detector_id: usize, config: &DictionaryConfig, ctx: &DetectionContext<'_>) -> Self {
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
                keys: HashMap::new(),
            })
            .collect();
        detector
    }

    /// Keys by descending frequency (first appearance breaks ties), cut at the
    /// byte budget. Returns the kept keys and how many rows they cover.
    fn build_dictionary(&self, keys: &HashMap<String, KeyStats>) -> (Vec<String>, u64) {
        let mut ranked: Vec<(&String, &KeyStats)> = keys.iter().collect();
        ranked.sort_by(|(_, a), (_, b)| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.first_seen.cmp(&b.first_seen))
        });

        let mut budget = self.config.max_dict_size;
        let mut kept = Vec::new();
        let mut covered = 0;
        for (key, stats) in ranked {
            if key.len() > budget {
                break;
            }
            budget -= key.len();
            kept.push(key.clone());
            covered += stats.count;
        }
        (kept, covered)
    }
}

impl PatternDetector for DictionaryDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Dictionary
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
            let first_seen = state.counters.rows;
            state
                .keys
                .entry_ref(attr)
                .or_insert(KeyStats {
                    count: 0,
                    first_seen,
                })
                .count += 1;
        }
    }

    fn evaluate(&self) -> BTreeMap<String, Vec<PatternCandidate>> {
        let mut res = BTreeMap::new();
        for state in &self.columns {
            let non_null = state.counters.non_null();
            if non_null == 0 {
                continue;
            }
            let key_ratio = state.keys.len() as f64 / non_null as f64;
            if key_ratio > self.config.max_key_ratio {
                log::debug!(
                    "dictionary skips {}: key ratio {:.3} above {}",
                    state.col.col_id,
                    key_ratio,
                    self.config.max_key_ratio
                );
                continue;
            }

            let (keys, covered) = self.build_dictionary(&state.keys);
            if keys.is_empty() {
                continue;
            }
            let out = state.col.derive_output(
                self.detector_id,
                0,
                0,
                code_datatype(keys.len() as u64 - 1),
            );
            let mut details = BTreeMap::new();
            details.insert("nb_keys".to_string(), keys.len().into());
            details.insert("key_ratio".to_string(), key_ratio.into());

            let candidate = PatternCandidate {
                p_id: self.name().to_string(),
                coverage: state.counters.ratio(covered),
                null_coverage: state.counters.ratio(state.counters.nulls),
                cols_in: vec![state.col.clone()],
                cols_in_consumed: vec![state.col.clone()],
                cols_out: vec![out],
                cols_ex: vec![state.col.exception_column()],
                operator_info: OperatorInfo::Dictionary { keys },
                details,
            };
            res.insert(state.col.col_id.clone(), vec![candidate]);
        }
        res
    }
}
