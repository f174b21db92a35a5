// In: src/operators/mod.rs

//! The operator framework: forward/inverse transforms over the values of one row.
//!
//! A detected pattern is persisted as an `OperatorInfo` (a serializable
//! parameter bag) inside its expression node. At apply time the pipelines turn
//! it into a prepared `Transform` via `make_operator` (compression) or
//! `make_inverse_operator` (decompression). Transforms are pure: they see only
//! the values of their declared columns for the current row, and report a
//! non-matching row with `PatternNotApplicable` instead of failing the run.

pub mod char_set_split;
pub mod constant;
pub mod correlation;
pub mod dictionary;
pub mod number_as_string;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::CharSet;
use crate::error::{ColshapeError, PatternNotApplicable, Result};
use crate::types::Column;

use self::char_set_split::{run_sequence, CharClassifier, CharSetSplitDecoder, CharSetSplitEncoder};
use self::constant::{ConstantDecoder, ConstantEncoder};
use self::correlation::{CorrelationDecoder, CorrelationEncoder};
use self::dictionary::{DictionaryDecoder, DictionaryEncoder};
use self::number_as_string::{NumberAsStringDecoder, NumberAsStringEncoder};

//==================================================================================
// 1. Operator Parameters (persisted)
//==================================================================================

/// Everything needed to rebuild an operator. Stored in the tree document as
/// `{"op": "<Variant>", "params": {...}}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "op", content = "params")]
pub enum OperatorInfo {
    Constant {
        value: String,
    },
    /// `keys[i]` is encoded as code `i`.
    Dictionary {
        keys: Vec<String>,
    },
    /// `(code, key)` pairs, ordered by code.
    DictionaryInverse {
        codes: Vec<(u64, String)>,
    },
    NumberAsString {
        max_prefix_len: usize,
        max_suffix_len: usize,
    },
    CharSetSplit {
        pattern_string: String,
        char_sets: Vec<CharSet>,
        default_placeholder: char,
    },
    /// Source code -> target code.
    ColumnCorrelation {
        mapping: BTreeMap<String, String>,
    },
}

impl OperatorInfo {
    /// `(inputs, outputs)` of the forward operator.
    fn forward_arity(&self) -> Option<(usize, usize)> {
        match self {
            OperatorInfo::Constant { .. } => Some((1, 0)),
            OperatorInfo::Dictionary { .. } => Some((1, 1)),
            OperatorInfo::DictionaryInverse { .. } => None,
            OperatorInfo::NumberAsString {
                max_prefix_len,
                max_suffix_len,
            } => Some((
                1,
                1 + (*max_prefix_len > 0) as usize + (*max_suffix_len > 0) as usize,
            )),
            OperatorInfo::CharSetSplit { pattern_string, .. } => {
                Some((1, run_sequence(pattern_string).len()))
            }
            OperatorInfo::ColumnCorrelation { .. } => Some((2, 0)),
        }
    }

    /// `(inputs, outputs)` of the inverse operator, given inverse info.
    fn inverse_arity(&self) -> Option<(usize, usize)> {
        match self {
            OperatorInfo::Constant { .. } => Some((0, 1)),
            OperatorInfo::Dictionary { .. } => None,
            OperatorInfo::DictionaryInverse { .. } => Some((1, 1)),
            OperatorInfo::NumberAsString { .. } | OperatorInfo::CharSetSplit { .. } => {
                self.forward_arity().map(|(i, o)| (o, i))
            }
            // The source is the unconsumed input; the target comes back out.
            OperatorInfo::ColumnCorrelation { .. } => Some((1, 1)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperatorInfo::Constant { .. } => "Constant",
            OperatorInfo::Dictionary { .. } => "Dictionary",
            OperatorInfo::DictionaryInverse { .. } => "DictionaryInverse",
            OperatorInfo::NumberAsString { .. } => "NumberAsString",
            OperatorInfo::CharSetSplit { .. } => "CharSetSplit",
            OperatorInfo::ColumnCorrelation { .. } => "ColumnCorrelation",
        }
    }
}

//==================================================================================
// 2. Prepared Transforms
//==================================================================================

/// A ready-to-run operator. Dispatch is a closed `match`, one arm per kernel.
#[derive(Debug, Clone)]
pub enum Transform {
    ConstantEncode(ConstantEncoder),
    ConstantDecode(ConstantDecoder),
    DictionaryEncode(DictionaryEncoder),
    DictionaryDecode(DictionaryDecoder),
    NumberAsStringEncode(NumberAsStringEncoder),
    NumberAsStringDecode(NumberAsStringDecoder),
    CharSetSplitEncode(CharSetSplitEncoder),
    CharSetSplitDecode(CharSetSplitDecoder),
    CorrelationEncode(CorrelationEncoder),
    CorrelationDecode(CorrelationDecoder),
}

impl Transform {
    /// Applies the operator to the values of its input columns, in `cols_in` order.
    /// On success the result has exactly one value per output column.
    pub fn apply(&self, values: &[&str]) -> std::result::Result<Vec<String>, PatternNotApplicable> {
        match self {
            Transform::ConstantEncode(op) => op.apply(values),
            Transform::ConstantDecode(op) => op.apply(values),
            Transform::DictionaryEncode(op) => op.apply(values),
            Transform::DictionaryDecode(op) => op.apply(values),
            Transform::NumberAsStringEncode(op) => op.apply(values),
            Transform::NumberAsStringDecode(op) => op.apply(values),
            Transform::CharSetSplitEncode(op) => op.apply(values),
            Transform::CharSetSplitDecode(op) => op.apply(values),
            Transform::CorrelationEncode(op) => op.apply(values),
            Transform::CorrelationDecode(op) => op.apply(values),
        }
    }
}

fn wrong_direction(info: &OperatorInfo, direction: &str) -> ColshapeError {
    ColshapeError::InvalidTree(format!(
        "{} parameters cannot build a {} operator",
        info.name(),
        direction
    ))
}

fn check_arity(
    expected: Option<(usize, usize)>,
    info: &OperatorInfo,
    direction: &str,
    cols_in: &[Column],
    cols_out: &[Column],
) -> Result<()> {
    let (n_in, n_out) = expected.ok_or_else(|| wrong_direction(info, direction))?;
    if cols_in.len() != n_in || cols_out.len() != n_out {
        return Err(ColshapeError::SchemaMismatch(format!(
            "{} {} operator expects {} inputs and {} outputs, node declares {} and {}",
            info.name(),
            direction,
            n_in,
            n_out,
            cols_in.len(),
            cols_out.len()
        )));
    }
    Ok(())
}

//==================================================================================
// 3. Public Constructors
//==================================================================================

/// Builds the forward operator of a compression node.
pub fn make_operator(
    cols_in: &[Column],
    cols_out: &[Column],
    operator_info: &OperatorInfo,
    null_token: &str,
) -> Result<Transform> {
    check_arity(operator_info.forward_arity(), operator_info, "forward", cols_in, cols_out)?;
    let op = match operator_info {
        OperatorInfo::Constant { value } => {
            Transform::ConstantEncode(ConstantEncoder::new(value, null_token))
        }
        OperatorInfo::Dictionary { keys } => {
            Transform::DictionaryEncode(DictionaryEncoder::new(keys, null_token))
        }
        OperatorInfo::NumberAsString {
            max_prefix_len,
            max_suffix_len,
        } => Transform::NumberAsStringEncode(NumberAsStringEncoder::new(
            *max_prefix_len,
            *max_suffix_len,
            null_token,
        )),
        OperatorInfo::CharSetSplit {
            pattern_string,
            char_sets,
            default_placeholder,
        } => Transform::CharSetSplitEncode(CharSetSplitEncoder::new(
            CharClassifier::new(char_sets, *default_placeholder),
            run_sequence(pattern_string),
            null_token,
        )),
        OperatorInfo::ColumnCorrelation { mapping } => {
            Transform::CorrelationEncode(CorrelationEncoder::new(mapping, null_token))
        }
        OperatorInfo::DictionaryInverse { .. } => {
            return Err(wrong_direction(operator_info, "forward"))
        }
    };
    Ok(op)
}

/// Builds the inverse operator of a decompression node from its inverse info.
pub fn make_inverse_operator(
    cols_in: &[Column],
    cols_out: &[Column],
    inverse_operator_info: &OperatorInfo,
    null_token: &str,
) -> Result<Transform> {
    let info = inverse_operator_info;
    check_arity(info.inverse_arity(), info, "inverse", cols_in, cols_out)?;
    let op = match info {
        OperatorInfo::Constant { value } => Transform::ConstantDecode(ConstantDecoder::new(value)),
        OperatorInfo::DictionaryInverse { codes } => {
            Transform::DictionaryDecode(DictionaryDecoder::new(
                codes.iter().map(|(code, key)| (code, key)),
                null_token,
            ))
        }
        OperatorInfo::NumberAsString {
            max_prefix_len,
            max_suffix_len,
        } => Transform::NumberAsStringDecode(NumberAsStringDecoder::new(
            *max_prefix_len,
            *max_suffix_len,
            null_token,
        )),
        OperatorInfo::CharSetSplit { .. } => {
            Transform::CharSetSplitDecode(CharSetSplitDecoder::new(null_token))
        }
        OperatorInfo::ColumnCorrelation { mapping } => {
            Transform::CorrelationDecode(CorrelationDecoder::new(mapping, null_token))
        }
        OperatorInfo::Dictionary { .. } => return Err(wrong_direction(info, "inverse")),
    };
    Ok(op)
}

/// Derives the parameters of the inverse operator from the forward ones.
pub fn inverse_operator_info(operator_info: &OperatorInfo) -> OperatorInfo {
    match operator_info {
        OperatorInfo::Dictionary { keys } => OperatorInfo::DictionaryInverse {
            codes: keys
                .iter()
                .enumerate()
                .map(|(code, key)| (code as u64, key.clone()))
                .collect(),
        },
        other => other.clone(),
    }
}

/// Static overhead of an operator in bytes (dictionary contents, char-set tables).
/// Used for size accounting only.
pub fn metadata_size(operator_info: &OperatorInfo) -> usize {
    match operator_info {
        OperatorInfo::Constant { value } => value.len(),
        OperatorInfo::Dictionary { keys } => keys.iter().map(|k| k.len()).sum(),
        OperatorInfo::DictionaryInverse { codes } => codes
            .iter()
            .map(|(_, k)| k.len() + std::mem::size_of::<u64>())
            .sum(),
        OperatorInfo::NumberAsString { .. } => 2 * std::mem::size_of::<u32>(),
        OperatorInfo::CharSetSplit {
            pattern_string,
            char_sets,
            ..
        } => pattern_string.len() + char_sets.iter().map(|s| s.chars.len() + 1).sum::<usize>(),
        OperatorInfo::ColumnCorrelation { mapping } => {
            mapping.iter().map(|(s, t)| s.len() + t.len()).sum()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn cols(n: usize) -> Vec<Column> {
        (0..n)
            .map(|i| Column::new(i.to_string(), format!("c{}", i), DataType::varchar(8)))
            .collect()
    }

    #[test]
    fn test_dictionary_operator_pair_through_info() {
        let info = OperatorInfo::Dictionary {
            keys: vec!["a".into(), "b".into(), "c".into()],
        };
        let fwd = make_operator(&cols(1), &cols(1), &info, "null").unwrap();
        let inv_info = inverse_operator_info(&info);
        let inv = make_inverse_operator(&cols(1), &cols(1), &inv_info, "null").unwrap();

        let codes: Vec<String> = ["a", "b", "a", "c"]
            .iter()
            .map(|v| fwd.apply(&[v]).unwrap().remove(0))
            .collect();
        assert_eq!(codes, vec!["0", "1", "0", "2"]);
        let decoded: Vec<String> = codes
            .iter()
            .map(|c| inv.apply(&[c.as_str()]).unwrap().remove(0))
            .collect();
        assert_eq!(decoded, vec!["a", "b", "a", "c"]);

        assert!(fwd.apply(&["d"]).is_err());
        match inv_info {
            OperatorInfo::DictionaryInverse { codes } => {
                assert!(!codes.iter().any(|(_, k)| k == "d"))
            }
            other => panic!("unexpected inverse info {:?}", other),
        }
    }

    #[test]
    fn test_arity_is_checked() {
        let info = OperatorInfo::Constant { value: "X".into() };
        assert!(make_operator(&cols(1), &cols(0), &info, "null").is_ok());
        assert!(matches!(
            make_operator(&cols(1), &cols(1), &info, "null"),
            Err(ColshapeError::SchemaMismatch(_))
        ));
        assert!(make_inverse_operator(&cols(0), &cols(1), &info, "null").is_ok());

        let fwd_only = OperatorInfo::Dictionary { keys: vec![] };
        assert!(matches!(
            make_inverse_operator(&cols(1), &cols(1), &fwd_only, "null"),
            Err(ColshapeError::InvalidTree(_))
        ));
    }

    #[test]
    fn test_char_set_split_arity_follows_runs() {
        let info = OperatorInfo::CharSetSplit {
            pattern_string: "??DD".into(),
            char_sets: vec![CharSet {
                name: "digits".into(),
                placeholder: 'D',
                chars: "0123456789".into(),
            }],
            default_placeholder: '?',
        };
        let fwd = make_operator(&cols(1), &cols(2), &info, "null").unwrap();
        assert_eq!(fwd.apply(&["AB12"]).unwrap(), vec!["AB", "12"]);
        let inv = make_inverse_operator(&cols(2), &cols(1), &info, "null").unwrap();
        assert_eq!(inv.apply(&["AB", "12"]).unwrap(), vec!["AB12"]);
    }

    #[test]
    fn test_info_serializes_with_tag() {
        let info = OperatorInfo::NumberAsString {
            max_prefix_len: 2,
            max_suffix_len: 0,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"op\":\"NumberAsString\""));
        let back: OperatorInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
        assert_eq!(metadata_size(&OperatorInfo::Constant { value: "abc".into() }), 3);
    }
}
