// In: src/pipeline/validation.rs

//! Round-trip validation: reconstructed rows against the ground truth.

use serde::{Deserialize, Serialize};

use crate::error::{ColshapeError, Result};
use crate::types::Column;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LengthDiff {
    pub expected: usize,
    pub actual: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    pub position: usize,
    pub col_id: String,
    pub expected: String,
    pub actual: String,
}

/// Everything that differs in one reconstructed row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidationDiff {
    /// 1-based row number.
    pub row: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub length: Option<LengthDiff>,
    pub fields: Vec<FieldDiff>,
}

impl ValidationDiff {
    /// Compares two rows field by field; `None` when they are identical.
    pub fn compare<A: AsRef<str>, B: AsRef<str>>(
        row: u64,
        columns: &[Column],
        expected: &[A],
        actual: &[B],
    ) -> Option<Self> {
        let length = (expected.len() != actual.len()).then(|| LengthDiff {
            expected: expected.len(),
            actual: actual.len(),
        });
        let fields: Vec<FieldDiff> = expected
            .iter()
            .zip(actual)
            .enumerate()
            .filter(|(_, (e, a))| e.as_ref() != a.as_ref())
            .map(|(position, (e, a))| FieldDiff {
                position,
                col_id: columns
                    .get(position)
                    .map(|c| c.col_id.clone())
                    .unwrap_or_else(|| position.to_string()),
                expected: e.as_ref().to_string(),
                actual: a.as_ref().to_string(),
            })
            .collect();

        if length.is_none() && fields.is_empty() {
            None
        } else {
            Some(Self { row, length, fields })
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn into_error(self) -> ColshapeError {
        ColshapeError::ValidationMismatch {
            message: format!("row {} does not round-trip", self.row),
            diff: self.to_json(),
        }
    }
}

/// Counts checked and mismatching rows, reporting each mismatch as JSON.
#[derive(Debug, Clone, Default)]
pub struct RowValidator {
    stop_on_first_mismatch: bool,
    checked_rows: u64,
    mismatched_rows: u64,
}

impl RowValidator {
    pub fn new(stop_on_first_mismatch: bool) -> Self {
        Self {
            stop_on_first_mismatch,
            ..Self::default()
        }
    }

    /// Logs a mismatch and keeps going, unless configured to stop on the first one.
    pub fn check<A: AsRef<str>, B: AsRef<str>>(
        &mut self,
        row: u64,
        columns: &[Column],
        expected: &[A],
        actual: &[B],
    ) -> Result<()> {
        self.checked_rows += 1;
        let Some(diff) = ValidationDiff::compare(row, columns, expected, actual) else {
            return Ok(());
        };
        self.mismatched_rows += 1;
        log::warn!("validation mismatch: {}", diff.to_json());
        if self.stop_on_first_mismatch {
            return Err(diff.into_error());
        }
        Ok(())
    }

    /// Reports a row-count difference between the rebuilt rows and the
    /// ground truth. Counts as one mismatch.
    pub fn check_row_count(&mut self, expected: u64, actual: u64) -> Result<()> {
        if expected == actual {
            return Ok(());
        }
        self.mismatched_rows += 1;
        let diff = serde_json::json!({ "row_count": LengthDiff {
            expected: expected as usize,
            actual: actual as usize,
        } });
        log::warn!("validation mismatch: {}", diff);
        if self.stop_on_first_mismatch {
            return Err(ColshapeError::ValidationMismatch {
                message: format!(
                    "number of rows do not match: expected {}, rebuilt {}",
                    expected, actual
                ),
                diff,
            });
        }
        Ok(())
    }

    pub fn checked_rows(&self) -> u64 {
        self.checked_rows
    }

    pub fn mismatched_rows(&self) -> u64 {
        self.mismatched_rows
    }
}
