//! Column identity and the naming rules that derive new column ids from lineage.

use super::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix identifying exception columns.
pub const EXCEPTION_SUFFIX: &str = "__ex";

/// A column value object. Identity is `col_id`; columns are freely cloned.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub col_id: String,
    pub name: String,
    pub datatype: DataType,
}

impl Column {
    pub fn new(col_id: impl Into<String>, name: impl Into<String>, datatype: DataType) -> Self {
        Self {
            col_id: col_id.into(),
            name: name.into(),
            datatype,
        }
    }

    /// Derives the output column of a pattern applied to `self`.
    ///
    /// The id is `<in_col_id>__<detector_id>_<pattern_idx>_<output_idx>` and is
    /// therefore stable across runs that apply the same patterns in the same order.
    pub fn derive_output(
        &self,
        detector_id: usize,
        pattern_idx: usize,
        output_idx: usize,
        datatype: DataType,
    ) -> Column {
        let suffix = format!("__{}_{}_{}", detector_id, pattern_idx, output_idx);
        Column {
            col_id: format!("{}{}", self.col_id, suffix),
            name: format!("{}{}", self.name, suffix),
            datatype,
        }
    }

    /// The exception column paired with `self`.
    pub fn exception_column(&self) -> Column {
        Column {
            col_id: exception_col_id(&self.col_id),
            name: format!("{}{}", self.name, EXCEPTION_SUFFIX),
            datatype: self.datatype.as_nullable(),
        }
    }

    pub fn is_exception(&self) -> bool {
        is_exception_col_id(&self.col_id)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}: {})", self.col_id, self.name, self.datatype)
    }
}

pub fn exception_col_id(col_id: &str) -> String {
    format!("{}{}", col_id, EXCEPTION_SUFFIX)
}

pub fn is_exception_col_id(col_id: &str) -> bool {
    col_id.ends_with(EXCEPTION_SUFFIX)
}

/// Maps an exception column id back to the column whose values it stores.
pub fn original_col_id(ex_col_id: &str) -> Option<&str> {
    ex_col_id.strip_suffix(EXCEPTION_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_and_exception_naming() {
        let col = Column::new("3", "city", DataType::varchar(20));
        let out = col.derive_output(1, 0, 2, DataType::simple("tinyint"));
        assert_eq!(out.col_id, "3__1_0_2");
        assert_eq!(out.name, "city__1_0_2");

        let ex = out.exception_column();
        assert_eq!(ex.col_id, "3__1_0_2__ex");
        assert!(ex.is_exception());
        assert!(ex.datatype.nullable);
        assert_eq!(original_col_id(&ex.col_id), Some("3__1_0_2"));
        assert_eq!(original_col_id("3"), None);
    }
}
