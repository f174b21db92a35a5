//! This module defines the SQL-like datatype descriptor carried by every column.

use crate::error::ColshapeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An immutable SQL-like datatype: a name, a nullability flag and ordered
/// parameters (precision/scale, varchar length, ...).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataType {
    pub name: String,
    pub nullable: bool,
    #[serde(default)]
    pub params: Vec<String>,
}

impl DataType {
    pub fn new(name: &str, nullable: bool, params: Vec<String>) -> Self {
        Self {
            name: name.to_lowercase(),
            nullable,
            params,
        }
    }

    /// A nullable type without parameters, e.g. `double`.
    pub fn simple(name: &str) -> Self {
        Self::new(name, true, Vec::new())
    }

    pub fn varchar(len: usize) -> Self {
        Self::new("varchar", true, vec![len.to_string()])
    }

    pub fn decimal(precision: usize, scale: usize) -> Self {
        Self::new(
            "decimal",
            true,
            vec![precision.to_string(), scale.to_string()],
        )
    }

    /// Parses forms such as `varchar(32)`, `decimal(10, 2) not null` or `double,`.
    pub fn from_sql_str(sql: &str) -> Result<Self, ColshapeError> {
        let mut s = sql.trim().to_lowercase();
        if s.ends_with(',') {
            s.pop();
            s = s.trim_end().to_string();
        }

        let mut nullable = true;
        if let Some(stripped) = s.strip_suffix("not null") {
            nullable = false;
            s = stripped.trim_end().to_string();
        }

        let (name, params) = match s.find('(') {
            Some(open) => {
                if !s.ends_with(')') {
                    return Err(ColshapeError::UnsupportedDataType(format!(
                        "unbalanced parameter list in '{}'",
                        sql
                    )));
                }
                let name = s[..open].trim().to_string();
                let params = s[open + 1..s.len() - 1]
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
                (name, params)
            }
            None => (s.trim().to_string(), Vec::new()),
        };

        if name.is_empty() {
            return Err(ColshapeError::UnsupportedDataType(format!(
                "unable to parse sql datatype '{}'",
                sql
            )));
        }
        Ok(Self {
            name,
            nullable,
            params,
        })
    }

    pub fn to_sql_str(&self) -> String {
        let mut res = self.name.clone();
        if !self.params.is_empty() {
            res.push('(');
            res.push_str(&self.params.join(", "));
            res.push(')');
        }
        if !self.nullable {
            res.push_str(" not null");
        }
        res
    }

    /// Returns `true` for the textual types the string detectors work on.
    pub fn is_string(&self) -> bool {
        matches!(self.name.as_str(), "varchar" | "char" | "text")
    }

    /// Copy of this type with `nullable` forced on (exception columns are sparse).
    pub fn as_nullable(&self) -> Self {
        Self {
            nullable: true,
            ..self.clone()
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql_str())
    }
}

impl FromStr for DataType {
    type Err = ColshapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_sql_str(s)
    }
}
