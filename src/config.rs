// In: src/config.rs

//! The single source of truth for all colshape configuration.
//!
//! `ColshapeConfig` is created once at the application boundary (typically from
//! a JSON file) and then handed down by reference to the detectors, the tree
//! builder and both apply pipelines. Every field has a serde default, so an
//! empty JSON object is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ColshapeError, Result};
use crate::patterns::DetectorKind;

//==================================================================================
// I. Row Format
//==================================================================================

/// How rows are laid out in the delimited text files (data and null mask).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RowFormat {
    /// Field delimiter.
    pub delimiter: String,
    /// The literal that stands for SQL NULL.
    pub null_token: String,
}

impl Default for RowFormat {
    fn default() -> Self {
        Self {
            delimiter: "|".to_string(),
            null_token: "null".to_string(),
        }
    }
}

//==================================================================================
// II. Pattern Detector Parameters
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConstantConfig {
    /// Minimum share of non-null rows the dominant value must cover.
    pub min_constant_ratio: f64,
}

impl Default for ConstantConfig {
    fn default() -> Self {
        Self {
            min_constant_ratio: 0.9,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DictionaryConfig {
    /// Budget, in bytes of key text, for the dictionary contents.
    pub max_dict_size: usize,
    /// Maximum ratio of distinct keys to non-null rows for a column to count
    /// as low-cardinality.
    pub max_key_ratio: f64,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            max_dict_size: 64 * 1024,
            max_key_ratio: 0.1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct NumberAsStringConfig {
    pub max_prefix_len: usize,
    pub max_suffix_len: usize,
}

impl Default for NumberAsStringConfig {
    fn default() -> Self {
        Self {
            max_prefix_len: 8,
            max_suffix_len: 8,
        }
    }
}

/// A named character class for `CharSetSplit`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CharSet {
    pub name: String,
    pub placeholder: char,
    pub chars: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CharSetSplitConfig {
    /// Placeholder for characters that belong to none of `char_sets`.
    pub default_placeholder: char,
    pub char_sets: Vec<CharSet>,
    /// Skip patterns made of a single run (splitting them yields nothing).
    pub drop_single_char_pattern: bool,
}

impl Default for CharSetSplitConfig {
    fn default() -> Self {
        Self {
            default_placeholder: '?',
            char_sets: vec![CharSet {
                name: "digits".to_string(),
                placeholder: 'D',
                chars: "0123456789".to_string(),
            }],
            drop_single_char_pattern: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ColumnCorrelationConfig {
    /// Minimum share of rows the majority mapping must explain.
    pub min_correlation: f64,
}

impl Default for ColumnCorrelationConfig {
    fn default() -> Self {
        Self {
            min_correlation: 0.9,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct DetectorsConfig {
    pub constant: ConstantConfig,
    pub dictionary: DictionaryConfig,
    pub number_as_string: NumberAsStringConfig,
    pub char_set_split: CharSetSplitConfig,
    pub column_correlation: ColumnCorrelationConfig,
}

//==================================================================================
// III. Builder & Validation
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BuilderConfig {
    /// Candidates covering fewer rows than this are never selected.
    pub min_col_coverage: f64,
    /// Maximum number of levels in a built tree.
    pub max_depth: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            min_col_coverage: 0.2,
            max_depth: 3,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ValidationConfig {
    /// Abort decompression on the first reconstructed row that differs.
    pub stop_on_first_mismatch: bool,
}

//==================================================================================
// IV. The Unified ColshapeConfig
//==================================================================================

/// The unified configuration for detection, tree building and both apply pipelines.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ColshapeConfig {
    pub format: RowFormat,
    pub detectors: DetectorsConfig,
    /// Detectors run at every level, in this order. The position of a detector
    /// in this list is its detector id in derived column names.
    pub enabled_detectors: Vec<DetectorKind>,
    pub builder: BuilderConfig,
    pub validation: ValidationConfig,
    /// Drop rows with a wrong field count instead of aborting the run.
    pub skip_invalid_rows: bool,
}

impl Default for ColshapeConfig {
    fn default() -> Self {
        Self {
            format: RowFormat::default(),
            detectors: DetectorsConfig::default(),
            enabled_detectors: DetectorKind::ALL.to_vec(),
            builder: BuilderConfig::default(),
            validation: ValidationConfig::default(),
            skip_invalid_rows: false,
        }
    }
}

impl ColshapeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Rejects settings that would make row parsing or detection meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.format.delimiter.is_empty() {
            return Err(ColshapeError::Config("delimiter must not be empty".into()));
        }
        let ratios = [
            ("constant.min_constant_ratio", self.detectors.constant.min_constant_ratio),
            ("dictionary.max_key_ratio", self.detectors.dictionary.max_key_ratio),
            (
                "column_correlation.min_correlation",
                self.detectors.column_correlation.min_correlation,
            ),
            ("builder.min_col_coverage", self.builder.min_col_coverage),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(ColshapeError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        let css = &self.detectors.char_set_split;
        for set in &css.char_sets {
            if set.placeholder == css.default_placeholder {
                return Err(ColshapeError::Config(format!(
                    "char set '{}' reuses the default placeholder '{}'",
                    set.name, set.placeholder
                )));
            }
        }
        Ok(())
    }
}
