//! Kernels for functional dependencies between two dictionary-coded columns.

use hashbrown::HashMap;

use crate::error::PatternNotApplicable;

/// Forward operator: checks that `target` is what the learned mapping predicts
/// for `source`. On success the target value is dropped entirely.
#[derive(Debug, Clone)]
pub struct CorrelationEncoder {
    mapping: HashMap<String, String>,
    null_token: String,
}

impl CorrelationEncoder {
    pub fn new<'a, I>(mapping: I, null_token: &str) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        Self {
            mapping: mapping
                .into_iter()
                .map(|(s, t)| (s.clone(), t.clone()))
                .collect(),
            null_token: null_token.to_string(),
        }
    }

    pub fn apply(&self, values: &[&str]) -> Result<Vec<String>, PatternNotApplicable> {
        let (source, target) = (values[0], values[1]);
        if source == self.null_token || target == self.null_token {
            return Err(PatternNotApplicable("null value"));
        }
        match self.mapping.get(source) {
            Some(expected) if expected == target => Ok(Vec::new()),
            Some(_) => Err(PatternNotApplicable("target differs from mapping")),
            None => Err(PatternNotApplicable("source not in mapping")),
        }
    }
}

/// Inverse operator: looks the target up by source.
#[derive(Debug, Clone)]
pub struct CorrelationDecoder {
    mapping: HashMap<String, String>,
    null_token: String,
}

impl CorrelationDecoder {
    pub fn new<'a, I>(mapping: I, null_token: &str) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        Self {
            mapping: mapping
                .into_iter()
                .map(|(s, t)| (s.clone(), t.clone()))
                .collect(),
            null_token: null_token.to_string(),
        }
    }

    pub fn apply(&self, values: &[&str]) -> Result<Vec<String>, PatternNotApplicable> {
        let source = values[0];
        if source == self.null_token {
            return Err(PatternNotApplicable("null source"));
        }
        self.mapping
            .get(source)
            .map(|t| vec![t.clone()])
            .ok_or(PatternNotApplicable("source not in mapping"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_mapping_validates_and_restores() {
        let mapping: BTreeMap<String, String> = [("0", "1"), ("1", "0")]
            .into_iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect();
        let enc = CorrelationEncoder::new(&mapping, "null");
        let dec = CorrelationDecoder::new(&mapping, "null");

        assert_eq!(enc.apply(&["0", "1"]), Ok(vec![]));
        assert!(enc.apply(&["0", "0"]).is_err());
        assert!(enc.apply(&["2", "0"]).is_err());
        assert!(enc.apply(&["0", "null"]).is_err());

        assert_eq!(dec.apply(&["1"]).unwrap(), vec!["0".to_string()]);
        assert!(dec.apply(&["2"]).is_err());
        assert!(dec.apply(&["null"]).is_err());
    }
}
