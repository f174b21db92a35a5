//! Kernels for the constant pattern: the value is implied, nothing is stored.

use crate::error::PatternNotApplicable;

/// Forward operator: accepts only the constant and emits no output value.
#[derive(Debug, Clone)]
pub struct ConstantEncoder {
    value: String,
    null_token: String,
}

impl ConstantEncoder {
    pub fn new(value: &str, null_token: &str) -> Self {
        Self {
            value: value.to_string(),
            null_token: null_token.to_string(),
        }
    }

    pub fn apply(&self, values: &[&str]) -> Result<Vec<String>, PatternNotApplicable> {
        let attr = values[0];
        if attr == self.null_token {
            return Err(PatternNotApplicable("null value"));
        }
        if attr != self.value {
            return Err(PatternNotApplicable("value differs from constant"));
        }
        Ok(Vec::new())
    }
}

/// Inverse operator: always yields the constant. Rows that did not match were
/// routed to the exception column and are restored from there first.
#[derive(Debug, Clone)]
pub struct ConstantDecoder {
    value: String,
}

impl ConstantDecoder {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }

    pub fn apply(&self, _values: &[&str]) -> Result<Vec<String>, PatternNotApplicable> {
        Ok(vec![self.value.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_accepts_only_the_constant() {
        let enc = ConstantEncoder::new("X", "null");
        assert_eq!(enc.apply(&["X"]), Ok(vec![]));
        assert!(enc.apply(&["Y"]).is_err());
        assert!(enc.apply(&["null"]).is_err());
    }

    #[test]
    fn test_decoder_restores_the_constant() {
        let dec = ConstantDecoder::new("X");
        assert_eq!(dec.apply(&[]), Ok(vec!["X".to_string()]));
    }
}
