//! Kernels for structural string splitting by character class.
//!
//! Every character maps to the placeholder of its class (e.g. `D` for digits,
//! `?` for anything else). A value's *pattern string* is one placeholder per
//! character; collapsing equal neighbours yields its *run sequence*.
//! `"AB12"` has pattern string `"??DD"` and run sequence `['?', 'D']`.

use hashbrown::HashMap;

use crate::config::CharSet;
use crate::error::PatternNotApplicable;

/// Maps characters to class placeholders.
#[derive(Debug, Clone)]
pub struct CharClassifier {
    classes: HashMap<char, char>,
    default_placeholder: char,
}

impl CharClassifier {
    pub fn new(char_sets: &[CharSet], default_placeholder: char) -> Self {
        let mut classes = HashMap::new();
        for set in char_sets {
            for c in set.chars.chars() {
                // First declared set wins on overlap.
                classes.entry(c).or_insert(set.placeholder);
            }
        }
        Self {
            classes,
            default_placeholder,
        }
    }

    #[inline]
    pub fn placeholder(&self, c: char) -> char {
        self.classes
            .get(&c)
            .copied()
            .unwrap_or(self.default_placeholder)
    }

    pub fn pattern_string(&self, value: &str) -> String {
        value.chars().map(|c| self.placeholder(c)).collect()
    }
}

/// Collapses consecutive equal placeholders: `"??DD?"` becomes `['?', 'D', '?']`.
pub fn run_sequence(pattern: &str) -> Vec<char> {
    let mut runs: Vec<char> = Vec::new();
    for c in pattern.chars() {
        if runs.last() != Some(&c) {
            runs.push(c);
        }
    }
    runs
}

/// Greedily cuts `value` into one segment per run. Fails unless every run gets
/// at least one character and the whole value is consumed.
pub fn segment(
    classifier: &CharClassifier,
    runs: &[char],
    value: &str,
) -> Result<Vec<String>, PatternNotApplicable> {
    let mut segments = Vec::with_capacity(runs.len());
    let mut chars = value.chars().peekable();
    for &run in runs {
        let mut seg = String::new();
        while let Some(&c) = chars.peek() {
            if classifier.placeholder(c) != run {
                break;
            }
            seg.push(c);
            chars.next();
        }
        if seg.is_empty() {
            return Err(PatternNotApplicable("value does not follow the run sequence"));
        }
        segments.push(seg);
    }
    if chars.next().is_some() {
        return Err(PatternNotApplicable("value longer than the run sequence"));
    }
    Ok(segments)
}

#[derive(Debug, Clone)]
pub struct CharSetSplitEncoder {
    classifier: CharClassifier,
    runs: Vec<char>,
    null_token: String,
}

impl CharSetSplitEncoder {
    pub fn new(classifier: CharClassifier, runs: Vec<char>, null_token: &str) -> Self {
        Self {
            classifier,
            runs,
            null_token: null_token.to_string(),
        }
    }

    pub fn apply(&self, values: &[&str]) -> Result<Vec<String>, PatternNotApplicable> {
        let attr = values[0];
        if attr == self.null_token {
            return Err(PatternNotApplicable("null value"));
        }
        segment(&self.classifier, &self.runs, attr)
    }
}

/// Inverse operator: plain concatenation of the segments.
#[derive(Debug, Clone)]
pub struct CharSetSplitDecoder {
    null_token: String,
}

impl CharSetSplitDecoder {
    pub fn new(null_token: &str) -> Self {
        Self {
            null_token: null_token.to_string(),
        }
    }

    pub fn apply(&self, values: &[&str]) -> Result<Vec<String>, PatternNotApplicable> {
        if values.iter().any(|v| *v == self.null_token) {
            return Err(PatternNotApplicable("null segment"));
        }
        Ok(vec![values.concat()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits() -> CharClassifier {
        CharClassifier::new(
            &[CharSet {
                name: "digits".into(),
                placeholder: 'D',
                chars: "0123456789".into(),
            }],
            '?',
        )
    }

    #[test]
    fn test_pattern_string_and_runs() {
        let cls = digits();
        assert_eq!(cls.pattern_string("AB12"), "??DD");
        assert_eq!(run_sequence("??DD"), vec!['?', 'D']);
        assert_eq!(run_sequence("D?D"), vec!['D', '?', 'D']);
        assert!(run_sequence("").is_empty());
    }

    #[test]
    fn test_segment_is_exact() {
        let cls = digits();
        let runs = vec!['?', 'D'];
        assert_eq!(segment(&cls, &runs, "AB12").unwrap(), vec!["AB", "12"]);
        assert_eq!(segment(&cls, &runs, "X7").unwrap(), vec!["X", "7"]);
        assert!(segment(&cls, &runs, "12AB").is_err());
        assert!(segment(&cls, &runs, "AB12C").is_err());
        assert!(segment(&cls, &runs, "AB").is_err());
        assert!(segment(&cls, &runs, "").is_err());
    }

    #[test]
    fn test_encoder_decoder_pair() {
        let enc = CharSetSplitEncoder::new(digits(), vec!['?', 'D'], "null");
        let dec = CharSetSplitDecoder::new("null");
        let parts = enc.apply(&["CD34"]).unwrap();
        let refs: Vec<&str> = parts.iter().map(|s| s.as_str()).collect();
        assert_eq!(dec.apply(&refs).unwrap(), vec!["CD34".to_string()]);
        assert!(enc.apply(&["null"]).is_err());
        assert!(dec.apply(&["CD", "null"]).is_err());
    }
}
