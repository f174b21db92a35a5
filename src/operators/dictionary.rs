//! Kernels for dictionary coding: string keys to dense integer codes and back.

use hashbrown::HashMap;

use crate::error::PatternNotApplicable;

#[derive(Debug, Clone)]
pub struct DictionaryEncoder {
    codes: HashMap<String, u64>,
    null_token: String,
}

impl DictionaryEncoder {
    /// `keys[i]` is encoded as code `i`.
    pub fn new(keys: &[String], null_token: &str) -> Self {
        let codes = keys
            .iter()
            .enumerate()
            .map(|(code, key)| (key.clone(), code as u64))
            .collect();
        Self {
            codes,
            null_token: null_token.to_string(),
        }
    }

    pub fn apply(&self, values: &[&str]) -> Result<Vec<String>, PatternNotApplicable> {
        let attr = values[0];
        if attr == self.null_token {
            return Err(PatternNotApplicable("null value"));
        }
        match self.codes.get(attr) {
            Some(code) => Ok(vec![code.to_string()]),
            None => Err(PatternNotApplicable("value not in dictionary")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DictionaryDecoder {
    keys: HashMap<u64, String>,
    null_token: String,
}

impl DictionaryDecoder {
    pub fn new<'a, I>(entries: I, null_token: &str) -> Self
    where
        I: IntoIterator<Item = (&'a u64, &'a String)>,
    {
        Self {
            keys: entries
                .into_iter()
                .map(|(code, key)| (*code, key.clone()))
                .collect(),
            null_token: null_token.to_string(),
        }
    }

    pub fn apply(&self, values: &[&str]) -> Result<Vec<String>, PatternNotApplicable> {
        let attr = values[0];
        if attr == self.null_token {
            return Err(PatternNotApplicable("null code"));
        }
        let code: u64 = attr
            .parse()
            .map_err(|_| PatternNotApplicable("malformed dictionary code"))?;
        match self.keys.get(&code) {
            Some(key) => Ok(vec![key.clone()]),
            None => Err(PatternNotApplicable("code not in dictionary")),
        }
    }
}
