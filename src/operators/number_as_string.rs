//! Kernels for numeric strings: `"$007.50"` is stored as the number `7.5`
//! plus the literal prefix `"$00"` and suffix `"0"`.
//!
//! The parser is shared with the detector so that everything the detector
//! counts as a match is exactly what the forward operator accepts.

use crate::error::PatternNotApplicable;

/// The three pieces of a numeric string. `prefix + number + suffix` is always
/// the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberParts<'a> {
    pub prefix: String,
    pub number: String,
    pub suffix: String,
    /// Digits before the decimal point in `number`.
    pub int_digits: usize,
    /// Digits after the decimal point in `number`.
    pub frac_digits: usize,
    raw: &'a str,
}

impl NumberParts<'_> {
    pub fn prefix_len(&self) -> usize {
        self.prefix.chars().count()
    }

    pub fn suffix_len(&self) -> usize {
        self.suffix.chars().count()
    }

    pub fn original(&self) -> &str {
        self.raw
    }
}

fn is_number_start(c: char) -> bool {
    c.is_ascii_digit() || c == '+' || c == '-' || c == '.'
}

/// Splits `value` into literal prefix, canonical number and literal suffix.
///
/// Returns `None` for anything that is not a plain decimal literal: no digits,
/// exponent notation, digits left in the suffix, a fraction without an integer
/// part, or a negative value whose text is not canonical (`-007`, `-0`).
pub fn split_number(value: &str) -> Option<NumberParts<'_>> {
    let start = value.find(is_number_start)?;
    let literal_prefix = &value[..start];
    let rest = &value[start..];
    let bytes = rest.as_bytes();

    let mut pos = 0;
    let mut sign = None;
    if bytes[0] == b'+' || bytes[0] == b'-' {
        sign = Some(bytes[0] as char);
        pos = 1;
    }

    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let int_part = &rest[int_start..pos];
    if int_part.is_empty() {
        return None;
    }

    let mut has_point = false;
    let frac_start;
    if pos < bytes.len() && bytes[pos] == b'.' {
        has_point = true;
        pos += 1;
        frac_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    } else {
        frac_start = pos;
    }
    let frac_part = &rest[frac_start..pos];
    let literal_suffix = &rest[pos..];
    if literal_suffix.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    // Leading zeros move to the prefix, keeping one digit before the point.
    let significant = int_part.trim_start_matches('0');
    let int_digits_kept = if significant.is_empty() { "0" } else { significant };
    let zeros = &int_part[..int_part.len() - int_digits_kept.len()];

    // Trailing fractional zeros (and a point left dangling) move to the suffix.
    let frac_kept = frac_part.trim_end_matches('0');
    let frac_dropped = &frac_part[frac_kept.len()..];

    let is_zero = int_digits_kept == "0" && frac_kept.is_empty();
    if sign == Some('-') && (!zeros.is_empty() || is_zero) {
        return None;
    }

    let mut prefix = String::with_capacity(literal_prefix.len() + zeros.len() + 1);
    prefix.push_str(literal_prefix);
    if sign == Some('+') {
        prefix.push('+');
    }
    prefix.push_str(zeros);

    let mut number = String::with_capacity(int_part.len() + frac_part.len() + 2);
    if sign == Some('-') {
        number.push('-');
    }
    number.push_str(int_digits_kept);
    if !frac_kept.is_empty() {
        number.push('.');
        number.push_str(frac_kept);
    }

    let mut suffix = String::new();
    if has_point && frac_kept.is_empty() {
        suffix.push('.');
    }
    suffix.push_str(frac_dropped);
    suffix.push_str(literal_suffix);

    Some(NumberParts {
        prefix,
        number,
        suffix,
        int_digits: int_digits_kept.len(),
        frac_digits: frac_kept.len(),
        raw: value,
    })
}

/// Forward operator. Output layout: `[number, prefix?, suffix?]`, where the
/// optional columns exist only when their max length is non-zero.
#[derive(Debug, Clone)]
pub struct NumberAsStringEncoder {
    max_prefix_len: usize,
    max_suffix_len: usize,
    null_token: String,
}

impl NumberAsStringEncoder {
    pub fn new(max_prefix_len: usize, max_suffix_len: usize, null_token: &str) -> Self {
        Self {
            max_prefix_len,
            max_suffix_len,
            null_token: null_token.to_string(),
        }
    }

    pub fn apply(&self, values: &[&str]) -> Result<Vec<String>, PatternNotApplicable> {
        let attr = values[0];
        if attr == self.null_token {
            return Err(PatternNotApplicable("null value"));
        }
        let parts = split_number(attr).ok_or(PatternNotApplicable("not a numeric literal"))?;
        if parts.prefix_len() > self.max_prefix_len {
            return Err(PatternNotApplicable("prefix too long"));
        }
        if parts.suffix_len() > self.max_suffix_len {
            return Err(PatternNotApplicable("suffix too long"));
        }

        let mut out = vec![parts.number];
        if self.max_prefix_len > 0 {
            out.push(parts.prefix);
        }
        if self.max_suffix_len > 0 {
            out.push(parts.suffix);
        }
        Ok(out)
    }
}

/// Inverse operator: `prefix + number + suffix`.
#[derive(Debug, Clone)]
pub struct NumberAsStringDecoder {
    has_prefix: bool,
    has_suffix: bool,
    null_token: String,
}

impl NumberAsStringDecoder {
    pub fn new(max_prefix_len: usize, max_suffix_len: usize, null_token: &str) -> Self {
        Self {
            has_prefix: max_prefix_len > 0,
            has_suffix: max_suffix_len > 0,
            null_token: null_token.to_string(),
        }
    }

    pub fn apply(&self, values: &[&str]) -> Result<Vec<String>, PatternNotApplicable> {
        if values.iter().any(|v| *v == self.null_token) {
            return Err(PatternNotApplicable("null component"));
        }
        let mut it = values.iter();
        let number = it.next().ok_or(PatternNotApplicable("missing number"))?;
        let prefix = if self.has_prefix { it.next().copied() } else { None };
        let suffix = if self.has_suffix { it.next().copied() } else { None };

        let mut res = String::new();
        res.push_str(prefix.unwrap_or(""));
        res.push_str(number);
        res.push_str(suffix.unwrap_or(""));
        Ok(vec![res])
    }
}
