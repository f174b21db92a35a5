//! Null-mask rows: one bit per column marking values that were deliberately null.
//! On disk a mask row is a delimited line of `0`/`1`.

use bitvec::prelude::*;

use crate::error::{ColshapeError, Result};

pub fn null_mask<S: AsRef<str>>(row: &[S], null_token: &str) -> BitVec {
    row.iter().map(|v| v.as_ref() == null_token).collect()
}

pub fn format_null_mask(mask: &BitSlice, delimiter: &str) -> String {
    let mut out = String::with_capacity(mask.len() * (1 + delimiter.len()));
    for (i, bit) in mask.iter().by_vals().enumerate() {
        if i > 0 {
            out.push_str(delimiter);
        }
        out.push(if bit { '1' } else { '0' });
    }
    out
}

pub fn parse_null_mask(line: &str, delimiter: &str) -> Result<BitVec> {
    if line.is_empty() {
        return Ok(BitVec::new());
    }
    line.split(delimiter)
        .map(|field| match field {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(ColshapeError::SchemaMismatch(format!(
                "invalid null mask field '{}'",
                other
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_text_round_trip() {
        let mask = null_mask(&["a", "null", "c", "null"], "null");
        assert_eq!(mask.count_ones(), 2);
        assert!(mask[1] && mask[3]);
        let line = format_null_mask(&mask, "|");
        assert_eq!(line, "0|1|0|1");
        assert_eq!(parse_null_mask(&line, "|").unwrap(), mask);
    }

    #[test]
    fn test_malformed_mask_is_rejected() {
        assert!(parse_null_mask("0|x", "|").is_err());
        assert!(parse_null_mask("", "|").unwrap().is_empty());
    }
}
