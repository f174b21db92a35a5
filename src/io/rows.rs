//! Lazy delimited-row reading and writing.

use std::io::{BufRead, Write};

use crate::error::Result;

/// Reads one row per line, splitting on the field delimiter.
/// Rows are produced lazily; nothing beyond the current line is buffered.
pub struct RowReader<R: BufRead> {
    inner: R,
    delimiter: String,
    line: String,
    line_no: u64,
}

impl<R: BufRead> RowReader<R> {
    pub fn new(inner: R, delimiter: &str) -> Self {
        Self {
            inner,
            delimiter: delimiter.to_string(),
            line: String::new(),
            line_no: 0,
        }
    }

    /// 1-based number of the last line read.
    pub fn line_no(&self) -> u64 {
        self.line_no
    }

    /// Reads the next line without splitting it, minus its line terminator.
    pub fn next_line(&mut self) -> Result<Option<&str>> {
        self.line.clear();
        if self.inner.read_line(&mut self.line)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        let trimmed = self.line.trim_end_matches(['\n', '\r']).len();
        self.line.truncate(trimmed);
        Ok(Some(&self.line))
    }

    pub fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        let delimiter = self.delimiter.clone();
        Ok(self
            .next_line()?
            .map(|line| line.split(delimiter.as_str()).map(str::to_string).collect()))
    }
}

impl<R: BufRead> Iterator for RowReader<R> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

/// Writes rows as delimited lines.
pub struct RowWriter<W: Write> {
    inner: W,
    delimiter: String,
    rows_written: u64,
}

impl<W: Write> RowWriter<W> {
    pub fn new(inner: W, delimiter: &str) -> Self {
        Self {
            inner,
            delimiter: delimiter.to_string(),
            rows_written: 0,
        }
    }

    pub fn write_row<S: AsRef<str>>(&mut self, row: &[S]) -> Result<()> {
        for (i, field) in row.iter().enumerate() {
            if i > 0 {
                self.inner.write_all(self.delimiter.as_bytes())?;
            }
            self.inner.write_all(field.as_ref().as_bytes())?;
        }
        self.inner.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reader_strips_line_endings() {
        let data = "a|b|c\r\nd||f\n\nlast";
        let rows: Vec<Vec<String>> = RowReader::new(Cursor::new(data), "|")
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["a", "b", "c"],
                vec!["d", "", "f"],
                vec![""],
                vec!["last"],
            ]
        );
    }

    #[test]
    fn test_writer_joins_fields() {
        let mut writer = RowWriter::new(Vec::new(), ",");
        writer.write_row(&["1", "x"]).unwrap();
        writer.write_row(&Vec::<String>::new()).unwrap();
        assert_eq!(writer.rows_written(), 2);
        assert_eq!(String::from_utf8(writer.into_inner()).unwrap(), "1,x\n\n");
    }
}
