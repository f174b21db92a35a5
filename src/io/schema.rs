//! Schema collaborators: where the positional column list comes from.

use std::io::BufRead;
use std::path::Path;

use super::rows::RowReader;
use crate::error::{ColshapeError, Result};
use crate::types::{Column, DataType};

/// Supplies the columns of a table, in positional order.
pub trait SchemaSource {
    fn columns(&self) -> Result<Vec<Column>>;
}

/// A header line of column names plus a line of SQL datatypes.
/// Column ids are the positions `"0"`, `"1"`, ...
#[derive(Debug, Clone)]
pub struct HeaderSchema {
    names: Vec<String>,
    datatypes: Vec<String>,
}

impl HeaderSchema {
    pub fn from_lines(header: &str, datatypes: &str, delimiter: &str) -> Self {
        let split = |line: &str| -> Vec<String> {
            line.split(delimiter).map(|s| s.trim().to_string()).collect()
        };
        Self {
            names: split(header),
            datatypes: split(datatypes),
        }
    }

    /// Reads the first line of each source.
    pub fn from_readers<H: BufRead, D: BufRead>(
        header: H,
        datatypes: D,
        delimiter: &str,
    ) -> Result<Self> {
        let mut header = RowReader::new(header, delimiter);
        let mut datatypes = RowReader::new(datatypes, delimiter);
        let names = header.next_line()?.map(str::to_string).unwrap_or_default();
        let types = datatypes.next_line()?.map(str::to_string).unwrap_or_default();
        Ok(Self::from_lines(&names, &types, delimiter))
    }

    pub fn from_files<P: AsRef<Path>>(
        header_file: P,
        datatypes_file: P,
        delimiter: &str,
    ) -> Result<Self> {
        let open = |p: P| -> Result<_> { Ok(std::io::BufReader::new(std::fs::File::open(p)?)) };
        Self::from_readers(open(header_file)?, open(datatypes_file)?, delimiter)
    }
}

impl SchemaSource for HeaderSchema {
    fn columns(&self) -> Result<Vec<Column>> {
        if self.names.len() != self.datatypes.len() {
            return Err(ColshapeError::SchemaMismatch(format!(
                "header has {} columns but {} datatypes were given",
                self.names.len(),
                self.datatypes.len()
            )));
        }
        self.names
            .iter()
            .zip(&self.datatypes)
            .enumerate()
            .map(|(idx, (name, sql))| -> Result<Column> {
                let datatype = DataType::from_sql_str(sql)?;
                Ok(Column::new(idx.to_string(), name.clone(), datatype))
            })
            .collect()
    }
}
