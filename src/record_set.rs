//! Delimited record sets: a header row followed by data rows of the same arity.

use std::io::{self, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};

use crate::types::{ColumnIndex, Row};

/// In-memory record set parsed from a delimited file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordSet {
    /// Column names in order. Empty only for an empty file.
    pub header: Row,
    /// Data rows in file order.
    pub rows: Vec<Row>,
}

impl RecordSet {
    /// Build a record set from a header and rows.
    pub fn new(header: Row, rows: Vec<Row>) -> Self {
        Self { header, rows }
    }

    /// Parse `path`, treating the first record as the header.
    ///
    /// Rows may be narrower than the header: aggregated record sets keep the
    /// source header while emitting only group and aggregate columns.
    pub fn read(path: &Path, delimiter: u8) -> io::Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_path(path)
            .map_err(io::Error::from)?;
        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record
                .map_err(io::Error::from)?
                .iter()
                .map(str::to_string)
                .collect(),
            None => return Ok(Self::default()),
        };
        let mut rows = Vec::new();
        for record in records {
            let record = record.map_err(io::Error::from)?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { header, rows })
    }

    /// Write the header line first, then every data row.
    ///
    /// Rows narrower than the header are written as-is.
    pub fn write_to<W: Write>(&self, writer: W, delimiter: u8) -> io::Result<()> {
        let mut writer = WriterBuilder::new()
            .flexible(true)
            .delimiter(delimiter)
            .from_writer(writer);
        if !self.header.is_empty() {
            writer.write_record(&self.header).map_err(io::Error::from)?;
        }
        for row in &self.rows {
            writer.write_record(row).map_err(io::Error::from)?;
        }
        writer.flush()
    }

    /// Number of columns declared by the header.
    pub fn arity(&self) -> usize {
        self.header.len()
    }

    /// Number of lines including the header (`0` for an empty file).
    pub fn line_count(&self) -> usize {
        if self.header.is_empty() && self.rows.is_empty() {
            0
        } else {
            self.rows.len() + 1
        }
    }
}

/// Count records in `path`, header included, without keeping them in memory.
pub fn count_rows(path: &Path, delimiter: u8) -> io::Result<usize> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(io::Error::from)?;
    let mut record = csv::ByteRecord::new();
    let mut count = 0usize;
    while reader.read_byte_record(&mut record).map_err(io::Error::from)? {
        count += 1;
    }
    Ok(count)
}

/// Read only the header line of `path` (empty for an empty file).
pub fn read_header(path: &Path, delimiter: u8) -> io::Result<Row> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(io::Error::from)?;
    match reader.records().next() {
        Some(record) => Ok(record
            .map_err(io::Error::from)?
            .iter()
            .map(str::to_string)
            .collect()),
        None => Ok(Row::new()),
    }
}

/// Field at `idx`, or empty when the row is narrower than the header.
pub fn field(row: &Row, idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

/// Translate a 1-based descriptor column into a 0-based offset, if in range.
pub fn column_offset(column: ColumnIndex, arity: usize) -> Option<usize> {
    if column == 0 || column > arity {
        None
    } else {
        Some(column - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn read_splits_header_from_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("result.csv");
        fs::write(&path, "a,b,c\n1,2,3\n4,5,6\n").unwrap();
        let set = RecordSet::read(&path, b',').unwrap();
        assert_eq!(set.header, vec!["a", "b", "c"]);
        assert_eq!(set.rows.len(), 2);
        assert_eq!(set.rows[1], vec!["4", "5", "6"]);
        assert_eq!(set.line_count(), 3);
    }

    #[test]
    fn empty_file_has_no_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();
        let set = RecordSet::read(&path, b',').unwrap();
        assert!(set.header.is_empty());
        assert_eq!(set.line_count(), 0);
        assert_eq!(count_rows(&path, b',').unwrap(), 0);
    }

    #[test]
    fn narrow_rows_read_as_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("narrow.csv");
        fs::write(&path, "a,b,c\nus,3\n").unwrap();
        let set = RecordSet::read(&path, b',').unwrap();
        assert_eq!(set.arity(), 3);
        assert_eq!(field(&set.rows[0], 1), "3");
        assert_eq!(field(&set.rows[0], 2), "");
    }

    #[test]
    fn write_quotes_fields_containing_the_delimiter() {
        let set = RecordSet::new(
            vec!["name".into(), "note".into()],
            vec![vec!["x".into(), "a,b".into()]],
        );
        let mut buf = Vec::new();
        set.write_to(&mut buf, b',').unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "name,note\nx,\"a,b\"\n");
    }

    #[test]
    fn write_keeps_rows_narrower_than_the_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grouped.csv");
        let set = RecordSet::new(
            vec!["zone".into(), "host".into(), "bytes".into()],
            vec![vec!["us".into(), "2".into()], vec!["eu".into()]],
        );
        set.write_to(fs::File::create(&path).unwrap(), b',').unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "zone,host,bytes\nus,2\neu\n");
        assert_eq!(RecordSet::read(&path, b',').unwrap(), set);
    }

    #[test]
    fn count_rows_includes_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("result.csv");
        fs::write(&path, "a\n1\n2\n").unwrap();
        assert_eq!(count_rows(&path, b',').unwrap(), 3);
    }

    #[test]
    fn read_header_stops_at_first_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("result.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();
        assert_eq!(read_header(&path, b',').unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn column_offset_is_one_based() {
        assert_eq!(column_offset(1, 3), Some(0));
        assert_eq!(column_offset(3, 3), Some(2));
        assert_eq!(column_offset(0, 3), None);
        assert_eq!(column_offset(4, 3), None);
    }
}
