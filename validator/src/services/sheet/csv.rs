//! Form responses stored as a delimited text export.
//!
//! The sheet is read in full on [`SheetStore::read_rows`]: the header line picks
//! the delimiter, the configured header titles locate the username, timestamp and
//! status columns, and an MD5 digest of the bytes is kept.
//!
//! A status write rewrites the whole file. Since the form keeps appending rows
//! while a run is in progress, every write first re-digests the file. When the
//! digest changed, the file is parsed again and the target row must still hold
//! the same submission (timestamp and username), still without a terminal
//! status, before its status is set. The rewrite goes through a temporary file in the same directory and a rename, so
//! a crash never leaves a half-written sheet behind.
//!
//! Cells are kept as raw bytes. Only the username, timestamp and status cells
//! are decoded, lossily, so a row pasted in another encoding is validated like
//! any other row and written back unchanged.

use super::{SheetError, SheetStore};
use common::model::response::FormResponse;
use common::model::status::ResponseStatus;
use log::debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Header titles of the columns the validator reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetColumns {
    pub username: String,
    pub timestamp: String,
    pub status: String,
}

impl Default for SheetColumns {
    fn default() -> Self {
        Self {
            username: "Username".to_string(),
            timestamp: "Timestamp".to_string(),
            status: "Status".to_string(),
        }
    }
}

pub struct CsvSheet {
    path: PathBuf,
    columns: SheetColumns,
    loaded: Option<LoadedSheet>,
}

/// Parsed content of the file plus what is needed to write it back unchanged.
#[derive(Debug, Clone)]
struct LoadedSheet {
    digest: String,
    delimiter: u8,
    headers: Vec<Vec<u8>>,
    records: Vec<Vec<Vec<u8>>>,
    username_idx: usize,
    timestamp_idx: Option<usize>,
    status_idx: Option<usize>,
}

/// Picks the delimiter that occurs most often in the header line.
pub fn detect_delimiter(header_line: &str) -> u8 {
    [b',', b';', b'\t', b'|']
        .iter()
        .copied()
        .max_by_key(|&d| header_line.matches(d as char).count())
        .filter(|&d| header_line.contains(d as char))
        .unwrap_or(b',')
}

fn digest_of(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

fn normalize_title(title: &str) -> &str {
    title.trim_start_matches('\u{feff}').trim()
}

fn cell(record: &[Vec<u8>], idx: Option<usize>) -> String {
    idx.and_then(|i| record.get(i))
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default()
}

impl CsvSheet {
    pub fn new(path: impl Into<PathBuf>, columns: SheetColumns) -> Self {
        Self {
            path: path.into(),
            columns,
            loaded: None,
        }
    }

    fn io_error(&self, source: std::io::Error) -> SheetError {
        SheetError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_error(&self, source: ::csv::Error) -> SheetError {
        SheetError::Csv {
            path: self.path.clone(),
            source,
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<LoadedSheet, SheetError> {
        let header_line = bytes
            .split(|&b| b == b'\n')
            .next()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .unwrap_or_default();
        let delimiter = detect_delimiter(&header_line);

        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<Vec<u8>> = reader
            .byte_headers()
            .map_err(|e| self.csv_error(e))?
            .iter()
            .map(<[u8]>::to_vec)
            .collect();

        let find = |title: &str| {
            headers
                .iter()
                .position(|h| normalize_title(&String::from_utf8_lossy(h)) == title.trim())
        };
        let username_idx = find(&self.columns.username)
            .ok_or_else(|| SheetError::MissingColumn(self.columns.username.clone()))?;
        let timestamp_idx = find(&self.columns.timestamp);
        let status_idx = find(&self.columns.status);

        let mut records = Vec::new();
        for record in reader.byte_records() {
            let record = record.map_err(|e| self.csv_error(e))?;
            records.push(record.iter().map(<[u8]>::to_vec).collect());
        }

        Ok(LoadedSheet {
            digest: digest_of(bytes),
            delimiter,
            headers,
            records,
            username_idx,
            timestamp_idx,
            status_idx,
        })
    }

    fn load(&self) -> Result<LoadedSheet, SheetError> {
        let bytes = fs::read(&self.path).map_err(|e| self.io_error(e))?;
        self.parse(&bytes)
    }

    fn serialize(&self, sheet: &LoadedSheet) -> Result<Vec<u8>, SheetError> {
        let mut writer = ::csv::WriterBuilder::new()
            .delimiter(sheet.delimiter)
            .flexible(true)
            .from_writer(Vec::new());
        writer
            .write_record(&sheet.headers)
            .map_err(|e| self.csv_error(e))?;
        for record in &sheet.records {
            writer.write_record(record).map_err(|e| self.csv_error(e))?;
        }
        writer
            .into_inner()
            .map_err(|e| self.io_error(e.into_error()))
    }

    fn persist(&self, bytes: &[u8]) -> Result<(), SheetError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(bytes).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }
}

impl LoadedSheet {
    fn response(&self, row_index: usize) -> Option<FormResponse> {
        self.records.get(row_index).map(|record| FormResponse {
            row_index,
            timestamp: cell(record, self.timestamp_idx),
            username: cell(record, Some(self.username_idx)),
            status: ResponseStatus::from_cell(&cell(record, self.status_idx)),
        })
    }

    fn responses(&self) -> Vec<FormResponse> {
        (0..self.records.len())
            .filter_map(|row_index| self.response(row_index))
            .collect()
    }

    /// Index of the status column, appending it to the header when missing.
    fn ensure_status_column(&mut self, title: &str) -> usize {
        if let Some(idx) = self.status_idx {
            return idx;
        }
        self.headers.push(title.trim().as_bytes().to_vec());
        let idx = self.headers.len() - 1;
        self.status_idx = Some(idx);
        idx
    }

    fn set_cell(&mut self, row_index: usize, col: usize, value: &str) {
        if let Some(record) = self.records.get_mut(row_index) {
            if record.len() <= col {
                record.resize(col + 1, Vec::new());
            }
            record[col] = value.as_bytes().to_vec();
        }
    }
}

impl SheetStore for CsvSheet {
    fn read_rows(&mut self) -> Result<Vec<FormResponse>, SheetError> {
        let sheet = self.load()?;
        let rows = sheet.responses();
        debug!(
            "Read {} row(s) from {} (delimiter {:?})",
            rows.len(),
            self.path.display(),
            sheet.delimiter as char
        );
        self.loaded = Some(sheet);
        Ok(rows)
    }

    fn write_status(
        &mut self,
        row_index: usize,
        status: &ResponseStatus,
    ) -> Result<(), SheetError> {
        let loaded = self.loaded.as_ref().ok_or(SheetError::NotLoaded)?;
        let expected = loaded
            .response(row_index)
            .ok_or(SheetError::NoSuchRow(row_index))?;

        let bytes = fs::read(&self.path).map_err(|e| self.io_error(e))?;
        let mut sheet = if digest_of(&bytes) == loaded.digest {
            loaded.clone()
        } else {
            debug!(
                "{} changed since it was read, reloading before writing row {}",
                self.path.display(),
                row_index
            );
            let fresh = self.parse(&bytes)?;
            match fresh.response(row_index) {
                Some(current)
                    if current.same_submission(&expected) && !current.status.is_terminal() =>
                {
                    fresh
                }
                _ => return Err(SheetError::RowChanged(row_index)),
            }
        };

        let col = sheet.ensure_status_column(&self.columns.status);
        sheet.set_cell(row_index, col, status.as_cell());

        let out = self.serialize(&sheet)?;
        self.persist(&out)?;
        sheet.digest = digest_of(&out);
        self.loaded = Some(sheet);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_is_the_most_frequent_candidate() {
        assert_eq!(detect_delimiter("Timestamp,Username,Status"), b',');
        assert_eq!(detect_delimiter("Timestamp;Username;Status"), b';');
        assert_eq!(detect_delimiter("Timestamp\tUsername"), b'\t');
        assert_eq!(detect_delimiter("Username"), b',');
    }

    #[test]
    fn titles_drop_bom_and_padding() {
        assert_eq!(normalize_title("\u{feff}Timestamp "), "Timestamp");
        assert_eq!(normalize_title("  Username"), "Username");
    }

    #[test]
    fn parse_locates_columns_and_statuses() {
        let sheet = CsvSheet::new("unused.csv", SheetColumns::default());
        let loaded = sheet
            .parse(b"Timestamp,Username,Status\n1/2/2025 10:00:00,alice,\n1/2/2025 11:00:00,bob,valid\n")
            .unwrap();

        let rows = loaded.responses();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].username, "alice");
        assert_eq!(rows[0].timestamp, "1/2/2025 10:00:00");
        assert_eq!(rows[0].status, ResponseStatus::Unprocessed);
        assert_eq!(rows[1].row_index, 1);
        assert_eq!(rows[1].status, ResponseStatus::Valid);
    }

    #[test]
    fn parse_without_username_column_fails() {
        let sheet = CsvSheet::new("unused.csv", SheetColumns::default());
        let err = sheet.parse(b"Timestamp,Email\nx,y\n").unwrap_err();
        assert!(matches!(err, SheetError::MissingColumn(title) if title == "Username"));
    }

    #[test]
    fn short_records_read_as_unprocessed() {
        let sheet = CsvSheet::new("unused.csv", SheetColumns::default());
        let loaded = sheet.parse(b"Timestamp,Username,Status\nt1,carol\n").unwrap();
        let rows = loaded.responses();
        assert_eq!(rows[0].status, ResponseStatus::Unprocessed);
    }

    #[test]
    fn undecodable_cells_do_not_fail_the_parse() {
        let sheet = CsvSheet::new("unused.csv", SheetColumns::default());
        let loaded = sheet
            .parse(b"Timestamp,Username,Status\nt1,alice,\nt2,Jos\xe9,\n")
            .unwrap();
        let rows = loaded.responses();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].username, "Jos\u{fffd}");
        assert_eq!(loaded.records[1][1], b"Jos\xe9".to_vec());
    }

    #[test]
    fn write_before_read_fails() {
        let mut sheet = CsvSheet::new("unused.csv", SheetColumns::default());
        let err = sheet.write_status(0, &ResponseStatus::Valid).unwrap_err();
        assert!(matches!(err, SheetError::NotLoaded));
    }
}
