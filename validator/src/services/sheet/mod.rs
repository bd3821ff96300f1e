//! Access to the sheet holding the form responses.
//!
//! The validator only needs two operations from a sheet: read every row, and
//! write the status cell of one row. [`SheetStore`] captures exactly that, so the
//! validator does not care whether the rows come from a file export
//! ([`csv::CsvSheet`]) or from memory ([`memory::MemorySheet`]).

pub mod csv;
pub mod memory;

use common::model::response::FormResponse;
use common::model::status::ResponseStatus;
use std::path::PathBuf;
use thiserror::Error;

pub use self::csv::{CsvSheet, SheetColumns};
pub use self::memory::MemorySheet;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("failed to access sheet '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse sheet '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: ::csv::Error,
    },
    #[error("sheet has no '{0}' column")]
    MissingColumn(String),
    #[error("sheet has no row {0}")]
    NoSuchRow(usize),
    #[error("row {0} changed since it was read")]
    RowChanged(usize),
    #[error("sheet must be read before it can be written")]
    NotLoaded,
    #[error("write to row {0} rejected")]
    Rejected(usize),
}

/// Row-oriented access to the responses sheet.
pub trait SheetStore {
    /// Returns every data row in insertion order.
    fn read_rows(&mut self) -> Result<Vec<FormResponse>, SheetError>;

    /// Persists `status` into the status cell of the row at `row_index`.
    fn write_status(&mut self, row_index: usize, status: &ResponseStatus)
        -> Result<(), SheetError>;
}
