use super::{SheetError, SheetStore};
use common::model::response::FormResponse;
use common::model::status::ResponseStatus;
use std::collections::HashSet;

/// A sheet kept entirely in memory.
///
/// Every successful write is appended to a journal so callers can check how
/// many writes a run performed and in which order.
#[derive(Debug, Default)]
pub struct MemorySheet {
    rows: Vec<FormResponse>,
    writes: Vec<(usize, ResponseStatus)>,
    rejected_rows: HashSet<usize>,
}

impl MemorySheet {
    pub fn new(rows: Vec<FormResponse>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    /// Builds a sheet from `(username, status)` pairs; row indexes follow the order.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, ResponseStatus)>) -> Self {
        let rows = pairs
            .into_iter()
            .enumerate()
            .map(|(row_index, (username, status))| FormResponse::new(row_index, username, status))
            .collect();
        Self::new(rows)
    }

    /// Makes every write to `row_index` fail with [`SheetError::Rejected`].
    pub fn reject_writes_to(mut self, row_index: usize) -> Self {
        self.rejected_rows.insert(row_index);
        self
    }

    pub fn rows(&self) -> &[FormResponse] {
        &self.rows
    }

    pub fn status_of(&self, row_index: usize) -> Option<&ResponseStatus> {
        self.rows.get(row_index).map(|row| &row.status)
    }

    pub fn writes(&self) -> &[(usize, ResponseStatus)] {
        &self.writes
    }
}

impl SheetStore for MemorySheet {
    fn read_rows(&mut self) -> Result<Vec<FormResponse>, SheetError> {
        Ok(self.rows.clone())
    }

    fn write_status(
        &mut self,
        row_index: usize,
        status: &ResponseStatus,
    ) -> Result<(), SheetError> {
        if self.rejected_rows.contains(&row_index) {
            return Err(SheetError::Rejected(row_index));
        }
        let row = self
            .rows
            .get_mut(row_index)
            .ok_or(SheetError::NoSuchRow(row_index))?;
        row.status = status.clone();
        self.writes.push((row_index, status.clone()));
        Ok(())
    }
}
