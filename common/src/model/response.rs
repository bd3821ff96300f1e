use crate::model::status::ResponseStatus;
use serde::{Deserialize, Serialize};

/// One form submission as stored in the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormResponse {
    /// 0-based index of the data row (the header row is not counted).
    pub row_index: usize,
    /// Submission timestamp cell, verbatim. Empty when the sheet has no such column.
    pub timestamp: String,
    /// Identifier typed by the submitter, verbatim.
    pub username: String,
    pub status: ResponseStatus,
}

impl FormResponse {
    pub fn new(row_index: usize, username: impl Into<String>, status: ResponseStatus) -> Self {
        Self {
            row_index,
            timestamp: String::new(),
            username: username.into(),
            status,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Trimmed username, as it is sent to the directory.
    pub fn normalized_username(&self) -> &str {
        self.username.trim()
    }

    /// True when `other` describes the same submission, i.e. the same
    /// timestamp and username cells. Status is ignored.
    pub fn same_submission(&self, other: &FormResponse) -> bool {
        self.timestamp == other.timestamp && self.username == other.username
    }
}
