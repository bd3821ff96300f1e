use serde::{Deserialize, Serialize};
use std::fmt;

/// Validation state of a form response, as stored in the sheet's status column.
///
/// `Unprocessed` is the only non-terminal value. Every other value is written
/// at most once and never revisited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Empty status cell.
    #[default]
    Unprocessed,
    Valid,
    InvalidUsername,
    NotRegistered,
    /// The account already belongs to the access team.
    AlreadyGranted,
    /// An invitation to the access team is already waiting for the account.
    PendingInvite,
    /// A non-empty cell the validator does not recognise, typically written by
    /// hand. Treated as terminal so the row is left alone.
    Other(String),
}

impl ResponseStatus {
    /// Statuses the validator itself can write.
    pub const WRITABLE: [ResponseStatus; 5] = [
        ResponseStatus::Valid,
        ResponseStatus::InvalidUsername,
        ResponseStatus::NotRegistered,
        ResponseStatus::AlreadyGranted,
        ResponseStatus::PendingInvite,
    ];

    /// Parses a status cell. Whitespace and case are ignored; an empty cell is
    /// `Unprocessed`.
    pub fn from_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return ResponseStatus::Unprocessed;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "valid" => ResponseStatus::Valid,
            "invalid_username" => ResponseStatus::InvalidUsername,
            "not_registered" => ResponseStatus::NotRegistered,
            "already_granted" => ResponseStatus::AlreadyGranted,
            "pending_invite" => ResponseStatus::PendingInvite,
            _ => ResponseStatus::Other(trimmed.to_string()),
        }
    }

    /// Text written into the status cell.
    pub fn as_cell(&self) -> &str {
        match self {
            ResponseStatus::Unprocessed => "",
            ResponseStatus::Valid => "valid",
            ResponseStatus::InvalidUsername => "invalid_username",
            ResponseStatus::NotRegistered => "not_registered",
            ResponseStatus::AlreadyGranted => "already_granted",
            ResponseStatus::PendingInvite => "pending_invite",
            ResponseStatus::Other(text) => text,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResponseStatus::Unprocessed)
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Unprocessed => f.pad("unprocessed"),
            other => f.pad(other.as_cell()),
        }
    }
}
