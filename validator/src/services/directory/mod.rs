//! The identity directory: the system of record for accounts, their
//! registrations, and the access team invitations.
//!
//! Every operation separates a negative answer (`Ok(false)`, `Ok(None)`) from a
//! failure to get an answer (`Err`). The validator turns the first into a
//! terminal status and the second into "try again next run".

pub mod rest;

use common::model::account::Account;
use thiserror::Error;

pub use rest::RestDirectory;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unreachable: {0}")]
    Unavailable(String),
    #[error("directory returned HTTP {status} for {endpoint}")]
    Status { status: u16, endpoint: String },
    #[error("could not decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
    #[error("directory rejected the credentials (HTTP {0})")]
    Unauthorized(u16),
    #[error("invalid directory setting: {0}")]
    Setup(String),
}

impl DirectoryError {
    /// True when retrying later has a fair chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            DirectoryError::Unavailable(_) | DirectoryError::Decode { .. } => true,
            DirectoryError::Status { status, .. } => *status >= 500 || *status == 429,
            DirectoryError::Unauthorized(_) | DirectoryError::Setup(_) => false,
        }
    }
}

/// A message delivered to an account through the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub subject: String,
    pub body: String,
}

pub trait IdentityDirectory {
    /// Resolves a username to its account, `None` when no such account exists.
    fn lookup_account(&self, username: &str) -> Result<Option<Account>, DirectoryError>;

    fn account_exists(&self, username: &str) -> Result<bool, DirectoryError> {
        Ok(self.lookup_account(username)?.is_some())
    }

    /// Whether the account is registered under `code`, i.e. belongs to that group.
    fn is_registered(&self, account_id: &str, code: &str) -> Result<bool, DirectoryError>;

    /// Account ids holding an open invitation to `team`.
    fn open_invitations(&self, team: &str) -> Result<Vec<String>, DirectoryError>;

    fn send_invitation(
        &self,
        team: &str,
        account_id: &str,
        message: &str,
    ) -> Result<(), DirectoryError>;

    fn send_notice(&self, account_id: &str, notice: &Notice) -> Result<(), DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_side_failures_are_transient() {
        let status = |status| DirectoryError::Status {
            status,
            endpoint: "team/1/member/2".to_string(),
        };
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(400).is_transient());
        assert!(DirectoryError::Unavailable("timed out".into()).is_transient());
        assert!(!DirectoryError::Unauthorized(401).is_transient());
    }
}
