//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use common::model::account::Account;
use form_validator::config::{from_toml_str, ValidatorConfig};
use form_validator::services::directory::{DirectoryError, IdentityDirectory, Notice};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

/// In-memory directory with scripted failures and a record of every call.
#[derive(Default)]
pub struct FakeDirectory {
    accounts: HashMap<String, Account>,
    memberships: HashSet<(String, String)>,
    open_invitations: Vec<String>,
    failing_lookups: HashSet<String>,
    failing_memberships: HashSet<(String, String)>,
    fail_invitations: bool,
    fail_notices: bool,
    fail_open_invitations: Cell<usize>,
    pub lookups: RefCell<Vec<String>>,
    pub membership_checks: RefCell<Vec<(String, String)>>,
    pub invitation_fetches: Cell<usize>,
    pub invitations_sent: RefCell<Vec<(String, String)>>,
    pub notices_sent: RefCell<Vec<(String, Notice)>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account whose id is `id-<username>`.
    pub fn with_account(mut self, username: &str) -> Self {
        self.accounts.insert(
            username.to_string(),
            Account {
                id: id_of(username),
                user_name: username.to_string(),
            },
        );
        self
    }

    pub fn with_membership(mut self, username: &str, group: &str) -> Self {
        self.memberships.insert((id_of(username), group.to_string()));
        self
    }

    pub fn with_open_invitation(mut self, username: &str) -> Self {
        self.open_invitations.push(id_of(username));
        self
    }

    pub fn failing_lookup(mut self, username: &str) -> Self {
        self.failing_lookups.insert(username.to_string());
        self
    }

    pub fn failing_membership(mut self, username: &str, group: &str) -> Self {
        self.failing_memberships
            .insert((id_of(username), group.to_string()));
        self
    }

    pub fn failing_invitations(mut self) -> Self {
        self.fail_invitations = true;
        self
    }

    pub fn failing_notices(mut self) -> Self {
        self.fail_notices = true;
        self
    }

    /// The next `times` open invitation fetches fail.
    pub fn failing_open_invitations(self, times: usize) -> Self {
        self.fail_open_invitations.set(times);
        self
    }

    pub fn call_count(&self) -> usize {
        self.lookups.borrow().len() + self.membership_checks.borrow().len()
    }
}

pub fn id_of(username: &str) -> String {
    format!("id-{}", username)
}

fn outage() -> DirectoryError {
    DirectoryError::Unavailable("connection reset by peer".to_string())
}

impl IdentityDirectory for FakeDirectory {
    fn lookup_account(&self, username: &str) -> Result<Option<Account>, DirectoryError> {
        self.lookups.borrow_mut().push(username.to_string());
        if self.failing_lookups.contains(username) {
            return Err(outage());
        }
        Ok(self.accounts.get(username).cloned())
    }

    fn is_registered(&self, account_id: &str, code: &str) -> Result<bool, DirectoryError> {
        let key = (account_id.to_string(), code.to_string());
        self.membership_checks.borrow_mut().push(key.clone());
        if self.failing_memberships.contains(&key) {
            return Err(DirectoryError::Status {
                status: 503,
                endpoint: format!("team/{}/member/{}", code, account_id),
            });
        }
        Ok(self.memberships.contains(&key))
    }

    fn open_invitations(&self, _team: &str) -> Result<Vec<String>, DirectoryError> {
        self.invitation_fetches.set(self.invitation_fetches.get() + 1);
        let remaining = self.fail_open_invitations.get();
        if remaining > 0 {
            self.fail_open_invitations.set(remaining - 1);
            return Err(outage());
        }
        Ok(self.open_invitations.clone())
    }

    fn send_invitation(
        &self,
        team: &str,
        account_id: &str,
        _message: &str,
    ) -> Result<(), DirectoryError> {
        if self.fail_invitations {
            return Err(outage());
        }
        self.invitations_sent
            .borrow_mut()
            .push((team.to_string(), account_id.to_string()));
        Ok(())
    }

    fn send_notice(&self, account_id: &str, notice: &Notice) -> Result<(), DirectoryError> {
        if self.fail_notices {
            return Err(outage());
        }
        self.notices_sent
            .borrow_mut()
            .push((account_id.to_string(), notice.clone()));
        Ok(())
    }
}

pub const CHALLENGE: &str = "challenge-2025";
pub const ACCESS_TEAM: &str = "data-access";

/// Config for the plain three-step check, no pauses.
pub fn base_config() -> ValidatorConfig {
    let config = from_toml_str(&format!(
        r#"
        [sheet]
        path = "responses.csv"

        [directory]
        base_url = "https://directory.example.org"
        write_pause_ms = 0

        [challenge]
        code = "{}"
        name = "Challenge 2025"
        "#,
        CHALLENGE
    ))
    .expect("valid test config");
    config.validate().expect("valid test config");
    config
}

/// Config with the access flow enabled.
pub fn access_config() -> ValidatorConfig {
    let mut config = base_config();
    config.challenge.access_team = Some(ACCESS_TEAM.to_string());
    config
}
