//! Run configuration for the validator.
//!
//! Everything a run needs is read once from a TOML file (see [`loading`]) into a
//! [`ValidatorConfig`], which is then handed to the validator and the services it
//! talks to. Nothing here is global: a run owns its configuration for its whole
//! lifetime and drops it when it ends.
//!
//! The directory token is deliberately not part of the file. `directory.token_env`
//! names the environment variable it is read from, so the same file can be
//! committed next to the CI job that invokes the binary.

pub mod loading;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use loading::{apply_env_overrides, from_toml_str, load_config};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "validator.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("directory token variable '{0}' is not set")]
    MissingToken(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub sheet: SheetConfig,
    pub directory: DirectoryConfig,
    pub challenge: ChallengeConfig,
    #[serde(default)]
    pub notices: NoticeConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Where the form responses live and which header titles hold the fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    pub path: PathBuf,
    #[serde(default = "defaults::username_column")]
    pub username_column: String,
    #[serde(default = "defaults::timestamp_column")]
    pub timestamp_column: String,
    #[serde(default = "defaults::status_column")]
    pub status_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub base_url: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "defaults::token_env")]
    pub token_env: String,
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
    /// Pause after every write (invitation, notice) sent to the directory.
    #[serde(default = "defaults::write_pause_ms")]
    pub write_pause_ms: u64,
}

impl DirectoryConfig {
    /// Reads the bearer token from the configured environment variable.
    pub fn token(&self) -> Result<String, ConfigError> {
        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(ConfigError::MissingToken(self.token_env.clone())),
        }
    }
}

/// The challenge a submitter must be registered for.
///
/// `code` is the directory group that holds the challenge registrations. It is
/// configured explicitly for each form and never derived from the sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeConfig {
    pub code: String,
    /// Human readable challenge name, used in notices. Falls back to `code`.
    #[serde(default)]
    pub name: String,
    /// Group whose membership grants access. When set, the validator runs the
    /// full access flow (membership check, open invitations, invitations).
    #[serde(default)]
    pub access_team: Option<String>,
}

impl ChallengeConfig {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.code
        } else {
            &self.name
        }
    }
}

/// Notice texts sent to submitters in the access flow.
///
/// Each template may use `{{username}}` and `{{challenge}}`. Unset templates use
/// the built-in texts from `services::notices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeConfig {
    #[serde(default = "defaults::notices_enabled")]
    pub enabled: bool,
    #[serde(default = "defaults::subject_prefix")]
    pub subject_prefix: String,
    #[serde(default = "defaults::signature")]
    pub signature: String,
    #[serde(default)]
    pub already_granted: Option<String>,
    #[serde(default)]
    pub pending_invite: Option<String>,
    #[serde(default)]
    pub missing_registration: Option<String>,
    #[serde(default)]
    pub invitation: Option<String>,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::notices_enabled(),
            subject_prefix: defaults::subject_prefix(),
            signature: defaults::signature(),
            already_granted: None,
            pending_invite: None,
            missing_registration: None,
            invitation: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// SQLite file for the result log. No result log is kept when unset.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl ValidatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.directory.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("directory.base_url must not be empty".into()));
        }
        if self.directory.token_env.trim().is_empty() {
            return Err(ConfigError::Invalid("directory.token_env must not be empty".into()));
        }
        if self.challenge.code.trim().is_empty() {
            return Err(ConfigError::Invalid("challenge.code must not be empty".into()));
        }
        if let Some(team) = &self.challenge.access_team {
            if team.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "challenge.access_team must not be empty when set".into(),
                ));
            }
        }

        let sheet = &self.sheet;
        for (key, title) in [
            ("sheet.username_column", &sheet.username_column),
            ("sheet.timestamp_column", &sheet.timestamp_column),
            ("sheet.status_column", &sheet.status_column),
        ] {
            if title.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", key)));
            }
        }
        if sheet.status_column.trim() == sheet.username_column.trim()
            || sheet.status_column.trim() == sheet.timestamp_column.trim()
        {
            return Err(ConfigError::Invalid(
                "sheet.status_column must differ from the username and timestamp columns".into(),
            ));
        }
        Ok(())
    }
}

mod defaults {
    pub fn username_column() -> String {
        "Username".to_string()
    }

    pub fn timestamp_column() -> String {
        "Timestamp".to_string()
    }

    pub fn status_column() -> String {
        "Status".to_string()
    }

    pub fn token_env() -> String {
        "DIRECTORY_AUTH_TOKEN".to_string()
    }

    pub fn timeout_secs() -> u64 {
        30
    }

    pub fn write_pause_ms() -> u64 {
        6000
    }

    pub fn notices_enabled() -> bool {
        true
    }

    pub fn subject_prefix() -> String {
        "Data Access Form".to_string()
    }

    pub fn signature() -> String {
        "Data Access Bot".to_string()
    }
}
