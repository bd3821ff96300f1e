//! Configuration loading from a TOML file and environment variables.
//!
//! Environment variables take precedence over the file so a scheduled job can
//! point an existing config at a new challenge without editing it:
//! - `FORM_VALIDATOR_CHALLENGE_CODE` replaces `challenge.code`
//! - `FORM_VALIDATOR_SHEET_PATH` replaces `sheet.path`

use super::{ConfigError, ValidatorConfig};
use std::path::{Path, PathBuf};

const CHALLENGE_CODE_VAR: &str = "FORM_VALIDATOR_CHALLENGE_CODE";
const SHEET_PATH_VAR: &str = "FORM_VALIDATOR_SHEET_PATH";

/// Load configuration from a TOML file, apply environment overrides and validate it.
pub fn load_config(config_path: &Path) -> Result<ValidatorConfig, ConfigError> {
    let content = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;

    let mut config = from_toml_str(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;

    log::debug!("Loaded configuration from {}", config_path.display());
    Ok(config)
}

/// Parse a configuration without touching the environment or validating it.
pub fn from_toml_str(content: &str) -> Result<ValidatorConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut ValidatorConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(code) = lookup(CHALLENGE_CODE_VAR).filter(|v| !v.trim().is_empty()) {
        log::info!("Using challenge code from {} (overriding config file)", CHALLENGE_CODE_VAR);
        config.challenge.code = code.trim().to_string();
    }
    if let Some(path) = lookup(SHEET_PATH_VAR).filter(|v| !v.trim().is_empty()) {
        log::info!("Using sheet path from {} (overriding config file)", SHEET_PATH_VAR);
        config.sheet.path = PathBuf::from(path.trim());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
        [sheet]
        path = "responses.csv"

        [directory]
        base_url = "https://directory.example.org/repo/v1"

        [challenge]
        code = "3523569"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = from_toml_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.sheet.username_column, "Username");
        assert_eq!(config.sheet.timestamp_column, "Timestamp");
        assert_eq!(config.sheet.status_column, "Status");
        assert_eq!(config.directory.token_env, "DIRECTORY_AUTH_TOKEN");
        assert_eq!(config.directory.timeout_secs, 30);
        assert_eq!(config.directory.write_pause_ms, 6000);
        assert!(config.challenge.access_team.is_none());
        assert_eq!(config.challenge.display_name(), "3523569");
        assert!(config.notices.enabled);
        assert!(config.history.db_path.is_none());
    }

    #[test]
    fn full_config_parses() {
        let config = from_toml_str(
            r#"
            [sheet]
            path = "/data/responses.csv"
            username_column = "Synapse Username"
            status_column = "Validation"

            [directory]
            base_url = "https://directory.example.org"
            token_env = "MY_TOKEN"
            write_pause_ms = 0

            [challenge]
            code = "3523569"
            name = "Lighthouse 2025"
            access_team = "3523636"

            [notices]
            subject_prefix = "Data Access"
            pending_invite = "Check your inbox, {{username}}."

            [history]
            db_path = "history.sqlite"
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.sheet.username_column, "Synapse Username");
        assert_eq!(config.challenge.display_name(), "Lighthouse 2025");
        assert_eq!(config.challenge.access_team.as_deref(), Some("3523636"));
        assert_eq!(
            config.notices.pending_invite.as_deref(),
            Some("Check your inbox, {{username}}.")
        );
        assert_eq!(config.history.db_path, Some(PathBuf::from("history.sqlite")));
    }

    #[test]
    fn missing_challenge_section_is_a_parse_error() {
        let err = from_toml_str(
            r#"
            [sheet]
            path = "responses.csv"
            [directory]
            base_url = "https://directory.example.org"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validate_rejects_empty_challenge_code() {
        let mut config = from_toml_str(MINIMAL).unwrap();
        config.challenge.code = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_status_column_reusing_username_column() {
        let mut config = from_toml_str(MINIMAL).unwrap();
        config.sheet.status_column = "Username".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = from_toml_str(MINIMAL).unwrap();
        let vars: HashMap<&str, &str> = [
            ("FORM_VALIDATOR_CHALLENGE_CODE", " 999 "),
            ("FORM_VALIDATOR_SHEET_PATH", "other.csv"),
        ]
        .into_iter()
        .collect();

        apply_env_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.challenge.code, "999");
        assert_eq!(config.sheet.path, PathBuf::from("other.csv"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = from_toml_str(MINIMAL).unwrap();
        apply_env_overrides(&mut config, |_| Some(String::new()));
        assert_eq!(config.challenge.code, "3523569");
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/validator.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
