//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("bot.token_env is required")]
    MissingTokenEnv,
    #[error("bot.command_prefix is required")]
    MissingCommandPrefix,
    #[error("bot.command_prefix must not contain whitespace, got '{0}'")]
    InvalidCommandPrefix(String),
    #[error("moderation.trigger_phrases must contain at least one phrase")]
    NoTriggerPhrases,
    #[error("moderation.trigger_phrases contains an empty phrase")]
    EmptyTriggerPhrase,
    #[error("moderation.guild_config_path is required")]
    MissingGuildConfigPath,
    #[error("audit.path is required")]
    MissingAuditPath,
    #[error("audit.path is a directory: {0}")]
    AuditPathIsDirectory(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.bot.token_env.trim().is_empty() {
        errors.push(ValidationError::MissingTokenEnv);
    }

    let prefix = &config.bot.command_prefix;
    if prefix.is_empty() {
        errors.push(ValidationError::MissingCommandPrefix);
    } else if prefix.chars().any(char::is_whitespace) {
        errors.push(ValidationError::InvalidCommandPrefix(prefix.clone()));
    }

    let triggers = &config.moderation.trigger_phrases;
    if triggers.is_empty() {
        errors.push(ValidationError::NoTriggerPhrases);
    } else if triggers.iter().any(|t| t.trim().is_empty()) {
        errors.push(ValidationError::EmptyTriggerPhrase);
    }

    if config.moderation.guild_config_path.trim().is_empty() {
        errors.push(ValidationError::MissingGuildConfigPath);
    }

    // The log directory is created on first write; only reject impossible paths.
    let audit_path = &config.audit.path;
    if audit_path.trim().is_empty() {
        errors.push(ValidationError::MissingAuditPath);
    } else if Path::new(audit_path).is_dir() {
        errors.push(ValidationError::AuditPathIsDirectory(audit_path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_empty_triggers_fail() {
        let toml = r#"
[moderation]
trigger_phrases = []
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::NoTriggerPhrases)));
    }

    #[test]
    fn test_all_errors_collected() {
        let toml = r#"
[bot]
token_env = ""
command_prefix = "! "

[moderation]
trigger_phrases = ["lock", "  "]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingTokenEnv)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidCommandPrefix(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::EmptyTriggerPhrase)));
    }

    #[test]
    fn test_directory_audit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.audit.path = dir.path().display().to_string();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::AuditPathIsDirectory(_))));
    }
}
