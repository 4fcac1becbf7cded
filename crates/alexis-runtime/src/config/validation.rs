//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{AlexisConfig, BotConfig, LogOutput, LoggingConfig, RuntimeConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &AlexisConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_runtime_config(&config.runtime)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.command_prefix.is_empty() {
        return Err(ConfigError::missing_field("bot.command_prefix"));
    }
    if bot.command_prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation(
            "Command prefix cannot contain whitespace",
        ));
    }
    if bot.bot_owners.iter().any(|owner| owner.trim().is_empty()) {
        return Err(ConfigError::validation("Bot owner ids cannot be empty"));
    }
    if bot.status_interval_secs == 0 {
        return Err(ConfigError::validation(
            "Status interval must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_runtime_config(runtime: &RuntimeConfig) -> ConfigResult<()> {
    if runtime.event_buffer == 0 {
        return Err(ConfigError::validation("Event buffer must be greater than 0"));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    if logging.max_files == 0 {
        return Err(ConfigError::validation("Max log files must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AlexisConfig::default()).is_ok());
    }

    #[test]
    fn test_bad_prefix() {
        let mut config = AlexisConfig::default();
        config.bot.command_prefix = String::new();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.bot.command_prefix = "! ".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = AlexisConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("logs/alexis.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = AlexisConfig::default();
        config.runtime.event_buffer = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AlexisConfig::default();
        config.bot.status_interval_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
