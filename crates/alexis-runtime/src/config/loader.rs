//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic merges ([`ConfigLoader::merge`])
//! 3. Profile-specific file (`alexis.{profile}.toml`)
//! 4. Main file (`alexis.toml`, then `config.toml`)
//! 5. Environment variables (`ALEXIS_*`)
//!
//! # Environment Variable Mapping
//!
//! Variables use the `ALEXIS_` prefix with `__` between sections:
//!
//! - `ALEXIS_BOT__COMMAND_PREFIX=?` → `bot.command_prefix = "?"`
//! - `ALEXIS_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `ALEXIS_RUNTIME__SHUTDOWN_GRACE_SECS=30` → `runtime.shutdown_grace_secs = 30`
//!
//! ```rust,ignore
//! use alexis_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./deploy/alexis.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Serialized};
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::AlexisConfig;

/// File names searched in every search path, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["alexis.toml", "config.toml"];

/// Prefix of the environment variables read by the loader.
pub const ENV_PREFIX: &str = "ALEXIS_";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the `dev` and `prod` short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `ALEXIS_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("ALEXIS_PROFILE")
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multi-source configuration loader.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory searched for configuration files.
    ///
    /// Without any search path, the current directory and the user config
    /// directory (`~/.config/alexis` on Linux) are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Loads this file instead of searching. A missing file is an error.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a configuration on top of the built-in defaults.
    pub fn merge(mut self, config: AlexisConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<AlexisConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;
        let config: AlexisConfig = figment.extract()?;

        debug!(
            profile = %profile,
            prefix = %config.bot.command_prefix,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(AlexisConfig::default()));
        figment = figment.merge(std::mem::take(&mut self.figment));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment)
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("alexis"));
        }
        paths
    }

    /// Merges the first main file found, preceded by its profile variant.
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        for dir in self.resolve_search_paths() {
            for name in CONFIG_FILE_NAMES {
                let base = dir.join(name);
                if !base.exists() {
                    continue;
                }

                let profiled = dir.join(profile_file_name(name, &self.profile));
                if profiled.exists() {
                    debug!(path = %profiled.display(), "Loading profile-specific config");
                    figment = merge_file(figment.clone(), &profiled).unwrap_or(figment);
                }

                info!(path = %base.display(), "Loading configuration file");
                return merge_file(figment.clone(), &base).unwrap_or(figment);
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}

/// `alexis.toml` + `production` → `alexis.production.toml`.
fn profile_file_name(base: &str, profile: &Profile) -> String {
    match base.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}.{profile}.{ext}"),
        None => format!("{base}.{profile}"),
    }
}

fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        _ => Err(ConfigError::ParseError(format!(
            "Unsupported or disabled configuration file format: .{ext}"
        ))),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<AlexisConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file plus the environment.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<AlexisConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use figment::Jail;

    #[test]
    fn test_defaults_without_files() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config, AlexisConfig::default());
            assert_eq!(config.bot.command_prefix, "!");
            Ok(())
        });
    }

    #[test]
    fn test_file_profile_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "alexis.toml",
                r#"
                [bot]
                command_prefix = "?"
                bot_owners = ["100"]

                [logging]
                level = "debug"
                "#,
            )?;
            jail.create_file(
                "alexis.production.toml",
                r#"
                [runtime]
                shutdown_grace_secs = 3
                "#,
            )?;
            jail.set_env("ALEXIS_BOT__FAULT_REPLY", "oops");

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.bot.command_prefix, "?");
            assert_eq!(config.bot.bot_owners, vec!["100"]);
            assert_eq!(config.bot.fault_reply.as_deref(), Some("oops"));
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.runtime.shutdown_grace_secs, 3);
            assert_eq!(config.runtime.event_buffer, 256);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = ConfigLoader::new()
            .file("/definitely/not/here/alexis.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
        assert_eq!(
            profile_file_name("alexis.toml", &Profile::Production),
            "alexis.production.toml"
        );
    }
}
