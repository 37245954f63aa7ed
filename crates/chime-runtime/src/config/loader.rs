//! Configuration loader using figment.
//!
//! Sources are layered, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`chime.{profile}.toml`)
//! 3. Main config file (`chime.toml`)
//! 4. Environment variables (`CHIME_*`)
//! 5. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `CHIME_` prefix with `__` as separator:
//!
//! - `CHIME_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `CHIME_ENGINE__KEEP_BLANK=false` → `engine.keep_blank = false`
//! - `CHIME_ENGINE__CODE_REPLIES__404=Eh?` → `engine.code_replies."404" = "Eh?"`
//!
//! # Example
//!
//! ```rust,ignore
//! use chime_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new().profile("production").load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Serialized};
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::ChimeConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "CHIME_";
const BASE_NAME: &str = "chime";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `CHIME_PROFILE`, defaulting to Development.
    pub fn from_env() -> Self {
        std::env::var("CHIME_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
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
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the user config directory (`~/.config/chime` on Linux).
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join(BASE_NAME)),
            None => self,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a configuration programmatically, above every other source.
    pub fn merge(mut self, config: ChimeConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<ChimeConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: ChimeConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            dialogs = config.dialogs.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(ChimeConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        let overrides = std::mem::take(&mut self.figment);
        Ok(figment.merge(overrides))
    }

    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
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
            paths.push(config_dir.join(BASE_NAME));
        }
        paths
    }

    /// Tries `chime.{profile}.toml` then `chime.toml` in each search path;
    /// stops at the first directory holding a main file.
    #[cfg(feature = "toml-config")]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            let profile_path =
                search_path.join(format!("{BASE_NAME}.{}.toml", self.profile.as_str()));
            if profile_path.exists() {
                debug!(path = %profile_path.display(), "Loading profile-specific config");
                figment = figment.merge(Toml::file(&profile_path));
            }

            let base_path = search_path.join(format!("{BASE_NAME}.toml"));
            if base_path.exists() {
                info!(path = %base_path.display(), "Loading configuration file");
                return figment.merge(Toml::file(&base_path));
            }
        }
        warn!("No configuration file found, using defaults");
        figment
    }

    #[cfg(not(feature = "toml-config"))]
    fn load_config_files(&self, figment: Figment) -> Figment {
        trace!(paths = ?self.resolve_search_paths(), "File formats disabled, skipping search");
        figment
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<ChimeConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from a specific file, with env overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<ChimeConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.logging.level.as_str(), "info");
            assert!(config.engine.keep_blank);
            assert!(config.engine.break_on_error);
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("Dev"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("CHIME_PROFILE", "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "chime.toml",
                r#"
                dialogs = ["rules/main.json"]

                [engine]
                keep_blank = false

                [engine.code_replies]
                404 = "Say again?"

                [logging]
                level = "warn"
                "#,
            )?;
            jail.create_file("chime.staging.toml", "[engine]\nbreak_on_error = false\n")?;
            jail.set_env("CHIME_LOGGING__LEVEL", "debug");

            let config = ConfigLoader::new()
                .profile("staging")
                .search_path(jail.directory())
                .load()
                .unwrap();

            assert!(!config.engine.keep_blank);
            assert!(!config.engine.break_on_error);
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.dialogs, [PathBuf::from("rules/main.json")]);
            assert_eq!(
                config.engine.to_dispatcher_config().code_to_reply("404"),
                "Say again?"
            );
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new()
            .file("/definitely/not/chime.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
