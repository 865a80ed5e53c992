//! Configuration file handling
//!
//! Settings live in a TOML file, by default `config.toml` in the platform
//! configuration directory. Command line flags override individual values.

use crate::poll_loop::RunMode;
use crate::torrent_index::{T411Client, T411Credentials};
use crate::watch_list::{BetaSeriesClient, BetaSeriesCredentials};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Placeholder shown instead of secrets
const MASK: &str = "********";

/// Errors that can occur while loading or validating the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No home directory to derive platform directories from
    #[error("Could not determine the configuration directory")]
    NoConfigDir,

    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write config file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A required setting is neither in the file nor on the command line
    #[error("Missing configuration value: {0}")]
    MissingValue(&'static str),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory the torrent files end up in
    pub torrents_path: PathBuf,
    /// Minutes between two poll cycles
    pub interval_minutes: u64,
    /// Run a single poll cycle and exit
    pub single_shot: bool,
    pub debug: bool,
    /// Release language term
    pub language: String,
    /// Suffix appended to relocated file names lacking it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    /// Lifetime of cached show details, `0` disables the cache
    pub show_cache_hours: u64,
    pub betaseries: BetaSeriesConfig,
    pub t411: T411Config,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetaSeriesConfig {
    pub api_key: String,
    pub login: String,
    /// MD5 hex digest of the account password
    pub password_md5: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct T411Config {
    pub username: String,
    pub password: String,
    pub base_url: String,
    /// Maximum number of results per search
    pub search_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            torrents_path: PathBuf::from("./torrents"),
            interval_minutes: 10,
            single_shot: false,
            debug: false,
            language: "VOSTFR".to_string(),
            file_extension: None,
            show_cache_hours: 24,
            betaseries: BetaSeriesConfig::default(),
            t411: T411Config::default(),
        }
    }
}

impl Default for BetaSeriesConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            login: String::new(),
            password_md5: String::new(),
            base_url: BetaSeriesClient::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Default for T411Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            base_url: T411Client::DEFAULT_BASE_URL.to_string(),
            search_limit: 100,
        }
    }
}

/// Values given on the command line, taking precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub torrents_path: Option<PathBuf>,
    pub interval_minutes: Option<u64>,
    /// Flags can only switch these on
    pub single_shot: bool,
    pub debug: bool,
    pub bs_key: Option<String>,
    pub bs_username: Option<String>,
    pub bs_password_md5: Option<String>,
    pub t411_username: Option<String>,
    pub t411_password: Option<String>,
}

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("", "", "torrents-bot").ok_or(ConfigError::NoConfigDir)
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Default location of the log files
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

impl Config {
    /// Loads the configuration from `path`, or from the default location
    ///
    /// An explicitly given file must exist. A missing default file is created
    /// with default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = config_path()?;
                if !path.exists() {
                    let config = Config::default();
                    config.save_to(&path)?;
                    return Ok(config);
                }
                Self::load_from(&path)
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(write_error)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.torrents_path {
            self.torrents_path = path;
        }
        if let Some(minutes) = overrides.interval_minutes {
            self.interval_minutes = minutes;
        }
        self.single_shot |= overrides.single_shot;
        self.debug |= overrides.debug;

        let strings = [
            (overrides.bs_key, &mut self.betaseries.api_key),
            (overrides.bs_username, &mut self.betaseries.login),
            (overrides.bs_password_md5, &mut self.betaseries.password_md5),
            (overrides.t411_username, &mut self.t411.username),
            (overrides.t411_password, &mut self.t411.password),
        ];
        for (value, target) in strings {
            if let Some(value) = value {
                *target = value;
            }
        }
    }

    /// Checks that the configuration is complete and consistent
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "interval_minutes",
                message: "must be greater than 0".to_string(),
            });
        }
        self.run_mode()?;
        self.show_cache_ttl()?;
        if self.language.trim().is_empty() {
            return Err(ConfigError::MissingValue("language"));
        }
        if self.t411.search_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "t411.search_limit",
                message: "must be greater than 0".to_string(),
            });
        }

        self.betaseries_credentials()?;
        self.t411_credentials()?;
        Ok(())
    }

    /// How the poll loop should run
    ///
    /// # Errors
    ///
    /// `InvalidValue` when the interval is too large to schedule.
    pub fn run_mode(&self) -> Result<RunMode, ConfigError> {
        if self.single_shot {
            return Ok(RunMode::SingleShot);
        }
        let period = schedulable(self.interval_minutes, 60, "interval_minutes")?;
        Ok(RunMode::Interval(period))
    }

    /// Lifetime of cached show details; `None` when caching is off
    pub fn show_cache_ttl(&self) -> Result<Option<Duration>, ConfigError> {
        if self.show_cache_hours == 0 {
            return Ok(None);
        }
        schedulable(self.show_cache_hours, 60 * 60, "show_cache_hours").map(Some)
    }

    pub fn betaseries_credentials(&self) -> Result<BetaSeriesCredentials, ConfigError> {
        Ok(BetaSeriesCredentials {
            api_key: required(&self.betaseries.api_key, "betaseries.api_key")?,
            login: required(&self.betaseries.login, "betaseries.login")?,
            password_md5: required(&self.betaseries.password_md5, "betaseries.password_md5")?,
        })
    }

    pub fn t411_credentials(&self) -> Result<T411Credentials, ConfigError> {
        Ok(T411Credentials {
            username: required(&self.t411.username, "t411.username")?,
            password: required(&self.t411.password, "t411.password")?,
        })
    }

    /// Copy safe to log: secrets are replaced by a mask
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        for secret in [
            &mut masked.betaseries.api_key,
            &mut masked.betaseries.password_md5,
            &mut masked.t411.password,
        ] {
            if !secret.is_empty() {
                *secret = MASK.to_string();
            }
        }
        masked
    }
}

/// `count` units of `unit_secs` seconds, if that period still fits after now
fn schedulable(count: u64, unit_secs: u64, key: &'static str) -> Result<Duration, ConfigError> {
    count
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .filter(|period| Instant::now().checked_add(*period).is_some())
        .ok_or_else(|| ConfigError::InvalidValue {
            key,
            message: format!("{} is too large", count),
        })
}

fn required(value: &str, key: &'static str) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::MissingValue(key));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> Config {
        let mut config = Config::default();
        config.apply(ConfigOverrides {
            bs_key: Some("key".to_string()),
            bs_username: Some("login".to_string()),
            bs_password_md5: Some("5f4dcc3b5aa765d61d8327deb882cf99".to_string()),
            t411_username: Some("user".to_string()),
            t411_password: Some("secret".to_string()),
            ..ConfigOverrides::default()
        });
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.torrents_path, PathBuf::from("./torrents"));
        assert_eq!(config.interval_minutes, 10);
        assert_eq!(config.language, "VOSTFR");
        assert_eq!(
            config.run_mode().unwrap(),
            RunMode::Interval(Duration::from_secs(600))
        );
        assert_eq!(
            config.show_cache_ttl().unwrap(),
            Some(Duration::from_secs(24 * 3600))
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            interval_minutes = 5
            file_extension = ".torrent"

            [t411]
            username = "user"
            "#,
        )
        .unwrap();

        assert_eq!(config.interval_minutes, 5);
        assert_eq!(config.file_extension.as_deref(), Some(".torrent"));
        assert_eq!(config.t411.username, "user");
        assert_eq!(config.t411.base_url, T411Client::DEFAULT_BASE_URL);
        assert_eq!(config.betaseries.base_url, BetaSeriesClient::DEFAULT_BASE_URL);
        assert_eq!(config.torrents_path, PathBuf::from("./torrents"));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = complete();
        config.apply(ConfigOverrides {
            torrents_path: Some(PathBuf::from("/srv/torrents")),
            interval_minutes: Some(30),
            single_shot: true,
            t411_password: Some("other".to_string()),
            ..ConfigOverrides::default()
        });

        assert_eq!(config.torrents_path, PathBuf::from("/srv/torrents"));
        assert_eq!(config.interval_minutes, 30);
        assert_eq!(config.run_mode().unwrap(), RunMode::SingleShot);
        assert_eq!(config.t411.password, "other");
        assert_eq!(config.t411.username, "user");
    }

    #[test]
    fn test_missing_credentials() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingValue("betaseries.api_key"))
        ));

        let mut config = complete();
        config.t411.password = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingValue("t411.password"))
        ));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = complete();
        assert!(config.validate().is_ok());

        config.interval_minutes = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                key: "interval_minutes",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_cache_hours_disables_cache() {
        let mut config = Config::default();
        config.show_cache_hours = 0;
        assert_eq!(config.show_cache_ttl().unwrap(), None);
    }

    #[test]
    fn test_oversized_periods_are_rejected() {
        let mut config = complete();
        config.interval_minutes = u64::MAX / 2;
        assert!(matches!(
            config.run_mode(),
            Err(ConfigError::InvalidValue {
                key: "interval_minutes",
                ..
            })
        ));
        assert!(config.validate().is_err());

        let mut config = complete();
        config.show_cache_hours = u64::MAX / 100;
        assert!(matches!(
            config.show_cache_ttl(),
            Err(ConfigError::InvalidValue {
                key: "show_cache_hours",
                ..
            })
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_single_shot_ignores_interval() {
        let mut config = complete();
        config.single_shot = true;
        config.interval_minutes = u64::MAX;
        assert_eq!(config.run_mode().unwrap(), RunMode::SingleShot);
    }

    #[test]
    fn test_masked_hides_secrets() {
        let masked = complete().masked();
        assert_eq!(masked.betaseries.api_key, MASK);
        assert_eq!(masked.betaseries.password_md5, MASK);
        assert_eq!(masked.t411.password, MASK);
        assert_eq!(masked.t411.username, "user");
        assert!(!format!("{:?}", masked).contains("secret"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = complete();

        config.save_to(&path).unwrap();
        let loaded = Config::load(Some(&path)).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "interval_minutes = \"often\"").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
