//! Tracker configuration loaded from a JSON file.
//!
//! Every field is optional; absent fields take the defaults below. The
//! default location is `$XDG_CONFIG_HOME/download-tracker/config.json`, then
//! `$HOME/.config/download-tracker/config.json`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::view::DEFAULT_PAGE_SIZE;

/// Default delay before resuming a download the host interrupted.
pub const DEFAULT_AUTO_RESUME_DELAY_MS: u64 = 500;

const MAX_PAGE_SIZE: usize = 500;
const MAX_AUTO_RESUME_DELAY_MS: u64 = 10_000;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for this schema.
    #[error("failed to parse config file '{path}': {source}\n  Suggestion: Check the file is a JSON object with known keys")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        expected: &'static str,
    },
}

/// Runtime configuration of a tracking session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackerConfig {
    /// Records per page when no pagination preference is stored (1..=500).
    pub page_size: Option<usize>,
    /// Delay before the automatic resume of an interrupted download (0..=10000).
    pub auto_resume_delay_ms: Option<u64>,
    /// Where the pagination preference is persisted; in memory when unset.
    pub pagination_file: Option<PathBuf>,
    /// Stored download settings document; defaults when unset.
    pub settings_file: Option<PathBuf>,
}

impl TrackerConfig {
    /// Loads and validates the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, malformed, or
    /// holds out-of-range values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded tracker config");
        Ok(config)
    }

    /// Loads `path`, or the default location when `path` is `None`.
    ///
    /// A missing default file is not an error. Any failure is logged and the
    /// defaults are returned.
    #[must_use]
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let resolved = path.map(Path::to_path_buf).or_else(resolve_default_config_path);
        let Some(resolved) = resolved else {
            return Self::default();
        };
        if path.is_none() && !resolved.exists() {
            return Self::default();
        }
        match Self::load(&resolved) {
            Ok(config) => config,
            Err(error) => {
                warn!(error = %error, "Using default tracker config");
                Self::default()
            }
        }
    }

    /// Validates configured values against their ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(page_size) = self.page_size
            && !(1..=MAX_PAGE_SIZE).contains(&page_size)
        {
            return Err(ConfigError::OutOfRange {
                field: "page_size",
                value: page_size as u64,
                expected: "1..=500",
            });
        }
        if let Some(delay) = self.auto_resume_delay_ms
            && delay > MAX_AUTO_RESUME_DELAY_MS
        {
            return Err(ConfigError::OutOfRange {
                field: "auto_resume_delay_ms",
                value: delay,
                expected: "0..=10000",
            });
        }
        Ok(())
    }

    /// Effective default page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Effective auto-resume delay.
    #[must_use]
    pub fn auto_resume_delay(&self) -> Duration {
        Duration::from_millis(
            self.auto_resume_delay_ms
                .unwrap_or(DEFAULT_AUTO_RESUME_DELAY_MS),
        )
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/download-tracker/config.json`
/// 2. `$HOME/.config/download-tracker/config.json`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("download-tracker")
                .join("config.json"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("download-tracker")
            .join("config.json"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}
