#![allow(clippy::multiple_crate_versions)]

mod credentials;

pub use crate::credentials::PersistentCredentialStore;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "smctf";

/// Overrides `api_base_url` when set.
pub const API_BASE_ENV: &str = "SMCTF_API_BASE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineConfig {
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,
    #[serde(default = "default_chart_width")]
    pub width: u32,
    /// Label time ticks in the local offset instead of UTC
    #[serde(default = "default_true")]
    pub local_time: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            width: default_chart_width(),
            local_time: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub timeline: TimelineConfig,
    /// `tracing` filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for SmConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            timeline: TimelineConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

fn default_api_base_url() -> String {
    smctf::DEFAULT_BASE_URL.to_string()
}

fn default_log_filter() -> String {
    "warn".to_string()
}

const fn default_window_minutes() -> u32 {
    60
}

const fn default_chart_width() -> u32 {
    720
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum SmConfigError {
    #[error("config error: {0}")]
    Confy(#[from] confy::ConfyError),
    #[error("invalid api base url '{url}': expected http:// or https://")]
    InvalidBaseUrl { url: String },
}

pub type Result<T> = std::result::Result<T, SmConfigError>;

impl SmConfig {
    /// Loads the config file from the standard OS location, then applies
    /// the `SMCTF_API_BASE` override.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be read or deserialized,
    /// or the resulting base URL is not an HTTP URL.
    pub fn load() -> Result<Self> {
        let config: Self = confy::load(APP_NAME, None)?;
        config
            .with_base_url_override(std::env::var(API_BASE_ENV).ok())
            .validated()
    }

    /// Loads from an explicit file, creating it with defaults when missing.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or deserialized.
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(confy::load_path(path)?)
    }

    /// Stores the config to the standard OS location.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn store(&self) -> Result<()> {
        confy::store(APP_NAME, None, self)?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn store_path(&self, path: impl AsRef<Path>) -> Result<()> {
        confy::store_path(path, self)?;
        Ok(())
    }

    /// Location of the config file.
    ///
    /// # Errors
    /// Returns an error if the OS config directory cannot be determined.
    pub fn path() -> Result<PathBuf> {
        Ok(confy::get_configuration_file_path(APP_NAME, None)?)
    }

    /// Replaces the base URL when `value` is a non-blank string.
    #[must_use]
    pub fn with_base_url_override(mut self, value: Option<String>) -> Self {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        self
    }

    fn validated(self) -> Result<Self> {
        let url = self.api_base_url.trim();
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(self)
        } else {
            Err(SmConfigError::InvalidBaseUrl {
                url: self.api_base_url,
            })
        }
    }
}
