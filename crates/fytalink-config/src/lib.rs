//! Driver settings.
//!
//! Layered with figment: built-in defaults, then an optional
//! `fytalink.toml` in the config home, then `UC_*` environment variables.
//! The binary applies CLI overrides on top and translates the result into
//! `fytalink_core::DriverConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use fytalink_core::DriverConfig;
use fytalink_core::config::{
    DEFAULT_API_URL, DEFAULT_REFRESH_INTERVAL_SECS, MAX_REFRESH_INTERVAL_SECS,
    MIN_REFRESH_INTERVAL_SECS,
};

/// Name of the optional settings file inside the config home.
pub const SETTINGS_FILE: &str = "fytalink.toml";

/// Prefix shared by every environment variable the host sets.
pub const ENV_PREFIX: &str = "UC_";

const ENV_KEYS: &[&str] = &[
    "config_home",
    "integration_interface",
    "integration_http_port",
    "driver_metadata",
    "fyta_api_url",
    "fyta_refresh_interval",
    "fyta_watchdog_timeout",
    "fyta_request_timeout",
];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Where credentials and the plant cache live. `None` means the
    /// platform data directory.
    pub config_home: Option<PathBuf>,

    /// Interface the WebSocket server binds to.
    pub integration_interface: String,

    pub integration_http_port: u16,

    /// Path to the `driver.json` descriptor.
    pub driver_metadata: PathBuf,

    pub fyta_api_url: String,

    /// Poll interval in seconds.
    pub fyta_refresh_interval: u64,

    /// Per-request watchdog in milliseconds.
    pub fyta_watchdog_timeout: u64,

    /// HTTP transport timeout in milliseconds.
    pub fyta_request_timeout: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_home: None,
            integration_interface: "0.0.0.0".into(),
            integration_http_port: 9090,
            driver_metadata: PathBuf::from("driver.json"),
            fyta_api_url: DEFAULT_API_URL.into(),
            fyta_refresh_interval: DEFAULT_REFRESH_INTERVAL_SECS,
            fyta_watchdog_timeout: 8_000,
            fyta_request_timeout: 10_000,
        }
    }
}

impl Settings {
    /// Load settings. `config_home` (from the CLI) takes precedence over
    /// `UC_CONFIG_HOME` when locating the settings file.
    pub fn load(config_home: Option<&Path>) -> Result<Self, ConfigError> {
        let env_home: Option<PathBuf> = Figment::new()
            .merge(env_provider())
            .extract_inner("config_home")
            .ok();
        let home = config_home
            .map(Path::to_path_buf)
            .or(env_home)
            .unwrap_or_else(default_config_home);

        let mut settings: Self = Self::figment(&home).extract()?;
        settings.config_home = Some(home);
        Ok(settings)
    }

    /// Defaults, then `<home>/fytalink.toml`, then the environment.
    pub fn figment(home: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(home.join(SETTINGS_FILE)))
            .merge(env_provider())
    }

    pub fn config_home(&self) -> PathBuf {
        self.config_home.clone().unwrap_or_else(default_config_home)
    }

    /// `interface:port` for the WebSocket listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.integration_interface, self.integration_http_port)
    }

    /// Validate and translate into the core driver configuration.
    pub fn to_driver_config(&self) -> Result<DriverConfig, ConfigError> {
        let api_base_url = Url::parse(&self.fyta_api_url).map_err(|e| ConfigError::Validation {
            field: "fyta_api_url".into(),
            reason: e.to_string(),
        })?;

        if !(MIN_REFRESH_INTERVAL_SECS..=MAX_REFRESH_INTERVAL_SECS)
            .contains(&self.fyta_refresh_interval)
        {
            return Err(ConfigError::Validation {
                field: "fyta_refresh_interval".into(),
                reason: format!(
                    "{} is outside {MIN_REFRESH_INTERVAL_SECS}..={MAX_REFRESH_INTERVAL_SECS} seconds",
                    self.fyta_refresh_interval
                ),
            });
        }

        if self.fyta_watchdog_timeout == 0 {
            return Err(ConfigError::Validation {
                field: "fyta_watchdog_timeout".into(),
                reason: "must be greater than zero".into(),
            });
        }

        Ok(DriverConfig {
            api_base_url,
            config_home: self.config_home(),
            refresh_interval: Duration::from_secs(self.fyta_refresh_interval),
            request_timeout: Duration::from_millis(self.fyta_request_timeout),
            watchdog_timeout: Duration::from_millis(self.fyta_watchdog_timeout),
        })
    }
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).only(ENV_KEYS)
}

/// Platform data directory, falling back to the working directory.
pub fn default_config_home() -> PathBuf {
    ProjectDirs::from("de", "fyta", "fytalink")
        .map_or_else(|| PathBuf::from("."), |dirs| dirs.data_dir().to_path_buf())
}
