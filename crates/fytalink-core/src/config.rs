// ── Runtime driver configuration ──
//
// Describes *where* to talk to FYTA and *how often*. Carries no credential
// data and never reads config files; the binary builds a `DriverConfig`
// from `fytalink-config` settings and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::CoreError;

pub const DEFAULT_API_URL: &str = fytalink_api::FytaClient::DEFAULT_BASE_URL;

/// Default poll interval observed in practice.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;
/// Lower bound for the poll interval.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 60;
/// Upper bound for the poll interval.
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 3600;

/// Configuration for one driver instance.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// FYTA API root (e.g. `https://web.fyta.de/api`).
    pub api_base_url: Url,
    /// Directory holding `credentials.json` and `plants.json`.
    pub config_home: PathBuf,
    /// Poll interval, already clamped to the supported range.
    pub refresh_interval: Duration,
    /// Timeout handed to the HTTP transport.
    pub request_timeout: Duration,
    /// Client-side watchdog bound on every request.
    pub watchdog_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL
                .parse()
                .expect("default FYTA URL is valid"),
            config_home: PathBuf::from("."),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            request_timeout: Duration::from_secs(10),
            watchdog_timeout: Duration::from_secs(8),
        }
    }
}

impl DriverConfig {
    /// Check invariants that the settings layer cannot express.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.watchdog_timeout.is_zero() {
            return Err(CoreError::Config {
                message: "watchdog timeout must be greater than zero".into(),
            });
        }
        if !matches!(self.api_base_url.scheme(), "http" | "https") {
            return Err(CoreError::Config {
                message: format!("unsupported API URL scheme: {}", self.api_base_url),
            });
        }
        Ok(())
    }
}

/// Clamp a requested poll interval into `60..=3600` seconds.
pub fn clamp_refresh_interval(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_REFRESH_INTERVAL_SECS, MAX_REFRESH_INTERVAL_SECS))
}
