//! Command-line flags for the `fytalink` driver.
//!
//! Every flag has a `UC_*` environment fallback matching the variables the
//! remote sets when it launches an integration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use fytalink_config::Settings;

/// fytalink -- FYTA plant sensors for the Unfolded Circle remote
#[derive(Debug, Parser)]
#[command(
    name = "fytalink",
    version,
    about = "Serve FYTA plant sensor readings to an Unfolded Circle remote"
)]
pub struct Cli {
    /// Directory for credentials and the plant cache
    #[arg(long, env = "UC_CONFIG_HOME")]
    pub config_home: Option<PathBuf>,

    /// Interface to listen on
    #[arg(long, env = "UC_INTEGRATION_INTERFACE")]
    pub interface: Option<String>,

    /// WebSocket port
    #[arg(long, short = 'p', env = "UC_INTEGRATION_HTTP_PORT")]
    pub port: Option<u16>,

    /// Path to driver.json
    #[arg(long, env = "UC_DRIVER_METADATA")]
    pub driver_metadata: Option<PathBuf>,

    /// FYTA API base URL
    #[arg(long, env = "UC_FYTA_API_URL", hide_env = true)]
    pub api_url: Option<String>,

    /// Poll interval in seconds (60..=3600)
    #[arg(long, env = "UC_FYTA_REFRESH_INTERVAL")]
    pub refresh_interval: Option<u64>,

    /// Log output format
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Apply flag overrides on top of loaded settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(interface) = &self.interface {
            settings.integration_interface.clone_from(interface);
        }
        if let Some(port) = self.port {
            settings.integration_http_port = port;
        }
        if let Some(path) = &self.driver_metadata {
            settings.driver_metadata.clone_from(path);
        }
        if let Some(url) = &self.api_url {
            settings.fyta_api_url.clone_from(url);
        }
        if let Some(secs) = self.refresh_interval {
            settings.fyta_refresh_interval = secs;
        }
    }
}
