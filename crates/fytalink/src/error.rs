//! Startup errors with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use fytalink_config::ConfigError;
use fytalink_core::CoreError;
use fytalink_host::HostError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const METADATA: i32 = 3;
    pub const BIND: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum DriverError {
    #[error("Invalid configuration")]
    #[diagnostic(
        code(fytalink::config),
        help(
            "Check fytalink.toml in the config home and the UC_* environment variables.\n\
             The refresh interval must be between 60 and 3600 seconds."
        )
    )]
    Config(#[source] ConfigError),

    #[error("Could not load the driver descriptor")]
    #[diagnostic(
        code(fytalink::metadata),
        help("Point --driver-metadata (or UC_DRIVER_METADATA) at a valid driver.json.")
    )]
    Metadata(#[source] HostError),

    #[error("Could not start the integration server")]
    #[diagnostic(
        code(fytalink::bind),
        help("Another process may own the port. Try --port or UC_INTEGRATION_HTTP_PORT.")
    )]
    Bind(#[source] HostError),

    #[error("Driver failed")]
    #[diagnostic(code(fytalink::driver))]
    Core(#[from] CoreError),

    #[error("Integration server failed")]
    #[diagnostic(code(fytalink::server))]
    Server(#[source] HostError),
}

impl DriverError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => exit_code::CONFIG,
            Self::Metadata(_) => exit_code::METADATA,
            Self::Bind(_) => exit_code::BIND,
            Self::Core(CoreError::Config { .. }) => exit_code::CONFIG,
            Self::Core(_) | Self::Server(_) => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for DriverError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}
