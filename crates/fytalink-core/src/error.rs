// ── Core error types ──
//
// Domain errors from fytalink-core. Consumers never see HTTP status codes
// or reqwest errors directly; the `From<fytalink_api::Error>` impl
// translates transport-layer errors into this taxonomy.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Remote errors ────────────────────────────────────────────────
    /// Bad credentials, or an expired/invalid access token.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Non-auth failure talking to the sensor API.
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    /// The request watchdog fired.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Local persistence ────────────────────────────────────────────
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── Contract violations ──────────────────────────────────────────
    #[error("Unknown measurement type: {0}")]
    UnknownMeasurementType(String),

    // ── Configuration ────────────────────────────────────────────────
    #[error("Driver is not configured -- run setup first")]
    NotConfigured,

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` for auth failures (bad credentials or rejected token).
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Returns `true` if the watchdog fired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the remote could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Api { status: None, .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fytalink_api::Error> for CoreError {
    fn from(err: fytalink_api::Error) -> Self {
        match err {
            fytalink_api::Error::Authentication { message } => Self::Auth { message },
            fytalink_api::Error::TokenRejected => Self::Auth {
                message: "access token rejected".into(),
            },
            // The client reports its own timeouts as `Timeout`; anything
            // left here never reached a usable response.
            fytalink_api::Error::Transport(e) => Self::Api {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            fytalink_api::Error::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            fytalink_api::Error::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            fytalink_api::Error::ClientBuild(message) => Self::Config { message },
            fytalink_api::Error::Api { status, message } => Self::Api {
                message,
                status: Some(status),
            },
            fytalink_api::Error::Deserialization { message, body: _ } => Self::Api {
                message: format!("unexpected response: {message}"),
                status: None,
            },
        }
    }
}
