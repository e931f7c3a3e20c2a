// Shared transport configuration for building reqwest::Client instances.
//
// The watchdog bound lives here next to the transport timeout so both
// are configured in one place, but the two are enforced independently:
// reqwest applies `timeout`, the client wraps every call in `watchdog`.

use std::time::Duration;

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout handed to reqwest.
    pub timeout: Duration,
    /// Hard client-side upper bound on a whole request/response cycle.
    pub watchdog: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            watchdog: Duration::from_secs(8),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("fytalink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| crate::error::Error::ClientBuild(e.to_string()))
    }
}
