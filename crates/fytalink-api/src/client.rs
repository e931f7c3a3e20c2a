// FYTA HTTP client
//
// Wraps `reqwest::Client` with base-URL handling, bearer auth and the
// watchdog-bounded request primitive. Endpoint groups (auth, plants) are
// inherent methods in separate files to keep this module focused on
// transport mechanics.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw HTTP client for the FYTA cloud API.
///
/// Every call goes through [`request`](Self::request), which enforces the
/// watchdog regardless of how the transport behaves. Dropping the timed-out
/// future aborts the underlying connection.
#[derive(Debug, Clone)]
pub struct FytaClient {
    http: reqwest::Client,
    base_url: Url,
    watchdog: Duration,
    /// Timeout configured on `http`, when known.
    request_timeout: Option<Duration>,
}

impl FytaClient {
    /// Production API root.
    pub const DEFAULT_BASE_URL: &'static str = "https://web.fyta.de/api";

    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `https://web.fyta.de/api`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            watchdog: transport.watchdog,
            request_timeout: Some(transport.timeout),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// Timeouts configured on `http` surface as [`Error::Transport`].
    pub fn with_client(http: reqwest::Client, base_url: Url, watchdog: Duration) -> Self {
        Self {
            http,
            base_url,
            watchdog,
            request_timeout: None,
        }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The watchdog bound applied to every request.
    pub fn watchdog(&self) -> Duration {
        self.watchdog
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an API path: `{base}/{path}`.
    ///
    /// `Url::join` would drop the last base segment (`/api`), so the
    /// path is appended textually instead.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    // ── Request primitive ────────────────────────────────────────────

    /// Send a request and return status plus body text.
    ///
    /// The whole send/read cycle is bounded by the watchdog. On expiry the
    /// in-flight future is dropped and [`Error::Timeout`] is returned.
    pub(crate) async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        bearer: Option<&str>,
    ) -> Result<(StatusCode, String), Error> {
        let url = self.api_url(path)?;
        debug!("{} {}", method, url);

        let mut builder = self.http.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let exchange = async {
            let resp = builder.send().await?;
            let status = resp.status();
            let text = resp.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        match tokio::time::timeout(self.watchdog, exchange).await {
            Ok(result) => {
                let (status, text) = result.map_err(|e| self.transport_error(e))?;
                trace!(%status, bytes = text.len(), "response received");
                Ok((status, text))
            }
            Err(_) => {
                let timeout_ms = millis(self.watchdog);
                warn!(path, timeout_ms, "request watchdog fired");
                Err(Error::Timeout { timeout_ms })
            }
        }
    }

    /// Report a transport-level timeout with the bound that produced it.
    fn transport_error(&self, err: reqwest::Error) -> Error {
        match self.request_timeout {
            Some(timeout) if err.is_timeout() => {
                let timeout_ms = millis(timeout);
                warn!(timeout_ms, "request timed out in transport");
                Error::Timeout { timeout_ms }
            }
            _ => Error::Transport(err),
        }
    }

    /// Authenticated GET that decodes a JSON body.
    ///
    /// 401 maps to [`Error::TokenRejected`], any other non-2xx to
    /// [`Error::Api`].
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, Error> {
        let (status, body) = self.request(Method::GET, path, None, Some(token)).await?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::TokenRejected);
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: preview(&body),
            });
        }

        decode(&body)
    }
}

/// Decode a JSON body, keeping a preview for diagnostics.
pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(body)),
        body: body.to_owned(),
    })
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// First 200 characters of a body, cut on a char boundary.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> FytaClient {
        FytaClient::with_client(
            reqwest::Client::new(),
            Url::parse(base).unwrap(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn api_url_keeps_base_path() {
        let c = client("https://web.fyta.de/api");
        assert_eq!(
            c.api_url("/user-plant").unwrap().as_str(),
            "https://web.fyta.de/api/user-plant"
        );
    }

    #[test]
    fn api_url_tolerates_trailing_slash() {
        let c = client("https://web.fyta.de/api/");
        assert_eq!(
            c.api_url("auth/login").unwrap().as_str(),
            "https://web.fyta.de/api/auth/login"
        );
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let body = "µ".repeat(300);
        assert_eq!(preview(&body).chars().count(), 200);
    }
}
