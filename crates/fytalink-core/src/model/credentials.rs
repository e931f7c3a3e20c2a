// Stored account credentials and the cached bearer token.

use std::fmt;

use fytalink_api::AuthTokens;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Tokens are treated as expired this long before FYTA says they are.
pub const TOKEN_EXPIRY_MARGIN_MS: i64 = 60_000;

/// Lifetime assumed when the login response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// The persisted account record.
///
/// Created on first setup, mutated on every re-authentication.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(alias = "email")]
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<i64>,
    /// Poll interval chosen during setup, seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            access_token: None,
            refresh_token: None,
            token_expires_at: None,
            poll_interval_secs: None,
        }
    }

    pub fn password_secret(&self) -> SecretString {
        self.password.clone().into()
    }

    /// The access token, if it is still good at `now_ms`.
    pub fn valid_token(&self, now_ms: i64) -> Option<&str> {
        let token = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        let expires_at = self.token_expires_at?;
        (expires_at - TOKEN_EXPIRY_MARGIN_MS > now_ms).then_some(token)
    }

    /// Record a fresh login.
    pub fn apply_tokens(&mut self, tokens: &AuthTokens, now_ms: i64) {
        let lifetime = tokens
            .expires_in
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        self.access_token = Some(tokens.access_token.clone());
        if tokens.refresh_token.is_some() {
            self.refresh_token.clone_from(&tokens.refresh_token);
        }
        self.token_expires_at = Some(now_ms.saturating_add(lifetime.saturating_mul(1000)));
    }

    pub fn clear_tokens(&mut self) {
        self.access_token = None;
        self.token_expires_at = None;
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_expires_at", &self.token_expires_at)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish()
    }
}
