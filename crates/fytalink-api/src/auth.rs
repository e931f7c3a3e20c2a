// FYTA authentication
//
// Email/password login against `POST /auth/login`. FYTA hands back a bearer
// token with a lifetime; there is no cookie state on the client.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use crate::client::{FytaClient, decode, preview};
use crate::error::Error;
use crate::models::{AuthTokens, LoginResponse};

impl FytaClient {
    /// Authenticate with FYTA using email/password.
    ///
    /// Succeeds only on a 2xx response carrying an `access_token`. Never
    /// retries: retry policy belongs to the caller.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthTokens, Error> {
        debug!("authenticating with FYTA");

        let body = json!({
            "email": email,
            "password": password.expose_secret(),
        });

        let (status, text) = self
            .request(Method::POST, "auth/login", Some(&body), None)
            .await?;

        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {}", preview(&text)),
            });
        }

        let login: LoginResponse = decode(&text)?;
        let access_token = login
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication {
                message: "login response carried no access token".into(),
            })?;

        debug!(expires_in = ?login.expires_in, "login successful");
        Ok(AuthTokens {
            access_token,
            refresh_token: login.refresh_token,
            expires_in: login.expires_in,
        })
    }
}
