// ── Token lifecycle ──
//
// Reuses a valid access token, logs in again when it is absent or expired,
// and persists every fresh token. Logins are serialized; the credentials
// lock is never held across a network call.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::SensorApi;
use crate::error::CoreError;
use crate::model::Credentials;
use crate::store::CredentialStore;

pub struct Session {
    api: Arc<dyn SensorApi>,
    store: CredentialStore,
    credentials: Mutex<Option<Credentials>>,
    auth_lock: Mutex<()>,
}

impl Session {
    pub fn new(api: Arc<dyn SensorApi>, store: CredentialStore) -> Self {
        Self {
            api,
            store,
            credentials: Mutex::new(None),
            auth_lock: Mutex::new(()),
        }
    }

    pub fn api(&self) -> &Arc<dyn SensorApi> {
        &self.api
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub async fn credentials(&self) -> Option<Credentials> {
        self.credentials.lock().await.clone()
    }

    pub async fn set_credentials(&self, credentials: Option<Credentials>) {
        *self.credentials.lock().await = credentials;
    }

    pub async fn is_configured(&self) -> bool {
        self.credentials.lock().await.is_some()
    }

    /// The cached access token if it has not expired.
    pub async fn valid_token(&self) -> Option<String> {
        let now = now_ms();
        self.credentials
            .lock()
            .await
            .as_ref()
            .and_then(|c| c.valid_token(now))
            .map(str::to_owned)
    }

    /// A usable token, logging in only if the cached one is unusable.
    pub async fn token(&self) -> Result<String, CoreError> {
        if let Some(token) = self.valid_token().await {
            return Ok(token);
        }
        let _guard = self.auth_lock.lock().await;
        // Another caller may have logged in while we waited.
        if let Some(token) = self.valid_token().await {
            return Ok(token);
        }
        self.login().await
    }

    /// Always log in, replacing any cached token.
    pub async fn authenticate(&self) -> Result<String, CoreError> {
        let _guard = self.auth_lock.lock().await;
        self.login().await
    }

    /// Forget the access token after the API rejected it.
    pub async fn invalidate(&self) {
        if let Some(creds) = self.credentials.lock().await.as_mut() {
            creds.clear_tokens();
            debug!("access token invalidated");
        }
    }

    async fn login(&self) -> Result<String, CoreError> {
        let creds = self
            .credentials
            .lock()
            .await
            .clone()
            .ok_or(CoreError::NotConfigured)?;

        let tokens = self
            .api
            .authenticate(&creds.username, &creds.password_secret())
            .await?;

        let updated = {
            let mut guard = self.credentials.lock().await;
            let current = guard.as_mut().ok_or(CoreError::NotConfigured)?;
            if current.username != creds.username {
                // Setup was replaced while the login was in flight.
                return Err(CoreError::Auth {
                    message: "credentials changed during authentication".into(),
                });
            }
            current.apply_tokens(&tokens, now_ms());
            current.clone()
        };

        if let Err(e) = self.store.save(&updated) {
            warn!(error = %e, "failed to persist refreshed token");
        }
        info!(username = %updated.username, "authenticated with FYTA");
        Ok(tokens.access_token)
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
