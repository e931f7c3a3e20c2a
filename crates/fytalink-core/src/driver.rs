// ── Driver ──
//
// Single shared handle over the session, entity tables, subscriptions and
// the background refresh task. Cheaply cloneable; the host adapter and the
// refresh task each hold a clone.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashSet;
use fytalink_api::{FytaClient, TransportConfig};
use tokio::sync::{Mutex, Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::SensorApi;
use crate::config::{DriverConfig, clamp_refresh_interval};
use crate::error::CoreError;
use crate::mapper::EntityMapper;
use crate::model::{Credentials, EntityUpdate};
use crate::scheduler::{TickOutcome, refresh_task};
use crate::session::Session;
use crate::store::{CredentialStore, PlantCache};

const UPDATE_CHANNEL_SIZE: usize = 256;

/// Where the refresh loop is within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Authenticating,
    Polling,
}

/// Reachability of the FYTA account, as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

#[derive(Clone)]
pub struct Driver {
    pub(crate) inner: Arc<DriverInner>,
}

pub(crate) struct DriverInner {
    pub(crate) config: DriverConfig,
    pub(crate) session: Session,
    pub(crate) plant_cache: PlantCache,
    pub(crate) mapper: EntityMapper,
    pub(crate) subscriptions: DashSet<String>,
    pub(crate) updates: broadcast::Sender<EntityUpdate>,
    pub(crate) scheduler_state: watch::Sender<SchedulerState>,
    pub(crate) connection_state: watch::Sender<ConnectionState>,
    pub(crate) tick_in_progress: AtomicBool,
    pub(crate) tick_done: Notify,
    refresh_interval_secs: AtomicU64,
    cancel: CancellationToken,
    poll_task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Driver {
    /// Build a driver over any sensor backend. Nothing is loaded or
    /// started; see [`restore`](Self::restore) and
    /// [`start_polling`](Self::start_polling).
    pub fn new(config: DriverConfig, api: Arc<dyn SensorApi>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);
        let (scheduler_state, _) = watch::channel(SchedulerState::Idle);
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(DriverInner {
                session: Session::new(api, CredentialStore::new(&config.config_home)),
                plant_cache: PlantCache::new(&config.config_home),
                mapper: EntityMapper::new(),
                subscriptions: DashSet::new(),
                updates,
                scheduler_state,
                connection_state,
                tick_in_progress: AtomicBool::new(false),
                tick_done: Notify::new(),
                refresh_interval_secs: AtomicU64::new(config.refresh_interval.as_secs()),
                cancel: CancellationToken::new(),
                poll_task: Mutex::new(None),
                config,
            }),
        }
    }

    /// Build a driver talking to the real FYTA API.
    pub fn from_config(config: DriverConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let transport = TransportConfig {
            timeout: config.request_timeout,
            watchdog: config.watchdog_timeout,
        };
        let client = FytaClient::new(config.api_base_url.clone(), &transport)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &DriverConfig {
        &self.inner.config
    }

    pub fn mapper(&self) -> &EntityMapper {
        &self.inner.mapper
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    // ── Setup lifecycle ──────────────────────────────────────────────

    /// Load persisted credentials and the last plant snapshot.
    ///
    /// Returns whether the driver is configured. A corrupt plant cache is
    /// logged and ignored; corrupt credentials are an error.
    pub async fn restore(&self) -> Result<bool, CoreError> {
        let Some(creds) = self.inner.session.store().load()? else {
            debug!("no stored credentials");
            return Ok(false);
        };

        if let Some(secs) = creds.poll_interval_secs {
            self.set_refresh_interval(secs);
        }
        self.inner.session.set_credentials(Some(creds)).await;

        match self.inner.plant_cache.load() {
            Ok(Some(snapshot)) => {
                for plant in &snapshot.plants {
                    self.inner.mapper.apply_reading(&plant.sensor, &plant.reading);
                }
                info!(
                    plants = snapshot.plants.len(),
                    entities = self.inner.mapper.definitions().len(),
                    "restored plant cache"
                );
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ignoring unreadable plant cache"),
        }
        Ok(true)
    }

    pub async fn is_configured(&self) -> bool {
        self.inner.session.is_configured().await
    }

    /// Persist new account credentials, replacing any previous setup.
    ///
    /// Stops the refresh loop; the caller restarts it once setup finishes.
    pub async fn configure(
        &self,
        username: &str,
        password: &str,
        poll_interval_secs: Option<u64>,
    ) -> Result<(), CoreError> {
        self.stop_polling().await;

        let mut creds = Credentials::new(username, password);
        creds.poll_interval_secs = poll_interval_secs
            .map(|secs| clamp_refresh_interval(secs).as_secs());

        self.inner.session.store().save(&creds)?;
        if let Some(secs) = creds.poll_interval_secs {
            self.set_refresh_interval(secs);
        }
        self.inner.session.set_credentials(Some(creds)).await;
        info!(username, "driver configured");
        Ok(())
    }

    /// Log in with the configured credentials and run the first poll.
    ///
    /// A tick already in flight (from `refresh_now`) is waited out, so the
    /// returned outcome always comes from a poll with the new account.
    pub async fn complete_setup(&self) -> Result<TickOutcome, CoreError> {
        self.set_connection_state(ConnectionState::Connecting);
        if let Err(e) = self.inner.session.authenticate().await {
            self.set_connection_state(ConnectionState::Failed);
            return Err(e);
        }
        Ok(self.tick_after_current().await)
    }

    /// Forget the account: stop polling, delete stored state, entities and
    /// subscriptions.
    pub async fn reset(&self) -> Result<(), CoreError> {
        self.stop_polling().await;
        self.inner.session.set_credentials(None).await;
        self.inner.mapper.clear();
        self.inner.subscriptions.clear();
        self.inner.session.store().remove()?;
        self.inner.plant_cache.remove()?;
        self.set_connection_state(ConnectionState::Disconnected);
        info!("driver reset");
        Ok(())
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Subscribe to entity updates. An empty list subscribes every known
    /// entity. Returns the current state of each newly covered entity.
    pub fn subscribe(&self, entity_ids: &[String]) -> Vec<EntityUpdate> {
        let ids: Vec<String> = if entity_ids.is_empty() {
            self.inner
                .mapper
                .definitions()
                .iter()
                .map(|d| d.entity_id.clone())
                .collect()
        } else {
            entity_ids.to_vec()
        };

        let mut current = Vec::new();
        for id in ids {
            if let Some(attributes) = self.inner.mapper.state(&id) {
                current.push(EntityUpdate {
                    entity_id: id.clone(),
                    attributes,
                });
            }
            self.inner.subscriptions.insert(id);
        }
        current
    }

    /// Drop subscriptions. An empty list drops all of them.
    pub fn unsubscribe(&self, entity_ids: &[String]) {
        if entity_ids.is_empty() {
            self.inner.subscriptions.clear();
            return;
        }
        for id in entity_ids {
            self.inner.subscriptions.remove(id);
        }
    }

    pub fn is_subscribed(&self, entity_id: &str) -> bool {
        self.inner.subscriptions.contains(entity_id)
    }

    /// Updates for subscribed entities, as produced by each tick.
    pub fn updates(&self) -> broadcast::Receiver<EntityUpdate> {
        self.inner.updates.subscribe()
    }

    // ── Observable state ─────────────────────────────────────────────

    pub fn scheduler_state(&self) -> watch::Receiver<SchedulerState> {
        self.inner.scheduler_state.subscribe()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub(crate) fn set_scheduler_state(&self, state: SchedulerState) {
        self.inner.scheduler_state.send_replace(state);
    }

    pub(crate) fn set_connection_state(&self, state: ConnectionState) {
        self.inner.connection_state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.inner.refresh_interval_secs.load(Ordering::Relaxed))
    }

    fn set_refresh_interval(&self, secs: u64) {
        let secs = clamp_refresh_interval(secs).as_secs();
        self.inner
            .refresh_interval_secs
            .store(secs, Ordering::Relaxed);
    }

    // ── Background refresh ───────────────────────────────────────────

    /// Spawn the refresh loop if it is not already running.
    pub async fn start_polling(&self) {
        let mut slot = self.inner.poll_task.lock().await;
        if slot.as_ref().is_some_and(|(_, handle)| !handle.is_finished()) {
            return;
        }
        let cancel = self.inner.cancel.child_token();
        let interval = self.refresh_interval();
        let handle = tokio::spawn(refresh_task(self.clone(), interval, cancel.clone()));
        *slot = Some((cancel, handle));
        info!(interval_secs = interval.as_secs(), "polling started");
    }

    /// Cancel the refresh loop. A scheduled tick in flight is dropped, so
    /// this returns without waiting on the network.
    pub async fn stop_polling(&self) {
        let task = self.inner.poll_task.lock().await.take();
        if let Some((cancel, handle)) = task {
            cancel.cancel();
            let _ = handle.await;
            debug!("polling stopped");
        }
    }

    pub async fn is_polling(&self) -> bool {
        self.inner
            .poll_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    /// Run one tick in the background.
    pub fn refresh_now(&self) -> JoinHandle<TickOutcome> {
        let driver = self.clone();
        tokio::spawn(async move { driver.tick().await })
    }

    /// Stop all background work.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.stop_polling().await;
    }
}
