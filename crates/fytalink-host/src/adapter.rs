// ── Host adapter ──
//
// Turns decoded remote messages into driver calls and driver activity into
// outbound frames. Responses go back to the requesting connection; events
// fan out to every connection through a broadcast channel.

use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fytalink_core::{ConnectionState, CoreError, Driver, TickOutcome};

use crate::entities::{available_entity, entity_state};
use crate::metadata::DriverMetadata;
use crate::protocol::{
    DriverUserData, EntityCommand, ErrorCode, Inbound, Outbound, ProtocolError, RemoteEvent,
    Request, SetupDriver,
};

const EVENT_CHANNEL_SIZE: usize = 256;

/// Remote protocol version this driver speaks.
pub const API_VERSION: &str = "0.12.0";

#[derive(Clone)]
pub struct Adapter {
    inner: Arc<AdapterInner>,
}

struct AdapterInner {
    driver: Driver,
    metadata: DriverMetadata,
    events: broadcast::Sender<Outbound>,
    setup_task: Mutex<Option<JoinHandle<()>>>,
}

/// Credentials extracted from setup input.
struct SetupInput {
    email: String,
    password: String,
    refresh_interval: Option<u64>,
}

impl Adapter {
    pub fn new(driver: Driver, metadata: DriverMetadata) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            inner: Arc::new(AdapterInner {
                driver,
                metadata,
                events,
                setup_task: Mutex::new(None),
            }),
        }
    }

    pub fn driver(&self) -> &Driver {
        &self.inner.driver
    }

    pub fn metadata(&self) -> &DriverMetadata {
        &self.inner.metadata
    }

    /// Events destined for every connected remote.
    pub fn events(&self) -> broadcast::Receiver<Outbound> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: Outbound) {
        // Nobody listening just means no remote is connected.
        let _ = self.inner.events.send(event);
    }

    // ── Inbound dispatch ─────────────────────────────────────────────

    /// Handle one text frame; returns the frames owed to this connection.
    pub async fn handle_text(&self, text: &str) -> Vec<Outbound> {
        match Inbound::parse(text) {
            Ok(Inbound::Request { id, request }) => self.handle_request(id, request).await,
            Ok(Inbound::Event(event)) => {
                self.handle_event(event).await;
                Vec::new()
            }
            Err(ProtocolError::UnknownRequest { id, msg }) => {
                warn!(%msg, "unsupported request");
                vec![Outbound::error(
                    id,
                    ErrorCode::NotImplemented,
                    format!("unsupported request: {msg}"),
                )]
            }
            Err(e) => {
                warn!(error = %e, "ignoring inbound frame");
                Vec::new()
            }
        }
    }

    pub async fn handle_request(&self, id: u64, request: Request) -> Vec<Outbound> {
        debug!(id, ?request, "request");
        let driver = &self.inner.driver;
        match request {
            Request::GetDriverVersion => vec![Outbound::response(
                id,
                "driver_version",
                json!({
                    "name": self.inner.metadata.display_name(),
                    "version": { "api": API_VERSION, "driver": self.inner.metadata.version },
                }),
            )],
            Request::GetDriverMetadata => vec![Outbound::response(
                id,
                "driver_metadata",
                self.inner.metadata.raw().clone(),
            )],
            Request::GetDeviceState => {
                let state = *driver.connection_state().borrow();
                vec![Outbound::response(
                    id,
                    "device_state",
                    json!({ "state": device_state_name(state) }),
                )]
            }
            Request::GetAvailableEntities => {
                let mapper = driver.mapper();
                let entities: Vec<Value> = mapper
                    .definitions()
                    .iter()
                    .map(|def| available_entity(def, mapper.state(&def.entity_id).as_ref()))
                    .collect();
                vec![Outbound::response(
                    id,
                    "available_entities",
                    json!({ "available_entities": entities }),
                )]
            }
            Request::GetEntityStates => {
                let states: Vec<Value> = driver
                    .mapper()
                    .states()
                    .iter()
                    .map(|u| entity_state(&u.entity_id, &u.attributes))
                    .collect();
                vec![Outbound::response(id, "entity_states", Value::Array(states))]
            }
            Request::SubscribeEvents(ids) => {
                let current = driver.subscribe(&ids.entity_ids);
                info!(
                    requested = ids.entity_ids.len(),
                    pushed = current.len(),
                    "subscribed"
                );
                let mut out = vec![Outbound::ok(id)];
                out.extend(
                    current
                        .into_iter()
                        .map(|u| Outbound::entity_change(&u.entity_id, u.attributes)),
                );
                out
            }
            Request::UnsubscribeEvents(ids) => {
                driver.unsubscribe(&ids.entity_ids);
                vec![Outbound::ok(id)]
            }
            Request::EntityCommand(cmd) => vec![self.entity_command(id, &cmd)],
            Request::SetupDriver(setup) => self.setup_driver(id, setup).await,
            Request::SetDriverUserData(data) => self.set_driver_user_data(id, data).await,
        }
    }

    pub async fn handle_event(&self, event: RemoteEvent) {
        let driver = &self.inner.driver;
        match event {
            RemoteEvent::Connect => {
                info!("remote connected");
                let configured = driver.is_configured().await;
                let state = match *driver.connection_state().borrow() {
                    ConnectionState::Disconnected if configured => ConnectionState::Connected,
                    other => other,
                };
                self.emit(Outbound::device_state(device_state_name(state)));
            }
            RemoteEvent::Disconnect => info!("remote disconnected"),
            RemoteEvent::EnterStandby => debug!("remote entering standby"),
            RemoteEvent::ExitStandby => {
                debug!("remote left standby, refreshing");
                if driver.is_configured().await {
                    drop(driver.refresh_now());
                }
            }
            RemoteEvent::AbortDriverSetup => {
                let task = self.lock_setup_task().take();
                if let Some(task) = task {
                    task.abort();
                    info!("driver setup aborted");
                    // The credentials are already stored; keep retrying them.
                    if driver.is_configured().await {
                        driver.start_polling().await;
                    }
                }
            }
        }
    }

    fn entity_command(&self, id: u64, cmd: &EntityCommand) -> Outbound {
        if self.inner.driver.mapper().definition(&cmd.entity_id).is_none() {
            return Outbound::error(
                id,
                ErrorCode::NotFound,
                format!("unknown entity {}", cmd.entity_id),
            );
        }
        debug!(entity_id = %cmd.entity_id, cmd_id = %cmd.cmd_id, "command on read-only sensor");
        Outbound::error(
            id,
            ErrorCode::NotImplemented,
            "sensor entities do not support commands",
        )
    }

    // ── Setup ────────────────────────────────────────────────────────

    async fn setup_driver(&self, id: u64, setup: SetupDriver) -> Vec<Outbound> {
        let input = match SetupInput::from_values(&setup.setup_data) {
            Ok(input) => input,
            Err(message) => return vec![Outbound::error(id, ErrorCode::BadRequest, message)],
        };

        if setup.reconfigure {
            if let Err(e) = self.inner.driver.reset().await {
                warn!(error = %e, "could not clear previous setup");
            }
        }
        self.begin_setup(id, input).await
    }

    async fn set_driver_user_data(&self, id: u64, data: DriverUserData) -> Vec<Outbound> {
        if data.input_values.is_empty() {
            return vec![Outbound::ok(id)];
        }
        match SetupInput::from_values(&data.input_values) {
            Ok(input) => self.begin_setup(id, input).await,
            Err(message) => vec![Outbound::error(id, ErrorCode::BadRequest, message)],
        }
    }

    /// Persist, acknowledge, then finish in the background.
    async fn begin_setup(&self, id: u64, input: SetupInput) -> Vec<Outbound> {
        let driver = &self.inner.driver;
        if let Err(e) = driver
            .configure(&input.email, &input.password, input.refresh_interval)
            .await
        {
            warn!(error = %e, "setup could not be persisted");
            return vec![Outbound::error(id, ErrorCode::ServerError, e.to_string())];
        }

        let adapter = self.clone();
        let task = tokio::spawn(async move { adapter.finish_setup().await });
        if let Some(previous) = self.lock_setup_task().replace(task) {
            previous.abort();
        }

        vec![Outbound::ok(id), Outbound::setup_change("START", "SETUP", None)]
    }

    async fn finish_setup(&self) {
        let driver = &self.inner.driver;
        let result = match driver.complete_setup().await {
            Ok(TickOutcome::AuthFailed(e) | TickOutcome::ListFailed(e)) | Err(e) => Err(e),
            Ok(TickOutcome::NotConfigured) => Err(CoreError::NotConfigured),
            Ok(outcome) => Ok(outcome),
        };
        driver.start_polling().await;

        let event = match result {
            Ok(outcome) => {
                info!(?outcome, "driver setup complete");
                Outbound::setup_change("STOP", "OK", None)
            }
            Err(e) => {
                warn!(error = %e, "driver setup failed");
                Outbound::setup_change("STOP", "ERROR", Some(setup_error_code(&e)))
            }
        };
        self.emit(event);
    }

    fn lock_setup_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .setup_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // ── Driver → remote ──────────────────────────────────────────────

    /// Forward entity updates and connection changes as events until
    /// cancelled.
    pub fn spawn_forwarder(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let adapter = self.clone();
        tokio::spawn(async move { adapter.forward(cancel).await })
    }

    async fn forward(&self, cancel: CancellationToken) {
        let mut updates = self.inner.driver.updates();
        let mut connection = self.inner.driver.connection_state();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                update = updates.recv() => match update {
                    Ok(update) => {
                        self.emit(Outbound::entity_change(&update.entity_id, update.attributes));
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "entity update forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = connection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *connection.borrow_and_update();
                    self.emit(Outbound::device_state(device_state_name(state)));
                }
            }
        }
    }
}

impl SetupInput {
    fn from_values(values: &Map<String, Value>) -> Result<Self, String> {
        let text = |key: &str| {
            values
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        let email = text("email").ok_or("missing field: email")?;
        let password = values
            .get("password")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or("missing field: password")?
            .to_owned();
        let refresh_interval = values.get("refresh_interval").and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });

        Ok(Self {
            email,
            password,
            refresh_interval,
        })
    }
}

fn device_state_name(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "DISCONNECTED",
        ConnectionState::Connecting => "CONNECTING",
        ConnectionState::Connected => "CONNECTED",
        ConnectionState::Failed => "ERROR",
    }
}

/// Setup error vocabulary understood by the remote.
fn setup_error_code(err: &CoreError) -> &'static str {
    match err {
        CoreError::Auth { .. } => "AUTHORIZATION_ERROR",
        CoreError::Timeout { .. } => "TIMEOUT",
        e if e.is_unreachable() => "CONNECTION_REFUSED",
        _ => "OTHER",
    }
}
