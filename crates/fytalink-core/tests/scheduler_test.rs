#![allow(clippy::unwrap_used)]
// Refresh scheduler and session behaviour against a scripted sensor API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use tokio::sync::Notify;

use fytalink_api::AuthTokens;
use fytalink_core::store::{CachedPlant, PlantSnapshot};
use fytalink_core::{
    CoreError, Credentials, CredentialStore, Driver, DriverConfig, MeasurementValue, PlantCache,
    Reading, SchedulerState, Sensor, SensorApi, TickOutcome,
};

// ── Scripted backend ────────────────────────────────────────────────

#[derive(Default)]
struct FakeApi {
    calls: Mutex<Vec<String>>,
    reject_login: bool,
    /// Number of `list_sensors` calls to answer with a token rejection.
    reject_listings: AtomicUsize,
    /// Number of `get_sensor_data` calls to answer with a token rejection.
    reject_readings: AtomicUsize,
    login_gate: Option<Arc<Notify>>,
    /// Holds the first `get_sensor_data` call until notified.
    fetch_gate: Mutex<Option<Arc<Notify>>>,
    sensors: Vec<Sensor>,
    readings: HashMap<String, Reading>,
}

impl FakeApi {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl SensorApi for FakeApi {
    async fn authenticate(
        &self,
        _username: &str,
        _password: &SecretString,
    ) -> Result<AuthTokens, CoreError> {
        self.record("authenticate");
        if let Some(gate) = &self.login_gate {
            gate.notified().await;
        }
        if self.reject_login {
            return Err(CoreError::Auth {
                message: "bad password".into(),
            });
        }
        Ok(AuthTokens {
            access_token: "fresh".into(),
            refresh_token: None,
            expires_in: Some(3600),
        })
    }

    async fn list_sensors(&self, token: &str) -> Result<Vec<Sensor>, CoreError> {
        self.record(format!("list:{token}"));
        if take_one(&self.reject_listings) {
            return Err(CoreError::Auth {
                message: "access token rejected".into(),
            });
        }
        Ok(self.sensors.clone())
    }

    async fn get_sensor_data(&self, _token: &str, sensor_id: &str) -> Result<Reading, CoreError> {
        self.record(format!("get:{sensor_id}"));
        let gate = self.fetch_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if take_one(&self.reject_readings) {
            return Err(CoreError::Auth {
                message: "access token rejected".into(),
            });
        }
        self.readings.get(sensor_id).cloned().ok_or(CoreError::Api {
            message: "not found".into(),
            status: Some(404),
        })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Decrement a counter if it is non-zero; true if it was.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn sensor(id: &str, name: &str) -> Sensor {
    Sensor {
        id: id.into(),
        name: name.into(),
        battery_level: None,
        battery_low: false,
    }
}

fn temperature(value: f64) -> Reading {
    Reading {
        temperature: Some(MeasurementValue::new(value)),
        ..Reading::default()
    }
}

fn one_sensor_api() -> FakeApi {
    FakeApi {
        sensors: vec![sensor("101", "Monstera")],
        readings: HashMap::from([("101".to_string(), temperature(21.5))]),
        ..FakeApi::default()
    }
}

fn config(dir: &tempfile::TempDir) -> DriverConfig {
    DriverConfig {
        config_home: dir.path().to_path_buf(),
        ..DriverConfig::default()
    }
}

/// Store credentials on disk and restore a driver from them.
async fn driver_with(
    dir: &tempfile::TempDir,
    api: Arc<FakeApi>,
    token: Option<(&str, i64)>,
) -> Driver {
    let mut creds = Credentials::new("ann@example.com", "hunter2");
    if let Some((access, expires_at)) = token {
        creds.access_token = Some(access.into());
        creds.token_expires_at = Some(expires_at);
    }
    CredentialStore::new(dir.path()).save(&creds).unwrap();

    let driver = Driver::new(config(dir), api);
    assert!(driver.restore().await.unwrap());
    driver
}

fn far_future() -> i64 {
    chrono::Utc::now().timestamp_millis() + 3_600_000
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn unconfigured_tick_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(one_sensor_api());
    let driver = Driver::new(config(&dir), api.clone());

    assert!(!driver.restore().await.unwrap());
    assert!(matches!(driver.tick().await, TickOutcome::NotConfigured));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn expired_token_authenticates_before_any_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(one_sensor_api());
    let driver = driver_with(&dir, api.clone(), Some(("stale", 1_000))).await;

    let outcome = driver.tick().await;

    assert!(outcome.is_completed(), "got {outcome:?}");
    assert_eq!(api.calls(), ["authenticate", "list:fresh", "get:101"]);

    // The fresh token was persisted.
    let stored = CredentialStore::new(dir.path()).load().unwrap().unwrap();
    assert_eq!(stored.access_token.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn valid_token_skips_authentication() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(one_sensor_api());
    let driver = driver_with(&dir, api.clone(), Some(("cached", far_future()))).await;

    assert!(driver.tick().await.is_completed());
    assert_eq!(api.calls(), ["list:cached", "get:101"]);
}

#[tokio::test]
async fn auth_failure_leaves_states_untouched() {
    let dir = tempfile::tempdir().unwrap();
    PlantCache::new(dir.path())
        .save(&PlantSnapshot {
            fetched_at: 1,
            plants: vec![CachedPlant {
                sensor: sensor("101", "Monstera"),
                reading: temperature(19.0),
            }],
        })
        .unwrap();

    let api = Arc::new(FakeApi {
        reject_login: true,
        ..one_sensor_api()
    });
    let driver = driver_with(&dir, api.clone(), None).await;
    let before = driver.mapper().states();
    assert_eq!(before.len(), 1);

    let outcome = driver.tick().await;

    assert!(matches!(outcome, TickOutcome::AuthFailed(CoreError::Auth { .. })));
    assert_eq!(api.calls(), ["authenticate"]);
    assert_eq!(driver.mapper().states(), before);
    assert_eq!(*driver.scheduler_state().borrow(), SchedulerState::Idle);
}

#[tokio::test]
async fn rejected_listing_reauthenticates_once() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeApi {
        reject_listings: AtomicUsize::new(1),
        ..one_sensor_api()
    });
    let driver = driver_with(&dir, api.clone(), Some(("revoked", far_future()))).await;

    assert!(driver.tick().await.is_completed());
    assert_eq!(
        api.calls(),
        ["list:revoked", "authenticate", "list:fresh", "get:101"]
    );
}

#[tokio::test]
async fn repeated_rejection_fails_the_tick() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeApi {
        reject_listings: AtomicUsize::new(5),
        ..one_sensor_api()
    });
    let driver = driver_with(&dir, api.clone(), Some(("revoked", far_future()))).await;

    assert!(matches!(driver.tick().await, TickOutcome::ListFailed(_)));
    assert_eq!(api.calls(), ["list:revoked", "authenticate", "list:fresh"]);
}

#[tokio::test]
async fn rejected_reading_reauthenticates_and_retries() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeApi {
        reject_readings: AtomicUsize::new(1),
        ..one_sensor_api()
    });
    let driver = driver_with(&dir, api.clone(), Some(("revoked", far_future()))).await;

    let outcome = driver.tick().await;

    assert!(
        matches!(outcome, TickOutcome::Completed { failed: 0, updates: 1, .. }),
        "got {outcome:?}"
    );
    assert_eq!(
        api.calls(),
        ["list:revoked", "get:101", "authenticate", "get:101"]
    );
    let stored = CredentialStore::new(dir.path()).load().unwrap().unwrap();
    assert_eq!(stored.access_token.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn reading_reauthentication_happens_once_per_tick() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeApi {
        reject_readings: AtomicUsize::new(5),
        sensors: vec![sensor("1", "Basil"), sensor("2", "Fern")],
        ..FakeApi::default()
    });
    let driver = driver_with(&dir, api.clone(), Some(("revoked", far_future()))).await;

    let outcome = driver.tick().await;

    assert!(
        matches!(outcome, TickOutcome::Completed { sensors: 2, failed: 2, .. }),
        "got {outcome:?}"
    );
    assert_eq!(
        api.calls(),
        ["list:revoked", "get:1", "authenticate", "get:1", "get:2"]
    );
}

#[tokio::test]
async fn failed_sensor_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeApi {
        sensors: vec![sensor("1", "Broken"), sensor("2", "Basil")],
        readings: HashMap::from([("2".to_string(), temperature(23.0))]),
        ..FakeApi::default()
    });
    let driver = driver_with(&dir, api.clone(), Some(("t", far_future()))).await;

    let outcome = driver.tick().await;

    assert!(
        matches!(
            outcome,
            TickOutcome::Completed {
                sensors: 2,
                failed: 1,
                updates: 1
            }
        ),
        "got {outcome:?}"
    );
    assert!(driver.mapper().state("2_temperature").is_some());

    let cached = PlantCache::new(dir.path()).load().unwrap().unwrap();
    assert_eq!(cached.plants.len(), 1);
    assert_eq!(cached.plants[0].sensor.id, "2");
}

#[tokio::test]
async fn overlapping_tick_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Notify::new());
    let api = Arc::new(FakeApi {
        login_gate: Some(gate.clone()),
        ..one_sensor_api()
    });
    let driver = driver_with(&dir, api.clone(), None).await;

    let mut state = driver.scheduler_state();
    let first = driver.refresh_now();
    state
        .wait_for(|s| *s == SchedulerState::Authenticating)
        .await
        .unwrap();

    assert!(matches!(driver.tick().await, TickOutcome::Skipped));

    gate.notify_one();
    assert!(first.await.unwrap().is_completed());
    assert_eq!(api.calls(), ["authenticate", "list:fresh", "get:101"]);
}

#[tokio::test(start_paused = true)]
async fn stopping_interrupts_a_scheduled_tick() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeApi {
        fetch_gate: Mutex::new(Some(Arc::new(Notify::new()))),
        ..one_sensor_api()
    });
    let driver = driver_with(&dir, api.clone(), Some(("cached", far_future()))).await;

    let mut state = driver.scheduler_state();
    driver.start_polling().await;
    state
        .wait_for(|s| *s == SchedulerState::Polling)
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), driver.stop_polling())
        .await
        .expect("stop_polling waited for the running tick");

    assert!(!driver.is_polling().await);
    assert_eq!(*driver.scheduler_state().borrow(), SchedulerState::Idle);
    // The interrupted tick released the single-flight guard.
    assert!(driver.tick().await.is_completed());
}

#[tokio::test]
async fn setup_polls_after_a_running_tick() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Notify::new());
    let api = Arc::new(FakeApi {
        fetch_gate: Mutex::new(Some(gate.clone())),
        ..one_sensor_api()
    });
    let driver = driver_with(&dir, api.clone(), Some(("cached", far_future()))).await;

    let mut state = driver.scheduler_state();
    let running = driver.refresh_now();
    state
        .wait_for(|s| *s == SchedulerState::Polling)
        .await
        .unwrap();

    let setup = tokio::spawn({
        let driver = driver.clone();
        async move { driver.complete_setup().await }
    });
    while !api.calls().iter().any(|c| c == "authenticate") {
        tokio::task::yield_now().await;
    }

    gate.notify_one();
    assert!(running.await.unwrap().is_completed());
    let outcome = setup.await.unwrap().unwrap();
    assert!(outcome.is_completed(), "got {outcome:?}");
    assert_eq!(
        api.calls(),
        ["list:cached", "get:101", "authenticate", "list:fresh", "get:101"]
    );
}

#[tokio::test]
async fn only_subscribed_entities_are_published() {
    let dir = tempfile::tempdir().unwrap();
    let mut readings = temperature(21.5);
    readings.moisture = Some(MeasurementValue::new(40.0));
    let api = Arc::new(FakeApi {
        sensors: vec![sensor("101", "Monstera")],
        readings: HashMap::from([("101".to_string(), readings)]),
        ..FakeApi::default()
    });
    let driver = driver_with(&dir, api, Some(("t", far_future()))).await;

    driver.subscribe(&["101_moisture".to_string()]);
    let mut updates = driver.updates();

    assert!(matches!(
        driver.tick().await,
        TickOutcome::Completed { updates: 2, .. }
    ));

    let update = updates.try_recv().unwrap();
    assert_eq!(update.entity_id, "101_moisture");
    assert!(updates.try_recv().is_err());
}

#[tokio::test]
async fn subscribe_returns_current_state() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(one_sensor_api());
    let driver = driver_with(&dir, api, Some(("t", far_future()))).await;
    driver.tick().await;

    let current = driver.subscribe(&[]);
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].entity_id, "101_temperature");
    assert!(driver.is_subscribed("101_temperature"));

    driver.unsubscribe(&[]);
    assert!(!driver.is_subscribed("101_temperature"));
}

#[tokio::test]
async fn configure_persists_and_reset_forgets() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(one_sensor_api());
    let driver = Driver::new(config(&dir), api);

    driver
        .configure("ann@example.com", "hunter2", Some(10))
        .await
        .unwrap();
    assert!(driver.is_configured().await);
    assert_eq!(driver.refresh_interval().as_secs(), 60);

    let stored = CredentialStore::new(dir.path()).load().unwrap().unwrap();
    assert_eq!(stored.username, "ann@example.com");
    assert_eq!(stored.poll_interval_secs, Some(60));

    assert!(driver.complete_setup().await.unwrap().is_completed());
    assert_eq!(driver.mapper().definitions().len(), 1);
    driver.subscribe(&[]);
    assert!(driver.is_subscribed("101_temperature"));

    driver.reset().await.unwrap();
    assert!(!driver.is_configured().await);
    assert!(!driver.is_subscribed("101_temperature"));
    assert!(driver.mapper().definitions().is_empty());
    assert_eq!(CredentialStore::new(dir.path()).load().unwrap(), None);
}
