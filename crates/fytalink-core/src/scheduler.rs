// ── Refresh scheduler ──
//
// One tick: make sure a token exists, list sensors, fetch each reading,
// merge through the mapper and publish changes for subscribed entities.
// Ticks never overlap; a tick that finds another running is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::driver::{ConnectionState, Driver, SchedulerState};
use crate::error::CoreError;
use crate::model::{Reading, Sensor};
use crate::session::now_ms;
use crate::store::{CachedPlant, PlantSnapshot};

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// Another tick was already running.
    Skipped,
    /// No credentials stored.
    NotConfigured,
    /// Login failed; nothing was fetched.
    AuthFailed(CoreError),
    /// Listing sensors failed.
    ListFailed(CoreError),
    Completed {
        sensors: usize,
        failed: usize,
        /// Changed entities, subscribed or not.
        updates: usize,
    },
}

impl TickOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Marks a tick as running. Dropping it, including when the tick future
/// is cancelled mid-flight, returns the scheduler to `Idle` and wakes
/// anyone waiting for the tick to end.
struct TickGuard<'a>(&'a Driver);

impl<'a> TickGuard<'a> {
    fn acquire(driver: &'a Driver) -> Option<Self> {
        let flag: &AtomicBool = &driver.inner.tick_in_progress;
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(driver))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.set_scheduler_state(SchedulerState::Idle);
        self.0.inner.tick_in_progress.store(false, Ordering::Release);
        self.0.inner.tick_done.notify_waiters();
    }
}

impl Driver {
    /// Run one refresh cycle.
    pub async fn tick(&self) -> TickOutcome {
        let Some(_guard) = TickGuard::acquire(self) else {
            debug!("tick already in progress, skipping");
            return TickOutcome::Skipped;
        };
        self.run_tick().await
    }

    /// Run one refresh cycle, waiting out a tick that is already running
    /// instead of skipping.
    pub async fn tick_after_current(&self) -> TickOutcome {
        loop {
            let done = self.inner.tick_done.notified();
            tokio::pin!(done);
            done.as_mut().enable();
            match self.tick().await {
                TickOutcome::Skipped => {
                    debug!("waiting for running tick to finish");
                    done.await;
                }
                outcome => return outcome,
            }
        }
    }

    async fn run_tick(&self) -> TickOutcome {
        let session = &self.inner.session;
        if !session.is_configured().await {
            return TickOutcome::NotConfigured;
        }

        let token = match session.valid_token().await {
            Some(token) => token,
            None => match self.login().await {
                Ok(token) => token,
                Err(e) => return TickOutcome::AuthFailed(e),
            },
        };

        self.set_scheduler_state(SchedulerState::Polling);
        let (mut token, sensors) = match self.list_sensors(token).await {
            Ok(listed) => listed,
            Err(e) => {
                warn!(error = %e, "listing sensors failed");
                self.set_connection_state(ConnectionState::Failed);
                return TickOutcome::ListFailed(e);
            }
        };
        self.set_connection_state(ConnectionState::Connected);

        let mut reauthenticated = false;
        let mut failed = 0;
        let mut changed = 0;
        let mut snapshot = PlantSnapshot {
            fetched_at: now_ms(),
            plants: Vec::with_capacity(sensors.len()),
        };

        for sensor in &sensors {
            if sensor.battery_low {
                warn!(sensor_id = %sensor.id, name = %sensor.name, "sensor battery low");
            }
            let reading = match self
                .fetch_reading(&mut token, &mut reauthenticated, &sensor.id)
                .await
            {
                Ok(reading) => reading,
                Err(e) => {
                    warn!(sensor_id = %sensor.id, error = %e, "fetching sensor data failed");
                    failed += 1;
                    continue;
                }
            };

            for update in self.inner.mapper.apply_reading(sensor, &reading) {
                changed += 1;
                if self.inner.subscriptions.contains(&update.entity_id) {
                    // No receivers is fine: the host may not be connected.
                    let _ = self.inner.updates.send(update);
                }
            }
            snapshot.plants.push(CachedPlant {
                sensor: sensor.clone(),
                reading,
            });
        }

        if let Err(e) = self.inner.plant_cache.save(&snapshot) {
            warn!(error = %e, "failed to write plant cache");
        }

        info!(
            sensors = sensors.len(),
            failed,
            updates = changed,
            "refresh complete"
        );
        TickOutcome::Completed {
            sensors: sensors.len(),
            failed,
            updates: changed,
        }
    }

    async fn login(&self) -> Result<String, CoreError> {
        self.set_scheduler_state(SchedulerState::Authenticating);
        match self.inner.session.authenticate().await {
            Ok(token) => Ok(token),
            Err(e) => {
                warn!(error = %e, "authentication failed, retrying next tick");
                self.set_connection_state(ConnectionState::Failed);
                Err(e)
            }
        }
    }

    /// List sensors, logging in again once if the token is rejected.
    async fn list_sensors(&self, token: String) -> Result<(String, Vec<Sensor>), CoreError> {
        let api = self.inner.session.api();
        match api.list_sensors(&token).await {
            Ok(sensors) => Ok((token, sensors)),
            Err(e) if e.is_auth() => {
                debug!("token rejected while listing, re-authenticating");
                self.inner.session.invalidate().await;
                let token = self.login().await?;
                self.set_scheduler_state(SchedulerState::Polling);
                let sensors = api.list_sensors(&token).await?;
                Ok((token, sensors))
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch one sensor's reading. The first token rejection in a tick
    /// triggers one login and a retry; `token` is replaced for the rest of
    /// the tick.
    async fn fetch_reading(
        &self,
        token: &mut String,
        reauthenticated: &mut bool,
        sensor_id: &str,
    ) -> Result<Reading, CoreError> {
        let api = self.inner.session.api();
        match api.get_sensor_data(token.as_str(), sensor_id).await {
            Err(e) if e.is_auth() && !*reauthenticated => {
                *reauthenticated = true;
                debug!(sensor_id, "token rejected while fetching, re-authenticating");
                self.inner.session.invalidate().await;
                *token = self.login().await?;
                self.set_scheduler_state(SchedulerState::Polling);
                api.get_sensor_data(token.as_str(), sensor_id).await
            }
            other => other,
        }
    }
}

/// Periodic refresh loop. The first tick fires one interval after start.
/// Cancellation also interrupts a tick that is in flight.
pub(crate) async fn refresh_task(driver: Driver, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!("scheduled tick interrupted");
                        break;
                    }
                    outcome = driver.tick() => debug!(?outcome, "scheduled tick finished"),
                }
            }
        }
    }
}
