// ── Sensor API seam ──
//
// The scheduler and session talk to FYTA through this trait so tests can
// substitute a scripted backend. `FytaClient` is the production impl.

use async_trait::async_trait;
use fytalink_api::{AuthTokens, FytaClient};
use secrecy::SecretString;

use crate::convert::{reading_from_details, sensor_from_plant};
use crate::error::CoreError;
use crate::model::{Reading, Sensor};

#[async_trait]
pub trait SensorApi: Send + Sync {
    /// Log in. Never retries.
    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthTokens, CoreError>;

    /// Sensors on the account. A rejected token is `CoreError::Auth`.
    async fn list_sensors(&self, token: &str) -> Result<Vec<Sensor>, CoreError>;

    /// Latest reading for one sensor.
    async fn get_sensor_data(&self, token: &str, sensor_id: &str) -> Result<Reading, CoreError>;
}

#[async_trait]
impl SensorApi for FytaClient {
    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthTokens, CoreError> {
        Ok(FytaClient::authenticate(self, username, password).await?)
    }

    async fn list_sensors(&self, token: &str) -> Result<Vec<Sensor>, CoreError> {
        let plants = FytaClient::list_sensors(self, token).await?;
        Ok(plants.iter().map(sensor_from_plant).collect())
    }

    async fn get_sensor_data(&self, token: &str, sensor_id: &str) -> Result<Reading, CoreError> {
        let details = FytaClient::get_sensor_data(self, token, sensor_id).await?;
        Ok(reading_from_details(&details))
    }
}
