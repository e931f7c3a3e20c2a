// Plant and sensor endpoints.

use tracing::debug;

use crate::client::FytaClient;
use crate::error::Error;
use crate::models::{PlantDetails, PlantDetailsResponse, UserPlant, UserPlantsResponse};

impl FytaClient {
    /// List every plant on the account.
    ///
    /// `GET /user-plant`
    pub async fn list_plants(&self, token: &str) -> Result<Vec<UserPlant>, Error> {
        let resp: UserPlantsResponse = self.get_json("user-plant", token).await?;
        debug!(count = resp.plants.len(), "plants listed");
        Ok(resp.plants)
    }

    /// List plants that have a paired sensor.
    ///
    /// FYTA reports sensors per plant, so this is `list_plants` filtered on
    /// `sensor.has_sensor`.
    pub async fn list_sensors(&self, token: &str) -> Result<Vec<UserPlant>, Error> {
        let plants = self.list_plants(token).await?;
        Ok(plants.into_iter().filter(UserPlant::has_sensor).collect())
    }

    /// Fetch the latest measurements for one sensor (plant).
    ///
    /// `GET /user-plant/{id}`
    pub async fn get_sensor_data(
        &self,
        token: &str,
        sensor_id: &str,
    ) -> Result<PlantDetails, Error> {
        let resp: PlantDetailsResponse = self
            .get_json(&format!("user-plant/{sensor_id}"), token)
            .await?;
        Ok(resp.plant)
    }
}
