// Wire types for the FYTA API.
//
// FYTA is loose with JSON types: ids are integers, measurement values are
// sometimes numbers and sometimes numeric strings, status codes may be null.
// The lenient deserializers below absorb that so callers see plain Rust types.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ── Auth ─────────────────────────────────────────────────────────────

/// Raw login response. `access_token` is optional here so a 2xx without a
/// token can be reported as an auth failure rather than a decode failure.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub expires_in: Option<i64>,
}

/// Tokens returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds, as reported by FYTA.
    pub expires_in: Option<i64>,
}

// ── Plants ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct UserPlantsResponse {
    #[serde(default)]
    pub plants: Vec<UserPlant>,
}

/// One entry of `GET /user-plant`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserPlant {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub sensor: Option<PlantSensor>,
}

impl UserPlant {
    /// Whether a physical sensor is paired with this plant.
    pub fn has_sensor(&self) -> bool {
        self.sensor.as_ref().is_some_and(|s| s.has_sensor)
    }

    /// Display name: nickname, else scientific name, else `Plant <id>`.
    pub fn display_name(&self) -> String {
        self.nickname
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.scientific_name.clone())
            .unwrap_or_else(|| format!("Plant {}", self.id))
    }
}

/// The `sensor` object attached to a plant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlantSensor {
    #[serde(default)]
    pub has_sensor: bool,
    #[serde(default)]
    pub is_battery_low: bool,
    #[serde(default, alias = "battery_level", deserialize_with = "lenient_f64")]
    pub battery: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlantDetailsResponse {
    pub plant: PlantDetails,
}

/// `GET /user-plant/{id}` payload (the inner `plant` object).
#[derive(Debug, Clone, Deserialize)]
pub struct PlantDetails {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub measurements: Measurements,
    #[serde(default)]
    pub sensor: Option<PlantSensor>,
}

/// Measurement groups FYTA reports per plant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Measurements {
    #[serde(default)]
    pub temperature: Option<Measurement>,
    #[serde(default)]
    pub moisture: Option<Measurement>,
    #[serde(default)]
    pub light: Option<Measurement>,
    #[serde(default)]
    pub salinity: Option<Measurement>,
}

/// A single measurement with its FYTA status code (0 = no data .. 5 = too high).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Measurement {
    #[serde(default, deserialize_with = "lenient_u8")]
    pub status: Option<u8>,
    #[serde(default)]
    pub values: MeasurementValues,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeasurementValues {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub current: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub min_good: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_good: Option<f64>,
}

// ── Lenient deserializers ────────────────────────────────────────────

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(value.as_ref().and_then(value_as_f64).filter(|v| v.is_finite()))
}

fn lenient_i64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn lenient_u8<'de, D: Deserializer<'de>>(de: D) -> Result<Option<u8>, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn id_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match Value::deserialize(de)? {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s),
        other => Err(serde::de::Error::custom(format!(
            "expected numeric or string id, got {other}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plant_id_accepts_number_and_string() {
        let a: UserPlant = serde_json::from_value(json!({ "id": 42 })).unwrap();
        let b: UserPlant = serde_json::from_value(json!({ "id": "42" })).unwrap();
        assert_eq!(a.id, "42");
        assert_eq!(b.id, "42");
    }

    #[test]
    fn measurement_values_accept_numeric_strings() {
        let m: Measurement = serde_json::from_value(json!({
            "status": 3,
            "values": { "current": "21.3", "min_good": 18, "max_good": null }
        }))
        .unwrap();
        assert_eq!(m.status, Some(3));
        assert_eq!(m.values.current, Some(21.3));
        assert_eq!(m.values.min_good, Some(18.0));
        assert_eq!(m.values.max_good, None);
    }

    #[test]
    fn garbage_values_become_none() {
        let m: Measurement = serde_json::from_value(json!({
            "status": "n/a",
            "values": { "current": "dry" }
        }))
        .unwrap();
        assert_eq!(m.status, None);
        assert_eq!(m.values.current, None);
    }

    #[test]
    fn display_name_falls_back() {
        let plant: UserPlant = serde_json::from_value(json!({
            "id": 7,
            "nickname": " ",
            "scientific_name": "Ficus lyrata"
        }))
        .unwrap();
        assert_eq!(plant.display_name(), "Ficus lyrata");

        let plant: UserPlant = serde_json::from_value(json!({ "id": 7 })).unwrap();
        assert_eq!(plant.display_name(), "Plant 7");
        assert!(!plant.has_sensor());
    }
}
