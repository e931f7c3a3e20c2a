// Entities republished to the host.

use serde::Serialize;
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// The fixed set of measurements a sensor can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MeasurementType {
    Temperature,
    Moisture,
    Light,
    Fertility,
    Battery,
}

/// Unit and range attached to every entity of one measurement type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttributeSchema {
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl MeasurementType {
    pub fn schema(self) -> AttributeSchema {
        let (unit, min, max, step) = match self {
            Self::Temperature => ("°C", -10.0, 50.0, 0.1),
            Self::Moisture => ("%", 0.0, 100.0, 1.0),
            Self::Light => ("lux", 0.0, 100_000.0, 1.0),
            Self::Fertility => ("µS/cm", 0.0, 1000.0, 1.0),
            Self::Battery => ("%", 0.0, 100.0, 1.0),
        };
        AttributeSchema { unit, min, max, step }
    }

    /// Decimal places implied by the step.
    pub fn decimals(self) -> u8 {
        if self.schema().step < 1.0 { 1 } else { 0 }
    }

    /// Human label used in display names.
    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Moisture => "Moisture",
            Self::Light => "Light",
            Self::Fertility => "Fertility",
            Self::Battery => "Battery",
        }
    }
}

/// Static description of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDefinition {
    pub entity_id: String,
    pub sensor_id: String,
    pub name: String,
    pub measurement: MeasurementType,
    pub schema: AttributeSchema,
}

impl EntityDefinition {
    pub fn new(sensor_id: &str, sensor_name: &str, measurement: MeasurementType) -> Self {
        Self {
            entity_id: entity_id(sensor_id, measurement),
            sensor_id: sensor_id.to_owned(),
            name: format!("{sensor_name} {}", measurement.label()),
            measurement,
            schema: measurement.schema(),
        }
    }
}

pub fn entity_id(sensor_id: &str, measurement: MeasurementType) -> String {
    format!("{sensor_id}_{measurement}")
}

/// Attribute map in the host's sensor vocabulary.
pub type EntityState = Map<String, Value>;

/// A changed entity state, as handed to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdate {
    pub entity_id: String,
    pub attributes: EntityState,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn keys_parse_in_snake_case() {
        assert_eq!(
            MeasurementType::from_str("fertility").unwrap(),
            MeasurementType::Fertility
        );
        assert!(MeasurementType::from_str("humidity").is_err());
    }

    #[test]
    fn definition_naming() {
        let def = EntityDefinition::new("101", "Monstera", MeasurementType::Temperature);
        assert_eq!(def.entity_id, "101_temperature");
        assert_eq!(def.name, "Monstera Temperature");
        assert_eq!(def.schema.unit, "°C");
        assert_eq!(MeasurementType::Temperature.decimals(), 1);
        assert_eq!(MeasurementType::Light.decimals(), 0);
    }
}
