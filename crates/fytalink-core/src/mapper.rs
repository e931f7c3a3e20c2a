// ── Entity mapper ──
//
// Owns the entity definition and state tables. `apply_reading` is the only
// path that mutates state; it reports what changed and leaves delivery to
// the caller.

use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::CoreError;
use crate::model::entity::entity_id;
use crate::model::{
    EntityDefinition, EntityState, EntityUpdate, MeasurementType, MeasurementValue, Reading,
    Sensor,
};

/// Appended to the moisture status while the sensor reports a low battery.
const LOW_BATTERY_SUFFIX: &str = "(Battery Low)";

#[derive(Debug, Default)]
pub struct EntityMapper {
    definitions: DashMap<String, Arc<EntityDefinition>>,
    states: DashMap<String, EntityState>,
}

impl EntityMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the definition for `measurement` on a sensor, creating it on
    /// first sight. Unknown measurement keys create nothing.
    pub fn ensure_entity(
        &self,
        sensor_id: &str,
        sensor_name: &str,
        measurement: &str,
    ) -> Result<Arc<EntityDefinition>, CoreError> {
        let kind = MeasurementType::from_str(measurement)
            .map_err(|_| CoreError::UnknownMeasurementType(measurement.to_owned()))?;
        Ok(self.ensure(sensor_id, sensor_name, kind))
    }

    fn ensure(
        &self,
        sensor_id: &str,
        sensor_name: &str,
        kind: MeasurementType,
    ) -> Arc<EntityDefinition> {
        let id = entity_id(sensor_id, kind);
        self.definitions
            .entry(id)
            .or_insert_with(|| {
                let def = EntityDefinition::new(sensor_id, sensor_name, kind);
                debug!(entity_id = %def.entity_id, "entity created");
                Arc::new(def)
            })
            .clone()
    }

    /// Merge a reading into the state table.
    ///
    /// Returns the merged state of every entity whose attributes changed.
    /// Attributes missing from the new values are kept. A sensor reporting a
    /// low battery gets that flagged in its moisture status.
    pub fn apply_reading(&self, sensor: &Sensor, reading: &Reading) -> Vec<EntityUpdate> {
        let fields = [
            (MeasurementType::Temperature, reading.temperature),
            (MeasurementType::Moisture, reading.moisture),
            (MeasurementType::Light, reading.light),
            (MeasurementType::Fertility, reading.fertility),
            (
                MeasurementType::Battery,
                sensor.battery_level.map(MeasurementValue::new),
            ),
        ];

        let mut updates = Vec::new();
        for (kind, value) in fields {
            let Some(value) = value else { continue };
            let def = self.ensure(&sensor.id, &sensor.name, kind);
            let low_battery = sensor.battery_low && kind == MeasurementType::Moisture;
            if let Some(update) = self.merge(&def, attributes(&def, value, low_battery)) {
                updates.push(update);
            }
        }
        updates
    }

    fn merge(&self, def: &EntityDefinition, attrs: EntityState) -> Option<EntityUpdate> {
        let mut state = self.states.entry(def.entity_id.clone()).or_default();
        let mut changed = false;
        for (key, value) in attrs {
            if state.get(&key) != Some(&value) {
                state.insert(key, value);
                changed = true;
            }
        }
        changed.then(|| EntityUpdate {
            entity_id: def.entity_id.clone(),
            attributes: state.clone(),
        })
    }

    // ── Read access ──────────────────────────────────────────────────

    pub fn definition(&self, entity_id: &str) -> Option<Arc<EntityDefinition>> {
        self.definitions.get(entity_id).map(|d| d.value().clone())
    }

    /// All definitions, sorted by entity id.
    pub fn definitions(&self) -> Vec<Arc<EntityDefinition>> {
        let mut defs: Vec<_> = self.definitions.iter().map(|e| e.value().clone()).collect();
        defs.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        defs
    }

    pub fn state(&self, entity_id: &str) -> Option<EntityState> {
        self.states.get(entity_id).map(|s| s.value().clone())
    }

    /// All states, sorted by entity id.
    pub fn states(&self) -> Vec<EntityUpdate> {
        let mut states: Vec<_> = self
            .states
            .iter()
            .map(|e| EntityUpdate {
                entity_id: e.key().clone(),
                attributes: e.value().clone(),
            })
            .collect();
        states.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        states
    }

    pub fn clear(&self) {
        self.definitions.clear();
        self.states.clear();
    }
}

fn attributes(def: &EntityDefinition, value: MeasurementValue, low_battery: bool) -> EntityState {
    let mut attrs = EntityState::new();
    attrs.insert("state".into(), Value::from("ON"));
    attrs.insert("value".into(), json!(value.value));
    attrs.insert("unit".into(), Value::from(def.schema.unit));

    let status = match (value.status, low_battery) {
        (Some(status), true) => Some(format!("{status} {LOW_BATTERY_SUFFIX}")),
        (None, true) => Some(LOW_BATTERY_SUFFIX.to_owned()),
        (status, false) => status.map(|s| s.to_string()),
    };
    if let Some(status) = status {
        attrs.insert("status".into(), Value::from(status));
    }
    attrs
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::MeasurementStatus;
    use pretty_assertions::assert_eq;

    fn sensor() -> Sensor {
        Sensor {
            id: "101".into(),
            name: "Monstera".into(),
            battery_level: None,
            battery_low: false,
        }
    }

    #[test]
    fn unknown_measurement_creates_nothing() {
        let mapper = EntityMapper::new();
        let err = mapper.ensure_entity("101", "Monstera", "humidity").unwrap_err();
        assert!(matches!(err, CoreError::UnknownMeasurementType(ref k) if k == "humidity"));
        assert!(mapper.definitions().is_empty());
    }

    #[test]
    fn ensure_is_idempotent() {
        let mapper = EntityMapper::new();
        let a = mapper.ensure_entity("101", "Monstera", "light").unwrap();
        let b = mapper.ensure_entity("101", "Renamed", "light").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(mapper.definitions().len(), 1);
    }

    #[test]
    fn temperature_only_reading_creates_one_entity() {
        let mapper = EntityMapper::new();
        let reading = Reading {
            temperature: Some(MeasurementValue::new(21.5)),
            ..Reading::default()
        };

        let updates = mapper.apply_reading(&sensor(), &reading);

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].entity_id, "101_temperature");
        assert_eq!(
            Value::Object(updates[0].attributes.clone()),
            json!({ "state": "ON", "value": 21.5, "unit": "°C" })
        );
        let defs = mapper.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "Monstera Temperature");
    }

    #[test]
    fn reapplying_same_reading_changes_nothing() {
        let mapper = EntityMapper::new();
        let reading = Reading {
            moisture: Some(MeasurementValue::new(40.0).with_status(MeasurementStatus::Perfect)),
            light: Some(MeasurementValue::new(1200.0)),
            ..Reading::default()
        };

        assert_eq!(mapper.apply_reading(&sensor(), &reading).len(), 2);
        let before = mapper.states();
        assert!(mapper.apply_reading(&sensor(), &reading).is_empty());
        assert_eq!(mapper.states(), before);
    }

    #[test]
    fn battery_comes_from_sensor() {
        let mapper = EntityMapper::new();
        let sensor = Sensor {
            battery_level: Some(77.0),
            ..sensor()
        };

        let updates = mapper.apply_reading(&sensor, &Reading::default());
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].entity_id, "101_battery");
        assert_eq!(updates[0].attributes["unit"], json!("%"));
    }

    #[test]
    fn low_battery_is_flagged_on_moisture() {
        let mapper = EntityMapper::new();
        let sensor = Sensor {
            battery_level: Some(9.0),
            battery_low: true,
            ..sensor()
        };
        let reading = Reading {
            moisture: Some(MeasurementValue::new(35.0).with_status(MeasurementStatus::Perfect)),
            temperature: Some(MeasurementValue::new(20.0)),
            ..Reading::default()
        };

        mapper.apply_reading(&sensor, &reading);

        let moisture = mapper.state("101_moisture").unwrap();
        assert_eq!(moisture["status"], json!("Perfect (Battery Low)"));
        assert!(!mapper.state("101_temperature").unwrap().contains_key("status"));
        assert!(!mapper.state("101_battery").unwrap().contains_key("status"));

        // Recovering clears the flag on the next reading with a status.
        let healthy = Sensor {
            battery_low: false,
            ..sensor
        };
        mapper.apply_reading(&healthy, &reading);
        assert_eq!(mapper.state("101_moisture").unwrap()["status"], json!("Perfect"));
    }

    #[test]
    fn merge_preserves_absent_attributes() {
        let mapper = EntityMapper::new();
        let first = Reading {
            fertility: Some(MeasurementValue::new(0.6).with_status(MeasurementStatus::Low)),
            ..Reading::default()
        };
        let second = Reading {
            fertility: Some(MeasurementValue::new(0.9)),
            ..Reading::default()
        };

        mapper.apply_reading(&sensor(), &first);
        let updates = mapper.apply_reading(&sensor(), &second);

        assert_eq!(updates.len(), 1);
        let state = mapper.state("101_fertility").unwrap();
        assert_eq!(state["value"], json!(0.9));
        assert_eq!(state["status"], json!("Low"));
    }
}
