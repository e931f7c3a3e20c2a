// Entity definitions rendered in the remote's sensor vocabulary.

use serde_json::{Map, Value, json};

use fytalink_core::{EntityDefinition, EntityState, MeasurementType};

/// Device classes the remote renders natively.
fn device_class(measurement: MeasurementType) -> &'static str {
    match measurement {
        MeasurementType::Temperature => "temperature",
        MeasurementType::Battery => "battery",
        MeasurementType::Moisture | MeasurementType::Light | MeasurementType::Fertility => "custom",
    }
}

/// One `available_entities` entry.
pub fn available_entity(def: &EntityDefinition, state: Option<&EntityState>) -> Value {
    let class = device_class(def.measurement);

    let mut options = Map::new();
    if class == "custom" {
        options.insert("custom_label".into(), Value::from(def.measurement.label()));
        options.insert("custom_unit".into(), Value::from(def.schema.unit));
    }
    options.insert("min_value".into(), json!(def.schema.min));
    options.insert("max_value".into(), json!(def.schema.max));
    options.insert("decimals".into(), json!(def.measurement.decimals()));

    let mut entity = json!({
        "entity_id": def.entity_id,
        "entity_type": "sensor",
        "device_class": class,
        "name": { "en": def.name },
        "options": options,
    });
    if let (Some(state), Some(obj)) = (state, entity.as_object_mut()) {
        obj.insert("attributes".into(), Value::Object(state.clone()));
    }
    entity
}

/// One `entity_states` entry.
pub fn entity_state(entity_id: &str, attributes: &EntityState) -> Value {
    json!({
        "entity_type": "sensor",
        "entity_id": entity_id,
        "attributes": attributes,
    })
}
