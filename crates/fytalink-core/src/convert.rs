// ── Wire → domain conversion ──
//
// FYTA wire types from `fytalink-api` into the canonical model. A
// measurement without a current value produces no field, and so no entity.

use fytalink_api::{Measurement, PlantDetails, UserPlant};

use crate::model::{MeasurementStatus, MeasurementValue, Reading, Sensor};

pub fn sensor_from_plant(plant: &UserPlant) -> Sensor {
    let sensor = plant.sensor.clone().unwrap_or_default();
    Sensor {
        id: plant.id.clone(),
        name: plant.display_name(),
        battery_level: sensor.battery,
        battery_low: sensor.is_battery_low,
    }
}

pub fn reading_from_details(details: &PlantDetails) -> Reading {
    let m = &details.measurements;
    Reading {
        temperature: measurement_value(m.temperature.as_ref()),
        moisture: measurement_value(m.moisture.as_ref()),
        light: measurement_value(m.light.as_ref()),
        fertility: measurement_value(m.salinity.as_ref()),
    }
}

fn measurement_value(measurement: Option<&Measurement>) -> Option<MeasurementValue> {
    let measurement = measurement?;
    let value = measurement.values.current?;
    Some(MeasurementValue {
        value,
        status: measurement.status.map(MeasurementStatus::from_code),
    })
}
