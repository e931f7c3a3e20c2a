// Sensors and their readings.

use serde::{Deserialize, Serialize};
use strum::Display;

/// One FYTA sensor. FYTA reports sensors per plant, so `id` is the plant id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub battery_low: bool,
}

/// FYTA's traffic-light classification of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementStatus {
    #[strum(serialize = "No Data")]
    NoData,
    #[strum(serialize = "Too Low")]
    TooLow,
    Low,
    Perfect,
    High,
    #[strum(serialize = "Too High")]
    TooHigh,
    Unknown,
}

impl MeasurementStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::NoData,
            1 => Self::TooLow,
            2 => Self::Low,
            3 => Self::Perfect,
            4 => Self::High,
            5 => Self::TooHigh,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementValue {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MeasurementStatus>,
}

impl MeasurementValue {
    pub fn new(value: f64) -> Self {
        Self { value, status: None }
    }

    #[must_use]
    pub fn with_status(mut self, status: MeasurementStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Latest values for one sensor. A field that is `None` has no entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<MeasurementValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moisture: Option<MeasurementValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<MeasurementValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fertility: Option<MeasurementValue>,
}
