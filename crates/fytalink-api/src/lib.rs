// fytalink-api: Async Rust client for the FYTA plant sensor cloud API

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod plants;
pub mod transport;

pub use client::FytaClient;
pub use error::Error;
pub use models::{
    AuthTokens, Measurement, MeasurementValues, Measurements, PlantDetails, PlantSensor, UserPlant,
};
pub use transport::TransportConfig;
