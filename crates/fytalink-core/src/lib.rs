// fytalink-core: Session lifecycle, entity mapping and polling between
// fytalink-api and the host adapter.

pub mod api;
pub mod config;
pub mod convert;
pub mod driver;
pub mod error;
pub mod mapper;
pub mod model;
pub mod scheduler;
pub mod session;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use api::SensorApi;
pub use config::DriverConfig;
pub use driver::{ConnectionState, Driver, SchedulerState};
pub use error::CoreError;
pub use mapper::EntityMapper;
pub use scheduler::TickOutcome;
pub use session::Session;
pub use store::{CredentialStore, PlantCache};

pub use model::{
    AttributeSchema, Credentials, EntityDefinition, EntityState, EntityUpdate, MeasurementStatus,
    MeasurementType, MeasurementValue, Reading, Sensor,
};
