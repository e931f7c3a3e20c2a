// ── Domain model ──
//
// Canonical representation of the account, its sensors and the entities
// republished to the host. The `fytalink-api` wire types never leak past
// `convert`.

pub mod credentials;
pub mod entity;
pub mod sensor;

pub use credentials::Credentials;
pub use entity::{AttributeSchema, EntityDefinition, EntityState, EntityUpdate, MeasurementType};
pub use sensor::{MeasurementStatus, MeasurementValue, Reading, Sensor};
