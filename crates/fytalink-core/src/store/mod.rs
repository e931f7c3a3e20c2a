// ── Local persistence ──
//
// Single-process, single-writer JSON files under the config home. No
// locking: the driver is the only writer.

mod credentials;
mod json_file;
mod plant_cache;

pub use credentials::CredentialStore;
pub use json_file::JsonFile;
pub use plant_cache::{CachedPlant, PlantCache, PlantSnapshot};
