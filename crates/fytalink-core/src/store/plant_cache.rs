use std::path::Path;

use serde::{Deserialize, Serialize};

use super::JsonFile;
use crate::error::CoreError;
use crate::model::{Reading, Sensor};

pub const PLANT_CACHE_FILE: &str = "plants.json";

/// One sensor and its last reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPlant {
    pub sensor: Sensor,
    #[serde(default)]
    pub reading: Reading,
}

/// Everything fetched by the last successful poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlantSnapshot {
    /// Epoch milliseconds.
    pub fetched_at: i64,
    #[serde(default)]
    pub plants: Vec<CachedPlant>,
}

/// Owns `<config_home>/plants.json`.
#[derive(Debug, Clone)]
pub struct PlantCache {
    file: JsonFile,
}

impl PlantCache {
    pub fn new(config_home: &Path) -> Self {
        Self {
            file: JsonFile::new(config_home.join(PLANT_CACHE_FILE)),
        }
    }

    pub fn save(&self, snapshot: &PlantSnapshot) -> Result<(), CoreError> {
        self.file.save(snapshot)
    }

    pub fn load(&self) -> Result<Option<PlantSnapshot>, CoreError> {
        self.file.load()
    }

    pub fn remove(&self) -> Result<(), CoreError> {
        self.file.remove()
    }
}
