// Driver descriptor (`driver.json`).
//
// Served verbatim to the remote. Only `driver_id`, `name` and `version` are
// interpreted.

use std::path::Path;

use serde_json::Value;

use crate::error::HostError;

#[derive(Debug, Clone)]
pub struct DriverMetadata {
    pub driver_id: String,
    /// Localized name object (`{"en": "..."}`) or a plain string.
    pub name: Value,
    pub version: String,
    raw: Value,
}

impl DriverMetadata {
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let text = std::fs::read_to_string(path).map_err(|source| HostError::MetadataRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|message| HostError::MetadataInvalid {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, String> {
        let raw: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let field = |key: &str| raw.get(key).filter(|v| !v.is_null()).cloned();

        let driver_id = field("driver_id")
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or("missing string field 'driver_id'")?;
        let name = field("name").ok_or("missing field 'name'")?;
        let version = field("version")
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or("missing string field 'version'")?;

        Ok(Self {
            driver_id,
            name,
            version,
            raw,
        })
    }

    /// The full descriptor as loaded.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// English display name, if one can be found.
    pub fn display_name(&self) -> String {
        match &self.name {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("en")
                .or_else(|| map.values().next())
                .and_then(Value::as_str)
                .unwrap_or(&self.driver_id)
                .to_owned(),
            _ => self.driver_id.clone(),
        }
    }
}
