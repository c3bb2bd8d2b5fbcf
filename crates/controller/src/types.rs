//! Payloads returned by the controller HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `GET /api/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiStatus {
    pub message: String,
}

/// Body of `GET /api/config`.
///
/// Only `version` matters to the monitor; a few descriptive fields are
/// typed and everything else is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub version: Option<String>,

    pub location_name: Option<String>,

    pub time_zone: Option<String>,

    pub unit_system: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One element of `GET /api/states`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// `<domain>.<object_id>`, e.g. `light.living_room`
    pub entity_id: String,

    pub state: String,

    pub last_changed: DateTime<Utc>,

    pub last_updated: DateTime<Utc>,

    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityState {
    /// Domain part of the entity id, `"unknown"` when there is no dot.
    pub fn domain(&self) -> &str {
        match self.entity_id.split_once('.') {
            Some((domain, _)) => domain,
            None => "unknown",
        }
    }

    /// The `friendly_name` attribute, if it is a string.
    pub fn friendly_name(&self) -> Option<&str> {
        self.attributes.get("friendly_name").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_keeps_unknown_fields() {
        let config: ControllerConfig = serde_json::from_value(json!({
            "version": "2024.1.0",
            "location_name": "Home",
            "components": ["light", "sensor"]
        }))
        .unwrap();

        assert_eq!(config.version.as_deref(), Some("2024.1.0"));
        assert_eq!(config.location_name.as_deref(), Some("Home"));
        assert!(config.time_zone.is_none());
        assert!(config.extra.contains_key("components"));
    }

    #[test]
    fn test_config_without_version() {
        let config: ControllerConfig = serde_json::from_value(json!({})).unwrap();
        assert!(config.version.is_none());
    }

    #[test]
    fn test_entity_domain_and_friendly_name() {
        let entity: EntityState = serde_json::from_value(json!({
            "entity_id": "light.living_room",
            "state": "on",
            "last_changed": "2024-01-15T10:30:00.123456+00:00",
            "last_updated": "2024-01-15T10:30:00.123456+00:00",
            "attributes": { "friendly_name": "Living Room", "brightness": 180 }
        }))
        .unwrap();

        assert_eq!(entity.domain(), "light");
        assert_eq!(entity.friendly_name(), Some("Living Room"));
    }

    #[test]
    fn test_entity_without_domain_or_attributes() {
        let entity: EntityState = serde_json::from_value(json!({
            "entity_id": "orphan",
            "state": "unavailable",
            "last_changed": "2024-01-15T10:30:00Z",
            "last_updated": "2024-01-15T10:30:00Z"
        }))
        .unwrap();

        assert_eq!(entity.domain(), "unknown");
        assert!(entity.friendly_name().is_none());
    }
}
