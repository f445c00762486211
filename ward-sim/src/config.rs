//! Simulation layout loaded from JSON.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use ward::{AreaRegistry, BoundedArea, Color, Position, RegistryError};

pub const DEFAULT_PATIENTS: u32 = 10;
pub const DEFAULT_ARRIVAL_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse layout: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid layout: {0}")]
    Invalid(String),
}

/// One area of the layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AreaConfig {
    pub name: String,
    pub time_ms: u64,
    pub capacity: usize,
    pub position: Position,
    #[serde(default)]
    pub color: Option<Color>,
}

impl AreaConfig {
    pub fn build(&self) -> BoundedArea {
        let area = BoundedArea::new(
            self.name.clone(),
            Duration::from_millis(self.time_ms),
            self.capacity,
            self.position,
        );
        if let Some(color) = self.color {
            area.set_color(color);
        }
        area
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    pub areas: Vec<AreaConfig>,
    /// Area names every patient visits, in order.
    pub route: Vec<String>,
    #[serde(default = "default_patients")]
    pub patients: u32,
    #[serde(default = "default_arrival_ms")]
    pub arrival_ms: u64,
}

fn default_patients() -> u32 {
    DEFAULT_PATIENTS
}

fn default_arrival_ms() -> u64 {
    DEFAULT_ARRIVAL_MS
}

impl SimConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.areas.is_empty() {
            return Err(ConfigError::Invalid("at least one area is required".to_string()));
        }

        let mut seen = HashSet::new();
        for area in &self.areas {
            if !seen.insert(area.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate area name '{}'",
                    area.name
                )));
            }
        }

        if self.route.is_empty() {
            return Err(ConfigError::Invalid("route must not be empty".to_string()));
        }
        if let Some(unknown) = self.route.iter().find(|name| !seen.contains(name.as_str())) {
            return Err(ConfigError::Invalid(format!(
                "route references unknown area '{unknown}'"
            )));
        }

        if self.patients == 0 {
            return Err(ConfigError::Invalid("patients must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn arrival_interval(&self) -> Duration {
        Duration::from_millis(self.arrival_ms)
    }

    /// Build a registry holding every configured area.
    pub fn build_registry(&self) -> Result<AreaRegistry, RegistryError> {
        let registry = AreaRegistry::new();
        for area in &self.areas {
            registry.insert(area.build())?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LAYOUT: &str = r##"{
        "areas": [
            { "name": "Triage", "time_ms": 40, "capacity": 2, "position": { "x": 120, "y": 120 } },
            { "name": "Radiology", "time_ms": 80, "capacity": 1,
              "position": { "x": 360, "y": 120 }, "color": "#0000ff" }
        ],
        "route": ["Triage", "Radiology"],
        "patients": 4
    }"##;

    fn invalid_reason(json: &str) -> String {
        match SimConfig::from_json(json) {
            Err(ConfigError::Invalid(reason)) => reason,
            other => panic!("expected invalid layout, got {other:?}"),
        }
    }

    #[test]
    fn parses_layout_with_defaults() {
        let config = SimConfig::from_json(LAYOUT).unwrap();
        assert_eq!(config.areas.len(), 2);
        assert_eq!(config.patients, 4);
        assert_eq!(config.arrival_ms, DEFAULT_ARRIVAL_MS);
        assert_eq!(config.areas[0].color, None);
        assert_eq!(config.areas[1].color, Some(Color::BLUE));
    }

    #[test]
    fn builds_registry_with_colors() {
        let config = SimConfig::from_json(LAYOUT).unwrap();
        let registry = config.build_registry().unwrap();

        let triage = registry.get("Triage").unwrap();
        assert_eq!(triage.capacity(), 2);
        assert_eq!(triage.time(), Duration::from_millis(40));
        assert_eq!(triage.color(), Color::GRAY);
        assert_eq!(registry.get("Radiology").unwrap().color(), Color::BLUE);
    }

    #[test]
    fn rejects_unknown_route_area() {
        let reason = invalid_reason(
            r#"{ "areas": [ { "name": "Triage", "time_ms": 1, "capacity": 1, "position": { "x": 0, "y": 0 } } ],
                 "route": ["Triage", "Morgue"] }"#,
        );
        assert_eq!(reason, "route references unknown area 'Morgue'");
    }

    #[test]
    fn rejects_duplicate_area_names() {
        let reason = invalid_reason(
            r#"{ "areas": [
                    { "name": "Triage", "time_ms": 1, "capacity": 1, "position": { "x": 0, "y": 0 } },
                    { "name": "Triage", "time_ms": 2, "capacity": 3, "position": { "x": 1, "y": 1 } } ],
                 "route": ["Triage"] }"#,
        );
        assert_eq!(reason, "duplicate area name 'Triage'");
    }

    #[test]
    fn rejects_empty_layouts() {
        assert_eq!(
            invalid_reason(r#"{ "areas": [], "route": [] }"#),
            "at least one area is required"
        );
        assert_eq!(
            invalid_reason(
                r#"{ "areas": [ { "name": "Triage", "time_ms": 1, "capacity": 1, "position": { "x": 0, "y": 0 } } ],
                     "route": [] }"#
            ),
            "route must not be empty"
        );
        assert_eq!(
            invalid_reason(
                r#"{ "areas": [ { "name": "Triage", "time_ms": 1, "capacity": 1, "position": { "x": 0, "y": 0 } } ],
                     "route": ["Triage"], "patients": 0 }"#
            ),
            "patients must be at least 1"
        );
    }

    #[test]
    fn rejects_malformed_json_and_colors() {
        assert!(matches!(
            SimConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SimConfig::from_json(
                r#"{ "areas": [ { "name": "Triage", "time_ms": 1, "capacity": 1,
                                  "position": { "x": 0, "y": 0 }, "color": "grey" } ],
                     "route": ["Triage"] }"#
            ),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LAYOUT.as_bytes()).unwrap();

        let config = SimConfig::load(file.path()).unwrap();
        assert_eq!(config.route, vec!["Triage", "Radiology"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SimConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
