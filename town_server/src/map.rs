use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Geometry source for every town: the interactable areas declared by a map
/// file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapDefinition {
    #[serde(default)]
    pub areas: Vec<AreaDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AreaDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub properties: Vec<MapProperty>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapProperty {
    pub name: String,
    pub value: serde_json::Value,
}

impl AreaDefinition {
    /// String value of the named property, if present.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.value.as_str())
    }
}

pub fn parse_map(json: &str) -> Result<MapDefinition, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_map(path: impl AsRef<Path>) -> Result<MapDefinition, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let map = parse_map(&content)?;
    tracing::info!(path = %path.display(), areas = map.areas.len(), "map loaded");
    Ok(map)
}
