use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpaceError {
    #[error("malformed area {id}: width and height must be positive (got {width}x{height})")]
    MalformedRect { id: String, width: f64, height: f64 },

    #[error("area {0} has non-finite coordinates")]
    NonFinite(String),
}

/// Identifier of an interactable area, unique within a town.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaId(pub String);

impl AreaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AreaId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which way an avatar sprite is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Front,
    Back,
    Left,
    Right,
}

/// Center point of an avatar plus its facing and movement flag.
///
/// `interactable_id` is owned by the server: it is set and cleared only by
/// area membership changes, never taken from client input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLocation {
    pub x: f64,
    pub y: f64,
    pub rotation: Direction,
    pub moving: bool,
    #[serde(rename = "interactableID", default, skip_serializing_if = "Option::is_none")]
    pub interactable_id: Option<AreaId>,
}

impl PlayerLocation {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_deserializes_without_interactable() {
        let json = r#"{"x":10.5,"y":20,"rotation":"left","moving":true}"#;
        let loc: PlayerLocation = serde_json::from_str(json).unwrap();
        assert_eq!(loc.x, 10.5);
        assert_eq!(loc.y, 20.0);
        assert_eq!(loc.rotation, Direction::Left);
        assert!(loc.moving);
        assert!(loc.interactable_id.is_none());
    }

    #[test]
    fn location_skips_missing_interactable() {
        let json = serde_json::to_string(&PlayerLocation::new(1.0, 2.0)).unwrap();
        assert!(!json.contains("interactableID"));
        assert!(json.contains(r#""rotation":"front""#));
    }

    #[test]
    fn area_id_is_transparent() {
        let mut loc = PlayerLocation::new(0.0, 0.0);
        loc.interactable_id = Some(AreaId::from("Conv1"));
        let json = serde_json::to_string(&loc).unwrap();
        assert!(json.contains(r#""interactableID":"Conv1""#));
    }
}
