use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use space::PlayerLocation;
use uuid::Uuid;

/// Opaque, unique identifier for a connected player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Short, human-shareable town identifier (8 upper-case hex digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TownId(pub String);

impl TownId {
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(hex[..8].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TownId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TownId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Capability that re-authenticates a player's out-of-band requests.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// One user connected to a town.
#[derive(Debug, Clone)]
pub struct Player {
    id: PlayerId,
    user_name: String,
    session_token: SessionToken,
    video_token: Option<String>,
    pub location: PlayerLocation,
}

impl Player {
    pub fn new(id: PlayerId, user_name: impl Into<String>) -> Self {
        Self {
            id,
            user_name: user_name.into(),
            session_token: SessionToken::generate(),
            video_token: None,
            location: PlayerLocation::default(),
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn session_token(&self) -> &SessionToken {
        &self.session_token
    }

    pub fn video_token(&self) -> Option<&str> {
        self.video_token.as_deref()
    }

    pub fn set_video_token(&mut self, token: Option<String>) {
        self.video_token = token;
    }

    pub fn to_model(&self) -> PlayerModel {
        PlayerModel {
            id: self.id.clone(),
            user_name: self.user_name.clone(),
            location: self.location.clone(),
        }
    }
}

/// Wire form of a player, shared with every client in the town.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerModel {
    pub id: PlayerId,
    pub user_name: String,
    pub location: PlayerLocation,
}

/// Read-only lookup of display names by player id.
pub trait PlayerDirectory {
    fn display_name(&self, id: &PlayerId) -> Option<String>;
}

impl PlayerDirectory for BTreeMap<PlayerId, String> {
    fn display_name(&self, id: &PlayerId) -> Option<String> {
        self.get(id).cloned()
    }
}

/// Players connected to a single town, indexed by id and session token.
#[derive(Debug, Default)]
pub struct SessionManager {
    players: BTreeMap<PlayerId, Player>,
    by_token: BTreeMap<SessionToken, PlayerId>,
    join_order: Vec<PlayerId>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a player. Returns false if a player with the same id exists.
    pub fn insert(&mut self, player: Player) -> bool {
        if self.players.contains_key(player.id()) {
            return false;
        }
        let id = player.id().clone();
        self.by_token
            .insert(player.session_token().clone(), id.clone());
        self.join_order.push(id.clone());
        self.players.insert(id, player);
        true
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    /// Resolve a session token to its player. Tokens of removed players no
    /// longer resolve.
    pub fn by_session_token(&self, token: &SessionToken) -> Option<&Player> {
        let id = self.by_token.get(token)?;
        self.players.get(id)
    }

    /// Remove a player, invalidating their session token.
    pub fn remove(&mut self, id: &PlayerId) -> Option<Player> {
        let player = self.players.remove(id)?;
        self.by_token.remove(player.session_token());
        self.join_order.retain(|p| p != id);
        tracing::debug!(player = %id, "session removed");
        Some(player)
    }

    /// Players in the order they joined.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.join_order.iter().filter_map(|id| self.players.get(id))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    /// Snapshot of every player's display name.
    pub fn display_names(&self) -> BTreeMap<PlayerId, String> {
        self.players
            .iter()
            .map(|(id, p)| (id.clone(), p.user_name().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl PlayerDirectory for SessionManager {
    fn display_name(&self, id: &PlayerId) -> Option<String> {
        self.players.get(id).map(|p| p.user_name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, name: &str) -> Player {
        Player::new(PlayerId::from(id), name)
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = PlayerId::generate();
        let b = PlayerId::generate();
        assert_ne!(a, b);
        assert_ne!(SessionToken::generate(), SessionToken::generate());
    }

    #[test]
    fn town_id_is_short_hex() {
        let id = TownId::generate();
        assert_eq!(id.as_str().len(), 8);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn insert_and_lookup() {
        let mut mgr = SessionManager::new();
        let p = player("p1", "Alice");
        let token = p.session_token().clone();
        assert!(mgr.insert(p));

        assert_eq!(mgr.len(), 1);
        assert_eq!(mgr.get(&PlayerId::from("p1")).unwrap().user_name(), "Alice");
        assert_eq!(
            mgr.by_session_token(&token).map(|p| p.id().clone()),
            Some(PlayerId::from("p1"))
        );
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut mgr = SessionManager::new();
        assert!(mgr.insert(player("p1", "Alice")));
        assert!(!mgr.insert(player("p1", "Impostor")));
        assert_eq!(mgr.display_name(&PlayerId::from("p1")).as_deref(), Some("Alice"));
    }

    #[test]
    fn remove_invalidates_token() {
        let mut mgr = SessionManager::new();
        let p = player("p1", "Alice");
        let token = p.session_token().clone();
        mgr.insert(p);

        let removed = mgr.remove(&PlayerId::from("p1"));
        assert!(removed.is_some());
        assert!(mgr.by_session_token(&token).is_none());
        assert!(mgr.is_empty());
        assert!(mgr.remove(&PlayerId::from("p1")).is_none());
    }

    #[test]
    fn iter_follows_join_order() {
        let mut mgr = SessionManager::new();
        mgr.insert(player("zz", "Last-id"));
        mgr.insert(player("aa", "First-id"));
        let names: Vec<_> = mgr.iter().map(|p| p.user_name().to_string()).collect();
        assert_eq!(names, vec!["Last-id", "First-id"]);
    }

    #[test]
    fn player_model_serializes_camel_case() {
        let p = player("p1", "Alice");
        let json = serde_json::to_string(&p.to_model()).unwrap();
        assert!(json.contains(r#""userName":"Alice""#));
        assert!(json.contains(r#""id":"p1""#));
        assert!(!json.contains("session"));
    }

    #[test]
    fn session_token_debug_is_redacted() {
        let token = SessionToken::generate();
        assert_eq!(format!("{:?}", token), "SessionToken(..)");
    }
}
