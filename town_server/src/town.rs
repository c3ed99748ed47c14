use games::GameId;
use net::channels::ConnectionId;
use session::{Player, PlayerId, SessionManager, SessionToken, TownId};
use space::{AreaId, PlayerLocation};

use crate::areas::Area;
use crate::broadcast::Broadcaster;
use crate::error::TownError;
use crate::map::AreaDefinition;
use crate::protocol::{
    ClientMessage, ConversationAreaModel, InteractableCommand, InteractableModel, ServerMessage,
    TownSummary, ViewingAreaModel, ViewingAreaUpdate,
};

/// Root aggregate of one shared space: owns its players and areas and turns
/// every change into broadcast deltas.
pub struct Town {
    id: TownId,
    friendly_name: String,
    is_publicly_listed: bool,
    capacity: usize,
    players: SessionManager,
    areas: Vec<Area>,
    broadcaster: Box<dyn Broadcaster>,
}

impl Town {
    pub fn new(
        id: TownId,
        friendly_name: impl Into<String>,
        is_publicly_listed: bool,
        capacity: usize,
        broadcaster: Box<dyn Broadcaster>,
    ) -> Self {
        Self {
            id,
            friendly_name: friendly_name.into(),
            is_publicly_listed,
            capacity,
            players: SessionManager::new(),
            areas: Vec::new(),
            broadcaster,
        }
    }

    /// Build the town's areas from map geometry. Duplicate ids, overlapping
    /// areas and unknown area types are rejected and leave the town untouched.
    pub fn initialize_areas(&mut self, defs: &[AreaDefinition]) -> Result<(), TownError> {
        let mut areas: Vec<Area> = Vec::with_capacity(defs.len());
        for def in defs {
            let area = Area::from_definition(def)?;
            if areas.iter().any(|a| a.id() == area.id()) {
                return Err(TownError::DuplicateAreaId(area.id().clone()));
            }
            if let Some(other) = areas.iter().find(|a| a.overlaps(&area)) {
                return Err(TownError::OverlappingAreas(other.id().clone(), area.id().clone()));
            }
            areas.push(area);
        }
        for area in &mut areas {
            area.add_players_within_bounds(self.players.iter_mut(), self.broadcaster.as_ref());
        }
        tracing::info!(town = %self.id, areas = areas.len(), "areas initialized");
        self.areas = areas;
        Ok(())
    }

    pub fn id(&self) -> &TownId {
        &self.id
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn is_publicly_listed(&self) -> bool {
        self.is_publicly_listed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupancy(&self) -> usize {
        self.players.len()
    }

    pub fn players(&self) -> &SessionManager {
        &self.players
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn area(&self, id: &AreaId) -> Option<&Area> {
        self.areas.iter().find(|a| a.id() == id)
    }

    pub fn interactables(&self) -> Vec<InteractableModel> {
        self.areas.iter().map(Area::to_model).collect()
    }

    pub fn player_by_session_token(&self, token: &SessionToken) -> Option<&Player> {
        self.players.by_session_token(token)
    }

    pub fn summary(&self) -> TownSummary {
        TownSummary {
            town_id: self.id.to_string(),
            friendly_name: self.friendly_name.clone(),
            current_occupancy: self.players.len(),
            maximum_occupancy: self.capacity,
            is_publicly_listed: self.is_publicly_listed,
        }
    }

    /// Admit a new player on `connection_id`. Everyone hears `playerJoined`;
    /// the newcomer alone receives the `initialize` snapshot.
    pub fn add_player(
        &mut self,
        user_name: &str,
        video_token: Option<String>,
        connection_id: ConnectionId,
    ) -> Result<PlayerId, TownError> {
        if self.players.len() >= self.capacity {
            return Err(TownError::TownFull);
        }
        let mut player = Player::new(PlayerId::generate(), user_name);
        player.set_video_token(video_token);
        let player_id = player.id().clone();
        let model = player.to_model();
        self.players.insert(player);
        self.broadcaster.attach(&player_id, connection_id);
        self.broadcaster.publish(&ServerMessage::PlayerJoined { player: model });

        if let Some(player) = self.players.get_mut(&player_id) {
            if let Some(area) = self.areas.iter_mut().find(|a| a.contains(&player.location)) {
                area.add(player, self.broadcaster.as_ref());
            }
        }

        if let Some(snapshot) = self.initial_snapshot(&player_id) {
            self.broadcaster.send_to(&player_id, &snapshot);
        }
        tracing::info!(town = %self.id, player = %player_id, user = user_name, "player joined");
        Ok(player_id)
    }

    /// The one-time `initialize` message for `player_id`.
    pub fn initial_snapshot(&self, player_id: &PlayerId) -> Option<ServerMessage> {
        let player = self.players.get(player_id)?;
        Some(ServerMessage::Initialize {
            user_id: player_id.clone(),
            session_token: player.session_token().clone(),
            provider_video_token: player.video_token().map(str::to_string),
            current_players: self.players.iter().map(Player::to_model).collect(),
            friendly_name: self.friendly_name.clone(),
            is_publicly_listed: self.is_publicly_listed,
            interactables: self.interactables(),
        })
    }

    /// Update a player's location and recompute which area holds them. The
    /// area id in `location` is ignored; membership is derived from geometry.
    pub fn move_player(&mut self, player_id: &PlayerId, location: PlayerLocation) -> Result<(), TownError> {
        let directory = self.players.display_names();
        let player = self
            .players
            .get_mut(player_id)
            .ok_or(TownError::PlayerNotFound)?;
        let out = self.broadcaster.as_ref();

        let previous = player.location.interactable_id.take();
        player.location = PlayerLocation {
            interactable_id: previous.clone(),
            ..location
        };

        if let Some(prev_id) = previous {
            if let Some(area) = self.areas.iter_mut().find(|a| *a.id() == prev_id) {
                if !area.contains(&player.location) {
                    area.remove(player, &directory, out);
                }
            } else {
                player.location.interactable_id = None;
            }
        }
        if player.location.interactable_id.is_none() {
            if let Some(area) = self.areas.iter_mut().find(|a| a.contains(&player.location)) {
                area.add(player, out);
            }
        }

        out.publish(&ServerMessage::PlayerMoved {
            player: player.to_model(),
        });
        Ok(())
    }

    /// Route a command to the area it names.
    pub fn handle_interactable_command(
        &mut self,
        player_id: &PlayerId,
        area_id: &AreaId,
        command: &InteractableCommand,
    ) -> Result<Option<GameId>, TownError> {
        if !self.players.contains(player_id) {
            return Err(TownError::PlayerNotFound);
        }
        let area = self
            .areas
            .iter_mut()
            .find(|a| a.id() == area_id)
            .ok_or(TownError::AreaNotFound)?;
        area.handle_command(player_id, command, &self.players, self.broadcaster.as_ref())
    }

    /// Apply one message from a connected client. Interactable commands are
    /// answered with a `commandResponse` to the issuer alone.
    pub fn handle_client_message(&mut self, player_id: &PlayerId, message: ClientMessage) -> Result<(), TownError> {
        match message {
            ClientMessage::Move { location } => self.move_player(player_id, location),
            ClientMessage::InteractableCommand {
                command_id,
                interactable_id,
                command,
            } => {
                let result = self.handle_interactable_command(player_id, &interactable_id, &command);
                if let Err(e) = &result {
                    tracing::debug!(
                        town = %self.id,
                        player = %player_id,
                        area = %interactable_id,
                        command = command.kind(),
                        "command rejected: {}",
                        e
                    );
                }
                let (game_id, error) = match &result {
                    Ok(game_id) => (game_id.clone(), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                self.broadcaster.send_to(
                    player_id,
                    &ServerMessage::CommandResponse {
                        command_id,
                        interactable_id,
                        game_id,
                        error,
                    },
                );
                result.map(|_| ())
            }
            ClientMessage::Emote { emote_id } => self.emote(player_id, emote_id),
        }
    }

    pub fn emote(&self, player_id: &PlayerId, emote_id: String) -> Result<(), TownError> {
        if !self.players.contains(player_id) {
            return Err(TownError::PlayerNotFound);
        }
        self.broadcaster.publish(&ServerMessage::Emote {
            player_id: player_id.clone(),
            emote_id,
        });
        Ok(())
    }

    /// Remove a disconnected player from their area and the town. Their
    /// session token stops resolving.
    pub fn remove_player(&mut self, player_id: &PlayerId) -> Result<(), TownError> {
        let directory = self.players.display_names();
        let player = self
            .players
            .get_mut(player_id)
            .ok_or(TownError::PlayerNotFound)?;
        if let Some(area_id) = player.location.interactable_id.clone() {
            if let Some(area) = self.areas.iter_mut().find(|a| *a.id() == area_id) {
                area.remove(player, &directory, self.broadcaster.as_ref());
            }
        }
        let Some(player) = self.players.remove(player_id) else {
            return Err(TownError::PlayerNotFound);
        };
        self.broadcaster.detach(player_id);
        self.broadcaster.publish(&ServerMessage::PlayerDisconnected {
            player: player.to_model(),
        });
        tracing::info!(town = %self.id, player = %player_id, "player left");
        Ok(())
    }

    /// Tell everyone the town is closing and drop their connections.
    pub fn disconnect_all_players(&mut self) {
        self.broadcaster.close_all(&ServerMessage::TownClosing);
        tracing::info!(town = %self.id, players = self.players.len(), "town closing");
    }

    /// Change the name and/or visibility. An empty name rejects the whole
    /// update.
    pub fn update_settings(
        &mut self,
        friendly_name: Option<String>,
        is_publicly_listed: Option<bool>,
    ) -> Result<(), TownError> {
        if friendly_name.as_deref().is_some_and(str::is_empty) {
            return Err(TownError::InvalidValues);
        }
        if let Some(name) = &friendly_name {
            self.friendly_name = name.clone();
        }
        if let Some(public) = is_publicly_listed {
            self.is_publicly_listed = public;
        }
        self.broadcaster.publish(&ServerMessage::TownSettingsUpdated {
            friendly_name,
            is_publicly_listed,
        });
        Ok(())
    }

    /// Give an idle conversation area its topic and pull in anyone already
    /// standing inside it.
    pub fn add_conversation_area(&mut self, model: &ConversationAreaModel) -> Result<(), TownError> {
        let topic = model
            .topic
            .as_ref()
            .filter(|t| !t.is_empty())
            .ok_or(TownError::InvalidValues)?;
        let area = self
            .areas
            .iter_mut()
            .find(|a| *a.id() == model.id)
            .ok_or(TownError::InvalidValues)?;
        match &mut *area {
            Area::Conversation(c) if c.topic().is_none() => c.set_topic(topic.clone()),
            _ => return Err(TownError::InvalidValues),
        }
        area.add_players_within_bounds(self.players.iter_mut(), self.broadcaster.as_ref());
        area.emit_changed(self.broadcaster.as_ref());
        Ok(())
    }

    /// Load a video into an idle viewing area and pull in anyone already
    /// standing inside it.
    pub fn add_viewing_area(&mut self, model: &ViewingAreaModel) -> Result<(), TownError> {
        let video = model
            .video
            .as_ref()
            .filter(|v| !v.is_empty())
            .ok_or(TownError::InvalidValues)?;
        let area = self
            .areas
            .iter_mut()
            .find(|a| *a.id() == model.id)
            .ok_or(TownError::InvalidValues)?;
        match &mut *area {
            Area::Viewing(v) if v.video().is_none() => v.apply_update(&ViewingAreaUpdate {
                video: Some(video.clone()),
                is_playing: model.is_playing,
                elapsed_time_sec: model.elapsed_time_sec,
            }),
            _ => return Err(TownError::InvalidValues),
        }
        area.add_players_within_bounds(self.players.iter_mut(), self.broadcaster.as_ref());
        area.emit_changed(self.broadcaster.as_ref());
        Ok(())
    }
}

impl std::fmt::Debug for Town {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Town")
            .field("id", &self.id)
            .field("friendly_name", &self.friendly_name)
            .field("players", &self.players.len())
            .field("areas", &self.areas.len())
            .finish()
    }
}
