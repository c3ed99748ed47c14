//! One task per town. Every mutation of a town goes through its command
//! channel, so no two changes to the same town interleave.

use std::time::Instant;

use net::channels::ConnectionId;
use observability::CommandMetrics;
use session::{PlayerId, SessionToken, TownId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{RegistryError, TownError};
use crate::protocol::{ClientMessage, ConversationAreaModel, TownSummary, ViewingAreaModel};
use crate::town::Town;

pub type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
pub enum TownCommand {
    Join {
        user_name: String,
        video_token: Option<String>,
        connection_id: ConnectionId,
        reply: Reply<Result<PlayerId, TownError>>,
    },
    Input {
        player_id: PlayerId,
        message: ClientMessage,
    },
    Leave {
        player_id: PlayerId,
    },
    UpdateSettings {
        friendly_name: Option<String>,
        is_publicly_listed: Option<bool>,
        reply: Reply<Result<(), TownError>>,
    },
    CreateConversationArea {
        session_token: SessionToken,
        model: ConversationAreaModel,
        reply: Reply<Result<(), RegistryError>>,
    },
    CreateViewingArea {
        session_token: SessionToken,
        model: ViewingAreaModel,
        reply: Reply<Result<(), RegistryError>>,
    },
    Summary {
        reply: Reply<TownSummary>,
    },
    Close {
        reply: Reply<()>,
    },
}

impl TownCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Input { message, .. } => match message {
                ClientMessage::Move { .. } => "move",
                ClientMessage::InteractableCommand { .. } => "interactableCommand",
                ClientMessage::Emote { .. } => "emote",
            },
            Self::Leave { .. } => "leave",
            Self::UpdateSettings { .. } => "updateSettings",
            Self::CreateConversationArea { .. } => "createConversationArea",
            Self::CreateViewingArea { .. } => "createViewingArea",
            Self::Summary { .. } => "summary",
            Self::Close { .. } => "close",
        }
    }
}

/// Cheap, cloneable address of a running town.
#[derive(Debug, Clone)]
pub struct TownHandle {
    id: TownId,
    tx: mpsc::UnboundedSender<TownCommand>,
}

impl TownHandle {
    pub fn id(&self) -> &TownId {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, cmd: TownCommand) -> Result<(), TownError> {
        self.tx.send(cmd).map_err(|_| TownError::TownClosed)
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> TownCommand) -> Result<T, TownError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply))?;
        rx.await.map_err(|_| TownError::TownClosed)
    }

    pub async fn join(
        &self,
        user_name: String,
        video_token: Option<String>,
        connection_id: ConnectionId,
    ) -> Result<PlayerId, TownError> {
        self.request(|reply| TownCommand::Join {
            user_name,
            video_token,
            connection_id,
            reply,
        })
        .await?
    }

    pub fn input(&self, player_id: PlayerId, message: ClientMessage) -> Result<(), TownError> {
        self.send(TownCommand::Input { player_id, message })
    }

    pub fn leave(&self, player_id: PlayerId) -> Result<(), TownError> {
        self.send(TownCommand::Leave { player_id })
    }

    pub async fn update_settings(
        &self,
        friendly_name: Option<String>,
        is_publicly_listed: Option<bool>,
    ) -> Result<(), TownError> {
        self.request(|reply| TownCommand::UpdateSettings {
            friendly_name,
            is_publicly_listed,
            reply,
        })
        .await?
    }

    pub async fn create_conversation_area(
        &self,
        session_token: SessionToken,
        model: ConversationAreaModel,
    ) -> Result<(), RegistryError> {
        self.request(|reply| TownCommand::CreateConversationArea {
            session_token,
            model,
            reply,
        })
        .await?
    }

    pub async fn create_viewing_area(
        &self,
        session_token: SessionToken,
        model: ViewingAreaModel,
    ) -> Result<(), RegistryError> {
        self.request(|reply| TownCommand::CreateViewingArea {
            session_token,
            model,
            reply,
        })
        .await?
    }

    pub async fn summary(&self) -> Result<TownSummary, TownError> {
        self.request(|reply| TownCommand::Summary { reply }).await
    }

    /// Broadcast `townClosing`, drop every connection and stop the task.
    pub async fn close(&self) -> Result<(), TownError> {
        self.request(|reply| TownCommand::Close { reply }).await
    }
}

/// Start the task that owns `town`.
pub fn spawn_town(town: Town) -> (TownHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = TownHandle {
        id: town.id().clone(),
        tx,
    };
    let task = tokio::spawn(run_town(town, rx));
    (handle, task)
}

pub async fn run_town(mut town: Town, mut rx: mpsc::UnboundedReceiver<TownCommand>) {
    tracing::info!(town = %town.id(), name = town.friendly_name(), "town started");
    while let Some(cmd) = rx.recv().await {
        let kind = cmd.kind();
        let start = Instant::now();
        let (ok, stop) = apply(&mut town, cmd);
        CommandMetrics {
            town: town.id().to_string(),
            kind,
            duration_us: start.elapsed().as_micros(),
            ok,
        }
        .log();
        if stop {
            break;
        }
    }
    tracing::info!(town = %town.id(), "town stopped");
}

/// Returns whether the command succeeded and whether the task should stop.
fn apply(town: &mut Town, cmd: TownCommand) -> (bool, bool) {
    match cmd {
        TownCommand::Join {
            user_name,
            video_token,
            connection_id,
            reply,
        } => {
            let result = town.add_player(&user_name, video_token, connection_id);
            let ok = result.is_ok();
            let _ = reply.send(result);
            (ok, false)
        }
        TownCommand::Input { player_id, message } => {
            let ok = match town.handle_client_message(&player_id, message) {
                Ok(()) => true,
                Err(TownError::PlayerNotFound) => {
                    tracing::debug!(town = %town.id(), player = %player_id, "input from unknown player");
                    false
                }
                Err(_) => false,
            };
            (ok, false)
        }
        TownCommand::Leave { player_id } => (town.remove_player(&player_id).is_ok(), false),
        TownCommand::UpdateSettings {
            friendly_name,
            is_publicly_listed,
            reply,
        } => {
            let result = town.update_settings(friendly_name, is_publicly_listed);
            let ok = result.is_ok();
            let _ = reply.send(result);
            (ok, false)
        }
        TownCommand::CreateConversationArea {
            session_token,
            model,
            reply,
        } => {
            let result = if town.player_by_session_token(&session_token).is_none() {
                Err(RegistryError::InvalidSession)
            } else {
                town.add_conversation_area(&model).map_err(RegistryError::from)
            };
            let ok = result.is_ok();
            let _ = reply.send(result);
            (ok, false)
        }
        TownCommand::CreateViewingArea {
            session_token,
            model,
            reply,
        } => {
            let result = if town.player_by_session_token(&session_token).is_none() {
                Err(RegistryError::InvalidSession)
            } else {
                town.add_viewing_area(&model).map_err(RegistryError::from)
            };
            let ok = result.is_ok();
            let _ = reply.send(result);
            (ok, false)
        }
        TownCommand::Summary { reply } => {
            let _ = reply.send(town.summary());
            (true, false)
        }
        TownCommand::Close { reply } => {
            town.disconnect_all_players();
            let _ = reply.send(());
            (true, true)
        }
    }
}
