use games::GameError;
use space::{AreaId, SpaceError};

/// Failures raised by a town, either while loading its areas or while
/// handling a player's request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TownError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("duplicate area id {0}")]
    DuplicateAreaId(AreaId),

    #[error("areas {0} and {1} overlap")]
    OverlappingAreas(AreaId, AreaId),

    #[error(transparent)]
    MalformedArea(#[from] SpaceError),

    #[error("unknown area type {kind} for area {id}")]
    UnknownAreaType { id: String, kind: String },

    #[error("Player not found")]
    PlayerNotFound,

    #[error("Area not found")]
    AreaNotFound,

    #[error("Town is full")]
    TownFull,

    #[error("Invalid values specified")]
    InvalidValues,

    #[error("Town is closed")]
    TownClosed,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("Town not found")]
    TownNotFound,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Invalid session ID")]
    InvalidSession,

    #[error("FriendlyName must be specified")]
    EmptyFriendlyName,

    #[error("Town ID {0} already in use")]
    TownIdInUse(String),

    #[error(transparent)]
    Town(#[from] TownError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid map file: {0}")]
    Map(#[from] serde_json::Error),
}

/// Startup and serving failures of the whole process.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create default town: {0}")]
    Registry(#[from] RegistryError),

    #[error("web server error: {0}")]
    Io(#[from] std::io::Error),
}
