/// Game-protocol failures. Each kind has a fixed, client-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Player is already in this game")]
    PlayerAlreadyInGame,

    #[error("Game is full")]
    GameFull,

    #[error("Player is not in this game")]
    PlayerNotInGame,

    #[error("Game is not startable")]
    GameNotStartable,

    #[error("Game is not in progress")]
    GameNotInProgress,

    #[error("Game is over")]
    GameOver,

    #[error("Game ID mismatch")]
    GameIdMismatch,

    #[error("Not your turn")]
    MoveNotYourTurn,

    #[error("Board position is not valid")]
    BoardPositionNotValid,

    #[error("Invalid move")]
    InvalidMove,

    #[error("Invalid command")]
    InvalidCommand,
}
