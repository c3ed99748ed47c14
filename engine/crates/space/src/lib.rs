pub mod model;
pub mod rect;

pub use model::{AreaId, Direction, PlayerLocation, SpaceError};
pub use rect::{Rect, PLAYER_SPRITE_HEIGHT, PLAYER_SPRITE_WIDTH};
