use games::{ConnectFour, TicTacToe};
use space::{AreaId, Rect};

use crate::error::TownError;
use crate::map::AreaDefinition;

use super::{Area, ConversationArea, GameArea, InteractableArea, ViewingArea};

impl Area {
    /// Build an empty area from one entry of a map file.
    pub fn from_definition(def: &AreaDefinition) -> Result<Area, TownError> {
        let rect = Rect::new(&def.id, def.x, def.y, def.width, def.height)?;
        let base = InteractableArea::new(AreaId::new(def.id.clone()), rect);
        let unknown = || TownError::UnknownAreaType {
            id: def.id.clone(),
            kind: def.kind.clone(),
        };
        let area = match def.kind.as_str() {
            "ConversationArea" => Area::Conversation(ConversationArea::new(base)),
            "ViewingArea" => Area::Viewing(ViewingArea::new(base)),
            "GameArea" => match def.property("type") {
                Some("ConnectFour") => Area::ConnectFour(GameArea::new(base)),
                Some("TicTacToe") => Area::TicTacToe(GameArea::new(base)),
                _ => return Err(unknown()),
            },
            _ => return Err(unknown()),
        };
        Ok(area)
    }
}
