use serde::{Deserialize, Serialize};

use crate::model::{PlayerLocation, SpaceError};

/// Width of an avatar hitbox, centered on `PlayerLocation::x`.
pub const PLAYER_SPRITE_WIDTH: f64 = 32.0;
/// Height of an avatar hitbox, centered on `PlayerLocation::y`.
pub const PLAYER_SPRITE_HEIGHT: f64 = 64.0;

/// Axis-aligned rectangle; `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Build a rectangle, rejecting empty or non-finite geometry.
    pub fn new(id: &str, x: f64, y: f64, width: f64, height: f64) -> Result<Self, SpaceError> {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return Err(SpaceError::NonFinite(id.to_string()));
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(SpaceError::MalformedRect {
                id: id.to_string(),
                width,
                height,
            });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// True if any part of an avatar hitbox centered at `location` lies inside
    /// this rectangle. Touching edges do not count.
    pub fn contains(&self, location: &PlayerLocation) -> bool {
        location.x + PLAYER_SPRITE_WIDTH / 2.0 > self.x
            && location.x - PLAYER_SPRITE_WIDTH / 2.0 < self.x + self.width
            && location.y + PLAYER_SPRITE_HEIGHT / 2.0 > self.y
            && location.y - PLAYER_SPRITE_HEIGHT / 2.0 < self.y + self.height
    }

    /// True if a single avatar could touch both rectangles at once, i.e. the
    /// rectangles intersect after each is inflated by half a hitbox per axis.
    pub fn overlaps(&self, other: &Rect) -> bool {
        let a = self.inflated();
        let b = other.inflated();
        !(a.x1 >= b.x2 || b.x1 >= a.x2 || a.y1 >= b.y2 || b.y1 >= a.y2)
    }

    fn inflated(&self) -> Bounds {
        Bounds {
            x1: self.x - PLAYER_SPRITE_WIDTH / 2.0,
            x2: self.x + self.width + PLAYER_SPRITE_WIDTH / 2.0,
            y1: self.y - PLAYER_SPRITE_HEIGHT / 2.0,
            y2: self.y + self.height + PLAYER_SPRITE_HEIGHT / 2.0,
        }
    }
}

struct Bounds {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}
