// Playable area shared by players and enemies.

use crate::domain::geometry::Bounds;

#[derive(Debug, Clone, Copy)]
pub struct WorldTuning {
    /// World width in pixels.
    pub width: f32,

    /// World height in pixels.
    pub height: f32,
}

impl WorldTuning {
    pub fn bounds(&self) -> Bounds {
        Bounds {
            width: self.width,
            height: self.height,
        }
    }
}

impl Default for WorldTuning {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}
