/// Gameplay tuning for player characters.

#[derive(Debug, Clone, Copy)]
pub struct PlayerTuning {
    /// Walking speed in pixels per second.
    pub speed: f32,

    /// Spawn point for players without a stored record.
    pub spawn_x: f32,
    pub spawn_y: f32,

    /// Starting health for new players.
    pub max_health: i32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            speed: 200.0,
            spawn_x: 400.0,
            spawn_y: 300.0,
            max_health: 100,
        }
    }
}
