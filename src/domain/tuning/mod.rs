// Gameplay tuning, kept separate from runtime/server configuration (tick rates, buffer sizes, etc.).

pub mod combat;
pub mod enemy;
pub mod player;
pub mod world;

pub use combat::CombatTuning;
pub use enemy::EnemyTuning;
pub use player::PlayerTuning;
pub use world::WorldTuning;

/// Bundle of every tuning table the world needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameTuning {
    pub world: WorldTuning,
    pub player: PlayerTuning,
    pub enemy: EnemyTuning,
    pub combat: CombatTuning,
}

/// Converts a duration in seconds into a whole number of ticks (at least one).
pub fn seconds_to_ticks(seconds: f32, dt: f32) -> u32 {
    if dt <= 0.0 {
        return 1;
    }
    ((seconds / dt).round() as u32).max(1)
}
