/// Gameplay tuning for slimes and their chase behaviour.

#[derive(Debug, Clone, Copy)]
pub struct EnemyTuning {
    /// Health of a freshly spawned enemy.
    pub max_health: i32,

    /// Maximum distance at which an idle enemy acquires a target.
    pub detection_radius: f32,

    /// Targets further away than this are reached with a hop + long jump.
    pub long_jump_distance: f32,

    /// Speeds in pixels per second.
    pub wander_speed: f32,
    pub chase_speed: f32,
    pub long_jump_speed: f32,

    /// Idle heading changes happen every `wander_min_seconds..wander_max_seconds`.
    pub wander_min_seconds: f32,
    pub wander_max_seconds: f32,

    /// Wind-up before a long jump.
    pub hop_seconds: f32,
    pub long_jump_seconds: f32,

    /// Stun after a non-lethal hit.
    pub confused_seconds: f32,

    /// Dead enemies linger this long before removal.
    pub death_seconds: f32,
}

impl Default for EnemyTuning {
    fn default() -> Self {
        Self {
            max_health: 100,
            detection_radius: 200.0,
            long_jump_distance: 120.0,
            wander_speed: 50.0,
            chase_speed: 60.0,
            long_jump_speed: 180.0,
            wander_min_seconds: 2.0,
            wander_max_seconds: 5.0,
            hop_seconds: 0.4,
            long_jump_seconds: 0.5,
            confused_seconds: 0.6,
            death_seconds: 0.5,
        }
    }
}
