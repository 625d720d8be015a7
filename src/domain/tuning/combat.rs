/// Gameplay tuning for melee attacks.

#[derive(Debug, Clone, Copy)]
pub struct CombatTuning {
    /// Only enemies strictly closer than this can be hit.
    pub attack_radius: f32,

    /// Health removed per hit.
    pub damage: i32,

    /// Experience awarded for a kill.
    pub exp_per_kill: u32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            attack_radius: 50.0,
            damage: 10,
            exp_per_kill: 50,
        }
    }
}
