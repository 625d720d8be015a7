use crate::domain::enemy::Enemy;
use crate::domain::player::Player;
use crate::domain::tuning::CombatTuning;

/// Result of one melee swing that connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    pub enemy_id: String,
    pub killed: bool,
    pub leveled_up: bool,
}

/// Hits the nearest live enemy strictly inside the attack radius, if any.
///
/// A kill awards experience to the attacker in the same call.
pub fn resolve_attack<'a, I>(
    attacker: &mut Player,
    enemies: I,
    tuning: &CombatTuning,
) -> Option<AttackOutcome>
where
    I: IntoIterator<Item = &'a mut Enemy>,
{
    let origin = attacker.position;

    // Naive O(E) scan; enemy counts are small.
    let target = enemies
        .into_iter()
        .filter(|e| e.alive)
        .map(|e| (origin.distance(e.position), e))
        .filter(|(distance, _)| *distance < tuning.attack_radius)
        .min_by(|(da, a), (db, b)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)))
        .map(|(_, e)| e)?;

    let killed = target.take_damage(tuning.damage);
    let leveled_up = killed && attacker.gain_exp(tuning.exp_per_kill);

    Some(AttackOutcome {
        enemy_id: target.id.clone(),
        killed,
        leveled_up,
    })
}
