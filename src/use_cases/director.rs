// Enemy population upkeep and per-tick AI driving.

use std::collections::BTreeMap;

use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::SimError;
use crate::domain::{Bounds, Enemy, PhaseTicks, TargetCandidate, Vec2};
use crate::domain::tuning::EnemyTuning;

pub struct EnemyDirector {
    target_population: usize,
    tuning: EnemyTuning,
    phases: PhaseTicks,
    bounds: Bounds,
    dt: f32,
    rng: StdRng,
}

impl EnemyDirector {
    pub fn new(
        target_population: usize,
        tuning: EnemyTuning,
        bounds: Bounds,
        dt: f32,
        rng: StdRng,
    ) -> Self {
        Self {
            target_population,
            tuning,
            phases: PhaseTicks::from_tuning(&tuning, dt),
            bounds,
            dt,
            rng,
        }
    }

    pub fn target_population(&self) -> usize {
        self.target_population
    }

    /// Runs targeting, the behaviour state machine and movement for every enemy.
    ///
    /// Each enemy is updated on a copy; a copy that ends up with a non-finite position or
    /// velocity is dropped and the enemy keeps last tick's state.
    pub fn update_enemies(
        &mut self,
        enemies: &mut BTreeMap<String, Enemy>,
        players: &[TargetCandidate<'_>],
    ) {
        for enemy in enemies.values_mut() {
            let mut next = enemy.clone();

            if let Err(err) = next.update_targeting(players, self.tuning.detection_radius) {
                debug!(error = %err, "enemy target reset");
            }
            next.advance(players, &self.tuning, &mut self.rng);
            next.integrate(self.dt, self.bounds);

            if next.position.is_finite() && next.velocity.is_finite() {
                *enemy = next;
            } else {
                let fault = SimError::EntityFault {
                    entity_id: enemy.id.clone(),
                    reason: "non-finite enemy state",
                };
                warn!(error = %fault, "enemy update discarded");
            }
        }
    }

    /// Drops enemies whose death window has elapsed. Returns how many were removed.
    pub fn collect_dead(&self, enemies: &mut BTreeMap<String, Enemy>) -> usize {
        let before = enemies.len();
        enemies.retain(|_, e| !e.death_window_elapsed());
        before - enemies.len()
    }

    /// Spawns idle enemies until the live count reaches the target. Returns how many spawned.
    pub fn replenish(&mut self, enemies: &mut BTreeMap<String, Enemy>) -> usize {
        let live = enemies.values().filter(|e| e.alive).count();
        let missing = self.target_population.saturating_sub(live);

        for _ in 0..missing {
            let enemy = self.spawn_enemy();
            info!(enemy_id = %enemy.id, x = enemy.position.x, y = enemy.position.y, "enemy spawned");
            enemies.insert(enemy.id.clone(), enemy);
        }
        missing
    }

    fn spawn_enemy(&mut self) -> Enemy {
        let position = Vec2::new(
            self.rng.gen_range(0.0..=self.bounds.width),
            self.rng.gen_range(0.0..=self.bounds.height),
        );
        Enemy::spawn(
            Uuid::new_v4().to_string(),
            position,
            self.tuning.max_health,
            self.phases,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EnemyAction;
    use rand::SeedableRng;

    fn director(target: usize) -> EnemyDirector {
        EnemyDirector::new(
            target,
            EnemyTuning::default(),
            Bounds {
                width: 800.0,
                height: 600.0,
            },
            0.05,
            StdRng::seed_from_u64(11),
        )
    }

    #[test]
    fn when_population_is_below_target_then_spawns_idle_enemies_in_bounds() {
        let mut director = director(5);
        let mut enemies = BTreeMap::new();

        assert_eq!(director.replenish(&mut enemies), 5);
        assert_eq!(enemies.len(), 5);
        for enemy in enemies.values() {
            assert!(enemy.alive);
            assert_eq!(enemy.action, EnemyAction::Idle);
            assert_eq!(enemy.health, EnemyTuning::default().max_health);
            assert!((0.0..=800.0).contains(&enemy.position.x));
            assert!((0.0..=600.0).contains(&enemy.position.y));
        }

        assert_eq!(director.replenish(&mut enemies), 0);
    }

    #[test]
    fn when_an_enemy_is_dying_then_a_replacement_spawns_beside_it() {
        let mut director = director(2);
        let mut enemies = BTreeMap::new();
        director.replenish(&mut enemies);

        let victim = enemies.keys().next().cloned().unwrap();
        enemies.get_mut(&victim).unwrap().take_damage(1000);

        assert_eq!(director.replenish(&mut enemies), 1);
        assert_eq!(enemies.len(), 3);
    }

    #[test]
    fn when_death_window_elapses_then_enemy_is_collected() {
        let mut director = director(1);
        let mut enemies = BTreeMap::new();
        director.replenish(&mut enemies);
        let id = enemies.keys().next().cloned().unwrap();
        enemies.get_mut(&id).unwrap().take_damage(1000);

        let mut ticks = 0;
        while director.collect_dead(&mut enemies) == 0 {
            director.update_enemies(&mut enemies, &[]);
            ticks += 1;
            assert!(ticks <= 20, "dead enemy never collected");
        }

        assert!(enemies.is_empty());
        assert_eq!(ticks, PhaseTicks::from_tuning(&EnemyTuning::default(), 0.05).death);
    }

    #[test]
    fn when_player_is_close_then_update_sends_the_enemy_chasing() {
        let mut director = director(1);
        let mut enemies = BTreeMap::new();
        director.replenish(&mut enemies);
        let id = enemies.keys().next().cloned().unwrap();
        let spot = enemies[&id].position;

        let players = [TargetCandidate {
            id: "p1",
            position: Vec2::new(spot.x + 10.0, spot.y),
        }];
        director.update_enemies(&mut enemies, &players);

        assert_eq!(enemies[&id].target.as_deref(), Some("p1"));
        assert_eq!(enemies[&id].action, EnemyAction::Chase);
    }

    #[test]
    fn when_update_produces_non_finite_state_then_previous_state_is_kept() {
        let mut director = director(0);
        let phases = PhaseTicks::from_tuning(&EnemyTuning::default(), 0.05);
        let mut broken = Enemy::spawn("e1", Vec2::new(100.0, 100.0), 100, phases);
        broken.take_damage(10);
        // Clamping cannot repair NaN.
        broken.position = Vec2::new(f32::NAN, 100.0);
        let before = broken.clone();

        let mut enemies = BTreeMap::from([("e1".to_string(), broken)]);
        director.update_enemies(&mut enemies, &[]);

        let after = &enemies["e1"];
        assert!(!after.position.is_finite());
        assert_eq!(after.phase_ticks(), before.phase_ticks());
        assert_eq!(after.action, before.action);
    }
}
