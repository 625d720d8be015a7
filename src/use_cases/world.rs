// The World aggregate: every live entity plus the session registry, owned by the world task.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::errors::SimError;
use crate::domain::systems::combat;
use crate::domain::tuning::GameTuning;
use crate::domain::{
    Enemy, EnemySnapshot, Player, PlayerFieldUpdate, PlayerInput, PlayerRecord, PlayerSnapshot,
    TargetCandidate, TileCollisionIndex, WorldSnapshot,
};
use crate::use_cases::director::EnemyDirector;
use crate::use_cases::registry::{ConnectionRegistry, SessionId};
use crate::use_cases::types::{DirectEvent, InitReply, WorldUpdate};

pub const MAX_CHAT_CHARS: usize = 256;
const STATS_LOG_EVERY_TICKS: u64 = 100;

/// Everything one tick produced for the outside world.
#[derive(Debug, Default)]
pub struct TickReport {
    pub snapshot: WorldSnapshot,
    /// Unicasts addressed to a specific session.
    pub direct: Vec<(SessionId, DirectEvent)>,
    /// Progress to persist, one entry per kill.
    pub progress: Vec<(String, PlayerFieldUpdate)>,
}

#[derive(Debug)]
pub struct Admission {
    pub reply: InitReply,
    /// Session that held this player before and no longer does.
    pub displaced: Option<SessionId>,
    /// Player this session was bound to before re-initialising under another identity.
    pub released: Option<PlayerRecord>,
}

pub struct World {
    tick: u64,
    players: BTreeMap<String, Player>,
    enemies: BTreeMap<String, Enemy>,
    registry: ConnectionRegistry,
    director: EnemyDirector,
    collision: Arc<TileCollisionIndex>,
    tuning: GameTuning,
    tick_rate: f32,
}

impl World {
    pub fn new(
        collision: Arc<TileCollisionIndex>,
        tuning: GameTuning,
        tick_rate: u32,
        director: EnemyDirector,
    ) -> Self {
        let mut world = Self {
            tick: 0,
            players: BTreeMap::new(),
            enemies: BTreeMap::new(),
            registry: ConnectionRegistry::new(),
            director,
            collision,
            tuning,
            tick_rate: tick_rate.max(1) as f32,
        };
        world.director.replenish(&mut world.enemies);
        world
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_live(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn session_for(&self, player_id: &str) -> Option<SessionId> {
        self.registry.session_for(player_id)
    }

    pub fn default_record(&self, player_id: &str) -> PlayerRecord {
        PlayerRecord::new_default(player_id, &self.tuning.player)
    }

    /// Binds `session_id` to the record's player and brings the player into the live set.
    ///
    /// A player who is already live keeps its in-world state; the record is only used for
    /// players entering the world.
    pub fn admit(&mut self, session_id: SessionId, record: PlayerRecord) -> Admission {
        let player_id = record.player_id.clone();

        let switching = self
            .registry
            .player_for(session_id)
            .is_some_and(|current| current != player_id);
        let released = if switching {
            self.disconnect(session_id)
        } else {
            None
        };

        let displaced = self.registry.bind(session_id, &player_id);
        if let Some(previous) = displaced {
            info!(player_id = %player_id, previous, session_id, "player moved to a new session");
        }

        let bounds = self.tuning.world.bounds();
        let tuning = self.tuning.player;
        let player = self
            .players
            .entry(player_id)
            .or_insert_with(|| Player::from_record(record, &tuning, bounds));
        let player = PlayerSnapshot::from(&*player);

        Admission {
            reply: InitReply {
                player,
                players: self.player_snapshots(),
                enemies: self.enemy_snapshots(),
            },
            displaced,
            released,
        }
    }

    /// Buffers input for the session's player; it is consumed on the next tick.
    pub fn buffer_input(&mut self, session_id: SessionId, input: PlayerInput) -> Result<(), SimError> {
        let player = self
            .registry
            .player_for(session_id)
            .and_then(|id| self.players.get_mut(id))
            .ok_or(SimError::UnknownPlayerInput { session_id })?;
        player.set_input(input);
        Ok(())
    }

    /// Tags chat text with the sender's identity. Blank messages yield `None`.
    pub fn chat(&self, session_id: SessionId, text: &str) -> Result<Option<WorldUpdate>, SimError> {
        let player_id = self
            .registry
            .player_for(session_id)
            .ok_or(SimError::UnknownPlayerInput { session_id })?;

        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        Ok(Some(WorldUpdate::Chat {
            player_id: player_id.to_string(),
            text: text.chars().take(MAX_CHAT_CHARS).collect(),
        }))
    }

    /// Removes the session's player from the live set and returns its final record.
    pub fn disconnect(&mut self, session_id: SessionId) -> Option<PlayerRecord> {
        let player_id = self.registry.unbind_session(session_id)?;
        let player = self.players.remove(&player_id)?;
        Some(player.to_record())
    }

    /// Advances the world by one fixed step.
    pub fn step(&mut self) -> TickReport {
        self.tick += 1;
        let bounds = self.tuning.world.bounds();
        let mut report = TickReport::default();

        // Players: consume buffered input, then resolve any attack it carried.
        for player in self.players.values_mut() {
            if !player.has_pending_input() {
                continue;
            }

            let mut next = player.clone();
            let Some(input) = next.apply_buffered_input(&self.collision, self.tick_rate, bounds)
            else {
                continue;
            };
            if !next.position.is_finite() {
                let fault = SimError::EntityFault {
                    entity_id: player.id.clone(),
                    reason: "non-finite player position",
                };
                warn!(error = %fault, "player update discarded");
                player.discard_input();
                continue;
            }
            *player = next;

            if !input.is_attack() {
                continue;
            }
            let Some(outcome) =
                combat::resolve_attack(player, self.enemies.values_mut(), &self.tuning.combat)
            else {
                continue;
            };
            if !outcome.killed {
                continue;
            }

            info!(player_id = %player.id, enemy_id = %outcome.enemy_id, "enemy killed");
            report.progress.push((
                player.id.clone(),
                PlayerFieldUpdate {
                    level: player.level,
                    exp: player.exp,
                },
            ));
            if outcome.leveled_up {
                info!(player_id = %player.id, level = player.level, "player leveled up");
                if let Some(session_id) = self.registry.session_for(&player.id) {
                    report.direct.push((
                        session_id,
                        DirectEvent::LevelUp {
                            level: player.level,
                        },
                    ));
                }
            }
        }

        // Enemies: targeting, behaviour and movement.
        let candidates: Vec<TargetCandidate<'_>> = self
            .players
            .values()
            .filter(|p| p.alive)
            .map(|p| TargetCandidate {
                id: &p.id,
                position: p.position,
            })
            .collect();
        self.director.update_enemies(&mut self.enemies, &candidates);

        let collected = self.director.collect_dead(&mut self.enemies);
        if collected > 0 {
            debug!(collected, "dead enemies removed");
        }

        report.snapshot = WorldSnapshot {
            tick: self.tick,
            players: self.player_snapshots(),
            enemies: self.enemy_snapshots(),
        };

        self.director.replenish(&mut self.enemies);

        if self.tick % STATS_LOG_EVERY_TICKS == 0 && !self.registry.is_empty() {
            debug!(
                tick = self.tick,
                players = self.player_count(),
                enemies = self.enemies.len(),
                target_enemies = self.director.target_population(),
                sessions = self.registry.len(),
                "world stats"
            );
        }

        report
    }

    fn player_snapshots(&self) -> Vec<PlayerSnapshot> {
        self.players.values().map(PlayerSnapshot::from).collect()
    }

    fn enemy_snapshots(&self) -> Vec<EnemySnapshot> {
        self.enemies
            .values()
            .filter(|e| e.alive)
            .map(EnemySnapshot::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tuning::EnemyTuning;
    use crate::domain::{EnemyAction, PhaseTicks, PlayerAction, Vec2};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const TICK_RATE: u32 = 20;

    // Tile (13, 9) is a wall: world x in [416, 448), y in [288, 320).
    const MAP: &str = r#"{ "tilewidth": 32, "tileheight": 32, "layers": [
        { "name": "walls", "type": "tilelayer", "chunks": [
            { "x": 13, "y": 9, "width": 1, "height": 1, "data": [5] }
        ], "properties": [{ "name": "collides", "value": true }] }
    ]}"#;

    fn world() -> World {
        let tuning = GameTuning::default();
        let director = EnemyDirector::new(
            0,
            tuning.enemy,
            tuning.world.bounds(),
            1.0 / TICK_RATE as f32,
            StdRng::seed_from_u64(5),
        );
        let collision = Arc::new(TileCollisionIndex::from_json_str(MAP).unwrap());
        World::new(collision, tuning, TICK_RATE, director)
    }

    fn join(world: &mut World, session_id: SessionId, player_id: &str) -> Admission {
        let record = world.default_record(player_id);
        world.admit(session_id, record)
    }

    fn place_enemy(world: &mut World, id: &str, x: f32, y: f32, health: i32) {
        let phases = PhaseTicks::from_tuning(&EnemyTuning::default(), 1.0 / TICK_RATE as f32);
        let mut enemy = Enemy::spawn(id, Vec2::new(x, y), 100, phases);
        enemy.health = health;
        world.enemies.insert(id.to_string(), enemy);
    }

    fn attack() -> PlayerInput {
        PlayerInput {
            action: Some(PlayerAction::Attack),
            ..PlayerInput::default()
        }
    }

    #[test]
    fn when_player_is_admitted_then_init_reply_contains_self_players_and_enemies() {
        let mut world = world();
        place_enemy(&mut world, "e1", 100.0, 100.0, 100);

        let admission = join(&mut world, 1, "alice");

        assert_eq!(admission.reply.player.id, "alice");
        assert_eq!((admission.reply.player.x, admission.reply.player.y), (400.0, 300.0));
        assert_eq!(admission.reply.players.len(), 1);
        assert_eq!(admission.reply.enemies.len(), 1);
        assert_eq!(admission.displaced, None);
    }

    #[test]
    fn when_input_comes_from_unbound_session_then_unknown_player_input() {
        let mut world = world();
        let err = world
            .buffer_input(7, PlayerInput::default())
            .unwrap_err();
        assert_eq!(err, SimError::UnknownPlayerInput { session_id: 7 });
    }

    #[test]
    fn when_walking_into_a_wall_then_player_stays_put() {
        let mut world = world();
        join(&mut world, 1, "alice");
        // From (400, 300) the first step lands at x = 410; the second would enter the wall tile.
        for _ in 0..2 {
            world
                .buffer_input(
                    1,
                    PlayerInput {
                        right: Some(true),
                        ..PlayerInput::default()
                    },
                )
                .unwrap();
            world.step();
        }
        assert_eq!(world.player("alice").unwrap().position, Vec2::new(410.0, 300.0));
    }

    #[test]
    fn when_player_update_produces_non_finite_position_then_previous_state_is_kept() {
        let mut world = world();
        join(&mut world, 1, "alice");
        world.players.get_mut("alice").unwrap().speed = f32::NAN;
        world
            .buffer_input(
                1,
                PlayerInput {
                    right: Some(true),
                    action: Some(PlayerAction::Walk),
                    ..PlayerInput::default()
                },
            )
            .unwrap();

        let report = world.step();

        let alice = world.player("alice").unwrap();
        assert_eq!(alice.position, Vec2::new(400.0, 300.0));
        assert_eq!(alice.action, PlayerAction::Idle);
        assert!(!alice.has_pending_input(), "faulty input is not replayed");
        assert_eq!(report.snapshot.players[0].x, 400.0);
    }

    #[test]
    fn when_input_is_buffered_twice_before_a_tick_then_it_is_applied_once() {
        let mut world = world();
        join(&mut world, 1, "alice");
        let left = PlayerInput {
            left: Some(true),
            ..PlayerInput::default()
        };
        world.buffer_input(1, left.clone()).unwrap();
        world.buffer_input(1, left).unwrap();

        world.step();
        world.step();

        assert_eq!(world.player("alice").unwrap().position, Vec2::new(390.0, 300.0));
    }

    #[test]
    fn when_kill_levels_player_up_then_level_up_is_unicast_and_progress_recorded() {
        let mut world = world();
        join(&mut world, 1, "alice");
        join(&mut world, 2, "bob");
        world.players.get_mut("alice").unwrap().exp = 60;
        place_enemy(&mut world, "e1", 420.0, 300.0, 10);

        world.buffer_input(1, attack()).unwrap();
        let report = world.step();

        assert_eq!(report.direct, vec![(1, DirectEvent::LevelUp { level: 2 })]);
        assert_eq!(
            report.progress,
            vec![("alice".to_string(), PlayerFieldUpdate { level: 2, exp: 10 })]
        );
        assert!(report.snapshot.enemies.is_empty(), "dead enemies are not broadcast");
        assert_eq!(world.enemies["e1"].action, EnemyAction::Die);
    }

    #[test]
    fn when_kill_does_not_level_up_then_progress_is_still_persisted() {
        let mut world = world();
        join(&mut world, 1, "alice");
        place_enemy(&mut world, "e1", 420.0, 300.0, 10);

        world.buffer_input(1, attack()).unwrap();
        let report = world.step();

        assert!(report.direct.is_empty());
        assert_eq!(
            report.progress,
            vec![("alice".to_string(), PlayerFieldUpdate { level: 1, exp: 50 })]
        );
    }

    #[test]
    fn when_attack_hits_without_killing_then_enemy_is_still_broadcast() {
        let mut world = world();
        join(&mut world, 1, "alice");
        place_enemy(&mut world, "e1", 420.0, 300.0, 100);

        world.buffer_input(1, attack()).unwrap();
        let report = world.step();

        assert!(report.progress.is_empty());
        assert_eq!(report.snapshot.enemies.len(), 1);
        assert_eq!(report.snapshot.enemies[0].health, 90);
    }

    #[test]
    fn when_target_disconnects_then_enemy_goes_idle_on_next_tick() {
        let mut world = world();
        join(&mut world, 1, "alice");
        place_enemy(&mut world, "e1", 450.0, 300.0, 100);

        world.step();
        assert_eq!(world.enemies["e1"].target.as_deref(), Some("alice"));

        let record = world.disconnect(1).unwrap();
        assert_eq!(record.player_id, "alice");
        assert!(!world.is_live("alice"));

        world.step();
        assert_eq!(world.enemies["e1"].target, None);
        assert_eq!(world.enemies["e1"].action, EnemyAction::Idle);
    }

    #[test]
    fn when_player_reconnects_on_new_session_then_live_state_is_kept() {
        let mut world = world();
        join(&mut world, 1, "alice");
        world.players.get_mut("alice").unwrap().level = 4;

        let admission = join(&mut world, 2, "alice");

        assert_eq!(admission.displaced, Some(1));
        assert_eq!(admission.reply.player.level, 4);
        assert_eq!(world.session_for("alice"), Some(2));
        assert!(world.disconnect(1).is_none(), "displaced session owns nothing");
    }

    #[test]
    fn when_session_switches_identity_then_previous_player_is_released() {
        let mut world = world();
        join(&mut world, 1, "alice");

        let admission = join(&mut world, 1, "bob");

        assert_eq!(admission.released.map(|r| r.player_id).as_deref(), Some("alice"));
        assert!(!world.is_live("alice"));
        assert!(world.is_live("bob"));
    }

    #[test]
    fn when_chat_is_padded_or_long_then_it_is_trimmed_and_capped() {
        let mut world = world();
        join(&mut world, 1, "alice");

        assert_eq!(world.chat(1, "   ").unwrap(), None);

        let Some(WorldUpdate::Chat { player_id, text }) = world.chat(1, "  hi  ").unwrap() else {
            panic!("expected chat");
        };
        assert_eq!(player_id, "alice");
        assert_eq!(text, "hi");

        let long = "x".repeat(MAX_CHAT_CHARS + 10);
        let Some(WorldUpdate::Chat { text, .. }) = world.chat(1, &long).unwrap() else {
            panic!("expected chat");
        };
        assert_eq!(text.chars().count(), MAX_CHAT_CHARS);
    }

    #[test]
    fn when_population_target_is_set_then_world_starts_populated() {
        let tuning = GameTuning::default();
        let director = EnemyDirector::new(
            3,
            tuning.enemy,
            tuning.world.bounds(),
            0.05,
            StdRng::seed_from_u64(9),
        );
        let collision = Arc::new(TileCollisionIndex::from_json_str(MAP).unwrap());
        let mut world = World::new(collision, tuning, TICK_RATE, director);

        let report = world.step();
        assert_eq!(report.snapshot.tick, 1);
        assert_eq!(report.snapshot.enemies.len(), 3);
    }
}
