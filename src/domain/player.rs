// Player characters: buffered input, tile-aware movement and progression.

use crate::domain::geometry::{Bounds, Vec2};
use crate::domain::tilemap::TileCollisionIndex;
use crate::domain::tuning::PlayerTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    Idle,
    Walk,
    Attack,
    Die,
}

/// Latest input received from a client. Absent fields leave the buffered value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerInput {
    pub left: Option<bool>,
    pub right: Option<bool>,
    pub up: Option<bool>,
    pub down: Option<bool>,
    pub direction: Option<Direction>,
    pub action: Option<PlayerAction>,
}

impl PlayerInput {
    pub fn is_attack(&self) -> bool {
        self.action == Some(PlayerAction::Attack)
    }

    /// Last writer wins per field, except that a pending attack survives until consumed.
    pub fn merge(&mut self, newer: PlayerInput) {
        let attack_pending = self.is_attack();

        self.left = newer.left.or(self.left);
        self.right = newer.right.or(self.right);
        self.up = newer.up.or(self.up);
        self.down = newer.down.or(self.down);
        self.direction = newer.direction.or(self.direction);
        self.action = newer.action.or(self.action);

        if attack_pending {
            self.action = Some(PlayerAction::Attack);
        }
    }

    fn displacement(&self, step: f32) -> Vec2 {
        let held = |flag: Option<bool>| if flag == Some(true) { step } else { 0.0 };
        Vec2::new(
            held(self.right) - held(self.left),
            held(self.down) - held(self.up),
        )
    }
}

/// Durable player state as exchanged with the player store.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub player_id: String,
    pub position: Vec2,
    pub level: u32,
    pub exp: u32,
    pub health: i32,
    pub direction: Direction,
    pub action: PlayerAction,
}

impl PlayerRecord {
    pub fn new_default(player_id: impl Into<String>, tuning: &PlayerTuning) -> Self {
        Self {
            player_id: player_id.into(),
            position: Vec2::new(tuning.spawn_x, tuning.spawn_y),
            level: 1,
            exp: 0,
            health: tuning.max_health,
            direction: Direction::Right,
            action: PlayerAction::Idle,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub position: Vec2,
    pub level: u32,
    pub exp: u32,
    pub health: i32,
    pub alive: bool,
    pub direction: Direction,
    pub action: PlayerAction,
    /// Pixels per second.
    pub speed: f32,

    // Movement-only state (never serialized to clients).
    pending_input: Option<PlayerInput>,
}

impl Player {
    pub fn from_record(record: PlayerRecord, tuning: &PlayerTuning, bounds: Bounds) -> Self {
        let mut player = Self {
            id: record.player_id,
            position: bounds.clamp(record.position),
            level: record.level.max(1),
            exp: record.exp,
            health: record.health,
            alive: record.health > 0,
            direction: record.direction,
            action: record.action,
            speed: tuning.speed,
            pending_input: None,
        };
        // Stored records may predate a threshold change; settle any owed level-ups.
        player.gain_exp(0);
        player
    }

    pub fn to_record(&self) -> PlayerRecord {
        PlayerRecord {
            player_id: self.id.clone(),
            position: self.position,
            level: self.level,
            exp: self.exp,
            health: self.health,
            direction: self.direction,
            action: self.action,
        }
    }

    pub fn set_input(&mut self, input: PlayerInput) {
        match self.pending_input.as_mut() {
            Some(pending) => pending.merge(input),
            None => self.pending_input = Some(input),
        }
    }

    pub fn discard_input(&mut self) {
        self.pending_input = None;
    }

    pub fn has_pending_input(&self) -> bool {
        self.pending_input.is_some()
    }

    /// Reads the buffer without consuming it.
    pub fn is_attacking(&self) -> bool {
        self.pending_input
            .as_ref()
            .is_some_and(PlayerInput::is_attack)
    }

    /// Consumes the buffered input once: moves unless the destination tile is blocked, copies
    /// direction/action, then clamps into the world. Returns the consumed input.
    pub fn apply_buffered_input(
        &mut self,
        collision: &TileCollisionIndex,
        tick_rate: f32,
        bounds: Bounds,
    ) -> Option<PlayerInput> {
        let input = self.pending_input.take()?;

        let step = self.speed / tick_rate;
        let delta = input.displacement(step);
        if delta != Vec2::ZERO {
            let candidate = Vec2::new(self.position.x + delta.x, self.position.y + delta.y);
            if !collision.is_blocked_at(candidate.x, candidate.y) {
                self.position = candidate;
            }
        }

        if let Some(direction) = input.direction {
            self.direction = direction;
        }
        if let Some(action) = input.action {
            self.action = action;
        }

        self.position = bounds.clamp(self.position);
        Some(input)
    }

    pub fn exp_to_next_level(&self) -> u32 {
        self.level * 100
    }

    /// Adds experience and applies every level-up it pays for. Returns true if the level changed.
    pub fn gain_exp(&mut self, amount: u32) -> bool {
        self.exp = self.exp.saturating_add(amount);
        let mut leveled_up = false;
        while self.exp >= self.exp_to_next_level() {
            self.exp -= self.exp_to_next_level();
            self.level += 1;
            leveled_up = true;
        }
        leveled_up
    }
}
