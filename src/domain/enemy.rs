// Enemy state machine: targeting, chase phases, boundary bounce and death.

use crate::domain::errors::SimError;
use crate::domain::geometry::{Bounds, Vec2};
use crate::domain::player::Direction;
use crate::domain::tuning::{EnemyTuning, seconds_to_ticks};
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyAction {
    Idle,
    Chase,
    Hop,
    LongJump,
    Confused,
    Die,
}

/// A live player as seen by enemy AI for one tick.
#[derive(Debug, Clone, Copy)]
pub struct TargetCandidate<'a> {
    pub id: &'a str,
    pub position: Vec2,
}

/// Phase lengths converted from tuning seconds into ticks at the world's fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTicks {
    pub wander_min: u32,
    pub wander_max: u32,
    pub hop: u32,
    pub long_jump: u32,
    pub confused: u32,
    pub death: u32,
}

impl PhaseTicks {
    pub fn from_tuning(tuning: &EnemyTuning, dt: f32) -> Self {
        let wander_a = seconds_to_ticks(tuning.wander_min_seconds, dt);
        let wander_b = seconds_to_ticks(tuning.wander_max_seconds, dt);
        Self {
            wander_min: wander_a.min(wander_b),
            wander_max: wander_a.max(wander_b),
            hop: seconds_to_ticks(tuning.hop_seconds, dt),
            long_jump: seconds_to_ticks(tuning.long_jump_seconds, dt),
            confused: seconds_to_ticks(tuning.confused_seconds, dt),
            death: seconds_to_ticks(tuning.death_seconds, dt),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: String,
    pub position: Vec2,
    pub health: i32,
    pub max_health: i32,
    pub alive: bool,
    /// Pixels per second.
    pub velocity: Vec2,
    pub direction: Direction,
    pub action: EnemyAction,
    /// Player id only; re-resolved against the live set every tick.
    pub target: Option<String>,

    // Ticks remaining in the current wander/hop/jump/confused/death phase.
    phase_ticks: u32,
    phases: PhaseTicks,
}

impl Enemy {
    pub fn spawn(id: impl Into<String>, position: Vec2, max_health: i32, phases: PhaseTicks) -> Self {
        Self {
            id: id.into(),
            position,
            health: max_health,
            max_health,
            alive: true,
            velocity: Vec2::ZERO,
            direction: Direction::Down,
            action: EnemyAction::Idle,
            target: None,
            phase_ticks: 0,
            phases,
        }
    }

    pub fn phase_ticks(&self) -> u32 {
        self.phase_ticks
    }

    /// Applies a hit. Returns true exactly once: on the hit that kills.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        if !self.alive {
            return false;
        }

        self.health = (self.health - amount).clamp(0, self.max_health);
        self.velocity = Vec2::ZERO;
        if self.health == 0 {
            self.alive = false;
            self.action = EnemyAction::Die;
            self.target = None;
            self.phase_ticks = self.phases.death;
            return true;
        }

        self.action = EnemyAction::Confused;
        self.phase_ticks = self.phases.confused;
        false
    }

    /// Re-validates the stored target and acquires the nearest player in range when idle.
    ///
    /// A vanished target is cleared and the enemy reverts to idle; the error is only reported.
    pub fn update_targeting(
        &mut self,
        players: &[TargetCandidate<'_>],
        detection_radius: f32,
    ) -> Result<(), SimError> {
        if !self.alive {
            return Ok(());
        }

        if let Some(target_id) = self.target.as_deref() {
            if players.iter().any(|p| p.id == target_id) {
                return Ok(());
            }
            let player_id = self.target.take().unwrap_or_default();
            self.revert_to_idle();
            return Err(SimError::TargetVanished {
                enemy_id: self.id.clone(),
                player_id,
            });
        }

        if let Some(nearest) = nearest_within(self.position, players, detection_radius) {
            self.target = Some(nearest.id.to_string());
            if self.action == EnemyAction::Idle {
                self.action = EnemyAction::Chase;
            }
        }
        Ok(())
    }

    /// Advances the behaviour state machine by one tick.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        players: &[TargetCandidate<'_>],
        tuning: &EnemyTuning,
        rng: &mut R,
    ) {
        let target_position = self
            .target
            .as_deref()
            .and_then(|id| players.iter().find(|p| p.id == id))
            .map(|p| p.position);

        match self.action {
            EnemyAction::Die => {
                self.velocity = Vec2::ZERO;
                self.phase_ticks = self.phase_ticks.saturating_sub(1);
            }
            EnemyAction::Idle => {
                if self.phase_ticks == 0 {
                    let heading = rng.gen_range(0.0..std::f32::consts::TAU);
                    self.velocity = Vec2::new(heading.cos(), heading.sin()).scale(tuning.wander_speed);
                    self.phase_ticks = rng.gen_range(self.phases.wander_min..=self.phases.wander_max);
                } else {
                    self.phase_ticks -= 1;
                }
            }
            EnemyAction::Confused => {
                self.velocity = Vec2::ZERO;
                self.phase_ticks = self.phase_ticks.saturating_sub(1);
                if self.phase_ticks == 0 {
                    if target_position.is_some() {
                        self.action = EnemyAction::Chase;
                    } else {
                        self.revert_to_idle();
                    }
                }
            }
            EnemyAction::Chase => {
                let Some(target) = target_position else {
                    self.revert_to_idle();
                    return;
                };
                if self.position.distance(target) > tuning.long_jump_distance {
                    self.action = EnemyAction::Hop;
                    self.velocity = Vec2::ZERO;
                    self.phase_ticks = self.phases.hop;
                } else {
                    self.velocity = self.position.direction_to(target).scale(tuning.chase_speed);
                }
            }
            EnemyAction::Hop => {
                let Some(target) = target_position else {
                    self.revert_to_idle();
                    return;
                };
                self.velocity = Vec2::ZERO;
                self.phase_ticks = self.phase_ticks.saturating_sub(1);
                if self.position.distance(target) <= tuning.long_jump_distance {
                    self.action = EnemyAction::Chase;
                } else if self.phase_ticks == 0 {
                    self.action = EnemyAction::LongJump;
                    self.velocity = self
                        .position
                        .direction_to(target)
                        .scale(tuning.long_jump_speed);
                    self.phase_ticks = self.phases.long_jump;
                }
            }
            EnemyAction::LongJump => {
                self.phase_ticks = self.phase_ticks.saturating_sub(1);
                if self.phase_ticks == 0 {
                    self.action = EnemyAction::Chase;
                }
            }
        }

        if let Some(direction) = facing(self.velocity) {
            self.direction = direction;
        }
    }

    /// Integrates velocity, bounces off the world edges and clamps into bounds.
    pub fn integrate(&mut self, dt: f32, bounds: Bounds) {
        if !self.alive {
            return;
        }

        self.position.x += self.velocity.x * dt;
        self.position.y += self.velocity.y * dt;

        if self.position.x < 0.0 || self.position.x > bounds.width {
            self.velocity.x = -self.velocity.x;
        }
        if self.position.y < 0.0 || self.position.y > bounds.height {
            self.velocity.y = -self.velocity.y;
        }

        self.position = bounds.clamp(self.position);
    }

    /// True once a dead enemy has been visible for its whole death window.
    pub fn death_window_elapsed(&self) -> bool {
        !self.alive && self.phase_ticks == 0
    }

    fn revert_to_idle(&mut self) {
        self.action = EnemyAction::Idle;
        self.velocity = Vec2::ZERO;
        self.phase_ticks = 0;
    }
}

/// Nearest candidate within `radius`; ties go to the lowest player id.
pub fn nearest_within<'a>(
    from: Vec2,
    players: &[TargetCandidate<'a>],
    radius: f32,
) -> Option<TargetCandidate<'a>> {
    players
        .iter()
        .map(|p| (from.distance(p.position), p))
        .filter(|(distance, _)| *distance <= radius)
        .min_by(|(da, a), (db, b)| da.total_cmp(db).then_with(|| a.id.cmp(b.id)))
        .map(|(_, p)| *p)
}

fn facing(velocity: Vec2) -> Option<Direction> {
    if velocity == Vec2::ZERO {
        return None;
    }
    Some(if velocity.x.abs() >= velocity.y.abs() {
        if velocity.x >= 0.0 {
            Direction::Right
        } else {
            Direction::Left
        }
    } else if velocity.y >= 0.0 {
        Direction::Down
    } else {
        Direction::Up
    })
}
