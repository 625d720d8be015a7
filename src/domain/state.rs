// Snapshot types copied out of the live world for broadcasting and persistence.

use crate::domain::enemy::{Enemy, EnemyAction};
use crate::domain::player::{Direction, Player, PlayerAction};

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub level: u32,
    pub exp: u32,
    pub health: i32,
    pub direction: Direction,
    pub action: PlayerAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnemySnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub health: i32,
    pub direction: Direction,
    pub action: EnemyAction,
}

/// Everything clients need to render one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
}

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            x: p.position.x,
            y: p.position.y,
            level: p.level,
            exp: p.exp,
            health: p.health,
            direction: p.direction,
            action: p.action,
        }
    }
}

impl From<&Enemy> for EnemySnapshot {
    fn from(e: &Enemy) -> Self {
        Self {
            id: e.id.clone(),
            x: e.position.x,
            y: e.position.y,
            health: e.health,
            direction: e.direction,
            action: e.action,
        }
    }
}
