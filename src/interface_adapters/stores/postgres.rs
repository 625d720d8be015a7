use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::domain::errors::StoreError;
use crate::domain::geometry::Vec2;
use crate::domain::player::{Direction, PlayerAction, PlayerRecord};
use crate::domain::ports::{PlayerFieldUpdate, PlayerStore};

// PostgreSQL-backed player store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PostgresPlayerStore {
    pool: PgPool,
}

impl PostgresPlayerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    match err {
        // Connection-level failures are worth retrying; everything else is a real fault.
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable
        }
        other => StoreError::Backend(other.to_string()),
    }
}

fn direction_name(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "up",
        Direction::Down => "down",
        Direction::Left => "left",
        Direction::Right => "right",
    }
}

fn parse_direction(value: &str) -> Direction {
    match value {
        "up" => Direction::Up,
        "down" => Direction::Down,
        "left" => Direction::Left,
        _ => Direction::Right,
    }
}

fn action_name(action: PlayerAction) -> &'static str {
    match action {
        PlayerAction::Idle => "idle",
        PlayerAction::Walk => "walk",
        PlayerAction::Attack => "attack",
        PlayerAction::Die => "die",
    }
}

fn parse_action(value: &str) -> PlayerAction {
    match value {
        "walk" => PlayerAction::Walk,
        "attack" => PlayerAction::Attack,
        "die" => PlayerAction::Die,
        _ => PlayerAction::Idle,
    }
}

fn to_column(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Backend(format!("{value} overflows INTEGER")))
}

fn from_column(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Backend(format!("negative {column}: {value}")))
}

fn record_from_row(row: &PgRow) -> Result<PlayerRecord, StoreError> {
    let direction: String = row.try_get("direction").map_err(backend)?;
    let action: String = row.try_get("action").map_err(backend)?;
    Ok(PlayerRecord {
        player_id: row.try_get("player_id").map_err(backend)?,
        position: Vec2::new(
            row.try_get("x").map_err(backend)?,
            row.try_get("y").map_err(backend)?,
        ),
        level: from_column(row.try_get("level").map_err(backend)?, "level")?,
        exp: from_column(row.try_get("exp").map_err(backend)?, "exp")?,
        health: row.try_get("health").map_err(backend)?,
        direction: parse_direction(&direction),
        action: parse_action(&action),
    })
}

#[async_trait]
impl PlayerStore for PostgresPlayerStore {
    async fn load_player(&self, player_id: &str) -> Result<Option<PlayerRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT player_id, x, y, level, exp, health, direction, action \
             FROM players WHERE player_id = $1",
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn save_player(&self, record: &PlayerRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO players (player_id, x, y, level, exp, health, direction, action) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (player_id) DO UPDATE SET \
             x = EXCLUDED.x, y = EXCLUDED.y, level = EXCLUDED.level, exp = EXCLUDED.exp, \
             health = EXCLUDED.health, direction = EXCLUDED.direction, \
             action = EXCLUDED.action, updated_at = now()",
        )
        .bind(&record.player_id)
        .bind(record.position.x)
        .bind(record.position.y)
        .bind(to_column(record.level)?)
        .bind(to_column(record.exp)?)
        .bind(record.health)
        .bind(direction_name(record.direction))
        .bind(action_name(record.action))
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn update_player_fields(
        &self,
        player_id: &str,
        fields: PlayerFieldUpdate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE players SET level = $2, exp = $3, updated_at = now() WHERE player_id = $1",
        )
        .bind(player_id)
        .bind(to_column(fields.level)?)
        .bind(to_column(fields.exp)?)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}
