// Wire protocol DTOs and conversions for public game server messages.
//
// Every frame is JSON text shaped as `{"type": <event>, "data": <payload>}`.

use std::collections::BTreeMap;

use crate::domain::{
    Direction, EnemyAction, EnemySnapshot, PlayerAction, PlayerInput, PlayerSnapshot,
    WorldSnapshot,
};
use crate::use_cases::{DirectEvent, InitReply, WorldUpdate};
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    // Full state for a freshly bound session.
    Init(InitDto),
    // Snapshot of the world for a given tick.
    GameState(GameStateDto),
    PlayerLeft(PlayerLeftDto),
    // Only ever sent to the player who leveled.
    LevelUp(LevelUpDto),
    ChatMessage(ChatBroadcastDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    Init(InitPayload),
    PlayerInput(PlayerInputDto),
    ChatMessage(ChatPayload),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub player_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatPayload {
    pub text: String,
}

/// Input payload; absent fields leave the server-side buffer untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerInputDto {
    #[serde(default)]
    pub left: Option<bool>,
    #[serde(default)]
    pub right: Option<bool>,
    #[serde(default)]
    pub up: Option<bool>,
    #[serde(default)]
    pub down: Option<bool>,
    #[serde(default)]
    pub direction: Option<DirectionDto>,
    #[serde(default)]
    pub action: Option<PlayerActionDto>,
    // Older clients flag attacks separately from `action`.
    #[serde(default)]
    pub attack: Option<bool>,
}

impl From<PlayerInputDto> for PlayerInput {
    fn from(input: PlayerInputDto) -> Self {
        let action = if input.attack == Some(true) {
            Some(PlayerAction::Attack)
        } else {
            input.action.map(PlayerAction::from)
        };
        Self {
            left: input.left,
            right: input.right,
            up: input.up,
            down: input.down,
            direction: input.direction.map(Direction::from),
            action,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DirectionDto {
    Up,
    Down,
    Left,
    Right,
}

impl From<Direction> for DirectionDto {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => DirectionDto::Up,
            Direction::Down => DirectionDto::Down,
            Direction::Left => DirectionDto::Left,
            Direction::Right => DirectionDto::Right,
        }
    }
}

impl From<DirectionDto> for Direction {
    fn from(direction: DirectionDto) -> Self {
        match direction {
            DirectionDto::Up => Direction::Up,
            DirectionDto::Down => Direction::Down,
            DirectionDto::Left => Direction::Left,
            DirectionDto::Right => Direction::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlayerActionDto {
    Idle,
    Walk,
    Attack,
    Die,
}

impl From<PlayerAction> for PlayerActionDto {
    fn from(action: PlayerAction) -> Self {
        match action {
            PlayerAction::Idle => PlayerActionDto::Idle,
            PlayerAction::Walk => PlayerActionDto::Walk,
            PlayerAction::Attack => PlayerActionDto::Attack,
            PlayerAction::Die => PlayerActionDto::Die,
        }
    }
}

impl From<PlayerActionDto> for PlayerAction {
    fn from(action: PlayerActionDto) -> Self {
        match action {
            PlayerActionDto::Idle => PlayerAction::Idle,
            PlayerActionDto::Walk => PlayerAction::Walk,
            PlayerActionDto::Attack => PlayerAction::Attack,
            PlayerActionDto::Die => PlayerAction::Die,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EnemyActionDto {
    Idle,
    Chase,
    Hop,
    LongJump,
    Confused,
    Die,
}

impl From<EnemyAction> for EnemyActionDto {
    fn from(action: EnemyAction) -> Self {
        match action {
            EnemyAction::Idle => EnemyActionDto::Idle,
            EnemyAction::Chase => EnemyActionDto::Chase,
            EnemyAction::Hop => EnemyActionDto::Hop,
            EnemyAction::LongJump => EnemyActionDto::LongJump,
            EnemyAction::Confused => EnemyActionDto::Confused,
            EnemyAction::Die => EnemyActionDto::Die,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PositionDto {
    pub x: f32,
    pub y: f32,
}

/// Public player state; keyed by player id in every map below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateDto {
    pub player_id: String,
    pub position: PositionDto,
    pub level: u32,
    pub exp: u32,
    pub health: i32,
    pub direction: DirectionDto,
    pub action: PlayerActionDto,
}

impl From<&PlayerSnapshot> for PlayerStateDto {
    fn from(player: &PlayerSnapshot) -> Self {
        Self {
            player_id: player.id.clone(),
            position: PositionDto {
                x: player.x,
                y: player.y,
            },
            level: player.level,
            exp: player.exp,
            health: player.health,
            direction: player.direction.into(),
            action: player.action.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnemyStateDto {
    pub id: String,
    pub position: PositionDto,
    pub health: i32,
    pub direction: DirectionDto,
    pub action: EnemyActionDto,
}

impl From<&EnemySnapshot> for EnemyStateDto {
    fn from(enemy: &EnemySnapshot) -> Self {
        Self {
            id: enemy.id.clone(),
            position: PositionDto {
                x: enemy.x,
                y: enemy.y,
            },
            health: enemy.health,
            direction: enemy.direction.into(),
            action: enemy.action.into(),
        }
    }
}

fn players_by_id(players: &[PlayerSnapshot]) -> BTreeMap<String, PlayerStateDto> {
    players
        .iter()
        .map(|p| (p.id.clone(), PlayerStateDto::from(p)))
        .collect()
}

fn enemies_by_id(enemies: &[EnemySnapshot]) -> BTreeMap<String, EnemyStateDto> {
    enemies
        .iter()
        .map(|e| (e.id.clone(), EnemyStateDto::from(e)))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameStateDto {
    pub tick: u64,
    pub players: BTreeMap<String, PlayerStateDto>,
    pub enemies: BTreeMap<String, EnemyStateDto>,
}

impl From<&WorldSnapshot> for GameStateDto {
    fn from(snapshot: &WorldSnapshot) -> Self {
        Self {
            tick: snapshot.tick,
            players: players_by_id(&snapshot.players),
            enemies: enemies_by_id(&snapshot.enemies),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitDto {
    pub player_data: PlayerStateDto,
    pub players: BTreeMap<String, PlayerStateDto>,
    pub enemies: BTreeMap<String, EnemyStateDto>,
}

impl From<&InitReply> for InitDto {
    fn from(reply: &InitReply) -> Self {
        Self {
            player_data: PlayerStateDto::from(&reply.player),
            players: players_by_id(&reply.players),
            enemies: enemies_by_id(&reply.enemies),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftDto {
    pub player_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelUpDto {
    pub level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatBroadcastDto {
    /// Sender's player id.
    pub id: String,
    pub message: String,
}

impl From<&WorldUpdate> for ServerMessage {
    fn from(update: &WorldUpdate) -> Self {
        match update {
            WorldUpdate::State(snapshot) => ServerMessage::GameState(snapshot.into()),
            WorldUpdate::PlayerLeft { player_id } => ServerMessage::PlayerLeft(PlayerLeftDto {
                player_id: player_id.clone(),
            }),
            WorldUpdate::Chat { player_id, text } => {
                ServerMessage::ChatMessage(ChatBroadcastDto {
                    id: player_id.clone(),
                    message: text.clone(),
                })
            }
        }
    }
}

impl From<&DirectEvent> for ServerMessage {
    fn from(event: &DirectEvent) -> Self {
        match event {
            DirectEvent::Init(reply) => ServerMessage::Init(reply.into()),
            DirectEvent::LevelUp { level } => ServerMessage::LevelUp(LevelUpDto { level: *level }),
        }
    }
}
