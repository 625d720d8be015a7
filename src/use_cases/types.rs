// Use-case level inputs/outputs for the game loop.

use tokio::sync::mpsc;

use crate::domain::{EnemySnapshot, PlayerInput, PlayerRecord, PlayerSnapshot, WorldSnapshot};
use crate::use_cases::registry::SessionId;

#[derive(Debug)]
pub enum GameEvent {
    /// A socket opened; `outbox` carries messages meant only for this session.
    Connect {
        session_id: SessionId,
        outbox: mpsc::Sender<DirectEvent>,
    },
    Init {
        session_id: SessionId,
        player_id: String,
    },
    /// Internal: the loader task finished fetching (or creating) a player record.
    PlayerLoaded {
        session_id: SessionId,
        record: PlayerRecord,
    },
    Input {
        session_id: SessionId,
        input: PlayerInput,
    },
    Chat {
        session_id: SessionId,
        text: String,
    },
    Disconnect {
        session_id: SessionId,
    },
}

/// Full state handed to a session right after it is bound to a player.
#[derive(Debug, Clone, PartialEq)]
pub struct InitReply {
    pub player: PlayerSnapshot,
    pub players: Vec<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
}

/// Unicast messages.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectEvent {
    Init(InitReply),
    LevelUp { level: u32 },
}

/// Messages fanned out to every connected session.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldUpdate {
    State(WorldSnapshot),
    PlayerLeft { player_id: String },
    Chat { player_id: String, text: String },
}
