// Domain-level errors for map loading, simulation and persistence.

use std::fmt;
use std::path::PathBuf;

/// The map resource could not be read or does not match the layered-grid schema.
#[derive(Debug)]
pub enum MapFormatError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for MapFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapFormatError::Io { path, source } => {
                write!(f, "failed to read map {}: {source}", path.display())
            }
            MapFormatError::Json(err) => write!(f, "map is not valid tiled json: {err}"),
            MapFormatError::Invalid(reason) => write!(f, "invalid map: {reason}"),
        }
    }
}

impl std::error::Error for MapFormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapFormatError::Io { source, .. } => Some(source),
            MapFormatError::Json(err) => Some(err),
            MapFormatError::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for MapFormatError {
    fn from(err: serde_json::Error) -> Self {
        MapFormatError::Json(err)
    }
}

// Recoverable faults raised while running the world. None of these abort a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    UnknownPlayerInput { session_id: u64 },
    PersistenceWriteFailure { player_id: String, reason: String },
    TargetVanished { enemy_id: String, player_id: String },
    EntityFault { entity_id: String, reason: &'static str },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::UnknownPlayerInput { session_id } => {
                write!(f, "input from session {session_id} has no player identity")
            }
            SimError::PersistenceWriteFailure { player_id, reason } => {
                write!(f, "failed to persist player {player_id}: {reason}")
            }
            SimError::TargetVanished {
                enemy_id,
                player_id,
            } => write!(f, "enemy {enemy_id} lost target {player_id}"),
            SimError::EntityFault { entity_id, reason } => {
                write!(f, "entity {entity_id} update discarded: {reason}")
            }
        }
    }
}

impl std::error::Error for SimError {}

/// Failures reported by player storage adapters.
#[derive(Debug)]
pub enum StoreError {
    Backend(String),
    Unavailable,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(message) => write!(f, "store backend error: {message}"),
            StoreError::Unavailable => write!(f, "store unavailable"),
        }
    }
}

impl std::error::Error for StoreError {}
