use crate::use_cases::GameEvent;
use axum::extract::ws::Utf8Bytes;
use tokio::sync::{broadcast, mpsc, watch};

#[derive(Clone)]
pub struct AppState {
    // Events flowing from the network into the world task.
    pub input_tx: mpsc::Sender<GameEvent>,
    // Serialized broadcasts, shared across all connections.
    pub world_bytes_tx: broadcast::Sender<Utf8Bytes>,
    // Latest serialized game state for lag recovery.
    pub world_latest_tx: watch::Sender<Utf8Bytes>,
    // Capacity of each connection's unicast outbox.
    pub session_outbox_capacity: usize,
}
