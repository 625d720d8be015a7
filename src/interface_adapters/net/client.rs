use crate::interface_adapters::protocol::{ClientMessage, ServerMessage};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::ids::next_session_id;
use crate::use_cases::{DirectEvent, GameEvent, SessionId, WorldUpdate};

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    // The world task is gone; nothing more can be delivered either way.
    InputClosed,
    WorldUpdatesClosed,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const MAX_PLAYER_ID_LEN: usize = 64;

/// Turns every world broadcast into one shared JSON text frame.
///
/// Only `gameState` frames are kept in `world_latest_tx`: a lagging socket resyncs from the
/// newest snapshot, while missed chat or leave notices are simply gone.
pub async fn world_update_serializer(
    mut world_rx: broadcast::Receiver<WorldUpdate>,
    world_bytes_tx: broadcast::Sender<Utf8Bytes>,
    world_latest_tx: watch::Sender<Utf8Bytes>,
) {
    loop {
        let update = match world_rx.recv().await {
            Ok(update) => update,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "state broadcaster lagged behind the world");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("world broadcasts ended; serializer exiting");
                break;
            }
        };

        let frame = match serde_json::to_string(&ServerMessage::from(&update)) {
            Ok(text) => Utf8Bytes::from(text),
            Err(e) => {
                error!(error = ?e, "failed to serialize world update");
                continue;
            }
        };

        if matches!(update, WorldUpdate::State(_)) {
            world_latest_tx.send_replace(frame.clone());
        }
        // No subscribers just means no sockets are open.
        let _ = world_bytes_tx.send(frame);
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let session_id = next_session_id();
        let span = info_span!("conn", session_id, player_id = tracing::field::Empty);
        handle_socket(socket, state, session_id).instrument(span)
    })
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, session_id: SessionId) {
    // Subscribe before registering so the first broadcast after binding is not missed.
    let world_bytes_rx = state.world_bytes_tx.subscribe();
    let world_latest_rx = state.world_latest_tx.subscribe();
    let (outbox, outbox_rx) = mpsc::channel(state.session_outbox_capacity);

    if state
        .input_tx
        .send(GameEvent::Connect { session_id, outbox })
        .await
        .is_err()
    {
        error!("world task unavailable; refusing connection");
        let frame = CloseFrame {
            code: close_code::AGAIN,
            reason: "server unavailable".into(),
        };
        let _ = socket.send(Message::Close(Some(frame))).await;
        return;
    }
    info!("client connected");

    let mut session = Session::new(
        session_id,
        state.input_tx.clone(),
        world_bytes_rx,
        world_latest_rx,
        outbox_rx,
    );
    if let Err(e) = session.run(&mut socket).await {
        warn!(error = ?e, "session ended with error");
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

// Per-connection traffic counters, logged once when the socket closes.
#[derive(Debug, Default)]
struct TrafficStats {
    frames_in: u64,
    frames_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
    resyncs: u64,
}

// One slot per kind of noisy warning.
struct Throttle {
    input_full: Instant,
    world_lag: Instant,
    invalid_input: Instant,
}

impl Throttle {
    fn new() -> Self {
        let ready = Instant::now() - LOG_THROTTLE;
        Self {
            input_full: ready,
            world_lag: ready,
            invalid_input: ready,
        }
    }
}

struct Session {
    id: SessionId,
    // Set once the world confirms the binding with an init reply.
    player_id: Option<String>,
    input_tx: mpsc::Sender<GameEvent>,
    world_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    world_latest_rx: watch::Receiver<Utf8Bytes>,
    outbox_rx: mpsc::Receiver<DirectEvent>,
    stats: TrafficStats,
    throttle: Throttle,
    close_frame: Option<CloseFrame>,
}

impl Session {
    fn new(
        id: SessionId,
        input_tx: mpsc::Sender<GameEvent>,
        world_bytes_rx: broadcast::Receiver<Utf8Bytes>,
        world_latest_rx: watch::Receiver<Utf8Bytes>,
        outbox_rx: mpsc::Receiver<DirectEvent>,
    ) -> Self {
        Self {
            id,
            player_id: None,
            input_tx,
            world_bytes_rx,
            world_latest_rx,
            outbox_rx,
            stats: TrafficStats::default(),
            throttle: Throttle::new(),
            close_frame: None,
        }
    }

    async fn run(&mut self, socket: &mut WebSocket) -> Result<(), NetError> {
        let outcome = loop {
            // Branch futures are dropped before a handler runs, so handlers may use `self`.
            let step = tokio::select! {
                incoming = socket.recv() => self.on_client_frame(incoming).await,
                direct = self.outbox_rx.recv() => self.on_direct(socket, direct).await,
                world = self.world_bytes_rx.recv() => self.on_world_frame(socket, world).await,
            };
            match step {
                Ok(LoopControl::Continue) => continue,
                Ok(LoopControl::Disconnect) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        if let Some(frame) = self.close_frame.take() {
            let _ = socket.send(Message::Close(Some(frame))).await;
        }
        if let Err(e) = socket.close().await {
            debug!(error = %e, "socket close error");
        }

        // The world owns the registry; it unbinds and persists the player on this event.
        let left = self
            .input_tx
            .send(GameEvent::Disconnect {
                session_id: self.id,
            })
            .await;

        debug!(stats = ?self.stats, "connection stats");
        info!(
            player_id = self.player_id.as_deref().unwrap_or(""),
            "client disconnected"
        );

        match (outcome, left) {
            (Err(e), _) => Err(e),
            (Ok(()), Err(_)) => Err(NetError::InputClosed),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    async fn on_client_frame(
        &mut self,
        incoming: Option<Result<Message, axum::Error>>,
    ) -> Result<LoopControl, NetError> {
        let msg = match incoming {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                warn!(error = %e, "websocket recv error");
                return Ok(LoopControl::Disconnect);
            }
            None => return Ok(LoopControl::Disconnect),
        };

        match msg {
            Message::Text(text) => {
                self.stats.frames_in += 1;
                self.stats.bytes_in += text.len() as u64;
                self.on_client_text(&text).await
            }
            Message::Binary(_) => {
                self.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        }
    }

    async fn on_client_text(&mut self, text: &str) -> Result<LoopControl, NetError> {
        let event = match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Init(payload)) => {
                let Some(player_id) = valid_player_id(&payload.player_id) else {
                    if should_log(&mut self.throttle.invalid_input) {
                        warn!("init with empty or oversized player id ignored");
                    }
                    return Ok(LoopControl::Continue);
                };
                // Init is rare and must not be lost, so wait for room in the channel.
                self.input_tx
                    .send(GameEvent::Init {
                        session_id: self.id,
                        player_id,
                    })
                    .await
                    .map_err(|_| NetError::InputClosed)?;
                return Ok(LoopControl::Continue);
            }
            Ok(ClientMessage::PlayerInput(input)) => GameEvent::Input {
                session_id: self.id,
                input: input.into(),
            },
            Ok(ClientMessage::ChatMessage(chat)) => GameEvent::Chat {
                session_id: self.id,
                text: chat.text,
            },
            Err(e) => return Ok(self.on_invalid_json(text.len(), &e)),
        };
        try_forward(&self.input_tx, event, &mut self.throttle.input_full)
    }

    fn on_invalid_json(&mut self, len: usize, err: &serde_json::Error) -> LoopControl {
        self.stats.invalid_json += 1;
        if should_log(&mut self.throttle.invalid_input) {
            warn!(bytes = len, error = %err, "failed to parse client message");
        }
        if self.stats.invalid_json > MAX_INVALID_JSON {
            self.close_frame = Some(CloseFrame {
                code: close_code::POLICY,
                reason: "too many invalid messages".into(),
            });
            return LoopControl::Disconnect;
        }
        LoopControl::Continue
    }

    // Unicasts from the world task: the init reply and level ups.
    async fn on_direct(
        &mut self,
        socket: &mut WebSocket,
        direct: Option<DirectEvent>,
    ) -> Result<LoopControl, NetError> {
        let Some(event) = direct else {
            return Err(NetError::InputClosed);
        };
        if let DirectEvent::Init(reply) = &event {
            Span::current().record("player_id", reply.player.id.as_str());
            self.player_id = Some(reply.player.id.clone());
        }

        let text = serde_json::to_string(&ServerMessage::from(&event))
            .map_err(NetError::Serialization)?;
        Ok(self.push(socket, Utf8Bytes::from(text)).await)
    }

    async fn on_world_frame(
        &mut self,
        socket: &mut WebSocket,
        world: Result<Utf8Bytes, broadcast::error::RecvError>,
    ) -> Result<LoopControl, NetError> {
        match world {
            Ok(frame) => Ok(self.push(socket, frame).await),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                if should_log(&mut self.throttle.world_lag) {
                    warn!(missed = n, "socket fell behind; resending latest game state");
                }
                let latest = self.world_latest_rx.borrow().clone();
                if latest.is_empty() {
                    return Ok(LoopControl::Continue);
                }
                self.stats.resyncs += 1;
                Ok(self.push(socket, latest).await)
            }
            Err(broadcast::error::RecvError::Closed) => Err(NetError::WorldUpdatesClosed),
        }
    }

    async fn push(&mut self, socket: &mut WebSocket, frame: Utf8Bytes) -> LoopControl {
        let len = frame.len() as u64;
        match socket.send(Message::Text(frame)).await.map_err(NetError::Ws) {
            Ok(()) => {
                self.stats.frames_out += 1;
                self.stats.bytes_out += len;
                LoopControl::Continue
            }
            Err(e) => {
                warn!(error = ?e, "failed to send frame");
                LoopControl::Disconnect
            }
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() < LOG_THROTTLE {
        return false;
    }
    *last = Instant::now();
    true
}

fn valid_player_id(raw: &str) -> Option<String> {
    let id = raw.trim();
    if id.is_empty() || id.chars().count() > MAX_PLAYER_ID_LEN {
        return None;
    }
    Some(id.to_string())
}

// Best-effort enqueue for high-rate events; a full channel drops the event.
fn try_forward(
    input_tx: &mpsc::Sender<GameEvent>,
    event: GameEvent,
    last_full_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    match input_tx.try_send(event) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(TrySendError::Full(_)) => {
            if should_log(last_full_log) {
                warn!("input channel full; dropping event");
            }
            Ok(LoopControl::Continue)
        }
        Err(TrySendError::Closed(_)) => Err(NetError::InputClosed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PlayerAction, WorldSnapshot};

    fn session(input_tx: mpsc::Sender<GameEvent>) -> Session {
        let (_bytes_tx, bytes_rx) = broadcast::channel(4);
        let (_latest_tx, latest_rx) = watch::channel(Utf8Bytes::from(""));
        let (_outbox_tx, outbox_rx) = mpsc::channel(4);
        Session::new(7, input_tx, bytes_rx, latest_rx, outbox_rx)
    }

    #[test]
    fn when_player_id_is_padded_then_it_is_trimmed() {
        assert_eq!(valid_player_id("  p1 ").as_deref(), Some("p1"));
    }

    #[test]
    fn when_player_id_is_blank_or_oversized_then_it_is_rejected() {
        assert_eq!(valid_player_id("   "), None);
        assert_eq!(valid_player_id(&"x".repeat(MAX_PLAYER_ID_LEN + 1)), None);
    }

    #[test]
    fn when_log_was_recent_then_it_is_throttled() {
        let mut last = Instant::now() - LOG_THROTTLE;
        assert!(should_log(&mut last));
        assert!(!should_log(&mut last));
    }

    #[tokio::test]
    async fn when_input_channel_is_full_then_event_is_dropped_without_error() {
        let (tx, _rx) = mpsc::channel(1);
        let mut last = Instant::now() - LOG_THROTTLE;
        let event = || GameEvent::Disconnect { session_id: 1 };

        assert!(matches!(
            try_forward(&tx, event(), &mut last),
            Ok(LoopControl::Continue)
        ));
        assert!(matches!(
            try_forward(&tx, event(), &mut last),
            Ok(LoopControl::Continue)
        ));
    }

    #[tokio::test]
    async fn when_world_task_is_gone_then_forwarding_fails() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut last = Instant::now();

        assert!(matches!(
            try_forward(&tx, GameEvent::Disconnect { session_id: 1 }, &mut last),
            Err(NetError::InputClosed)
        ));
    }

    #[tokio::test]
    async fn when_client_sends_attack_flag_then_world_gets_attack_input() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut session = session(tx);

        let control = session
            .on_client_text(r#"{"type":"playerInput","data":{"attack":true}}"#)
            .await
            .unwrap();

        assert!(matches!(control, LoopControl::Continue));
        match rx.recv().await {
            Some(GameEvent::Input { session_id, input }) => {
                assert_eq!(session_id, 7);
                assert_eq!(input.action, Some(PlayerAction::Attack));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn when_init_is_sent_then_trimmed_player_id_reaches_world() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut session = session(tx);

        session
            .on_client_text(r#"{"type":"init","data":{"playerId":"  hero "}}"#)
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(GameEvent::Init { session_id: 7, ref player_id }) if player_id == "hero"
        ));
    }

    #[tokio::test]
    async fn when_garbage_keeps_arriving_then_session_closes_with_policy_code() {
        let (tx, _rx) = mpsc::channel(4);
        let mut session = session(tx);

        for _ in 0..MAX_INVALID_JSON {
            let control = session.on_client_text("not json").await.unwrap();
            assert!(matches!(control, LoopControl::Continue));
        }
        let control = session.on_client_text("{}").await.unwrap();

        assert!(matches!(control, LoopControl::Disconnect));
        assert_eq!(
            session.close_frame.as_ref().map(|f| f.code),
            Some(close_code::POLICY)
        );
    }

    #[tokio::test]
    async fn when_serializer_sees_state_then_latest_frame_is_retained() {
        let (world_tx, world_rx) = broadcast::channel(4);
        let (bytes_tx, mut bytes_rx) = broadcast::channel(4);
        let (latest_tx, latest_rx) = watch::channel(Utf8Bytes::from(""));
        let serializer = tokio::spawn(world_update_serializer(world_rx, bytes_tx, latest_tx));

        world_tx
            .send(WorldUpdate::State(WorldSnapshot {
                tick: 3,
                ..WorldSnapshot::default()
            }))
            .unwrap();
        world_tx
            .send(WorldUpdate::PlayerLeft {
                player_id: "p1".to_string(),
            })
            .unwrap();
        drop(world_tx);
        serializer.await.unwrap();

        let state = bytes_rx.recv().await.unwrap();
        let left = bytes_rx.recv().await.unwrap();
        assert!(state.as_str().contains(r#""type":"gameState""#));
        assert!(left.as_str().contains(r#""type":"playerLeft""#));
        assert_eq!(latest_rx.borrow().as_str(), state.as_str());
    }
}
