use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, broadcast, mpsc};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::persistence::PlayerPersistence;
use super::registry::SessionId;
use super::types::{DirectEvent, GameEvent, WorldUpdate};
use super::world::{Admission, World};

/// Fixed-rate tick source.
///
/// A late tick fires once, immediately, and the following one is scheduled a full period
/// after it: overruns lower the effective rate instead of bursting to catch up.
pub struct TickScheduler {
    interval: Interval,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

/// Interval between ticks at `tick_rate` ticks per second.
pub fn tick_interval(tick_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)))
}

pub async fn world_task(
    mut world: World,
    mut input_rx: mpsc::Receiver<GameEvent>,
    input_tx: mpsc::Sender<GameEvent>,
    world_tx: broadcast::Sender<WorldUpdate>,
    persistence: PlayerPersistence,
    tick_interval: Duration,
    shutdown: Arc<Notify>,
) {
    // Unicast outboxes for every open socket, bound or not.
    let mut outboxes: HashMap<SessionId, mpsc::Sender<DirectEvent>> = HashMap::new();

    // Drive the fixed-step game loop at the configured tick rate.
    let mut scheduler = TickScheduler::new(tick_interval);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                break;
            }
            _ = scheduler.tick() => {}
        }
        let started = Instant::now();

        // Inputs that arrived since the last tick are only buffered here; the step consumes them.
        while let Ok(ev) = input_rx.try_recv() {
            handle_event(ev, &mut world, &mut outboxes, &world_tx, &persistence, &input_tx);
        }

        let report = world.step();

        for (session_id, event) in report.direct {
            send_direct(&outboxes, session_id, event);
        }
        for (player_id, fields) in report.progress {
            persistence.spawn_update_fields(player_id, fields);
        }

        // No receivers just means nobody is connected yet.
        let _ = world_tx.send(WorldUpdate::State(report.snapshot));

        let elapsed = started.elapsed();
        let budget = scheduler.period();
        if elapsed > budget {
            warn!(
                tick = world.tick(),
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = budget.as_millis() as u64,
                "tick overran its interval"
            );
        }
    }

    // Persist whoever is still online before the loop goes away.
    let sessions: Vec<SessionId> = outboxes.keys().copied().collect();
    for session_id in sessions {
        // Queued behind any in-flight writes for the same player.
        if let Some(record) = world.disconnect(session_id)
            && let Err(err) = persistence.spawn_save(record).await
        {
            warn!(error = %err, "player save task failed at shutdown");
        }
    }
    info!(tick = world.tick(), "world task stopped");
}

fn handle_event(
    ev: GameEvent,
    world: &mut World,
    outboxes: &mut HashMap<SessionId, mpsc::Sender<DirectEvent>>,
    world_tx: &broadcast::Sender<WorldUpdate>,
    persistence: &PlayerPersistence,
    input_tx: &mpsc::Sender<GameEvent>,
) {
    match ev {
        GameEvent::Connect { session_id, outbox } => {
            outboxes.insert(session_id, outbox);
        }
        GameEvent::Init {
            session_id,
            player_id,
        } => {
            if !outboxes.contains_key(&session_id) {
                debug!(session_id, "init from a session that already closed");
                return;
            }
            if world.is_live(&player_id) {
                // Already in the world: rebind without touching storage.
                let record = world.default_record(&player_id);
                let admission = world.admit(session_id, record);
                finish_admission(session_id, admission, outboxes, world_tx, persistence);
            } else {
                persistence.spawn_load(session_id, player_id, input_tx.clone());
            }
        }
        GameEvent::PlayerLoaded { session_id, record } => {
            if !outboxes.contains_key(&session_id) {
                debug!(session_id, player_id = %record.player_id, "session closed before player load finished");
                return;
            }
            let admission = world.admit(session_id, record);
            finish_admission(session_id, admission, outboxes, world_tx, persistence);
        }
        GameEvent::Input { session_id, input } => {
            if let Err(err) = world.buffer_input(session_id, input) {
                debug!(error = %err, "input dropped");
            }
        }
        GameEvent::Chat { session_id, text } => match world.chat(session_id, &text) {
            Ok(Some(update)) => {
                let _ = world_tx.send(update);
            }
            Ok(None) => {}
            Err(err) => debug!(error = %err, "chat dropped"),
        },
        GameEvent::Disconnect { session_id } => {
            outboxes.remove(&session_id);
            if let Some(record) = world.disconnect(session_id) {
                info!(player_id = %record.player_id, session_id, "player left");
                let _ = world_tx.send(WorldUpdate::PlayerLeft {
                    player_id: record.player_id.clone(),
                });
                persistence.spawn_save(record);
            }
        }
    }
}

fn finish_admission(
    session_id: SessionId,
    admission: Admission,
    outboxes: &HashMap<SessionId, mpsc::Sender<DirectEvent>>,
    world_tx: &broadcast::Sender<WorldUpdate>,
    persistence: &PlayerPersistence,
) {
    if let Some(record) = admission.released {
        let _ = world_tx.send(WorldUpdate::PlayerLeft {
            player_id: record.player_id.clone(),
        });
        persistence.spawn_save(record);
    }
    info!(player_id = %admission.reply.player.id, session_id, "player joined");
    send_direct(outboxes, session_id, DirectEvent::Init(admission.reply));
}

fn send_direct(
    outboxes: &HashMap<SessionId, mpsc::Sender<DirectEvent>>,
    session_id: SessionId,
    event: DirectEvent,
) {
    let Some(outbox) = outboxes.get(&session_id) else {
        return;
    };
    match outbox.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!(session_id, "session outbox full; dropping message"),
        Err(TrySendError::Closed(_)) => debug!(session_id, "session outbox closed"),
    }
}
