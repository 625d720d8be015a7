// Player load/save workflows. Everything here runs off the tick on spawned tasks.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::errors::{SimError, StoreError};
use crate::domain::ports::{PlayerFieldUpdate, PlayerStore};
use crate::domain::player::PlayerRecord;
use crate::domain::tuning::PlayerTuning;
use crate::use_cases::registry::SessionId;
use crate::use_cases::types::GameEvent;

pub const WRITE_ATTEMPTS: u32 = 3;
const DEFAULT_WRITE_BACKOFF: Duration = Duration::from_millis(200);

// Tail of the job chain for one player. Each job waits for `done` of the one before it.
struct Lane {
    generation: u64,
    done: oneshot::Receiver<()>,
}

#[derive(Default)]
struct WriteLanes {
    next_generation: u64,
    lanes: HashMap<String, Lane>,
}

#[derive(Clone)]
pub struct PlayerPersistence {
    store: Arc<dyn PlayerStore>,
    defaults: PlayerTuning,
    backoff: Duration,
    lanes: Arc<Mutex<WriteLanes>>,
}

impl PlayerPersistence {
    pub fn new(store: Arc<dyn PlayerStore>, defaults: PlayerTuning) -> Self {
        Self {
            store,
            defaults,
            backoff: DEFAULT_WRITE_BACKOFF,
            lanes: Arc::new(Mutex::new(WriteLanes::default())),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns the stored record, creating and saving a default one for new players.
    ///
    /// A failing store never blocks a join: the player starts from defaults instead.
    pub async fn load_or_create(&self, player_id: &str) -> PlayerRecord {
        match self.store.load_player(player_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                let record = PlayerRecord::new_default(player_id, &self.defaults);
                if let Err(err) = self.save(&record).await {
                    warn!(error = %err, "new player record not saved");
                }
                record
            }
            Err(err) => {
                warn!(player_id, error = %err, "player load failed; starting from defaults");
                PlayerRecord::new_default(player_id, &self.defaults)
            }
        }
    }

    pub async fn save(&self, record: &PlayerRecord) -> Result<(), SimError> {
        with_retry(&record.player_id, self.backoff, || self.store.save_player(record)).await
    }

    pub async fn update_fields(
        &self,
        player_id: &str,
        fields: PlayerFieldUpdate,
    ) -> Result<(), SimError> {
        with_retry(player_id, self.backoff, || {
            self.store.update_player_fields(player_id, fields)
        })
        .await
    }

    /// Loads the player in the background and hands the record back to the world task.
    ///
    /// The load runs after every write already queued for the same player.
    pub fn spawn_load(
        &self,
        session_id: SessionId,
        player_id: String,
        events: mpsc::Sender<GameEvent>,
    ) -> JoinHandle<()> {
        self.enqueue(player_id.clone(), move |persistence| async move {
            let record = persistence.load_or_create(&player_id).await;
            if events
                .send(GameEvent::PlayerLoaded { session_id, record })
                .await
                .is_err()
            {
                debug!(session_id, "world task gone before player load finished");
            }
        })
    }

    pub fn spawn_save(&self, record: PlayerRecord) -> JoinHandle<()> {
        self.enqueue(record.player_id.clone(), move |persistence| async move {
            if let Err(err) = persistence.save(&record).await {
                warn!(error = %err, "player save dropped");
            }
        })
    }

    pub fn spawn_update_fields(&self, player_id: String, fields: PlayerFieldUpdate) -> JoinHandle<()> {
        self.enqueue(player_id.clone(), move |persistence| async move {
            if let Err(err) = persistence.update_fields(&player_id, fields).await {
                warn!(error = %err, "player progress update dropped");
            }
        })
    }

    // Jobs for one player run one at a time in submission order, retries included.
    // Different players never wait on each other.
    fn enqueue<F, Fut>(&self, player_id: String, job: F) -> JoinHandle<()>
    where
        F: FnOnce(PlayerPersistence) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let (generation, previous) = {
            let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
            lanes.next_generation += 1;
            let generation = lanes.next_generation;
            let previous = lanes.lanes.insert(
                player_id.clone(),
                Lane {
                    generation,
                    done: done_rx,
                },
            );
            (generation, previous)
        };

        let persistence = self.clone();
        tokio::spawn(async move {
            if let Some(previous) = previous {
                // A dropped sender means the earlier job ended early; the lane still moves on.
                let _ = previous.done.await;
            }
            job(persistence.clone()).await;

            {
                let mut lanes = persistence
                    .lanes
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if lanes
                    .lanes
                    .get(&player_id)
                    .is_some_and(|lane| lane.generation == generation)
                {
                    lanes.lanes.remove(&player_id);
                }
            }
            let _ = done_tx.send(());
        })
    }

    #[cfg(test)]
    fn pending_lanes(&self) -> usize {
        self.lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lanes
            .len()
    }
}

async fn with_retry<F, Fut>(player_id: &str, backoff: Duration, mut op: F) -> Result<(), SimError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), StoreError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(()) => return Ok(()),
            Err(err) if attempt < WRITE_ATTEMPTS => {
                debug!(player_id, attempt, error = %err, "player write failed; retrying");
                tokio::time::sleep(backoff * attempt).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(SimError::PersistenceWriteFailure {
                    player_id: player_id.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
}
