use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::errors::StoreError;
use crate::domain::player::PlayerRecord;
use crate::domain::ports::{PlayerFieldUpdate, PlayerStore};

pub(crate) type PlayerTable = Arc<Mutex<HashMap<String, PlayerRecord>>>;

#[derive(Clone, Copy, Default)]
pub(crate) struct FailureFlags {
    pub load: bool,
    /// Number of leading write calls (save or update) that fail before writes succeed.
    pub failing_writes: usize,
}

#[derive(Clone)]
pub(crate) struct RecordingStore {
    players: PlayerTable,
    failures: FailureFlags,
    write_attempts: Arc<AtomicUsize>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self {
            players: Arc::new(Mutex::new(HashMap::new())),
            failures: FailureFlags::default(),
            write_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_failures(mut self, failures: FailureFlags) -> Self {
        self.failures = failures;
        self
    }

    pub(crate) fn insert_test_player(&self, record: PlayerRecord) {
        let mut guard = self.players.lock().expect("players mutex poisoned");
        guard.insert(record.player_id.clone(), record);
    }

    pub(crate) fn get_test_player(&self, player_id: &str) -> Option<PlayerRecord> {
        let guard = self.players.lock().expect("players mutex poisoned");
        guard.get(player_id).cloned()
    }

    pub(crate) fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    fn begin_write(&self) -> Result<(), StoreError> {
        let attempt = self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures.failing_writes {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl PlayerStore for RecordingStore {
    async fn load_player(&self, player_id: &str) -> Result<Option<PlayerRecord>, StoreError> {
        if self.failures.load {
            return Err(StoreError::Backend("load failed".to_string()));
        }

        let guard = self.players.lock().expect("players mutex poisoned");
        Ok(guard.get(player_id).cloned())
    }

    async fn save_player(&self, record: &PlayerRecord) -> Result<(), StoreError> {
        self.begin_write()?;

        let mut guard = self.players.lock().expect("players mutex poisoned");
        guard.insert(record.player_id.clone(), record.clone());
        Ok(())
    }

    async fn update_player_fields(
        &self,
        player_id: &str,
        fields: PlayerFieldUpdate,
    ) -> Result<(), StoreError> {
        self.begin_write()?;

        let mut guard = self.players.lock().expect("players mutex poisoned");
        if let Some(record) = guard.get_mut(player_id) {
            record.level = fields.level;
            record.exp = fields.exp;
        }
        Ok(())
    }
}
