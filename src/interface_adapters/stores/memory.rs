use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::StoreError;
use crate::domain::player::PlayerRecord;
use crate::domain::ports::{PlayerFieldUpdate, PlayerStore};

// In-process player store; records live as long as the server does.
#[derive(Default)]
pub struct InMemoryPlayerStore {
    players: Mutex<HashMap<String, PlayerRecord>>,
}

impl InMemoryPlayerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlayerStore for InMemoryPlayerStore {
    async fn load_player(&self, player_id: &str) -> Result<Option<PlayerRecord>, StoreError> {
        let guard = self.players.lock().await;
        Ok(guard.get(player_id).cloned())
    }

    async fn save_player(&self, record: &PlayerRecord) -> Result<(), StoreError> {
        let mut guard = self.players.lock().await;
        guard.insert(record.player_id.clone(), record.clone());
        Ok(())
    }

    async fn update_player_fields(
        &self,
        player_id: &str,
        fields: PlayerFieldUpdate,
    ) -> Result<(), StoreError> {
        let mut guard = self.players.lock().await;
        // Progress for a player that was never saved has nothing to attach to.
        if let Some(record) = guard.get_mut(player_id) {
            record.level = fields.level;
            record.exp = fields.exp;
        }
        Ok(())
    }
}
