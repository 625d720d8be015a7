use async_trait::async_trait;

use crate::domain::errors::StoreError;
use crate::domain::player::PlayerRecord;

/// Progression fields written after each kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerFieldUpdate {
    pub level: u32,
    pub exp: u32,
}

// Port for durable player storage used by the session and combat workflows.
#[async_trait]
pub trait PlayerStore: Send + Sync {
    async fn load_player(&self, player_id: &str) -> Result<Option<PlayerRecord>, StoreError>;
    async fn save_player(&self, record: &PlayerRecord) -> Result<(), StoreError>;
    async fn update_player_fields(
        &self,
        player_id: &str,
        fields: PlayerFieldUpdate,
    ) -> Result<(), StoreError>;
}
