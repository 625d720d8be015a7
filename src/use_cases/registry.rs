// Session <-> player identity mapping, owned by the world task.

use std::collections::HashMap;

/// Transport session handle assigned when a socket connects.
pub type SessionId = u64;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_session: HashMap<SessionId, String>,
    by_player: HashMap<String, SessionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `session_id` with `player_id`, keeping the mapping 1:1.
    ///
    /// Returns the session that previously held this player, if a different one did.
    pub fn bind(&mut self, session_id: SessionId, player_id: &str) -> Option<SessionId> {
        // A session re-sending init under a new identity drops its old one.
        if let Some(old_player) = self.by_session.remove(&session_id) {
            self.by_player.remove(&old_player);
        }

        let displaced = self
            .by_player
            .insert(player_id.to_string(), session_id)
            .filter(|previous| *previous != session_id);
        if let Some(previous) = displaced {
            self.by_session.remove(&previous);
        }

        self.by_session.insert(session_id, player_id.to_string());
        displaced
    }

    /// Removes both directions of the mapping at once.
    pub fn unbind_session(&mut self, session_id: SessionId) -> Option<String> {
        let player_id = self.by_session.remove(&session_id)?;
        self.by_player.remove(&player_id);
        Some(player_id)
    }

    pub fn player_for(&self, session_id: SessionId) -> Option<&str> {
        self.by_session.get(&session_id).map(String::as_str)
    }

    pub fn session_for(&self, player_id: &str) -> Option<SessionId> {
        self.by_player.get(player_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_session.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_bound_then_lookups_work_in_both_directions() {
        let mut registry = ConnectionRegistry::new();
        assert_eq!(registry.bind(1, "alice"), None);

        assert_eq!(registry.player_for(1), Some("alice"));
        assert_eq!(registry.session_for("alice"), Some(1));
    }

    #[test]
    fn when_session_unbinds_then_both_entries_are_gone() {
        let mut registry = ConnectionRegistry::new();
        registry.bind(1, "alice");

        assert_eq!(registry.unbind_session(1).as_deref(), Some("alice"));
        assert_eq!(registry.player_for(1), None);
        assert_eq!(registry.session_for("alice"), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn when_player_rebinds_from_new_session_then_old_session_is_displaced() {
        let mut registry = ConnectionRegistry::new();
        registry.bind(1, "alice");

        assert_eq!(registry.bind(2, "alice"), Some(1));
        assert_eq!(registry.player_for(1), None);
        assert_eq!(registry.session_for("alice"), Some(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn when_session_switches_identity_then_previous_player_is_released() {
        let mut registry = ConnectionRegistry::new();
        registry.bind(1, "alice");
        registry.bind(1, "bob");

        assert_eq!(registry.session_for("alice"), None);
        assert_eq!(registry.player_for(1), Some("bob"));
    }

    #[test]
    fn when_unknown_session_unbinds_then_nothing_happens() {
        let mut registry = ConnectionRegistry::new();
        registry.bind(1, "alice");
        assert_eq!(registry.unbind_session(9), None);
        assert_eq!(registry.len(), 1);
    }
}
