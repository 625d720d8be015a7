// Network adapter for client websocket sessions.

pub mod client;

pub use client::{world_update_serializer, ws_handler};
