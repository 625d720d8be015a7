// Use cases layer: application workflows for the game server.

pub mod director;
pub mod game;
pub mod persistence;
pub mod registry;
pub mod types;
pub mod world;

#[cfg(test)]
pub(crate) mod test_support;

pub use director::EnemyDirector;
pub use game::{TickScheduler, tick_interval, world_task};
pub use persistence::PlayerPersistence;
pub use registry::{ConnectionRegistry, SessionId};
pub use types::{DirectEvent, GameEvent, InitReply, WorldUpdate};
pub use world::{TickReport, World};
