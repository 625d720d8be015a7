// Domain layer: core simulation types and rules.

pub mod enemy;
pub mod errors;
pub mod geometry;
pub mod player;
pub mod ports;
pub mod state;
pub mod systems;
pub mod tilemap;
pub mod tuning;

pub use enemy::{Enemy, EnemyAction, PhaseTicks, TargetCandidate};
pub use errors::{MapFormatError, SimError, StoreError};
pub use geometry::{Bounds, Vec2};
pub use player::{Direction, Player, PlayerAction, PlayerInput, PlayerRecord};
pub use ports::{PlayerFieldUpdate, PlayerStore};
pub use state::{EnemySnapshot, PlayerSnapshot, WorldSnapshot};
pub use tilemap::TileCollisionIndex;
