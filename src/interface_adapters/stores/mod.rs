// Player storage adapters implementing the `PlayerStore` port.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryPlayerStore;
pub use postgres::PostgresPlayerStore;
