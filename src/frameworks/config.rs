use std::{env, path::PathBuf};

// Runtime/server constants (not gameplay tuning).

pub const DEFAULT_TICK_RATE: u32 = 20;
const MAX_TICK_RATE: u32 = 240;

pub fn host() -> String {
    env::var("REALM_SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

pub fn http_port() -> u16 {
    env::var("REALM_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000)
}

// Simulation ticks per second. Out-of-range values fall back to the default.
pub fn tick_rate() -> u32 {
    env::var("TICK_RATE")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|rate| (1..=MAX_TICK_RATE).contains(rate))
        .unwrap_or(DEFAULT_TICK_RATE)
}

pub fn map_path() -> PathBuf {
    env::var("MAP_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("assets/maps/world.json"))
}

pub fn max_enemies() -> usize {
    env::var("MAX_ENEMIES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5)
}

// Unset means player records live in memory only.
pub fn database_url() -> Option<String> {
    env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const WORLD_BROADCAST_CAPACITY: usize = 128;
pub const SESSION_OUTBOX_CAPACITY: usize = 32;
