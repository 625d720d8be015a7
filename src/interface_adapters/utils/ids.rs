use std::sync::atomic::{AtomicU64, Ordering};

/// Returns a process-unique transport session id. Ids start at 1 and are never reused.
pub fn next_session_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
