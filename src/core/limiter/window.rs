//! In-process fixed-window counters
//!
//! Fallback admission path used when the Redis counter store is in no-op
//! mode. Windows are keyed by gate + principal and expire lazily.

use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u64,
}

/// Fixed-window counter table
#[derive(Debug, Default)]
pub struct WindowTable {
    windows: DashMap<String, Window>,
}

impl WindowTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `amount` units against `limit` within a fixed window
    ///
    /// Returns `(admitted, retry_after_secs)`.
    pub fn check(&self, key: &str, amount: u64, limit: u64, window: Duration) -> (bool, u64) {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count + amount > limit {
            let elapsed = now.duration_since(entry.started);
            let retry = window.saturating_sub(elapsed).as_secs().max(1);
            return (false, retry);
        }

        entry.count += amount;
        (true, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nth_admitted_nth_plus_one_rejected() {
        let table = WindowTable::new();
        let window = Duration::from_secs(1);
        for _ in 0..5 {
            let (admitted, _) = table.check("key", 1, 5, window);
            assert!(admitted);
        }
        let (admitted, retry) = table.check("key", 1, 5, window);
        assert!(!admitted);
        assert!(retry >= 1);
    }

    #[test]
    fn window_resets_after_elapse() {
        let table = WindowTable::new();
        let window = Duration::from_millis(10);
        assert!(table.check("key", 1, 1, window).0);
        assert!(!table.check("key", 1, 1, window).0);
        std::thread::sleep(Duration::from_millis(15));
        assert!(table.check("key", 1, 1, window).0);
    }

    #[test]
    fn amounts_are_charged_in_bulk() {
        let table = WindowTable::new();
        let window = Duration::from_secs(60);
        assert!(table.check("tokens", 900, 1000, window).0);
        assert!(!table.check("tokens", 200, 1000, window).0);
        assert!(table.check("tokens", 100, 1000, window).0);
    }
}
