//! Per-session usage counting with TTL-based expiry
//!
//! Tracks how many times each session has invoked the open-page tool inside a
//! rolling window. Entries expire lazily: an entry older than the TTL is
//! replaced wholesale on its next access, and nothing sweeps untouched entries
//! in the background. The caller compares the returned count against its
//! configured limit to admit or reject a call.

use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    count: u64,
    first_seen: Instant,
}

/// Shared counter of tool calls per session id
///
/// Cheap to share behind an `Arc`; the per-key read-modify-write is atomic
/// because the `DashMap` entry guard holds the shard lock for the duration of
/// the update, so concurrent increments for the same session never lose an
/// update.
#[derive(Debug)]
pub struct SessionCounter {
    ttl: Duration,
    entries: DashMap<String, SessionEntry>,
}

impl SessionCounter {
    /// Creates a counter whose windows last `ttl` from each session's first call
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Records a call for `session_id` and returns the post-increment count.
    ///
    /// A missing or expired entry is replaced with a fresh one, so the first
    /// call of a new window always returns 1. Never fails.
    pub fn increment_and_get(&self, session_id: &str) -> u64 {
        self.increment_at(session_id, Instant::now())
    }

    /// Returns the current count without mutating storage; 0 for absent or
    /// expired sessions.
    pub fn get(&self, session_id: &str) -> u64 {
        self.get_at(session_id, Instant::now())
    }

    fn increment_at(&self, session_id: &str, now: Instant) -> u64 {
        let mut entry = self
            .entries
            .entry(session_id.to_string())
            .or_insert(SessionEntry {
                count: 0,
                first_seen: now,
            });
        if now.duration_since(entry.first_seen) > self.ttl {
            *entry = SessionEntry {
                count: 0,
                first_seen: now,
            };
        }
        entry.count += 1;
        entry.count
    }

    fn get_at(&self, session_id: &str, now: Instant) -> u64 {
        match self.entries.get(session_id) {
            Some(entry) if now.duration_since(entry.first_seen) <= self.ttl => entry.count,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(3600);

    #[test]
    fn test_counts_are_sequential_within_window() {
        let counter = SessionCounter::new(TTL);
        let start = Instant::now();

        for expected in 1..=20 {
            assert_eq!(counter.increment_at("s1", start), expected);
        }
        // Still inside the window near its end
        let late = start + TTL - Duration::from_secs(1);
        assert_eq!(counter.increment_at("s1", late), 21);
    }

    #[test]
    fn test_expiry_resets_to_one() {
        let counter = SessionCounter::new(TTL);
        let start = Instant::now();

        assert_eq!(counter.increment_at("s1", start), 1);
        assert_eq!(counter.increment_at("s1", start), 2);

        let after_ttl = start + TTL + Duration::from_millis(1);
        assert_eq!(counter.increment_at("s1", after_ttl), 1);
        // The replacement entry starts a new window anchored at the reset call
        assert_eq!(counter.increment_at("s1", after_ttl), 2);
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        // Age exactly equal to the TTL is still inside the window
        let counter = SessionCounter::new(TTL);
        let start = Instant::now();

        assert_eq!(counter.increment_at("s1", start), 1);
        assert_eq!(counter.increment_at("s1", start + TTL), 2);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let counter = SessionCounter::new(TTL);
        let start = Instant::now();

        assert_eq!(counter.increment_at("s1", start), 1);
        assert_eq!(counter.increment_at("s2", start), 1);
        assert_eq!(counter.increment_at("s1", start), 2);
        assert_eq!(counter.get_at("s2", start), 1);
    }

    #[test]
    fn test_get_does_not_mutate() {
        let counter = SessionCounter::new(TTL);
        let start = Instant::now();

        assert_eq!(counter.get_at("s1", start), 0);
        counter.increment_at("s1", start);
        assert_eq!(counter.get_at("s1", start), 1);
        assert_eq!(counter.get_at("s1", start), 1);

        // Expired entries read as absent even though storage is untouched
        let after_ttl = start + TTL + Duration::from_millis(1);
        assert_eq!(counter.get_at("s1", after_ttl), 0);
        // A later increment inside a fresh window starts over
        assert_eq!(counter.increment_at("s1", after_ttl), 1);
    }

    #[test]
    fn test_concurrent_increments_lose_no_updates() {
        let counter = Arc::new(SessionCounter::new(TTL));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    counter.increment_and_get("shared");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.get("shared"), 8000);
    }
}
