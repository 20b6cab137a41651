//! Fixed-window rate limiting over in-process buckets.

use argus_core::{EngineError, Result};
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Requests per minute across all clients.
pub const GLOBAL_LIMIT: u32 = 1_000;

/// Requests per minute per participant (machine id, or source IP when the
/// payload carries none).
pub const PER_PARTICIPANT_LIMIT: u32 = 100;

/// Window length for both limits.
pub const WINDOW: Duration = Duration::from_secs(60);

const GLOBAL_KEY: &str = "global";

/// Buckets older than this are swept opportunistically.
const STALE_AFTER: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy)]
struct Bucket {
    window_start: Instant,
    count: u32,
}

/// Fixed-window counters keyed by client identity.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_window(WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            window,
        }
    }

    /// Count one request against `key`; true while the window cap holds.
    pub fn check(&self, key: &str, limit: u32) -> bool {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(key.to_string()).or_insert(Bucket {
            window_start: now,
            count: 0,
        });
        if now.duration_since(bucket.window_start) >= self.window {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.count += 1;
        bucket.count <= limit
    }

    pub fn check_global(&self) -> Result<()> {
        if self.check(GLOBAL_KEY, GLOBAL_LIMIT) {
            Ok(())
        } else {
            Err(EngineError::RateLimited(
                "global ingest limit exceeded".into(),
            ))
        }
    }

    pub fn check_participant(&self, key: &str) -> Result<()> {
        if self.check(key, PER_PARTICIPANT_LIMIT) {
            self.sweep_stale();
            Ok(())
        } else {
            Err(EngineError::RateLimited(format!(
                "participant limit exceeded for {key}"
            )))
        }
    }

    /// Drop buckets idle for several windows so the map stays bounded by
    /// the active client set.
    fn sweep_stale(&self) {
        if self.buckets.len() < 10_000 {
            return;
        }
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.window_start) < STALE_AFTER);
    }
}
