use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Submissions allowed per source per window.
pub const MAX_PER_WINDOW: u32 = 5;
/// Fixed window length: one hour.
pub const WINDOW_SECS: i64 = 3600;

const MAX_BUCKET_ENTRIES: usize = 10_000;

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

#[derive(Debug, Clone)]
struct Bucket {
    count: u32,
    reset_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject { retry_after_secs: i64 },
}

/// Per-source fixed-window counter, in-process and process-lifetime only.
///
/// Each server instance keeps its own map, so under horizontal scaling this is
/// a per-instance approximation of a global limit. That looseness is intended:
/// the limiter is an abuse deterrent, not a hard guarantee.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    clock: Clock,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Box::new(|| Utc::now().timestamp()))
    }

    /// Injectable clock so tests can step time deterministically.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub async fn check(&self, source: &str) -> Decision {
        let now = (self.clock)();
        let mut buckets = self.buckets.lock().await;
        if buckets.len() > MAX_BUCKET_ENTRIES {
            buckets.retain(|_, b| b.reset_at > now);
        }
        let bucket = buckets.entry(source.to_string()).or_insert(Bucket {
            count: 0,
            reset_at: 0,
        });
        if bucket.reset_at <= now {
            bucket.count = 0;
            bucket.reset_at = now + WINDOW_SECS;
        }
        if bucket.count >= MAX_PER_WINDOW {
            return Decision::Reject {
                retry_after_secs: bucket.reset_at - now,
            };
        }
        bucket.count += 1;
        Decision::Admit
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
