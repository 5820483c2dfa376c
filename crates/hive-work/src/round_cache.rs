//! Processed-round cache
//!
//! Remembers which `(task_id, round)` pairs this process already handled.
//! Entries expire after a time window and the set is bounded; it is lost on
//! restart. The store's conditional updates remain the authoritative guard.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RoundCacheConfig {
    pub capacity: usize,
    pub window: Duration,
}

impl Default for RoundCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            window: Duration::from_secs(6 * 60 * 60),
        }
    }
}

type RoundKey = (String, u64);

#[derive(Default)]
struct Entries {
    order: VecDeque<(RoundKey, Instant)>,
    present: HashSet<RoundKey>,
}

impl Entries {
    fn evict(&mut self, now: Instant, window: Duration, capacity: usize) {
        while let Some((key, at)) = self.order.front() {
            let expired = now.saturating_duration_since(*at) >= window;
            if !expired && self.order.len() <= capacity {
                break;
            }
            self.present.remove(key);
            self.order.pop_front();
        }
    }
}

pub struct ProcessedRounds {
    config: RoundCacheConfig,
    entries: Mutex<Entries>,
}

impl ProcessedRounds {
    pub fn new(config: RoundCacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Mark `(task_id, round)` processed. Returns `false` if it already was.
    pub async fn mark(&self, task_id: &str, round: u64) -> bool {
        self.mark_at(task_id, round, Instant::now()).await
    }

    pub async fn contains(&self, task_id: &str, round: u64) -> bool {
        self.contains_at(task_id, round, Instant::now()).await
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn mark_at(&self, task_id: &str, round: u64, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;
        entries.evict(now, self.config.window, self.config.capacity);

        let key = (task_id.to_string(), round);
        if entries.present.contains(&key) {
            debug!(task_id, round, "Round already processed");
            return false;
        }
        entries.present.insert(key.clone());
        entries.order.push_back((key, now));
        entries.evict(now, self.config.window, self.config.capacity);
        true
    }

    async fn contains_at(&self, task_id: &str, round: u64, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;
        entries.evict(now, self.config.window, self.config.capacity);
        entries.present.contains(&(task_id.to_string(), round))
    }
}
