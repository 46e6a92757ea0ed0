use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::cache::keys::RateLimitKey;
use crate::cache::models::WindowCounter;
use crate::cache::store::KeyCounterStore;
use crate::error::StoreError;

/// 键数量超过清理水位时顺带清理过期键，清理后水位调整为存活键数的两倍
const PURGE_THRESHOLD: usize = 1024;

struct Entry {
    count: u64,
    expires_at: Instant,
}

struct Entries {
    map: HashMap<String, Entry>,
    purge_at: usize,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            purge_at: PURGE_THRESHOLD,
        }
    }
}

impl Entries {
    fn purge_expired(&mut self, now: Instant) {
        if self.map.len() <= self.purge_at {
            return;
        }
        self.map.retain(|_, entry| entry.expires_at > now);
        self.purge_at = (self.map.len() * 2).max(PURGE_THRESHOLD);
    }
}

/// 进程内计数存储，只用于测试和单进程开发环境。
/// 多副本部署必须使用 Redis，否则各副本的计数互不可见。
#[derive(Default)]
pub struct MemoryCounterStore {
    entries: Mutex<Entries>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }
}

#[async_trait]
impl KeyCounterStore for MemoryCounterStore {
    async fn increment_with_expiry(
        &self,
        key: &RateLimitKey,
        window: Duration,
    ) -> Result<WindowCounter, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        entries.purge_expired(now);

        let entry = entries
            .map
            .entry(key.as_str().to_string())
            .or_insert_with(|| Entry {
                count: 0,
                expires_at: now + window,
            });

        // 窗口到期后整体清零，而不是逐渐衰减
        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + window;
        }
        entry.count += 1;

        Ok(WindowCounter::new(entry.count, entry.expires_at - now))
    }

    async fn delete(&self, key: &RateLimitKey) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .remove(key.as_str());
        Ok(())
    }

    async fn ttl(&self, key: &RateLimitKey) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .map
            .get(key.as_str())
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.expires_at - now))
    }
}
