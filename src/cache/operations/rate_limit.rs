use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Script, aio::ConnectionManager};

use crate::cache::keys::{RateLimitKey, rate_limit_key};
use crate::cache::models::WindowCounter;
use crate::cache::store::KeyCounterStore;
use crate::error::StoreError;

// INCR 与 EXPIRE 在同一脚本中执行，Redis 保证脚本原子性。
// 只有没有过期时间的键（刚创建）才会设置 EXPIRE，窗口内的后续请求不会延长它。
const INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1]) * 1000
end
return {count, ttl}
"#;

/// 基于 Redis 的计数存储，所有副本共享
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    script: Script,
}

impl RedisCounterStore {
    pub async fn connect(client: redis::Client) -> Result<Self, StoreError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            script: Script::new(INCREMENT_SCRIPT),
        })
    }
}

#[async_trait]
impl KeyCounterStore for RedisCounterStore {
    async fn increment_with_expiry(
        &self,
        key: &RateLimitKey,
        window: Duration,
    ) -> Result<WindowCounter, StoreError> {
        let window_secs = window.as_secs().max(1);
        let mut conn = self.conn.clone();

        let (count, ttl_ms): (i64, i64) = self
            .script
            .key(rate_limit_key(key))
            .arg(window_secs)
            .invoke_async(&mut conn)
            .await?;

        let count = u64::try_from(count)
            .map_err(|_| StoreError::Protocol(format!("negative counter value {}", count)))?;
        let ttl = Duration::from_millis(u64::try_from(ttl_ms).unwrap_or(0));

        Ok(WindowCounter::new(count, ttl))
    }

    async fn delete(&self, key: &RateLimitKey) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(rate_limit_key(key)).await?;
        Ok(())
    }

    async fn ttl(&self, key: &RateLimitKey) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn.clone();
        let ttl_ms: i64 = conn.pttl(rate_limit_key(key)).await?;
        // -2 表示键不存在，-1 表示没有过期时间
        Ok(u64::try_from(ttl_ms).ok().map(Duration::from_millis))
    }
}
