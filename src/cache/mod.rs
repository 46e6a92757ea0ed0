// 缓存模块
// 限流计数器的键、数据结构和存储实现

use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::error::StoreError;

pub mod keys;
pub mod models;
pub mod operations;
pub mod store;

pub use keys::RateLimitKey;
pub use models::WindowCounter;
pub use operations::{MemoryCounterStore, RedisCounterStore};
pub use store::KeyCounterStore;

/// 按配置创建计数存储
pub async fn connect_store(config: &Config) -> Result<Arc<dyn KeyCounterStore>, StoreError> {
    match config.rate_limit_store {
        StoreBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| StoreError::Unavailable("REDIS_URL is not set".into()))?;
            let client = redis::Client::open(url)?;
            Ok(Arc::new(RedisCounterStore::connect(client).await?))
        }
        StoreBackend::Memory => {
            tracing::warn!(
                "Using in-process rate limit counters, do not run more than one replica"
            );
            Ok(Arc::new(MemoryCounterStore::new()))
        }
    }
}
