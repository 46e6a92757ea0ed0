use std::time::Duration;

use async_trait::async_trait;

use super::keys::RateLimitKey;
use super::models::WindowCounter;
use crate::error::StoreError;

/// 支持原子“自增并在首次创建时设置过期”的共享计数存储
#[async_trait]
pub trait KeyCounterStore: Send + Sync {
    /// 原子地将计数加一；仅当键刚被创建（没有过期时间）时设置 `window` 作为过期时间。
    /// 任何调用方都观察不到没有过期时间的计数器。
    async fn increment_with_expiry(
        &self,
        key: &RateLimitKey,
        window: Duration,
    ) -> Result<WindowCounter, StoreError>;

    /// 仅供测试清理使用
    async fn delete(&self, key: &RateLimitKey) -> Result<(), StoreError>;

    /// 剩余过期时间，键不存在时返回 None
    async fn ttl(&self, key: &RateLimitKey) -> Result<Option<Duration>, StoreError>;
}
