//! 固定窗口限流器
//!
//! 每个键一个计数器，窗口在第一次请求时开启，到期后由存储自行删除。
//! 窗口边界是硬切换：到期瞬间计数归零，跨越边界时最多可能放行 `2 × max_requests` 个请求。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::cache::{KeyCounterStore, RateLimitKey};
use crate::config::{FailureMode, RateLimitPolicy};
use crate::error::StoreError;

/// 窗口当前状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub count: u64,
    pub limit: u32,
    pub reset_after: Duration,
}

impl WindowState {
    pub fn remaining(&self) -> u64 {
        u64::from(self.limit).saturating_sub(self.count)
    }
}

/// 限流判定结果。拒绝是正常结果，不是错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed(WindowState),
    Denied(WindowState),
    /// 存储不可用，按配置的失败策略放行或拒绝
    Degraded { allowed: bool },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        match self {
            Decision::Allowed(_) => true,
            Decision::Denied(_) => false,
            Decision::Degraded { allowed } => *allowed,
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KeyCounterStore>,
    failure_mode: FailureMode,
    timeout: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyCounterStore>, failure_mode: FailureMode, timeout: Duration) -> Self {
        Self {
            store,
            failure_mode,
            timeout,
        }
    }

    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// 记录一次请求并判定是否放行。
    ///
    /// 存储往返受 `timeout` 限制，超时与连接失败一样按失败策略处理。
    /// 如果请求在往返完成前被取消，自增可能已经生效（至少一次计数），这是可接受的误差。
    pub async fn check(&self, key: &RateLimitKey, policy: RateLimitPolicy) -> Decision {
        trace!(
            key = %key,
            limit = policy.max_requests(),
            window_secs = policy.window_secs(),
            "Checking rate limit"
        );

        let counter = match tokio::time::timeout(
            self.timeout,
            self.store.increment_with_expiry(key, policy.window()),
        )
        .await
        {
            Ok(Ok(counter)) => counter,
            Ok(Err(e)) => return self.degraded(key, &e),
            Err(_) => return self.degraded(key, &StoreError::Timeout(self.timeout)),
        };

        if counter.opened_window() {
            debug!(key = %key, reset_at = %counter.reset_at(), "Opened rate limit window");
        }

        let state = WindowState {
            count: counter.count,
            limit: policy.max_requests(),
            reset_after: counter.ttl,
        };

        if counter.count <= u64::from(policy.max_requests()) {
            Decision::Allowed(state)
        } else {
            debug!(
                key = %key,
                count = counter.count,
                limit = policy.max_requests(),
                "Rate limit exceeded"
            );
            Decision::Denied(state)
        }
    }

    /// 只关心是否放行时使用
    pub async fn allow(&self, key: &RateLimitKey, policy: RateLimitPolicy) -> bool {
        self.check(key, policy).await.is_allowed()
    }

    /// 诊断用：窗口剩余时间
    pub async fn time_until_reset(&self, key: &RateLimitKey) -> Result<Option<Duration>, StoreError> {
        self.store.ttl(key).await
    }

    fn degraded(&self, key: &RateLimitKey, err: &StoreError) -> Decision {
        let allowed = self.failure_mode == FailureMode::Open;
        warn!(
            key = %key,
            error = %err,
            failure_mode = ?self.failure_mode,
            allowed,
            "Rate limit store unavailable"
        );
        Decision::Degraded { allowed }
    }
}
