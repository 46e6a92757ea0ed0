use std::time::Duration;

use chrono::{DateTime, Utc};

/// 一次自增后窗口计数器的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    /// 当前窗口内的请求数（含本次）
    pub count: u64,
    /// 距窗口结束的剩余时间
    pub ttl: Duration,
}

impl WindowCounter {
    pub fn new(count: u64, ttl: Duration) -> Self {
        Self { count, ttl }
    }

    /// 本次请求是否开启了新窗口
    pub fn opened_window(&self) -> bool {
        self.count == 1
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::zero());
        Utc::now() + ttl
    }
}
