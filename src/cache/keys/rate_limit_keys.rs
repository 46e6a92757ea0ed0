use std::fmt;

/// 限流计数键在 Redis 中的前缀
pub const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 无法识别客户端时使用的身份
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// 限流键，格式为 `<identity>:<route>`，同一客户端同一路由共享一个计数器。
///
/// 路由总以 `/` 开头而身份（IP）中不会出现 `/`，
/// 因此即使 IPv6 地址带冒号，键也不会在不同组合之间冲突。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub fn new(identity: &str, route: &str) -> Self {
        let identity = identity.trim();
        let identity = if identity.is_empty() {
            UNKNOWN_IDENTITY
        } else {
            identity
        };
        let route = if route.starts_with('/') {
            route.to_string()
        } else {
            format!("/{}", route)
        };
        Self(format!("{}:{}", identity, route))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 生成 Redis 中的计数键
pub fn rate_limit_key(key: &RateLimitKey) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, key)
}
