use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// 单条限流策略：每个窗口内最多允许的请求数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    max_requests: u32,
    window_secs: u64,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window_secs: u64) -> Result<Self, ConfigError> {
        if max_requests < 1 {
            return Err(ConfigError::InvalidPolicy(
                "max requests must be at least 1".into(),
            ));
        }
        if window_secs < 1 {
            return Err(ConfigError::InvalidPolicy(
                "window must be at least 1 second".into(),
            ));
        }
        Ok(Self {
            max_requests,
            window_secs,
        })
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// `5/60` 或 `5/60s`
impl FromStr for RateLimitPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (max, window) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| ConfigError::InvalidPolicy(format!("expected max/window, got {s:?}")))?;
        let max = max
            .trim()
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidPolicy(format!("bad max requests in {s:?}: {e}")))?;
        let window = parse_seconds(window)
            .ok_or_else(|| ConfigError::InvalidPolicy(format!("bad window in {s:?}")))?;
        Self::new(max, window)
    }
}

pub(crate) fn parse_seconds(raw: &str) -> Option<u64> {
    raw.trim().trim_end_matches('s').parse().ok()
}

/// 未配置路由的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmappedRoutes {
    /// 使用全局默认策略
    Default(RateLimitPolicy),
    /// 不限流
    Bypass,
}

/// 存储不可用时的放行策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    #[default]
    Open,
    Closed,
}

impl FromStr for FailureMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailureMode::Open),
            "closed" => Ok(FailureMode::Closed),
            _ => Err(ConfigError::Invalid {
                name: "RATE_LIMIT_FAILURE_MODE",
                value: s.to_string(),
            }),
        }
    }
}

/// 路由到限流策略的固定映射表，部署时确定
#[derive(Debug, Clone)]
pub struct PolicyTable {
    routes: HashMap<String, RateLimitPolicy>,
    unmapped: UnmappedRoutes,
}

impl PolicyTable {
    pub fn new(unmapped: UnmappedRoutes) -> Self {
        Self {
            routes: HashMap::new(),
            unmapped,
        }
    }

    pub fn with_route(mut self, route: &str, policy: RateLimitPolicy) -> Self {
        self.routes.insert(normalize_route(route), policy);
        self
    }

    /// 解析 `RATE_LIMIT_POLICIES`，格式 `/api/users/register=5/60,/api/users/login=10/60`
    pub fn parse(raw: &str, unmapped: UnmappedRoutes) -> Result<Self, ConfigError> {
        let mut table = Self::new(unmapped);
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (route, policy) = entry.split_once('=').ok_or_else(|| {
                ConfigError::InvalidPolicy(format!("expected route=max/window, got {entry:?}"))
            })?;
            let route = route.trim();
            if !route.starts_with('/') {
                return Err(ConfigError::InvalidPolicy(format!(
                    "route must start with '/', got {route:?}"
                )));
            }
            table = table.with_route(route, policy.parse()?);
        }
        Ok(table)
    }

    /// 返回 None 表示该路由不限流
    pub fn policy_for(&self, route: &str) -> Option<RateLimitPolicy> {
        match self.routes.get(route) {
            Some(policy) => Some(*policy),
            None => match self.unmapped {
                UnmappedRoutes::Default(policy) => Some(policy),
                UnmappedRoutes::Bypass => None,
            },
        }
    }

    pub fn unmapped(&self) -> UnmappedRoutes {
        self.unmapped
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// 去掉末尾的 `/`，根路径保持不变
pub fn normalize_route(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max: u32, window: u64) -> RateLimitPolicy {
        RateLimitPolicy::new(max, window).unwrap()
    }

    #[test]
    fn test_policy_rejects_zero_values() {
        assert!(RateLimitPolicy::new(0, 60).is_err());
        assert!(RateLimitPolicy::new(5, 0).is_err());
        assert!(RateLimitPolicy::new(1, 1).is_ok());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("5/60".parse::<RateLimitPolicy>().unwrap(), policy(5, 60));
        assert_eq!(" 10 / 1s ".parse::<RateLimitPolicy>().unwrap(), policy(10, 1));
        assert!("5".parse::<RateLimitPolicy>().is_err());
        assert!("0/60".parse::<RateLimitPolicy>().is_err());
        assert!("five/60".parse::<RateLimitPolicy>().is_err());
    }

    #[test]
    fn test_parse_table() {
        let table = PolicyTable::parse(
            "/api/users/register=5/1, /api/users/login/=10/60",
            UnmappedRoutes::Bypass,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.policy_for("/api/users/register"), Some(policy(5, 1)));
        assert_eq!(table.policy_for("/api/users/login"), Some(policy(10, 60)));
        assert_eq!(table.policy_for("/api/other"), None);
    }

    #[test]
    fn test_parse_table_rejects_garbage() {
        assert!(PolicyTable::parse("users=5/1", UnmappedRoutes::Bypass).is_err());
        assert!(PolicyTable::parse("/users", UnmappedRoutes::Bypass).is_err());
        assert!(PolicyTable::parse("/users=5/0", UnmappedRoutes::Bypass).is_err());
        assert!(PolicyTable::parse("", UnmappedRoutes::Bypass).unwrap().is_empty());
    }

    #[test]
    fn test_unmapped_falls_back_to_default() {
        let table = PolicyTable::new(UnmappedRoutes::Default(policy(100, 60)))
            .with_route("/api/users/register", policy(5, 1));

        assert_eq!(table.policy_for("/api/users/register"), Some(policy(5, 1)));
        assert_eq!(table.policy_for("/api/anything"), Some(policy(100, 60)));
    }

    #[test]
    fn test_failure_mode_from_str() {
        assert_eq!("open".parse::<FailureMode>().unwrap(), FailureMode::Open);
        assert_eq!("CLOSED".parse::<FailureMode>().unwrap(), FailureMode::Closed);
        assert!("maybe".parse::<FailureMode>().is_err());
    }

    #[test]
    fn test_normalize_route() {
        assert_eq!(normalize_route("/api/users/"), "/api/users");
        assert_eq!(normalize_route("/"), "/");
        assert_eq!(normalize_route("/api"), "/api");
    }
}
