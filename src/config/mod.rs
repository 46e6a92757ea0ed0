use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

mod policy;

pub use policy::{FailureMode, PolicyTable, RateLimitPolicy, UnmappedRoutes, normalize_route};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("invalid rate limit policy: {0}")]
    InvalidPolicy(String),
}

/// 计数器存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    /// 仅用于测试和单进程开发，多副本下计数不共享
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid {
                name: "RATE_LIMIT_STORE",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub rate_limit_store: StoreBackend,
    pub rate_limit_policies: PolicyTable,
    pub failure_mode: FailureMode,
    pub store_timeout_ms: u64,
    pub trust_proxy_headers: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 从任意键值来源加载配置，任何非法值都在启动时报错
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_uri = normalize_route(
            &lookup("API_BASE_URI").unwrap_or_else(|| "/api".to_string()),
        );
        if !api_base_uri.starts_with('/') {
            return Err(ConfigError::Invalid {
                name: "API_BASE_URI",
                value: api_base_uri,
            });
        }

        let rate_limit_store = match lookup("RATE_LIMIT_STORE") {
            Some(raw) => raw.parse()?,
            None => StoreBackend::Redis,
        };
        let redis_url = lookup("REDIS_URL");
        if rate_limit_store == StoreBackend::Redis && redis_url.is_none() {
            return Err(ConfigError::Missing("REDIS_URL"));
        }

        let default_policy = RateLimitPolicy::new(
            parse_var(&lookup, "RATE_LIMIT_REQUESTS", 100)?,
            match lookup("RATE_LIMIT_WINDOW") {
                Some(raw) => policy::parse_seconds(&raw).ok_or(ConfigError::Invalid {
                    name: "RATE_LIMIT_WINDOW",
                    value: raw,
                })?,
                None => 60,
            },
        )?;

        let unmapped = match lookup("RATE_LIMIT_UNMAPPED")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("default") => UnmappedRoutes::Default(default_policy),
            Some("bypass") => UnmappedRoutes::Bypass,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "RATE_LIMIT_UNMAPPED",
                    value: other.to_string(),
                });
            }
        };

        let policies = lookup("RATE_LIMIT_POLICIES")
            .unwrap_or_else(|| format!("{}/users/register=5/1", api_base_uri.trim_end_matches('/')));
        let rate_limit_policies = PolicyTable::parse(&policies, unmapped)?;

        let failure_mode = match lookup("RATE_LIMIT_FAILURE_MODE") {
            Some(raw) => raw.parse()?,
            None => FailureMode::default(),
        };

        let store_timeout_ms = parse_var(&lookup, "RATE_LIMIT_STORE_TIMEOUT_MS", 250u64)?;
        if store_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_STORE_TIMEOUT_MS",
                value: "0".into(),
            });
        }

        Ok(Config {
            redis_url,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "::".to_string()),
            server_port: parse_var(&lookup, "SERVER_PORT", 3000)?,
            api_base_uri,
            rate_limit_store,
            rate_limit_policies,
            failure_mode,
            store_timeout_ms,
            trust_proxy_headers: parse_var(&lookup, "TRUST_PROXY_HEADERS", false)?,
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}
