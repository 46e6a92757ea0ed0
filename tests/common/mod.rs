#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use admission::{
    AppState,
    cache::{KeyCounterStore, MemoryCounterStore, RateLimitKey, WindowCounter},
    config::Config,
    error::StoreError,
    limiter::RateLimiter,
    middleware::AdmissionFilter,
    router::create_router,
    routes::user::UserRegistry,
};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{Request, Response},
};
use serde_json::{Value, json};

pub const REGISTER: &str = "/api/users/register";

pub struct TestApp {
    pub router: Router,
    pub users: Arc<UserRegistry>,
}

pub fn config(vars: &[(&str, &str)]) -> Config {
    let mut all: HashMap<String, String> = [
        ("RATE_LIMIT_STORE", "memory"),
        ("RATE_LIMIT_POLICIES", "/api/users/register=5/1"),
        ("RATE_LIMIT_UNMAPPED", "bypass"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in vars {
        all.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|name| all.get(name).cloned()).unwrap()
}

pub fn app_with_store(config: Config, store: Arc<dyn KeyCounterStore>) -> TestApp {
    let limiter = RateLimiter::new(store, config.failure_mode, config.store_timeout());
    let filter = Arc::new(AdmissionFilter::from_config(limiter, &config));
    let state = AppState::new(config);
    let users = state.users.clone();
    TestApp {
        router: create_router(state, filter),
        users,
    }
}

pub fn app(vars: &[(&str, &str)]) -> TestApp {
    app_with_store(config(vars), Arc::new(MemoryCounterStore::new()))
}

pub fn register_request(peer: &str, user_id: &str) -> Request<Body> {
    post_json(
        REGISTER,
        peer,
        json!({ "user_id": user_id, "nickname": "tester" }).to_string(),
    )
}

pub fn post_json(uri: &str, peer: &str, body: String) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let addr: SocketAddr = peer.parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// 始终连接失败的存储
pub struct UnreachableStore;

#[async_trait]
impl KeyCounterStore for UnreachableStore {
    async fn increment_with_expiry(
        &self,
        _key: &RateLimitKey,
        _window: Duration,
    ) -> Result<WindowCounter, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &RateLimitKey) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn ttl(&self, _key: &RateLimitKey) -> Result<Option<Duration>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}
