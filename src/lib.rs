use std::sync::Arc;

use config::Config;
use routes::user::UserRegistry;

pub mod cache;
pub mod config;
pub mod error;
pub mod limiter;
pub mod middleware;
pub mod result;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<UserRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            users: Arc::new(UserRegistry::new()),
        }
    }
}
