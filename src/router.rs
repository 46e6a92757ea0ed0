use std::sync::Arc;

use axum::{Router, routing::post};

use crate::{
    AppState,
    error::AppError,
    middleware::{AdmissionFilter, log_errors, rate_limit},
    routes,
};

// 用户相关的路由
pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users/register", post(routes::user::register))
}

/// 创建主路由。准入过滤器是最外层中间件，先于日志、认证、参数校验和业务处理执行。
pub fn create_router(state: AppState, filter: Arc<AdmissionFilter>) -> Router {
    let api = user_routes();
    let router = if state.config.api_base_uri == "/" {
        Router::new().merge(api)
    } else {
        Router::new().nest(&state.config.api_base_uri, api)
    };

    router
        .fallback(not_found)
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn_with_state(filter, rate_limit))
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}
