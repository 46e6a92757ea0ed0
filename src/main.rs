use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use admission::{
    AppState, cache, config::Config, limiter::RateLimiter, middleware::AdmissionFilter, router,
};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置，非法配置直接退出
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        store = ?config.rate_limit_store,
        failure_mode = ?config.failure_mode,
        policies = config.rate_limit_policies.len(),
        unmapped = ?config.rate_limit_policies.unmapped(),
        "Configuration loaded"
    );

    // 设置限流器
    let store = cache::connect_store(&config)
        .await
        .expect("Failed to connect to rate limit store");
    let limiter = RateLimiter::new(store, config.failure_mode, config.store_timeout());
    let filter = Arc::new(AdmissionFilter::from_config(limiter, &config));

    let state = AppState::new(config.clone());
    let app = router::create_router(state, filter);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let app = {
        tracing::debug!("Adding CORS layer for development mode");
        app.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    tracing::info!("Server stopped");
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
