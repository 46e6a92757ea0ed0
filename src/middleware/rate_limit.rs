use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{Instrument, debug, info_span};

use super::request_context::RequestContext;
use crate::{
    cache::RateLimitKey,
    config::{Config, PolicyTable},
    error::AppError,
    limiter::{Decision, RateLimiter, WindowState},
};

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// 准入过滤器：在任何业务处理（包括认证、校验）之前按客户端和路由限流
pub struct AdmissionFilter {
    limiter: RateLimiter,
    policies: PolicyTable,
    trust_proxy_headers: bool,
}

impl AdmissionFilter {
    pub fn new(limiter: RateLimiter, policies: PolicyTable, trust_proxy_headers: bool) -> Self {
        Self {
            limiter,
            policies,
            trust_proxy_headers,
        }
    }

    pub fn from_config(limiter: RateLimiter, config: &Config) -> Self {
        Self::new(
            limiter,
            config.rate_limit_policies.clone(),
            config.trust_proxy_headers,
        )
    }

    /// 返回 Ok 表示放行（未配置策略的路由为 None），Err 为直接返回给客户端的拒绝
    pub async fn admit(&self, ctx: &RequestContext) -> Result<Option<WindowState>, AppError> {
        let Some(policy) = self.policies.policy_for(&ctx.route) else {
            return Ok(None);
        };

        let key = RateLimitKey::new(&ctx.client_ip, &ctx.route);
        match self.limiter.check(&key, policy).await {
            Decision::Allowed(state) => Ok(Some(state)),
            Decision::Denied(state) => Err(AppError::RateLimited {
                retry_after: state.reset_after,
            }),
            Decision::Degraded { allowed: true } => Ok(None),
            Decision::Degraded { allowed: false } => Err(AppError::StoreUnavailable),
        }
    }

    pub async fn check_rate_limit(self: Arc<Self>, mut req: Request<Body>, next: Next) -> Response {
        let ctx = RequestContext::from_request(&req, self.trust_proxy_headers);
        let span = info_span!(
            "request",
            request_id = %ctx.request_id,
            client_ip = %ctx.client_ip,
            route = %ctx.route,
        );

        async move {
            match self.admit(&ctx).await {
                Ok(state) => {
                    req.extensions_mut().insert(ctx);
                    let mut response = next.run(req).await;
                    if let Some(state) = state {
                        insert_window_headers(response.headers_mut(), &state);
                    }
                    response
                }
                Err(rejection) => {
                    // 请求体不会被读取，也不会交给任何处理器
                    debug!(rejection = %rejection, "Request rejected before dispatch");
                    rejection.into_response()
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn insert_window_headers(headers: &mut HeaderMap, state: &WindowState) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(state.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(state.remaining()));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(state.reset_after.as_secs()),
    );
}

pub async fn rate_limit(
    State(filter): State<Arc<AdmissionFilter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    filter.check_rate_limit(req, next).await
}
