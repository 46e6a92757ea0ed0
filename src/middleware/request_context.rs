use std::net::SocketAddr;

use axum::{body::Body, extract::ConnectInfo, http::Request};
use uuid::Uuid;

use crate::cache::keys::UNKNOWN_IDENTITY;
use crate::config::normalize_route;

/// 单个请求的上下文，随请求扩展（extensions）向下传递，用于限流键和日志关联
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub client_ip: String,
    pub route: String,
}

impl RequestContext {
    pub fn from_request(req: &Request<Body>, trust_proxy_headers: bool) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            client_ip: client_ip(req, trust_proxy_headers),
            route: normalize_route(req.uri().path()),
        }
    }
}

/// 从连接信息获取客户端 IP；只有在部署于可信代理之后才读取代理头。
/// X-Forwarded-For 取最右侧的条目，即可信代理追加的对端地址，左侧条目由客户端控制。
fn client_ip(req: &Request<Body>, trust_proxy_headers: bool) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    let forwarded = if trust_proxy_headers {
        req.headers()
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .filter(|ip| !ip.trim().is_empty())
            .or_else(|| {
                req.headers()
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.rsplit(',').find(|ip| !ip.trim().is_empty()))
            })
    } else {
        None
    };

    forwarded
        .or(remote_ip.as_deref())
        .unwrap_or(UNKNOWN_IDENTITY)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)], peer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/users/register/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[test]
    fn test_uses_peer_address() {
        let ctx = RequestContext::from_request(&request(&[], Some("10.0.0.7:5555")), false);
        assert_eq!(ctx.client_ip, "10.0.0.7");
        assert_eq!(ctx.route, "/api/users/register");
    }

    #[test]
    fn test_ignores_proxy_headers_when_untrusted() {
        let req = request(&[("x-real-ip", "1.2.3.4")], Some("10.0.0.7:5555"));
        assert_eq!(RequestContext::from_request(&req, false).client_ip, "10.0.0.7");
    }

    #[test]
    fn test_trusted_proxy_headers() {
        let req = request(&[("x-real-ip", "1.2.3.4")], Some("10.0.0.7:5555"));
        assert_eq!(RequestContext::from_request(&req, true).client_ip, "1.2.3.4");

        let req = request(
            &[("x-forwarded-for", "5.6.7.8, 10.0.0.1 , ")],
            Some("10.0.0.7:5555"),
        );
        assert_eq!(RequestContext::from_request(&req, true).client_ip, "10.0.0.1");
    }

    #[test]
    fn test_forged_forwarded_entries_are_ignored() {
        for forged in ["6.6.6.1", "6.6.6.2", "6.6.6.3"] {
            let header = format!("{}, 9.9.9.9", forged);
            let req = request(&[("x-forwarded-for", header.as_str())], Some("10.0.0.7:5555"));
            assert_eq!(RequestContext::from_request(&req, true).client_ip, "9.9.9.9");
        }
    }

    #[test]
    fn test_unknown_without_connect_info() {
        let ctx = RequestContext::from_request(&request(&[], None), true);
        assert_eq!(ctx.client_ip, "unknown");
    }

    #[test]
    fn test_request_ids_differ() {
        let req = request(&[], Some("10.0.0.7:5555"));
        let a = RequestContext::from_request(&req, false);
        let b = RequestContext::from_request(&req, false);
        assert_ne!(a.request_id, b.request_id);
    }
}
