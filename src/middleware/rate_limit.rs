use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    cache::RateLimitCacheOperations,
    config::Config,
    utils::{error_codes, error_to_api_response},
};

#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    config: Arc<Config>,
}

fn proxy_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .map(|ip| ip.trim().to_string())
}

/// 配置为代理模式时优先取代理头，否则只用连接地址
fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>, trust_proxy: bool) -> String {
    trust_proxy
        .then(|| proxy_ip(headers))
        .flatten()
        .or_else(|| remote.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

impl RateLimiter {
    pub fn new(redis: Arc<redis::Client>, config: Config) -> Self {
        Self {
            redis,
            config: Arc::new(config),
        }
    }

    pub async fn check_rate_limit(&self, req: Request<Body>, next: Next) -> Response {
        let remote = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        let ip = client_ip(req.headers(), remote, self.config.trust_proxy_headers);
        let window = self.config.rate_limit_window().as_secs();

        match RateLimitCacheOperations::hit(&self.redis, &ip, window).await {
            Ok(count) if count > self.config.rate_limit_requests as i64 => {
                tracing::info!(%ip, count, "Rate limit exceeded");
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    error_to_api_response::<()>(
                        error_codes::RATE_LIMIT,
                        format!(
                            "Demasiadas solicitudes, inténtelo de nuevo en {} segundos",
                            window
                        ),
                    ),
                )
                    .into_response()
            }
            Ok(_) => next.run(req).await,
            Err(e) => {
                tracing::warn!("Rate limiter unavailable, letting request through: {}", e);
                next.run(req).await
            }
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_real_ip_header_behind_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "10.1.1.1".parse().unwrap());
        headers.insert("x-forwarded-for", "10.2.2.2".parse().unwrap());
        assert_eq!(client_ip(&headers, None, true), "10.1.1.1");
    }

    #[test]
    fn takes_first_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", " 10.2.2.2 , 10.3.3.3".parse().unwrap());
        assert_eq!(client_ip(&headers, None, true), "10.2.2.2");
    }

    #[test]
    fn ignores_spoofed_headers_without_proxy() {
        let addr: SocketAddr = "192.168.0.5:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "1.2.3.4".parse().unwrap());
        headers.insert("x-forwarded-for", "5.6.7.8".parse().unwrap());
        assert_eq!(client_ip(&headers, Some(addr), false), "192.168.0.5");
    }

    #[test]
    fn falls_back_to_connection() {
        let addr: SocketAddr = "192.168.0.5:4000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(addr), true), "192.168.0.5");
        assert_eq!(client_ip(&HeaderMap::new(), None, false), "unknown");
    }
}
