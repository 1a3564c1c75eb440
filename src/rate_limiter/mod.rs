/*!
 * # Rate Limiting
 *
 * Fixed-window request limiting keyed by client address. Each client may make
 * `requests_per_window` requests per `window_duration`; further requests are
 * answered with `429 Too Many Requests` in the usual error envelope until the
 * window rolls over.
 *
 * Counters live in process memory, so limits apply per server instance.
 * `/health` is never limited.
 */
use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use metrics::counter;
use std::{
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};
use tracing::warn;

use crate::{config::AppConfig, errors::ErrorResponse};

pub const LIMIT_EXCEEDED_MESSAGE: &str = "Too many requests, please try again later";

/// Tracked clients before expired windows are swept
const SWEEP_THRESHOLD: usize = 10_000;

const UNLIMITED_PATHS: &[&str] = &["/health"];

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_duration: Duration,
    pub enable_headers: bool,
    pub trust_forwarded: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window_duration: Duration::from_secs(60),
            enable_headers: true,
            trust_forwarded: false,
        }
    }
}

impl From<&AppConfig> for RateLimitConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            requests_per_window: cfg.rate_limit_requests_per_window,
            window_duration: Duration::from_secs(cfg.rate_limit_window_seconds),
            enable_headers: cfg.rate_limit_enable_headers,
            trust_forwarded: cfg.rate_limit_trust_forwarded,
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

/// Outcome of one admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

#[derive(Clone)]
pub struct RateLimiter {
    entries: Arc<DashMap<String, RateLimitEntry>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Counts a request from `key` and reports whether it is admitted
    pub fn check(&self, key: &str) -> RateLimitResult {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitResult {
        if self.entries.len() >= SWEEP_THRESHOLD {
            self.cleanup_expired_at(now);
        }

        let limit = self.config.requests_per_window;
        let window = self.config.window_duration;

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                count: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= window {
            entry.count = 0;
            entry.window_start = now;
        }
        let reset_after = window.saturating_sub(now.duration_since(entry.window_start));

        if entry.count >= limit {
            return RateLimitResult {
                allowed: false,
                limit,
                remaining: 0,
                reset_after,
            };
        }

        entry.count += 1;
        RateLimitResult {
            allowed: true,
            limit,
            remaining: limit - entry.count,
            reset_after,
        }
    }

    /// Forgets clients whose window has passed
    fn cleanup_expired_at(&self, now: Instant) {
        let window = self.config.window_duration;
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) < window);
    }
}

fn forwarded_ip(request: &Request) -> Option<String> {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    let real_ip = || {
        request
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    };

    forwarded.or_else(real_ip).map(str::to_string)
}

/// Limiter key for the client that sent `request`.
///
/// Uses the socket address unless `trust_forwarded` is set, in which case
/// proxy headers take precedence.
pub fn client_key(request: &Request, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(ip) = forwarded_ip(request) {
            return format!("ip:{}", ip);
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

fn num_header(n: u64) -> HeaderValue {
    HeaderValue::from(n)
}

fn apply_headers(response: &mut Response, result: &RateLimitResult) {
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        num_header(u64::from(result.limit)),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        num_header(u64::from(result.remaining)),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        num_header(result.reset_after.as_secs()),
    );
}

fn limit_exceeded(result: &RateLimitResult, with_headers: bool) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorResponse::new(LIMIT_EXCEEDED_MESSAGE)),
    )
        .into_response();

    response.headers_mut().insert(
        header::RETRY_AFTER,
        num_header(result.reset_after.as_secs().max(1)),
    );
    if with_headers {
        apply_headers(&mut response, result);
    }
    response
}

/// Tower layer applying a shared [`RateLimiter`] to every request
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: RateLimiter,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config),
        }
    }
}

impl<S> tower::Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: RateLimiter,
}

impl<S> tower::Service<Request> for RateLimitService<S>
where
    S: tower::Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        if UNLIMITED_PATHS.contains(&request.uri().path()) {
            return Box::pin(self.inner.call(request));
        }

        let config = self.limiter.config();
        let with_headers = config.enable_headers;
        let key = client_key(&request, config.trust_forwarded);
        let result = self.limiter.check(&key);

        if !result.allowed {
            warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
            counter!("esnaf_http.rate_limited", 1);
            let response = limit_exceeded(&result, with_headers);
            return Box::pin(async move { Ok(response) });
        }

        let future = self.inner.call(request);
        Box::pin(async move {
            let mut response = future.await?;
            if with_headers {
                apply_headers(&mut response, &result);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http};

    fn limiter(limit: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests_per_window: limit,
            window_duration: Duration::from_secs(window_secs),
            ..Default::default()
        })
    }

    #[test]
    fn admits_up_to_limit_then_refuses() {
        let limiter = limiter(3, 60);
        let now = Instant::now();

        let remaining: Vec<u32> = (0..3)
            .map(|_| limiter.check_at("ip:10.0.0.1", now))
            .inspect(|r| assert!(r.allowed))
            .map(|r| r.remaining)
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let refused = limiter.check_at("ip:10.0.0.1", now);
        assert!(!refused.allowed);
        assert_eq!(refused.remaining, 0);
        assert_eq!(refused.reset_after, Duration::from_secs(60));
    }

    #[test]
    fn clients_have_separate_quotas() {
        let limiter = limiter(1, 60);
        let now = Instant::now();

        assert!(limiter.check_at("ip:10.0.0.1", now).allowed);
        assert!(!limiter.check_at("ip:10.0.0.1", now).allowed);
        assert!(limiter.check_at("ip:10.0.0.2", now).allowed);
    }

    #[test]
    fn window_rollover_restores_quota() {
        let limiter = limiter(1, 60);
        let start = Instant::now();

        assert!(limiter.check_at("ip:10.0.0.1", start).allowed);
        let refused = limiter.check_at("ip:10.0.0.1", start + Duration::from_secs(45));
        assert!(!refused.allowed);
        assert_eq!(refused.reset_after, Duration::from_secs(15));

        assert!(limiter
            .check_at("ip:10.0.0.1", start + Duration::from_secs(60))
            .allowed);
    }

    #[test]
    fn cleanup_drops_only_expired_windows() {
        let limiter = limiter(5, 60);
        let start = Instant::now();
        limiter.check_at("ip:old", start);
        limiter.check_at("ip:new", start + Duration::from_secs(30));

        limiter.cleanup_expired_at(start + Duration::from_secs(70));
        assert_eq!(limiter.entries.len(), 1);
        assert!(limiter.entries.contains_key("ip:new"));
    }

    #[test]
    fn client_key_prefers_socket_address_unless_proxy_is_trusted() {
        let mut request = http::Request::builder()
            .uri("/api/stoklar")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 20], 40000))));

        assert_eq!(client_key(&request, false), "ip:192.168.1.20");
        assert_eq!(client_key(&request, true), "ip:203.0.113.9");

        let bare = http::Request::builder()
            .header("x-real-ip", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&bare, false), "ip:unknown");
        assert_eq!(client_key(&bare, true), "ip:198.51.100.4");
    }
}
