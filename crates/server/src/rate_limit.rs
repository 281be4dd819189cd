use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared_types::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::auth::jwt::Claims;

/// Every this many checks, keys whose timestamps all expired are dropped.
const SWEEP_EVERY: u64 = 256;
/// Sweep on every check once this many keys are tracked.
const SWEEP_ABOVE_KEYS: usize = 10_000;

/// Sliding window rate limit state shared across requests.
#[derive(Clone)]
pub struct RateLimitState {
    inner: Arc<Mutex<RateLimitInner>>,
}

struct RateLimitInner {
    /// Map from client key -> list of request timestamps.
    requests: HashMap<String, Vec<Instant>>,
    /// Maximum requests allowed within the window.
    max_requests: u32,
    /// Sliding window duration.
    window: Duration,
    /// Checks since start, drives the periodic sweep.
    checks: u64,
}

impl RateLimitInner {
    fn sweep(&mut self, now: Instant) {
        let window = self.window;
        self.requests.retain(|_, timestamps| {
            timestamps.retain(|t| now.duration_since(*t) < window);
            !timestamps.is_empty()
        });
    }
}

impl RateLimitState {
    /// Create rate limiter allowing `max_requests` per `window`.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimitInner {
                requests: HashMap::new(),
                max_requests,
                window,
                checks: 0,
            })),
        }
    }

    /// Limits from `RATE_LIMIT_MAX_REQUESTS` / `RATE_LIMIT_WINDOW_SECS`.
    pub fn from_env() -> Self {
        let max = crate::config::env_parse("RATE_LIMIT_MAX_REQUESTS", 300u32);
        let window = crate::config::env_parse("RATE_LIMIT_WINDOW_SECS", 60u64);
        Self::new(max, Duration::from_secs(window))
    }

    /// Check if a request from `key` is allowed. Returns true if allowed.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.checks += 1;
        if inner.checks % SWEEP_EVERY == 0 || inner.requests.len() >= SWEEP_ABOVE_KEYS {
            inner.sweep(now);
        }

        let window = inner.window;
        let max = inner.max_requests;
        let timestamps = inner.requests.entry(key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < window);

        if timestamps.len() as u32 >= max {
            return false;
        }

        timestamps.push(now);
        true
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).requests.len()
    }
}

/// Client key: authenticated user id, else the first `X-Forwarded-For`
/// address, else `anonymous`.
pub fn client_key(request: &Request) -> String {
    if let Some(claims) = request.extensions().get::<Claims>() {
        return format!("user:{}", claims.sub);
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(|ip| format!("ip:{ip}"))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Axum middleware that enforces rate limits per client key.
///
/// Must run after the auth middleware so authenticated requests are keyed
/// by user instead of address.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);

    if !state.check(&key) {
        tracing::warn!(client = %key, "Rate limit exceeded");
        return AppError::rate_limited("Rate limit exceeded. Please try again later.")
            .into_response();
    }

    next.run(request).await
}
