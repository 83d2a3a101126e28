// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window per-user rate limiting.
//!
//! The counter key is `ratelimit:{user_id}:{window_start_epoch}`; the
//! window is one minute and the key expires after two. Tier limits come
//! from configuration. Counter-store errors fail open: the request passes
//! without headers rather than blocking traffic on a degraded store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use tracing::error;

use courier_config::model::RateLimitConfig;
use courier_core::{CounterStore, CourierError, User};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Window length of the fixed-window counter.
const WINDOW: Duration = Duration::from_secs(60);

/// Rate limiter state shared by the middleware.
#[derive(Clone)]
pub struct RateLimitState {
    pub store: Arc<dyn CounterStore>,
    pub config: RateLimitConfig,
}

struct WindowCounter {
    count: u64,
    expires_at: Option<Instant>,
}

/// In-process counter store with the same increment/TTL contract an
/// external KV store would satisfy.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, WindowCounter>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop counters whose TTL passed. Invoked opportunistically when the
    /// map grows, so stale windows do not accumulate.
    fn purge_expired(&self) {
        let now = Instant::now();
        self.counters
            .retain(|_, c| c.expires_at.map(|at| at > now).unwrap_or(true));
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str) -> Result<u64, CourierError> {
        if self.counters.len() > 10_000 {
            self.purge_expired();
        }

        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert(WindowCounter {
                count: 0,
                expires_at: None,
            });
        if let Some(at) = entry.expires_at {
            if at <= Instant::now() {
                entry.count = 0;
                entry.expires_at = None;
            }
        }
        entry.count += 1;
        Ok(entry.count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CourierError> {
        if let Some(mut entry) = self.counters.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }
}

/// Enforce the authenticated user's per-minute request budget.
pub async fn rate_limit_middleware(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Response {
    let rate = &state.rate_limit;
    if !rate.config.enabled {
        return next.run(request).await;
    }

    // Runs behind the auth middleware; no user means nothing to key on.
    let Some(user) = request.extensions().get::<User>().cloned() else {
        return next.run(request).await;
    };

    let limit = rate
        .config
        .tiers
        .get(&user.rate_limit_tier)
        .copied()
        .unwrap_or(rate.config.default_limit);

    let now = chrono::Utc::now().timestamp();
    let window_start = now - now.rem_euclid(WINDOW.as_secs() as i64);
    let key = format!("ratelimit:{}:{window_start}", user.id);

    let count = match rate.store.increment(&key).await {
        Ok(count) => count,
        Err(e) => {
            // Fail open: a degraded counter store must not block traffic.
            error!(error = %e, "rate limit store error");
            return next.run(request).await;
        }
    };

    if count == 1 {
        if let Err(e) = rate.store.expire(&key, 2 * WINDOW).await {
            error!(error = %e, "failed to set rate limit expiry");
        }
    }

    let reset = window_start + WINDOW.as_secs() as i64;
    let remaining = limit.saturating_sub(count);

    if count > limit {
        let mut response = ApiError::RateLimited(format!(
            "Rate limit exceeded. Limit: {limit} requests per minute"
        ))
        .into_response();
        set_rate_limit_headers(&mut response, limit, 0, reset);
        return response;
    }

    let mut response = next.run(request).await;
    set_rate_limit_headers(&mut response, limit, remaining, reset);
    response
}

fn set_rate_limit_headers(response: &mut Response, limit: u64, remaining: u64, reset: i64) {
    let headers = response.headers_mut();
    for (name, value) in [
        ("x-ratelimit-limit", limit.to_string()),
        ("x-ratelimit-remaining", remaining.to_string()),
        ("x-ratelimit-reset", reset.to_string()),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}
