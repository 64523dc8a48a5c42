//! Request guards in front of the context routes: bearer-token auth and a
//! per-client fixed-window request budget.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::ApiError;

const WINDOW: Duration = Duration::from_secs(60);
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Holds the digest of the configured token, never the token itself.
#[derive(Clone)]
pub(crate) struct BearerGuard {
    expected: Option<blake3::Hash>,
}

impl BearerGuard {
    pub(crate) fn new(token: Option<&str>) -> Self {
        Self {
            expected: token.map(|t| blake3::hash(t.as_bytes())),
        }
    }

    fn allows(&self, presented: Option<&str>) -> bool {
        let Some(expected) = self.expected else {
            return true;
        };
        // Equal-length digests keep the comparison constant time.
        let presented = blake3::hash(presented.unwrap_or_default().as_bytes());
        presented.as_bytes().ct_eq(expected.as_bytes()).into()
    }
}

pub(crate) async fn require_bearer(
    State(guard): State<BearerGuard>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if guard.allows(presented) {
        next.run(req).await
    } else {
        tracing::debug!(uri = %req.uri(), "rejected request without valid bearer token");
        ApiError::Unauthorized.into_response()
    }
}

#[derive(Clone)]
pub(crate) struct RateLimiter {
    per_window: u32,
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
}

#[derive(Clone, Copy)]
struct Window {
    opened: Instant,
    used: u32,
}

impl RateLimiter {
    /// `per_window == 0` admits everything.
    pub(crate) fn new(per_window: u32) -> Self {
        Self {
            per_window,
            windows: Arc::default(),
        }
    }

    fn admit(&self, client: IpAddr, now: Instant) -> bool {
        if self.per_window == 0 {
            return true;
        }
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        if windows.len() >= MAX_TRACKED_CLIENTS && !windows.contains_key(&client) {
            windows.retain(|_, w| now.duration_since(w.opened) < WINDOW);
        }
        let window = windows.entry(client).or_insert(Window {
            opened: now,
            used: 0,
        });
        if now.duration_since(window.opened) >= WINDOW {
            *window = Window {
                opened: now,
                used: 0,
            };
        }
        if window.used >= self.per_window {
            return false;
        }
        window.used += 1;
        true
    }
}

pub(crate) async fn enforce_rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |info| info.0.ip());
    if limiter.admit(client, Instant::now()) {
        next.run(req).await
    } else {
        tracing::debug!(%client, "rate limit exceeded");
        ApiError::RateLimited.into_response()
    }
}
