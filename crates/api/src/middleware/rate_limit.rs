//! Per-IP request throttle.
//!
//! A coarse in-process guard in front of every `/api/v1` route. The
//! per-action sliding windows (login, reset, booking) live in the domain
//! rate limiter and are enforced by the handlers.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use serde_json::json;
use std::num::NonZeroU32;

use crate::app::AppState;
use crate::extractors::client_ip;
use crate::middleware::trace_id::get_request_id;

const UNKNOWN_CLIENT: &str = "unknown";

/// Token buckets keyed by client IP.
pub struct IpThrottle {
    limiter: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
    per_minute: NonZeroU32,
}

impl IpThrottle {
    /// Returns `None` when `per_minute` is 0, which disables throttling.
    pub fn new(per_minute: u32) -> Option<Self> {
        let per_minute = NonZeroU32::new(per_minute)?;
        Some(Self {
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
            clock: DefaultClock::default(),
            per_minute,
        })
    }

    pub fn per_minute(&self) -> u32 {
        self.per_minute.get()
    }

    /// `Err(retry_after_secs)` when the client is over its quota.
    pub fn check(&self, client: &str) -> Result<(), u64> {
        self.limiter
            .check_key(&client.to_string())
            .map_err(|not_until| {
                not_until
                    .wait_time_from(self.clock.now())
                    .as_secs()
                    .max(1)
            })
    }

    /// Drops buckets that have fully refilled.
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }
}

impl std::fmt::Debug for IpThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpThrottle")
            .field("per_minute", &self.per_minute)
            .field("tracked_clients", &self.limiter.len())
            .finish()
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(throttle) = state.throttle.as_ref() else {
        return next.run(req).await;
    };

    let client = client_ip(req.headers(), req.extensions(), &state.trusted_proxies)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    if let Err(retry_after) = throttle.check(&client) {
        tracing::warn!(
            ip_address = %client,
            request_id = %get_request_id(req.extensions()),
            retry_after_secs = retry_after,
            "Request throttled"
        );
        return throttled_response(throttle.per_minute(), retry_after);
    }

    next.run(req).await
}

fn throttled_response(limit: u32, retry_after: u64) -> Response {
    let body = json!({
        "error": "rate_limited",
        "message": format!("Rate limit of {} requests/minute exceeded", limit),
        "retry_after": retry_after
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_disables_throttle() {
        assert!(IpThrottle::new(0).is_none());
    }

    #[test]
    fn test_throttle_exhaustion() {
        let throttle = IpThrottle::new(2).unwrap();
        assert!(throttle.check("203.0.113.1").is_ok());
        assert!(throttle.check("203.0.113.1").is_ok());

        let retry_after = throttle.check("203.0.113.1").unwrap_err();
        assert!(retry_after >= 1);
    }

    #[test]
    fn test_clients_are_independent() {
        let throttle = IpThrottle::new(1).unwrap();
        assert!(throttle.check("203.0.113.1").is_ok());
        assert!(throttle.check("203.0.113.2").is_ok());
        assert!(throttle.check("203.0.113.1").is_err());
        assert!(throttle.check("203.0.113.2").is_err());
    }

    #[test]
    fn test_debug_output() {
        let throttle = IpThrottle::new(100).unwrap();
        throttle.check("203.0.113.1").unwrap();
        let debug = format!("{:?}", throttle);
        assert!(debug.contains("per_minute"));
        assert!(debug.contains("tracked_clients"));
    }

    #[test]
    fn test_throttled_response_format() {
        let response = throttled_response(100, 60);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");
    }
}
