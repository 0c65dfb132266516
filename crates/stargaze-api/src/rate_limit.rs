//! Fixed-window rate limiter middleware.
//!
//! Counts requests in the current wall-clock second and rejects anything
//! above the configured limit with 429. Window and count share one atomic
//! word so a window reset and a concurrent increment cannot interleave.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Extension, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::ErrorBody;

const LOW_BITS: u64 = 0xFFFF_FFFF;

/// Shared state for the rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    max_per_sec: u64,
    /// Low 32 bits of the active window's epoch second in the high half,
    /// requests seen in that window in the low half.
    state: Arc<AtomicU64>,
}

impl RateLimiter {
    /// A limit of 0 disables limiting.
    pub fn new(max_per_sec: u64) -> Self {
        Self {
            max_per_sec: max_per_sec.min(LOW_BITS),
            state: Arc::new(AtomicU64::new(0)),
        }
    }

    fn try_acquire(&self) -> bool {
        if self.max_per_sec == 0 {
            return true;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.try_acquire_at(now)
    }

    fn try_acquire_at(&self, now: u64) -> bool {
        let now = now & LOW_BITS;
        self.state
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |packed| {
                let window = packed >> 32;
                let count = packed & LOW_BITS;
                if window != now {
                    Some((now << 32) | 1)
                } else if count < self.max_per_sec {
                    Some(packed + 1)
                } else {
                    None
                }
            })
            .is_ok()
    }
}

/// Axum middleware that enforces the rate limit.
pub async fn rate_limit_middleware(
    Extension(limiter): Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.try_acquire() {
        next.run(req).await
    } else {
        tracing::warn!(path = %req.uri().path(), "Rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody {
                error: "too_many_requests".to_string(),
                detail: "Rate limit exceeded".to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit_per_window() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.try_acquire_at(100));
        assert!(limiter.try_acquire_at(100));
        assert!(limiter.try_acquire_at(100));
        assert!(!limiter.try_acquire_at(100));
    }

    #[test]
    fn test_new_window_resets_count() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.try_acquire_at(100));
        assert!(!limiter.try_acquire_at(100));
        assert!(limiter.try_acquire_at(101));
    }

    #[test]
    fn test_concurrent_callers_share_one_budget() {
        let limiter = RateLimiter::new(50);
        let accepted: usize = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let limiter = limiter.clone();
                    scope.spawn(move || (0..100).filter(|_| limiter.try_acquire_at(200)).count())
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });
        assert_eq!(accepted, 50);
    }

    #[test]
    fn test_rejected_calls_do_not_spill_into_next_window() {
        let limiter = RateLimiter::new(2);
        for _ in 0..10 {
            limiter.try_acquire_at(300);
        }
        assert!(limiter.try_acquire_at(301));
        assert!(limiter.try_acquire_at(301));
        assert!(!limiter.try_acquire_at(301));
    }

    #[test]
    fn test_zero_disables_limit() {
        let limiter = RateLimiter::new(0);
        for _ in 0..1000 {
            assert!(limiter.try_acquire());
        }
    }
}
