use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

#[derive(Debug)]
struct WindowState {
    start: Instant,
    count: u32,
}

/// Whole-router requests-per-second cap, applied as axum middleware.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    rps: u32,
    window: Arc<Mutex<WindowState>>,
}

impl RateLimiter {
    fn new(rps: u32) -> Self {
        Self {
            rps: rps.max(1),
            window: Arc::new(Mutex::new(WindowState {
                start: Instant::now(),
                count: 0,
            })),
        }
    }

    fn allow(&self) -> bool {
        let mut guard = self.window.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();
        if now.duration_since(guard.start) >= Duration::from_secs(1) {
            guard.start = now;
            guard.count = 0;
        }
        if guard.count < self.rps {
            guard.count += 1;
            true
        } else {
            false
        }
    }
}

pub async fn rps_middleware(
    State(state): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.allow() {
        return (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded").into_response();
    }
    next.run(req).await
}

pub fn new_rps_state(rps: u32) -> RateLimiter {
    RateLimiter::new(rps)
}

/// Keyed TTL'd counter used to throttle answer submission per participant
/// per duel. A limit of 0 disables throttling, which is also the behavior
/// callers get when no limiter is wired up at all.
#[derive(Clone, Debug)]
pub struct KeyedRateLimiter {
    limit: u32,
    window: Duration,
    counters: Arc<Mutex<HashMap<String, WindowState>>>,
}

const COMPACT_THRESHOLD: usize = 4096;

impl KeyedRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            counters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts one hit against `key`. Returns the suggested wait in
    /// milliseconds when the key is over its window budget.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        if self.limit == 0 {
            return Ok(());
        }
        let mut counters = self.counters.lock().expect("keyed limiter mutex poisoned");
        let now = Instant::now();

        if counters.len() > COMPACT_THRESHOLD {
            let window = self.window;
            counters.retain(|_, w| now.duration_since(w.start) < window);
        }

        let entry = counters.entry(key.to_string()).or_insert(WindowState {
            start: now,
            count: 0,
        });
        if now.duration_since(entry.start) >= self.window {
            entry.start = now;
            entry.count = 0;
        }
        if entry.count < self.limit {
            entry.count += 1;
            Ok(())
        } else {
            let elapsed = now.duration_since(entry.start);
            let retry_after = self.window.saturating_sub(elapsed);
            Err(retry_after.as_millis() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_limiter_enforces_per_key_budget() {
        let limiter = KeyedRateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("duel:alice").is_ok());
        }
        assert!(limiter.check("duel:alice").is_err());
        // Other keys are unaffected.
        assert!(limiter.check("duel:bob").is_ok());
    }

    #[test]
    fn zero_limit_disables_throttling() {
        let limiter = KeyedRateLimiter::new(0, Duration::from_secs(1));
        for _ in 0..1000 {
            assert!(limiter.check("k").is_ok());
        }
    }

    #[test]
    fn window_resets_after_ttl() {
        let limiter = KeyedRateLimiter::new(1, Duration::from_millis(10));
        assert!(limiter.check("k").is_ok());
        assert!(limiter.check("k").is_err());
        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.check("k").is_ok());
    }
}
