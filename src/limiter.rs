//! Rate and concurrency limiting primitives invoked by the flow engine (C3)
//! per matched [`crate::selector::LimiterId`].
//!
//! Both limiters are internally synchronized and safe to share across request
//! threads. The concurrency limiter hands back an RAII guard so a slot is
//! always released on every exit path, including an unwinding panic —
//! the same "no leaked permit" guarantee the original Go implementation gets
//! for free from `defer`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use parking_lot::Mutex as FastMutex;

/// Token-bucket rate limiter. Consumes at most one token per
/// [`RateLimiter::try_acquire`] call; tokens refill continuously at
/// `rate_per_sec`, capped at `burst`.
pub struct RateLimiter {
    state: Mutex<BucketState>,
    rate_per_sec: f64,
    burst: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(rate_per_sec: f64, burst: f64) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
            rate_per_sec,
            burst,
        }
    }

    /// Attempts to consume one token. Returns `true` on success.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let elapsed = now.saturating_duration_since(state.last_refill);
        let refill = elapsed.as_secs_f64() * self.rate_per_sec;
        if refill > 0.0 {
            state.tokens = (state.tokens + refill).min(self.burst);
            state.last_refill = now;
        }
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Concurrency-slot limiter: bounded semaphore with capacity `limit`.
/// [`ConcurrencyLimiter::try_acquire`] either returns a [`ConcurrencyGuard`]
/// that releases the slot on drop, or `None` if the limiter is at capacity.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    state: FastMutex<usize>,
    limit: usize,
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> Self {
        Self {
            state: FastMutex::new(0),
            limit,
        }
    }

    pub fn in_flight(&self) -> usize {
        *self.state.lock()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn try_acquire(self: &std::sync::Arc<Self>) -> Option<ConcurrencyGuard> {
        let mut guard = self.state.lock();
        if *guard >= self.limit {
            return None;
        }
        *guard += 1;
        drop(guard);
        Some(ConcurrencyGuard {
            limiter: self.clone(),
        })
    }

    fn release(&self) {
        let mut guard = self.state.lock();
        *guard = guard.saturating_sub(1);
    }
}

/// Holds one concurrency slot; releases it unconditionally on drop, covering
/// early returns, error returns, and unwinding panics alike.
#[derive(Debug)]
pub struct ConcurrencyGuard {
    limiter: std::sync::Arc<ConcurrencyLimiter>,
}

impl Drop for ConcurrencyGuard {
    fn drop(&mut self) {
        self.limiter.release();
    }
}
