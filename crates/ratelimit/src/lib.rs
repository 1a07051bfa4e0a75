//! MuscleMap Rate Limiter Module
//!
//! True sliding-window rate limiting over per-identifier request
//! timestamps, plus token-bucket and fixed-window alternatives and a
//! stateless primitive for callers with their own storage.
//!
//! Compiled to WebAssembly for universal runtime support.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use wasm_bindgen::prelude::*;

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

/// Rate limit check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_seconds: u32,
    pub current_count: u32,
}

/// Evaluate a sliding window against `timestamps` (ms since epoch,
/// ascending) without mutating them — the caller owns storage and decides
/// whether to append `now` on an allowed request.
///
/// `now` is clamped forward to the latest stored timestamp before the
/// window boundary is computed, so a backward clock jump on the host never
/// makes an already-counted request reappear as "in window" twice.
pub fn rate_limit_check(
    timestamps: &[u64],
    max_requests: u32,
    window_seconds: u32,
    now: u64,
) -> RateLimitResult {
    let window_ms = window_seconds as u64 * 1000;
    let effective_now = now.max(timestamps.last().copied().unwrap_or(0));
    let threshold = effective_now.saturating_sub(window_ms);

    let in_window: Vec<u64> = timestamps.iter().copied().filter(|&t| t >= threshold).collect();
    let current_count = in_window.len() as u32;
    let allowed = current_count < max_requests;

    let projected_count = if allowed { current_count + 1 } else { current_count };
    let remaining = max_requests.saturating_sub(projected_count);

    let reset_seconds = in_window
        .first()
        .map(|&oldest| {
            let reset_at = oldest + window_ms;
            reset_at.saturating_sub(effective_now).div_ceil(1000) as u32
        })
        .unwrap_or(0);

    RateLimitResult {
        allowed,
        remaining,
        reset_seconds,
        current_count: projected_count,
    }
}

/// Sliding window rate limiter with per-identifier timestamp storage.
#[wasm_bindgen]
pub struct RateLimiter {
    timestamps: HashMap<String, Vec<u64>>,
    max_requests: u32,
    window_seconds: u32,
}

#[wasm_bindgen]
impl RateLimiter {
    #[wasm_bindgen(constructor)]
    pub fn new(max_requests: u32, window_seconds: u32) -> RateLimiter {
        RateLimiter {
            timestamps: HashMap::new(),
            max_requests,
            window_seconds,
        }
    }

    /// Check and, if allowed, record a request for `id` at the current
    /// time.
    pub fn check(&mut self, id: &str) -> RateLimitResult {
        self.check_at(id, now_ms())
    }

    /// `check`, but with an explicit timestamp — used by tests and native
    /// hosts that supply their own clock.
    pub fn check_at(&mut self, id: &str, now: u64) -> RateLimitResult {
        let entry = self.timestamps.entry(id.to_string()).or_default();
        prune(entry, self.window_seconds, now);

        let result = rate_limit_check(entry, self.max_requests, self.window_seconds, now);
        if result.allowed {
            entry.push(now.max(entry.last().copied().unwrap_or(0)));
        }
        result
    }

    /// Check without recording.
    pub fn peek(&mut self, id: &str) -> RateLimitResult {
        self.peek_at(id, now_ms())
    }

    pub fn peek_at(&mut self, id: &str, now: u64) -> RateLimitResult {
        let entry = self.timestamps.entry(id.to_string()).or_default();
        prune(entry, self.window_seconds, now);
        rate_limit_check(entry, self.max_requests, self.window_seconds, now)
    }

    pub fn reset_id(&mut self, id: &str) {
        self.timestamps.remove(id);
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
    }

    pub fn tracked_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn get_max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn get_window_seconds(&self) -> u32 {
        self.window_seconds
    }

    pub fn set_max_requests(&mut self, max_requests: u32) {
        self.max_requests = max_requests;
    }
}

fn prune(timestamps: &mut Vec<u64>, window_seconds: u32, now: u64) {
    let window_ms = window_seconds as u64 * 1000;
    let effective_now = now.max(timestamps.last().copied().unwrap_or(0));
    let threshold = effective_now.saturating_sub(window_ms);
    timestamps.retain(|&t| t >= threshold);
}

/// Token bucket rate limiter: `capacity` tokens, refilled lazily at
/// `refill_rate` tokens/second.
#[wasm_bindgen]
pub struct TokenBucket {
    refill_rate: f64,
    capacity: f64,
    tokens: f64,
    last_refill_ms: f64,
}

#[wasm_bindgen]
impl TokenBucket {
    #[wasm_bindgen(constructor)]
    pub fn new(refill_rate: f64, capacity: f64) -> TokenBucket {
        TokenBucket {
            refill_rate,
            capacity,
            tokens: capacity,
            last_refill_ms: js_sys::Date::now(),
        }
    }

    pub fn consume(&mut self, count: f64) -> bool {
        self.consume_at(count, js_sys::Date::now())
    }

    /// `consume`, but with an explicit timestamp (ms since epoch) for
    /// tests and native hosts.
    pub fn consume_at(&mut self, count: f64, now_ms: f64) -> bool {
        self.refill_at(now_ms);
        if self.tokens >= count {
            self.tokens -= count;
            true
        } else {
            false
        }
    }

    pub fn get_tokens(&mut self) -> f64 {
        self.refill_at(js_sys::Date::now());
        self.tokens
    }

    fn refill_at(&mut self, now_ms: f64) {
        let elapsed_seconds = ((now_ms - self.last_refill_ms) / 1000.0).max(0.0);
        if elapsed_seconds > 0.0 {
            self.tokens = (self.tokens + elapsed_seconds * self.refill_rate).min(self.capacity);
            self.last_refill_ms = now_ms;
        }
    }

    pub fn reset(&mut self) {
        self.tokens = self.capacity;
        self.last_refill_ms = js_sys::Date::now();
    }
}

/// Fixed window rate limiter: counts reset at the start of each
/// `window_seconds`-wide, epoch-aligned bucket.
#[wasm_bindgen]
pub struct FixedWindowLimiter {
    buckets: HashMap<String, (u64, u32)>,
    max_requests: u32,
    window_seconds: u64,
}

#[wasm_bindgen]
impl FixedWindowLimiter {
    #[wasm_bindgen(constructor)]
    pub fn new(max_requests: u32, window_seconds: u32) -> FixedWindowLimiter {
        FixedWindowLimiter {
            buckets: HashMap::new(),
            max_requests,
            window_seconds: window_seconds.max(1) as u64,
        }
    }

    pub fn check(&mut self, id: &str, count: u32) -> bool {
        self.check_at(id, count, now_ms())
    }

    pub fn check_at(&mut self, id: &str, count: u32, now: u64) -> bool {
        let window_start = now - (now % (self.window_seconds * 1000));
        let entry = self.buckets.entry(id.to_string()).or_insert((window_start, 0));

        if entry.0 != window_start {
            *entry = (window_start, 0);
        }

        if entry.1 + count <= self.max_requests {
            entry.1 += count;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[wasm_bindgen]
pub fn create_rate_limiter(max_requests: u32, window_seconds: u32) -> RateLimiter {
    RateLimiter::new(max_requests, window_seconds)
}

#[wasm_bindgen]
pub fn create_token_bucket(refill_rate: f64, capacity: f64) -> TokenBucket {
    TokenBucket::new(refill_rate, capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stateless_check_basic() {
        let timestamps: Vec<u64> = vec![];
        let result = rate_limit_check(&timestamps, 3, 60, 1_000_000);
        assert!(result.allowed);
        assert_eq!(result.current_count, 1);
        assert_eq!(result.remaining, 2);
        assert_eq!(result.reset_seconds, 0);
    }

    #[test]
    fn test_stateless_check_drops_old_timestamps() {
        let timestamps = vec![0u64, 1000, 2000];
        // window is 1s; now is far enough ahead that all expire
        let result = rate_limit_check(&timestamps, 2, 1, 1_000_000);
        assert!(result.allowed);
        assert_eq!(result.current_count, 1);
    }

    #[test]
    fn test_stateless_check_denies_at_limit() {
        let timestamps = vec![1000u64, 2000, 3000];
        let result = rate_limit_check(&timestamps, 3, 60, 3_500);
        assert!(!result.allowed);
        assert_eq!(result.current_count, 3);
        assert_eq!(result.remaining, 0);
    }

    #[test]
    fn test_rate_limiter_four_calls_at_zero_allows_exactly_three() {
        // max=3, window=60s, four calls at the same instant t=0: the window
        // boundary t >= now - window_ms must keep a timestamp equal to the
        // threshold, not just strictly-newer ones.
        let mut limiter = RateLimiter::new(3, 60);
        let r1 = limiter.check_at("zero", 0);
        let r2 = limiter.check_at("zero", 0);
        let r3 = limiter.check_at("zero", 0);
        let r4 = limiter.check_at("zero", 0);
        assert!(r1.allowed && r2.allowed && r3.allowed);
        assert!(!r4.allowed);
        assert_eq!(
            [r1.remaining, r2.remaining, r3.remaining, r4.remaining],
            [2, 1, 0, 0]
        );
    }

    #[test]
    fn test_rate_limiter_allows_then_denies() {
        let mut limiter = RateLimiter::new(2, 60);
        assert!(limiter.check_at("alice", 1000).allowed);
        assert!(limiter.check_at("alice", 1100).allowed);
        assert!(!limiter.check_at("alice", 1200).allowed);
    }

    #[test]
    fn test_rate_limiter_sliding_window_recovers() {
        let mut limiter = RateLimiter::new(1, 1); // 1 req / 1s
        assert!(limiter.check_at("bob", 0).allowed);
        assert!(!limiter.check_at("bob", 500).allowed);
        assert!(limiter.check_at("bob", 1_001).allowed);
    }

    #[test]
    fn test_rate_limiter_peek_does_not_consume() {
        let mut limiter = RateLimiter::new(1, 60);
        let peeked = limiter.peek_at("carol", 1000);
        assert!(peeked.allowed);
        // still allowed after peek since nothing was recorded
        assert!(limiter.check_at("carol", 1001).allowed);
        assert!(!limiter.check_at("carol", 1002).allowed);
    }

    #[test]
    fn test_rate_limiter_independent_per_id() {
        let mut limiter = RateLimiter::new(1, 60);
        assert!(limiter.check_at("a", 1000).allowed);
        assert!(limiter.check_at("b", 1000).allowed);
    }

    #[test]
    fn test_rate_limiter_clock_regression_does_not_double_count() {
        let mut limiter = RateLimiter::new(1, 60);
        assert!(limiter.check_at("dave", 10_000).allowed);
        // clock jumps backward; must not allow a second request within the
        // already-recorded window
        assert!(!limiter.check_at("dave", 5_000).allowed);
    }

    #[test]
    fn test_token_bucket_consume_and_refill() {
        let mut bucket = TokenBucket::new(1.0, 5.0);
        assert!(bucket.consume_at(5.0, 0.0));
        assert!(!bucket.consume_at(1.0, 0.0));
        assert!(bucket.consume_at(1.0, 1000.0)); // 1s elapsed -> 1 token refilled
    }

    #[test]
    fn test_fixed_window_limiter() {
        let mut limiter = FixedWindowLimiter::new(2, 10);
        assert!(limiter.check_at("eve", 1, 0));
        assert!(limiter.check_at("eve", 1, 1_000));
        assert!(!limiter.check_at("eve", 1, 2_000));
        assert!(limiter.check_at("eve", 1, 11_000)); // new window
    }
}
