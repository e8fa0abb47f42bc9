/// Login throttling
///
/// Token bucket per username, kept in process memory. Each login attempt
/// consumes one token; the bucket holds 5 tokens and regains one every 12
/// seconds, so sustained guessing is limited to 5 attempts per minute.
///
/// A successful login refills the bucket.
///
/// # Example
///
/// ```
/// use clubdesk_api::middleware::rate_limit::LoginThrottle;
///
/// let throttle = LoginThrottle::default();
/// for _ in 0..5 {
///     assert!(throttle.check("admin").is_ok());
/// }
/// assert!(throttle.check("admin").is_err());
/// assert!(throttle.check("teacher").is_ok());
/// ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::ApiError;

/// Attempts allowed in a burst
pub const LOGIN_BUCKET_CAPACITY: u32 = 5;

/// Time to regain one attempt
pub const LOGIN_REFILL_INTERVAL: Duration = Duration::from_secs(12);

/// Buckets idle this long are dropped on the next sweep
const IDLE_EVICTION: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        TokenBucket {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    /// Refills tokens based on elapsed time
    fn refill(&mut self, rate_per_sec: f64, capacity: u32, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate_per_sec).min(capacity as f64);
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Seconds until one token is available
    fn seconds_until_available(&self, rate_per_sec: f64) -> u64 {
        let deficit = 1.0 - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate_per_sec).ceil() as u64
        }
    }
}

/// Per-username login attempt limiter
#[derive(Debug)]
pub struct LoginThrottle {
    capacity: u32,
    refill_interval: Duration,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new(LOGIN_BUCKET_CAPACITY, LOGIN_REFILL_INTERVAL)
    }
}

impl LoginThrottle {
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            refill_interval,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn rate_per_sec(&self) -> f64 {
        1.0 / self.refill_interval.as_secs_f64().max(f64::EPSILON)
    }

    /// Consumes one attempt for `username`
    ///
    /// # Errors
    ///
    /// `RateLimitExceeded` with the seconds to wait when the bucket is empty.
    pub fn check(&self, username: &str) -> Result<(), ApiError> {
        self.check_at(username, Instant::now())
    }

    fn check_at(&self, username: &str, now: Instant) -> Result<(), ApiError> {
        let key = username.trim().to_lowercase();
        let rate = self.rate_per_sec();
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());

        if buckets.len() > 1024 {
            buckets.retain(|_, b| now.saturating_duration_since(b.last_refill) < IDLE_EVICTION);
        }

        let bucket = buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::new(self.capacity, now));
        bucket.refill(rate, self.capacity, now);

        if bucket.try_consume() {
            return Ok(());
        }

        let retry_after = bucket.seconds_until_available(rate).max(1);
        tracing::warn!(username = %username, retry_after, "Login attempts throttled");

        Err(ApiError::RateLimitExceeded {
            retry_after,
            message: format!(
                "Too many login attempts. Try again in {} seconds",
                retry_after
            ),
        })
    }

    /// Forgets the attempts of `username` after a successful login
    pub fn reset(&self, username: &str) {
        let key = username.trim().to_lowercase();
        self.buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key);
    }
}
