//! Call throttling for the completion service.
//!
//! Epistemic foundation:
//! - K_i: Every attempt is followed by a fixed, configured pause
//! - K_i: 429 responses carry an optional Retry-After header
//! - B_i: Provider quotas are unknown until the provider refuses a call
//! - I^B: Repeated 429s → exponential backoff capped at 60s

use reqwest::header::HeaderMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Cap for any backoff wait, 429 or transient retry.
pub const MAX_BACKOFF_SECS: f64 = 60.0;

/// Throttle shared by everything that calls the completion service.
///
/// Two mechanisms:
/// - a fixed pause after each attempt ([`RateLimiter::pause_after_attempt`])
/// - an adaptive backoff window opened by 429 responses
///   ([`RateLimiter::wait_if_needed`])
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    consecutive_429s: AtomicU32,
    backoff_until: Mutex<Option<Instant>>,
    total_attempts: AtomicU64,
    total_429s: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl RateLimiter {
    /// Create a limiter pausing `delay` after every attempt.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            consecutive_429s: AtomicU32::new(0),
            backoff_until: Mutex::new(None),
            total_attempts: AtomicU64::new(0),
            total_429s: AtomicU64::new(0),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    /// Create a limiter from a delay in (possibly fractional) seconds.
    ///
    /// Negative, non-finite or unrepresentable values are treated as zero;
    /// config validation rejects them before this point.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self::new(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
    }

    /// The fixed inter-call delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Pause after an attempt, regardless of its outcome.
    pub async fn pause_after_attempt(&self) {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
        if self.delay > Duration::ZERO {
            self.total_wait_ms
                .fetch_add(self.delay.as_millis() as u64, Ordering::Relaxed);
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Wait out any open 429 backoff window. Returns the duration waited.
    pub async fn wait_if_needed(&self) -> Duration {
        let wait = {
            let guard = self.backoff_until.lock().unwrap_or_else(|e| e.into_inner());
            guard
                .map(|until| until.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::ZERO)
        };

        if wait > Duration::ZERO {
            debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate limit backoff");
            self.total_wait_ms
                .fetch_add(wait.as_millis() as u64, Ordering::Relaxed);
            tokio::time::sleep(wait).await;
        }

        wait
    }

    /// Record the status of a completed HTTP exchange.
    pub fn record_response(&self, status: u16, headers: &HeaderMap) {
        if status == 429 {
            self.total_429s.fetch_add(1, Ordering::Relaxed);
            let consecutive = self.consecutive_429s.fetch_add(1, Ordering::Relaxed) + 1;
            let backoff_secs = retry_after_secs(headers)
                .unwrap_or_else(|| 2.0_f64.powi(consecutive as i32))
                .min(MAX_BACKOFF_SECS);

            let mut guard = self.backoff_until.lock().unwrap_or_else(|e| e.into_inner());
            *guard = Some(Instant::now() + Duration::from_secs_f64(backoff_secs));

            warn!(
                consecutive_429s = consecutive,
                backoff_secs = backoff_secs,
                "Rate limited (429), backing off"
            );
        } else if status < 400 && self.consecutive_429s.swap(0, Ordering::Relaxed) > 0 {
            let mut guard = self.backoff_until.lock().unwrap_or_else(|e| e.into_inner());
            *guard = None;
        }
    }

    /// Get statistics.
    pub fn stats(&self) -> RateLimiterStats {
        let total_attempts = self.total_attempts.load(Ordering::Relaxed);
        let total_429s = self.total_429s.load(Ordering::Relaxed);

        RateLimiterStats {
            total_attempts,
            total_429s,
            total_wait_secs: self.total_wait_ms.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }
}

/// Parse a numeric Retry-After header (seconds).
pub(crate) fn retry_after_secs(headers: &HeaderMap) -> Option<f64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
}

/// Rate limiter statistics.
#[derive(Debug, Clone)]
pub struct RateLimiterStats {
    pub total_attempts: u64,
    pub total_429s: u64,
    pub total_wait_secs: f64,
}
