//! Proactive request pacing for the provider adapter.
//!
//! A small token bucket: up to `requests_per_minute` requests, refilled
//! continuously. Acquired before every REST call so the scanner stays under
//! the provider's request-weight budget instead of reacting to 429s.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug)]
struct BucketState {
    /// Fractional tokens currently available.
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket request pacer.
#[derive(Debug)]
pub struct RequestPacer {
    /// Maximum burst size (full-bucket token count).
    capacity: f64,
    /// Tokens added per second.
    refill_per_sec: f64,
    state: Mutex<BucketState>,
    /// Name for logging.
    name: &'static str,
}

impl RequestPacer {
    /// Create a pacer allowing `requests_per_minute` requests, with a burst
    /// capacity of one second's worth of tokens.
    pub fn new(name: &'static str, requests_per_minute: u32) -> Self {
        let refill_per_sec = f64::from(requests_per_minute.max(1)) / 60.0;
        let capacity = refill_per_sec.ceil().max(1.0);

        Self {
            capacity,
            refill_per_sec,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            name,
        }
    }

    /// Take one token, sleeping until one is available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }

                // Time until one full token accrues.
                (1.0 - state.tokens) / self.refill_per_sec
            };

            debug!(
                pacer = self.name,
                wait_ms = (wait * 1000.0) as u64,
                "Request budget exhausted, waiting"
            );
            tokio::time::sleep(Duration::from_secs_f64(wait.max(0.005))).await;
        }
    }

    /// Tokens currently in the bucket (for tests/monitoring).
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
        state.tokens
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_capacity_is_one_second() {
        let pacer = RequestPacer::new("test", 120);
        assert!((pacer.available().await - 2.0).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_acquire_consumes_tokens() {
        let pacer = RequestPacer::new("test", 6000);
        let before = pacer.available().await;
        pacer.acquire().await;
        let after = pacer.available().await;
        assert!(after < before);
    }

    #[tokio::test]
    async fn test_acquire_waits_and_refills() {
        // 6000 rpm = 100 tokens/sec, so an empty bucket recovers quickly.
        let pacer = RequestPacer::new("test", 6000);
        for _ in 0..200 {
            pacer.acquire().await;
        }
        // Did not deadlock; bucket keeps refilling.
        assert!(pacer.available().await >= 0.0);
    }
}
