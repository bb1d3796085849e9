use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Token bucket rate limiter for per-source request pacing.
///
/// Allows bursting up to `burst_limit` requests, then enforces the
/// steady-state `requests_per_second` rate.
#[derive(Debug)]
pub struct TokenBucket {
    requests_per_second: f64,
    burst_limit: u32,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    pub fn new(requests_per_second: f64, burst_limit: u32) -> Self {
        Self {
            requests_per_second,
            burst_limit,
            state: Mutex::new(BucketState {
                tokens: burst_limit as f64,
                last_update: Instant::now(),
            }),
        }
    }

    /// Acquire a token, sleeping until one is available.
    ///
    /// The bucket refills continuously at `requests_per_second` up to
    /// `burst_limit`. When empty, the exact deficit is computed and slept
    /// once; the guard is held across the sleep, so concurrent callers for
    /// the same source queue up while other sources stay unaffected.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update).as_secs_f64();
        state.last_update = now;

        state.tokens =
            (state.tokens + elapsed * self.requests_per_second).min(self.burst_limit as f64);

        if state.tokens < 1.0 {
            let wait = (1.0 - state.tokens) / self.requests_per_second;
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
            state.tokens = 0.0;
        } else {
            state.tokens -= 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_is_not_throttled() {
        let bucket = TokenBucket::new(10.0, 3);

        let start = Instant::now();
        for _ in 0..3 {
            bucket.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_second_acquire_waits_about_one_period() {
        let bucket = TokenBucket::new(10.0, 1);

        let start = Instant::now();
        bucket.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));

        let start = Instant::now();
        bucket.acquire().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(50), "waited {:?}", waited);
        assert!(waited <= Duration::from_millis(300), "waited {:?}", waited);
    }

    #[tokio::test]
    async fn test_concurrent_callers_serialize() {
        use std::sync::Arc;

        let bucket = Arc::new(TokenBucket::new(20.0, 1));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let bucket = bucket.clone();
            handles.push(tokio::spawn(async move { bucket.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // one immediate token plus two refills at 20/s
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
