//! Requeue delay policies for the work queue.
//!
//! The default controller limiter is the maximum of a per-item exponential
//! backoff and an overall token bucket:
//!
//! | Limiter | Default | Reset |
//! |---------|---------|-------|
//! | [`ItemExponentialFailureRateLimiter`] | 5ms doubling, capped at 1000s | `forget` |
//! | [`BucketRateLimiter`] | 10 qps, burst 100 | never |

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use labelsync_config::QueueSettings;
use parking_lot::Mutex;
use tokio::time::Instant;

/// Decides how long an item waits before it is re-added.
pub trait RateLimiter<T>: Send + Sync {
    /// Delay for the next requeue of `item`. Counts as one attempt.
    fn when(&self, item: &T) -> Duration;

    /// Stop tracking `item`, resetting its backoff.
    fn forget(&self, item: &T);

    /// Number of failed attempts recorded for `item`.
    fn num_requeues(&self, item: &T) -> u32;
}

// ============================================================================
// Per-item exponential backoff
// ============================================================================

/// Exponential backoff per item: `base * 2^failures`, capped at `max`.
#[derive(Debug)]
pub struct ItemExponentialFailureRateLimiter<T> {
    failures: Mutex<HashMap<T, u32>>,
    base: Duration,
    max: Duration,
}

impl<T: Eq + Hash + Clone> ItemExponentialFailureRateLimiter<T> {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            base,
            max,
        }
    }
}

impl<T: Eq + Hash + Clone + Send + Sync> RateLimiter<T> for ItemExponentialFailureRateLimiter<T> {
    fn when(&self, item: &T) -> Duration {
        let exp = {
            let mut failures = self.failures.lock();
            let count = failures.entry(item.clone()).or_insert(0);
            let exp = *count;
            *count = count.saturating_add(1);
            exp
        };

        // 2^63 seconds overflows Duration anyway; clamp before computing.
        let backoff = self.base.as_secs_f64() * 2f64.powi(exp.min(63) as i32);
        if backoff >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::from_secs_f64(backoff)
    }

    fn forget(&self, item: &T) {
        self.failures.lock().remove(item);
    }

    fn num_requeues(&self, item: &T) -> u32 {
        self.failures.lock().get(item).copied().unwrap_or(0)
    }
}

// ============================================================================
// Overall token bucket
// ============================================================================

/// Token bucket shared by every item.
///
/// Tokens refill at `qps` per second up to `burst`. Each call to `when`
/// reserves one token; once the bucket is empty the reservation succeeds in
/// the future and the returned delay is the time until then.
#[derive(Debug)]
pub struct BucketRateLimiter {
    state: Mutex<BucketState>,
    qps: f64,
    burst: f64,
}

#[derive(Debug)]
struct BucketState {
    /// May go negative: outstanding reservations not yet covered by refill.
    tokens: f64,
    last_refill: Instant,
}

impl BucketRateLimiter {
    pub fn new(qps: f64, burst: u32) -> Self {
        let burst = f64::from(burst);
        Self {
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
            qps,
            burst,
        }
    }

    fn reserve(&self) -> Duration {
        let mut state = self.state.lock();

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.qps).min(self.burst);
        state.last_refill = now;

        state.tokens -= 1.0;
        if state.tokens >= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(-state.tokens / self.qps)
    }
}

impl<T> RateLimiter<T> for BucketRateLimiter {
    fn when(&self, _item: &T) -> Duration {
        self.reserve()
    }

    fn forget(&self, _item: &T) {}

    fn num_requeues(&self, _item: &T) -> u32 {
        0
    }
}

// ============================================================================
// Composition
// ============================================================================

/// Uses the longest delay of all inner limiters.
pub struct MaxOfRateLimiter<T> {
    limiters: Vec<Box<dyn RateLimiter<T>>>,
}

impl<T> MaxOfRateLimiter<T> {
    pub fn new(limiters: Vec<Box<dyn RateLimiter<T>>>) -> Self {
        Self { limiters }
    }
}

impl<T> RateLimiter<T> for MaxOfRateLimiter<T> {
    fn when(&self, item: &T) -> Duration {
        self.limiters
            .iter()
            .map(|limiter| limiter.when(item))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn forget(&self, item: &T) {
        for limiter in &self.limiters {
            limiter.forget(item);
        }
    }

    fn num_requeues(&self, item: &T) -> u32 {
        self.limiters
            .iter()
            .map(|limiter| limiter.num_requeues(item))
            .max()
            .unwrap_or(0)
    }
}

/// Per-item exponential backoff combined with the overall token bucket.
pub fn default_controller_rate_limiter<T>(settings: &QueueSettings) -> MaxOfRateLimiter<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    MaxOfRateLimiter::new(vec![
        Box::new(ItemExponentialFailureRateLimiter::new(
            settings.base_delay(),
            settings.max_delay(),
        )),
        Box::new(BucketRateLimiter::new(settings.qps, settings.burst)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_doubles_and_caps() {
        let limiter = ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(5),
            Duration::from_millis(30),
        );
        let key = "org-b|c1".to_string();

        assert_eq!(limiter.when(&key), Duration::from_millis(5));
        assert_eq!(limiter.when(&key), Duration::from_millis(10));
        assert_eq!(limiter.when(&key), Duration::from_millis(20));
        assert_eq!(limiter.when(&key), Duration::from_millis(30));
        assert_eq!(limiter.when(&key), Duration::from_millis(30));
        assert_eq!(limiter.num_requeues(&key), 5);

        // Other keys have their own count
        assert_eq!(limiter.when(&"org-c|c2".to_string()), Duration::from_millis(5));
    }

    #[test]
    fn test_forget_resets_backoff() {
        let limiter = ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(5),
            Duration::from_secs(1000),
        );
        let key = "org-b|c1".to_string();
        limiter.when(&key);
        limiter.when(&key);
        limiter.forget(&key);
        assert_eq!(limiter.num_requeues(&key), 0);
        assert_eq!(limiter.when(&key), Duration::from_millis(5));
    }

    #[test]
    fn test_exponential_backoff_survives_huge_counts() {
        let limiter = ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(5),
            Duration::from_secs(1000),
        );
        let key = 1u32;
        for _ in 0..200 {
            limiter.when(&key);
        }
        assert_eq!(limiter.when(&key), Duration::from_secs(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_delays_past_burst() {
        let limiter = BucketRateLimiter::new(10.0, 2);
        assert_eq!(RateLimiter::<u32>::when(&limiter, &1), Duration::ZERO);
        assert_eq!(RateLimiter::<u32>::when(&limiter, &2), Duration::ZERO);

        // Bucket empty: each further reservation is one refill interval later
        let third = RateLimiter::<u32>::when(&limiter, &3);
        let fourth = RateLimiter::<u32>::when(&limiter, &4);
        assert_eq!(third, Duration::from_millis(100));
        assert_eq!(fourth, Duration::from_millis(200));

        // Refill covers the outstanding reservations
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(RateLimiter::<u32>::when(&limiter, &5), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_of_picks_longest_delay() {
        let limiter = default_controller_rate_limiter::<String>(&QueueSettings {
            base_delay_ms: 5,
            max_delay_ms: 1_000_000,
            qps: 10.0,
            burst: 1,
        });
        let key = "org-b|c1".to_string();

        // First call: bucket has a token, backoff is 5ms
        assert_eq!(limiter.when(&key), Duration::from_millis(5));
        // Second call: bucket is empty (100ms), backoff is 10ms
        assert_eq!(limiter.when(&key), Duration::from_millis(100));
        assert_eq!(limiter.num_requeues(&key), 2);

        limiter.forget(&key);
        assert_eq!(limiter.num_requeues(&key), 0);
    }
}
