//! Global query rate limiting.
//!
//! A token bucket caps the aggregate query rate across all workers. The
//! bucket starts full and allows a burst of one tenth of the steady rate,
//! which smooths over worker-scheduling jitter without letting idle periods
//! accumulate credit.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_QPS;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared token-bucket limiter for DNS query dispatch.
///
/// One instance is shared by every worker, so the configured rate is the
/// aggregate budget for the whole process.
pub struct QueryRateLimiter {
    limiter: RwLock<Arc<DirectLimiter>>,
    qps: AtomicU32,
}

impl QueryRateLimiter {
    /// Creates a limiter targeting `qps` queries per second.
    ///
    /// A zero rate falls back to the default. Burst capacity is
    /// `max(1, qps / 10)` and the bucket starts full.
    pub fn new(qps: u32) -> Self {
        let qps = normalize_qps(qps);
        QueryRateLimiter {
            limiter: RwLock::new(Arc::new(build_limiter(qps))),
            qps: AtomicU32::new(qps),
        }
    }

    /// Blocks until a token is available or `cancel` fires.
    ///
    /// Returns `true` when a token was acquired, `false` when the wait was
    /// cancelled.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let limiter = {
            let guard = self.limiter.read().expect("rate limiter lock poisoned");
            Arc::clone(&guard)
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = limiter.until_ready() => true,
        }
    }

    /// Non-blocking probe: takes a token if one is available.
    pub fn try_acquire(&self) -> bool {
        let guard = self.limiter.read().expect("rate limiter lock poisoned");
        guard.check().is_ok()
    }

    /// Atomically replaces the target rate.
    ///
    /// The replacement bucket starts full at the new burst capacity; waiters
    /// blocked on the old bucket finish their wait against the old rate.
    pub fn reconfigure(&self, qps: u32) {
        let qps = normalize_qps(qps);
        let mut guard = self.limiter.write().expect("rate limiter lock poisoned");
        *guard = Arc::new(build_limiter(qps));
        self.qps.store(qps, Ordering::SeqCst);
    }

    /// Current target rate in queries per second.
    pub fn qps(&self) -> u32 {
        self.qps.load(Ordering::SeqCst)
    }

    /// Burst capacity for the current rate.
    pub fn burst(&self) -> u32 {
        burst_for(self.qps())
    }
}

fn normalize_qps(qps: u32) -> u32 {
    if qps == 0 {
        DEFAULT_QPS
    } else {
        qps
    }
}

fn burst_for(qps: u32) -> u32 {
    (qps / 10).max(1)
}

fn build_limiter(qps: u32) -> DirectLimiter {
    let rate = NonZeroU32::new(qps).expect("qps normalized to non-zero");
    let burst = NonZeroU32::new(burst_for(qps)).expect("burst is at least one");
    RateLimiter::direct(Quota::per_second(rate).allow_burst(burst))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn zero_qps_falls_back_to_default() {
        let limiter = QueryRateLimiter::new(0);
        assert_eq!(limiter.qps(), DEFAULT_QPS);
    }

    #[test]
    fn burst_is_tenth_of_rate_with_floor_of_one() {
        assert_eq!(QueryRateLimiter::new(100).burst(), 10);
        assert_eq!(QueryRateLimiter::new(5).burst(), 1);
        assert_eq!(QueryRateLimiter::new(1000).burst(), 100);
    }

    #[test]
    fn try_acquire_honors_burst_capacity() {
        let limiter = QueryRateLimiter::new(100);
        // Bucket starts full with 10 tokens; the 11th immediate probe fails.
        for _ in 0..10 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn reconfigure_replaces_the_rate() {
        let limiter = QueryRateLimiter::new(100);
        limiter.reconfigure(40);
        assert_eq!(limiter.qps(), 40);
        assert_eq!(limiter.burst(), 4);

        limiter.reconfigure(0);
        assert_eq!(limiter.qps(), DEFAULT_QPS);
    }

    #[tokio::test]
    async fn wait_acquires_from_a_full_bucket() {
        let limiter = QueryRateLimiter::new(100);
        let cancel = CancellationToken::new();
        assert!(limiter.wait(&cancel).await);
    }

    #[tokio::test]
    async fn wait_observes_cancellation() {
        let limiter = QueryRateLimiter::new(10);
        // Drain the bucket so the next wait actually blocks.
        while limiter.try_acquire() {}

        let cancel = CancellationToken::new();
        cancel.cancel();
        let acquired = tokio::time::timeout(Duration::from_millis(200), limiter.wait(&cancel))
            .await
            .expect("cancelled wait must return promptly");
        assert!(!acquired);
    }

    #[tokio::test]
    async fn tokens_replenish_over_time() {
        let limiter = QueryRateLimiter::new(1000);
        while limiter.try_acquire() {}

        tokio::time::sleep(Duration::from_millis(50)).await;
        // 1000 qps replenishes a token every millisecond.
        assert!(limiter.try_acquire());
    }
}
