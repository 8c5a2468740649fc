//! Global request rate limiting.
//!
//! Per-worker pacing bounds each worker; this token bucket bounds the sum of
//! all workers hitting the target when an explicit requests-per-second cap is
//! configured.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// A shared requests-per-second limiter.
///
/// Cloning is cheap and every clone draws from the same bucket.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<GovLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    rate: NonZeroU32,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` requests per second.
    ///
    /// Returns `None` for a rate of 0, which means unlimited.
    pub fn per_second(rate: u32) -> Option<Self> {
        let rate = NonZeroU32::new(rate)?;
        let quota = Quota::per_second(rate).allow_burst(NonZeroU32::MIN);

        Some(Self {
            limiter: Arc::new(GovLimiter::direct(quota)),
            rate,
        })
    }

    /// Wait until the next request may be sent.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to take a token without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Configured requests per second.
    pub fn rate(&self) -> u32 {
        self.rate.get()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_is_unlimited() {
        assert!(RateLimiter::per_second(0).is_none());
    }

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::per_second(10).unwrap();
        assert_eq!(limiter.rate(), 10);
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_clones_share_bucket() {
        let limiter = RateLimiter::per_second(1).unwrap();
        let clone = limiter.clone();

        assert!(limiter.try_acquire());
        // Burst of one: the clone sees the bucket already drained.
        assert!(!clone.try_acquire());
    }

    #[test]
    fn test_wait_completes() {
        let limiter = RateLimiter::per_second(1000).unwrap();
        tokio_test::block_on(async {
            limiter.wait().await;
            limiter.wait().await;
        });
    }
}
