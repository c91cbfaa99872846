//! Token-bucket rate limiting for external HTTP APIs
//!
//! The aggregator API meters requests per second. Every call must acquire a
//! slot before going out; acquisition suspends, it never fails.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

pub struct ApiLimiter {
    inner: DefaultDirectRateLimiter,
}

impl ApiLimiter {
    pub fn per_second(requests: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests.max(1)).expect("non-zero"));
        Self {
            inner: RateLimiter::direct(quota),
        }
    }

    /// Wait until a request slot is available.
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }
}
