//! Locally tracked sender nonce
//!
//! Fetched from RPC once, then incremented locally per submission so
//! back-to-back transactions never race a stale `eth_getTransactionCount`.
//! A failed broadcast invalidates the cache and the next call re-fetches.

use alloy::primitives::Address;
use alloy::providers::Provider;
use eyre::Result;

pub struct NonceManager {
    address: Address,
    next: Option<u64>,
}

impl NonceManager {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            next: None,
        }
    }

    /// Take the next nonce, fetching from RPC only when the local cache is
    /// cold (startup, or after `invalidate`).
    pub async fn next<P: Provider>(&mut self, provider: &P) -> Result<u64> {
        if self.next.is_none() {
            let fetched = provider.get_transaction_count(self.address).await?;
            tracing::debug!("fetched nonce {} for {}", fetched, self.address);
            self.next = Some(fetched);
        }
        Ok(self.take_cached())
    }

    fn take_cached(&mut self) -> u64 {
        let nonce = self.next.unwrap_or_default();
        self.next = Some(nonce + 1);
        nonce
    }

    /// Drop the cached value. Called when a broadcast fails and the chain's
    /// view of the account may no longer match ours.
    pub fn invalidate(&mut self) {
        self.next = None;
    }

    #[cfg(test)]
    pub fn seed(&mut self, nonce: u64) {
        self.next = Some(nonce);
    }

    #[cfg(test)]
    pub fn is_cold(&self) -> bool {
        self.next.is_none()
    }
}
