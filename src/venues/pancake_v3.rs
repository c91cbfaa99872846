//! PancakeSwap V3 quote source
//!
//! Same QuoterV2 ABI as Uniswap V3, different deployment and tier set
//! (Pancake uses 2500 where Uniswap uses 3000).

use alloy::primitives::Address;
use alloy::providers::Provider;
use async_trait::async_trait;

use super::uniswap_v3::best_tier_quote;
use super::{QuoteSource, VenueId};
use crate::config::contracts::pancake_v3::{FEE_TIERS, QUOTER_V2};
use crate::quote::{Quote, QuoteRequest};

pub struct PancakeV3Source<P> {
    provider: P,
    quoter: Address,
    fee_tiers: Vec<u32>,
}

impl<P: Provider + Clone> PancakeV3Source<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            quoter: QUOTER_V2,
            fee_tiers: FEE_TIERS.to_vec(),
        }
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync> QuoteSource for PancakeV3Source<P> {
    fn venue(&self) -> VenueId {
        VenueId::PancakeV3
    }

    async fn quote(&self, req: &QuoteRequest) -> eyre::Result<Option<Quote>> {
        best_tier_quote(
            &self.provider,
            self.quoter,
            &self.fee_tiers,
            VenueId::PancakeV3,
            req,
        )
        .await
    }
}
