//! SushiSwap V2 quote source
//!
//! Classic constant-product router: `getAmountsOut` over an address path.

use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::sol;
use async_trait::async_trait;

use super::{QuoteSource, VenueId};
use crate::config::contracts::sushi_v2::ROUTER;
use crate::quote::{Quote, QuoteRequest};

sol! {
    #[sol(rpc)]
    interface IUniswapV2Router {
        function getAmountsOut(uint256 amountIn, address[] calldata path)
            external view returns (uint256[] memory amounts);
    }
}

pub struct SushiV2Source<P> {
    provider: P,
    router: Address,
}

impl<P: Provider + Clone> SushiV2Source<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            router: ROUTER,
        }
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync> QuoteSource for SushiV2Source<P> {
    fn venue(&self) -> VenueId {
        VenueId::SushiV2
    }

    async fn quote(&self, req: &QuoteRequest) -> eyre::Result<Option<Quote>> {
        let router = IUniswapV2Router::new(self.router, self.provider.clone());

        let amounts = router
            .getAmountsOut(req.amount_in, vec![req.token_in, req.token_out])
            .call()
            .await?;

        let amount_out = amounts
            .last()
            .copied()
            .ok_or_else(|| eyre::eyre!("empty amounts from V2 router"))?;

        if amount_out.is_zero() {
            return Ok(None);
        }

        Ok(Some(Quote::venue_quote(VenueId::SushiV2, amount_out)))
    }
}
