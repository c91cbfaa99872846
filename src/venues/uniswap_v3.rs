//! Uniswap V3 quote source
//!
//! Prices a single hop through QuoterV2 across every configured fee tier and
//! keeps the best output, remembering which tier produced it.

use alloy::primitives::{
    aliases::{U160, U24},
    Address, U256,
};
use alloy::providers::Provider;
use alloy::sol;
use async_trait::async_trait;
use futures::future::join_all;

use super::{QuoteSource, VenueId};
use crate::config::contracts::uniswap_v3::{FEE_TIERS, QUOTER_V2};
use crate::quote::{Quote, QuoteRequest};

sol! {
    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params)
            external
            returns (
                uint256 amountOut,
                uint160 sqrtPriceX96After,
                uint32 initializedTicksCrossed,
                uint256 gasEstimate
            );
    }
}

pub struct UniswapV3Source<P> {
    provider: P,
    quoter: Address,
    fee_tiers: Vec<u32>,
}

impl<P: Provider + Clone> UniswapV3Source<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            quoter: QUOTER_V2,
            fee_tiers: FEE_TIERS.to_vec(),
        }
    }
}

/// Query one fee tier through a V3-style QuoterV2. Shared with the
/// PancakeSwap source, which speaks the same quoter ABI.
pub(super) async fn quote_single_tier<P: Provider + Clone>(
    provider: &P,
    quoter: Address,
    req: &QuoteRequest,
    fee: u32,
) -> eyre::Result<U256> {
    let quoter = IQuoterV2::new(quoter, provider.clone());

    let params = IQuoterV2::QuoteExactInputSingleParams {
        tokenIn: req.token_in,
        tokenOut: req.token_out,
        amountIn: req.amount_in,
        fee: U24::from(fee),
        sqrtPriceLimitX96: U160::ZERO, // No price limit
    };

    let result = quoter.quoteExactInputSingle(params).call().await?;
    Ok(result.amountOut)
}

/// Fan out over the fee tiers once and keep the maximum output. Per-tier
/// failures (usually "pool does not exist") only drop that tier. Ties go to
/// the earlier tier in `fee_tiers` order.
pub(super) async fn best_tier_quote<P: Provider + Clone>(
    provider: &P,
    quoter: Address,
    fee_tiers: &[u32],
    venue: VenueId,
    req: &QuoteRequest,
) -> eyre::Result<Option<Quote>> {
    let futures = fee_tiers
        .iter()
        .map(|&fee| async move { (fee, quote_single_tier(provider, quoter, req, fee).await) });

    let mut best: Option<(u32, U256)> = None;
    for (fee, result) in join_all(futures).await {
        match result {
            Ok(amount_out) if !amount_out.is_zero() => match best {
                Some((_, current)) if amount_out <= current => {}
                _ => best = Some((fee, amount_out)),
            },
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("{} tier {} quote failed: {}", venue, fee, e);
            }
        }
    }

    Ok(best.map(|(fee, amount_out)| Quote {
        venue,
        amount_out,
        fee_tier: Some(fee),
        stable: None,
        route_id: None,
    }))
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync> QuoteSource for UniswapV3Source<P> {
    fn venue(&self) -> VenueId {
        VenueId::UniswapV3
    }

    async fn quote(&self, req: &QuoteRequest) -> eyre::Result<Option<Quote>> {
        best_tier_quote(
            &self.provider,
            self.quoter,
            &self.fee_tiers,
            VenueId::UniswapV3,
            req,
        )
        .await
    }
}
