//! Step Builder - turns a chosen quote into an executable SwapStep

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{contracts, MAX_STEPS};
use crate::evaluator::StepAssembler;
use crate::quote::Quote;
use crate::venues::odos::OdosClient;
use crate::venues::VenueId;

/// Venue-type tag understood by the executor contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StepKind {
    /// Pre-assembled calldata (aggregator routes)
    Calldata = 0,
    /// Single-pool concentrated-liquidity swap (Uniswap/Pancake V3)
    ConcentratedSingle = 1,
    /// Route-struct AMM swap (Aerodrome)
    RouteStruct = 2,
    /// Address-path AMM swap (V2 style)
    PathAmm = 3,
}

/// One instruction for the executor contract. Fields that are meaningless
/// for a given kind are zeroed; the contract ignores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapStep {
    pub kind: StepKind,
    pub router: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub fee: u32,
    pub stable: bool,
    pub factory: Address,
    pub min_amount_out: U256,
    pub calldata: Bytes,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan is empty")]
    Empty,
    #[error("plan has {0} steps, contract limit is {MAX_STEPS}")]
    TooLong(usize),
    #[error("step {0} input token does not match previous output")]
    BrokenChain(usize),
    #[error("plan does not start at the borrowed asset")]
    WrongEntry,
    #[error("plan does not return to the borrowed asset")]
    WrongExit,
}

/// `floor(amount_out * (1 - slippage))` in pure integer arithmetic.
pub fn apply_slippage(amount_out: U256, slippage_bps: u64) -> U256 {
    let keep = U256::from(10_000u64.saturating_sub(slippage_bps));
    amount_out * keep / U256::from(10_000u64)
}

/// Mirror of the connectivity and length rules the executor contract
/// enforces on-chain. Checked locally so a doomed plan never costs gas.
pub fn validate_plan(asset: Address, steps: &[SwapStep]) -> Result<(), PlanError> {
    if steps.is_empty() {
        return Err(PlanError::Empty);
    }
    if steps.len() > MAX_STEPS {
        return Err(PlanError::TooLong(steps.len()));
    }
    if steps[0].token_in != asset {
        return Err(PlanError::WrongEntry);
    }
    for i in 1..steps.len() {
        if steps[i].token_in != steps[i - 1].token_out {
            return Err(PlanError::BrokenChain(i));
        }
    }
    if steps.last().map(|s| s.token_out) != Some(asset) {
        return Err(PlanError::WrongExit);
    }
    Ok(())
}

pub struct StepBuilder {
    slippage_bps: u64,
    odos: Arc<OdosClient>,
}

impl StepBuilder {
    pub fn new(slippage_bps: u64, odos: Arc<OdosClient>) -> Self {
        Self { slippage_bps, odos }
    }

    fn venue_step(
        &self,
        quote: &Quote,
        token_in: Address,
        token_out: Address,
        min_amount_out: U256,
    ) -> Option<SwapStep> {
        let step = match quote.venue {
            VenueId::UniswapV3 => SwapStep {
                kind: StepKind::ConcentratedSingle,
                router: contracts::uniswap_v3::SWAP_ROUTER,
                token_in,
                token_out,
                fee: quote.fee_tier?,
                stable: false,
                factory: Address::ZERO,
                min_amount_out,
                calldata: Bytes::new(),
            },
            VenueId::PancakeV3 => SwapStep {
                kind: StepKind::ConcentratedSingle,
                router: contracts::pancake_v3::SMART_ROUTER,
                token_in,
                token_out,
                fee: quote.fee_tier?,
                stable: false,
                factory: Address::ZERO,
                min_amount_out,
                calldata: Bytes::new(),
            },
            VenueId::Aerodrome => SwapStep {
                kind: StepKind::RouteStruct,
                router: contracts::aerodrome::ROUTER,
                token_in,
                token_out,
                fee: 0,
                stable: quote.stable?,
                factory: contracts::aerodrome::POOL_FACTORY,
                min_amount_out,
                calldata: Bytes::new(),
            },
            VenueId::SushiV2 => SwapStep {
                kind: StepKind::PathAmm,
                router: contracts::sushi_v2::ROUTER,
                token_in,
                token_out,
                fee: 0,
                stable: false,
                factory: Address::ZERO,
                min_amount_out,
                calldata: Bytes::new(),
            },
            VenueId::Odos => return None,
        };
        Some(step)
    }

    async fn aggregator_step(
        &self,
        quote: &Quote,
        token_in: Address,
        token_out: Address,
        min_amount_out: U256,
    ) -> Option<SwapStep> {
        let route_id = quote.route_id.as_deref()?;

        let assembled = match self.odos.assemble(route_id).await {
            Ok(Some(call)) => call,
            Ok(None) => {
                tracing::debug!("Odos returned no calldata for route {}", route_id);
                return None;
            }
            Err(e) => {
                tracing::debug!("Odos assemble failed: {}", e);
                return None;
            }
        };

        Some(SwapStep {
            kind: StepKind::Calldata,
            router: assembled.to,
            token_in,
            token_out,
            fee: 0,
            stable: false,
            factory: Address::ZERO,
            min_amount_out,
            calldata: assembled.data,
        })
    }
}

#[async_trait]
impl StepAssembler for StepBuilder {
    /// Build the executable step for a chosen quote, or `None` if the quote
    /// cannot be made executable this cycle (the whole path is abandoned).
    async fn build_step(
        &self,
        token_in: Address,
        token_out: Address,
        quote: &Quote,
    ) -> Option<SwapStep> {
        let min_amount_out = apply_slippage(quote.amount_out, self.slippage_bps);

        if quote.venue.is_aggregator() {
            self.aggregator_step(quote, token_in, token_out, min_amount_out)
                .await
        } else {
            self.venue_step(quote, token_in, token_out, min_amount_out)
        }
    }
}
