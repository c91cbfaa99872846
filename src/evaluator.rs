//! Path Evaluator
//!
//! Walks a candidate path hop by hop, chaining realized outputs, and turns
//! profitable, simulation-clean plans into opportunities. Everything network
//! shaped sits behind a trait so the walk itself stays deterministic.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::quote::{Quote, QuoteRequest};
use crate::step::{validate_plan, SwapStep};
use crate::tokens::{ArbPath, TokenBook};

/// Best-of-venues quoting for one hop (the Quote Aggregator).
#[async_trait]
pub trait HopQuoter: Send + Sync {
    async fn best_quote(&self, req: &QuoteRequest) -> Option<Quote>;
}

/// Turns a chosen quote into an executable step (the Step Builder).
#[async_trait]
pub trait StepAssembler: Send + Sync {
    async fn build_step(
        &self,
        token_in: Address,
        token_out: Address,
        quote: &Quote,
    ) -> Option<SwapStep>;
}

/// Non-mutating contract-level preview of a full plan.
#[async_trait]
pub trait PlanSimulator: Send + Sync {
    async fn preflight(&self, asset: Address, amount: U256, steps: &[SwapStep]) -> bool;
}

/// A profitable, simulation-verified execution plan. Consumed once by the
/// orchestrator, never persisted.
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub asset: Address,
    pub borrow_amount: U256,
    pub final_amount: U256,
    pub net_profit: U256,
    pub profit_pct: f64,
    pub steps: Vec<SwapStep>,
    pub route: String,
}

/// Profitability inputs, frozen at startup.
#[derive(Debug, Clone)]
pub struct EvalParams {
    pub asset: Address,
    pub borrow_amount: U256,
    /// Fixed allowance in the borrowed asset's units. Only sound while the
    /// borrowed asset trades 1:1 with the gas token; see DESIGN.md.
    pub gas_cost_allowance: U256,
    pub min_profit: U256,
    pub min_profit_bps: u64,
}

impl From<&Config> for EvalParams {
    fn from(cfg: &Config) -> Self {
        Self {
            asset: cfg.borrow_asset,
            borrow_amount: cfg.borrow_amount,
            gas_cost_allowance: cfg.gas_cost_allowance,
            min_profit: cfg.min_profit,
            min_profit_bps: cfg.min_profit_bps,
        }
    }
}

pub struct PathEvaluator {
    quoter: Arc<dyn HopQuoter>,
    assembler: Arc<dyn StepAssembler>,
    simulator: Arc<dyn PlanSimulator>,
    params: EvalParams,
    book: Arc<TokenBook>,
}

impl PathEvaluator {
    pub fn new(
        quoter: Arc<dyn HopQuoter>,
        assembler: Arc<dyn StepAssembler>,
        simulator: Arc<dyn PlanSimulator>,
        params: EvalParams,
        book: Arc<TokenBook>,
    ) -> Self {
        Self {
            quoter,
            assembler,
            simulator,
            params,
            book,
        }
    }

    /// Evaluate one path end to end. Any missing quote, failed step build,
    /// unprofitable outcome, or rejected simulation yields `None` for this
    /// cycle; there are no partial results.
    pub async fn evaluate(&self, path: &ArbPath) -> Option<Opportunity> {
        if !path.is_valid_cycle(self.params.asset) {
            tracing::warn!("skipping path that is not a valid cycle");
            return None;
        }

        let mut amount = self.params.borrow_amount;
        let mut steps: Vec<SwapStep> = Vec::with_capacity(path.hops.len());
        let mut venues: Vec<String> = Vec::with_capacity(path.hops.len());

        // Hops are strictly sequential: hop k+1's input is hop k's output.
        for hop in &path.hops {
            let mut req = QuoteRequest::new(hop.from, hop.to, amount);
            req.venue_hint = hop.venue;

            let quote = self.quoter.best_quote(&req).await?;
            let step = self.assembler.build_step(hop.from, hop.to, &quote).await?;

            venues.push(match quote.fee_tier {
                Some(fee) => format!("{} {}", quote.venue, fee),
                None => quote.venue.to_string(),
            });
            amount = quote.amount_out;
            steps.push(step);
        }

        let final_amount = amount;
        let round_trip_cost = self.params.borrow_amount + self.params.gas_cost_allowance;
        if final_amount <= round_trip_cost {
            tracing::trace!(
                "path unprofitable: final {} <= borrow {} + gas {}",
                final_amount,
                self.params.borrow_amount,
                self.params.gas_cost_allowance
            );
            return None;
        }

        let net_profit = final_amount - round_trip_cost;
        // Both floors must be strictly exceeded. The relative one is
        // cross-multiplied so sub-bps profits are not lost to flooring.
        if net_profit <= self.params.min_profit {
            return None;
        }
        if net_profit * U256::from(10_000u64)
            <= U256::from(self.params.min_profit_bps) * self.params.borrow_amount
        {
            return None;
        }

        if let Err(e) = validate_plan(self.params.asset, &steps) {
            tracing::error!("built plan failed local validation: {}", e);
            return None;
        }

        // Last line of defense before submission: the contract itself must
        // accept the plan in a non-mutating call.
        if !self
            .simulator
            .preflight(self.params.asset, self.params.borrow_amount, &steps)
            .await
        {
            tracing::debug!("simulation rejected otherwise-profitable plan");
            return None;
        }

        let borrow_u128: u128 = self.params.borrow_amount.try_into().unwrap_or(u128::MAX);
        let net_u128: u128 = net_profit.try_into().unwrap_or(u128::MAX);
        let profit_pct = if borrow_u128 > 0 {
            net_u128 as f64 / borrow_u128 as f64 * 100.0
        } else {
            0.0
        };

        Some(Opportunity {
            asset: self.params.asset,
            borrow_amount: self.params.borrow_amount,
            final_amount,
            net_profit,
            profit_pct,
            steps,
            route: format!("{} [{}]", path.describe(&self.book), venues.join(" / ")),
        })
    }
}
