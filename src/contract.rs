//! FlashArbExecutor contract bindings
//!
//! The executor contract takes the loan, runs every step, and reverts unless
//! the final balance covers principal plus premium. We consume it three ways:
//! calldata encoding for submission, `eth_call` preflight simulation, and
//! event decoding after confirmation.

use alloy::primitives::{aliases::U24, Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;

use crate::evaluator::PlanSimulator;
use crate::step::SwapStep;

sol! {
    #[sol(rpc)]
    interface IFlashArbExecutor {
        struct Step {
            uint8 kind;
            address router;
            address tokenIn;
            address tokenOut;
            uint24 fee;
            bool stable;
            address factory;
            uint256 minAmountOut;
            bytes data;
        }

        function executeArbitrage(address asset, uint256 amount, Step[] calldata steps) external;

        event StepExecuted(
            uint256 indexed index,
            uint8 kind,
            address tokenIn,
            address tokenOut,
            uint256 amountIn,
            uint256 amountOut
        );

        event ArbitrageExecuted(address indexed asset, uint256 amount, uint256 profit);
    }
}

fn to_sol_step(step: &SwapStep) -> IFlashArbExecutor::Step {
    IFlashArbExecutor::Step {
        kind: step.kind as u8,
        router: step.router,
        tokenIn: step.token_in,
        tokenOut: step.token_out,
        fee: U24::from(step.fee),
        stable: step.stable,
        factory: step.factory,
        minAmountOut: step.min_amount_out,
        data: step.calldata.clone(),
    }
}

/// ABI-encode the `executeArbitrage` entry point call.
pub fn encode_execute(asset: Address, amount: U256, steps: &[SwapStep]) -> Bytes {
    let call = IFlashArbExecutor::executeArbitrageCall {
        asset,
        amount,
        steps: steps.iter().map(to_sol_step).collect(),
    };
    call.abi_encode().into()
}

/// Non-mutating preview of a plan through `eth_call` against the executor.
pub struct Preflight<P> {
    provider: P,
    executor: Address,
    caller: Address,
}

impl<P: Provider> Preflight<P> {
    pub fn new(provider: P, executor: Address, caller: Address) -> Self {
        Self {
            provider,
            executor,
            caller,
        }
    }
}

#[async_trait]
impl<P: Provider + Send + Sync> PlanSimulator for Preflight<P> {
    async fn preflight(&self, asset: Address, amount: U256, steps: &[SwapStep]) -> bool {
        let tx = TransactionRequest::default()
            .to(self.executor)
            .from(self.caller)
            .input(encode_execute(asset, amount, steps).into());

        match self.provider.call(tx).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("preflight simulation rejected plan: {}", e);
                false
            }
        }
    }
}

/// Decoded per-step execution event.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub index: u64,
    pub kind: u8,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
}

/// Decoded end-of-arbitrage event.
#[derive(Debug, Clone)]
pub struct ArbOutcome {
    pub asset: Address,
    pub amount: U256,
    pub profit: U256,
}

#[derive(Debug, Clone, Default)]
pub struct DecodedExecution {
    pub steps: Vec<StepOutcome>,
    pub result: Option<ArbOutcome>,
}

/// Pull the executor's events out of a confirmed receipt. Unknown logs
/// (router-internal transfers etc.) are ignored.
pub fn decode_execution(receipt: &TransactionReceipt) -> DecodedExecution {
    let mut decoded = DecodedExecution::default();

    for log in receipt.inner.logs() {
        match log.topic0() {
            Some(t) if *t == IFlashArbExecutor::StepExecuted::SIGNATURE_HASH => {
                if let Ok(ev) = IFlashArbExecutor::StepExecuted::decode_log(&log.inner) {
                    decoded.steps.push(StepOutcome {
                        index: ev.data.index.to::<u64>(),
                        kind: ev.data.kind,
                        token_in: ev.data.tokenIn,
                        token_out: ev.data.tokenOut,
                        amount_in: ev.data.amountIn,
                        amount_out: ev.data.amountOut,
                    });
                }
            }
            Some(t) if *t == IFlashArbExecutor::ArbitrageExecuted::SIGNATURE_HASH => {
                if let Ok(ev) = IFlashArbExecutor::ArbitrageExecuted::decode_log(&log.inner) {
                    decoded.result = Some(ArbOutcome {
                        asset: ev.data.asset,
                        amount: ev.data.amount,
                        profit: ev.data.profit,
                    });
                }
            }
            _ => {}
        }
    }

    decoded.steps.sort_by_key(|s| s.index);
    decoded
}
