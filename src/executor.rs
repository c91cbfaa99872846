//! Execution Orchestrator
//!
//! Takes one opportunity from scan to settled transaction: gas estimation
//! with a safety buffer, a hard gas-price ceiling, locally tracked nonces,
//! submission, and confirmation (through the preconfirmation RPC when one
//! is configured, with ~200ms flashblock latency instead of 2s blocks).

use alloy::primitives::{Address, TxHash};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::{TransactionInput, TransactionReceipt, TransactionRequest};
use eyre::Result;
use tokio::time::{interval, timeout, Duration};

use crate::config::Config;
use crate::contract::{decode_execution, encode_execute, DecodedExecution};
use crate::evaluator::Opportunity;
use crate::nonce::NonceManager;

/// Buffer applied on top of `eth_estimateGas`; flash-loan callbacks touch
/// several pools and estimates run hot-path dependent.
const GAS_BUFFER_PERCENT: u64 = 30;
/// Used when estimation itself fails. Sized for a 4-step plan.
const FALLBACK_GAS_LIMIT: u64 = 1_200_000;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);
const PRECONF_POLL: Duration = Duration::from_millis(50);
const STANDARD_POLL: Duration = Duration::from_millis(200);

fn buffered_gas_limit(estimate: u64) -> u64 {
    estimate * (100 + GAS_BUFFER_PERCENT) / 100
}

/// Terminal state of one execution attempt.
#[derive(Debug)]
pub enum ExecutionOutcome {
    Confirmed {
        tx_hash: TxHash,
        gas_used: u64,
        effective_gas_price: u128,
        decoded: DecodedExecution,
        preconfirmed: bool,
        elapsed_ms: u128,
    },
    Reverted {
        tx_hash: TxHash,
        gas_used: u64,
    },
    /// Current base fee exceeded the configured ceiling; nothing was sent.
    SkippedGasPrice {
        current_wei: u128,
        ceiling_wei: u128,
    },
    BroadcastFailed {
        reason: String,
    },
    ConfirmationTimeout {
        tx_hash: TxHash,
    },
}

pub struct ExecutionOrchestrator<P> {
    provider: P,
    /// Flashblocks-aware endpoint; receipts land here ~200ms after
    /// inclusion in a preconfirmation.
    preconf: Option<DynProvider>,
    executor: Address,
    sender: Address,
    max_fee_ceiling_wei: u128,
    nonce: NonceManager,
}

impl<P: Provider + Clone> ExecutionOrchestrator<P> {
    pub fn new(provider: P, preconf: Option<DynProvider>, cfg: &Config, sender: Address) -> Self {
        Self {
            provider,
            preconf,
            executor: cfg.executor_address,
            sender,
            max_fee_ceiling_wei: cfg.max_gas_price,
            nonce: NonceManager::new(sender),
        }
    }

    /// Run one opportunity to a terminal outcome. Only infrastructure-level
    /// failures (RPC down for nonce fetch) surface as `Err`; everything the
    /// chain can tell us becomes an `ExecutionOutcome`.
    pub async fn execute(&mut self, opp: &Opportunity) -> Result<ExecutionOutcome> {
        let started = std::time::Instant::now();

        let fees = self.provider.estimate_eip1559_fees().await?;
        if fees.max_fee_per_gas > self.max_fee_ceiling_wei {
            tracing::warn!(
                "gas price {} wei above ceiling {} wei, skipping execution",
                fees.max_fee_per_gas,
                self.max_fee_ceiling_wei
            );
            return Ok(ExecutionOutcome::SkippedGasPrice {
                current_wei: fees.max_fee_per_gas,
                ceiling_wei: self.max_fee_ceiling_wei,
            });
        }

        let calldata = encode_execute(opp.asset, opp.borrow_amount, &opp.steps);

        let estimate_tx = TransactionRequest::default()
            .to(self.executor)
            .from(self.sender)
            .input(TransactionInput::new(calldata.clone()));

        let gas_limit = match self.provider.estimate_gas(estimate_tx).await {
            Ok(estimated) => buffered_gas_limit(estimated),
            Err(e) => {
                tracing::warn!(
                    "gas estimation failed ({}), using fallback {}",
                    e,
                    FALLBACK_GAS_LIMIT
                );
                FALLBACK_GAS_LIMIT
            }
        };

        let nonce = self.nonce.next(&self.provider).await?;

        let tx = TransactionRequest::default()
            .to(self.executor)
            .from(self.sender)
            .input(TransactionInput::new(calldata))
            .gas_limit(gas_limit)
            .nonce(nonce)
            .max_fee_per_gas(fees.max_fee_per_gas)
            .max_priority_fee_per_gas(fees.max_priority_fee_per_gas);

        tracing::info!(
            "submitting {} (nonce {}, gas limit {}): expected profit {} wei",
            opp.route,
            nonce,
            gas_limit,
            opp.net_profit
        );

        let pending = match timeout(SEND_TIMEOUT, self.provider.send_transaction(tx)).await {
            Ok(Ok(pending)) => pending,
            Ok(Err(e)) => {
                self.nonce.invalidate();
                return Ok(ExecutionOutcome::BroadcastFailed {
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                self.nonce.invalidate();
                return Ok(ExecutionOutcome::BroadcastFailed {
                    reason: "send timeout".into(),
                });
            }
        };

        let tx_hash = *pending.tx_hash();
        tracing::info!("sent {:?}", tx_hash);

        let (receipt, preconfirmed) = match self.wait_for_receipt(tx_hash).await {
            Some(r) => r,
            None => {
                // Inclusion unknown; the account's chain state may or may
                // not have advanced.
                self.nonce.invalidate();
                return Ok(ExecutionOutcome::ConfirmationTimeout { tx_hash });
            }
        };

        if !receipt.status() {
            return Ok(ExecutionOutcome::Reverted {
                tx_hash,
                gas_used: receipt.gas_used,
            });
        }

        Ok(ExecutionOutcome::Confirmed {
            tx_hash,
            gas_used: receipt.gas_used,
            effective_gas_price: receipt.effective_gas_price,
            decoded: decode_execution(&receipt),
            preconfirmed,
            elapsed_ms: started.elapsed().as_millis(),
        })
    }

    /// Poll for the receipt, preferring the preconfirmation endpoint. A
    /// failing preconf RPC degrades to the standard endpoint so a flaky
    /// feed cannot strand a landed transaction. The returned flag says
    /// which endpoint actually served the receipt.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Option<(TransactionReceipt, bool)> {
        timeout(CONFIRM_TIMEOUT, async {
            if let Some(preconf) = &self.preconf {
                let mut poll = interval(PRECONF_POLL);
                loop {
                    poll.tick().await;
                    match preconf.get_transaction_receipt(tx_hash).await {
                        Ok(Some(receipt)) => return (receipt, true),
                        Ok(None) => {}
                        Err(e) => {
                            tracing::debug!("preconf receipt poll failed: {}", e);
                            break;
                        }
                    }
                }
            }

            let mut poll = interval(STANDARD_POLL);
            loop {
                poll.tick().await;
                if let Ok(Some(receipt)) = self.provider.get_transaction_receipt(tx_hash).await {
                    return (receipt, false);
                }
            }
        })
        .await
        .ok()
    }
}

/// One-line settlement summary plus per-step fills at debug level.
pub fn report(opp: &Opportunity, outcome: &ExecutionOutcome) {
    match outcome {
        ExecutionOutcome::Confirmed {
            tx_hash,
            gas_used,
            effective_gas_price,
            decoded,
            preconfirmed,
            elapsed_ms,
        } => {
            let realized = decoded
                .result
                .as_ref()
                .map(|r| r.profit.to_string())
                .unwrap_or_else(|| "unknown".into());
            tracing::info!(
                "CONFIRMED {:?} in {}ms{}: profit {} wei (expected {}), gas {} @ {} wei",
                tx_hash,
                elapsed_ms,
                if *preconfirmed { " (preconf)" } else { "" },
                realized,
                opp.net_profit,
                gas_used,
                effective_gas_price
            );
            for step in &decoded.steps {
                tracing::debug!(
                    "  step {}: {} -> {} filled {} for {}",
                    step.index,
                    step.token_in,
                    step.token_out,
                    step.amount_in,
                    step.amount_out
                );
            }
        }
        ExecutionOutcome::Reverted { tx_hash, gas_used } => {
            tracing::warn!("REVERTED {:?}, gas burned {}", tx_hash, gas_used);
        }
        ExecutionOutcome::SkippedGasPrice {
            current_wei,
            ceiling_wei,
        } => {
            tracing::info!(
                "skipped {}: gas {} wei over ceiling {} wei",
                opp.route,
                current_wei,
                ceiling_wei
            );
        }
        ExecutionOutcome::BroadcastFailed { reason } => {
            tracing::warn!("broadcast failed for {}: {}", opp.route, reason);
        }
        ExecutionOutcome::ConfirmationTimeout { tx_hash } => {
            tracing::warn!("no receipt for {:?} within timeout", tx_hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{StepKind, SwapStep};
    use alloy::primitives::{B256, U256, U64};
    use alloy::providers::mock::Asserter;
    use alloy::providers::ProviderBuilder;
    use alloy::rpc::types::FeeHistory;

    fn mocked(asserter: &Asserter) -> DynProvider {
        ProviderBuilder::new()
            .connect_mocked_client(asserter.clone())
            .erased()
    }

    fn test_config() -> Config {
        Config {
            rpc_url: "http://localhost:8545".into(),
            flashblocks_ws_url: None,
            preconf_rpc_url: None,
            executor_address: Address::repeat_byte(0xee),
            borrow_asset: Address::repeat_byte(1),
            borrow_amount: U256::from(10_000u64),
            slippage_bps: 30,
            gas_cost_allowance: U256::from(20u64),
            min_profit: U256::ZERO,
            min_profit_bps: 0,
            max_gas_price: 100_000_000, // 0.1 gwei
            scan_interval: Duration::from_millis(4_000),
            batch_size: 5,
            odos_requests_per_sec: 5,
            tokens_file: "data/tokens.json".into(),
            paths_file: "data/paths.json".into(),
        }
    }

    fn step(token_in: Address, token_out: Address) -> SwapStep {
        SwapStep {
            kind: StepKind::ConcentratedSingle,
            router: Address::repeat_byte(0xaa),
            token_in,
            token_out,
            fee: 500,
            stable: false,
            factory: Address::ZERO,
            min_amount_out: U256::ZERO,
            calldata: alloy::primitives::Bytes::new(),
        }
    }

    fn opportunity() -> Opportunity {
        let weth = Address::repeat_byte(1);
        let usdc = Address::repeat_byte(2);
        Opportunity {
            asset: weth,
            borrow_amount: U256::from(10_000u64),
            final_amount: U256::from(10_100u64),
            net_profit: U256::from(80u64),
            profit_pct: 0.8,
            steps: vec![step(weth, usdc), step(usdc, weth)],
            route: "WETH -> USDC -> WETH".into(),
        }
    }

    fn fee_history(base_fee: u128) -> FeeHistory {
        FeeHistory {
            oldest_block: 1,
            base_fee_per_gas: vec![base_fee; 11],
            gas_used_ratio: vec![0.5; 10],
            reward: Some(vec![vec![1_000_000]; 10]),
            ..Default::default()
        }
    }

    fn receipt_json() -> serde_json::Value {
        serde_json::json!({
            "type": "0x2",
            "status": "0x1",
            "cumulativeGasUsed": "0x1e8480",
            "logs": [],
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "transactionHash": format!("0x{}", "11".repeat(32)),
            "transactionIndex": "0x0",
            "blockHash": format!("0x{}", "22".repeat(32)),
            "blockNumber": "0x100",
            "gasUsed": "0x30d40",
            "effectiveGasPrice": "0x3b9aca00",
            "from": format!("0x{}", "33".repeat(20)),
            "to": format!("0x{}", "44".repeat(20)),
            "contractAddress": null
        })
    }

    #[test]
    fn gas_buffer_is_thirty_percent() {
        assert_eq!(buffered_gas_limit(100_000), 130_000);
        assert_eq!(buffered_gas_limit(1_000_000), 1_300_000);
        // Integer division floors.
        assert_eq!(buffered_gas_limit(333), 432);
    }

    #[tokio::test]
    async fn gas_price_over_ceiling_skips_without_sending() {
        let asserter = Asserter::new();
        // 2 gwei base fee against a 0.1 gwei ceiling. No further responses
        // are queued, so any attempt to estimate or send would error out.
        asserter.push_success(&fee_history(2_000_000_000));

        let mut orch = ExecutionOrchestrator::new(
            mocked(&asserter),
            None,
            &test_config(),
            Address::repeat_byte(9),
        );

        let outcome = orch.execute(&opportunity()).await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::SkippedGasPrice { .. }));
    }

    #[tokio::test]
    async fn broadcast_failure_invalidates_nonce_cache() {
        let asserter = Asserter::new();
        asserter.push_success(&fee_history(10)); // eth_feeHistory
        asserter.push_success(&U64::from(200_000u64)); // eth_estimateGas
        asserter.push_success(&U64::from(7u64)); // eth_getTransactionCount
        asserter.push_success(&U64::from(8453u64)); // eth_chainId (fill)
        asserter.push_failure_msg("connection reset"); // eth_sendTransaction

        let mut orch = ExecutionOrchestrator::new(
            mocked(&asserter),
            None,
            &test_config(),
            Address::repeat_byte(9),
        );

        let outcome = orch.execute(&opportunity()).await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::BroadcastFailed { .. }));
        // The next submission must go back to eth_getTransactionCount
        // instead of reusing the local counter.
        assert!(orch.nonce.is_cold());
    }

    #[tokio::test]
    async fn preconf_receipt_is_flagged_as_preconfirmed() {
        let preconf = Asserter::new();
        preconf.push_success(&receipt_json());
        let standard = Asserter::new(); // untouched

        let orch = ExecutionOrchestrator::new(
            mocked(&standard),
            Some(mocked(&preconf)),
            &test_config(),
            Address::repeat_byte(9),
        );

        let (receipt, preconfirmed) = orch
            .wait_for_receipt(B256::repeat_byte(0x11))
            .await
            .unwrap();
        assert!(preconfirmed);
        assert!(receipt.status());
    }

    #[tokio::test]
    async fn preconf_failure_degrades_to_standard_endpoint() {
        let preconf = Asserter::new();
        preconf.push_failure_msg("preconf endpoint unavailable");
        let standard = Asserter::new();
        standard.push_success(&receipt_json());

        let orch = ExecutionOrchestrator::new(
            mocked(&standard),
            Some(mocked(&preconf)),
            &test_config(),
            Address::repeat_byte(9),
        );

        let (receipt, preconfirmed) = orch
            .wait_for_receipt(B256::repeat_byte(0x11))
            .await
            .unwrap();
        // The receipt came from the standard endpoint and must not be
        // reported as a preconfirmation.
        assert!(!preconfirmed);
        assert!(receipt.status());
    }
}
