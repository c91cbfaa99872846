//! Opportunity Scanner
//!
//! Evaluates every candidate path in fixed-size concurrent batches and
//! returns the survivors ranked by net profit. One bad path never takes
//! down a batch.

use std::sync::Arc;
use std::time::Instant;

use crate::evaluator::{Opportunity, PathEvaluator};
use crate::tokens::ArbPath;

pub struct OpportunityScanner {
    evaluator: Arc<PathEvaluator>,
    paths: Arc<Vec<ArbPath>>,
    batch_size: usize,
}

impl OpportunityScanner {
    pub fn new(evaluator: Arc<PathEvaluator>, paths: Vec<ArbPath>, batch_size: usize) -> Self {
        Self {
            evaluator,
            paths: Arc::new(paths),
            batch_size: batch_size.max(1),
        }
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    /// One full sweep over the candidate list. Every batch settles
    /// completely before the next starts, so concurrent RPC pressure stays
    /// bounded at `batch_size`.
    pub async fn scan(&self) -> Vec<Opportunity> {
        let started = Instant::now();
        let mut found: Vec<Opportunity> = Vec::new();

        for batch_start in (0..self.paths.len()).step_by(self.batch_size) {
            let batch_end = (batch_start + self.batch_size).min(self.paths.len());

            let handles: Vec<_> = (batch_start..batch_end)
                .map(|i| {
                    let evaluator = Arc::clone(&self.evaluator);
                    let paths = Arc::clone(&self.paths);
                    tokio::spawn(async move { evaluator.evaluate(&paths[i]).await })
                })
                .collect();

            for handle in handles {
                match handle.await {
                    Ok(Some(opp)) => found.push(opp),
                    Ok(None) => {}
                    Err(e) => {
                        // A panicking evaluation loses its path this cycle,
                        // nothing else.
                        tracing::error!("path evaluation task failed: {}", e);
                    }
                }
            }
        }

        found.sort_by(|a, b| b.net_profit.cmp(&a.net_profit));

        tracing::debug!(
            "scan finished: {} paths, {} opportunities, {:?}",
            self.paths.len(),
            found.len(),
            started.elapsed()
        );
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{EvalParams, HopQuoter, PlanSimulator, StepAssembler};
    use crate::quote::{Quote, QuoteRequest};
    use crate::step::{StepKind, SwapStep};
    use crate::tokens::{Hop, TokenBook};
    use crate::venues::VenueId;
    use alloy::primitives::{Address, Bytes, U256};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    // Output depends on the intermediate token, so different paths can be
    // made profitable or not independently.
    struct PerTokenQuoter {
        returns: HashMap<Address, u64>,
        poison: Option<Address>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HopQuoter for PerTokenQuoter {
        async fn best_quote(&self, req: &QuoteRequest) -> Option<Quote> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(req.token_out) == self.poison {
                panic!("quoter poisoned for this token");
            }
            if let Some(v) = self.returns.get(&req.token_in) {
                // Closing hop out of a known intermediate.
                Some(Quote::venue_quote(VenueId::UniswapV3, U256::from(*v)))
            } else if self.returns.contains_key(&req.token_out) {
                // Opening hop into a known intermediate.
                Some(Quote::venue_quote(VenueId::UniswapV3, U256::from(1u64)))
            } else {
                None
            }
        }
    }

    struct EchoAssembler;

    #[async_trait]
    impl StepAssembler for EchoAssembler {
        async fn build_step(
            &self,
            token_in: Address,
            token_out: Address,
            quote: &Quote,
        ) -> Option<SwapStep> {
            Some(SwapStep {
                kind: StepKind::ConcentratedSingle,
                router: addr(0xaa),
                token_in,
                token_out,
                fee: 500,
                stable: false,
                factory: Address::ZERO,
                min_amount_out: quote.amount_out,
                calldata: Bytes::new(),
            })
        }
    }

    struct YesSimulator;

    #[async_trait]
    impl PlanSimulator for YesSimulator {
        async fn preflight(&self, _: Address, _: U256, _: &[SwapStep]) -> bool {
            true
        }
    }

    fn two_hop(asset: Address, mid: Address) -> ArbPath {
        ArbPath {
            hops: vec![
                Hop {
                    from: asset,
                    to: mid,
                    venue: None,
                },
                Hop {
                    from: mid,
                    to: asset,
                    venue: None,
                },
            ],
        }
    }

    fn scanner_with(
        asset: Address,
        paths: Vec<ArbPath>,
        returns: HashMap<Address, u64>,
        poison: Option<Address>,
        batch_size: usize,
    ) -> OpportunityScanner {
        let params = EvalParams {
            asset,
            borrow_amount: U256::from(1_000u64),
            gas_cost_allowance: U256::ZERO,
            min_profit: U256::ZERO,
            min_profit_bps: 0,
        };
        let evaluator = Arc::new(PathEvaluator::new(
            Arc::new(PerTokenQuoter {
                returns,
                poison,
                calls: AtomicUsize::new(0),
            }),
            Arc::new(EchoAssembler),
            Arc::new(YesSimulator),
            params,
            Arc::new(TokenBook::from_tokens(vec![])),
        ));
        OpportunityScanner::new(evaluator, paths, batch_size)
    }

    #[tokio::test]
    async fn all_paths_settle_and_results_rank_by_profit() {
        let asset = addr(1);
        // Seven candidate paths through distinct intermediates, batch size
        // five, mixed outcomes.
        let mids: Vec<Address> = (10u8..17).map(addr).collect();
        let paths: Vec<ArbPath> = mids.iter().map(|m| two_hop(asset, *m)).collect();

        let mut returns = HashMap::new();
        for (i, mid) in mids.iter().enumerate() {
            // Intermediates at even index are profitable, with increasing
            // profit; odd ones round-trip at a loss.
            let out = if i % 2 == 0 {
                1_000 + 10 * (i as u64 + 1)
            } else {
                900
            };
            returns.insert(*mid, out);
        }

        let scanner = scanner_with(asset, paths, returns, None, 5);
        let found = scanner.scan().await;

        assert_eq!(found.len(), 4);
        for pair in found.windows(2) {
            assert!(pair[0].net_profit >= pair[1].net_profit);
        }
        assert_eq!(found[0].net_profit, U256::from(70u64));
    }

    #[tokio::test]
    async fn empty_path_list_scans_to_nothing() {
        let scanner = scanner_with(addr(1), vec![], HashMap::new(), None, 5);
        assert!(scanner.scan().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_intermediate_only_drops_its_own_path() {
        let asset = addr(1);
        let good = addr(10);
        let unknown = addr(66);

        let mut returns = HashMap::new();
        returns.insert(good, 1_050u64);

        let scanner = scanner_with(
            asset,
            vec![two_hop(asset, unknown), two_hop(asset, good)],
            returns,
            None,
            5,
        );
        let found = scanner.scan().await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].net_profit, U256::from(50u64));
    }

    // Tracks how many paths sit between their opening and closing hop at
    // once, and in what order hops land, so batch discipline is observable.
    struct GaugeQuoter {
        returns: HashMap<Address, u64>,
        poison: Option<Address>,
        in_flight: AtomicUsize,
        high_water: AtomicUsize,
        // (is_opening, intermediate token)
        events: std::sync::Mutex<Vec<(bool, Address)>>,
    }

    #[async_trait]
    impl HopQuoter for GaugeQuoter {
        async fn best_quote(&self, req: &QuoteRequest) -> Option<Quote> {
            if let Some(v) = self.returns.get(&req.token_in) {
                // Closing hop. Hold the path open long enough for every
                // sibling in the batch to reach this point.
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                if Some(req.token_in) == self.poison {
                    panic!("quoter poisoned for this token");
                }
                self.events.lock().unwrap().push((false, req.token_in));
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Some(Quote::venue_quote(VenueId::UniswapV3, U256::from(*v)))
            } else if self.returns.contains_key(&req.token_out) {
                // Opening hop.
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.high_water.fetch_max(now, Ordering::SeqCst);
                self.events.lock().unwrap().push((true, req.token_out));
                Some(Quote::venue_quote(VenueId::UniswapV3, U256::from(1u64)))
            } else {
                None
            }
        }
    }

    #[tokio::test]
    async fn batches_bound_concurrency_and_settle_before_next_batch() {
        let asset = addr(1);
        let mids: Vec<Address> = (10u8..17).map(addr).collect();
        let paths: Vec<ArbPath> = mids.iter().map(|m| two_hop(asset, *m)).collect();

        let mut returns = HashMap::new();
        for (i, mid) in mids.iter().enumerate() {
            returns.insert(*mid, 1_000 + 10 * (i as u64 + 1));
        }

        // Third path of the first batch panics mid-evaluation; its opening
        // is never balanced by a closing.
        let poison = mids[2];
        let quoter = Arc::new(GaugeQuoter {
            returns,
            poison: Some(poison),
            in_flight: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            events: std::sync::Mutex::new(Vec::new()),
        });

        let params = EvalParams {
            asset,
            borrow_amount: U256::from(1_000u64),
            gas_cost_allowance: U256::ZERO,
            min_profit: U256::ZERO,
            min_profit_bps: 0,
        };
        let evaluator = Arc::new(PathEvaluator::new(
            quoter.clone(),
            Arc::new(EchoAssembler),
            Arc::new(YesSimulator),
            params,
            Arc::new(TokenBook::from_tokens(vec![])),
        ));
        let scanner = OpportunityScanner::new(evaluator, paths, 5);

        let found = scanner.scan().await;

        // The poisoned path is the only loss out of seven.
        assert_eq!(found.len(), 6);

        // Never more paths in flight than one batch holds.
        assert_eq!(quoter.high_water.load(Ordering::SeqCst), 5);

        // Every healthy first-batch path closes before anything from the
        // second batch opens.
        let events = quoter.events.lock().unwrap();
        let first_batch2_open = events
            .iter()
            .position(|(opening, mid)| *opening && mids[5..].contains(mid))
            .expect("second batch never started");
        let batch1_closes_before = events[..first_batch2_open]
            .iter()
            .filter(|(opening, mid)| !*opening && mids[..5].contains(mid))
            .count();
        assert_eq!(batch1_closes_before, 4);
    }

    #[tokio::test]
    async fn panicking_evaluation_loses_only_its_path() {
        let asset = addr(1);
        let good = addr(10);
        let bad = addr(11);

        let mut returns = HashMap::new();
        returns.insert(good, 1_050u64);
        returns.insert(bad, 1_200u64);

        // The quoter panics whenever it is asked to route into `bad`, so
        // that path's spawned task dies mid-batch.
        let scanner = scanner_with(
            asset,
            vec![two_hop(asset, bad), two_hop(asset, good)],
            returns,
            Some(bad),
            5,
        );
        let found = scanner.scan().await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].net_profit, U256::from(50u64));
    }
}
