//! Scan Scheduler
//!
//! Drives the scan/execute cycle either on a fixed interval or on every
//! flashblock, with a single cycle in flight at a time. Fatal errors back
//! off and restart the strategy instead of killing the process.

use alloy::providers::Provider;
use eyre::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

use crate::executor::{report, ExecutionOrchestrator};
use crate::flashblocks::{FlashblockFeed, FlashblockTick};
use crate::scanner::OpportunityScanner;

const FATAL_BACKOFF: Duration = Duration::from_secs(10);

pub enum Strategy {
    /// Fixed-interval scans.
    Polling { every: Duration },
    /// One scan per flashblock tick, skipping ticks that arrive mid-cycle.
    EventDriven { ws_url: String },
}

pub struct ScanScheduler<P> {
    scanner: Arc<OpportunityScanner>,
    orchestrator: Arc<Mutex<ExecutionOrchestrator<P>>>,
    strategy: Strategy,
}

impl<P: Provider + Clone> ScanScheduler<P> {
    pub fn new(
        scanner: Arc<OpportunityScanner>,
        orchestrator: Arc<Mutex<ExecutionOrchestrator<P>>>,
        strategy: Strategy,
    ) -> Self {
        Self {
            scanner,
            orchestrator,
            strategy,
        }
    }

    /// Run forever. A strategy returning is treated as fatal; we log, wait,
    /// and start it again from scratch.
    pub async fn run(&self) -> ! {
        loop {
            let result = match &self.strategy {
                Strategy::Polling { every } => self.run_polling(*every).await,
                Strategy::EventDriven { ws_url } => self.run_event_driven(ws_url).await,
            };
            match result {
                Ok(()) => tracing::error!("scheduler strategy exited unexpectedly"),
                Err(e) => tracing::error!("scheduler strategy failed: {}", e),
            }
            tracing::info!("restarting in {:?}", FATAL_BACKOFF);
            sleep(FATAL_BACKOFF).await;
        }
    }

    async fn run_polling(&self, every: Duration) -> Result<()> {
        let mut ticker = interval(every);
        // A slow cycle should push the next one back, not cause a burst.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.cycle().await?;
        }
    }

    async fn run_event_driven(&self, ws_url: &str) -> Result<()> {
        let mut ticks = FlashblockFeed::new(ws_url).spawn();

        while let Some(tick) = ticks.recv().await {
            tracing::trace!(
                "flashblock {}.{} triggers scan",
                tick.block_number,
                tick.index
            );
            self.cycle().await?;
            // Quotes fetched for ticks that arrived during the cycle would
            // already be stale; drop them and wait for a fresh one.
            drain_stale(&mut ticks);
        }

        Err(eyre::eyre!("flashblock feed channel closed"))
    }

    /// One scan sweep; the best surviving opportunity (if any) goes to
    /// execution. Everything ranked below it is discarded because its quotes
    /// no longer reflect the books once we trade.
    async fn cycle(&self) -> Result<()> {
        let opportunities = self.scanner.scan().await;
        let Some(best) = opportunities.into_iter().next() else {
            return Ok(());
        };

        tracing::info!(
            "opportunity: {} (net {} wei, {:.3}%)",
            best.route,
            best.net_profit,
            best.profit_pct
        );

        let mut orchestrator = self.orchestrator.lock().await;
        let outcome = orchestrator.execute(&best).await?;
        report(&best, &outcome);
        Ok(())
    }
}

fn drain_stale(ticks: &mut mpsc::Receiver<FlashblockTick>) {
    let mut dropped = 0usize;
    while ticks.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        tracing::trace!("dropped {} flashblock ticks that arrived mid-cycle", dropped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_ticks_are_drained() {
        let (tx, mut rx) = mpsc::channel(8);
        for i in 0..5u64 {
            tx.send(FlashblockTick {
                block_number: 100,
                index: i,
            })
            .await
            .unwrap();
        }

        drain_stale(&mut rx);
        assert!(rx.try_recv().is_err());

        // Fresh ticks after the drain still come through.
        tx.send(FlashblockTick {
            block_number: 101,
            index: 0,
        })
        .await
        .unwrap();
        assert_eq!(rx.recv().await.unwrap().block_number, 101);
    }
}
