//! Quote Aggregator
//!
//! Fans one hop out to every applicable source concurrently, swallows
//! per-source failures, and returns the best surviving quote.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use crate::evaluator::HopQuoter;
use crate::quote::{select_best, Quote, QuoteRequest};
use crate::venues::QuoteSource;

pub struct QuoteAggregator {
    sources: Vec<Arc<dyn QuoteSource>>,
}

impl QuoteAggregator {
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>) -> Self {
        Self { sources }
    }

    /// Query all applicable sources for one hop. A source erroring or
    /// returning nothing only removes that source from comparison; if none
    /// survive, there is no quote for this hop (not an error).
    pub async fn best_quote(&self, req: &QuoteRequest) -> Option<Quote> {
        let applicable: Vec<&Arc<dyn QuoteSource>> = self
            .sources
            .iter()
            .filter(|s| match req.venue_hint {
                Some(hint) => s.venue() == hint,
                None => true,
            })
            .collect();

        let results = join_all(applicable.iter().map(|s| s.quote(req))).await;

        let mut quotes = Vec::with_capacity(results.len());
        for (source, result) in applicable.iter().zip(results) {
            match result {
                Ok(Some(quote)) => quotes.push(quote),
                Ok(None) => {
                    tracing::trace!("{}: no quote for hop", source.venue());
                }
                Err(e) => {
                    tracing::debug!("{}: quote failed: {}", source.venue(), e);
                }
            }
        }

        select_best(quotes)
    }
}

#[async_trait]
impl HopQuoter for QuoteAggregator {
    async fn best_quote(&self, req: &QuoteRequest) -> Option<Quote> {
        QuoteAggregator::best_quote(self, req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venues::VenueId;
    use alloy::primitives::{Address, U256};

    struct FixedSource {
        venue: VenueId,
        result: eyre::Result<Option<Quote>>,
    }

    impl FixedSource {
        fn quoting(venue: VenueId, out: u64) -> Arc<dyn QuoteSource> {
            Arc::new(Self {
                venue,
                result: Ok(Some(Quote::venue_quote(venue, U256::from(out)))),
            })
        }

        fn failing(venue: VenueId) -> Arc<dyn QuoteSource> {
            Arc::new(Self {
                venue,
                result: Err(eyre::eyre!("connection refused")),
            })
        }

        fn empty(venue: VenueId) -> Arc<dyn QuoteSource> {
            Arc::new(Self {
                venue,
                result: Ok(None),
            })
        }
    }

    #[async_trait]
    impl QuoteSource for FixedSource {
        fn venue(&self) -> VenueId {
            self.venue
        }

        async fn quote(&self, _req: &QuoteRequest) -> eyre::Result<Option<Quote>> {
            match &self.result {
                Ok(q) => Ok(q.clone()),
                Err(e) => Err(eyre::eyre!("{e}")),
            }
        }
    }

    fn req() -> QuoteRequest {
        QuoteRequest::new(Address::ZERO, Address::repeat_byte(1), U256::from(10_000))
    }

    #[tokio::test]
    async fn selects_best_across_venues() {
        let agg = QuoteAggregator::new(vec![
            FixedSource::quoting(VenueId::UniswapV3, 10_050),
            FixedSource::quoting(VenueId::Aerodrome, 10_080),
        ]);

        let best = agg.best_quote(&req()).await.unwrap();
        assert_eq!(best.venue, VenueId::Aerodrome);
        assert_eq!(best.amount_out, U256::from(10_080));
    }

    #[tokio::test]
    async fn source_failures_are_swallowed() {
        let agg = QuoteAggregator::new(vec![
            FixedSource::failing(VenueId::Odos),
            FixedSource::empty(VenueId::SushiV2),
            FixedSource::quoting(VenueId::PancakeV3, 42),
        ]);

        let best = agg.best_quote(&req()).await.unwrap();
        assert_eq!(best.venue, VenueId::PancakeV3);
    }

    #[tokio::test]
    async fn all_sources_failing_yields_no_quote() {
        let agg = QuoteAggregator::new(vec![
            FixedSource::failing(VenueId::UniswapV3),
            FixedSource::empty(VenueId::Aerodrome),
        ]);

        assert!(agg.best_quote(&req()).await.is_none());
    }

    #[tokio::test]
    async fn venue_hint_restricts_fanout() {
        let agg = QuoteAggregator::new(vec![
            FixedSource::quoting(VenueId::UniswapV3, 999),
            FixedSource::quoting(VenueId::SushiV2, 1),
        ]);

        let mut hinted = req();
        hinted.venue_hint = Some(VenueId::SushiV2);

        let best = agg.best_quote(&hinted).await.unwrap();
        assert_eq!(best.venue, VenueId::SushiV2);
        assert_eq!(best.amount_out, U256::from(1));
    }
}
