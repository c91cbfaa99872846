//! Aerodrome quote source
//!
//! Aerodrome routes through typed `Route` structs rather than fee tiers.
//! A pair can have both a stable and a volatile pool, so both are probed
//! and the better output wins (volatile first on ties).

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::sol;
use async_trait::async_trait;
use futures::future::join_all;

use super::{QuoteSource, VenueId};
use crate::config::contracts::aerodrome::{POOL_FACTORY, ROUTER};
use crate::quote::{Quote, QuoteRequest};

sol! {
    #[sol(rpc)]
    interface IAerodromeRouter {
        struct Route {
            address from;
            address to;
            bool stable;
            address factory;
        }

        function getAmountsOut(uint256 amountIn, Route[] memory routes)
            external view returns (uint256[] memory amounts);
    }
}

pub struct AerodromeSource<P> {
    provider: P,
    router: Address,
    factory: Address,
}

impl<P: Provider + Clone> AerodromeSource<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            router: ROUTER,
            factory: POOL_FACTORY,
        }
    }

    async fn quote_pool(&self, req: &QuoteRequest, stable: bool) -> eyre::Result<U256> {
        let router = IAerodromeRouter::new(self.router, self.provider.clone());

        let route = IAerodromeRouter::Route {
            from: req.token_in,
            to: req.token_out,
            stable,
            factory: self.factory,
        };

        let amounts = router
            .getAmountsOut(req.amount_in, vec![route])
            .call()
            .await?;

        amounts
            .last()
            .copied()
            .ok_or_else(|| eyre::eyre!("empty amounts from Aerodrome router"))
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync> QuoteSource for AerodromeSource<P> {
    fn venue(&self) -> VenueId {
        VenueId::Aerodrome
    }

    async fn quote(&self, req: &QuoteRequest) -> eyre::Result<Option<Quote>> {
        let probes = [false, true].map(|stable| async move {
            (stable, self.quote_pool(req, stable).await)
        });

        let mut best: Option<(bool, U256)> = None;
        for (stable, result) in join_all(probes).await {
            match result {
                Ok(amount_out) if !amount_out.is_zero() => match best {
                    Some((_, current)) if amount_out <= current => {}
                    _ => best = Some((stable, amount_out)),
                },
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        "Aerodrome {} pool quote failed: {}",
                        if stable { "stable" } else { "volatile" },
                        e
                    );
                }
            }
        }

        Ok(best.map(|(stable, amount_out)| Quote {
            venue: VenueId::Aerodrome,
            amount_out,
            fee_tier: None,
            stable: Some(stable),
            route_id: None,
        }))
    }
}
