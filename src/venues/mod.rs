pub mod aerodrome;
pub mod odos;
pub mod pancake_v3;
pub mod sushi_v2;
pub mod uniswap_v3;

use async_trait::async_trait;
use serde::Deserialize;

use crate::quote::{Quote, QuoteRequest};

/// Closed set of quote sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueId {
    UniswapV3,
    PancakeV3,
    Aerodrome,
    SushiV2,
    Odos,
}

impl VenueId {
    /// Aggregator quotes need a second network call before they are executable.
    pub fn is_aggregator(&self) -> bool {
        matches!(self, VenueId::Odos)
    }
}

impl std::fmt::Display for VenueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VenueId::UniswapV3 => write!(f, "Uniswap V3"),
            VenueId::PancakeV3 => write!(f, "PancakeSwap V3"),
            VenueId::Aerodrome => write!(f, "Aerodrome"),
            VenueId::SushiV2 => write!(f, "SushiSwap V2"),
            VenueId::Odos => write!(f, "Odos"),
        }
    }
}

/// One price source. `Ok(None)` means "no usable quote here"; transport and
/// revert errors bubble up as `Err` and are swallowed by the aggregator.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn venue(&self) -> VenueId;

    async fn quote(&self, req: &QuoteRequest) -> eyre::Result<Option<Quote>>;
}
