//! Quote model and best-of selection

use alloy::primitives::{Address, U256};

use crate::venues::VenueId;

/// One hop to be priced: swap `amount_in` of `token_in` into `token_out`.
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    /// Restrict the fan-out to a single venue when the path generator
    /// already knows where the liquidity is.
    pub venue_hint: Option<VenueId>,
}

impl QuoteRequest {
    pub fn new(token_in: Address, token_out: Address, amount_in: U256) -> Self {
        Self {
            token_in,
            token_out,
            amount_in,
            venue_hint: None,
        }
    }
}

/// Result of pricing one hop at one source.
#[derive(Debug, Clone)]
pub struct Quote {
    pub venue: VenueId,
    /// Output in the output token's base units
    pub amount_out: U256,
    /// Fee tier, for concentrated-liquidity venues
    pub fee_tier: Option<u32>,
    /// Pool stability flag, for route-struct AMMs
    pub stable: Option<bool>,
    /// Opaque route identifier, required to assemble aggregator calldata
    pub route_id: Option<String>,
}

impl Quote {
    pub fn venue_quote(venue: VenueId, amount_out: U256) -> Self {
        Self {
            venue,
            amount_out,
            fee_tier: None,
            stable: None,
            route_id: None,
        }
    }
}

/// Pick the quote with the strictly greatest output. Quotes with zero output
/// are never selected; ties go to the earliest quote in iteration order.
pub fn select_best(quotes: impl IntoIterator<Item = Quote>) -> Option<Quote> {
    let mut best: Option<Quote> = None;
    for quote in quotes {
        if quote.amount_out.is_zero() {
            continue;
        }
        match &best {
            Some(current) if quote.amount_out <= current.amount_out => {}
            _ => best = Some(quote),
        }
    }
    best
}
