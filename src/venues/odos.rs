//! Odos Aggregator API Client
//!
//! Two-phase flow: `quote` returns an output estimate plus an opaque path id,
//! `assemble` turns that path id into an executable target and calldata.
//! Both endpoints are metered, so every request goes through the shared
//! token-bucket limiter first.

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use eyre::Result;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::{QuoteSource, VenueId};
use crate::config;
use crate::limiter::ApiLimiter;
use crate::quote::{Quote, QuoteRequest};

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    out_amounts: Vec<String>,
    path_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssembleResponse {
    transaction: Option<AssembledTransaction>,
}

#[derive(Debug, Deserialize)]
struct AssembledTransaction {
    to: String,
    data: String,
}

/// Executable call produced by the assemble endpoint.
#[derive(Debug, Clone)]
pub struct AssembledCall {
    pub to: Address,
    pub data: Bytes,
}

pub struct OdosClient {
    client: Client,
    limiter: Arc<ApiLimiter>,
    quote_url: String,
    assemble_url: String,
    /// Address executing the swap on-chain (the arbitrage contract, which
    /// holds the tokens mid-loan).
    user_addr: Address,
}

impl OdosClient {
    pub fn new(limiter: Arc<ApiLimiter>, user_addr: Address) -> Result<Self> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            limiter,
            quote_url: config::odos::QUOTE_URL.to_string(),
            assemble_url: config::odos::ASSEMBLE_URL.to_string(),
            user_addr,
        })
    }

    async fn fetch_quote(&self, req: &QuoteRequest) -> Result<Option<Quote>> {
        self.limiter.acquire().await;

        let body = serde_json::json!({
            "chainId": config::CHAIN_ID,
            "inputTokens": [{
                "tokenAddress": req.token_in.to_string(),
                "amount": req.amount_in.to_string(),
            }],
            "outputTokens": [{
                "tokenAddress": req.token_out.to_string(),
                "proportion": 1,
            }],
            "userAddr": self.user_addr.to_string(),
            "disableRFQs": true,
            "compact": true,
        });

        let response = self.client.post(&self.quote_url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(eyre::eyre!("Odos quote error: {} - {}", status, text));
        }

        let quote: QuoteResponse = serde_json::from_str(&text)
            .map_err(|e| eyre::eyre!("Failed to parse Odos quote: {}. Body: {}", e, text))?;

        let Some(out) = quote.out_amounts.first() else {
            return Ok(None);
        };
        let amount_out = U256::from_str_radix(out, 10)
            .map_err(|e| eyre::eyre!("bad Odos outAmount {:?}: {}", out, e))?;

        if amount_out.is_zero() {
            return Ok(None);
        }
        let Some(path_id) = quote.path_id else {
            // Without a path id the quote can never be assembled.
            return Ok(None);
        };

        Ok(Some(Quote {
            venue: VenueId::Odos,
            amount_out,
            fee_tier: None,
            stable: None,
            route_id: Some(path_id),
        }))
    }

    /// Fetch executable calldata for a previously quoted route. `Ok(None)`
    /// means the route is no longer assemblable and the path should be
    /// abandoned for this cycle.
    pub async fn assemble(&self, route_id: &str) -> Result<Option<AssembledCall>> {
        self.limiter.acquire().await;

        let body = serde_json::json!({
            "userAddr": self.user_addr.to_string(),
            "pathId": route_id,
            "simulate": false,
        });

        let response = self
            .client
            .post(&self.assemble_url)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(eyre::eyre!("Odos assemble error: {} - {}", status, text));
        }

        let assembled: AssembleResponse = serde_json::from_str(&text)
            .map_err(|e| eyre::eyre!("Failed to parse Odos assemble: {}. Body: {}", e, text))?;

        let Some(tx) = assembled.transaction else {
            return Ok(None);
        };

        let to: Address = tx.to.parse()?;
        let data: Bytes = tx.data.parse()?;
        if data.is_empty() {
            return Ok(None);
        }

        Ok(Some(AssembledCall { to, data }))
    }
}

#[async_trait]
impl QuoteSource for OdosClient {
    fn venue(&self) -> VenueId {
        VenueId::Odos
    }

    async fn quote(&self, req: &QuoteRequest) -> eyre::Result<Option<Quote>> {
        self.fetch_quote(req).await
    }
}
