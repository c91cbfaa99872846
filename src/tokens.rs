//! Token metadata table and candidate path list
//!
//! Both are produced out-of-band (token DB refresh, periodic path
//! generation) and consumed read-only here. Loading validates shape only;
//! per-cycle feasibility is the evaluator's job.

use alloy::primitives::Address;
use eyre::{Result, WrapErr};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path as FsPath;

use crate::config::MAX_STEPS;
use crate::venues::VenueId;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    #[serde(default)]
    pub liquidity_usd: f64,
    #[serde(default)]
    pub venues: Vec<VenueId>,
}

/// Read-only address -> metadata table.
pub struct TokenBook {
    by_address: HashMap<Address, TokenInfo>,
}

impl TokenBook {
    pub fn load(path: impl AsRef<FsPath>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .wrap_err_with(|| format!("reading token table {:?}", path.as_ref()))?;
        let tokens: Vec<TokenInfo> = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("parsing token table {:?}", path.as_ref()))?;
        Ok(Self::from_tokens(tokens))
    }

    pub fn from_tokens(tokens: Vec<TokenInfo>) -> Self {
        Self {
            by_address: tokens.into_iter().map(|t| (t.address, t)).collect(),
        }
    }

    pub fn get(&self, address: &Address) -> Option<&TokenInfo> {
        self.by_address.get(address)
    }

    /// Display symbol, falling back to a shortened address for tokens the
    /// table does not know.
    pub fn symbol(&self, address: &Address) -> String {
        match self.by_address.get(address) {
            Some(info) => info.symbol.clone(),
            None => {
                let hex = address.to_string();
                format!("{}..{}", &hex[..6], &hex[hex.len() - 4..])
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

/// One candidate swap within a path, with an optional venue restriction
/// from the path generator.
#[derive(Debug, Clone, Deserialize)]
pub struct Hop {
    pub from: Address,
    pub to: Address,
    #[serde(default)]
    pub venue: Option<VenueId>,
}

/// Ordered hop sequence cycling back to the borrowed asset.
#[derive(Debug, Clone, Deserialize)]
pub struct ArbPath {
    pub hops: Vec<Hop>,
}

impl ArbPath {
    /// Structural validity: non-empty, within the step cap, connected, and
    /// a cycle over `asset`.
    pub fn is_valid_cycle(&self, asset: Address) -> bool {
        let Some(first) = self.hops.first() else {
            return false;
        };
        let Some(last) = self.hops.last() else {
            return false;
        };
        if self.hops.len() > MAX_STEPS {
            return false;
        }
        if first.from != asset || last.to != asset {
            return false;
        }
        self.hops
            .windows(2)
            .all(|pair| pair[0].to == pair[1].from)
    }

    pub fn describe(&self, book: &TokenBook) -> String {
        let mut out = String::new();
        for (i, hop) in self.hops.iter().enumerate() {
            if i == 0 {
                out.push_str(&book.symbol(&hop.from));
            }
            out.push_str(" -> ");
            out.push_str(&book.symbol(&hop.to));
        }
        out
    }
}

/// Load the candidate path file, dropping structurally invalid entries with
/// a warning rather than failing the whole load.
pub fn load_paths(path: impl AsRef<FsPath>, asset: Address) -> Result<Vec<ArbPath>> {
    let raw = std::fs::read_to_string(path.as_ref())
        .wrap_err_with(|| format!("reading path list {:?}", path.as_ref()))?;
    let candidates: Vec<ArbPath> = serde_json::from_str(&raw)
        .wrap_err_with(|| format!("parsing path list {:?}", path.as_ref()))?;

    let total = candidates.len();
    let valid: Vec<ArbPath> = candidates
        .into_iter()
        .filter(|p| {
            let ok = p.is_valid_cycle(asset);
            if !ok {
                tracing::warn!("dropping structurally invalid candidate path");
            }
            ok
        })
        .collect();

    tracing::info!("loaded {} candidate paths ({} dropped)", valid.len(), total - valid.len());
    Ok(valid)
}
