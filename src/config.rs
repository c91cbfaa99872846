//! Base Mainnet Arbitrage Bot Configuration

use alloy::primitives::{Address, U256};
use eyre::{eyre, Result};
use std::time::Duration;

pub const CHAIN_ID: u64 = 8453;

/// Hard cap on steps per arbitrage, mirrored from the executor contract.
/// A plan longer than this reverts on-chain, so we refuse to build it.
pub const MAX_STEPS: usize = 10;

pub mod tokens {
    use alloy::primitives::{address, Address};

    pub const WETH: Address = address!("4200000000000000000000000000000000000006");
}

/// Static per-venue contract addresses. All routers listed here must also be
/// whitelisted in the executor contract or execution reverts.
pub mod contracts {
    pub mod uniswap_v3 {
        use alloy::primitives::{address, Address};

        pub const QUOTER_V2: Address = address!("3d4e44Eb1374240CE5F1B871ab261CD16335B76a");
        pub const SWAP_ROUTER: Address = address!("2626664c2603336E57B271c5C0b26F421741e481");
        pub const FEE_TIERS: [u32; 4] = [100, 500, 3000, 10000];
    }

    pub mod pancake_v3 {
        use alloy::primitives::{address, Address};

        pub const QUOTER_V2: Address = address!("B048Bbc1Ee6b733FFfCFb9e9CeF7375518e25997");
        pub const SMART_ROUTER: Address = address!("678Aa4bF4E210cf2166753e054d5b7c31cc7fa86");
        pub const FEE_TIERS: [u32; 4] = [100, 500, 2500, 10000];
    }

    pub mod aerodrome {
        use alloy::primitives::{address, Address};

        pub const ROUTER: Address = address!("cF77a3Ba9A5CA399B7c97c74d54e5b1Beb874E43");
        pub const POOL_FACTORY: Address = address!("420DD381b31aEf6683db6B902084cB0FFECe40Da");
    }

    pub mod sushi_v2 {
        use alloy::primitives::{address, Address};

        pub const ROUTER: Address = address!("6BDED42c6DA8FBf0d2bA55B2fa120C5e0c8D7891");
    }
}

pub mod odos {
    pub const QUOTE_URL: &str = "https://api.odos.xyz/sor/quote/v2";
    pub const ASSEMBLE_URL: &str = "https://api.odos.xyz/sor/assemble";
}

/// Runtime configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP RPC endpoint
    pub rpc_url: String,
    /// Flashblocks WebSocket feed; presence selects event-driven scanning
    pub flashblocks_ws_url: Option<String>,
    /// RPC endpoint serving flashblock-granularity receipts
    pub preconf_rpc_url: Option<String>,
    /// Deployed FlashArbExecutor contract
    pub executor_address: Address,
    /// Asset borrowed at the start of every path
    pub borrow_asset: Address,
    /// Loan size in the borrow asset's base units
    pub borrow_amount: U256,
    /// Slippage buffer applied to every quoted output, in bps
    pub slippage_bps: u64,
    /// Fixed gas cost allowance subtracted from gross profit, in wei
    pub gas_cost_allowance: U256,
    /// Absolute profit floor in borrow-asset base units
    pub min_profit: U256,
    /// Relative profit floor in bps of the borrowed amount
    pub min_profit_bps: u64,
    /// Hard ceiling on the network max fee per gas, in wei
    pub max_gas_price: u128,
    /// Polling-mode delay between scan cycles
    pub scan_interval: Duration,
    /// Paths evaluated concurrently per scanner batch
    pub batch_size: usize,
    /// Odos requests per second allowed through the limiter
    pub odos_requests_per_sec: u32,
    /// Token metadata table (refreshed out-of-band)
    pub tokens_file: String,
    /// Candidate path list (refreshed out-of-band)
    pub paths_file: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let rpc_url = std::env::var("BASE_RPC_URL")
            .map_err(|_| eyre!("BASE_RPC_URL must be set"))?;
        let executor_address = std::env::var("EXECUTOR_ADDRESS")
            .map_err(|_| eyre!("EXECUTOR_ADDRESS must be set"))?
            .parse()
            .map_err(|e| eyre!("invalid EXECUTOR_ADDRESS: {e}"))?;

        let borrow_asset = match std::env::var("BORROW_ASSET") {
            Ok(s) => s.parse().map_err(|e| eyre!("invalid BORROW_ASSET: {e}"))?,
            Err(_) => tokens::WETH,
        };

        let borrow_amount = parse_u256_var("BORROW_AMOUNT_WEI", U256::from(10u64.pow(18)))?;
        let gas_cost_allowance =
            parse_u256_var("GAS_COST_ALLOWANCE_WEI", U256::from(500_000_000_000_000u64))?;
        let min_profit = parse_u256_var("MIN_PROFIT_WEI", U256::ZERO)?;

        let max_gas_price_gwei: f64 = parse_var("MAX_GAS_PRICE_GWEI", 0.1)?;

        Ok(Self {
            rpc_url,
            flashblocks_ws_url: std::env::var("FLASHBLOCKS_WS_URL").ok(),
            preconf_rpc_url: std::env::var("PRECONF_RPC_URL").ok(),
            executor_address,
            borrow_asset,
            borrow_amount,
            slippage_bps: parse_var("SLIPPAGE_BPS", 30)?,
            gas_cost_allowance,
            min_profit,
            min_profit_bps: parse_var("MIN_PROFIT_BPS", 0)?,
            max_gas_price: (max_gas_price_gwei * 1e9) as u128,
            scan_interval: Duration::from_millis(parse_var("SCAN_INTERVAL_MS", 4000)?),
            batch_size: parse_var("SCAN_BATCH_SIZE", 5)?,
            odos_requests_per_sec: parse_var("ODOS_REQUESTS_PER_SEC", 5)?,
            tokens_file: std::env::var("TOKENS_FILE")
                .unwrap_or_else(|_| "data/tokens.json".to_string()),
            paths_file: std::env::var("PATHS_FILE")
                .unwrap_or_else(|_| "data/paths.json".to_string()),
        })
    }

    /// Log configuration on startup for debugging
    pub fn log_summary(&self) {
        tracing::info!("RPC URL: {}", self.rpc_url);
        tracing::info!(
            "Flashblocks: {}",
            self.flashblocks_ws_url.as_deref().unwrap_or("disabled (polling mode)")
        );
        tracing::info!("Executor: {}", self.executor_address);
        tracing::info!("Borrow: {} of {}", self.borrow_amount, self.borrow_asset);
        tracing::info!(
            "Slippage: {} bps | Gas allowance: {} wei | Min profit: {} wei / {} bps",
            self.slippage_bps,
            self.gas_cost_allowance,
            self.min_profit,
            self.min_profit_bps
        );
        tracing::info!(
            "Gas ceiling: {} wei | Scan interval: {:?} | Batch size: {}",
            self.max_gas_price,
            self.scan_interval,
            self.batch_size
        );
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(s) => s.parse().map_err(|e| eyre!("invalid {name}: {e}")),
        Err(_) => Ok(default),
    }
}

fn parse_u256_var(name: &str, default: U256) -> Result<U256> {
    match std::env::var(name) {
        Ok(s) => U256::from_str_radix(&s, 10).map_err(|e| eyre!("invalid {name}: {e}")),
        Err(_) => Ok(default),
    }
}
