use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use clap::{Parser, Subcommand};
use eyre::Result;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod aggregator;
mod config;
mod contract;
mod evaluator;
mod executor;
mod flashblocks;
mod limiter;
mod nonce;
mod quote;
mod scanner;
mod scheduler;
mod step;
mod tokens;
mod venues;

use aggregator::QuoteAggregator;
use config::Config;
use contract::Preflight;
use evaluator::{EvalParams, PathEvaluator};
use executor::ExecutionOrchestrator;
use limiter::ApiLimiter;
use scanner::OpportunityScanner;
use scheduler::{ScanScheduler, Strategy};
use step::StepBuilder;
use tokens::TokenBook;
use venues::{
    aerodrome::AerodromeSource, odos::OdosClient, pancake_v3::PancakeV3Source,
    sushi_v2::SushiV2Source, uniswap_v3::UniswapV3Source, QuoteSource,
};

#[derive(Parser)]
#[command(name = "base-flash-arb")]
#[command(about = "Base mainnet flash-loan arbitrage bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan and execute continuously (default)
    Run,

    /// One scan sweep, printed and not executed
    Scan,

    /// List the loaded candidate paths
    Paths,
}

fn connect(url: &str) -> Result<DynProvider> {
    let url: reqwest::Url = url.parse()?;
    Ok(ProviderBuilder::new().connect_http(url).erased())
}

fn connect_with_wallet(url: &str, signer: PrivateKeySigner) -> Result<DynProvider> {
    let url: reqwest::Url = url.parse()?;
    let wallet = EthereumWallet::from(signer);
    Ok(ProviderBuilder::new()
        .wallet(wallet)
        .connect_http(url)
        .erased())
}

/// Wire quoting, step building, simulation, and evaluation into a scanner.
fn build_scanner(
    provider: DynProvider,
    cfg: &Config,
    caller: Address,
) -> Result<(Arc<OpportunityScanner>, Arc<TokenBook>)> {
    let book = Arc::new(TokenBook::load(&cfg.tokens_file)?);
    let paths = tokens::load_paths(&cfg.paths_file, cfg.borrow_asset)?;

    let limiter = Arc::new(ApiLimiter::per_second(cfg.odos_requests_per_sec));
    let odos = Arc::new(OdosClient::new(limiter, cfg.executor_address)?);

    let sources: Vec<Arc<dyn QuoteSource>> = vec![
        Arc::new(UniswapV3Source::new(provider.clone())),
        Arc::new(PancakeV3Source::new(provider.clone())),
        Arc::new(AerodromeSource::new(provider.clone())),
        Arc::new(SushiV2Source::new(provider.clone())),
        odos.clone(),
    ];

    let evaluator = Arc::new(PathEvaluator::new(
        Arc::new(QuoteAggregator::new(sources)),
        Arc::new(StepBuilder::new(cfg.slippage_bps, odos)),
        Arc::new(Preflight::new(provider, cfg.executor_address, caller)),
        EvalParams::from(cfg),
        book.clone(),
    ));

    let scanner = Arc::new(OpportunityScanner::new(evaluator, paths, cfg.batch_size));
    Ok((scanner, book))
}

async fn run_bot(cfg: Config) -> Result<()> {
    let private_key =
        std::env::var("PRIVATE_KEY").map_err(|_| eyre::eyre!("PRIVATE_KEY must be set"))?;
    let signer = PrivateKeySigner::from_str(&private_key)?;
    let sender = signer.address();
    tracing::info!("sender wallet: {}", sender);

    let provider = connect_with_wallet(&cfg.rpc_url, signer)?;
    let preconf = match &cfg.preconf_rpc_url {
        Some(url) => Some(connect(url)?),
        None => None,
    };

    let chain_id = provider.get_chain_id().await?;
    if chain_id != config::CHAIN_ID {
        return Err(eyre::eyre!(
            "RPC is chain {}, expected Base ({})",
            chain_id,
            config::CHAIN_ID
        ));
    }

    let (scanner, _book) = build_scanner(provider.clone(), &cfg, sender)?;
    tracing::info!("scanning {} candidate paths", scanner.path_count());

    let orchestrator = Arc::new(Mutex::new(ExecutionOrchestrator::new(
        provider, preconf, &cfg, sender,
    )));

    let strategy = match &cfg.flashblocks_ws_url {
        Some(ws_url) => {
            tracing::info!("event-driven scanning on flashblocks feed");
            Strategy::EventDriven {
                ws_url: ws_url.clone(),
            }
        }
        None => {
            tracing::info!("polling every {:?}", cfg.scan_interval);
            Strategy::Polling {
                every: cfg.scan_interval,
            }
        }
    };

    ScanScheduler::new(scanner, orchestrator, strategy)
        .run()
        .await
}

async fn run_scan(cfg: Config) -> Result<()> {
    let provider = connect(&cfg.rpc_url)?;

    // Preflight eth_calls are made from the wallet when one is configured;
    // contracts gating execution by caller will reject plans otherwise.
    let caller = match std::env::var("PRIVATE_KEY") {
        Ok(key) => PrivateKeySigner::from_str(&key)?.address(),
        Err(_) => Address::ZERO,
    };

    let (scanner, _book) = build_scanner(provider, &cfg, caller)?;
    println!(
        "Scanning {} candidate paths (dry run)...",
        scanner.path_count()
    );

    let found = scanner.scan().await;
    if found.is_empty() {
        println!("No profitable opportunities this cycle.");
        return Ok(());
    }

    for (i, opp) in found.iter().enumerate() {
        println!(
            "{:>2}. {}  net {} wei ({:.3}%), {} steps",
            i + 1,
            opp.route,
            opp.net_profit,
            opp.profit_pct,
            opp.steps.len()
        );
    }
    Ok(())
}

fn run_paths(cfg: Config) -> Result<()> {
    let book = TokenBook::load(&cfg.tokens_file)?;
    let paths = tokens::load_paths(&cfg.paths_file, cfg.borrow_asset)?;

    println!("{} tokens, {} candidate paths:", book.len(), paths.len());
    for (i, path) in paths.iter().enumerate() {
        println!("{:>3}. {}", i + 1, path.describe(&book));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let cfg = Config::from_env()?;
    cfg.log_summary();

    match cli.command {
        Some(Commands::Run) | None => run_bot(cfg).await,
        Some(Commands::Scan) => run_scan(cfg).await,
        Some(Commands::Paths) => run_paths(cfg),
    }
}
