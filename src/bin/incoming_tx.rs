//! Incoming transaction sync tool
//!
//! Runs one reconciliation cycle for an address and prints what was found.
//!
//! ## Usage
//! ```bash
//! # Fetch incoming transactions on mainnet (memory only)
//! cargo run --bin incoming-tx --features cli -- --address xdc8c4e2a0b7d6fa8d1e05af5aa27ab13d8a5d2cc10
//!
//! # Start at a specific block on a test network
//! cargo run --bin incoming-tx --features cli -- --address 0x8c4e... --network goerli --from-block 120000
//!
//! # Keep progress between runs (requires the 'storage' feature)
//! cargo run --bin incoming-tx --features cli,storage -- --address 0x8c4e... --database ./incoming.db
//!
//! # Script friendly output
//! cargo run --bin incoming-tx --features cli -- --address 0x8c4e... --format json --quiet
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use incoming_tx_tracker::{
    data_structures::NetworkId,
    errors::{IncomingTxError, IncomingTxResult},
    events::listeners::LoggingListener,
    scanning::{
        CycleParams, CycleReport, IncomingTransactionsTracker, LocalBlockTracker,
        LocalNetworkProvider, LocalPreferences, PreferencesSnapshot, TrackerConfig,
    },
    storage::IncrementalStateStore,
};

/// Incoming transaction sync CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Address to fetch incoming transactions for (0x or xdc prefix)
    #[arg(short, long)]
    address: String,

    /// Network type name
    #[arg(short, long, default_value = "mainnet")]
    network: String,

    /// Block to start from when the network has no stored progress
    #[arg(long)]
    from_block: Option<u64>,

    /// Explorer host override, e.g. http://127.0.0.1:8080
    #[arg(short, long)]
    base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// SQLite database for persisted state
    #[cfg(feature = "storage")]
    #[arg(long)]
    database: Option<String>,

    /// Output format: summary, json
    #[arg(long, default_value = "summary")]
    format: String,

    /// Only print the result
    #[arg(short, long)]
    quiet: bool,
}

#[cfg(feature = "storage")]
async fn open_store(args: &CliArgs) -> IncomingTxResult<Arc<IncrementalStateStore>> {
    let store = match &args.database {
        Some(path) => {
            let backend = incoming_tx_tracker::storage::SqliteIncomingTxStorage::new(path).await?;
            IncrementalStateStore::open(Arc::new(backend)).await?
        }
        None => IncrementalStateStore::in_memory().await?,
    };
    Ok(Arc::new(store))
}

#[cfg(not(feature = "storage"))]
async fn open_store(_args: &CliArgs) -> IncomingTxResult<Arc<IncrementalStateStore>> {
    Ok(Arc::new(IncrementalStateStore::in_memory().await?))
}

fn print_summary(report: &CycleReport, total: usize) {
    println!(
        "Network {} | address {} | blocks from {} | {} new, {} already known",
        report.network,
        report.address,
        report
            .from_block
            .map(|b| b.to_string())
            .unwrap_or_else(|| "genesis".to_string()),
        report.new_transactions.len(),
        report.summary.already_known,
    );
    for tx in &report.new_transactions {
        println!(
            "  {} block {} from {} value {}",
            tx.hash,
            tx.block_number
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string()),
            tx.tx_params.from,
            tx.tx_params.value,
        );
    }
    match report.summary.last_fetched_block {
        Some(block) => println!("Next fetch starts at block {block} ({total} stored)"),
        None => println!("No block progress recorded ({total} stored)"),
    }
}

#[tokio::main]
async fn main() -> IncomingTxResult<()> {
    let args = CliArgs::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if NetworkId::resolve(&args.network).is_none() {
        return Err(IncomingTxError::Configuration(format!(
            "Unsupported network '{}'",
            args.network
        )));
    }
    if !matches!(args.format.as_str(), "summary" | "json") {
        return Err(IncomingTxError::Configuration(format!(
            "Unknown output format '{}'",
            args.format
        )));
    }

    let mut config =
        TrackerConfig::default().with_request_timeout(Duration::from_secs(args.timeout));
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url);
    }
    config.validate()?;

    let signal_buffer = config.signal_buffer;
    let store = open_store(&args).await?;
    let listener = if args.quiet {
        LoggingListener::quiet()
    } else {
        LoggingListener::new()
    };
    let tracker = IncomingTransactionsTracker::builder()
        .with_config(config)
        .with_store(Arc::clone(&store))
        .with_block_tracker(Arc::new(LocalBlockTracker::new(signal_buffer)))
        .with_network_provider(Arc::new(LocalNetworkProvider::new(
            &args.network,
            signal_buffer,
        )))
        .with_preferences(Arc::new(LocalPreferences::new(PreferencesSnapshot::new(
            Some(args.address.clone()),
            true,
        ))))
        .with_event_listener(Box::new(listener))
        .build()
        .await?;

    let mut params = CycleParams::new(&args.address).with_network(&args.network);
    params.block_number = args.from_block;

    let Some(report) = tracker.run_cycle(params).await else {
        return Err(IncomingTxError::Explorer(
            "Cycle did not complete, see log output".to_string(),
        ));
    };

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_summary(&report, store.transaction_count().await),
    }
    Ok(())
}
