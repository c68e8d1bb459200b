//! staking-cart: inspect and execute a persisted staking transaction cart

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use staking_cart::flows::format::{TOKEN_DECIMALS, format_units};
use staking_cart::storage::SqliteKvStore;
use staking_cart::tx_queue::{CartTxType, RawTransaction, TxMetadata};
use staking_cart::{
    AddOptions, CartError, CartResult, CartRunner, CartStore, CartTransaction, Config, RunSummary,
};

#[derive(Parser, Debug)]
#[command(
    name = "staking-cart",
    about = "Inspect and execute a persisted staking transaction cart",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List transactions and their status (default)
    Status,

    /// Queue transactions from a JSON array
    Import {
        /// Path to the import file
        file: PathBuf,
    },

    /// Resume in-flight transactions, then run the queue
    Run,

    /// Only finalize in-flight transactions
    Resume,

    /// Return a failed transaction to the queue
    Retry { id: String },

    /// Mark an executing transaction whose receipt never arrived as failed
    Abandon { id: String },

    /// Drop a transaction
    Remove { id: String },

    /// Drop completed transactions
    ClearCompleted,

    /// Empty the cart
    Clear,
}

/// One entry of an import file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportEntry {
    #[serde(rename = "type")]
    tx_type: CartTxType,
    label: String,
    #[serde(default)]
    description: String,
    transaction: RawTransaction,
    #[serde(default)]
    metadata: TxMetadata,
    /// Skip entries whose `{to, data, value}` is already queued
    #[serde(default = "default_prevent_duplicate")]
    prevent_duplicate: bool,
}

fn default_prevent_duplicate() -> bool {
    true
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command.unwrap_or(Command::Status)).await {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command) -> CartResult<()> {
    let config = Config::from_env()?;

    log::info!("Opening cart database at {}", config.database_path);
    let storage = Arc::new(SqliteKvStore::open(&config.database_path)?);
    let cart = Arc::new(CartStore::load(storage, config.storage_key.clone())?);

    match command {
        Command::Status => print_status(&cart),
        Command::Import { file } => {
            import(&cart, &file)?;
            print_status(&cart);
        }
        Command::Run => {
            let summary = runner(&config, &cart)?.execute_all().await?;
            print_summary(&summary);
        }
        Command::Resume => {
            let summary = runner(&config, &cart)?.resume_in_flight().await?;
            print_summary(&summary);
        }
        Command::Retry { id } => cart.retry(&id)?,
        Command::Abandon { id } => {
            cart.abandon(&id)?;
            println!("Marked {} as failed; use `retry` to queue it again", id);
        }
        Command::Remove { id } => {
            let tx = cart.remove(&id)?;
            println!("Removed {} ({})", tx.id, tx.label);
        }
        Command::ClearCompleted => {
            println!("Removed {} completed transactions", cart.clear_completed()?)
        }
        Command::Clear => cart.clear()?,
    }
    Ok(())
}

fn runner(config: &Config, cart: &Arc<CartStore>) -> CartResult<CartRunner> {
    let submitter = staking_cart::wallet::create_submitter(config)
        .map_err(|e| CartError::Config(e.to_string()))?;
    Ok(CartRunner::new(cart.clone(), submitter))
}

fn import(cart: &CartStore, path: &Path) -> CartResult<()> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CartError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let entries: Vec<ImportEntry> = serde_json::from_str(&raw)?;

    let before = cart.len();
    for entry in entries {
        let options = AddOptions {
            prevent_duplicate: entry.prevent_duplicate,
        };
        let tx =
            CartTransaction::new(entry.tx_type, entry.label, entry.transaction, entry.metadata)
                .with_description(entry.description);
        cart.add(tx, options)?;
    }
    log::info!(
        "Imported {} new transactions from {}",
        cart.len() - before,
        path.display()
    );
    Ok(())
}

fn print_status(cart: &CartStore) {
    let txs = cart.list();
    if txs.is_empty() {
        println!("Cart is empty");
        return;
    }
    for tx in txs {
        let hash = tx
            .tx_hash
            .or(tx.safe_tx_hash)
            .map(|h| format!("{:?}", h))
            .unwrap_or_else(|| "-".to_string());
        let step = tx
            .metadata
            .step_type
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let amount = tx
            .metadata
            .amount
            .map(|a| format_units(a, TOKEN_DECIMALS))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<10} {:<16} {:<24} amount={} hash={}",
            tx.id,
            tx.status.to_string(),
            step,
            tx.label,
            amount,
            hash
        );
        if let (Some(error), Some(kind)) = (&tx.error, tx.error_kind) {
            println!("    {}: {}", kind, error);
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "completed: {}  failed: {}  in flight: {}  blocked: {}",
        summary.completed.len(),
        summary.failed.len(),
        summary.in_flight.len(),
        summary.blocked.len()
    );
    for id in &summary.failed {
        println!("  failed: {}", id);
    }
    for id in &summary.in_flight {
        println!("  awaiting receipt: {}", id);
    }
}
