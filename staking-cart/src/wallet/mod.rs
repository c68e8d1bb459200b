//! Wallet boundary
//!
//! The runner only needs two asynchronous calls from a wallet: submit a raw
//! transaction and wait for its receipt. [`TransactionSubmitter`] abstracts
//! them so a JSON-RPC signer, a multisig, or a scripted test double can sit
//! behind the same runner.
//!
//! Failures come back as [`TxError`] with their kind already decided.

pub mod local_signer;
#[cfg(test)]
pub(crate) mod mock;
mod rpc;

pub use rpc::{EthersSubmitter, classify_rpc_error};

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use std::sync::Arc;

use crate::config::Config;
use crate::error::TxError;
use crate::tx_queue::RawTransaction;

/// What the wallet did with a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Broadcast on-chain; wait for this hash
    Transaction(H256),
    /// Proposed to a Safe; no receipt to wait for
    SafeProposal(H256),
}

/// Result of waiting on a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptOutcome {
    pub tx_hash: H256,
    /// Receipt status == 1
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

/// Trait for wallets the runner can submit through
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Sign and send. Resolves once the wallet has a hash, not when mined.
    async fn submit(&self, tx: &RawTransaction) -> Result<SubmitOutcome, TxError>;

    /// Wait until `tx_hash` is mined or the wallet's timeout elapses
    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<ReceiptOutcome, TxError>;

    /// Sending address
    fn address(&self) -> Address;

    /// Mode name for logging
    fn mode_name(&self) -> &'static str;
}

/// Create the JSON-RPC submitter described by `config`
pub fn create_submitter(config: &Config) -> Result<Arc<dyn TransactionSubmitter>, TxError> {
    let wallet = match &config.private_key {
        Some(key) => local_signer::from_private_key(key, config.chain_id)?,
        None => local_signer::from_env(config.chain_id)?,
    };

    log::info!(
        "[Wallet] Initializing RPC submitter for {} on chain {} via {}",
        local_signer::display_address(&wallet),
        config.chain_id,
        config.rpc_url
    );

    let submitter = EthersSubmitter::new(
        &config.rpc_url,
        wallet,
        config.receipt_timeout,
        config.receipt_poll_interval,
    )?;
    Ok(Arc::new(submitter))
}
