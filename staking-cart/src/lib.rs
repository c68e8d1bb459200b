//! Staking transaction cart
//!
//! Queues the raw transactions of staking flows, gates them on their declared
//! dependencies, persists the queue after every change and executes it one
//! transaction at a time through a wallet.

pub mod config;
pub mod error;
pub mod events;
pub mod execution;
pub mod flows;
pub mod storage;
pub mod tx_queue;
pub mod wallet;

pub use config::Config;
pub use error::{CartError, CartResult, TxError, TxErrorKind};
pub use execution::{CartRunner, RunSummary};
pub use tx_queue::{AddOptions, CartStore, CartTransaction, CartTxStatus};
