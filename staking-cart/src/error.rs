//! Error types for the staking cart
//!
//! Two layers:
//! - [`TxError`]: why a single transaction failed. The [`TxErrorKind`] is set
//!   where the failure originates (wallet, RPC, receipt), never inferred later
//!   from the message text.
//! - [`CartError`]: why a cart or runner operation was refused.

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

/// Classification of a transaction failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TxErrorKind {
    /// The signer declined the request
    UserRejected,
    /// Mined with status 0, or rejected by the node as a revert
    Reverted,
    /// No receipt within the configured window
    Timeout,
    /// Transport or JSON-RPC failure
    Rpc,
    /// Local signer or wallet misconfiguration
    Wallet,
}

/// A transaction-level failure reported by the wallet boundary
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TxError {
    pub kind: TxErrorKind,
    pub message: String,
}

impl TxError {
    pub fn new(kind: TxErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn user_rejected(message: impl Into<String>) -> Self {
        Self::new(TxErrorKind::UserRejected, message)
    }

    pub fn reverted(message: impl Into<String>) -> Self {
        Self::new(TxErrorKind::Reverted, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TxErrorKind::Timeout, message)
    }

    pub fn rpc(message: impl Into<String>) -> Self {
        Self::new(TxErrorKind::Rpc, message)
    }

    pub fn wallet(message: impl Into<String>) -> Self {
        Self::new(TxErrorKind::Wallet, message)
    }

    /// Rejections are dismissable; everything else should be surfaced as an alert
    pub fn is_user_rejection(&self) -> bool {
        self.kind == TxErrorKind::UserRejected
    }
}

/// Errors returned by cart and runner operations
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Transaction {0} not found")]
    NotFound(String),

    #[error("Transaction {0} is already executing")]
    AlreadyExecuting(String),

    #[error("Transaction {id} is not pending (status: {status})")]
    NotPending { id: String, status: String },

    #[error("Transaction {id} is not executing (status: {status})")]
    NotExecuting { id: String, status: String },

    #[error("Transaction {0} has no recorded hash")]
    MissingHash(String),

    #[error("Transaction {0} has unmet dependencies")]
    DependencyNotMet(String),

    #[error("A cart runner is already active")]
    AlreadyRunning,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl From<rusqlite::Error> for CartError {
    fn from(err: rusqlite::Error) -> Self {
        CartError::Storage(err.to_string())
    }
}

/// Result alias for cart operations
pub type CartResult<T> = std::result::Result<T, CartError>;
