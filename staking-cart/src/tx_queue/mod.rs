//! Transaction cart
//!
//! An ordered queue of raw transactions waiting to be signed and sent one at
//! a time.
//!
//! ## Flow
//! 1. A staking flow adds its steps (operator update, staker upgrade, token
//!    approval, stake) with per-step dependencies
//! 2. The runner picks the first pending transaction whose dependencies are
//!    completed, submits it and waits for the receipt
//! 3. Status and hashes are persisted after every change, so a restart can
//!    resume watching instead of re-submitting

pub mod bigint;
pub mod dependency;
mod manager;
pub mod signature;
mod types;

pub use dependency::Gate;
pub use manager::{AddOptions, CartStore, DEFAULT_STORAGE_KEY};
pub use types::{
    CartTransaction, CartTxStatus, CartTxType, Dependency, RawTransaction, StepType, TxMetadata,
};
