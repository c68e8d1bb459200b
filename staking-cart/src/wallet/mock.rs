//! Scripted submitter for runner tests

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ReceiptOutcome, SubmitOutcome, TransactionSubmitter};
use crate::error::TxError;
use crate::tx_queue::{CartStore, CartTxStatus, RawTransaction};

#[derive(Debug, Clone)]
pub enum Behavior {
    /// Mined with status 1
    Succeed,
    /// Signature declined
    Reject,
    /// Mined with status 0
    Revert,
    /// Sent, but the receipt never arrives
    ReceiptTimeout,
    /// Proposed to a Safe
    SafeProposal,
}

#[derive(Default)]
pub struct MockSubmitter {
    behaviors: Mutex<HashMap<Bytes, Behavior>>,
    receipts: Mutex<HashMap<H256, Behavior>>,
    submitted: Mutex<Vec<Bytes>>,
    watched: Mutex<Vec<H256>>,
    observer: Mutex<Option<Arc<CartStore>>>,
    max_executing: Mutex<usize>,
}

impl MockSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behavior for transactions carrying `data`
    pub fn on(&self, data: impl Into<Bytes>, behavior: Behavior) {
        self.behaviors.lock().insert(data.into(), behavior);
    }

    /// Script the receipt for an already-submitted hash
    pub fn on_receipt(&self, tx_hash: H256, behavior: Behavior) {
        self.receipts.lock().insert(tx_hash, behavior);
    }

    /// Record how many cart entries are executing at each submit
    pub fn observe(&self, cart: Arc<CartStore>) {
        *self.observer.lock() = Some(cart);
    }

    /// Calldata of every submit, in order
    pub fn submitted(&self) -> Vec<Bytes> {
        self.submitted.lock().clone()
    }

    pub fn watched(&self) -> Vec<H256> {
        self.watched.lock().clone()
    }

    pub fn max_executing(&self) -> usize {
        *self.max_executing.lock()
    }

    pub fn hash_for(data: &[u8]) -> H256 {
        H256::from(keccak256(data))
    }
}

#[async_trait]
impl TransactionSubmitter for MockSubmitter {
    async fn submit(&self, tx: &RawTransaction) -> Result<SubmitOutcome, TxError> {
        if let Some(cart) = self.observer.lock().as_ref() {
            let executing = cart.list_by_status(CartTxStatus::Executing).len();
            let mut max = self.max_executing.lock();
            *max = (*max).max(executing);
        }

        self.submitted.lock().push(tx.data.clone());
        let behavior = self
            .behaviors
            .lock()
            .get(&tx.data)
            .cloned()
            .unwrap_or(Behavior::Succeed);

        let tx_hash = Self::hash_for(tx.data.as_ref());
        match behavior {
            Behavior::Reject => Err(TxError::user_rejected("User rejected the request.")),
            Behavior::SafeProposal => Ok(SubmitOutcome::SafeProposal(tx_hash)),
            other => {
                self.receipts.lock().insert(tx_hash, other);
                Ok(SubmitOutcome::Transaction(tx_hash))
            }
        }
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<ReceiptOutcome, TxError> {
        self.watched.lock().push(tx_hash);
        let behavior = self
            .receipts
            .lock()
            .get(&tx_hash)
            .cloned()
            .unwrap_or(Behavior::Succeed);

        match behavior {
            Behavior::ReceiptTimeout => {
                Err(TxError::timeout(format!("No receipt for {:?}", tx_hash)))
            }
            Behavior::Revert => Ok(ReceiptOutcome {
                tx_hash,
                success: false,
                block_number: Some(1),
                gas_used: Some(U256::from(45_000u64)),
            }),
            _ => Ok(ReceiptOutcome {
                tx_hash,
                success: true,
                block_number: Some(1),
                gas_used: Some(U256::from(21_000u64)),
            }),
        }
    }

    fn address(&self) -> Address {
        Address::repeat_byte(0xee)
    }

    fn mode_name(&self) -> &'static str {
        "mock"
    }
}
