//! Cart store
//!
//! Owns the ordered transaction list and the executing pointer, writes the
//! whole state to the [`KvStore`] on every change and rehydrates it on load.
//! Every mutation is applied to a copy, persisted, then committed, so the
//! in-memory cart never runs ahead of what is stored.

use ethers::types::{Address, H256, U256};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::dependency::{self, Gate};
use super::signature;
use super::types::{CartTransaction, CartTxStatus};
use crate::error::{CartError, CartResult, TxError};
use crate::events::{CartEvent, CartEventBroadcaster};
use crate::storage::{KvStore, MemoryKvStore};

/// Default key the cart is stored under
pub const DEFAULT_STORAGE_KEY: &str = "staking-cart";

/// Persisted shape of the cart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartState {
    #[serde(default)]
    transactions: Vec<CartTransaction>,
    #[serde(default)]
    current_executing_id: Option<String>,
}

impl CartState {
    fn find(&self, id: &str) -> CartResult<usize> {
        self.transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| CartError::NotFound(id.to_string()))
    }

    /// Reset state a restart cannot recover. Returns true if anything changed.
    fn normalize(&mut self) -> bool {
        let mut changed = false;

        for tx in &mut self.transactions {
            if tx.status == CartTxStatus::Executing && !tx.has_hash() {
                log::warn!(
                    "[Cart] Transaction {} was executing without a hash, returning it to pending",
                    tx.id
                );
                tx.status = CartTxStatus::Pending;
                tx.touch();
                changed = true;
            }
        }

        let pointer_valid = self.current_executing_id.as_ref().is_some_and(|id| {
            self.transactions
                .iter()
                .any(|t| &t.id == id && t.status == CartTxStatus::Executing)
        });
        if !pointer_valid {
            let in_flight = self
                .transactions
                .iter()
                .find(|t| t.status == CartTxStatus::Executing)
                .map(|t| t.id.clone());
            if in_flight != self.current_executing_id {
                self.current_executing_id = in_flight;
                changed = true;
            }
        }

        changed
    }
}

/// Options for [`CartStore::add`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AddOptions {
    /// Skip the add when a transaction with the same `{to, data, value}` is already queued
    pub prevent_duplicate: bool,
}

impl AddOptions {
    pub fn dedupe() -> Self {
        Self {
            prevent_duplicate: true,
        }
    }
}

/// Persistent, ordered queue of cart transactions
pub struct CartStore {
    state: Mutex<CartState>,
    storage: Arc<dyn KvStore>,
    storage_key: String,
    events: Arc<CartEventBroadcaster>,
}

impl CartStore {
    /// Load the cart stored under `storage_key`, or start empty
    pub fn load(storage: Arc<dyn KvStore>, storage_key: impl Into<String>) -> CartResult<Self> {
        let storage_key = storage_key.into();

        let mut state = match storage.get(&storage_key)? {
            Some(raw) => match serde_json::from_str::<CartState>(&raw) {
                Ok(s) => s,
                Err(e) => {
                    log::error!(
                        "[Cart] Stored cart under '{}' is unreadable, starting empty: {}",
                        storage_key,
                        e
                    );
                    CartState::default()
                }
            },
            None => CartState::default(),
        };

        let changed = state.normalize();
        if changed {
            storage.set(&storage_key, &serde_json::to_string(&state)?)?;
        }

        log::info!(
            "[Cart] Loaded {} transactions from {} store (key: {})",
            state.transactions.len(),
            storage.backend_name(),
            storage_key
        );

        Ok(Self {
            state: Mutex::new(state),
            storage,
            storage_key,
            events: Arc::new(CartEventBroadcaster::new()),
        })
    }

    /// Empty cart backed by memory
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(CartState::default()),
            storage: Arc::new(MemoryKvStore::new()),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            events: Arc::new(CartEventBroadcaster::new()),
        }
    }

    /// Share an existing broadcaster instead of the store's own
    pub fn with_events(mut self, events: Arc<CartEventBroadcaster>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &Arc<CartEventBroadcaster> {
        &self.events
    }

    /// Apply `f` to a copy of the state, persist it, then commit and emit events
    fn commit<R>(
        &self,
        f: impl FnOnce(&mut CartState, &mut Vec<CartEvent>) -> CartResult<R>,
    ) -> CartResult<R> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        let mut events = Vec::new();

        let result = f(&mut next, &mut events)?;

        // Every mutation emits at least one event
        if events.is_empty() {
            return Ok(result);
        }

        let raw = serde_json::to_string(&next)?;
        self.storage.set(&self.storage_key, &raw)?;
        *state = next;
        drop(state);

        for event in events {
            self.events.broadcast(event);
        }
        Ok(result)
    }

    /// Queue a transaction. Returns its id, or the id of the existing
    /// duplicate when `prevent_duplicate` is set and one is found.
    pub fn add(&self, tx: CartTransaction, options: AddOptions) -> CartResult<String> {
        // Lookup and insert share one lock so concurrent adds cannot both pass the check
        self.commit(|state, events| {
            if options.prevent_duplicate {
                let sig = signature::of(&tx.transaction);
                if let Some(existing) = state
                    .transactions
                    .iter()
                    .find(|t| signature::of(&t.transaction) == sig)
                {
                    log::info!(
                        "[Cart] Skipping duplicate of {} ('{}'), signature {:?}",
                        existing.id,
                        tx.label,
                        sig
                    );
                    return Ok(existing.id.clone());
                }
            }

            log::info!("[Cart] Adding {} '{}' to {:?}", tx.id, tx.label, tx.transaction.to);
            let id = tx.id.clone();
            events.push(CartEvent::Added {
                id: id.clone(),
                label: tx.label.clone(),
            });
            state.transactions.push(tx);
            Ok(id)
        })
    }

    /// Remove a transaction; the executing one cannot be removed
    pub fn remove(&self, id: &str) -> CartResult<CartTransaction> {
        self.commit(|state, events| {
            let idx = state.find(id)?;
            if state.transactions[idx].status == CartTxStatus::Executing {
                return Err(CartError::AlreadyExecuting(id.to_string()));
            }
            let tx = state.transactions.remove(idx);
            log::info!("[Cart] Removed {} '{}'", tx.id, tx.label);
            events.push(CartEvent::Removed { id: tx.id.clone() });
            Ok(tx)
        })
    }

    /// Empty the cart; refused while a transaction is executing
    pub fn clear(&self) -> CartResult<()> {
        self.commit(|state, events| {
            if let Some(id) = &state.current_executing_id {
                return Err(CartError::AlreadyExecuting(id.clone()));
            }
            log::info!("[Cart] Clearing {} transactions", state.transactions.len());
            state.transactions.clear();
            events.push(CartEvent::Cleared);
            Ok(())
        })
    }

    /// Drop completed transactions, keeping the rest in order
    pub fn clear_completed(&self) -> CartResult<usize> {
        self.commit(|state, events| {
            let before = state.transactions.len();
            state.transactions.retain(|t| {
                let keep = t.status != CartTxStatus::Completed;
                if !keep {
                    events.push(CartEvent::Removed { id: t.id.clone() });
                }
                keep
            });
            let removed = before - state.transactions.len();
            if removed > 0 {
                log::info!("[Cart] Cleared {} completed transactions", removed);
            }
            Ok(removed)
        })
    }

    /// Claim the single executing slot for a pending transaction
    pub fn mark_executing(&self, id: &str) -> CartResult<()> {
        self.commit(|state, events| {
            if let Some(current) = &state.current_executing_id {
                return Err(CartError::AlreadyExecuting(current.clone()));
            }
            let idx = state.find(id)?;
            let tx = &mut state.transactions[idx];
            if tx.status != CartTxStatus::Pending {
                return Err(CartError::NotPending {
                    id: id.to_string(),
                    status: tx.status.to_string(),
                });
            }
            log::info!("[Cart] Executing {} '{}'", tx.id, tx.label);
            tx.status = CartTxStatus::Executing;
            tx.error = None;
            tx.error_kind = None;
            tx.touch();
            state.current_executing_id = Some(id.to_string());
            events.push(status_event(&state.transactions[idx]));
            Ok(())
        })
    }

    /// Record the on-chain hash of the executing transaction
    pub fn mark_submitted(&self, id: &str, tx_hash: H256) -> CartResult<()> {
        self.record_hash(id, |tx| tx.tx_hash = Some(tx_hash))
    }

    /// Record the Safe proposal hash of the executing transaction
    pub fn mark_safe_submitted(&self, id: &str, safe_tx_hash: H256) -> CartResult<()> {
        self.record_hash(id, |tx| tx.safe_tx_hash = Some(safe_tx_hash))
    }

    fn record_hash(&self, id: &str, set: impl FnOnce(&mut CartTransaction)) -> CartResult<()> {
        self.commit(|state, events| {
            let idx = state.find(id)?;
            let tx = &mut state.transactions[idx];
            if tx.status != CartTxStatus::Executing {
                return Err(CartError::NotPending {
                    id: id.to_string(),
                    status: tx.status.to_string(),
                });
            }
            set(tx);
            tx.touch();
            log::info!(
                "[Cart] Transaction {} submitted (tx_hash: {:?}, safe_tx_hash: {:?})",
                tx.id,
                tx.tx_hash,
                tx.safe_tx_hash
            );
            events.push(status_event(tx));
            Ok(())
        })
    }

    /// Finalize the executing transaction; it must carry a hash
    pub fn mark_completed(&self, id: &str) -> CartResult<()> {
        self.commit(|state, events| {
            let idx = state.find(id)?;
            let tx = &mut state.transactions[idx];
            if tx.status != CartTxStatus::Executing {
                return Err(CartError::NotPending {
                    id: id.to_string(),
                    status: tx.status.to_string(),
                });
            }
            if !tx.has_hash() {
                return Err(CartError::MissingHash(id.to_string()));
            }
            log::info!("[Cart] Transaction {} completed", tx.id);
            tx.status = CartTxStatus::Completed;
            tx.touch();
            events.push(status_event(tx));
            if state.current_executing_id.as_deref() == Some(id) {
                state.current_executing_id = None;
            }
            Ok(())
        })
    }

    /// Mark a pending or executing transaction as failed
    pub fn mark_failed(&self, id: &str, error: &TxError) -> CartResult<()> {
        self.commit(|state, events| {
            let idx = state.find(id)?;
            let tx = &mut state.transactions[idx];
            if tx.is_terminal() {
                return Err(CartError::NotPending {
                    id: id.to_string(),
                    status: tx.status.to_string(),
                });
            }
            if error.is_user_rejection() {
                log::info!("[Cart] Transaction {} rejected by user", tx.id);
            } else {
                log::warn!("[Cart] Transaction {} failed: {}", tx.id, error);
            }
            tx.status = CartTxStatus::Failed;
            tx.record_error(error);
            tx.touch();
            events.push(status_event(tx));
            if state.current_executing_id.as_deref() == Some(id) {
                state.current_executing_id = None;
            }
            Ok(())
        })
    }

    /// Give up on an executing transaction whose receipt never arrived
    /// (dropped or replaced nonce). It is marked failed with a timeout so it
    /// can be retried or removed.
    pub fn abandon(&self, id: &str) -> CartResult<()> {
        self.commit(|state, events| {
            let idx = state.find(id)?;
            let tx = &mut state.transactions[idx];
            if tx.status != CartTxStatus::Executing {
                return Err(CartError::NotExecuting {
                    id: id.to_string(),
                    status: tx.status.to_string(),
                });
            }
            let error = TxError::timeout(format!(
                "Abandoned after no receipt for {:?}",
                tx.tx_hash.or(tx.safe_tx_hash)
            ));
            log::warn!("[Cart] Abandoning {} '{}': {}", tx.id, tx.label, error);
            tx.status = CartTxStatus::Failed;
            tx.record_error(&error);
            tx.touch();
            events.push(status_event(tx));
            if state.current_executing_id.as_deref() == Some(id) {
                state.current_executing_id = None;
            }
            Ok(())
        })
    }

    /// Return a failed transaction to the queue
    pub fn retry(&self, id: &str) -> CartResult<()> {
        self.commit(|state, events| {
            let idx = state.find(id)?;
            let tx = &mut state.transactions[idx];
            if tx.status != CartTxStatus::Failed {
                return Err(CartError::NotPending {
                    id: id.to_string(),
                    status: tx.status.to_string(),
                });
            }
            log::info!("[Cart] Retrying {} '{}'", tx.id, tx.label);
            tx.status = CartTxStatus::Pending;
            tx.error = None;
            tx.error_kind = None;
            tx.tx_hash = None;
            tx.safe_tx_hash = None;
            tx.touch();
            events.push(status_event(tx));
            Ok(())
        })
    }

    pub fn get(&self, id: &str) -> Option<CartTransaction> {
        self.state.lock().transactions.iter().find(|t| t.id == id).cloned()
    }

    /// All transactions in queue order
    pub fn list(&self) -> Vec<CartTransaction> {
        self.state.lock().transactions.clone()
    }

    pub fn list_by_status(&self, status: CartTxStatus) -> Vec<CartTransaction> {
        self.state
            .lock()
            .transactions
            .iter()
            .filter(|t| t.status == status)
            .cloned()
            .collect()
    }

    /// Find a queued transaction by its `{to, data, value}` content
    pub fn get_by_signature(
        &self,
        to: &Address,
        data: &[u8],
        value: &U256,
    ) -> Option<CartTransaction> {
        let sig = signature::compute(to, data, value);
        self.state
            .lock()
            .transactions
            .iter()
            .find(|t| signature::of(&t.transaction) == sig)
            .cloned()
    }

    pub fn current_executing(&self) -> Option<CartTransaction> {
        let state = self.state.lock();
        let id = state.current_executing_id.as_ref()?;
        state.transactions.iter().find(|t| &t.id == id).cloned()
    }

    /// Executing transactions that already have a hash and only need watching
    pub fn in_flight(&self) -> Vec<CartTransaction> {
        self.state
            .lock()
            .transactions
            .iter()
            .filter(|t| t.status == CartTxStatus::Executing && t.has_hash())
            .cloned()
            .collect()
    }

    /// Next pending transaction the dependency gate lets through
    pub fn next_eligible(&self) -> Option<CartTransaction> {
        let state = self.state.lock();
        dependency::next_eligible(&state.transactions).cloned()
    }

    pub fn gate(&self, id: &str) -> CartResult<Gate> {
        let state = self.state.lock();
        let idx = state.find(id)?;
        Ok(dependency::check(&state.transactions[idx], &state.transactions))
    }

    pub fn count_by_status(&self) -> HashMap<CartTxStatus, usize> {
        let mut counts = HashMap::new();
        for tx in &self.state.lock().transactions {
            *counts.entry(tx.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.state.lock().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn status_event(tx: &CartTransaction) -> CartEvent {
    CartEvent::StatusChanged {
        id: tx.id.clone(),
        status: tx.status,
        tx_hash: tx.tx_hash.or(tx.safe_tx_hash).map(|h| format!("{:?}", h)),
        error_kind: tx.error_kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteKvStore;
    use crate::tx_queue::types::{CartTxType, Dependency, RawTransaction, StepType, TxMetadata};

    fn create_test_tx(label: &str, data: Vec<u8>) -> CartTransaction {
        CartTransaction::new(
            CartTxType::Delegation,
            label,
            RawTransaction::new(Address::repeat_byte(0x12), data, U256::zero()),
            TxMetadata::default(),
        )
    }

    fn hash(b: u8) -> H256 {
        H256::repeat_byte(b)
    }

    #[test]
    fn test_duplicate_prevention_keeps_length() {
        let cart = CartStore::in_memory();
        let first = cart.add(create_test_tx("approve", vec![1, 2]), AddOptions::dedupe()).unwrap();
        let second = cart
            .add(create_test_tx("approve again", vec![1, 2]), AddOptions::dedupe())
            .unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(first, second);

        // Without the flag, identical content is queued twice
        cart.add(create_test_tx("approve", vec![1, 2]), AddOptions::default()).unwrap();
        assert_eq!(cart.len(), 2);
    }

    #[test]
    fn test_get_by_signature() {
        let cart = CartStore::in_memory();
        let id = cart.add(create_test_tx("stake", vec![9]), AddOptions::default()).unwrap();

        let found = cart.get_by_signature(&Address::repeat_byte(0x12), &[9], &U256::zero());
        assert_eq!(found.map(|t| t.id), Some(id));
        assert!(cart.get_by_signature(&Address::repeat_byte(0x12), &[8], &U256::zero()).is_none());
    }

    #[test]
    fn test_status_lifecycle() {
        let cart = CartStore::in_memory();
        let id = cart.add(create_test_tx("stake", vec![1]), AddOptions::default()).unwrap();

        cart.mark_executing(&id).unwrap();
        assert_eq!(cart.current_executing().map(|t| t.id), Some(id.clone()));

        // Cannot complete without a hash
        assert!(matches!(cart.mark_completed(&id), Err(CartError::MissingHash(_))));

        cart.mark_submitted(&id, hash(1)).unwrap();
        cart.mark_completed(&id).unwrap();

        let tx = cart.get(&id).unwrap();
        assert_eq!(tx.status, CartTxStatus::Completed);
        assert_eq!(tx.tx_hash, Some(hash(1)));
        assert!(cart.current_executing().is_none());
    }

    #[test]
    fn test_only_one_executing() {
        let cart = CartStore::in_memory();
        let a = cart.add(create_test_tx("a", vec![1]), AddOptions::default()).unwrap();
        let b = cart.add(create_test_tx("b", vec![2]), AddOptions::default()).unwrap();

        cart.mark_executing(&a).unwrap();
        assert!(matches!(cart.mark_executing(&b), Err(CartError::AlreadyExecuting(_))));
        assert_eq!(cart.list_by_status(CartTxStatus::Executing).len(), 1);

        // The executing transaction cannot be removed and the cart cannot be cleared
        assert!(cart.remove(&a).is_err());
        assert!(cart.clear().is_err());
    }

    #[test]
    fn test_failed_then_retry() {
        let cart = CartStore::in_memory();
        let id = cart.add(create_test_tx("a", vec![1]), AddOptions::default()).unwrap();
        cart.mark_executing(&id).unwrap();
        cart.mark_failed(&id, &TxError::user_rejected("User rejected the request")).unwrap();

        let tx = cart.get(&id).unwrap();
        assert_eq!(tx.status, CartTxStatus::Failed);
        assert_eq!(tx.error_kind, Some(crate::error::TxErrorKind::UserRejected));
        assert!(cart.current_executing().is_none());

        cart.retry(&id).unwrap();
        let tx = cart.get(&id).unwrap();
        assert_eq!(tx.status, CartTxStatus::Pending);
        assert!(tx.error.is_none());
    }

    #[test]
    fn test_reload_demotes_executing_without_hash() {
        let storage: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let (stuck, watched) = {
            let cart = CartStore::load(storage.clone(), "cart").unwrap();
            let stuck = cart.add(create_test_tx("stuck", vec![1]), AddOptions::default()).unwrap();
            let watched =
                cart.add(create_test_tx("watched", vec![2]), AddOptions::default()).unwrap();

            cart.mark_executing(&watched).unwrap();
            cart.mark_submitted(&watched, hash(7)).unwrap();
            (stuck, watched)
        };

        // Simulate a crash mid-signature: flip "stuck" to executing with no hash on disk
        let raw = storage.get("cart").unwrap().unwrap();
        let mut doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for tx in doc["transactions"].as_array_mut().unwrap() {
            if tx["id"] == stuck.as_str() {
                tx["status"] = "executing".into();
            }
        }
        storage.set("cart", &doc.to_string()).unwrap();

        let cart = CartStore::load(storage, "cart").unwrap();
        assert_eq!(cart.get(&stuck).unwrap().status, CartTxStatus::Pending);

        let watched_tx = cart.get(&watched).unwrap();
        assert_eq!(watched_tx.status, CartTxStatus::Executing);
        assert_eq!(watched_tx.tx_hash, Some(hash(7)));
        assert_eq!(cart.current_executing().map(|t| t.id), Some(watched));
        assert_eq!(cart.in_flight().len(), 1);
    }

    #[test]
    fn test_reload_clears_dangling_pointer() {
        let storage: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let id = {
            let cart = CartStore::load(storage.clone(), "cart").unwrap();
            let id = cart.add(create_test_tx("a", vec![1]), AddOptions::default()).unwrap();
            cart.mark_executing(&id).unwrap();
            id
        };

        let cart = CartStore::load(storage, "cart").unwrap();
        assert_eq!(cart.get(&id).unwrap().status, CartTxStatus::Pending);
        assert!(cart.current_executing().is_none());
        // The slot is free again
        cart.mark_executing(&id).unwrap();
    }

    #[test]
    fn test_corrupt_state_starts_empty() {
        let storage: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        storage.set("cart", "not json").unwrap();
        let cart = CartStore::load(storage, "cart").unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_clear_completed_keeps_order() {
        let cart = CartStore::in_memory();
        let a = cart.add(create_test_tx("a", vec![1]), AddOptions::default()).unwrap();
        let b = cart.add(create_test_tx("b", vec![2]), AddOptions::default()).unwrap();
        let c = cart.add(create_test_tx("c", vec![3]), AddOptions::default()).unwrap();

        cart.mark_executing(&b).unwrap();
        cart.mark_submitted(&b, hash(2)).unwrap();
        cart.mark_completed(&b).unwrap();

        assert_eq!(cart.clear_completed().unwrap(), 1);
        let ids: Vec<String> = cart.list().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn test_gate_via_store() {
        let cart = CartStore::in_memory();
        let op = CartTransaction::new(
            CartTxType::Delegation,
            "operator",
            RawTransaction::call(Address::repeat_byte(1), vec![1]),
            TxMetadata::step("atp", StepType::OperatorUpdate),
        );
        let approval = CartTransaction::new(
            CartTxType::Delegation,
            "approval",
            RawTransaction::call(Address::repeat_byte(1), vec![2]),
            TxMetadata::step("atp", StepType::TokenApproval)
                .depends_on(Dependency::new("atp", StepType::OperatorUpdate)),
        );
        let approval_id = cart.add(approval, AddOptions::default()).unwrap();
        let op_id = cart.add(op, AddOptions::default()).unwrap();

        assert!(!cart.gate(&approval_id).unwrap().is_ready());
        assert_eq!(cart.next_eligible().map(|t| t.id), Some(op_id));
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let cart = CartStore::in_memory();
        let (_client, mut rx) = cart.events().subscribe();

        let id = cart.add(create_test_tx("a", vec![1]), AddOptions::default()).unwrap();
        cart.remove(&id).unwrap();

        assert!(matches!(rx.recv().await, Some(CartEvent::Added { .. })));
        assert_eq!(rx.recv().await, Some(CartEvent::Removed { id }));
    }

    #[test]
    fn test_concurrent_duplicates_are_added_once() {
        let cart = Arc::new(CartStore::in_memory());

        let ids: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let cart = cart.clone();
                    scope.spawn(move || {
                        let tx = create_test_tx(&format!("approve {}", i), vec![4, 2]);
                        cart.add(tx, AddOptions::dedupe()).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cart.len(), 1);
        assert!(ids.iter().all(|id| id == &ids[0]));
    }

    #[test]
    fn test_abandon_frees_the_slot() {
        let cart = CartStore::in_memory();
        let id = cart.add(create_test_tx("lost", vec![1]), AddOptions::default()).unwrap();
        let other = cart.add(create_test_tx("next", vec![2]), AddOptions::default()).unwrap();

        // Only an executing transaction can be abandoned
        assert!(matches!(cart.abandon(&id), Err(CartError::NotExecuting { .. })));

        cart.mark_executing(&id).unwrap();
        cart.mark_submitted(&id, hash(3)).unwrap();
        assert!(matches!(cart.remove(&id), Err(CartError::AlreadyExecuting(_))));

        cart.abandon(&id).unwrap();
        let tx = cart.get(&id).unwrap();
        assert_eq!(tx.status, CartTxStatus::Failed);
        assert_eq!(tx.error_kind, Some(crate::error::TxErrorKind::Timeout));
        assert!(cart.current_executing().is_none());

        cart.mark_executing(&other).unwrap();
    }

    #[test]
    fn test_reload_from_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.db");
        let path = path.to_str().unwrap();

        let (done, waiting) = {
            let storage: Arc<dyn KvStore> = Arc::new(SqliteKvStore::open(path).unwrap());
            let cart = CartStore::load(storage, "cart").unwrap();
            let done = cart
                .add(
                    create_test_tx("done", vec![1]).with_description("first"),
                    AddOptions::default(),
                )
                .unwrap();
            let waiting =
                cart.add(create_test_tx("waiting", vec![2]), AddOptions::default()).unwrap();
            cart.mark_executing(&done).unwrap();
            cart.mark_submitted(&done, hash(1)).unwrap();
            cart.mark_completed(&done).unwrap();
            (done, waiting)
        };

        let storage: Arc<dyn KvStore> = Arc::new(SqliteKvStore::open(path).unwrap());
        let cart = CartStore::load(storage, "cart").unwrap();

        let ids: Vec<String> = cart.list().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![done.clone(), waiting.clone()]);
        let done_tx = cart.get(&done).unwrap();
        assert_eq!(done_tx.status, CartTxStatus::Completed);
        assert_eq!(done_tx.tx_hash, Some(hash(1)));
        assert_eq!(done_tx.description, "first");
        assert_eq!(cart.get(&waiting).unwrap().status, CartTxStatus::Pending);
    }

    #[tokio::test]
    async fn test_shared_broadcaster() {
        let events = Arc::new(CartEventBroadcaster::new());
        let (client, mut rx) = events.subscribe();
        let cart = CartStore::in_memory().with_events(events.clone());

        cart.clear().unwrap();
        assert_eq!(rx.recv().await, Some(CartEvent::Cleared));

        events.unsubscribe(&client);
        assert_eq!(cart.events().client_count(), 0);
    }
}
