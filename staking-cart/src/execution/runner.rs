//! Sequential cart runner
//!
//! Picks the first pending transaction whose dependencies are completed,
//! submits it, waits for its receipt and moves on. One runner at a time per
//! cart; the cart itself enforces one executing transaction.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::tracker::{self, RunSummary};
use crate::error::{CartError, CartResult};
use crate::tx_queue::{CartStore, CartTransaction, CartTxStatus, Gate};
use crate::wallet::{SubmitOutcome, TransactionSubmitter};

pub struct CartRunner {
    cart: Arc<CartStore>,
    submitter: Arc<dyn TransactionSubmitter>,
    /// Single permit; held for the duration of a run
    lane: Arc<Semaphore>,
}

impl CartRunner {
    pub fn new(cart: Arc<CartStore>, submitter: Arc<dyn TransactionSubmitter>) -> Self {
        Self {
            cart,
            submitter,
            lane: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn cart(&self) -> &Arc<CartStore> {
        &self.cart
    }

    pub fn is_running(&self) -> bool {
        self.lane.available_permits() == 0
    }

    fn try_acquire(&self) -> CartResult<OwnedSemaphorePermit> {
        self.lane
            .clone()
            .try_acquire_owned()
            .map_err(|_| CartError::AlreadyRunning)
    }

    /// Watch transactions left executing by a previous run or process
    pub async fn resume_in_flight(&self) -> CartResult<RunSummary> {
        let _permit = self.try_acquire()?;
        tracker::resume(&self.cart, self.submitter.as_ref()).await
    }

    /// Run every eligible transaction in order until none is left
    pub async fn execute_all(&self) -> CartResult<RunSummary> {
        let _permit = self.try_acquire()?;
        log::info!(
            "[Runner] Starting run over {} transactions ({} wallet)",
            self.cart.len(),
            self.submitter.mode_name()
        );

        let mut summary = tracker::resume(&self.cart, self.submitter.as_ref()).await?;

        loop {
            // An unconfirmed transaction still holds the executing slot
            if let Some(current) = self.cart.current_executing() {
                log::warn!(
                    "[Runner] Stopping: {} is still awaiting its receipt",
                    current.id
                );
                break;
            }
            let Some(next) = self.cart.next_eligible() else {
                break;
            };
            self.run_transaction(&next, &mut summary).await?;
        }

        summary.blocked = self
            .cart
            .list_by_status(CartTxStatus::Pending)
            .into_iter()
            .map(|t| t.id)
            .collect();

        log::info!(
            "[Runner] Run finished: {} completed, {} failed, {} in flight, {} blocked",
            summary.completed.len(),
            summary.failed.len(),
            summary.in_flight.len(),
            summary.blocked.len()
        );
        Ok(summary)
    }

    /// Run a single transaction if its dependencies allow it
    pub async fn execute_one(&self, id: &str) -> CartResult<RunSummary> {
        let _permit = self.try_acquire()?;

        let tx = self
            .cart
            .get(id)
            .ok_or_else(|| CartError::NotFound(id.to_string()))?;
        if tx.status != CartTxStatus::Pending {
            return Err(CartError::NotPending {
                id: id.to_string(),
                status: tx.status.to_string(),
            });
        }
        if let Some(current) = self.cart.current_executing() {
            return Err(CartError::AlreadyExecuting(current.id));
        }
        match self.cart.gate(id)? {
            Gate::Ready => {}
            Gate::Waiting(deps) | Gate::Blocked(deps) => {
                log::info!("[Runner] {} deferred, waiting on {:?}", id, deps);
                return Err(CartError::DependencyNotMet(id.to_string()));
            }
        }

        let mut summary = RunSummary::default();
        self.run_transaction(&tx, &mut summary).await?;
        Ok(summary)
    }

    async fn run_transaction(
        &self,
        tx: &CartTransaction,
        summary: &mut RunSummary,
    ) -> CartResult<()> {
        self.cart.mark_executing(&tx.id)?;
        log::info!("[Runner] Submitting {} '{}'", tx.id, tx.label);

        match self.submitter.submit(&tx.transaction).await {
            Ok(SubmitOutcome::Transaction(hash)) => {
                self.cart.mark_submitted(&tx.id, hash)?;
                tracker::watch(&self.cart, self.submitter.as_ref(), &tx.id, hash, summary).await?;
            }
            Ok(SubmitOutcome::SafeProposal(safe_hash)) => {
                self.cart.mark_safe_submitted(&tx.id, safe_hash)?;
                self.cart.mark_completed(&tx.id)?;
                summary.completed.push(tx.id.clone());
            }
            Err(e) => {
                self.cart.mark_failed(&tx.id, &e)?;
                summary.failed.push(tx.id.clone());
            }
        }
        Ok(())
    }
}
