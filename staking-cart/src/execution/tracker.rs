//! Receipt tracking
//!
//! Watches submitted transactions until they are mined and writes the final
//! status back to the cart. Also used after a restart to pick up transactions
//! left executing with a hash: they are watched, never re-submitted.

use ethers::types::H256;
use serde::Serialize;

use crate::error::{CartResult, TxError, TxErrorKind};
use crate::tx_queue::{CartStore, CartTransaction};
use crate::wallet::TransactionSubmitter;

/// What a run did, by transaction id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    /// Submitted, but no receipt yet; still executing
    pub in_flight: Vec<String>,
    /// Still pending when the run stopped
    pub blocked: Vec<String>,
}

/// Wait for `tx_hash` and finalize `id`. A timeout leaves it executing.
pub(crate) async fn watch(
    cart: &CartStore,
    submitter: &dyn TransactionSubmitter,
    id: &str,
    tx_hash: H256,
    summary: &mut RunSummary,
) -> CartResult<()> {
    log::info!("[Tracker] Waiting for receipt of {} ({:?})", id, tx_hash);

    match submitter.wait_for_receipt(tx_hash).await {
        Ok(receipt) if receipt.success => {
            log::info!(
                "[Tracker] {} confirmed in block {:?} (gas used: {:?})",
                id,
                receipt.block_number,
                receipt.gas_used
            );
            cart.mark_completed(id)?;
            summary.completed.push(id.to_string());
        }
        Ok(_) => {
            let error = TxError::reverted(format!("Transaction {:?} reverted on-chain", tx_hash));
            cart.mark_failed(id, &error)?;
            summary.failed.push(id.to_string());
        }
        Err(e) if e.kind == TxErrorKind::Timeout => {
            log::warn!(
                "[Tracker] {} still unconfirmed, leaving it executing for a later resume: {}",
                id,
                e
            );
            summary.in_flight.push(id.to_string());
        }
        Err(e) => {
            cart.mark_failed(id, &e)?;
            summary.failed.push(id.to_string());
        }
    }
    Ok(())
}

/// Finalize every transaction left executing with a hash
pub(crate) async fn resume(
    cart: &CartStore,
    submitter: &dyn TransactionSubmitter,
) -> CartResult<RunSummary> {
    let mut summary = RunSummary::default();
    let in_flight: Vec<CartTransaction> = cart.in_flight();

    if !in_flight.is_empty() {
        log::info!("[Tracker] Resuming {} in-flight transactions", in_flight.len());
    }

    for tx in in_flight {
        match tx.tx_hash {
            Some(hash) => watch(cart, submitter, &tx.id, hash, &mut summary).await?,
            None => {
                // Safe proposals have no receipt; the proposal hash is the record
                cart.mark_completed(&tx.id)?;
                summary.completed.push(tx.id.clone());
            }
        }
    }
    Ok(summary)
}
