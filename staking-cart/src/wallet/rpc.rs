//! JSON-RPC submitter
//!
//! Signs with a local key through ethers' `SignerMiddleware`, sends EIP-1559
//! transactions over HTTP and polls `eth_getTransactionReceipt`. Node errors
//! are classified here, where their JSON-RPC codes are still available.

use async_trait::async_trait;
use ethers::middleware::signer::SignerMiddlewareError;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, MiddlewareError, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Eip1559TransactionRequest, H256, U64};
use std::time::{Duration, Instant};

use super::{ReceiptOutcome, SubmitOutcome, TransactionSubmitter};
use crate::error::TxError;
use crate::tx_queue::RawTransaction;

/// EIP-1193: user rejected the request
const CODE_USER_REJECTED: i64 = 4001;
/// EIP-1193: the requested method or account is not authorized
const CODE_UNAUTHORIZED: i64 = 4100;
/// Geth: execution reverted (with revert data)
const CODE_EXECUTION_REVERTED: i64 = 3;

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct EthersSubmitter {
    client: Client,
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl EthersSubmitter {
    pub fn new(
        rpc_url: &str,
        wallet: LocalWallet,
        receipt_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, TxError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| TxError::rpc(format!("Invalid RPC URL '{}': {}", rpc_url, e)))?;

        Ok(Self {
            client: SignerMiddleware::new(provider, wallet),
            receipt_timeout,
            poll_interval,
        })
    }
}

#[async_trait]
impl TransactionSubmitter for EthersSubmitter {
    async fn submit(&self, tx: &RawTransaction) -> Result<SubmitOutcome, TxError> {
        let request = Eip1559TransactionRequest::new()
            .from(self.client.address())
            .to(tx.to)
            .data(tx.data.clone())
            .value(tx.value);

        log::info!("[Wallet] Sending transaction to {:?} (value: {})", tx.to, tx.value);

        let pending = self
            .client
            .send_transaction(request, None)
            .await
            .map_err(classify_send_error)?;

        let tx_hash = pending.tx_hash();
        log::info!("[Wallet] Transaction sent: {:?}", tx_hash);
        Ok(SubmitOutcome::Transaction(tx_hash))
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<ReceiptOutcome, TxError> {
        let deadline = Instant::now() + self.receipt_timeout;

        loop {
            match self.client.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    return Ok(ReceiptOutcome {
                        tx_hash,
                        success: receipt.status == Some(U64::from(1)),
                        block_number: receipt.block_number.map(|b| b.as_u64()),
                        gas_used: receipt.gas_used,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    // Transient poll failures are retried until the deadline
                    log::warn!("[Wallet] Receipt poll for {:?} failed: {}", tx_hash, e);
                }
            }

            if Instant::now() >= deadline {
                return Err(TxError::timeout(format!(
                    "No receipt for {:?} after {}s",
                    tx_hash,
                    self.receipt_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn address(&self) -> Address {
        self.client.signer().address()
    }

    fn mode_name(&self) -> &'static str {
        "rpc"
    }
}

fn classify_send_error(err: SignerMiddlewareError<Provider<Http>, LocalWallet>) -> TxError {
    if let Some(resp) = err.as_error_response() {
        return classify_rpc_error(resp.code, &resp.message);
    }
    match err {
        SignerMiddlewareError::SignerError(e) => TxError::wallet(e.to_string()),
        SignerMiddlewareError::WrongSigner | SignerMiddlewareError::DifferentChainID => {
            TxError::wallet(err.to_string())
        }
        other => TxError::rpc(other.to_string()),
    }
}

/// Map a JSON-RPC error response to a typed failure
pub fn classify_rpc_error(code: i64, message: &str) -> TxError {
    match code {
        CODE_USER_REJECTED | CODE_UNAUTHORIZED => TxError::user_rejected(message),
        CODE_EXECUTION_REVERTED => TxError::reverted(message),
        // Nodes without revert data report gas-estimation reverts as -32000
        -32000 | -32015 if message.to_lowercase().contains("revert") => TxError::reverted(message),
        _ => TxError::rpc(format!("{} (code {})", message, code)),
    }
}
