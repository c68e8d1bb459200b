//! Local private-key signer
//!
//! Loads the signing key from WALLET_PRIVATE_KEY (or an explicit string) and
//! binds it to the configured chain id.

use ethers::core::k256::ecdsa::SigningKey;
use ethers::signers::{LocalWallet, Signer};

use crate::config::env_vars;
use crate::error::TxError;

/// Build a wallet from WALLET_PRIVATE_KEY
pub fn from_env(chain_id: u64) -> Result<LocalWallet, TxError> {
    let private_key = std::env::var(env_vars::WALLET_PRIVATE_KEY)
        .map_err(|_| TxError::wallet(format!("{} not set", env_vars::WALLET_PRIVATE_KEY)))?;

    from_private_key(&private_key, chain_id)
}

/// Build a wallet from a hex private key, with or without `0x`
pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<LocalWallet, TxError> {
    let key_hex = private_key.trim();
    let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

    let key_bytes = hex::decode(key_hex)
        .map_err(|e| TxError::wallet(format!("Invalid private key hex: {}", e)))?;
    if key_bytes.len() != 32 {
        return Err(TxError::wallet(format!(
            "Invalid private key length: expected 32 bytes, got {}",
            key_bytes.len()
        )));
    }

    let signing_key = SigningKey::from_bytes(key_bytes.as_slice().into())
        .map_err(|e| TxError::wallet(format!("Invalid private key: {}", e)))?;

    Ok(LocalWallet::from(signing_key).with_chain_id(chain_id))
}

/// Lowercase `0x` address, the form used in logs
pub fn display_address(wallet: &LocalWallet) -> String {
    format!("{:?}", wallet.address()).to_lowercase()
}
