//! Structural signature of a raw transaction
//!
//! Two cart entries with the same `{to, data, value}` hash to the same
//! signature regardless of label or metadata.

use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;

use super::types::RawTransaction;

/// keccak256(to ‖ data ‖ value_be32)
pub fn compute(to: &Address, data: &[u8], value: &U256) -> H256 {
    let mut buf = Vec::with_capacity(20 + data.len() + 32);
    buf.extend_from_slice(to.as_bytes());
    buf.extend_from_slice(data);
    let mut value_bytes = [0u8; 32];
    value.to_big_endian(&mut value_bytes);
    buf.extend_from_slice(&value_bytes);
    H256::from(keccak256(&buf))
}

pub fn of(tx: &RawTransaction) -> H256 {
    compute(&tx.to, tx.data.as_ref(), &tx.value)
}
