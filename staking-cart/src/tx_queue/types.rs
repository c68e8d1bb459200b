//! Cart transaction data types

use chrono::{DateTime, Utc};
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{TxError, TxErrorKind};

/// Status of a cart transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CartTxStatus {
    /// Waiting in the queue
    Pending,
    /// Handed to the wallet, or submitted and awaiting its receipt
    Executing,
    /// Confirmed on-chain (or proposed to a Safe)
    Completed,
    /// Rejected, reverted or otherwise failed
    Failed,
}

/// What the user is trying to do with a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CartTxType {
    SelfStake,
    Delegation,
    Withdrawal,
    ClaimRewards,
    Other,
}

/// Position of a transaction within a staking flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepType {
    OperatorUpdate,
    StakerUpgrade,
    TokenApproval,
    Stake,
    Delegation,
    Withdrawal,
    Claim,
}

/// Reference to another step of the same group that must complete first
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub step_group_identifier: String,
    pub step_type: StepType,
}

impl Dependency {
    pub fn new(step_group_identifier: impl Into<String>, step_type: StepType) -> Self {
        Self {
            step_group_identifier: step_group_identifier.into(),
            step_type,
        }
    }
}

/// The raw call handed to the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub to: Address,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default, with = "crate::tx_queue::bigint")]
    pub value: U256,
}

impl RawTransaction {
    pub fn new(to: Address, data: impl Into<Bytes>, value: U256) -> Self {
        Self {
            to,
            data: data.into(),
            value,
        }
    }

    /// A call carrying no ETH
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self::new(to, data, U256::zero())
    }
}

/// Grouping and bookkeeping attached to a cart transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_type: Option<StepType>,
    /// Steps sharing this key form one flow, e.g. all steps of one ATP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_group_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<Dependency>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::tx_queue::bigint::option"
    )]
    pub amount: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atp_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staker_version: Option<u64>,
}

impl TxMetadata {
    /// Metadata for one step of a grouped flow
    pub fn step(step_group_identifier: impl Into<String>, step_type: StepType) -> Self {
        Self {
            step_type: Some(step_type),
            step_group_identifier: Some(step_group_identifier.into()),
            ..Default::default()
        }
    }

    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.depends_on.push(dependency);
        self
    }

    pub fn with_amount(mut self, amount: U256) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Whether this transaction is the step `(group, step_type)`
    pub fn is_step(&self, group: &str, step_type: StepType) -> bool {
        self.step_type == Some(step_type) && self.step_group_identifier.as_deref() == Some(group)
    }
}

/// A transaction waiting in (or finished by) the cart
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTransaction {
    pub id: String,
    #[serde(rename = "type")]
    pub tx_type: CartTxType,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub transaction: RawTransaction,
    pub status: CartTxStatus,
    #[serde(default)]
    pub tx_hash: Option<H256>,
    /// Proposal hash when the wallet is a Safe multisig
    #[serde(default)]
    pub safe_tx_hash: Option<H256>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<TxErrorKind>,
    #[serde(default)]
    pub metadata: TxMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartTransaction {
    pub fn new(
        tx_type: CartTxType,
        label: impl Into<String>,
        transaction: RawTransaction,
        metadata: TxMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tx_type,
            label: label.into(),
            description: String::new(),
            transaction,
            status: CartTxStatus::Pending,
            tx_hash: None,
            safe_tx_hash: None,
            error: None,
            error_kind: None,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Either hash counts as proof of submission
    pub fn has_hash(&self) -> bool {
        self.tx_hash.is_some() || self.safe_tx_hash.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, CartTxStatus::Completed | CartTxStatus::Failed)
    }

    pub(crate) fn record_error(&mut self, error: &TxError) {
        self.error = Some(error.message.clone());
        self.error_kind = Some(error.kind);
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_step_type_strings() {
        assert_eq!(StepType::OperatorUpdate.to_string(), "operator_update");
        assert_eq!(StepType::from_str("token_approval").unwrap(), StepType::TokenApproval);
        assert_eq!(CartTxStatus::Executing.to_string(), "executing");
        assert_eq!(CartTxType::ClaimRewards.to_string(), "claim_rewards");
    }

    #[test]
    fn test_new_transaction_is_pending() {
        let tx = CartTransaction::new(
            CartTxType::Delegation,
            "Delegate",
            RawTransaction::call(Address::repeat_byte(0x11), vec![0xde, 0xad]),
            TxMetadata::step("atp-1", StepType::Delegation),
        );
        assert_eq!(tx.status, CartTxStatus::Pending);
        assert!(!tx.has_hash());
        assert!(tx.metadata.is_step("atp-1", StepType::Delegation));
        assert!(!tx.metadata.is_step("atp-2", StepType::Delegation));
    }

    #[test]
    fn test_persisted_field_names() {
        let tx = CartTransaction::new(
            CartTxType::SelfStake,
            "Stake",
            RawTransaction::new(Address::zero(), Vec::new(), U256::from(5u64)),
            TxMetadata::step("g", StepType::Stake).with_amount(U256::from(10u64)),
        );
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "self_stake");
        assert_eq!(json["transaction"]["value"], "5");
        assert_eq!(json["metadata"]["amount"], "10");
        assert_eq!(json["metadata"]["stepGroupIdentifier"], "g");
        assert!(json.get("txHash").is_some());
    }
}
