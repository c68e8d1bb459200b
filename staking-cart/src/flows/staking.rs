//! Staking flow builders
//!
//! Turn one staking intent into the ordered, dependency-linked cart steps:
//! operator update → staker upgrade → token approval → stake/delegate.
//! Steps already done on-chain are left out; the dependencies stay declared
//! against them, and the gate treats absent steps as satisfied.

use ethers::abi::{Abi, Token};
use ethers::types::{Address, U256};

use super::format::{TOKEN_DECIMALS, format_units, short_address};
use crate::error::{CartError, CartResult};
use crate::tx_queue::{
    CartTransaction, CartTxType, Dependency, RawTransaction, StepType, TxMetadata,
};

/// Token vault (ATP) functions used by the flow
const ATP_ABI: &[&str] = &[
    "function updateStakerOperator(address _operator)",
    "function upgradeStaker(uint256 _version)",
    "function approveStaker(uint256 _allowance)",
];

/// Staker contract functions
const STAKER_ABI: &[&str] = &[
    "function stake(address _attester, uint256 _amount)",
    "function delegate(uint256 _providerId, uint256 _amount)",
    "function initiateWithdraw(address _attester, address _recipient)",
    "function claimRewards(address _recipient)",
];

const ERC20_ABI: &[&str] = &["function approve(address _spender, uint256 _amount)"];

/// Order of the steps within one group
const STEP_CHAIN: [StepType; 4] = [
    StepType::OperatorUpdate,
    StepType::StakerUpgrade,
    StepType::TokenApproval,
    StepType::Stake,
];

fn parse_abi(signatures: &[&str]) -> CartResult<Abi> {
    ethers::abi::parse_abi(signatures)
        .map_err(|e| CartError::Encoding(format!("Invalid ABI: {}", e)))
}

/// ABI-encode `name(args)` against a human-readable ABI
fn encode_call(signatures: &[&str], name: &str, args: &[Token]) -> CartResult<Vec<u8>> {
    let abi = parse_abi(signatures)?;
    let function = abi
        .function(name)
        .map_err(|e| CartError::Encoding(format!("Function '{}' not found: {}", name, e)))?;
    function
        .encode_input(args)
        .map_err(|e| CartError::Encoding(format!("Failed to encode {}: {}", name, e)))
}

/// Group key for every step of one vault or wallet flow
pub fn group_key(address: &Address) -> String {
    format!("{:?}", address).to_lowercase()
}

/// Metadata for `step_type` depending on every step before it in the chain
fn chained_metadata(group: &str, step_type: StepType) -> TxMetadata {
    let mut meta = TxMetadata::step(group, step_type);
    for earlier in STEP_CHAIN.iter().take_while(|s| **s != step_type) {
        meta = meta.depends_on(Dependency::new(group, *earlier));
    }
    meta
}

/// How the stake is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeTarget {
    /// Run a sequencer with this attester
    SelfStake { attester: Address },
    /// Delegate to a staking provider
    Delegation { provider_id: u64 },
}

/// Stake from a token vault (ATP) through its staker contract
#[derive(Debug, Clone)]
pub struct AtpStakeRequest {
    pub atp: Address,
    pub staker: Address,
    pub amount: U256,
    pub target: StakeTarget,
    /// Set when the vault's operator is not yet the connected wallet
    pub new_operator: Option<Address>,
    /// Set when the staker must be upgraded to this version first
    pub upgrade_to_version: Option<u64>,
    /// Set when the staker's current allowance is below `amount`
    pub needs_approval: bool,
    pub token_symbol: String,
}

/// Build the cart steps for an ATP stake
pub fn build_atp_stake(req: &AtpStakeRequest) -> CartResult<Vec<CartTransaction>> {
    let group = group_key(&req.atp);
    let tx_type = tx_type_for(&req.target);
    let amount_str = format!("{} {}", format_units(req.amount, TOKEN_DECIMALS), req.token_symbol);
    let mut steps = Vec::new();

    let with_atp = |mut meta: TxMetadata| {
        meta.atp_address = Some(req.atp);
        meta
    };

    if let Some(operator) = req.new_operator {
        let data = encode_call(ATP_ABI, "updateStakerOperator", &[Token::Address(operator)])?;
        steps.push(
            CartTransaction::new(
                tx_type,
                "Update operator",
                RawTransaction::call(req.atp, data),
                with_atp(chained_metadata(&group, StepType::OperatorUpdate)),
            )
            .with_description(format!(
                "Set {} as operator of vault {}",
                short_address(&operator),
                short_address(&req.atp)
            )),
        );
    }

    if let Some(version) = req.upgrade_to_version {
        let data = encode_call(ATP_ABI, "upgradeStaker", &[Token::Uint(U256::from(version))])?;
        let mut meta = with_atp(chained_metadata(&group, StepType::StakerUpgrade));
        meta.staker_version = Some(version);
        let description = format!(
            "Upgrade the staker of vault {} to v{}",
            short_address(&req.atp),
            version
        );
        let call = RawTransaction::call(req.atp, data);
        steps.push(
            CartTransaction::new(tx_type, "Upgrade staker", call, meta)
                .with_description(description),
        );
    }

    if req.needs_approval {
        let data = encode_call(ATP_ABI, "approveStaker", &[Token::Uint(req.amount)])?;
        steps.push(
            CartTransaction::new(
                tx_type,
                "Approve staker",
                RawTransaction::call(req.atp, data),
                with_atp(chained_metadata(&group, StepType::TokenApproval)).with_amount(req.amount),
            )
            .with_description(format!("Allow the staker to use {}", amount_str)),
        );
    }

    steps.push(stake_step(
        req.staker,
        &group,
        req.amount,
        &req.target,
        &amount_str,
        Some(req.atp),
    )?);

    log::debug!("[Flows] Built {} steps for vault {}", steps.len(), group);
    Ok(steps)
}

/// Stake tokens held directly by the wallet
#[derive(Debug, Clone)]
pub struct WalletStakeRequest {
    pub wallet: Address,
    pub token: Address,
    /// Staking contract; also the approval spender
    pub staking_contract: Address,
    pub amount: U256,
    pub target: StakeTarget,
    pub needs_approval: bool,
    pub token_symbol: String,
}

pub fn build_wallet_stake(req: &WalletStakeRequest) -> CartResult<Vec<CartTransaction>> {
    let group = group_key(&req.wallet);
    let amount_str = format!("{} {}", format_units(req.amount, TOKEN_DECIMALS), req.token_symbol);
    let mut steps = Vec::new();

    if req.needs_approval {
        let data = encode_call(
            ERC20_ABI,
            "approve",
            &[Token::Address(req.staking_contract), Token::Uint(req.amount)],
        )?;
        steps.push(
            CartTransaction::new(
                tx_type_for(&req.target),
                format!("Approve {}", req.token_symbol),
                RawTransaction::call(req.token, data),
                chained_metadata(&group, StepType::TokenApproval).with_amount(req.amount),
            )
            .with_description(format!(
                "Allow {} to spend {}",
                short_address(&req.staking_contract),
                amount_str
            )),
        );
    }

    steps.push(stake_step(
        req.staking_contract,
        &group,
        req.amount,
        &req.target,
        &amount_str,
        None,
    )?);
    Ok(steps)
}

fn tx_type_for(target: &StakeTarget) -> CartTxType {
    match target {
        StakeTarget::SelfStake { .. } => CartTxType::SelfStake,
        StakeTarget::Delegation { .. } => CartTxType::Delegation,
    }
}

fn stake_step(
    contract: Address,
    group: &str,
    amount: U256,
    target: &StakeTarget,
    amount_str: &str,
    atp: Option<Address>,
) -> CartResult<CartTransaction> {
    let mut meta = chained_metadata(group, StepType::Stake).with_amount(amount);
    meta.atp_address = atp;

    let (data, label, description) = match target {
        StakeTarget::SelfStake { attester } => (
            encode_call(STAKER_ABI, "stake", &[Token::Address(*attester), Token::Uint(amount)])?,
            "Stake".to_string(),
            format!("Stake {} with attester {}", amount_str, short_address(attester)),
        ),
        StakeTarget::Delegation { provider_id } => {
            meta.provider_id = Some(*provider_id);
            (
                encode_call(
                    STAKER_ABI,
                    "delegate",
                    &[Token::Uint(U256::from(*provider_id)), Token::Uint(amount)],
                )?,
                "Delegate".to_string(),
                format!("Delegate {} to provider #{}", amount_str, provider_id),
            )
        }
    };

    Ok(CartTransaction::new(tx_type_for(target), label, RawTransaction::call(contract, data), meta)
        .with_description(description))
}

/// Single-step withdrawal from a staker
pub fn build_withdrawal(
    staker: Address,
    attester: Address,
    recipient: Address,
) -> CartResult<CartTransaction> {
    let data = encode_call(
        STAKER_ABI,
        "initiateWithdraw",
        &[Token::Address(attester), Token::Address(recipient)],
    )?;
    Ok(CartTransaction::new(
        CartTxType::Withdrawal,
        "Withdraw",
        RawTransaction::call(staker, data),
        TxMetadata::step(group_key(&staker), StepType::Withdrawal),
    )
    .with_description(format!(
        "Withdraw attester {} to {}",
        short_address(&attester),
        short_address(&recipient)
    )))
}

/// Single-step rewards claim from a staker
pub fn build_claim(staker: Address, recipient: Address) -> CartResult<CartTransaction> {
    let data = encode_call(STAKER_ABI, "claimRewards", &[Token::Address(recipient)])?;
    Ok(CartTransaction::new(
        CartTxType::ClaimRewards,
        "Claim rewards",
        RawTransaction::call(staker, data),
        TxMetadata::step(group_key(&staker), StepType::Claim),
    )
    .with_description(format!("Claim rewards to {}", short_address(&recipient))))
}
