//! Builders that turn staking intents into cart transactions

pub mod format;
mod staking;

pub use staking::{
    AtpStakeRequest, StakeTarget, WalletStakeRequest, build_atp_stake, build_claim,
    build_wallet_stake, build_withdrawal, group_key,
};
