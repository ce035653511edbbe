//! The e2e suite: two Gaia networks joined by a Hermes relayer, and the scenarios run against
//! them.

pub mod config;
pub mod gov;
pub mod ica;
pub mod setup;
pub mod vesting;

use crate::cosmos::types::{Coin, UATOM_DENOM};

pub const INIT_BALANCE: &str =
    "110000000000stake,100000000000000000photon,100000000000000000uatom";
pub const MIN_GAS_PRICE: &str = "0.00001";
/// The genesis global fee matches the minimum gas price.
pub const INITIAL_GLOBAL_FEE_AMT: &str = "0.00001";
pub const LOW_GLOBAL_FEES_AMT: &str = "0.000001";
pub const HIGH_GLOBAL_FEE_AMT: &str = "0.0001";
pub const GAS: u64 = 200000;
/// Blocks between submitting an upgrade proposal and its planned height.
pub const GOV_PROPOSAL_BLOCK_BUFFER: u64 = 35;
pub const RELAYER_ACCOUNT_INDEX: usize = 0;
pub const ICA_OWNER_ACCOUNT_INDEX: usize = 1;

pub const VALIDATORS_PER_CHAIN: usize = 2;
pub const GENESIS_ACCOUNTS_PER_CHAIN: usize = 4;
pub const CHAIN_A_PORT_OFFSET: u16 = 0;
pub const CHAIN_B_PORT_OFFSET: u16 = 10;

pub const STAKING_AMOUNT: u128 = 100000000000;
pub const TOKEN_AMOUNT: u128 = 3300000000;
pub const FEES: u128 = 330000;
pub const DEPOSIT_AMOUNT: u128 = 10000000;
pub const SEND_GOV_AMOUNT: u128 = 10;
pub const VESTING_AMOUNT_VESTED: u128 = 99900000000;
pub const VESTING_AMOUNT: u128 = 350000;

pub fn uatom(amount: u128) -> Coin {
    Coin::new(UATOM_DENOM, amount)
}

/// Funds of each genesis vesting account: the vested coins plus a spendable remainder.
pub fn vesting_balance() -> Coin {
    uatom(VESTING_AMOUNT_VESTED + VESTING_AMOUNT)
}

pub fn min_gas_prices() -> String {
    format!("{}{}", MIN_GAS_PRICE, UATOM_DENOM)
}
