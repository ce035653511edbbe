//! Vesting scenarios on chain A: the genesis continuous and delayed vesting accounts, and a
//! periodic vesting account created at runtime.

use super::setup::{unix_now, IntegrationTestSuite};
use super::*;
use crate::core::{error::Error, poll::wait_for};
use crate::cosmos::{
    client::{amount_of, NodeClient},
    genesis::{CONTINUOUS_VESTING_ACCOUNT_TYPE, DELAYED_VESTING_ACCOUNT_TYPE, VESTING_PERIOD_FILE},
    keys::{random_address, ACCOUNT_PREFIX},
    tx::VALIDATOR_KEY_NAME,
    types::UATOM_DENOM,
};
use anyhow::{ensure, Context};
use serde_json::Value;
use std::time::Duration;

pub const PERIODIC_VESTING_ACCOUNT_TYPE: &str = "/cosmos.vesting.v1beta1.PeriodicVestingAccount";

/// Longest the genesis schedules can still be locked once the networks are up.
const UNLOCK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

fn field_i64(value: &Value, pointer: &str) -> anyhow::Result<i64> {
    let field = value
        .pointer(pointer)
        .with_context(|| format!("account has no {}", pointer))?;
    match field {
        Value::String(s) => Ok(s.parse()?),
        other => other.as_i64().with_context(|| format!("{} is not a number", pointer)),
    }
}

async fn spendable_uatom(client: &NodeClient, address: &str) -> anyhow::Result<u128> {
    Ok(amount_of(&client.spendable_balances(address).await?, UATOM_DENOM)?)
}

/// Waits until every coin of `address` is spendable.
async fn wait_fully_vested(client: &NodeClient, address: &str, expected: u128) -> anyhow::Result<()> {
    wait_for(
        &format!("{} to be fully vested", address),
        UNLOCK_TIMEOUT,
        Duration::from_secs(5),
        || async {
            let spendable = amount_of(&client.spendable_balances(address).await?, UATOM_DENOM)?;
            if spendable >= expected {
                Ok(())
            } else {
                Err(Error::from(format!("{} of {} spendable", spendable, expected)))
            }
        },
    )
    .await?;
    Ok(())
}

/// The delayed account only exposes its remainder until `end_time`, then everything at once.
pub async fn delayed_vesting(suite: &IntegrationTestSuite) -> anyhow::Result<()> {
    let client = suite.node_client(&suite.chain_a)?;
    let address = suite
        .chain_a
        .delayed_vesting_acc
        .clone()
        .context("chain A has no delayed vesting account")?;

    let account = client.account(&address).await?;
    ensure!(
        account["@type"] == DELAYED_VESTING_ACCOUNT_TYPE,
        "unexpected account type {}",
        account["@type"]
    );
    let end_time = field_i64(&account, "/base_vesting_account/end_time")?;

    if unix_now() < end_time - 5 {
        let spendable = spendable_uatom(&client, &address).await?;
        ensure!(
            spendable <= VESTING_AMOUNT,
            "delayed vesting account can spend {} before unlocking",
            spendable
        );
    }
    wait_fully_vested(&client, &address, VESTING_AMOUNT_VESTED).await?;

    // unlocked coins move like any other
    let recipient = random_address(ACCOUNT_PREFIX)?;
    suite
        .cli(&suite.chain_a, 0)?
        .bank_send("delayed_vesting", &recipient, &uatom(VESTING_AMOUNT_VESTED / 2))
        .await?;
    let received = client.balance(&recipient, UATOM_DENOM).await?.amount_u128()?;
    ensure!(received == VESTING_AMOUNT_VESTED / 2, "recipient got {}", received);
    Ok(())
}

/// The continuous account unlocks linearly between `start_time` and `end_time`.
pub async fn continuous_vesting(suite: &IntegrationTestSuite) -> anyhow::Result<()> {
    let client = suite.node_client(&suite.chain_a)?;
    let address = suite
        .chain_a
        .continuous_vesting_acc
        .clone()
        .context("chain A has no continuous vesting account")?;

    let account = client.account(&address).await?;
    ensure!(
        account["@type"] == CONTINUOUS_VESTING_ACCOUNT_TYPE,
        "unexpected account type {}",
        account["@type"]
    );
    let start_time = field_i64(&account, "/start_time")?;
    let end_time = field_i64(&account, "/base_vesting_account/end_time")?;
    ensure!(start_time < end_time, "vesting starts at {} but ends at {}", start_time, end_time);

    if unix_now() < start_time - 5 {
        let spendable = spendable_uatom(&client, &address).await?;
        ensure!(
            spendable <= VESTING_AMOUNT,
            "continuous vesting account can spend {} before vesting starts",
            spendable
        );
    }
    wait_fully_vested(&client, &address, VESTING_AMOUNT_VESTED + VESTING_AMOUNT).await
}

/// Creates a periodic vesting account from the schedule written next to the node home and
/// checks it unlocks both periods.
pub async fn periodic_vesting(suite: &IntegrationTestSuite) -> anyhow::Result<()> {
    let client = suite.node_client(&suite.chain_a)?;
    let address = random_address(ACCOUNT_PREFIX)?;

    suite
        .cli(&suite.chain_a, 0)?
        .create_periodic_vesting_account(VALIDATOR_KEY_NAME, &address, VESTING_PERIOD_FILE)
        .await?;

    let account = client.account(&address).await?;
    ensure!(
        account["@type"] == PERIODIC_VESTING_ACCOUNT_TYPE,
        "unexpected account type {}",
        account["@type"]
    );
    let periods = account["vesting_periods"]
        .as_array()
        .map(Vec::len)
        .unwrap_or_default();
    ensure!(periods == 2, "expected two vesting periods, got {}", periods);

    wait_fully_vested(&client, &address, 2 * VESTING_AMOUNT).await
}
