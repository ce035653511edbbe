//! Interchain account scenario: an owner on chain A registers an account on chain B over the
//! relayed connection and has it send tokens.

use super::setup::IntegrationTestSuite;
use super::*;
use crate::core::poll::{wait_for, wait_until};
use crate::cosmos::{
    keys::{random_address, ACCOUNT_PREFIX},
    tx::{GaiaCli, KEYRING_BACKEND, NODE_HOME, VALIDATOR_KEY_NAME},
    types::UATOM_DENOM,
};
use anyhow::Context;
use std::time::Duration;

pub const ICA_BANK_SEND_FILE: &str = "ica_bank_send.json";

const ICA_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// `tx bank send` arguments, generated offline for `from` on chain `chain_id`.
pub fn bank_send_args(from: &str, to: &str, amount: &str, chain_id: &str) -> Vec<String> {
    [
        "tx",
        "bank",
        "send",
        from,
        to,
        amount,
        "--chain-id",
        chain_id,
        "--keyring-backend",
        KEYRING_BACKEND,
        "--home",
        NODE_HOME,
        "--output",
        "json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub async fn ica_bank_send(suite: &IntegrationTestSuite) -> anyhow::Result<()> {
    let connection = suite
        .connection
        .clone()
        .context("no IBC connection between the chains")?;
    let owner = suite
        .chain_a
        .genesis_accounts
        .get(ICA_OWNER_ACCOUNT_INDEX)
        .context("chain A has no ICA owner account")?;
    let cli_a = suite.cli(&suite.chain_a, 0)?;
    let cli_b = suite.cli(&suite.chain_b, 0)?;
    let client_b = suite.node_client(&suite.chain_b)?;

    cli_a.register_ica(&owner.name, &connection).await?;
    let ica = wait_for(
        "interchain account to be registered",
        ICA_TIMEOUT,
        Duration::from_secs(5),
        || cli_a.query_ica_address(owner.address(), &connection),
    )
    .await?;
    log::info!(target: "gaia-e2e", "registered interchain account {} for {}", ica, owner.address());

    cli_b
        .bank_send(VALIDATOR_KEY_NAME, &ica, &uatom(TOKEN_AMOUNT))
        .await?;

    let recipient = random_address(ACCOUNT_PREFIX)?;
    let amount = uatom(TOKEN_AMOUNT / 2);
    write_ica_bank_send(suite, &cli_a, &ica, &recipient, &amount.to_string()).await?;
    cli_a
        .submit_ica_tx(&owner.name, &connection, ICA_BANK_SEND_FILE)
        .await?;

    wait_until(
        "interchain account transfer to arrive",
        ICA_TIMEOUT,
        Duration::from_secs(5),
        || async {
            match client_b.balance(&recipient, UATOM_DENOM).await {
                Ok(balance) => balance == amount,
                Err(_) => false,
            }
        },
    )
    .await?;
    Ok(())
}

/// Dry-runs the bank send the interchain account will execute and stores the message in
/// validator 0's config directory on chain A, where `icamauth submit` reads it.
async fn write_ica_bank_send(
    suite: &IntegrationTestSuite,
    cli: &GaiaCli<'_>,
    ica: &str,
    recipient: &str,
    amount: &str,
) -> anyhow::Result<()> {
    let args = bank_send_args(ica, recipient, amount, suite.chain_b.id.as_str());
    let path = suite
        .chain_a
        .validators
        .first()
        .context("chain A has no validators")?
        .config_file(ICA_BANK_SEND_FILE);
    cli.write_ica_tx(args, &path).await?;
    Ok(())
}
