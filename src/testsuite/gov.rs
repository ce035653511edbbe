//! Governance scenarios, all run on chain A with validator 0 proposing, depositing and voting.

use super::setup::IntegrationTestSuite;
use super::*;
use crate::core::poll::wait_until;
use crate::cosmos::{
    client::{amount_of, NodeClient, ProposalStatus},
    keys::{module_address, random_address, ACCOUNT_PREFIX},
    proposal::{
        write_gov_param_change_proposal_global_fees, write_gov_proposals,
        write_gov_upgrade_software_proposal, CANCEL_UPGRADE_PROPOSAL_FILE, COMMUNITY_POOL_SPEND_AMOUNT,
        GLOBAL_FEE_PROPOSAL_FILE, LEGACY_COMMUNITY_SPEND_FILE, MSG_SEND_PROPOSAL_FILE,
        SOFTWARE_UPGRADE_PROPOSAL_FILE,
    },
    tx::VALIDATOR_KEY_NAME,
    types::{DecCoin, UATOM_DENOM},
};
use anyhow::{ensure, Context};
use std::time::Duration;

const PROPOSAL_TIMEOUT: Duration = Duration::from_secs(90);
const BALANCE_TIMEOUT: Duration = Duration::from_secs(60);

fn gov_address() -> anyhow::Result<String> {
    Ok(module_address("gov", ACCOUNT_PREFIX)?)
}

/// Submits `file`, tops up the deposit so voting starts, votes yes and waits for the outcome.
async fn submit_deposit_vote(
    suite: &mut IntegrationTestSuite,
    file: &str,
    legacy_kind: Option<&str>,
) -> anyhow::Result<u64> {
    let proposal_id = suite.next_proposal_id();
    let cli = suite.cli(&suite.chain_a, 0)?;
    let client = suite.node_client(&suite.chain_a)?;

    log::info!(target: "gaia-e2e", "submitting proposal {} from {}", proposal_id, file);
    cli.submit_gov_proposal(VALIDATOR_KEY_NAME, file, legacy_kind).await?;
    wait_for_status(&client, proposal_id, ProposalStatus::DepositPeriod).await?;

    cli.deposit(VALIDATOR_KEY_NAME, proposal_id, &uatom(DEPOSIT_AMOUNT)).await?;
    wait_for_status(&client, proposal_id, ProposalStatus::VotingPeriod).await?;

    cli.vote(VALIDATOR_KEY_NAME, proposal_id, "yes").await?;
    wait_for_status(&client, proposal_id, ProposalStatus::Passed).await?;
    log::info!(target: "gaia-e2e", "proposal {} passed", proposal_id);
    Ok(proposal_id)
}

async fn wait_for_status(
    client: &NodeClient,
    proposal_id: u64,
    expected: ProposalStatus,
) -> anyhow::Result<()> {
    wait_until(
        &format!("proposal {} to reach {:?}", proposal_id, expected),
        PROPOSAL_TIMEOUT,
        Duration::from_secs(2),
        || async {
            match client.proposal_status(proposal_id).await {
                Ok(status) => status == expected,
                Err(_) => false,
            }
        },
    )
    .await
    .with_context(|| format!("proposal {} never reached {:?}", proposal_id, expected))
}

/// A gov v1 proposal whose `MsgSend` pays a fresh address out of the gov module account.
pub async fn gov_send_msg(suite: &mut IntegrationTestSuite) -> anyhow::Result<()> {
    let gov = gov_address()?;
    let recipient = random_address(ACCOUNT_PREFIX)?;
    let amount = uatom(SEND_GOV_AMOUNT);
    write_gov_proposals(&suite.chain_a, &gov, &recipient, &amount)?;

    // the module account pays, make sure it holds more than the deposits it refunds
    suite
        .cli(&suite.chain_a, 0)?
        .bank_send(VALIDATOR_KEY_NAME, &gov, &uatom(DEPOSIT_AMOUNT))
        .await?;

    submit_deposit_vote(suite, MSG_SEND_PROPOSAL_FILE, None).await?;

    let client = suite.node_client(&suite.chain_a)?;
    wait_until(
        "gov send recipient to be paid",
        BALANCE_TIMEOUT,
        Duration::from_secs(2),
        || async {
            match client.balance(&recipient, UATOM_DENOM).await {
                Ok(balance) => balance == amount,
                Err(_) => false,
            }
        },
    )
    .await?;
    Ok(())
}

/// A legacy community pool spend to the gov module account. Deposits are refunded once the
/// proposal passes, so the module ends up holding exactly the spent amount more.
pub async fn gov_community_pool_spend(suite: &mut IntegrationTestSuite) -> anyhow::Result<()> {
    let gov = gov_address()?;
    let recipient = random_address(ACCOUNT_PREFIX)?;
    write_gov_proposals(&suite.chain_a, &gov, &recipient, &uatom(SEND_GOV_AMOUNT))?;

    let client = suite.node_client(&suite.chain_a)?;
    let before = amount_of(&client.all_balances(&gov).await?, UATOM_DENOM)?;
    submit_deposit_vote(suite, LEGACY_COMMUNITY_SPEND_FILE, Some("community-pool-spend")).await?;

    let expected = before + COMMUNITY_POOL_SPEND_AMOUNT;
    wait_until(
        "community pool spend to reach the gov module",
        BALANCE_TIMEOUT,
        Duration::from_secs(2),
        || async {
            match client.all_balances(&gov).await {
                Ok(balances) => amount_of(&balances, UATOM_DENOM).ok() == Some(expected),
                Err(_) => false,
            }
        },
    )
    .await?;
    Ok(())
}

/// Schedules an upgrade a few blocks ahead, then cancels it before it is reached.
pub async fn gov_software_upgrade_and_cancel(suite: &mut IntegrationTestSuite) -> anyhow::Result<()> {
    let client = suite.node_client(&suite.chain_a)?;
    let height = client.status().await?.latest_height + GOV_PROPOSAL_BLOCK_BUFFER;
    write_gov_upgrade_software_proposal(&suite.chain_a, &gov_address()?, height)?;

    submit_deposit_vote(suite, SOFTWARE_UPGRADE_PROPOSAL_FILE, None).await?;
    let plan = client
        .current_upgrade_plan()
        .await?
        .context("no upgrade plan after the upgrade proposal passed")?;
    ensure!(plan["name"] == "upgrade-1", "unexpected upgrade plan {}", plan);

    submit_deposit_vote(suite, CANCEL_UPGRADE_PROPOSAL_FILE, None).await?;
    ensure!(
        client.current_upgrade_plan().await?.is_none(),
        "upgrade plan still scheduled after cancellation"
    );
    Ok(())
}

async fn change_global_fees(suite: &mut IntegrationTestSuite, amount: &str) -> anyhow::Result<()> {
    let fees = DecCoin::parse_list(&format!("{}{}", amount, UATOM_DENOM))?;
    write_gov_param_change_proposal_global_fees(&suite.chain_a, &fees)?;
    submit_deposit_vote(suite, GLOBAL_FEE_PROPOSAL_FILE, Some("param-change")).await?;

    let current = suite.node_client(&suite.chain_a)?.global_fees().await?;
    let current = current
        .iter()
        .map(|c| DecCoin::new(&c.denom, &c.amount))
        .collect::<Result<Vec<_>, _>>()?;
    ensure!(current == fees, "global fees are {:?}, expected {:?}", current, fees);
    Ok(())
}

/// Moves the global fee up and down through param change proposals, sending a transfer at each
/// level, and restores the genesis value.
pub async fn gov_global_fees(suite: &mut IntegrationTestSuite) -> anyhow::Result<()> {
    for amount in [HIGH_GLOBAL_FEE_AMT, LOW_GLOBAL_FEES_AMT] {
        change_global_fees(suite, amount).await?;
        // the standard fees cover both levels
        let recipient = random_address(ACCOUNT_PREFIX)?;
        suite
            .cli(&suite.chain_a, 0)?
            .bank_send(VALIDATOR_KEY_NAME, &recipient, &uatom(TOKEN_AMOUNT))
            .await?;
        let received = suite
            .node_client(&suite.chain_a)?
            .balance(&recipient, UATOM_DENOM)
            .await?
            .amount_u128()?;
        ensure!(received == TOKEN_AMOUNT, "recipient got {} at global fee {}", received, amount);
    }
    change_global_fees(suite, INITIAL_GLOBAL_FEE_AMT).await
}
