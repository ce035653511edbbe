use gaia_e2e::core::logging;
use gaia_e2e::docker::DockerCli;
use gaia_e2e::testsuite::{config::E2eConfig, gov, ica, setup::IntegrationTestSuite, vesting};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a docker daemon and the gaiad-e2e and hermes-e2e images"]
async fn gaia_e2e() {
    logging::setup_logging();
    let mut suite = IntegrationTestSuite::setup(E2eConfig::from_env(), Arc::new(DockerCli::default()))
        .await
        .unwrap();

    // Run scenarios sequentially, they share the proposal counter and the funded accounts
    let outcome = async {
        gov::gov_send_msg(&mut suite).await?;
        gov::gov_community_pool_spend(&mut suite).await?;
        gov::gov_software_upgrade_and_cancel(&mut suite).await?;
        gov::gov_global_fees(&mut suite).await?;

        vesting::delayed_vesting(&suite).await?;
        vesting::continuous_vesting(&suite).await?;
        vesting::periodic_vesting(&suite).await?;

        ica::ica_bank_send(&suite).await
    }
    .await;

    suite.teardown().await.unwrap();
    outcome.unwrap();
}
