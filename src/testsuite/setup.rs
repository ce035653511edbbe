use super::config::E2eConfig;
use super::*;
use crate::core::{error::Error, poll::wait_until, relay::{Hermes, RelayedChain}};
use crate::cosmos::{
    chain::Chain,
    client::NodeClient,
    config::{update_app_config, update_toml_file, update_validator_config},
    genesis::{
        add_denom_metadata, add_vesting_accounts, generate_vesting_period, modify_genesis,
        read_genesis, set_gen_txs, write_genesis, VestingSchedule, VESTING_PERIOD_FILE,
    },
    keys::{create_mnemonic, KeyEntry, ACCOUNT_PREFIX, HD_PATH_ONE, HD_PATH_ZERO},
    tx::{GaiaCli, OneShotNode, TxOptions, NODE_HOME},
    types::UATOM_DENOM,
};
use crate::docker::{Container, PortBinding, RunOptions};
use crate::primitives::{
    funcs::{copy_file, make_world_writable, write_file},
    traits::ContainerRuntime,
};
use futures::future::try_join_all;
use ibc_relayer_types::core::ics24_host::identifier::{ChannelId, ConnectionId};
use rand::Rng;
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Ports validator 0 of each network publishes, shifted by the network's offset.
const PUBLISHED_PORTS: &[u16] = &[1317, 6060, 6061, 6062, 6063, 6064, 6065, 9090, 26656, 26657];

const NODE_START_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const RELAYER_START_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Pause between bringing up the networks and the relayer steps, otherwise the relayer sees
/// gRPC transport errors.
const SETTLE_TIME: Duration = Duration::from_secs(10);

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Both networks, the relayer between them and everything needed to tear them down.
pub struct IntegrationTestSuite {
    pub config: E2eConfig,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub chain_a: Chain,
    pub chain_b: Chain,
    pub network: Option<String>,
    /// Validator containers by chain id
    pub val_containers: HashMap<String, Vec<Container>>,
    pub hermes: Option<Hermes>,
    pub connection: Option<ConnectionId>,
    pub channel: Option<ChannelId>,
    pub tmp_dirs: Vec<PathBuf>,
    proposal_counter: u64,
}

impl IntegrationTestSuite {
    /// Brings up both networks and the relayer. On failure whatever was started is torn down
    /// before the error is returned.
    pub async fn setup(config: E2eConfig, runtime: Arc<dyn ContainerRuntime>) -> Result<Self, Error> {
        log::info!(target: "gaia-e2e", "setting up e2e integration test suite...");
        let mut suite = Self {
            config,
            runtime,
            chain_a: Chain::new()?,
            chain_b: Chain::new()?,
            network: None,
            val_containers: HashMap::new(),
            hermes: None,
            connection: None,
            channel: None,
            tmp_dirs: vec![],
            proposal_counter: 0,
        };
        if let Err(e) = suite.bootstrap().await {
            log::error!(target: "gaia-e2e", "e2e setup failed: {}", e);
            if let Err(teardown) = suite.teardown().await {
                log::warn!(target: "gaia-e2e", "teardown after failed setup failed too: {}", teardown);
            }
            return Err(e);
        }
        Ok(suite)
    }

    // The bootstrapping phase is as follows:
    //
    // 1. Initialize Gaia validator nodes.
    // 2. Create and initialize Gaia validator genesis files (both chains)
    // 3. Start both networks.
    // 4. Create and run the IBC relayer (Hermes) container.
    async fn bootstrap(&mut self) -> Result<(), Error> {
        let network = format!("{}-{}-testnet", self.chain_a.id, self.chain_b.id);
        self.runtime.create_network(&network).await?;
        self.network = Some(network.clone());

        let vesting_mnemonic = create_mnemonic();
        let runtime = self.runtime.as_ref();
        let image = self.config.gaiad_image.as_str();

        for (chain, offset) in [
            (&mut self.chain_a, CHAIN_A_PORT_OFFSET),
            (&mut self.chain_b, CHAIN_B_PORT_OFFSET),
        ] {
            log::info!(
                target: "gaia-e2e",
                "starting e2e infrastructure for chain {}; datadir: {}",
                chain.id,
                chain.data_dir.display()
            );
            init_nodes(runtime, image, chain).await?;
            init_genesis(runtime, image, chain, &vesting_mnemonic).await?;
            init_validator_configs(chain)?;
            let containers = self.val_containers.entry(chain.id.to_string()).or_default();
            run_validators(runtime, image, &network, chain, offset, containers).await?;
        }

        tokio::time::sleep(SETTLE_TIME).await;
        self.run_ibc_relayer().await
    }

    async fn run_ibc_relayer(&mut self) -> Result<(), Error> {
        let tmp_dir = tempfile::Builder::new()
            .prefix("gaia-e2e-testnet-hermes-")
            .tempdir()?
            .into_path();
        self.tmp_dirs.push(tmp_dir.clone());

        let a = self.relayed_chain(&self.chain_a)?;
        let b = self.relayed_chain(&self.chain_b)?;
        let network = self
            .network
            .clone()
            .ok_or_else(|| Error::from("the relayer needs the e2e network"))?;
        let hermes = Hermes::start(
            self.runtime.as_ref(),
            (self.config.hermes_repository.as_str(), self.config.hermes_tag.as_str()),
            &network,
            &self.config.scripts_dir,
            &tmp_dir.join("hermes"),
            &a,
            &b,
        )
        .await?;
        let hermes = self.hermes.insert(hermes);
        hermes.wait_healthy(RELAYER_START_TIMEOUT).await?;

        tokio::time::sleep(SETTLE_TIME).await;
        let connection = hermes.create_connection(self.runtime.as_ref()).await?;
        tokio::time::sleep(SETTLE_TIME).await;
        let channel = hermes.create_channel(self.runtime.as_ref(), &connection).await?;

        self.connection = Some(connection);
        self.channel = Some(channel);
        Ok(())
    }

    fn relayed_chain(&self, chain: &Chain) -> Result<RelayedChain, Error> {
        let val0 = chain
            .validators
            .first()
            .ok_or_else(|| Error::from(format!("{} has no validators", chain.id)))?;
        let relayer = chain
            .genesis_accounts
            .get(RELAYER_ACCOUNT_INDEX)
            .ok_or_else(|| Error::from(format!("{} has no relayer account", chain.id)))?;
        Ok(RelayedChain {
            chain_id: chain.id.clone(),
            val_mnemonic: val0.mnemonic.clone(),
            rly_mnemonic: relayer.mnemonic.clone(),
            val_host: self.container(chain, 0)?.name.clone(),
        })
    }

    /// Removes the relayer, the validators, the network and every directory the suite created,
    /// unless `GAIA_E2E_SKIP_CLEANUP` says otherwise.
    pub async fn teardown(&self) -> Result<(), Error> {
        if self.config.skip_cleanup()? {
            log::info!(target: "gaia-e2e", "skipping cleanup, containers and data directories are left behind");
            return Ok(());
        }
        log::info!(target: "gaia-e2e", "tearing down e2e integration test suite...");

        if let Some(hermes) = &self.hermes {
            self.runtime.purge(&hermes.container).await?;
        }
        try_join_all(
            self.val_containers
                .values()
                .flatten()
                .map(|container| self.runtime.purge(container)),
        )
        .await?;
        if let Some(network) = &self.network {
            self.runtime.remove_network(network).await?;
        }

        // Best effort, files written by the containers may not belong to us.
        for dir in [&self.chain_a.data_dir, &self.chain_b.data_dir]
            .into_iter()
            .chain(self.tmp_dirs.iter())
        {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                log::warn!(target: "gaia-e2e", "failed to remove {}: {}", dir.display(), e);
            }
        }
        Ok(())
    }

    pub fn container(&self, chain: &Chain, index: usize) -> Result<&Container, Error> {
        self.val_containers
            .get(chain.id.as_str())
            .and_then(|containers| containers.get(index))
            .ok_or_else(|| Error::from(format!("validator {} of {} is not running", index, chain.id)))
    }

    /// CLI of validator `index`'s container, paying the standard fees.
    pub fn cli<'a>(&'a self, chain: &'a Chain, index: usize) -> Result<GaiaCli<'a>, Error> {
        Ok(GaiaCli::new(
            self.runtime.as_ref(),
            self.container(chain, index)?,
            chain.id.clone(),
            TxOptions {
                fees: uatom(FEES),
                gas: GAS,
            },
        ))
    }

    pub fn node_client(&self, chain: &Chain) -> Result<NodeClient, Error> {
        let offset = if chain.id == self.chain_b.id {
            CHAIN_B_PORT_OFFSET
        } else {
            CHAIN_A_PORT_OFFSET
        };
        NodeClient::localhost(chain.id.clone(), offset)
    }

    /// Id the next submitted proposal will get. Both networks share the counter, proposals are
    /// only ever submitted on chain A.
    pub fn next_proposal_id(&mut self) -> u64 {
        self.proposal_counter += 1;
        self.proposal_counter
    }
}

/// Initializes the validator homes, creates the genesis accounts and funds all of them in the
/// genesis of validator 0, which is then copied to the other validators.
pub async fn init_nodes(runtime: &dyn ContainerRuntime, image: &str, chain: &mut Chain) -> Result<(), Error> {
    chain
        .create_and_init_validators(runtime, image, VALIDATORS_PER_CHAIN)
        .await?;
    // 0: relayer wallet, 1: ICA owner, 2 and 3: test accounts
    chain
        .add_account_from_mnemonic(runtime, image, GENESIS_ACCOUNTS_PER_CHAIN)
        .await?;

    let val0_genesis = chain.validators[0].config_file("genesis.json");
    let mut genesis = read_genesis(&val0_genesis)?;
    modify_genesis(
        &mut genesis,
        INIT_BALANCE,
        &chain.addresses(),
        &format!("{}{}", INITIAL_GLOBAL_FEE_AMT, UATOM_DENOM),
        UATOM_DENOM,
    )?;
    write_genesis(&val0_genesis, &genesis)?;

    for validator in &chain.validators[1..] {
        copy_file(&val0_genesis, validator.config_file("genesis.json"))?;
    }
    Ok(())
}

/// Adds the vesting accounts and denom metadata, collects each validator's gentx and writes the
/// final genesis plus the periodic vesting schedule to every validator.
pub async fn init_genesis(
    runtime: &dyn ContainerRuntime,
    image: &str,
    chain: &mut Chain,
    vesting_mnemonic: &str,
) -> Result<(), Error> {
    let continuous = KeyEntry::from_mnemonic(vesting_mnemonic, HD_PATH_ZERO, ACCOUNT_PREFIX)?.account;
    let delayed = KeyEntry::from_mnemonic(vesting_mnemonic, HD_PATH_ONE, ACCOUNT_PREFIX)?.account;
    let val0 = OneShotNode::new(runtime, image, chain.validators[0].config_dir());
    val0.import_key_at("continuous_vesting", vesting_mnemonic, 0).await?;
    val0.import_key_at("delayed_vesting", vesting_mnemonic, 1).await?;
    log::info!(target: "gaia-e2e", "created vesting continuous genesis account {}", continuous);
    log::info!(target: "gaia-e2e", "created vesting delayed genesis account {}", delayed);

    let mut genesis = read_genesis(chain.validators[0].config_file("genesis.json"))?;
    add_vesting_accounts(
        &mut genesis,
        &continuous,
        &delayed,
        &[uatom(VESTING_AMOUNT_VESTED)],
        &[vesting_balance()],
        VestingSchedule::random(unix_now()),
    )?;
    add_denom_metadata(&mut genesis, UATOM_DENOM)?;
    chain.continuous_vesting_acc = Some(continuous);
    chain.delayed_vesting_acc = Some(delayed);

    // gentx checks the validator's funds against the genesis in its own home
    for validator in &chain.validators {
        write_genesis(validator.config_file("genesis.json"), &genesis)?;
    }
    let mut gen_txs = Vec::with_capacity(chain.validators.len());
    for validator in &chain.validators {
        let node = OneShotNode::new(runtime, image, validator.config_dir());
        gen_txs.push(node.gentx(&validator.moniker, &chain.id, &uatom(STAKING_AMOUNT)).await?);
    }
    set_gen_txs(&mut genesis, gen_txs)?;

    let start_offset = rand::thread_rng().gen_range(95..115);
    let vesting_period = generate_vesting_period(unix_now(), start_offset, &uatom(VESTING_AMOUNT));
    let vesting_period = serde_json::to_vec_pretty(&vesting_period)?;

    for validator in &chain.validators {
        write_genesis(validator.config_file("genesis.json"), &genesis)?;
        write_file(validator.config_dir().join(VESTING_PERIOD_FILE), &vesting_period)?;
    }
    Ok(())
}

/// Rewrites `config.toml` and `app.toml` of every validator.
pub fn init_validator_configs(chain: &Chain) -> Result<(), Error> {
    for validator in &chain.validators {
        let peers = chain.persistent_peers(validator.index)?;
        let instance_name = validator.instance_name();
        update_toml_file(validator.config_file("config.toml"), |config| {
            update_validator_config(config, &instance_name, &peers)
        })?;
        update_toml_file(validator.config_file("app.toml"), |config| {
            update_app_config(config, &min_gas_prices())
        })?;
    }
    Ok(())
}

/// Container options of a validator. Validator 0 publishes its ports at `offset` above the
/// defaults so both networks can be reached from the host.
pub fn validator_run_options(
    image: &str,
    network: &str,
    chain: &Chain,
    index: usize,
    offset: u16,
) -> RunOptions {
    let validator = &chain.validators[index];
    let mut options = RunOptions::new(image);
    options.name = Some(validator.instance_name());
    options.network = Some(network.to_string());
    options.mounts = vec![format!("{}/:{}", validator.config_dir().display(), NODE_HOME)];
    if validator.index == 0 {
        for port in PUBLISHED_PORTS {
            options
                .port_bindings
                .insert(format!("{}/tcp", port), vec![PortBinding::new(port + offset)]);
        }
    }
    options
}

/// Starts every validator of `chain`, then waits for the network to produce a few blocks.
pub async fn run_validators(
    runtime: &dyn ContainerRuntime,
    image: &str,
    network: &str,
    chain: &Chain,
    offset: u16,
    containers: &mut Vec<Container>,
) -> Result<(), Error> {
    log::info!(target: "gaia-e2e", "starting Gaia {} validator containers...", chain.id);
    for validator in &chain.validators {
        make_world_writable(validator.config_dir())?;
        let options = validator_run_options(image, network, chain, validator.index, offset);
        let container = runtime.run(&options).await?;
        log::info!(target: "gaia-e2e", "started Gaia {} validator container: {}", chain.id, container.id);
        containers.push(container);
    }

    let client = NodeClient::localhost(chain.id.clone(), offset)?;
    wait_until(
        &format!("{} to produce blocks", chain.id),
        NODE_START_TIMEOUT,
        Duration::from_secs(1),
        || async {
            match client.status().await {
                Ok(status) => status.is_ready(3),
                Err(_) => false,
            }
        },
    )
    .await
}
