//! The Hermes relayer container linking the two e2e networks.

use super::error::Error;
use super::poll::wait_until;
use crate::docker::{Container, PortBinding, RunOptions};
use crate::primitives::{funcs::copy_file, traits::ContainerRuntime};
use ibc_relayer_types::core::ics24_host::identifier::{ChainId, ChannelId, ConnectionId, PortId};
use serde::Deserialize;
use serde_json::Value;
use std::{path::Path, str::FromStr, time::Duration};

pub const HERMES_REPOSITORY: &str = "ghcr.io/cosmos/hermes-e2e";
pub const HERMES_TAG: &str = "1.0.0";
/// Port of the relayer's REST server, serving `/state`.
pub const HERMES_REST_PORT: &str = "3031/tcp";
pub const HERMES_MOUNT: &str = "/root/hermes";
pub const BOOTSTRAP_SCRIPT: &str = "hermes_bootstrap.sh";
pub const ICS20_VERSION: &str = "ics20-1";

/// What the relayer needs to know about one side.
#[derive(Debug, Clone)]
pub struct RelayedChain {
    pub chain_id: ChainId,
    /// Mnemonic of validator 0, funding the relayer's keys
    pub val_mnemonic: String,
    pub rly_mnemonic: String,
    /// Container name of validator 0 on the shared network
    pub val_host: String,
}

/// Environment consumed by the bootstrap script, `GAIA_A_*` for `a` and `GAIA_B_*` for `b`.
pub fn relayer_env(a: &RelayedChain, b: &RelayedChain) -> Vec<String> {
    [("A", a), ("B", b)]
        .iter()
        .flat_map(|(side, chain)| {
            vec![
                format!("GAIA_{}_E2E_CHAIN_ID={}", side, chain.chain_id),
                format!("GAIA_{}_E2E_VAL_MNEMONIC={}", side, chain.val_mnemonic),
                format!("GAIA_{}_E2E_RLY_MNEMONIC={}", side, chain.rly_mnemonic),
                format!("GAIA_{}_E2E_VAL_HOST={}", side, chain.val_host),
            ]
        })
        .collect()
}

/// Container options for a relayer between `a` and `b`, attached to `network` and reading its
/// bootstrap script from `config_dir`.
pub fn relayer_run_options(
    image: (&str, &str),
    network: &str,
    config_dir: &Path,
    a: &RelayedChain,
    b: &RelayedChain,
) -> RunOptions {
    let (repository, tag) = image;
    let mut options = RunOptions::new(repository);
    options.tag = Some(tag.to_string());
    options.name = Some(format!("{}-{}-relayer", a.chain_id, b.chain_id));
    options.network = Some(network.to_string());
    options.mounts = vec![format!("{}/:{}", config_dir.display(), HERMES_MOUNT)];
    options
        .port_bindings
        .insert(HERMES_REST_PORT.to_string(), vec![PortBinding::new(3031)]);
    options.env = relayer_env(a, b);
    options.entrypoint = vec![
        "sh".to_string(),
        "-c".to_string(),
        format!(
            "chmod +x {mount}/{script} && {mount}/{script}",
            mount = HERMES_MOUNT,
            script = BOOTSTRAP_SCRIPT
        ),
    ];
    options
}

/// Body of the relayer's `/state` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayerState {
    pub status: String,
    pub result: RelayerStateResult,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayerStateResult {
    #[serde(default)]
    pub chains: Vec<Value>,
}

impl RelayerState {
    /// Both networks are registered with the relayer.
    pub fn is_healthy(&self) -> bool {
        self.status == "success" && self.result.chains.len() == 2
    }
}

/// A running relayer container.
#[derive(Debug, Clone)]
pub struct Hermes {
    pub container: Container,
    pub a: ChainId,
    pub b: ChainId,
    /// `host:port` of the REST server
    pub rest_address: String,
}

impl Hermes {
    /// Copies the bootstrap script next to the relayer config and starts the container.
    pub async fn start(
        runtime: &dyn ContainerRuntime,
        image: (&str, &str),
        network: &str,
        scripts_dir: &Path,
        config_dir: &Path,
        a: &RelayedChain,
        b: &RelayedChain,
    ) -> Result<Self, Error> {
        log::info!(target: "gaia-e2e", "starting Hermes relayer container...");
        std::fs::create_dir_all(config_dir)?;
        copy_file(scripts_dir.join(BOOTSTRAP_SCRIPT), config_dir.join(BOOTSTRAP_SCRIPT))?;

        let options = relayer_run_options(image, network, config_dir, a, b);
        let container = runtime.run(&options).await?;
        let rest_address = runtime.host_port(&container, HERMES_REST_PORT).await?;
        log::info!(target: "gaia-e2e", "started Hermes relayer container: {}", container.id);
        Ok(Self {
            container,
            a: a.chain_id.clone(),
            b: b.chain_id.clone(),
            rest_address,
        })
    }

    pub async fn state(&self) -> Result<RelayerState, Error> {
        let url = format!("http://{}/state", self.rest_address);
        Ok(reqwest::get(&url).await?.json::<RelayerState>().await?)
    }

    /// Polls `/state` until both chains are registered.
    pub async fn wait_healthy(&self, timeout: Duration) -> Result<(), Error> {
        wait_until("hermes relayer to be healthy", timeout, Duration::from_secs(1), || async {
            match self.state().await {
                Ok(state) => state.is_healthy(),
                Err(e) => {
                    log::debug!(target: "gaia-e2e", "relayer state not available: {}", e);
                    false
                }
            }
        })
        .await
    }

    async fn hermes(&self, runtime: &dyn ContainerRuntime, args: &[&str]) -> Result<Value, Error> {
        let mut cmd = vec!["hermes".to_string(), "--json".to_string()];
        cmd.extend(args.iter().map(|a| a.to_string()));
        log::info!(target: "gaia-e2e", "running {}", cmd.join(" "));
        let output = runtime.exec(&self.container, None, &cmd).await?;
        parse_hermes_output(&output.stdout)
    }

    /// Creates clients and a connection between the two networks, returning the connection end on
    /// chain A.
    pub async fn create_connection(&self, runtime: &dyn ContainerRuntime) -> Result<ConnectionId, Error> {
        log::info!(target: "gaia-e2e", "connecting {} and {} chains via IBC", self.a, self.b);
        let result = self
            .hermes(
                runtime,
                &["create", "connection", "--a-chain", self.a.as_str(), "--b-chain", self.b.as_str()],
            )
            .await?;
        let id = a_side_field(&result, "connection_id")?;
        let connection = ConnectionId::from_str(&id)
            .map_err(|e| Error::from(format!("invalid connection id {}: {}", id, e)))?;
        log::info!(target: "gaia-e2e", "connected {} and {} chains via IBC ({})", self.a, self.b, connection);
        Ok(connection)
    }

    /// Opens an unordered ICS-20 channel between the transfer ports over `connection`.
    pub async fn create_channel(
        &self,
        runtime: &dyn ContainerRuntime,
        connection: &ConnectionId,
    ) -> Result<ChannelId, Error> {
        log::info!(target: "gaia-e2e", "creating IBC transfer channel on {}", connection);
        let port = PortId::transfer();
        let result = self
            .hermes(
                runtime,
                &[
                    "create",
                    "channel",
                    "--a-chain",
                    self.a.as_str(),
                    "--a-connection",
                    connection.as_str(),
                    "--a-port",
                    port.as_str(),
                    "--b-port",
                    port.as_str(),
                    "--channel-version",
                    ICS20_VERSION,
                    "--order",
                    "unordered",
                ],
            )
            .await?;
        let id = a_side_field(&result, "channel_id")?;
        let channel = ChannelId::from_str(&id)
            .map_err(|e| Error::from(format!("invalid channel id {}: {}", id, e)))?;
        log::info!(target: "gaia-e2e", "IBC transfer channel created between {} and {}: {}", self.a, self.b, channel);
        Ok(channel)
    }
}

/// `hermes --json` prints one JSON object per line; the last one carries the command's result.
pub fn parse_hermes_output(stdout: &str) -> Result<Value, Error> {
    let last = stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .last()
        .ok_or_else(|| Error::from(format!("no JSON in hermes output: {}", stdout)))?;
    let mut response: Value = serde_json::from_str(last)?;
    match response.get("status").and_then(Value::as_str) {
        Some("success") => Ok(response.get_mut("result").map(Value::take).unwrap_or(Value::Null)),
        _ => Err(Error::from(format!("hermes command failed: {}", last))),
    }
}

fn a_side_field(result: &Value, field: &str) -> Result<String, Error> {
    result
        .get("a_side")
        .and_then(|side| side.get(field))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::from(format!("hermes result has no a_side.{}: {}", field, result)))
}
