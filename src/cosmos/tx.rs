//! `gaiad` command line invocations, either in a throwaway container sharing a node home or
//! inside a running validator container.

use super::types::Coin;
use crate::core::{error::Error, poll::wait_for};
use crate::docker::{Container, ExecOutput, RunOptions};
use crate::primitives::{
    funcs::{owner_of, to_json_indent, write_file},
    traits::ContainerRuntime,
};
use ibc_relayer_types::core::ics24_host::identifier::{ChainId, ConnectionId};
use serde::Deserialize;
use serde_json::Value;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub const GAIAD: &str = "gaiad";
/// Node home inside the validator image.
pub const NODE_HOME: &str = "/home/nonroot/.gaia";
pub const NODE_USER: &str = "nonroot";
pub const KEYRING_BACKEND: &str = "test";
pub const VALIDATOR_KEY_NAME: &str = "val";

const TX_COMMIT_TIMEOUT: Duration = Duration::from_secs(60);
const DRY_RUN_TIMEOUT: Duration = Duration::from_secs(60);

/// `gaiad` run to completion in a fresh container with a host node home mounted.
pub struct OneShotNode<'a> {
    runtime: &'a dyn ContainerRuntime,
    image: &'a str,
    home: PathBuf,
}

impl<'a> OneShotNode<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, image: &'a str, home: &Path) -> Self {
        Self {
            runtime,
            image,
            home: home.to_path_buf(),
        }
    }

    /// Options shared by every run: the node home mounted at [`NODE_HOME`], and the container
    /// running as the owner of that home so the harness can read what `gaiad` writes there.
    fn base_options(&self) -> Result<RunOptions, Error> {
        std::fs::create_dir_all(&self.home)?;
        let mut options = RunOptions::new(self.image);
        options.mounts = vec![format!("{}/:{}", self.home.display(), NODE_HOME)];
        options.user = owner_of(&self.home)?;
        Ok(options)
    }

    fn options(&self, script: &str, env: Vec<String>) -> Result<RunOptions, Error> {
        let mut options = self.base_options()?;
        options.entrypoint = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        options.env = env;
        Ok(options)
    }

    async fn gaiad(&self, args: &[&str]) -> Result<ExecOutput, Error> {
        let mut options = self.base_options()?;
        options.entrypoint = vec![GAIAD.to_string()];
        options.cmd = args.iter().map(|a| a.to_string()).collect();
        self.runtime.run_once(&options).await
    }

    /// `gaiad init`: node key, consensus key, default configs and genesis.
    pub async fn init(&self, moniker: &str, chain_id: &ChainId) -> Result<(), Error> {
        self.gaiad(&["init", moniker, "--chain-id", chain_id.as_str(), "--home", NODE_HOME])
            .await?;
        Ok(())
    }

    /// Imports `mnemonic` into the test keyring under `name`. The mnemonic travels through the
    /// environment so it never has to be quoted into the shell command.
    pub async fn import_key(&self, name: &str, mnemonic: &str) -> Result<(), Error> {
        self.import_key_at(name, mnemonic, 0).await
    }

    /// Like [`OneShotNode::import_key`], for the key at address index `index` of the mnemonic.
    pub async fn import_key_at(&self, name: &str, mnemonic: &str, index: u32) -> Result<(), Error> {
        let script = format!(
            "echo \"$MNEMONIC\" | {} keys add \"$KEY_NAME\" --recover --index {} --keyring-backend {} --home {}",
            GAIAD, index, KEYRING_BACKEND, NODE_HOME
        );
        let env = vec![format!("MNEMONIC={}", mnemonic), format!("KEY_NAME={}", name)];
        self.runtime.run_once(&self.options(&script, env)?).await?;
        Ok(())
    }

    /// Signs a `MsgCreateValidator` self-delegating `stake` and returns the gentx document.
    pub async fn gentx(&self, moniker: &str, chain_id: &ChainId, stake: &Coin) -> Result<Value, Error> {
        let file = format!("gentx-{}.json", moniker);
        let stake = stake.to_string();
        let output_document = format!("{}/config/gentx/{}", NODE_HOME, file);
        self.gaiad(&[
            "gentx",
            VALIDATOR_KEY_NAME,
            &stake,
            "--moniker",
            moniker,
            "--chain-id",
            chain_id.as_str(),
            "--keyring-backend",
            KEYRING_BACKEND,
            "--home",
            NODE_HOME,
            "--output-document",
            &output_document,
        ])
        .await?;
        let content = std::fs::read_to_string(self.home.join("config").join("gentx").join(file))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Result of a broadcast transaction as printed by `--output json`.
#[derive(Debug, Clone, Deserialize)]
pub struct TxResponse {
    #[serde(default)]
    pub code: u32,
    pub txhash: String,
    #[serde(default)]
    pub raw_log: String,
}

/// Fee and gas attached to every transaction.
#[derive(Debug, Clone)]
pub struct TxOptions {
    pub fees: Coin,
    pub gas: u64,
}

/// `gaiad` executed inside a running validator container.
pub struct GaiaCli<'a> {
    runtime: &'a dyn ContainerRuntime,
    container: &'a Container,
    chain_id: ChainId,
    tx_options: TxOptions,
}

impl<'a> GaiaCli<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        container: &'a Container,
        chain_id: ChainId,
        tx_options: TxOptions,
    ) -> Self {
        Self {
            runtime,
            container,
            chain_id,
            tx_options,
        }
    }

    /// Path inside the container of a file under the node's `config/` directory.
    pub fn config_path(file: &str) -> String {
        format!("{}/config/{}", NODE_HOME, file)
    }

    pub async fn exec(&self, args: Vec<String>) -> Result<ExecOutput, Error> {
        let mut cmd = vec![GAIAD.to_string()];
        cmd.extend(args);
        log::info!(target: "gaia-e2e", "📡 {} on {}: {}", self.chain_id, self.container.name, cmd.join(" "));
        self.runtime.exec(self.container, Some(NODE_USER), &cmd).await
    }

    /// Common trailing flags of a transaction signed by `from`.
    pub fn tx_flags(&self, from: &str) -> Vec<String> {
        [
            "--from",
            from,
            "--chain-id",
            self.chain_id.as_str(),
            "--keyring-backend",
            KEYRING_BACKEND,
            "--home",
            NODE_HOME,
            "--output",
            "json",
            "-y",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain([
            format!("--fees={}", self.tx_options.fees),
            format!("--gas={}", self.tx_options.gas),
        ])
        .collect()
    }

    /// Runs `gaiad tx <args> <flags>` and fails unless the node accepted it into the mempool.
    pub async fn broadcast(&self, args: &[&str], from: &str) -> Result<TxResponse, Error> {
        let mut cmd = vec!["tx".to_string()];
        cmd.extend(args.iter().map(|a| a.to_string()));
        cmd.extend(self.tx_flags(from));
        let output = self.exec(cmd).await?;
        let response: TxResponse = serde_json::from_str(output.stdout.trim())?;
        check_code(&response)?;
        log::info!(target: "gaia-e2e", "📡 Transaction broadcast with hash: {}", response.txhash);
        Ok(response)
    }

    /// Broadcasts and waits until the transaction is in a block, so the signer's next
    /// transaction gets a fresh sequence.
    pub async fn tx(&self, args: &[&str], from: &str) -> Result<TxResponse, Error> {
        let response = self.broadcast(args, from).await?;
        self.wait_for_tx(&response.txhash).await
    }

    pub async fn wait_for_tx(&self, txhash: &str) -> Result<TxResponse, Error> {
        let committed = wait_for(
            &format!("transaction {} to be committed", txhash),
            TX_COMMIT_TIMEOUT,
            Duration::from_secs(1),
            || async move { self.query(&["tx", txhash]).await },
        )
        .await?;
        let response: TxResponse = serde_json::from_value(committed)?;
        check_code(&response)?;
        log::info!(target: "gaia-e2e", "🤝 Transaction confirmed with hash: {}", response.txhash);
        Ok(response)
    }

    pub async fn query(&self, args: &[&str]) -> Result<Value, Error> {
        let mut cmd = vec!["query".to_string()];
        cmd.extend(args.iter().map(|a| a.to_string()));
        cmd.extend(["--output".to_string(), "json".to_string()]);
        let output = self.exec(cmd).await?;
        Ok(serde_json::from_str(output.stdout.trim())?)
    }

    /// Submits a proposal file from the node's config directory. Legacy proposals carry their
    /// kind, eg. `community-pool-spend` or `param-change`.
    pub async fn submit_gov_proposal(
        &self,
        from: &str,
        file: &str,
        legacy_kind: Option<&str>,
    ) -> Result<TxResponse, Error> {
        let path = Self::config_path(file);
        match legacy_kind {
            Some(kind) => {
                self.tx(&["gov", "submit-legacy-proposal", kind, &path], from)
                    .await
            }
            None => self.tx(&["gov", "submit-proposal", &path], from).await,
        }
    }

    pub async fn deposit(&self, from: &str, proposal_id: u64, amount: &Coin) -> Result<TxResponse, Error> {
        let (id, amount) = (proposal_id.to_string(), amount.to_string());
        self.tx(&["gov", "deposit", &id, &amount], from).await
    }

    pub async fn vote(&self, from: &str, proposal_id: u64, option: &str) -> Result<TxResponse, Error> {
        let id = proposal_id.to_string();
        self.tx(&["gov", "vote", &id, option], from).await
    }

    pub async fn bank_send(&self, from: &str, to: &str, amount: &Coin) -> Result<TxResponse, Error> {
        let amount = amount.to_string();
        self.tx(&["bank", "send", from, to, &amount], from).await
    }

    pub async fn create_periodic_vesting_account(
        &self,
        from: &str,
        to: &str,
        periods_file: &str,
    ) -> Result<TxResponse, Error> {
        let path = format!("{}/{}", NODE_HOME, periods_file);
        self.tx(
            &["vesting", "create-periodic-vesting-account", to, &path],
            from,
        )
        .await
    }

    pub async fn register_ica(&self, owner: &str, connection: &ConnectionId) -> Result<TxResponse, Error> {
        self.tx(
            &["icamauth", "register", "--connection-id", connection.as_str()],
            owner,
        )
        .await
    }

    /// Sends the messages in `file` (under `config/`) to be executed by the owner's interchain
    /// account.
    pub async fn submit_ica_tx(
        &self,
        owner: &str,
        connection: &ConnectionId,
        file: &str,
    ) -> Result<TxResponse, Error> {
        let path = Self::config_path(file);
        self.tx(
            &["icamauth", "submit", &path, "--connection-id", connection.as_str()],
            owner,
        )
        .await
    }

    pub async fn query_ica_address(&self, owner: &str, connection: &ConnectionId) -> Result<String, Error> {
        let response = self
            .query(&["icamauth", "interchainaccounts", connection.as_str(), owner])
            .await?;
        response
            .get("interchain_account_address")
            .and_then(Value::as_str)
            .filter(|address| !address.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::from(format!("no interchain account registered for {}", owner)))
    }

    /// Dry-runs a transaction with `--generate-only` and writes its first message, pretty
    /// printed, to `path` on the host.
    pub async fn write_ica_tx(&self, mut cmd: Vec<String>, path: &Path) -> Result<(), Error> {
        cmd.push("--generate-only=true".to_string());
        log::info!(target: "gaia-e2e", "dry run: ica tx {}", cmd.join(" "));
        let output = tokio::time::timeout(DRY_RUN_TIMEOUT, self.exec(cmd))
            .await
            .map_err(|_| Error::Timeout {
                description: format!("dry run for {}", path.display()),
                elapsed: DRY_RUN_TIMEOUT,
            })??;
        let message = first_message(&output.stdout)?;
        write_file(path, &to_json_indent(&message, b" ")?)?;
        log::info!(target: "gaia-e2e", "write ica transaction json to {}", path.display());
        Ok(())
    }
}

fn check_code(response: &TxResponse) -> Result<(), Error> {
    if response.code != 0 {
        return Err(Error::from(format!(
            "transaction {} failed with code {}: {}",
            response.txhash, response.code, response.raw_log
        )));
    }
    Ok(())
}

/// First entry of `body.messages` of a generated, unsigned transaction.
pub fn first_message(generated_tx: &str) -> Result<Value, Error> {
    let tx: Value = serde_json::from_str(generated_tx.trim())?;
    tx.get("body")
        .and_then(|body| body.get("messages"))
        .and_then(Value::as_array)
        .and_then(|messages| messages.first())
        .cloned()
        .ok_or_else(|| Error::from("generated transaction has no messages"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmos::types::UATOM_DENOM;
    use crate::docker::ExecOutput;
    use std::sync::Mutex;

    /// Records every invocation and answers with a canned stdout.
    struct Recorder {
        calls: Mutex<Vec<Vec<String>>>,
        stdout: String,
        /// How long `exec` takes to answer
        delay: Option<Duration>,
    }

    impl Recorder {
        fn new(stdout: &str) -> Self {
            Self {
                calls: Mutex::new(vec![]),
                stdout: stdout.to_string(),
                delay: None,
            }
        }

        fn output(&self) -> ExecOutput {
            ExecOutput {
                stdout: self.stdout.clone(),
                stderr: String::new(),
            }
        }
    }

    #[async_trait::async_trait]
    impl ContainerRuntime for Recorder {
        async fn create_network(&self, _name: &str) -> Result<String, Error> {
            unimplemented!()
        }
        async fn remove_network(&self, _name: &str) -> Result<(), Error> {
            unimplemented!()
        }
        async fn run(&self, _options: &RunOptions) -> Result<Container, Error> {
            unimplemented!()
        }
        async fn run_once(&self, options: &RunOptions) -> Result<ExecOutput, Error> {
            self.calls.lock().unwrap().push(options.to_args(false));
            Ok(self.output())
        }
        async fn exec(
            &self,
            _container: &Container,
            user: Option<&str>,
            cmd: &[String],
        ) -> Result<ExecOutput, Error> {
            assert_eq!(user, Some(NODE_USER));
            self.calls.lock().unwrap().push(cmd.to_vec());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.output())
        }
        async fn host_port(&self, _container: &Container, _port: &str) -> Result<String, Error> {
            unimplemented!()
        }
        async fn purge(&self, _container: &Container) -> Result<(), Error> {
            unimplemented!()
        }
    }

    fn container() -> Container {
        Container {
            id: "abc".to_string(),
            name: "chain-x-gaia-00".to_string(),
        }
    }

    fn tx_options() -> TxOptions {
        TxOptions {
            fees: Coin::new(UATOM_DENOM, 330000),
            gas: 200000,
        }
    }

    #[tokio::test]
    async fn vote_appends_signing_flags() {
        let runtime = Recorder::new(r#"{"height":"0","txhash":"ABC","code":0,"raw_log":"[]"}"#);
        let container = container();
        let cli = GaiaCli::new(&runtime, &container, ChainId::from("chain-x".to_string()), tx_options());

        let response = cli.vote("val", 3, "yes").await.unwrap();
        assert_eq!(response.txhash, "ABC");

        let calls = runtime.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1],
            vec!["gaiad", "query", "tx", "ABC", "--output", "json"]
        );
        assert_eq!(
            calls[0],
            vec![
                "gaiad", "tx", "gov", "vote", "3", "yes", "--from", "val", "--chain-id", "chain-x",
                "--keyring-backend", "test", "--home", "/home/nonroot/.gaia", "--output", "json",
                "-y", "--fees=330000uatom", "--gas=200000",
            ]
        );
    }

    #[tokio::test]
    async fn rejected_transaction_is_an_error() {
        let runtime = Recorder::new(r#"{"txhash":"DEF","code":5,"raw_log":"insufficient funds"}"#);
        let container = container();
        let cli = GaiaCli::new(&runtime, &container, ChainId::from("chain-x".to_string()), tx_options());
        let err = cli
            .bank_send("acct-2", "cosmos1xyz", &Coin::new(UATOM_DENOM, 1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("insufficient funds"));
    }

    #[tokio::test]
    async fn dry_run_writes_first_message() {
        let generated = r#"{"body":{"messages":[{"@type":"/cosmos.bank.v1beta1.MsgSend","from_address":"a","to_address":"b","amount":[]}],"memo":""},"auth_info":{},"signatures":[]}"#;
        let runtime = Recorder::new(generated);
        let container = container();
        let cli = GaiaCli::new(&runtime, &container, ChainId::from("chain-x".to_string()), tx_options());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ica_bank_send.json");
        let cmd = vec!["tx".to_string(), "bank".to_string(), "send".to_string()];
        cli.write_ica_tx(cmd, &path).await.unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["@type"], "/cosmos.bank.v1beta1.MsgSend");
        let calls = runtime.calls.lock().unwrap();
        assert_eq!(calls[0].last().map(String::as_str), Some("--generate-only=true"));
    }

    #[test]
    fn generated_tx_without_messages_is_rejected() {
        assert!(first_message(r#"{"body":{"messages":[]}}"#).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_dry_run_times_out_with_an_error() {
        let mut runtime = Recorder::new(r#"{"body":{"messages":[{}]}}"#);
        runtime.delay = Some(Duration::from_secs(61));
        let container = container();
        let cli = GaiaCli::new(&runtime, &container, ChainId::from("chain-x".to_string()), tx_options());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ica_bank_send.json");
        let err = cli
            .write_ica_tx(vec!["tx".to_string()], &path)
            .await
            .unwrap_err();
        match err {
            Error::Timeout { description, elapsed } => {
                assert!(description.contains("ica_bank_send.json"));
                assert_eq!(elapsed, Duration::from_secs(60));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn import_key_passes_mnemonic_through_env() {
        let runtime = Recorder::new("");
        let home = tempfile::tempdir().unwrap();
        let node = OneShotNode::new(&runtime, "cosmos/gaiad-e2e", home.path());
        node.import_key("acct-0", "word word word").await.unwrap();

        let calls = runtime.calls.lock().unwrap();
        let args = &calls[0];
        assert!(args.contains(&"MNEMONIC=word word word".to_string()));
        assert!(args.contains(&"KEY_NAME=acct-0".to_string()));
        assert!(args.contains(&format!("{}/:/home/nonroot/.gaia", home.path().display())));
        assert!(args.iter().all(|a| !a.contains("echo \"word")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn one_shot_runs_as_home_owner() {
        let runtime = Recorder::new("");
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("chain-x-gaia-00");
        let node = OneShotNode::new(&runtime, "cosmos/gaiad-e2e", &home);
        node.init("chain-x-gaia-0", &ChainId::from("chain-x".to_string()))
            .await
            .unwrap();
        node.import_key("val", "word word word").await.unwrap();

        let owner = owner_of(&home).unwrap().unwrap();
        let calls = runtime.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        for args in calls.iter() {
            let user = args.iter().position(|a| a == "--user").unwrap();
            assert_eq!(args[user + 1], owner);
        }
    }
}
