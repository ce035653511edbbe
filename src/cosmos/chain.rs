use super::keys::{create_mnemonic, KeyEntry, ACCOUNT_PREFIX, HD_PATH_ZERO};
use super::config::P2P_PORT;
use super::tx::{OneShotNode, VALIDATOR_KEY_NAME};
use crate::core::error::Error;
use crate::primitives::traits::ContainerRuntime;
use ibc_relayer_types::core::ics24_host::identifier::ChainId;
use rand::{distributions::Alphanumeric, Rng};
use std::path::{Path, PathBuf};
use tendermint::node;

/// A key-holding account on a network, imported into validator 0's keyring.
#[derive(Clone, Debug)]
pub struct Account {
    pub name: String,
    pub mnemonic: String,
    pub key: KeyEntry,
}

impl Account {
    pub fn from_mnemonic(name: impl Into<String>, mnemonic: String) -> Result<Self, Error> {
        let key = KeyEntry::from_mnemonic(&mnemonic, HD_PATH_ZERO, ACCOUNT_PREFIX)?;
        Ok(Self {
            name: name.into(),
            mnemonic,
            key,
        })
    }

    pub fn address(&self) -> &str {
        &self.key.account
    }
}

#[derive(Clone, Debug)]
pub struct Validator {
    pub chain_id: ChainId,
    pub index: usize,
    pub moniker: String,
    pub mnemonic: String,
    pub key: KeyEntry,
    /// Set once the node home has been initialized
    pub node_id: Option<node::Id>,
    config_dir: PathBuf,
}

impl Validator {
    /// Container and host name of the validator on the shared network.
    pub fn instance_name(&self) -> String {
        format!("{}{}", self.moniker, self.index)
    }

    /// Home directory of the node on the host, mounted into its container.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of a file under the node's `config/` directory.
    pub fn config_file(&self, file: &str) -> PathBuf {
        self.config_dir.join("config").join(file)
    }

    pub fn address(&self) -> &str {
        &self.key.account
    }

    /// `<node-id>@<instance>:26656`, as listed in other validators' `persistent_peers`.
    pub fn peer_address(&self) -> Result<String, Error> {
        let node_id = self.node_id.ok_or_else(|| {
            Error::from(format!("validator {} has no node id yet", self.instance_name()))
        })?;
        Ok(format!("{}@{}:{}", node_id, self.instance_name(), P2P_PORT))
    }
}

/// A logical network: its validators and the accounts funded at genesis.
#[derive(Debug)]
pub struct Chain {
    pub id: ChainId,
    pub data_dir: PathBuf,
    pub validators: Vec<Validator>,
    /// 0: relayer wallet, 1: ICA owner, 2 and 3: test accounts
    pub genesis_accounts: Vec<Account>,
    pub continuous_vesting_acc: Option<String>,
    pub delayed_vesting_acc: Option<String>,
}

impl Chain {
    /// A chain with a random id and a fresh temporary data directory.
    pub fn new() -> Result<Self, Error> {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        let data_dir = tempfile::Builder::new()
            .prefix("gaia-e2e-testnet-")
            .tempdir()?
            .into_path();
        Ok(Self::with_data_dir(format!("chain-{}", suffix), data_dir))
    }

    pub fn with_data_dir(id: impl Into<String>, data_dir: PathBuf) -> Self {
        Self {
            id: ChainId::from(id.into()),
            data_dir,
            validators: vec![],
            genesis_accounts: vec![],
            continuous_vesting_acc: None,
            delayed_vesting_acc: None,
        }
    }

    /// Builds the in-memory model of validator `index` with a fresh mnemonic.
    pub fn create_validator(&self, index: usize) -> Result<Validator, Error> {
        let mnemonic = create_mnemonic();
        let key = KeyEntry::from_mnemonic(&mnemonic, HD_PATH_ZERO, ACCOUNT_PREFIX)?;
        let moniker = format!("{}-gaia-{}", self.id, index);
        let config_dir = self.data_dir.join(format!("{}{}", moniker, index));
        Ok(Validator {
            chain_id: self.id.clone(),
            index,
            moniker,
            mnemonic,
            key,
            node_id: None,
            config_dir,
        })
    }

    /// Creates `count` validators and initializes each node home: `gaiad init`, the validator
    /// key imported into the test keyring, and the node id read back.
    pub async fn create_and_init_validators(
        &mut self,
        runtime: &dyn ContainerRuntime,
        image: &str,
        count: usize,
    ) -> Result<(), Error> {
        for index in 0..count {
            let mut validator = self.create_validator(index)?;
            let node = OneShotNode::new(runtime, image, validator.config_dir());
            node.init(&validator.moniker, &self.id).await?;
            node.import_key(VALIDATOR_KEY_NAME, &validator.mnemonic).await?;
            validator.node_id = Some(super::keys::node_id_from_key_file(
                validator.config_file("node_key.json"),
            )?);
            log::info!(
                target: "gaia-e2e",
                "initialized validator {} ({}) of {}",
                validator.instance_name(),
                validator.address(),
                self.id
            );
            self.validators.push(validator);
        }
        Ok(())
    }

    /// Creates `count` genesis accounts and imports them into validator 0's keyring as
    /// `acct-<i>`.
    pub async fn add_account_from_mnemonic(
        &mut self,
        runtime: &dyn ContainerRuntime,
        image: &str,
        count: usize,
    ) -> Result<(), Error> {
        let val0 = self
            .validators
            .first()
            .ok_or_else(|| Error::from("accounts are stored in validator 0, create it first"))?;
        let node = OneShotNode::new(runtime, image, val0.config_dir());
        let offset = self.genesis_accounts.len();
        for i in offset..offset + count {
            let account = Account::from_mnemonic(format!("acct-{}", i), create_mnemonic())?;
            node.import_key(&account.name, &account.mnemonic).await?;
            log::info!(target: "gaia-e2e", "created genesis account {} ({})", account.name, account.address());
            self.genesis_accounts.push(account);
        }
        Ok(())
    }

    /// Every validator address followed by every genesis account address.
    pub fn addresses(&self) -> Vec<String> {
        self.validators
            .iter()
            .map(|v| v.address().to_string())
            .chain(self.genesis_accounts.iter().map(|a| a.address().to_string()))
            .collect()
    }

    /// Peers of validator `index`: every other validator of the network.
    pub fn persistent_peers(&self, index: usize) -> Result<Vec<String>, Error> {
        self.validators
            .iter()
            .filter(|v| v.index != index)
            .map(Validator::peer_address)
            .collect()
    }
}
