/*!
   Helpers for rewriting the node's `config.toml` and `app.toml`.

   The files are updated as dynamic TOML values on top of what `gaiad init`
   generated, so settings the harness doesn't care about keep their defaults.
*/

use crate::core::error::Error;
use crate::primitives::funcs::write_file;
use std::{fs, path::Path};
use toml::Value;

pub const P2P_PORT: u16 = 26656;
pub const RPC_PORT: u16 = 26657;

/// Message types that skip the minimum fee check during `CheckTx`.
pub const BYPASS_MIN_FEE_MSG_TYPES: &[&str] = &[
    "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward",
    "/ibc.applications.transfer.v1.MsgTransfer",
];

/// Read a TOML file, let `update` mutate it, and write it back.
pub fn update_toml_file(
    path: impl AsRef<Path>,
    update: impl FnOnce(&mut Value) -> Result<(), Error>,
) -> Result<(), Error> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let mut config: Value = toml::from_str(&content)?;
    update(&mut config)?;
    let content = toml::to_string_pretty(&config)?;
    write_file(path, content.as_bytes())
}

fn section_mut<'a>(config: &'a mut Value, section: &str) -> Result<&'a mut toml::value::Table, Error> {
    config
        .as_table_mut()
        .ok_or_else(|| Error::from("expect object"))?
        .entry(section.to_string())
        .or_insert_with(|| Value::Table(Default::default()))
        .as_table_mut()
        .ok_or_else(|| Error::from(format!("expect {} section to be a table", section)))
}

fn root_mut(config: &mut Value) -> Result<&mut toml::value::Table, Error> {
    config
        .as_table_mut()
        .ok_or_else(|| Error::from("expect object"))
}

/// Settings of one validator's `config.toml`: listen on every interface inside its container,
/// advertise the container name and dial every other validator of the network.
pub fn update_validator_config(
    config: &mut Value,
    instance_name: &str,
    persistent_peers: &[String],
) -> Result<(), Error> {
    root_mut(config)?.insert("log_level".to_string(), "info".into());

    let p2p = section_mut(config, "p2p")?;
    p2p.insert("laddr".to_string(), format!("tcp://0.0.0.0:{}", P2P_PORT).into());
    p2p.insert("addr_book_strict".to_string(), false.into());
    p2p.insert(
        "external_address".to_string(),
        format!("{}:{}", instance_name, P2P_PORT).into(),
    );
    p2p.insert("persistent_peers".to_string(), persistent_peers.join(",").into());

    section_mut(config, "rpc")?.insert(
        "laddr".to_string(),
        format!("tcp://0.0.0.0:{}", RPC_PORT).into(),
    );
    section_mut(config, "statesync")?.insert("enable".to_string(), false.into());
    Ok(())
}

/// Settings of one validator's `app.toml`: REST API on, a minimum gas price, and the message
/// types that bypass it.
pub fn update_app_config(config: &mut Value, min_gas_prices: &str) -> Result<(), Error> {
    let root = root_mut(config)?;
    root.insert("minimum-gas-prices".to_string(), min_gas_prices.into());
    root.insert(
        "bypass-min-fee-msg-types".to_string(),
        Value::Array(BYPASS_MIN_FEE_MSG_TYPES.iter().map(|t| (*t).into()).collect()),
    );
    section_mut(config, "api")?.insert("enable".to_string(), true.into());
    Ok(())
}
