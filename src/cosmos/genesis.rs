/*!
   Edits to the genesis document produced by `gaiad init`.

   Only the fields the e2e networks rely on are touched, so the document is
   handled as a dynamic JSON value instead of the SDK's typed genesis state.
*/

use super::keys::decode_address;
use super::types::{Coin, DecCoin};
use crate::core::error::Error;
use crate::primitives::funcs::write_file;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::{collections::HashSet, fs, path::Path};

pub const BASE_ACCOUNT_TYPE: &str = "/cosmos.auth.v1beta1.BaseAccount";
pub const CONTINUOUS_VESTING_ACCOUNT_TYPE: &str = "/cosmos.vesting.v1beta1.ContinuousVestingAccount";
pub const DELAYED_VESTING_ACCOUNT_TYPE: &str = "/cosmos.vesting.v1beta1.DelayedVestingAccount";

/// Minimum deposit required before a proposal enters its voting period.
pub const GOV_MIN_DEPOSIT: u128 = 10000;
pub const GOV_VOTING_PERIOD: &str = "15s";

/// File, relative to a validator home, holding the periodic vesting schedule.
pub const VESTING_PERIOD_FILE: &str = "test_period.json";

pub fn read_genesis(path: impl AsRef<Path>) -> Result<Value, Error> {
    let content = fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&content)?)
}

pub fn write_genesis(path: impl AsRef<Path>, genesis: &Value) -> Result<(), Error> {
    let content = serde_json::to_vec_pretty(genesis)?;
    write_file(path, &content)
}

fn app_state_mut(genesis: &mut Value) -> Result<&mut Map<String, Value>, Error> {
    genesis
        .get_mut("app_state")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| Error::from("expect app_state object in genesis"))
}

fn module_mut<'a>(genesis: &'a mut Value, module: &str) -> Result<&'a mut Map<String, Value>, Error> {
    app_state_mut(genesis)?
        .get_mut(module)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| Error::from(format!("expect {} module state in genesis", module)))
}

fn array_mut<'a>(
    object: &'a mut Map<String, Value>,
    field: &str,
) -> Result<&'a mut Vec<Value>, Error> {
    object
        .entry(field)
        .or_insert_with(|| Value::Array(vec![]))
        .as_array_mut()
        .ok_or_else(|| Error::from(format!("expect {} to be an array", field)))
}

/// A base account that has never signed anything.
pub fn base_account(address: &str) -> Value {
    json!({
        "@type": BASE_ACCOUNT_TYPE,
        "address": address,
        "pub_key": null,
        "account_number": "0",
        "sequence": "0",
    })
}

fn base_vesting_account(address: &str, original_vesting: &[Coin], end_time: i64) -> Value {
    let mut account = base_account(address);
    if let Some(object) = account.as_object_mut() {
        object.remove("@type");
    }
    json!({
        "base_account": account,
        "original_vesting": original_vesting,
        "delegated_free": [],
        "delegated_vesting": [],
        "end_time": end_time.to_string(),
    })
}

/// An account whose `original_vesting` unlocks linearly between `start_time` and `end_time`.
pub fn continuous_vesting_account(
    address: &str,
    original_vesting: &[Coin],
    start_time: i64,
    end_time: i64,
) -> Result<Value, Error> {
    if start_time >= end_time {
        return Err(Error::from(format!(
            "vesting start-time {} cannot be after end-time {}",
            start_time, end_time
        )));
    }
    Ok(json!({
        "@type": CONTINUOUS_VESTING_ACCOUNT_TYPE,
        "base_vesting_account": base_vesting_account(address, original_vesting, end_time),
        "start_time": start_time.to_string(),
    }))
}

/// An account whose `original_vesting` unlocks all at once at `end_time`.
pub fn delayed_vesting_account(address: &str, original_vesting: &[Coin], end_time: i64) -> Value {
    json!({
        "@type": DELAYED_VESTING_ACCOUNT_TYPE,
        "base_vesting_account": base_vesting_account(address, original_vesting, end_time),
    })
}

fn base_account_fields(account: &Value) -> Option<&Map<String, Value>> {
    match account.get("base_vesting_account") {
        Some(vesting) => vesting.get("base_account")?.as_object(),
        None => account.as_object(),
    }
}

fn base_account_fields_mut(account: &mut Value) -> Option<&mut Map<String, Value>> {
    if account.get("base_vesting_account").is_some() {
        account
            .get_mut("base_vesting_account")?
            .get_mut("base_account")?
            .as_object_mut()
    } else {
        account.as_object_mut()
    }
}

fn account_address(account: &Value) -> Option<&str> {
    base_account_fields(account)?.get("address")?.as_str()
}

fn account_number(account: &Value) -> u64 {
    base_account_fields(account)
        .and_then(|fields| fields.get("account_number"))
        .and_then(|number| match number {
            Value::String(s) => s.parse().ok(),
            other => other.as_u64(),
        })
        .unwrap_or(0)
}

/// Orders accounts by account number and renumbers duplicates after the current maximum, so the
/// node accepts accounts added with the default number `0`.
pub fn sanitize_accounts(accounts: &mut Vec<Value>) {
    accounts.sort_by_key(account_number);
    let mut max = accounts.iter().map(account_number).max().unwrap_or(0);
    let mut seen = HashSet::new();
    for account in accounts.iter_mut() {
        let number = account_number(account);
        if seen.insert(number) {
            continue;
        }
        max += 1;
        seen.insert(max);
        if let Some(fields) = base_account_fields_mut(account) {
            fields.insert("account_number".to_string(), Value::String(max.to_string()));
        }
    }
    accounts.sort_by_key(account_number);
}

/// Orders balances by raw address bytes and each balance's coins by denom.
pub fn sanitize_balances(balances: &mut Vec<Value>) -> Result<(), Error> {
    let mut keyed = balances
        .drain(..)
        .map(|mut balance| {
            let address = balance
                .get("address")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::from("expect balance address"))
                .and_then(decode_address)?;
            if let Some(coins) = balance.get_mut("coins").and_then(Value::as_array_mut) {
                coins.sort_by(|a, b| {
                    let denom = |c: &Value| c.get("denom").and_then(Value::as_str).unwrap_or("").to_string();
                    denom(a).cmp(&denom(b))
                });
            }
            Ok((address, balance))
        })
        .collect::<Result<Vec<_>, Error>>()?;
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    balances.extend(keyed.into_iter().map(|(_, balance)| balance));
    Ok(())
}

/// Appends accounts to the auth state, failing if any of them already exists.
pub fn add_accounts(genesis: &mut Value, new_accounts: Vec<Value>) -> Result<(), Error> {
    let auth = module_mut(genesis, "auth")?;
    let accounts = array_mut(auth, "accounts")?;
    let mut known = accounts
        .iter()
        .filter_map(account_address)
        .map(str::to_string)
        .collect::<HashSet<_>>();
    for account in &new_accounts {
        let address = account_address(account)
            .ok_or_else(|| Error::from("genesis account without address"))?;
        if !known.insert(address.to_string()) {
            return Err(Error::from(format!(
                "failed to add account to genesis state; account already exists: {}",
                address
            )));
        }
    }
    accounts.extend(new_accounts);
    sanitize_accounts(accounts);
    Ok(())
}

pub fn add_balances(genesis: &mut Value, new_balances: &[(String, Vec<Coin>)]) -> Result<(), Error> {
    let bank = module_mut(genesis, "bank")?;
    let balances = array_mut(bank, "balances")?;
    for (address, coins) in new_balances {
        balances.push(json!({ "address": address, "coins": coins }));
    }
    sanitize_balances(balances)
}

pub fn set_bond_denom(genesis: &mut Value, denom: &str) -> Result<(), Error> {
    module_mut(genesis, "staking")?
        .get_mut("params")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| Error::from("expect staking params in genesis"))?
        .insert("bond_denom".to_string(), Value::String(denom.to_string()));
    Ok(())
}

/// Sets the global fee module's minimum gas prices. Networks without the module are left as is.
pub fn set_global_fee(genesis: &mut Value, min_gas_prices: &[DecCoin]) -> Result<(), Error> {
    let app_state = app_state_mut(genesis)?;
    let globalfee = match app_state.get_mut("globalfee").and_then(Value::as_object_mut) {
        Some(globalfee) => globalfee,
        None => {
            log::warn!(target: "gaia-e2e", "genesis has no globalfee module, skipping minimum gas prices");
            return Ok(());
        }
    };
    let params = globalfee
        .entry("params")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| Error::from("expect globalfee params object"))?;
    params.insert(
        "minimum_gas_prices".to_string(),
        serde_json::to_value(min_gas_prices)?,
    );
    Ok(())
}

/// Sets the gov minimum deposit and voting period. Newer SDKs keep both under `params`, older
/// ones split them into `deposit_params` and `voting_params`.
pub fn set_gov_params(genesis: &mut Value, min_deposit: &[Coin], voting_period: &str) -> Result<(), Error> {
    let gov = module_mut(genesis, "gov")?;
    let min_deposit = serde_json::to_value(min_deposit)?;
    let voting_period = Value::String(voting_period.to_string());

    if let Some(params) = gov.get_mut("params").and_then(Value::as_object_mut) {
        params.insert("min_deposit".to_string(), min_deposit);
        params.insert("voting_period".to_string(), voting_period);
        return Ok(());
    }

    gov.get_mut("deposit_params")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| Error::from("failed to update min_deposit in genesis file"))?
        .insert("min_deposit".to_string(), min_deposit);
    gov.get_mut("voting_params")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| Error::from("failed to update voting_period in genesis file"))?
        .insert("voting_period".to_string(), voting_period);
    Ok(())
}

/// Funds every address with `balance` as a plain base account and applies the network-wide
/// parameters the suite expects: bond denom, global fee and gov params.
pub fn modify_genesis(
    genesis: &mut Value,
    balance: &str,
    addresses: &[String],
    global_fees: &str,
    denom: &str,
) -> Result<(), Error> {
    let coins = Coin::parse_list(balance)?;

    let accounts = addresses.iter().map(|address| base_account(address)).collect();
    add_accounts(genesis, accounts)?;

    let balances = addresses
        .iter()
        .map(|address| (address.clone(), coins.clone()))
        .collect::<Vec<_>>();
    add_balances(genesis, &balances)?;

    set_bond_denom(genesis, denom)?;
    set_global_fee(genesis, &DecCoin::parse_list(global_fees)?)?;
    set_gov_params(genesis, &[Coin::new(denom, GOV_MIN_DEPOSIT)], GOV_VOTING_PERIOD)?;
    Ok(())
}

/// Registers `denom` in the bank module's metadata.
pub fn add_denom_metadata(genesis: &mut Value, denom: &str) -> Result<(), Error> {
    let bank = module_mut(genesis, "bank")?;
    array_mut(bank, "denom_metadata")?.push(json!({
        "description": "An example stable token",
        "denom_units": [{ "denom": denom, "exponent": 0, "aliases": [] }],
        "base": denom,
        "display": denom,
        "name": denom,
        "symbol": denom,
    }));
    Ok(())
}

/// Replaces the genesis transactions with the given signed `MsgCreateValidator` transactions.
pub fn set_gen_txs(genesis: &mut Value, gen_txs: Vec<Value>) -> Result<(), Error> {
    let genutil = app_state_mut(genesis)?
        .entry("genutil")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| Error::from("expect genutil object in genesis"))?;
    genutil.insert("gen_txs".to_string(), Value::Array(gen_txs));
    Ok(())
}

/// Unix times at which the genesis vesting accounts unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VestingSchedule {
    pub continuous_start: i64,
    pub continuous_end: i64,
    pub delayed_end: i64,
}

impl VestingSchedule {
    /// Continuous vesting starts 90 to 150 seconds after `now` and ends 150 to 250 seconds after
    /// it; the delayed account unlocks 90 to 150 seconds after `now`. The windows leave the
    /// networks time to start before anything unlocks.
    pub fn random(now: i64) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            continuous_start: now + rng.gen_range(90..150),
            continuous_end: now + rng.gen_range(150..250),
            delayed_end: now + rng.gen_range(90..150),
        }
    }
}

/// Adds the continuous and delayed vesting accounts, both vesting `original_vesting` and funded
/// with `balance`.
pub fn add_vesting_accounts(
    genesis: &mut Value,
    continuous: &str,
    delayed: &str,
    original_vesting: &[Coin],
    balance: &[Coin],
    schedule: VestingSchedule,
) -> Result<(), Error> {
    let accounts = vec![
        continuous_vesting_account(
            continuous,
            original_vesting,
            schedule.continuous_start,
            schedule.continuous_end,
        )?,
        delayed_vesting_account(delayed, original_vesting, schedule.delayed_end),
    ];
    add_accounts(genesis, accounts)?;
    add_balances(
        genesis,
        &[
            (continuous.to_string(), balance.to_vec()),
            (delayed.to_string(), balance.to_vec()),
        ],
    )
}

/// Input of `tx vesting create-periodic-vesting-account`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VestingData {
    pub start_time: i64,
    pub periods: Vec<InputPeriod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputPeriod {
    pub coins: String,
    pub length_seconds: i64,
}

/// Two 30 second periods of `amount`, starting `start_offset` seconds after `now`.
pub fn generate_vesting_period(now: i64, start_offset: i64, amount: &Coin) -> VestingData {
    let period = InputPeriod {
        coins: amount.to_string(),
        length_seconds: 30,
    };
    VestingData {
        start_time: now + start_offset,
        periods: vec![period.clone(), period],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmos::keys::{encode_address, ACCOUNT_PREFIX};
    use crate::cosmos::types::UATOM_DENOM;

    fn address(byte: u8) -> String {
        encode_address(ACCOUNT_PREFIX, &[byte; 20]).unwrap()
    }

    fn fresh_genesis() -> Value {
        json!({
            "chain_id": "chain-test",
            "app_state": {
                "auth": { "params": {}, "accounts": [] },
                "bank": { "params": {}, "balances": [], "supply": [], "denom_metadata": [] },
                "staking": { "params": { "bond_denom": "stake" } },
                "globalfee": { "params": { "minimum_gas_prices": [] } },
                "gov": {
                    "deposit_params": { "min_deposit": [{ "denom": "stake", "amount": "10000000" }], "max_deposit_period": "172800s" },
                    "voting_params": { "voting_period": "172800s" }
                },
                "genutil": { "gen_txs": [] }
            }
        })
    }

    #[test]
    fn modify_genesis_funds_accounts_and_sets_params() {
        let mut genesis = fresh_genesis();
        let addresses = vec![address(3), address(1), address(2)];
        modify_genesis(
            &mut genesis,
            "110000000000stake,100000000000000000photon,100000000000000000uatom",
            &addresses,
            "0.00001uatom",
            UATOM_DENOM,
        )
        .unwrap();

        let app_state = &genesis["app_state"];
        let accounts = app_state["auth"]["accounts"].as_array().unwrap();
        assert_eq!(accounts.len(), 3);
        let numbers = accounts
            .iter()
            .map(|a| a["account_number"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(numbers, vec!["0", "1", "2"]);

        let balances = app_state["bank"]["balances"].as_array().unwrap();
        let ordered = balances
            .iter()
            .map(|b| b["address"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(ordered, vec![address(1), address(2), address(3)]);
        assert_eq!(balances[0]["coins"][0]["denom"], "photon");
        assert_eq!(balances[0]["coins"][2]["amount"], "100000000000000000");

        assert_eq!(app_state["staking"]["params"]["bond_denom"], "uatom");
        assert_eq!(
            app_state["globalfee"]["params"]["minimum_gas_prices"],
            json!([{ "denom": "uatom", "amount": "0.000010000000000000" }])
        );
        assert_eq!(
            app_state["gov"]["deposit_params"]["min_deposit"],
            json!([{ "denom": "uatom", "amount": "10000" }])
        );
        assert_eq!(app_state["gov"]["voting_params"]["voting_period"], "15s");
    }

    #[test]
    fn duplicate_accounts_are_rejected() {
        let mut genesis = fresh_genesis();
        add_accounts(&mut genesis, vec![base_account(&address(1))]).unwrap();
        let err = add_accounts(&mut genesis, vec![base_account(&address(1))]).unwrap_err();
        assert!(err.to_string().contains("account already exists"));
    }

    #[test]
    fn gov_params_prefer_unified_params() {
        let mut genesis = fresh_genesis();
        genesis["app_state"]["gov"] = json!({ "params": { "min_deposit": [], "voting_period": "1s" } });
        set_gov_params(&mut genesis, &[Coin::new(UATOM_DENOM, 10)], "15s").unwrap();
        assert_eq!(genesis["app_state"]["gov"]["params"]["voting_period"], "15s");
        assert_eq!(genesis["app_state"]["gov"]["params"]["min_deposit"][0]["amount"], "10");
    }

    #[test]
    fn missing_globalfee_module_is_tolerated() {
        let mut genesis = fresh_genesis();
        genesis["app_state"].as_object_mut().unwrap().remove("globalfee");
        set_global_fee(&mut genesis, &DecCoin::parse_list("0.00001uatom").unwrap()).unwrap();
        assert!(genesis["app_state"].get("globalfee").is_none());
    }

    #[test]
    fn vesting_accounts_are_nested_and_renumbered() {
        let mut genesis = fresh_genesis();
        modify_genesis(&mut genesis, "1uatom", &[address(1)], "0.00001uatom", UATOM_DENOM).unwrap();

        let vested = [Coin::new(UATOM_DENOM, 99900000000)];
        let continuous = continuous_vesting_account(&address(8), &vested, 100, 200).unwrap();
        let delayed = delayed_vesting_account(&address(9), &vested, 150);
        add_accounts(&mut genesis, vec![continuous, delayed]).unwrap();

        let accounts = genesis["app_state"]["auth"]["accounts"].as_array().unwrap();
        assert_eq!(accounts.len(), 3);
        let continuous = accounts
            .iter()
            .find(|a| a["@type"] == CONTINUOUS_VESTING_ACCOUNT_TYPE)
            .unwrap();
        assert_eq!(continuous["start_time"], "100");
        assert_eq!(continuous["base_vesting_account"]["end_time"], "200");
        assert_eq!(
            continuous["base_vesting_account"]["base_account"]["address"],
            address(8)
        );
        assert!(continuous["base_vesting_account"]["base_account"].get("@type").is_none());
        assert_eq!(
            continuous["base_vesting_account"]["original_vesting"][0]["amount"],
            "99900000000"
        );

        let mut numbers = accounts.iter().map(account_number).collect::<Vec<_>>();
        numbers.sort();
        assert_eq!(numbers, vec![0, 1, 2]);
    }

    #[test]
    fn vesting_accounts_are_funded() {
        let mut genesis = fresh_genesis();
        let vested = [Coin::new(UATOM_DENOM, 99900000000)];
        let balance = [Coin::new(UATOM_DENOM, 99900350000)];
        let schedule = VestingSchedule::random(1_000);
        add_vesting_accounts(&mut genesis, &address(8), &address(9), &vested, &balance, schedule)
            .unwrap();

        let balances = genesis["app_state"]["bank"]["balances"].as_array().unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[1]["coins"][0]["amount"], "99900350000");
        let delayed = genesis["app_state"]["auth"]["accounts"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["@type"] == DELAYED_VESTING_ACCOUNT_TYPE)
            .unwrap();
        assert_eq!(
            delayed["base_vesting_account"]["end_time"],
            schedule.delayed_end.to_string()
        );
    }

    #[test]
    fn random_vesting_schedule_stays_in_window() {
        for _ in 0..50 {
            let schedule = VestingSchedule::random(0);
            assert!((90..150).contains(&schedule.continuous_start));
            assert!((150..250).contains(&schedule.continuous_end));
            assert!((90..150).contains(&schedule.delayed_end));
            assert!(schedule.continuous_start < schedule.continuous_end);
        }
    }

    #[test]
    fn continuous_vesting_requires_start_before_end() {
        assert!(continuous_vesting_account(&address(1), &[], 200, 200).is_err());
    }

    #[test]
    fn gen_txs_and_metadata() {
        let mut genesis = fresh_genesis();
        set_gen_txs(&mut genesis, vec![json!({"body": {}}), json!({"body": {}})]).unwrap();
        add_denom_metadata(&mut genesis, UATOM_DENOM).unwrap();
        assert_eq!(genesis["app_state"]["genutil"]["gen_txs"].as_array().unwrap().len(), 2);
        let metadata = &genesis["app_state"]["bank"]["denom_metadata"][0];
        assert_eq!(metadata["base"], "uatom");
        assert_eq!(metadata["denom_units"][0]["exponent"], 0);
    }

    #[test]
    fn vesting_period_has_two_thirty_second_periods() {
        let data = generate_vesting_period(1_000, 100, &Coin::new(UATOM_DENOM, 350000));
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({
                "start_time": 1100,
                "periods": [
                    { "coins": "350000uatom", "length_seconds": 30 },
                    { "coins": "350000uatom", "length_seconds": 30 }
                ]
            })
        );
    }

    #[test]
    fn genesis_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config/genesis.json");
        write_genesis(&path, &fresh_genesis()).unwrap();
        assert_eq!(read_genesis(&path).unwrap(), fresh_genesis());
    }
}
