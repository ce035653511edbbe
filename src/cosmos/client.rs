// Copyright 2022 ComposableFi
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::types::{Coin, DecCoin};
use crate::core::error::Error;
use ibc_relayer_types::core::ics24_host::identifier::ChainId;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tendermint_rpc::{Client, HttpClient};

/// Host port of the REST API of a network's first validator, before the network offset.
pub const REST_PORT: u16 = 1317;
/// Host port of the Tendermint RPC of a network's first validator, before the network offset.
pub const RPC_PORT: u16 = 26657;

const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Sync state reported by the node's `/status` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStatus {
    pub catching_up: bool,
    pub latest_height: u64,
}

impl NodeStatus {
    /// Whether the node is producing blocks and has reached `height`.
    pub fn is_ready(&self, height: u64) -> bool {
        !self.catching_up && self.latest_height >= height
    }
}

/// Lifecycle stages of a gov v1 proposal as rendered by the REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ProposalStatus {
    #[serde(rename = "PROPOSAL_STATUS_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "PROPOSAL_STATUS_DEPOSIT_PERIOD")]
    DepositPeriod,
    #[serde(rename = "PROPOSAL_STATUS_VOTING_PERIOD")]
    VotingPeriod,
    #[serde(rename = "PROPOSAL_STATUS_PASSED")]
    Passed,
    #[serde(rename = "PROPOSAL_STATUS_REJECTED")]
    Rejected,
    #[serde(rename = "PROPOSAL_STATUS_FAILED")]
    Failed,
}

#[derive(Debug, Deserialize)]
struct ProposalResponse {
    proposal: Proposal,
}

#[derive(Debug, Deserialize)]
struct Proposal {
    status: ProposalStatus,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Option<Coin>,
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    balances: Vec<Coin>,
}

/// Observes a running network from the host through the ports its first validator publishes.
#[derive(Clone)]
pub struct NodeClient {
    pub chain_id: ChainId,
    /// Chain rpc client
    pub rpc_client: HttpClient,
    pub rest_url: String,
    http: reqwest::Client,
}

impl NodeClient {
    pub fn new(chain_id: ChainId, rpc_url: &str, rest_url: &str) -> Result<Self, Error> {
        let rpc_client =
            HttpClient::new(rpc_url).map_err(|e| Error::RpcError(format!("{:?}", e)))?;
        Ok(Self {
            chain_id,
            rpc_client,
            rest_url: rest_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        })
    }

    /// Client for a network whose ports are published at `offset` above the defaults.
    pub fn localhost(chain_id: ChainId, offset: u16) -> Result<Self, Error> {
        Self::new(
            chain_id,
            &format!("http://localhost:{}", RPC_PORT + offset),
            &format!("http://localhost:{}", REST_PORT + offset),
        )
    }

    pub async fn status(&self) -> Result<NodeStatus, Error> {
        let status = tokio::time::timeout(STATUS_TIMEOUT, self.rpc_client.status())
            .await
            .map_err(|_| Error::RpcError(format!("status of {} timed out", self.chain_id)))?
            .map_err(|e| Error::RpcError(format!("{:?}", e)))?;
        Ok(NodeStatus {
            catching_up: status.sync_info.catching_up,
            latest_height: status.sync_info.latest_block_height.value(),
        })
    }

    async fn get(&self, path: &str) -> Result<Value, Error> {
        let url = format!("{}{}", self.rest_url, path);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::from(format!("GET {} returned {}: {}", url, status, body)));
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Balance of `address` in `denom`. A missing balance is reported as zero.
    pub async fn balance(&self, address: &str, denom: &str) -> Result<Coin, Error> {
        let body = self
            .get(&format!(
                "/cosmos/bank/v1beta1/balances/{}/by_denom?denom={}",
                address, denom
            ))
            .await?;
        let response: BalanceResponse = serde_json::from_value(body)?;
        Ok(response.balance.unwrap_or_else(|| Coin::new(denom, 0)))
    }

    pub async fn all_balances(&self, address: &str) -> Result<Vec<Coin>, Error> {
        let body = self
            .get(&format!("/cosmos/bank/v1beta1/balances/{}", address))
            .await?;
        Ok(serde_json::from_value::<BalancesResponse>(body)?.balances)
    }

    /// Balances `address` can transfer right now, ie. excluding still locked vesting coins.
    pub async fn spendable_balances(&self, address: &str) -> Result<Vec<Coin>, Error> {
        let body = self
            .get(&format!("/cosmos/bank/v1beta1/spendable_balances/{}", address))
            .await?;
        Ok(serde_json::from_value::<BalancesResponse>(body)?.balances)
    }

    pub async fn proposal_status(&self, proposal_id: u64) -> Result<ProposalStatus, Error> {
        let body = self
            .get(&format!("/cosmos/gov/v1/proposals/{}", proposal_id))
            .await?;
        Ok(serde_json::from_value::<ProposalResponse>(body)?.proposal.status)
    }

    /// The `account` object of the auth module, with its `@type`.
    pub async fn account(&self, address: &str) -> Result<Value, Error> {
        let mut body = self
            .get(&format!("/cosmos/auth/v1beta1/accounts/{}", address))
            .await?;
        body.get_mut("account")
            .map(Value::take)
            .ok_or_else(|| Error::from(format!("no account {} on {}", address, self.chain_id)))
    }

    /// Minimum gas prices enforced by the global fee module.
    pub async fn global_fees(&self) -> Result<Vec<DecCoin>, Error> {
        let body = self.get("/gaia/globalfee/v1beta1/minimum_gas_prices").await?;
        let prices = body
            .get("minimum_gas_prices")
            .cloned()
            .unwrap_or_else(|| Value::Array(vec![]));
        Ok(serde_json::from_value(prices)?)
    }

    /// The pending upgrade plan, if any.
    pub async fn current_upgrade_plan(&self) -> Result<Option<Value>, Error> {
        let body = self.get("/cosmos/upgrade/v1beta1/current_plan").await?;
        Ok(body.get("plan").filter(|plan| !plan.is_null()).cloned())
    }
}

/// Amount of `denom` in a balance list, zero if absent.
pub fn amount_of(coins: &[Coin], denom: &str) -> Result<u128, Error> {
    coins
        .iter()
        .find(|c| c.denom == denom)
        .map(Coin::amount_u128)
        .unwrap_or(Ok(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::testing::serve_json;

    #[test]
    fn proposal_status_parses_rest_response() {
        let body = serde_json::json!({
            "proposal": {
                "id": "1",
                "status": "PROPOSAL_STATUS_VOTING_PERIOD",
                "final_tally_result": {}
            }
        });
        let response: ProposalResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.proposal.status, ProposalStatus::VotingPeriod);
    }

    #[test]
    fn missing_balance_is_absent() {
        let response: BalanceResponse =
            serde_json::from_value(serde_json::json!({ "balance": null })).unwrap();
        assert!(response.balance.is_none());

        let coins = vec![Coin::new("photon", 7), Coin::new("uatom", 42)];
        assert_eq!(amount_of(&coins, "uatom").unwrap(), 42);
        assert_eq!(amount_of(&coins, "stake").unwrap(), 0);
    }

    #[test]
    fn readiness_needs_height_and_sync() {
        let status = NodeStatus { catching_up: false, latest_height: 3 };
        assert!(status.is_ready(3));
        assert!(!status.is_ready(4));
        assert!(!NodeStatus { catching_up: true, latest_height: 10 }.is_ready(3));
    }

    #[test]
    fn localhost_urls_follow_offset() {
        let client = NodeClient::localhost(ChainId::from("chain-b".to_string()), 10).unwrap();
        assert_eq!(client.rest_url, "http://localhost:1327");
    }

    #[tokio::test]
    async fn all_balances_reads_bank_rest_response() {
        let address = serve_json(
            r#"{"balances":[{"denom":"photon","amount":"5"},{"denom":"uatom","amount":"1000"}],"pagination":{"next_key":null,"total":"2"}}"#,
        )
        .await;
        let client = NodeClient::new(
            ChainId::from("chain-a".to_string()),
            "http://localhost:26657",
            &format!("http://{}/", address),
        )
        .unwrap();
        let balances = client.all_balances("cosmos1gov").await.unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(amount_of(&balances, "uatom").unwrap(), 1000);
    }
}
