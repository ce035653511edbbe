//! JSON payloads handed to `gaiad tx gov` and `gaiad tx group`. Each builder writes its file into
//! the `config/` directory of the validators whose CLI will pick it up.

use super::chain::Chain;
use super::types::{Coin, DecCoin, UATOM_DENOM};
use crate::core::error::Error;
use crate::primitives::funcs::{to_json_indent, write_file};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;

pub const PROPOSAL_DEPOSIT: &str = "5000uatom";
pub const PROPOSAL_METADATA: &str = "Testing 1, 2, 3!";
/// uatom the legacy community pool spend pays to the gov module account.
pub const COMMUNITY_POOL_SPEND_AMOUNT: u128 = 1000;

pub const LEGACY_COMMUNITY_SPEND_FILE: &str = "proposal.json";
pub const MSG_SEND_PROPOSAL_FILE: &str = "proposal_2.json";
pub const SOFTWARE_UPGRADE_PROPOSAL_FILE: &str = "proposal_3.json";
pub const CANCEL_UPGRADE_PROPOSAL_FILE: &str = "proposal_4.json";
pub const GLOBAL_FEE_PROPOSAL_FILE: &str = "proposal_globalfee.json";

/// Proposal metadata, base64 encoded as the gov module stores it.
pub fn proposal_metadata() -> String {
    STANDARD.encode(PROPOSAL_METADATA)
}

#[derive(Debug, Clone, Serialize)]
pub struct MsgSend {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: Vec<Coin>,
}

impl MsgSend {
    pub fn new(from: &str, to: &str, amount: Vec<Coin>) -> Self {
        Self {
            type_url: "/cosmos.bank.v1beta1.MsgSend".to_string(),
            from_address: from.to_string(),
            to_address: to.to_string(),
            amount,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpgradePlan {
    pub name: String,
    pub height: u64,
    pub info: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SoftwareUpgrade {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub authority: String,
    pub plan: UpgradePlan,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelSoftwareUpgrade {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub authority: String,
}

/// A gov v1 proposal: messages executed by the gov module account once it passes.
#[derive(Debug, Clone, Serialize)]
pub struct Proposal<M> {
    pub messages: Vec<M>,
    pub metadata: String,
    pub deposit: String,
}

impl<M> Proposal<M> {
    pub fn new(messages: Vec<M>) -> Self {
        Self {
            messages,
            metadata: proposal_metadata(),
            deposit: PROPOSAL_DEPOSIT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommunityPoolSpend {
    pub title: String,
    pub description: String,
    pub recipient: String,
    pub amount: String,
    pub deposit: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamChange<V> {
    pub subspace: String,
    pub key: String,
    pub value: V,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamChangeProposal<V> {
    pub title: String,
    pub description: String,
    pub changes: Vec<ParamChange<V>>,
    pub deposit: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    pub address: String,
    pub weight: String,
    pub metadata: String,
}

#[derive(Debug, Clone, Serialize)]
struct GroupMembers<'a> {
    members: &'a [GroupMember],
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionPolicyWindow {
    pub voting_period: String,
    pub min_execution_period: String,
}

/// Group decision policy passing once the yes weight reaches `threshold`.
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdPolicy {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub threshold: String,
    pub windows: DecisionPolicyWindow,
}

impl ThresholdPolicy {
    pub fn new(threshold: &str, windows: DecisionPolicyWindow) -> Self {
        Self {
            type_url: "/cosmos.group.v1.ThresholdDecisionPolicy".to_string(),
            threshold: threshold.to_string(),
            windows,
        }
    }
}

/// Group decision policy passing once the yes weight reaches `percentage` of the total.
#[derive(Debug, Clone, Serialize)]
pub struct PercentagePolicy {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub percentage: String,
    pub windows: DecisionPolicyWindow,
}

impl PercentagePolicy {
    pub fn new(percentage: &str, windows: DecisionPolicyWindow) -> Self {
        Self {
            type_url: "/cosmos.group.v1.PercentageDecisionPolicy".to_string(),
            percentage: percentage.to_string(),
            windows,
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    to_json_indent(value, b" ")
}

/// Writes `body` as `config/<file>` of every validator of `chain`.
pub fn write_file_to_validators(chain: &Chain, file: &str, body: &[u8]) -> Result<(), Error> {
    for validator in &chain.validators {
        write_file(validator.config_file(file), body)?;
    }
    Ok(())
}

fn write_to_first_validator(chain: &Chain, file: &str, body: &[u8]) -> Result<(), Error> {
    let validator = chain
        .validators
        .first()
        .ok_or_else(|| Error::from(format!("{} has no validators", chain.id)))?;
    write_file(validator.config_file(file), body)
}

/// The legacy community pool spend and the gov v1 send proposals, on every validator. Both pay
/// out of the gov module account `gov_address`.
pub fn write_gov_proposals(chain: &Chain, gov_address: &str, recipient: &str, amount: &Coin) -> Result<(), Error> {
    let legacy = CommunityPoolSpend {
        title: "Community Pool Spend".to_string(),
        description: "Fund Gov !".to_string(),
        recipient: gov_address.to_string(),
        amount: Coin::new(UATOM_DENOM, COMMUNITY_POOL_SPEND_AMOUNT).to_string(),
        deposit: PROPOSAL_DEPOSIT.to_string(),
    };
    let send = Proposal::new(vec![MsgSend::new(gov_address, recipient, vec![amount.clone()])]);

    let (legacy, send) = (encode(&legacy)?, encode(&send)?);
    write_file_to_validators(chain, LEGACY_COMMUNITY_SPEND_FILE, &legacy)?;
    write_file_to_validators(chain, MSG_SEND_PROPOSAL_FILE, &send)
}

/// An upgrade scheduled at `height` and its cancellation, on validator 0.
pub fn write_gov_upgrade_software_proposal(chain: &Chain, gov_address: &str, height: u64) -> Result<(), Error> {
    let upgrade = Proposal::new(vec![SoftwareUpgrade {
        type_url: "/cosmos.upgrade.v1beta1.MsgSoftwareUpgrade".to_string(),
        authority: gov_address.to_string(),
        plan: UpgradePlan {
            name: "upgrade-1".to_string(),
            height,
            info: "binary-1".to_string(),
        },
    }]);
    let cancel = Proposal::new(vec![CancelSoftwareUpgrade {
        type_url: "/cosmos.upgrade.v1beta1.MsgCancelUpgrade".to_string(),
        authority: gov_address.to_string(),
    }]);

    write_to_first_validator(chain, SOFTWARE_UPGRADE_PROPOSAL_FILE, &encode(&upgrade)?)?;
    write_to_first_validator(chain, CANCEL_UPGRADE_PROPOSAL_FILE, &encode(&cancel)?)
}

pub fn write_group_members(chain: &Chain, members: &[GroupMember], file: &str) -> Result<(), Error> {
    write_file_to_validators(chain, file, &encode(&GroupMembers { members })?)
}

/// A group decision policy, eg. [`ThresholdPolicy`], on every validator.
pub fn write_group_policy<P: Serialize>(chain: &Chain, policy: &P, file: &str) -> Result<(), Error> {
    write_file_to_validators(chain, file, &encode(policy)?)
}

/// Legacy param change of the global fee module's minimum gas prices, on validator 0. The deposit
/// is left empty and sent separately.
pub fn write_gov_param_change_proposal_global_fees(chain: &Chain, coins: &[DecCoin]) -> Result<(), Error> {
    let proposal = ParamChangeProposal {
        title: "global fee test".to_string(),
        description: "global fee change".to_string(),
        changes: vec![ParamChange {
            subspace: "globalfee".to_string(),
            key: "MinimumGasPricesParam".to_string(),
            value: coins.to_vec(),
        }],
        deposit: String::new(),
    };
    write_to_first_validator(chain, GLOBAL_FEE_PROPOSAL_FILE, &encode(&proposal)?)
}
