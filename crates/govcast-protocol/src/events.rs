//! Typed payloads for each broadcast channel.
//!
//! The indexer emits one of these per on-chain event. Amounts are decimal
//! strings (octas can exceed the safe integer range of JS clients), addresses
//! are `0x`-prefixed hex, and `timestamp` is the ISO-8601 time of the
//! on-chain event, not of the broadcast.

use govcast_core::Channel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryDeposit {
    pub source: String,
    pub amount: String,
    pub total_balance: String,
    pub transaction_hash: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryBalance {
    pub balance: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReimbursementNew {
    pub id: u64,
    pub payer: String,
    pub payee: String,
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub transaction_hash: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReimbursementApproved {
    pub id: u64,
    pub approver: String,
    pub transaction_hash: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReimbursementPaid {
    pub id: u64,
    pub payee: String,
    pub amount: String,
    pub transaction_hash: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionVote {
    pub election_id: u64,
    pub role_name: String,
    pub voter: String,
    pub candidate: String,
    pub transaction_hash: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionFinalized {
    pub election_id: u64,
    pub role_name: String,
    /// `None` when the election closed without a winner (tie or no votes).
    #[serde(default)]
    pub winner: Option<String>,
    pub transaction_hash: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalNew {
    pub proposal_id: u64,
    pub creator: String,
    pub title: String,
    pub transaction_hash: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalVote {
    pub proposal_id: u64,
    pub voter: String,
    /// `true` for a yes vote.
    pub vote: bool,
    pub transaction_hash: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalFinalized {
    pub proposal_id: u64,
    pub status: String,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub transaction_hash: String,
    pub timestamp: String,
}

/// One upstream event, already bound to its channel.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    TreasuryDeposit(TreasuryDeposit),
    TreasuryBalance(TreasuryBalance),
    ReimbursementNew(ReimbursementNew),
    ReimbursementApproved(ReimbursementApproved),
    ReimbursementPaid(ReimbursementPaid),
    ElectionVote(ElectionVote),
    ElectionFinalized(ElectionFinalized),
    ProposalNew(ProposalNew),
    ProposalVote(ProposalVote),
    ProposalFinalized(ProposalFinalized),
}

impl DomainEvent {
    pub fn channel(&self) -> Channel {
        match self {
            DomainEvent::TreasuryDeposit(_) => Channel::TreasuryDeposit,
            DomainEvent::TreasuryBalance(_) => Channel::TreasuryBalance,
            DomainEvent::ReimbursementNew(_) => Channel::ReimbursementNew,
            DomainEvent::ReimbursementApproved(_) => Channel::ReimbursementApproved,
            DomainEvent::ReimbursementPaid(_) => Channel::ReimbursementPaid,
            DomainEvent::ElectionVote(_) => Channel::ElectionVote,
            DomainEvent::ElectionFinalized(_) => Channel::ElectionFinalized,
            DomainEvent::ProposalNew(_) => Channel::ProposalNew,
            DomainEvent::ProposalVote(_) => Channel::ProposalVote,
            DomainEvent::ProposalFinalized(_) => Channel::ProposalFinalized,
        }
    }

    /// Validate a raw JSON payload against the shape of `channel`.
    pub fn from_parts(channel: Channel, payload: Value) -> Result<Self, serde_json::Error> {
        use serde_json::from_value as de;
        Ok(match channel {
            Channel::TreasuryDeposit => DomainEvent::TreasuryDeposit(de(payload)?),
            Channel::TreasuryBalance => DomainEvent::TreasuryBalance(de(payload)?),
            Channel::ReimbursementNew => DomainEvent::ReimbursementNew(de(payload)?),
            Channel::ReimbursementApproved => DomainEvent::ReimbursementApproved(de(payload)?),
            Channel::ReimbursementPaid => DomainEvent::ReimbursementPaid(de(payload)?),
            Channel::ElectionVote => DomainEvent::ElectionVote(de(payload)?),
            Channel::ElectionFinalized => DomainEvent::ElectionFinalized(de(payload)?),
            Channel::ProposalNew => DomainEvent::ProposalNew(de(payload)?),
            Channel::ProposalVote => DomainEvent::ProposalVote(de(payload)?),
            Channel::ProposalFinalized => DomainEvent::ProposalFinalized(de(payload)?),
        })
    }

    /// The payload as a JSON object, ready for the emit envelope.
    pub fn into_payload(self) -> Map<String, Value> {
        let value = match self {
            DomainEvent::TreasuryDeposit(p) => serde_json::to_value(p),
            DomainEvent::TreasuryBalance(p) => serde_json::to_value(p),
            DomainEvent::ReimbursementNew(p) => serde_json::to_value(p),
            DomainEvent::ReimbursementApproved(p) => serde_json::to_value(p),
            DomainEvent::ReimbursementPaid(p) => serde_json::to_value(p),
            DomainEvent::ElectionVote(p) => serde_json::to_value(p),
            DomainEvent::ElectionFinalized(p) => serde_json::to_value(p),
            DomainEvent::ProposalNew(p) => serde_json::to_value(p),
            DomainEvent::ProposalVote(p) => serde_json::to_value(p),
            DomainEvent::ProposalFinalized(p) => serde_json::to_value(p),
        };
        // plain structs of strings and integers always serialize to objects
        match value {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
