use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic grouping of channels. Mirrors the four governance modules of the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelCategory {
    Treasury,
    Reimbursement,
    Election,
    Proposal,
}

impl fmt::Display for ChannelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelCategory::Treasury => "treasury",
            ChannelCategory::Reimbursement => "reimbursement",
            ChannelCategory::Election => "election",
            ChannelCategory::Proposal => "proposal",
        };
        f.write_str(s)
    }
}

/// The closed set of broadcast channels.
///
/// Declaration order is the canonical listing order: `Ord` follows it, so a
/// `BTreeSet<Channel>` iterates in the same order as [`Channel::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "treasury:deposit")]
    TreasuryDeposit,
    #[serde(rename = "treasury:balance")]
    TreasuryBalance,
    #[serde(rename = "reimbursements:new")]
    ReimbursementNew,
    #[serde(rename = "reimbursements:approved")]
    ReimbursementApproved,
    #[serde(rename = "reimbursements:paid")]
    ReimbursementPaid,
    #[serde(rename = "elections:vote")]
    ElectionVote,
    #[serde(rename = "elections:finalized")]
    ElectionFinalized,
    #[serde(rename = "proposals:new")]
    ProposalNew,
    #[serde(rename = "proposals:vote")]
    ProposalVote,
    #[serde(rename = "proposals:finalized")]
    ProposalFinalized,
}

impl Channel {
    pub const ALL: [Channel; 10] = [
        Channel::TreasuryDeposit,
        Channel::TreasuryBalance,
        Channel::ReimbursementNew,
        Channel::ReimbursementApproved,
        Channel::ReimbursementPaid,
        Channel::ElectionVote,
        Channel::ElectionFinalized,
        Channel::ProposalNew,
        Channel::ProposalVote,
        Channel::ProposalFinalized,
    ];

    /// Wire name, also used as the outgoing event tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::TreasuryDeposit => "treasury:deposit",
            Channel::TreasuryBalance => "treasury:balance",
            Channel::ReimbursementNew => "reimbursements:new",
            Channel::ReimbursementApproved => "reimbursements:approved",
            Channel::ReimbursementPaid => "reimbursements:paid",
            Channel::ElectionVote => "elections:vote",
            Channel::ElectionFinalized => "elections:finalized",
            Channel::ProposalNew => "proposals:new",
            Channel::ProposalVote => "proposals:vote",
            Channel::ProposalFinalized => "proposals:finalized",
        }
    }

    pub fn category(self) -> ChannelCategory {
        match self {
            Channel::TreasuryDeposit | Channel::TreasuryBalance => ChannelCategory::Treasury,
            Channel::ReimbursementNew
            | Channel::ReimbursementApproved
            | Channel::ReimbursementPaid => ChannelCategory::Reimbursement,
            Channel::ElectionVote | Channel::ElectionFinalized => ChannelCategory::Election,
            Channel::ProposalNew | Channel::ProposalVote | Channel::ProposalFinalized => {
                ChannelCategory::Proposal
            }
        }
    }

    /// Exact, case-sensitive lookup by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = crate::error::GovcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::from_name(s).ok_or_else(|| crate::error::GovcastError::InvalidChannel {
            invalid: vec![s.to_string()],
        })
    }
}
