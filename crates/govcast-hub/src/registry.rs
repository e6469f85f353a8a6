use govcast_core::{Channel, GovcastError};
use std::collections::BTreeSet;

/// Read-only view over the fixed channel set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelRegistry;

/// Outcome of validating a client-supplied list of channel names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchValidation {
    pub accepted: BTreeSet<Channel>,
    /// Unknown names in the order the client sent them, deduplicated.
    pub rejected: Vec<String>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn is_valid_channel(&self, name: &str) -> bool {
        Channel::from_name(name).is_some()
    }

    /// Channel names in canonical order.
    pub fn list_channels(&self) -> Vec<&'static str> {
        Channel::ALL.iter().map(|c| c.as_str()).collect()
    }

    pub fn validate_batch<S: AsRef<str>>(&self, names: &[S]) -> BatchValidation {
        let mut out = BatchValidation::default();
        for name in names {
            let name = name.as_ref();
            match Channel::from_name(name) {
                Some(ch) => {
                    out.accepted.insert(ch);
                }
                None => {
                    if !out.rejected.iter().any(|r| r == name) {
                        out.rejected.push(name.to_string());
                    }
                }
            }
        }
        out
    }

    /// All-or-nothing: one unknown name fails the whole batch.
    pub fn require_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Channel>, GovcastError> {
        let batch = self.validate_batch(names);
        if !batch.rejected.is_empty() {
            return Err(GovcastError::InvalidChannel {
                invalid: batch.rejected,
            });
        }
        Ok(batch.accepted.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_all_ten_channels_in_order() {
        let names = ChannelRegistry::new().list_channels();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "treasury:deposit");
        assert_eq!(names[9], "proposals:finalized");
    }

    #[test]
    fn validity() {
        let reg = ChannelRegistry::new();
        assert!(reg.is_valid_channel("elections:finalized"));
        assert!(!reg.is_valid_channel("elections"));
        assert!(!reg.is_valid_channel(""));
    }

    #[test]
    fn batch_partitions_names() {
        let reg = ChannelRegistry::new();
        let out = reg.validate_batch(&["proposals:vote", "nope", "treasury:deposit", "nope"]);
        assert_eq!(
            out.accepted.into_iter().collect::<Vec<_>>(),
            vec![Channel::TreasuryDeposit, Channel::ProposalVote]
        );
        assert_eq!(out.rejected, vec!["nope".to_string()]);
    }

    #[test]
    fn require_all_rejects_whole_batch() {
        let reg = ChannelRegistry::new();
        let err = reg
            .require_all(&["treasury:deposit", "treasury:withdraw"])
            .unwrap_err();
        match err {
            GovcastError::InvalidChannel { invalid } => {
                assert_eq!(invalid, vec!["treasury:withdraw".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn require_all_dedupes() {
        let reg = ChannelRegistry::new();
        let chs = reg.require_all(&["proposals:new", "proposals:new"]).unwrap();
        assert_eq!(chs, vec![Channel::ProposalNew]);
    }
}
