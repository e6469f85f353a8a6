use govcast_core::Channel;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::connection::ConnectionId;

/// Two-way index of subscription edges.
///
/// Invariant: `c ∈ by_channel[ch]` iff `ch ∈ by_conn[c]`. Every method
/// updates both sides before returning, and empty sets are pruned so a
/// removed connection leaves no key behind.
#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    by_conn: HashMap<ConnectionId, BTreeSet<Channel>>,
    by_channel: HashMap<Channel, HashSet<ConnectionId>>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add edges. Idempotent. Returns the connection's full subscription list.
    pub fn subscribe(&mut self, conn: &ConnectionId, channels: &[Channel]) -> Vec<Channel> {
        if !channels.is_empty() {
            let set = self.by_conn.entry(conn.clone()).or_default();
            for &ch in channels {
                if set.insert(ch) {
                    self.by_channel.entry(ch).or_default().insert(conn.clone());
                }
            }
        }
        self.channels_of(conn)
    }

    /// Remove edges. Idempotent; unknown edges are ignored.
    /// Returns the connection's remaining subscription list.
    pub fn unsubscribe(&mut self, conn: &ConnectionId, channels: &[Channel]) -> Vec<Channel> {
        if let Some(set) = self.by_conn.get_mut(conn) {
            for ch in channels {
                if set.remove(ch) {
                    detach(&mut self.by_channel, *ch, conn);
                }
            }
            if set.is_empty() {
                self.by_conn.remove(conn);
            }
        }
        self.channels_of(conn)
    }

    /// Drop every edge of `conn` in one pass. Returns the channels it held.
    pub fn remove_connection(&mut self, conn: &ConnectionId) -> Vec<Channel> {
        let Some(set) = self.by_conn.remove(conn) else {
            return Vec::new();
        };
        for ch in &set {
            detach(&mut self.by_channel, *ch, conn);
        }
        set.into_iter().collect()
    }

    pub fn subscribers_of(&self, channel: Channel) -> HashSet<ConnectionId> {
        self.by_channel.get(&channel).cloned().unwrap_or_default()
    }

    /// Iterate subscribers without cloning the set.
    pub fn iter_subscribers(&self, channel: Channel) -> impl Iterator<Item = &ConnectionId> {
        self.by_channel.get(&channel).into_iter().flatten()
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.by_channel.get(&channel).map_or(0, HashSet::len)
    }

    /// Subscribed channels of `conn` in canonical order.
    pub fn channels_of(&self, conn: &ConnectionId) -> Vec<Channel> {
        self.by_conn
            .get(conn)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Check the two indices agree. Used by tests.
    pub fn is_consistent(&self) -> bool {
        let forward = self
            .by_conn
            .iter()
            .all(|(c, chs)| chs.iter().all(|ch| self.by_channel.get(ch).is_some_and(|s| s.contains(c))));
        let backward = self
            .by_channel
            .iter()
            .all(|(ch, cs)| cs.iter().all(|c| self.by_conn.get(c).is_some_and(|s| s.contains(ch))));
        forward && backward
    }
}

fn detach(
    by_channel: &mut HashMap<Channel, HashSet<ConnectionId>>,
    ch: Channel,
    conn: &ConnectionId,
) {
    if let Some(subs) = by_channel.get_mut(&ch) {
        subs.remove(conn);
        if subs.is_empty() {
            by_channel.remove(&ch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    #[test]
    fn subscribe_updates_both_indices() {
        let mut t = SubscriptionTracker::new();
        let c = id("c1");
        let list = t.subscribe(&c, &[Channel::ProposalVote, Channel::TreasuryDeposit]);

        // canonical order, not request order
        assert_eq!(list, vec![Channel::TreasuryDeposit, Channel::ProposalVote]);
        assert!(t.subscribers_of(Channel::TreasuryDeposit).contains(&c));
        assert!(t.subscribers_of(Channel::ProposalVote).contains(&c));
        assert!(t.is_consistent());
    }

    #[test]
    fn subscribe_is_union_with_prior_state() {
        let mut t = SubscriptionTracker::new();
        let c = id("c1");
        t.subscribe(&c, &[Channel::ElectionVote]);
        let list = t.subscribe(&c, &[Channel::ProposalNew]);
        assert_eq!(list, vec![Channel::ElectionVote, Channel::ProposalNew]);
    }

    #[test]
    fn resubscribe_is_noop() {
        let mut t = SubscriptionTracker::new();
        let c = id("c1");
        let first = t.subscribe(&c, &[Channel::TreasuryBalance]);
        let second = t.subscribe(&c, &[Channel::TreasuryBalance]);
        assert_eq!(first, second);
        assert_eq!(t.subscriber_count(Channel::TreasuryBalance), 1);
    }

    #[test]
    fn unsubscribe_unknown_edge_is_noop() {
        let mut t = SubscriptionTracker::new();
        let c = id("c1");
        assert!(t.unsubscribe(&c, &[Channel::ProposalVote]).is_empty());

        t.subscribe(&c, &[Channel::ProposalVote]);
        let left = t.unsubscribe(&c, &[Channel::ElectionVote, Channel::ProposalVote]);
        assert!(left.is_empty());
        assert_eq!(t.subscriber_count(Channel::ProposalVote), 0);
        assert!(t.is_consistent());
    }

    #[test]
    fn unsubscribe_keeps_other_edges() {
        let mut t = SubscriptionTracker::new();
        let a = id("a");
        let b = id("b");
        t.subscribe(&a, &[Channel::TreasuryDeposit, Channel::ProposalVote]);
        t.subscribe(&b, &[Channel::ProposalVote]);

        let left = t.unsubscribe(&a, &[Channel::ProposalVote]);
        assert_eq!(left, vec![Channel::TreasuryDeposit]);
        assert!(!t.subscribers_of(Channel::ProposalVote).contains(&a));
        assert!(t.subscribers_of(Channel::ProposalVote).contains(&b));
        assert!(t.subscribers_of(Channel::TreasuryDeposit).contains(&a));

        let left = t.unsubscribe(&b, &[Channel::ProposalVote]);
        assert!(left.is_empty());
        assert_eq!(t.subscriber_count(Channel::ProposalVote), 0);
        assert!(t.is_consistent());
    }

    #[test]
    fn remove_connection_leaves_no_orphans() {
        let mut t = SubscriptionTracker::new();
        let a = id("a");
        let b = id("b");
        t.subscribe(&a, &Channel::ALL);
        t.subscribe(&b, &[Channel::ProposalVote]);

        let removed = t.remove_connection(&a);
        assert_eq!(removed.len(), Channel::ALL.len());
        for ch in Channel::ALL {
            assert!(!t.subscribers_of(ch).contains(&a), "{ch} still holds a");
        }
        assert_eq!(t.subscriber_count(Channel::ProposalVote), 1);
        assert!(t.is_consistent());

        // second removal is harmless
        assert!(t.remove_connection(&a).is_empty());
    }
}
