use govcast_core::Channel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::subscriptions::SubscriptionTracker;

/// Distribution counters. Only the hub writes to it.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    total_connections: u64,
    active_connections: u64,
    total_events: u64,
    dropped_messages: u64,
    events_by_channel: HashMap<Channel, u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&mut self) {
        self.total_connections += 1;
        self.active_connections += 1;
    }

    pub fn connection_closed(&mut self) {
        self.active_connections = self.active_connections.saturating_sub(1);
    }

    /// Counted once per emit, whatever the number of recipients.
    pub fn event_emitted(&mut self, channel: Channel) {
        self.total_events += 1;
        *self.events_by_channel.entry(channel).or_insert(0) += 1;
    }

    /// A subscriber's outbound queue was full.
    pub fn message_dropped(&mut self) {
        self.dropped_messages += 1;
    }

    pub fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            connected: true,
            active_connections: self.active_connections,
            total_connections: self.total_connections,
            total_events: self.total_events,
        }
    }

    /// Full snapshot. Subscriber counts are read from the live tracker so they
    /// always match `subscribers_of(channel).len()`.
    pub fn snapshot(&self, subscriptions: &SubscriptionTracker) -> MetricsSnapshot {
        let mut events_by_channel = BTreeMap::new();
        let mut channel_subscribers = BTreeMap::new();
        for ch in Channel::ALL {
            events_by_channel.insert(
                ch.as_str().to_string(),
                self.events_by_channel.get(&ch).copied().unwrap_or(0),
            );
            channel_subscribers.insert(ch.as_str().to_string(), subscriptions.subscriber_count(ch));
        }
        MetricsSnapshot {
            health: self.health(),
            dropped_messages: self.dropped_messages,
            events_by_channel,
            channel_subscribers,
        }
    }
}

/// Payload of the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub connected: bool,
    pub active_connections: u64,
    pub total_connections: u64,
    pub total_events: u64,
}

/// Payload of the detailed metrics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    #[serde(flatten)]
    pub health: HealthSnapshot,
    pub dropped_messages: u64,
    pub events_by_channel: BTreeMap<String, u64>,
    pub channel_subscribers: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionId;

    #[test]
    fn connection_counters() {
        let mut m = MetricsCollector::new();
        m.connection_opened();
        m.connection_opened();
        m.connection_closed();
        let h = m.health();
        assert_eq!(h.total_connections, 2);
        assert_eq!(h.active_connections, 1);

        // never underflows
        m.connection_closed();
        m.connection_closed();
        assert_eq!(m.health().active_connections, 0);
    }

    #[test]
    fn snapshot_lists_every_channel() {
        let mut m = MetricsCollector::new();
        let mut t = SubscriptionTracker::new();
        t.subscribe(&ConnectionId::from("c"), &[Channel::ProposalVote]);
        m.event_emitted(Channel::ProposalVote);
        m.event_emitted(Channel::ProposalVote);

        let snap = m.snapshot(&t);
        assert_eq!(snap.events_by_channel.len(), 10);
        assert_eq!(snap.events_by_channel["proposals:vote"], 2);
        assert_eq!(snap.events_by_channel["treasury:deposit"], 0);
        assert_eq!(snap.channel_subscribers["proposals:vote"], 1);
        assert_eq!(snap.health.total_events, 2);
    }

    #[test]
    fn snapshot_serializes_flat_camel_case() {
        let snap = MetricsCollector::new().snapshot(&SubscriptionTracker::new());
        let v = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["connected"], true);
        assert_eq!(v["activeConnections"], 0);
        assert!(v["eventsByChannel"].is_object());
        assert!(v["channelSubscribers"].is_object());
    }
}
