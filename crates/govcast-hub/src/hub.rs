use dashmap::DashMap;
use govcast_core::{Channel, GovcastConfig};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

use crate::connection::{Connection, ConnectionId};
use crate::identity::IdentityResolver;
use crate::metrics::{HealthSnapshot, MetricsCollector, MetricsSnapshot};
use crate::rate_limit::RateLimiter;
use crate::registry::ChannelRegistry;
use crate::subscriptions::SubscriptionTracker;

/// Mutable bookkeeping guarded by the hub's single lock.
#[derive(Debug)]
pub(crate) struct HubState {
    pub subscriptions: SubscriptionTracker,
    pub limiter: RateLimiter,
    pub metrics: MetricsCollector,
}

/// Process-wide broadcast state. Build one at startup and share it as `Arc<Hub>`.
///
/// Lock order: lock `state` first, then read `connections`. Never lock
/// `state` while holding a `connections` guard.
pub struct Hub {
    pub(crate) config: GovcastConfig,
    pub(crate) registry: ChannelRegistry,
    pub(crate) identity: IdentityResolver,
    pub(crate) state: Mutex<HubState>,
    /// Live connections: id -> record with outbound queue.
    pub(crate) connections: DashMap<ConnectionId, Connection>,
    /// Signalled whenever a connection finishes closing.
    pub(crate) closed: Notify,
}

impl Hub {
    pub fn new(config: GovcastConfig) -> Arc<Self> {
        let state = HubState {
            subscriptions: SubscriptionTracker::new(),
            limiter: RateLimiter::from_config(&config.rate_limit),
            metrics: MetricsCollector::new(),
        };
        Arc::new(Self {
            registry: ChannelRegistry::new(),
            identity: IdentityResolver::new(&config.auth),
            state: Mutex::new(state),
            connections: DashMap::new(),
            closed: Notify::new(),
            config,
        })
    }

    pub fn config(&self) -> &GovcastConfig {
        &self.config
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    /// A panic while holding the lock cannot leave the indices half-updated
    /// (every mutation completes before returning), so poisoning is ignored.
    pub(crate) fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribers_of(&self, channel: Channel) -> HashSet<ConnectionId> {
        self.lock().subscriptions.subscribers_of(channel)
    }

    pub fn channels_of(&self, conn: &ConnectionId) -> Vec<Channel> {
        self.lock().subscriptions.channels_of(conn)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_connected(&self, conn: &ConnectionId) -> bool {
        self.connections.contains_key(conn)
    }

    pub fn health(&self) -> HealthSnapshot {
        self.lock().metrics.health()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let state = self.lock();
        state.metrics.snapshot(&state.subscriptions)
    }

    /// Every channel's subscriber set references only live connections.
    pub fn has_no_orphans(&self) -> bool {
        let state = self.lock();
        state.subscriptions.is_consistent()
            && Channel::ALL.iter().all(|&ch| {
                state
                    .subscriptions
                    .iter_subscribers(ch)
                    .all(|c| self.connections.contains_key(c))
            })
    }
}
