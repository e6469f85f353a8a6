//! Subscription-based fan-out of governance events to live client connections.
//!
//! One [`Hub`] per process owns all mutable state. The [`ConnectionManager`]
//! and [`EventEmitter`] are cheap handles onto it.

pub mod connection;
pub mod emitter;
pub mod hub;
pub mod identity;
pub mod manager;
pub mod metrics;
pub mod rate_limit;
pub mod registry;
pub mod subscriptions;

pub use connection::{ConnState, ConnectionId, Outbound};
pub use emitter::{EmitReport, EventEmitter};
pub use hub::Hub;
pub use identity::{AuthOutcome, Identity, IdentityResolver};
pub use manager::{ConnectionManager, OpenedConnection, Reply};
pub use metrics::{HealthSnapshot, MetricsSnapshot};
pub use registry::ChannelRegistry;
