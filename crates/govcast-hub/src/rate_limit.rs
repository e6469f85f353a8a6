use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use govcast_core::config::RateLimitConfig;

use crate::connection::ConnectionId;

/// Per-connection counter for the current window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitWindow {
    pub started_at: Instant,
    pub count: u32,
}

/// Bounds client-initiated operations per connection.
///
/// A window opens on a connection's first operation and lasts `window`;
/// once it has elapsed the next operation starts a fresh window at zero.
/// Budget and width are deployment-wide.
#[derive(Debug)]
pub struct RateLimiter {
    max: u32,
    window: Duration,
    windows: HashMap<ConnectionId, RateLimitWindow>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            windows: HashMap::new(),
        }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        Self::new(cfg.max_events, cfg.window())
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn try_consume(&mut self, conn: &ConnectionId, cost: u32) -> bool {
        self.try_consume_at(conn, cost, Instant::now())
    }

    /// Charge `cost` against the connection's budget at time `now`.
    /// Returns `false`, leaving the counter untouched, if it would exceed the budget.
    pub fn try_consume_at(&mut self, conn: &ConnectionId, cost: u32, now: Instant) -> bool {
        let window = self.windows.entry(conn.clone()).or_insert(RateLimitWindow {
            started_at: now,
            count: 0,
        });

        if now.saturating_duration_since(window.started_at) >= self.window {
            window.started_at = now;
            window.count = 0;
        }

        match window.count.checked_add(cost) {
            Some(next) if next <= self.max => {
                window.count = next;
                true
            }
            _ => false,
        }
    }

    /// Operations left in the current window.
    pub fn remaining(&self, conn: &ConnectionId) -> u32 {
        self.windows
            .get(conn)
            .map_or(self.max, |w| self.max.saturating_sub(w.count))
    }

    /// Drop the window of a closed connection.
    pub fn forget(&mut self, conn: &ConnectionId) {
        self.windows.remove(conn);
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}
