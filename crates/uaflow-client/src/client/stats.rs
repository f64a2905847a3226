// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection statistics shared between the worker and the [`Client`](super::Client).

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Atomic counters updated by the worker.
#[derive(Debug, Default)]
pub struct ClientStats {
    requests_dispatched: AtomicU64,
    requests_completed: AtomicU64,
    requests_rejected: AtomicU64,
    completions_dropped: AtomicU64,
    requests_drained: AtomicU64,

    notifications_routed: AtomicU64,
    notifications_dropped: AtomicU64,

    subscriptions_created: AtomicU64,
    subscriptions_deleted: AtomicU64,
    subscriptions_shared: AtomicU64,

    teardowns: AtomicU64,
    last_teardown: RwLock<Option<DateTime<Utc>>>,
}

impl ClientStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_dispatched(&self) {
        self.requests_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completion_dropped(&self) {
        self.completions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drained(&self, count: usize) {
        self.requests_drained
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_notification(&self, routed: bool) {
        if routed {
            self.notifications_routed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.notifications_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_subscription_created(&self) {
        self.subscriptions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_subscription_deleted(&self, count: usize) {
        self.subscriptions_deleted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_subscription_shared(&self) {
        self.subscriptions_shared.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::Relaxed);
        *self.last_teardown.write() = Some(Utc::now());
    }

    /// Returns a point-in-time copy of all counters.
    pub fn snapshot(&self) -> ClientStatsSnapshot {
        ClientStatsSnapshot {
            requests_dispatched: self.requests_dispatched.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            completions_dropped: self.completions_dropped.load(Ordering::Relaxed),
            requests_drained: self.requests_drained.load(Ordering::Relaxed),
            notifications_routed: self.notifications_routed.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
            subscriptions_created: self.subscriptions_created.load(Ordering::Relaxed),
            subscriptions_deleted: self.subscriptions_deleted.load(Ordering::Relaxed),
            subscriptions_shared: self.subscriptions_shared.load(Ordering::Relaxed),
            teardowns: self.teardowns.load(Ordering::Relaxed),
            last_teardown: *self.last_teardown.read(),
        }
    }
}

/// A snapshot of [`ClientStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStatsSnapshot {
    /// Requests accepted by the stack.
    pub requests_dispatched: u64,
    /// Completions matched to a pending request.
    pub requests_completed: u64,
    /// Requests refused at dispatch.
    pub requests_rejected: u64,
    /// Completions with no matching request.
    pub completions_dropped: u64,
    /// Requests resolved by teardown.
    pub requests_drained: u64,
    /// Notifications delivered to a monitored item.
    pub notifications_routed: u64,
    /// Notifications for unknown items.
    pub notifications_dropped: u64,
    /// Subscriptions created on the server.
    pub subscriptions_created: u64,
    /// Subscriptions discarded locally.
    pub subscriptions_deleted: u64,
    /// Monitoring requests that reused a shared subscription.
    pub subscriptions_shared: u64,
    /// Connection teardowns.
    pub teardowns: u64,
    /// Time of the last teardown.
    pub last_teardown: Option<DateTime<Utc>>,
}

impl ClientStatsSnapshot {
    /// Returns requests dispatched but not yet completed or drained.
    pub fn in_flight(&self) -> u64 {
        self.requests_dispatched
            .saturating_sub(self.requests_completed)
            .saturating_sub(self.requests_drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let stats = ClientStats::new();
        stats.record_dispatched();
        stats.record_dispatched();
        stats.record_dispatched();
        stats.record_completed();
        stats.record_drained(1);
        stats.record_notification(true);
        stats.record_notification(false);
        stats.record_teardown();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests_dispatched, 3);
        assert_eq!(snapshot.in_flight(), 1);
        assert_eq!(snapshot.notifications_routed, 1);
        assert_eq!(snapshot.notifications_dropped, 1);
        assert_eq!(snapshot.teardowns, 1);
        assert!(snapshot.last_teardown.is_some());

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"requests_dispatched\":3"));
    }
}
