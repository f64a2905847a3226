// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription lifecycle.
//!
//! # Sharing
//!
//! ```text
//!  acquire(interval, Shared)
//!        │
//!        ├─ interval < floor ──► interval = floor
//!        │
//!        ├─ live Shared subscription with revised == interval ──► reuse
//!        ├─ Shared creation in flight with requested == interval ──► wait for it
//!        └─ otherwise ──► CreateSubscription
//!                            └─ revised > requested ──► floor = revised
//! ```
//!
//! The floor never decreases while the worker lives.
//!
//! A subscription is discarded locally as soon as it owns no monitored
//! items and no item creation is in flight on it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::stack::services::{
    CreateSubscriptionRequest, CreateSubscriptionResponse, DeleteSubscriptionsRequest,
    DeleteSubscriptionsResponse,
};
use crate::stack::{ServiceOutcome, Stack};
use crate::status::StatusCode;

use super::engine::{typed_response, ClientCore};
use super::events::ClientEvent;
use super::monitoring::MonitoredItem;

// =============================================================================
// Types
// =============================================================================

/// Whether a subscription may be shared between monitoring requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    /// Reused by any request with the same publishing interval.
    #[default]
    Shared,
    /// Never reused.
    Exclusive,
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => write!(f, "shared"),
            Self::Exclusive => write!(f, "exclusive"),
        }
    }
}

/// What a monitoring request needs from a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRequest {
    /// Requested publishing interval in milliseconds.
    pub publishing_interval_ms: f64,
    /// Sharing mode.
    pub sharing: SubscriptionType,
    /// Use this existing subscription instead.
    pub subscription_id: Option<u32>,
    /// Lifetime count.
    pub lifetime_count: u32,
    /// Keep-alive count.
    pub max_keep_alive_count: u32,
    /// Notifications per publish.
    pub max_notifications_per_publish: u32,
    /// Priority.
    pub priority: u8,
}

/// A live subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Server-assigned id.
    pub id: u32,
    /// Sharing mode.
    pub sharing: SubscriptionType,
    /// Interval asked for.
    pub requested_interval_ms: f64,
    /// Interval granted.
    pub revised_interval_ms: f64,
    /// Revised lifetime count.
    pub lifetime_count: u32,
    /// Revised keep-alive count.
    pub max_keep_alive_count: u32,
    /// Notifications per publish.
    pub max_notifications_per_publish: u32,
    /// Priority.
    pub priority: u8,
    /// Publishing enabled.
    pub publishing_enabled: bool,
    /// Items by server-assigned monitored-item id.
    pub items: HashMap<u32, MonitoredItem>,
    /// Item creations in flight.
    pub(crate) pending_items: usize,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    fn is_releasable(&self) -> bool {
        self.items.is_empty() && self.pending_items == 0
    }
}

/// Runs once a subscription is available or failed to materialize.
pub(crate) type SubscriptionWaiter<S> =
    Box<dyn FnOnce(&mut ClientCore<S>, Result<u32, StatusCode>) + Send>;

struct PendingSubscription<S: Stack> {
    token: u64,
    interval_ms: f64,
    sharing: SubscriptionType,
    waiters: Vec<SubscriptionWaiter<S>>,
}

// =============================================================================
// SubscriptionManager
// =============================================================================

/// Owns all subscriptions of a connection.
pub(crate) struct SubscriptionManager<S: Stack> {
    live: BTreeMap<u32, Subscription>,
    pending: Vec<PendingSubscription<S>>,
    next_token: u64,
    floor_ms: f64,
}

impl<S: Stack> SubscriptionManager<S> {
    pub fn new() -> Self {
        Self {
            live: BTreeMap::new(),
            pending: Vec::new(),
            next_token: 0,
            floor_ms: 0.0,
        }
    }

    pub fn get(&self, id: u32) -> Option<&Subscription> {
        self.live.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Subscription> {
        self.live.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Current sharing floor in milliseconds.
    pub fn floor_ms(&self) -> f64 {
        self.floor_ms
    }

    /// Returns `Err` if `request` names a subscription that does not exist.
    pub fn check(&self, request: &SubscriptionRequest) -> Result<(), ClientError> {
        match request.subscription_id {
            Some(id) if !self.live.contains_key(&id) => {
                Err(ClientError::UnknownSubscription { subscription_id: id })
            }
            _ => Ok(()),
        }
    }

    fn floored(&self, interval_ms: f64) -> f64 {
        if interval_ms < self.floor_ms {
            self.floor_ms
        } else {
            interval_ms
        }
    }

    fn raise_floor(&mut self, requested_ms: f64, revised_ms: f64) {
        if revised_ms > requested_ms && revised_ms > self.floor_ms {
            tracing::debug!(from = self.floor_ms, to = revised_ms, "Raising publishing interval floor");
            self.floor_ms = revised_ms;
        }
    }

    fn find_shared(&self, interval_ms: f64) -> Option<u32> {
        self.live
            .values()
            .find(|s| s.sharing == SubscriptionType::Shared && s.revised_interval_ms == interval_ms)
            .map(|s| s.id)
    }

    fn take_pending(&mut self, token: u64) -> Option<PendingSubscription<S>> {
        let index = self.pending.iter().position(|p| p.token == token)?;
        Some(self.pending.remove(index))
    }
}

// =============================================================================
// Lifecycle on the worker
// =============================================================================

impl<S: Stack> ClientCore<S> {
    /// Finds or creates a subscription for `request`.
    ///
    /// `then` runs synchronously when an existing subscription is reused,
    /// otherwise when the creation completes.
    ///
    /// # Errors
    ///
    /// Fails with "unknown subscription" if an explicit id does not exist.
    pub(crate) fn acquire_subscription(
        &mut self,
        request: SubscriptionRequest,
        then: SubscriptionWaiter<S>,
    ) -> Result<(), ClientError> {
        self.subscriptions.check(&request)?;
        if let Some(id) = request.subscription_id {
            then(self, Ok(id));
            return Ok(());
        }

        let interval_ms = self.subscriptions.floored(request.publishing_interval_ms);

        if request.sharing == SubscriptionType::Shared {
            if let Some(id) = self.subscriptions.find_shared(interval_ms) {
                tracing::debug!(subscription_id = id, interval_ms, "Reusing shared subscription");
                self.stats.record_subscription_shared();
                then(self, Ok(id));
                return Ok(());
            }
            if let Some(pending) = self
                .subscriptions
                .pending
                .iter_mut()
                .find(|p| p.sharing == SubscriptionType::Shared && p.interval_ms == interval_ms)
            {
                tracing::debug!(interval_ms, "Joining shared subscription being created");
                self.stats.record_subscription_shared();
                pending.waiters.push(then);
                return Ok(());
            }
        }

        let token = self.subscriptions.next_token;
        self.subscriptions.next_token += 1;
        self.subscriptions.pending.push(PendingSubscription {
            token,
            interval_ms,
            sharing: request.sharing,
            waiters: vec![then],
        });

        let create = CreateSubscriptionRequest {
            requested_publishing_interval: interval_ms,
            requested_lifetime_count: request.lifetime_count,
            requested_max_keep_alive_count: request.max_keep_alive_count,
            max_notifications_per_publish: request.max_notifications_per_publish,
            publishing_enabled: true,
            priority: request.priority,
        };
        tracing::debug!(interval_ms, sharing = %request.sharing, "Creating subscription");
        self.dispatch(create, move |core, outcome| {
            core.on_subscription_created(token, request, outcome)
        });
        Ok(())
    }

    fn on_subscription_created(
        &mut self,
        token: u64,
        request: SubscriptionRequest,
        outcome: ServiceOutcome,
    ) {
        let Some(pending) = self.subscriptions.take_pending(token) else {
            tracing::trace!(token, "Subscription creation already resolved");
            return;
        };

        let result = match typed_response::<CreateSubscriptionResponse>(outcome) {
            Ok(response) => {
                let id = response.subscription_id;
                self.subscriptions
                    .raise_floor(pending.interval_ms, response.revised_publishing_interval);
                self.subscriptions.live.insert(
                    id,
                    Subscription {
                        id,
                        sharing: pending.sharing,
                        requested_interval_ms: pending.interval_ms,
                        revised_interval_ms: response.revised_publishing_interval,
                        lifetime_count: response.revised_lifetime_count,
                        max_keep_alive_count: response.revised_max_keep_alive_count,
                        max_notifications_per_publish: request.max_notifications_per_publish,
                        priority: request.priority,
                        publishing_enabled: true,
                        items: HashMap::new(),
                        pending_items: 0,
                        created_at: Utc::now(),
                    },
                );
                self.stats.record_subscription_created();
                tracing::info!(
                    subscription_id = id,
                    requested_ms = pending.interval_ms,
                    revised_ms = response.revised_publishing_interval,
                    sharing = %pending.sharing,
                    "Subscription created"
                );
                Ok(id)
            }
            Err(status) => {
                let status = self.teardown_status.unwrap_or(status);
                tracing::warn!(status = %status, interval_ms = pending.interval_ms, "Subscription creation failed");
                Err(status)
            }
        };

        // Held across the waiters so one rejected item cannot release the
        // subscription before its siblings run.
        if let Ok(id) = result {
            if let Some(subscription) = self.subscriptions.get_mut(id) {
                subscription.pending_items += 1;
            }
        }

        for waiter in pending.waiters {
            waiter(self, result);
        }

        // Every waiter may have failed before creating an item.
        if let Ok(id) = result {
            if let Some(subscription) = self.subscriptions.get_mut(id) {
                subscription.pending_items = subscription.pending_items.saturating_sub(1);
            }
            self.release_if_empty(id);
        }
    }

    /// Deletes a subscription that owns no items.
    pub(crate) fn release_if_empty(&mut self, id: u32) {
        let releasable = self
            .subscriptions
            .get(id)
            .is_some_and(Subscription::is_releasable);
        if !releasable {
            return;
        }

        self.subscriptions.live.remove(&id);
        self.stats.record_subscription_deleted(1);
        tracing::info!(subscription_id = id, "Subscription released");

        if self.is_connected() {
            self.dispatch(
                DeleteSubscriptionsRequest {
                    subscription_ids: vec![id],
                },
                move |_core, outcome| {
                    let status = match typed_response::<DeleteSubscriptionsResponse>(outcome) {
                        Ok(response) => response
                            .results
                            .first()
                            .copied()
                            .unwrap_or(StatusCode::BAD_UNKNOWN_RESPONSE),
                        Err(status) => status,
                    };
                    if status.is_bad() {
                        tracing::warn!(subscription_id = id, status = %status, "Server-side subscription delete failed");
                    }
                },
            );
        }
    }

    /// Drops one subscription and all its items without server round trips.
    fn discard_subscription(&mut self, id: u32, status: StatusCode) {
        let Some(subscription) = self.subscriptions.live.remove(&id) else {
            return;
        };
        self.stats.record_subscription_deleted(1);

        for item in subscription.items.into_values() {
            self.registry.remove(item.handle, item.attribute);
            self.emit(ClientEvent::MonitoringDisabled {
                handle: item.handle,
                attribute: item.attribute,
                status,
            });
        }
    }

    /// Teardown: discards every subscription and resolves pending creations.
    pub(crate) fn discard_all_subscriptions(&mut self, status: StatusCode) {
        let pending = std::mem::take(&mut self.subscriptions.pending);
        for creation in pending {
            for waiter in creation.waiters {
                waiter(self, Err(status));
            }
        }

        let ids: Vec<u32> = self.subscriptions.live.keys().copied().collect();
        if !ids.is_empty() {
            tracing::warn!(count = ids.len(), status = %status, "Discarding subscriptions");
        }
        for id in ids {
            self.discard_subscription(id, status);
        }
    }

    /// The server reported a subscription as timed out.
    pub(crate) fn subscription_inactive(&mut self, id: u32) {
        if self.subscriptions.get(id).is_none() {
            tracing::trace!(subscription_id = id, "Inactivity for unknown subscription");
            return;
        }
        tracing::warn!(subscription_id = id, "Subscription timed out");
        self.discard_subscription(id, StatusCode::BAD_TIMEOUT);
    }
}
