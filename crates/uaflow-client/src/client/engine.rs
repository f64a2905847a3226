// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! State owned by a connection's worker.
//!
//! [`ClientCore`] holds the stack and every piece of per-connection state.
//! Only the worker task touches it, so nothing here is locked. Service
//! results flow back through continuations that receive `&mut ClientCore`,
//! which lets them update state and dispatch follow-up requests directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};

use crate::config::ClientConfig;
use crate::error::{UaError, UaResult};
use crate::stack::{ServiceOutcome, ServiceRequest, ServiceResponse, Stack, StackEvent};
use crate::status::StatusCode;
use crate::types::{EndpointDescriptor, NodeHandle, NodeId};

use super::correlator::Correlator;
use super::events::ClientEvent;
use super::history::HistoryPaginator;
use super::monitoring::MonitoringRegistry;
use super::session::{ConnectionState, NodeTable};
use super::stats::ClientStats;
use super::subscription::SubscriptionManager;

/// Work to run when a dispatched request resolves.
pub(crate) type Continuation<S> = Box<dyn FnOnce(&mut ClientCore<S>, ServiceOutcome) + Send>;

/// Reply channel of a command.
pub(crate) type Reply<T> = oneshot::Sender<UaResult<T>>;

/// Sends a reply; a caller that went away is not an error.
pub(crate) fn send_reply<T>(reply: Reply<T>, result: UaResult<T>) {
    if reply.send(result).is_err() {
        tracing::trace!("Reply receiver dropped");
    }
}

/// Extracts a typed response from an outcome.
///
/// A response of the wrong service counts as `BadUnknownResponse`.
pub(crate) fn typed_response<T>(outcome: ServiceOutcome) -> Result<T, StatusCode>
where
    T: TryFrom<ServiceResponse, Error = ServiceResponse>,
{
    let response = outcome?;
    T::try_from(response).map_err(|other| {
        tracing::warn!(service = %other.kind(), "Response does not match the request");
        StatusCode::BAD_UNKNOWN_RESPONSE
    })
}

// =============================================================================
// ClientCore
// =============================================================================

/// Per-connection state, owned by the worker.
pub(crate) struct ClientCore<S: Stack> {
    pub(crate) stack: S,
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) state: ConnectionState,
    pub(crate) correlator: Correlator<Continuation<S>>,
    pub(crate) subscriptions: SubscriptionManager<S>,
    pub(crate) registry: MonitoringRegistry,
    pub(crate) history: HistoryPaginator,
    pub(crate) nodes: NodeTable,
    pub(crate) stats: Arc<ClientStats>,
    events: broadcast::Sender<ClientEvent>,
    /// Status of a teardown in progress.
    pub(crate) teardown_status: Option<StatusCode>,
    deferred_disconnect: Option<StatusCode>,
}

impl<S: Stack> ClientCore<S> {
    pub(crate) fn new(
        stack: S,
        config: Arc<ClientConfig>,
        events: broadcast::Sender<ClientEvent>,
        stats: Arc<ClientStats>,
    ) -> Self {
        Self {
            stack,
            config,
            state: ConnectionState::Disconnected,
            correlator: Correlator::new(stats.clone()),
            subscriptions: SubscriptionManager::new(),
            registry: MonitoringRegistry::default(),
            history: HistoryPaginator::default(),
            nodes: NodeTable::default(),
            stats,
            events,
            teardown_status: None,
            deferred_disconnect: None,
        }
    }

    #[inline]
    pub(crate) fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::info!(from = %self.state, to = %state, stack = %self.stack.display_name(), "Connection state changed");
            self.state = state;
            self.emit(ClientEvent::StateChanged(state));
        }
    }

    /// Checks that `handle` is registered and the connection is live.
    pub(crate) fn check_node(&self, handle: NodeHandle) -> UaResult<NodeId> {
        let node_id = self
            .nodes
            .node_id(handle)
            .cloned()
            .ok_or_else(|| UaError::unknown_handle(handle.0))?;
        if !self.is_connected() {
            return Err(UaError::not_connected());
        }
        Ok(node_id)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Dispatches a request; `then` runs exactly once with the outcome.
    ///
    /// If the request cannot leave (not connected, refused by the stack),
    /// `then` runs before this returns.
    pub(crate) fn dispatch<R, F>(&mut self, request: R, then: F)
    where
        R: Into<ServiceRequest>,
        F: FnOnce(&mut Self, ServiceOutcome) + Send + 'static,
    {
        let request = request.into();
        if !self.is_connected() {
            tracing::debug!(service = %request.kind(), state = %self.state, "Not dispatching while disconnected");
            then(self, Err(StatusCode::BAD_NOT_CONNECTED));
            return;
        }

        if let Err(rejected) = self
            .correlator
            .dispatch(&mut self.stack, request, Box::new(then))
        {
            (rejected.continuation)(self, Err(rejected.status));
        }
    }

    // =========================================================================
    // Stack events
    // =========================================================================

    /// Runs one drive pass and processes everything it produced.
    pub(crate) async fn drive_once(&mut self, max_wait: Duration, buffer: &mut Vec<StackEvent>) {
        let status = self.stack.drive(max_wait, buffer).await;
        for event in buffer.drain(..) {
            self.handle_stack_event(event);
        }
        if status.is_bad() {
            tracing::warn!(status = %status, "Drive reported connection loss");
            self.request_disconnect(status);
        }
    }

    pub(crate) fn handle_stack_event(&mut self, event: StackEvent) {
        match event {
            StackEvent::ServiceCompleted {
                request_id,
                outcome,
            } => {
                let Some(pending) = self.correlator.complete(request_id) else {
                    return;
                };
                if let Err(status) = &outcome {
                    if status.is_session_fatal() {
                        tracing::warn!(request_id, status = %status, "Session-fatal completion");
                        self.request_disconnect(*status);
                    }
                }
                (pending.continuation)(self, outcome);
            }
            StackEvent::DataChange {
                subscription_id,
                monitored_item_id,
                value,
            } => self.route_data_change(subscription_id, monitored_item_id, &value),
            StackEvent::Event {
                subscription_id,
                monitored_item_id,
                fields,
            } => self.route_event(subscription_id, monitored_item_id, &fields),
            StackEvent::SubscriptionInactive { subscription_id } => {
                self.subscription_inactive(subscription_id)
            }
            StackEvent::StateChanged(state) => {
                tracing::trace!(state = %state, "Stack state changed");
                if state.is_lost() && self.is_connected() {
                    self.request_disconnect(StatusCode::BAD_CONNECTION_CLOSED);
                }
            }
        }
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Asks for a teardown after the current pass.
    pub(crate) fn request_disconnect(&mut self, reason: StatusCode) {
        if self.deferred_disconnect.is_none() {
            tracing::debug!(reason = %reason, "Disconnect deferred to end of pass");
            self.deferred_disconnect = Some(reason);
        }
    }

    /// Runs a deferred disconnect, if one was requested.
    pub(crate) async fn run_deferred(&mut self) {
        if let Some(reason) = self.deferred_disconnect.take() {
            if self.state != ConnectionState::Disconnected {
                self.teardown(reason).await;
            }
        }
    }

    pub(crate) async fn connect(&mut self, endpoint: &EndpointDescriptor) -> UaResult<()> {
        if self.state != ConnectionState::Disconnected {
            return Err(crate::error::ClientError::invalid_state(format!(
                "cannot connect while {}",
                self.state
            ))
            .into());
        }

        self.set_state(ConnectionState::Connecting);
        tracing::info!(endpoint = %endpoint.url, "Connecting");
        let status = self.stack.connect(endpoint).await;
        if status.is_good() {
            self.set_state(ConnectionState::Connected);
            Ok(())
        } else {
            self.set_state(ConnectionState::Disconnected);
            let error = UaError::from_status(status, format!("connect to {}", endpoint.url));
            error.log("connect");
            Err(error)
        }
    }

    pub(crate) async fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.deferred_disconnect = None;
        self.teardown(StatusCode::BAD_DISCONNECT).await;
    }

    /// Resolves everything that depends on the connection, then closes it.
    ///
    /// Order: pending requests, subscriptions, history sessions, transport.
    pub(crate) async fn teardown(&mut self, reason: StatusCode) {
        let item_status = if reason.is_timeout() {
            StatusCode::BAD_TIMEOUT
        } else {
            StatusCode::BAD_DISCONNECT
        };
        tracing::warn!(
            reason = %reason,
            pending = self.correlator.pending_count(),
            subscriptions = self.subscriptions.len(),
            creating = self.subscriptions.pending_len(),
            items = self.registry.len(),
            history_sessions = self.history.len(),
            "Tearing down connection"
        );
        self.stats.record_teardown();
        self.set_state(ConnectionState::Closing);
        self.teardown_status = Some(item_status);

        for pending in self.correlator.drain() {
            (pending.continuation)(self, Err(StatusCode::BAD_CONNECTION_CLOSED));
        }
        self.discard_all_subscriptions(item_status);
        self.history.clear();

        self.stack.disconnect().await;
        self.teardown_status = None;
        self.deferred_disconnect = None;
        self.set_state(ConnectionState::Disconnected);
    }
}
