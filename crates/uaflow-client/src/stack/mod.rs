// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Contract of the protocol stack the client runs on.
//!
//! The stack owns the secure channel, the session and PDU framing. The
//! client only sees two primitives:
//!
//! - [`Stack::service_call`] submits a typed request and returns at once,
//!   either with a request id or with the status that prevented dispatch.
//! - [`Stack::drive`] pumps I/O for up to `max_wait` and appends everything
//!   that became due (completions, notifications, state changes) to the
//!   caller's buffer.
//!
//! A completion arrives exactly once per accepted request id.

pub mod services;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::codec::{DataValue, Variant};
use crate::status::StatusCode;
use crate::types::EndpointDescriptor;

pub use services::{ServiceKind, ServiceRequest, ServiceResponse};

/// Stack-assigned identifier of an in-flight request.
pub type RequestId = u32;

/// Final result of a dispatched request: a typed response, or the
/// service-level status that replaced it.
pub type ServiceOutcome = Result<ServiceResponse, StatusCode>;

// =============================================================================
// StackState
// =============================================================================

/// Connection state reported by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StackState {
    /// No session.
    #[default]
    Disconnected,
    /// Channel or session being established.
    Connecting,
    /// Session active.
    Connected,
    /// Connection lost; the stack gave up.
    Failed,
}

impl StackState {
    /// Returns `true` if a session is active.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` for states that end the connection.
    #[inline]
    pub fn is_lost(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

impl fmt::Display for StackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// StackEvent
// =============================================================================

/// Something the stack produced during [`Stack::drive`].
#[derive(Debug, Clone, PartialEq)]
pub enum StackEvent {
    /// A dispatched request finished.
    ServiceCompleted {
        /// Id returned by `service_call`.
        request_id: RequestId,
        /// Response or service-level failure.
        outcome: ServiceOutcome,
    },
    /// A data-change notification.
    DataChange {
        /// Subscription.
        subscription_id: u32,
        /// Server-assigned monitored-item id.
        monitored_item_id: u32,
        /// New value.
        value: DataValue,
    },
    /// An event notification, fields in select-clause order.
    Event {
        /// Subscription.
        subscription_id: u32,
        /// Server-assigned monitored-item id.
        monitored_item_id: u32,
        /// Selected fields.
        fields: Vec<Variant>,
    },
    /// The server stopped publishing for a subscription (lifetime expired).
    SubscriptionInactive {
        /// Subscription.
        subscription_id: u32,
    },
    /// The connection state changed.
    StateChanged(StackState),
}

// =============================================================================
// Stack Trait
// =============================================================================

/// The protocol stack a connection runs on.
///
/// All methods are called from the connection's worker task only, so
/// implementations need `Send` but not `Sync`.
#[async_trait]
pub trait Stack: Send + 'static {
    /// Establishes channel and session. Returns `Good` on success.
    async fn connect(&mut self, endpoint: &EndpointDescriptor) -> StatusCode;

    /// Closes session and channel. Pending requests are forgotten; the
    /// client resolves them itself.
    async fn disconnect(&mut self);

    /// Submits a request.
    ///
    /// # Errors
    ///
    /// Returns the status that prevented dispatch. No completion follows.
    fn service_call(&mut self, request: ServiceRequest) -> Result<RequestId, StatusCode>;

    /// Pumps I/O for at most `max_wait`, appending due events to `events`.
    ///
    /// A bad return status means the connection is gone.
    async fn drive(&mut self, max_wait: Duration, events: &mut Vec<StackEvent>) -> StatusCode;

    /// Returns a name for logging.
    fn display_name(&self) -> String {
        "stack".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_state() {
        assert!(StackState::Connected.is_connected());
        assert!(!StackState::Connecting.is_connected());
        assert!(StackState::Failed.is_lost());
        assert!(StackState::Disconnected.is_lost());
        assert!(!StackState::Connecting.is_lost());
        assert_eq!(StackState::Failed.to_string(), "Failed");
    }
}
