// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Decoded attribute values and the events a client broadcasts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{self, DataValue, DynamicValue, WireType};
use crate::status::StatusCode;
use crate::types::{AttributeId, NodeHandle};

use super::monitoring::MonitoringState;
use super::session::ConnectionState;

/// An attribute value with status and timestamps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeValue {
    /// Value; `Null` when the status is bad.
    pub value: DynamicValue,
    /// Status.
    pub status: StatusCode,
    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl AttributeValue {
    /// Creates a good value without timestamps.
    pub fn new(value: DynamicValue) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    /// Creates a value-less result.
    pub fn from_status(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Decodes a wire data value; `target` reinterprets numbers as in
    /// [`codec::decode_as`].
    pub fn from_data_value(data: &DataValue, target: Option<WireType>) -> Self {
        let value = match target {
            Some(target) => codec::decode_as(&data.value, target),
            None => codec::decode(&data.value),
        };
        Self {
            value,
            status: data.status,
            source_timestamp: data.source_timestamp,
            server_timestamp: data.server_timestamp,
        }
    }

    /// Returns `true` if the status is good.
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }
}

/// Something that happened on a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The connection state changed.
    StateChanged(ConnectionState),
    /// A monitored attribute changed.
    DataChanged {
        /// Node.
        handle: NodeHandle,
        /// Attribute.
        attribute: AttributeId,
        /// New value.
        value: AttributeValue,
    },
    /// An event arrived for a node monitoring `EventNotifier`.
    EventReceived {
        /// Node.
        handle: NodeHandle,
        /// Fields in select-clause order.
        fields: Vec<DynamicValue>,
    },
    /// An enable request finished.
    MonitoringEnabled {
        /// Node.
        handle: NodeHandle,
        /// Attribute.
        attribute: AttributeId,
        /// Outcome.
        status: StatusCode,
    },
    /// Monitoring stopped, by request or because the subscription was lost.
    MonitoringDisabled {
        /// Node.
        handle: NodeHandle,
        /// Attribute.
        attribute: AttributeId,
        /// Why.
        status: StatusCode,
    },
    /// Monitoring parameters were revised.
    MonitoringParametersChanged {
        /// Node.
        handle: NodeHandle,
        /// Attribute.
        attribute: AttributeId,
        /// Current parameters.
        state: Box<MonitoringState>,
    },
}

impl ClientEvent {
    /// Returns the node an event concerns.
    pub fn handle(&self) -> Option<NodeHandle> {
        match self {
            Self::StateChanged(_) => None,
            Self::DataChanged { handle, .. }
            | Self::EventReceived { handle, .. }
            | Self::MonitoringEnabled { handle, .. }
            | Self::MonitoringDisabled { handle, .. }
            | Self::MonitoringParametersChanged { handle, .. } => Some(*handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Variant;

    #[test]
    fn test_from_data_value() {
        let data = DataValue::new(Variant::Int16(7)).with_source_timestamp(Utc::now());
        let plain = AttributeValue::from_data_value(&data, None);
        assert_eq!(plain.value, DynamicValue::Int16(7));
        assert!(plain.source_timestamp.is_some());

        let widened = AttributeValue::from_data_value(&data, Some(WireType::Double));
        assert_eq!(widened.value, DynamicValue::Double(7.0));
    }

    #[test]
    fn test_event_handle() {
        let event = ClientEvent::MonitoringDisabled {
            handle: NodeHandle(3),
            attribute: AttributeId::Value,
            status: StatusCode::BAD_DISCONNECT,
        };
        assert_eq!(event.handle(), Some(NodeHandle(3)));
        assert_eq!(ClientEvent::StateChanged(ConnectionState::Connected).handle(), None);
    }
}
