// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection state and the table of registered nodes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{AttributeId, NodeHandle, NodeId};

use super::events::AttributeValue;

// =============================================================================
// ConnectionState
// =============================================================================

/// State of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Stack is establishing the session.
    Connecting,
    /// Session active; requests may be dispatched.
    Connected,
    /// Teardown in progress.
    Closing,
}

impl ConnectionState {
    /// Returns `true` if requests may be dispatched.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

// =============================================================================
// NodeTable
// =============================================================================

/// A registered node and its attribute cache.
#[derive(Debug, Clone)]
pub(crate) struct NodeEntry {
    pub node_id: NodeId,
    pub cache: HashMap<AttributeId, AttributeValue>,
}

/// Registered nodes by handle.
#[derive(Debug, Default)]
pub(crate) struct NodeTable {
    next_handle: u32,
    entries: HashMap<NodeHandle, NodeEntry>,
}

impl NodeTable {
    pub fn register(&mut self, node_id: NodeId) -> NodeHandle {
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        while self.entries.contains_key(&NodeHandle(self.next_handle)) {
            self.next_handle = self.next_handle.wrapping_add(1).max(1);
        }
        let handle = NodeHandle(self.next_handle);
        self.entries.insert(
            handle,
            NodeEntry {
                node_id,
                cache: HashMap::new(),
            },
        );
        handle
    }

    pub fn unregister(&mut self, handle: NodeHandle) -> Option<NodeEntry> {
        self.entries.remove(&handle)
    }

    pub fn node_id(&self, handle: NodeHandle) -> Option<&NodeId> {
        self.entries.get(&handle).map(|e| &e.node_id)
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn cached(&self, handle: NodeHandle, attribute: AttributeId) -> Option<&AttributeValue> {
        self.entries.get(&handle)?.cache.get(&attribute)
    }

    /// Stores a value; values with a bad status are not cached.
    pub fn update_cache(&mut self, handle: NodeHandle, attribute: AttributeId, value: AttributeValue) {
        if value.status.is_bad() {
            return;
        }
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.cache.insert(attribute, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DynamicValue;
    use crate::status::StatusCode;

    #[test]
    fn test_handles_are_unique() {
        let mut table = NodeTable::default();
        let a = table.register(NodeId::numeric(2, 1));
        let b = table.register(NodeId::numeric(2, 1));
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert!(table.unregister(a).is_some());
        assert!(!table.contains(a));
        assert!(table.unregister(a).is_none());
    }

    #[test]
    fn test_bad_values_not_cached() {
        let mut table = NodeTable::default();
        let handle = table.register(NodeId::numeric(2, 1));
        table.update_cache(
            handle,
            AttributeId::Value,
            AttributeValue::from_status(StatusCode::BAD_NOT_READABLE),
        );
        assert!(table.cached(handle, AttributeId::Value).is_none());

        table.update_cache(handle, AttributeId::Value, AttributeValue::new(DynamicValue::Int32(4)));
        assert_eq!(
            table.cached(handle, AttributeId::Value).map(|v| &v.value),
            Some(&DynamicValue::Int32(4))
        );
    }

    #[test]
    fn test_connection_state() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Closing.is_connected());
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}
