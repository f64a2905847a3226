// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The node façade.
//!
//! A [`Node`] names one registered node on a client. Every operation is
//! checked on the worker: an unregistered handle fails with "unknown
//! handle", a dropped connection with "not connected", before anything is
//! sent to the server.
//!
//! Dropping a `Node` unregisters it and disables its monitored items.

use std::fmt;

use tokio::sync::broadcast::{self, error::RecvError};

use crate::client::{
    AttributeValue, BrowseOptions, BrowseOutcome, BrowsePathOutcome, Client, ClientEvent, Command,
    MethodResult, MonitoringParameter, MonitoringResult, MonitoringSettings, MonitoringState,
    ParameterValue, ReadResult, WriteItem, WriteResult,
};
use crate::codec::DynamicValue;
use crate::error::{UaError, UaResult};
use crate::status::StatusCode;
use crate::types::{AttributeId, NodeHandle, NodeId, QualifiedName};

/// A registered node.
pub struct Node {
    client: Client,
    handle: NodeHandle,
    node_id: NodeId,
    registered: bool,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("handle", &self.handle)
            .field("node_id", &self.node_id)
            .finish()
    }
}

fn single<T>(results: Vec<T>, what: &str) -> UaResult<T> {
    results
        .into_iter()
        .next()
        .ok_or_else(|| UaError::from_status(StatusCode::BAD_UNKNOWN_RESPONSE, what.to_string()))
}

impl Node {
    pub(crate) fn new(client: Client, handle: NodeHandle, node_id: NodeId) -> Self {
        Self {
            client,
            handle,
            node_id,
            registered: true,
        }
    }

    /// Worker-assigned handle.
    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    /// Node id.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Reads attributes; one result per attribute, in order.
    pub async fn read_attributes(&self, attributes: &[AttributeId]) -> UaResult<Vec<ReadResult>> {
        let handle = self.handle;
        let attributes = attributes.to_vec();
        self.client
            .request(|reply| Command::ReadAttributes {
                handle,
                attributes,
                index_range: None,
                reply,
            })
            .await
    }

    /// Reads one attribute.
    pub async fn read_attribute(&self, attribute: AttributeId) -> UaResult<AttributeValue> {
        let results = self.read_attributes(&[attribute]).await?;
        single(results, "read").map(|r| r.value)
    }

    /// Reads the elements of an array attribute in `range`, e.g. `"2:4"`.
    pub async fn read_attribute_range(
        &self,
        attribute: AttributeId,
        range: impl Into<String>,
    ) -> UaResult<ReadResult> {
        let handle = self.handle;
        let index_range = Some(range.into());
        let results = self
            .client
            .request(|reply| Command::ReadAttributes {
                handle,
                attributes: vec![attribute],
                index_range,
                reply,
            })
            .await?;
        single(results, "read range")
    }

    /// Writes one attribute.
    pub async fn write_attribute(
        &self,
        attribute: AttributeId,
        value: impl Into<DynamicValue>,
    ) -> UaResult<WriteResult> {
        let results = self
            .write_attributes(vec![WriteItem::new(attribute, value)])
            .await?;
        single(results, "write")
    }

    /// Writes the elements of an array attribute in `range`.
    pub async fn write_attribute_range(
        &self,
        attribute: AttributeId,
        range: impl Into<String>,
        value: impl Into<DynamicValue>,
    ) -> UaResult<WriteResult> {
        let item = WriteItem::new(attribute, value).index_range(range);
        let results = self.write_attributes(vec![item]).await?;
        single(results, "write range")
    }

    /// Writes attributes; one result per item, in order.
    ///
    /// # Errors
    ///
    /// Fails before sending if a value cannot be encoded as the attribute's
    /// type.
    pub async fn write_attributes(&self, items: Vec<WriteItem>) -> UaResult<Vec<WriteResult>> {
        let handle = self.handle;
        self.client
            .request(|reply| Command::WriteAttributes {
                handle,
                items,
                reply,
            })
            .await
    }

    /// Returns the last known value of an attribute without a round trip.
    pub async fn attribute(&self, attribute: AttributeId) -> UaResult<Option<AttributeValue>> {
        let handle = self.handle;
        self.client
            .request(|reply| Command::CachedAttribute {
                handle,
                attribute,
                reply,
            })
            .await
    }

    // =========================================================================
    // View and method
    // =========================================================================

    /// Browses references, following continuation points to the end.
    pub async fn browse(&self, options: BrowseOptions) -> UaResult<BrowseOutcome> {
        let handle = self.handle;
        self.client
            .request(|reply| Command::Browse {
                handle,
                options,
                reply,
            })
            .await
    }

    /// Calls a method with this node as the object.
    pub async fn call_method(&self, method_id: NodeId, inputs: Vec<DynamicValue>) -> UaResult<MethodResult> {
        let handle = self.handle;
        self.client
            .request(|reply| Command::CallMethod {
                handle,
                method_id,
                inputs,
                reply,
            })
            .await
    }

    /// Resolves a path of browse names below this node.
    pub async fn resolve_browse_path(&self, path: Vec<QualifiedName>) -> UaResult<BrowsePathOutcome> {
        let handle = self.handle;
        self.client
            .request(|reply| Command::ResolveBrowsePath {
                handle,
                path,
                reply,
            })
            .await
    }

    // =========================================================================
    // Monitoring
    // =========================================================================

    /// Starts monitoring an attribute.
    ///
    /// Values arrive as [`ClientEvent::DataChanged`] (or
    /// [`ClientEvent::EventReceived`] for `EventNotifier`).
    ///
    /// # Errors
    ///
    /// Fails with "already monitored" if the attribute is monitored or an
    /// enable for it is in flight.
    pub async fn enable_monitoring(
        &self,
        attribute: AttributeId,
        settings: MonitoringSettings,
    ) -> UaResult<MonitoringResult> {
        let handle = self.handle;
        let settings = Box::new(settings);
        self.client
            .request(|reply| Command::EnableMonitoring {
                handle,
                attribute,
                settings,
                reply,
            })
            .await
    }

    /// Stops monitoring an attribute; returns the server's status.
    pub async fn disable_monitoring(&self, attribute: AttributeId) -> UaResult<StatusCode> {
        let handle = self.handle;
        self.client
            .request(|reply| Command::DisableMonitoring {
                handle,
                attribute,
                reply,
            })
            .await
    }

    /// Changes one monitoring parameter.
    ///
    /// # Errors
    ///
    /// Fails with "not monitored", "type mismatch" or "not implemented"
    /// without changing anything.
    pub async fn modify_monitoring(
        &self,
        attribute: AttributeId,
        parameter: MonitoringParameter,
        value: impl Into<ParameterValue>,
    ) -> UaResult<MonitoringResult> {
        let handle = self.handle;
        let value = value.into();
        self.client
            .request(|reply| Command::ModifyMonitoring {
                handle,
                attribute,
                parameter,
                value,
                reply,
            })
            .await
    }

    /// Returns the current monitoring parameters, if monitored.
    pub async fn monitoring_state(&self, attribute: AttributeId) -> UaResult<Option<MonitoringState>> {
        let handle = self.handle;
        self.client
            .request(|reply| Command::MonitoringState {
                handle,
                attribute,
                reply,
            })
            .await
    }

    /// Subscribes to events concerning this node.
    pub fn events(&self) -> NodeEvents {
        NodeEvents {
            handle: self.handle,
            rx: self.client.events(),
        }
    }

    /// Unregisters the node and disables its monitored items.
    pub async fn unregister(mut self) -> UaResult<()> {
        self.registered = false;
        let handle = self.handle;
        self.client
            .request(|reply| Command::UnregisterNode {
                handle,
                reply: Some(reply),
            })
            .await
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if self.registered {
            self.client.post(Command::UnregisterNode {
                handle: self.handle,
                reply: None,
            });
        }
    }
}

// =============================================================================
// NodeEvents
// =============================================================================

/// Client events filtered to one node.
#[derive(Debug)]
pub struct NodeEvents {
    handle: NodeHandle,
    rx: broadcast::Receiver<ClientEvent>,
}

impl NodeEvents {
    /// Waits for the next event of this node.
    ///
    /// Returns `None` once the client is gone. Events lost to a slow
    /// receiver are skipped.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.handle() == Some(self.handle) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(handle = self.handle.0, skipped, "Node event receiver lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered event of this node, if any.
    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.handle() == Some(self.handle) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(handle = self.handle.0, skipped, "Node event receiver lagged");
                }
                Err(_) => return None,
            }
        }
    }
}
