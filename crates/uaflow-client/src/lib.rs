// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client runtime.
//!
//! This crate sits on top of a protocol stack (secure channel, session,
//! PDU framing) and turns its asynchronous request/response primitives into
//! a node-oriented client API.
//!
//! # Features
//!
//! - Request correlation with per-request continuations
//! - Attribute read, write, browse, method call and browse path translation
//! - Shared and exclusive subscriptions with a monotonic publishing-interval floor
//! - Monitored items for data changes and events, with live parameter changes
//! - Paginated raw history reads with continuation-point release
//! - A lossless value codec between wire variants and [`codec::DynamicValue`]
//!
//! # Error Handling
//!
//! ```text
//! UaError
//! ├── Client        - Local misuse: unknown handle, already monitored, ...
//! ├── Protocol      - Server status codes from dispatched services
//! ├── Transport     - Stack and connection failures
//! ├── Codec         - Value conversion failures
//! └── Configuration - Invalid settings
//! ```
//!
//! Local failures are returned as `Err`. Dispatched operations return `Ok`
//! with a result that carries the server's [`StatusCode`].
//!
//! # Example
//!
//! ```rust,ignore
//! use uaflow_client::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> UaResult<()> {
//!     let client = Client::builder(my_stack()).spawn()?;
//!     client.connect(EndpointDescriptor::new("opc.tcp://localhost:4840")).await?;
//!
//!     let node = client.node("ns=2;s=Pump.Speed".parse()?).await?;
//!     node.enable_monitoring(AttributeId::Value, MonitoringSettings::new()).await?;
//!
//!     let mut events = node.events();
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod stack;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use error::{
    ClientError, CodecError, ConfigurationError, ErrorSeverity, ProtocolError, TransportError,
    UaError, UaResult,
};

pub use status::{StatusCode, StatusSeverity};

pub use types::{
    AttributeId, BrowseDirection, EndpointDescriptor, MonitoringMode, NodeClass, NodeHandle,
    NodeId, QualifiedName, SecurityMode, SecurityPolicy, UserIdentity,
};

pub use config::{ClientConfig, ClientConfigBuilder};

pub use client::{
    Client, ClientBuilder, ClientEvent, ClientStatsSnapshot, ConnectionState, HistoryReader,
    MonitoringParameter, MonitoringResult, MonitoringSettings, SubscriptionType,
};

pub use node::{Node, NodeEvents};

pub use stack::{Stack, StackEvent, StackState};

/// Everything an application typically needs.
pub mod prelude {
    pub use crate::client::{
        AttributeValue, BrowseOptions, Client, ClientBuilder, ClientEvent, HistoryReadRawRequest,
        HistoryReader, HistoryState, MonitoringParameter, MonitoringSettings, SubscriptionType,
        WriteItem,
    };
    pub use crate::codec::{DynamicValue, WireType};
    pub use crate::config::ClientConfig;
    pub use crate::error::{UaError, UaResult};
    pub use crate::node::{Node, NodeEvents};
    pub use crate::stack::Stack;
    pub use crate::status::StatusCode;
    pub use crate::types::{AttributeId, EndpointDescriptor, NodeId};
}
