// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The client runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  Command (mpsc)   ┌───────────────────────────────────┐
//! │ Client, Node │ ────────────────► │ worker task                       │
//! │ HistoryReader│ ◄──────────────── │  ClientCore                       │
//! └──────────────┘  reply (oneshot)  │   ├─ Correlator (pending requests)│
//!        ▲                           │   ├─ SubscriptionManager          │
//!        │ ClientEvent (broadcast)   │   ├─ MonitoringRegistry           │
//!        └────────────────────────── │   ├─ HistoryPaginator             │
//!                                    │   └─ Stack                        │
//!                                    └───────────────────────────────────┘
//! ```
//!
//! All protocol state lives on one worker task per connection, so none of
//! it is locked. Application handles are cheap to clone and only talk to
//! the worker through channels.
//!
//! # Example
//!
//! ```rust,ignore
//! use uaflow_client::prelude::*;
//!
//! let client = ClientBuilder::new(stack).config(config).spawn()?;
//! client.connect(EndpointDescriptor::new("opc.tcp://localhost:4840")).await?;
//!
//! let node = client.node("ns=2;s=Boiler.Temperature".parse()?).await?;
//! let results = node.read_attributes(&[AttributeId::Value]).await?;
//! ```

mod correlator;
mod engine;
mod events;
mod history;
mod monitoring;
mod operations;
mod results;
mod session;
mod stats;
mod subscription;
mod worker;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{UaError, UaResult};
use crate::logging::LogSink;
use crate::node::Node;
use crate::stack::Stack;
use crate::status::StatusCode;
use crate::types::{AttributeId, EndpointDescriptor, NodeId};

use self::engine::{ClientCore, Reply};
pub(crate) use self::worker::Command;

pub use self::correlator::{Correlator, PendingRequest, PendingTable, Rejected};
pub use self::events::{AttributeValue, ClientEvent};
pub use self::history::{
    HistoryNodeResult, HistoryPage, HistoryReadRawRequest, HistorySessionId, HistoryState,
};
pub use self::monitoring::{
    MonitoredItem, MonitoringParameter, MonitoringResult, MonitoringSettings, MonitoringState,
    ParameterValue,
};
pub use self::results::{
    BrowseOptions, BrowseOutcome, BrowsePathOutcome, MethodResult, NodeReadResult, ReadResult,
    WriteItem, WriteResult,
};
pub use self::session::ConnectionState;
pub use self::stats::{ClientStats, ClientStatsSnapshot};
pub use self::subscription::{Subscription, SubscriptionType};

// =============================================================================
// ClientBuilder
// =============================================================================

/// Configures and spawns a [`Client`].
pub struct ClientBuilder<S: Stack> {
    stack: S,
    config: ClientConfig,
    log_sink: Option<LogSink>,
}

impl<S: Stack> ClientBuilder<S> {
    /// Starts a builder around a protocol stack.
    pub fn new(stack: S) -> Self {
        Self {
            stack,
            config: ClientConfig::default(),
            log_sink: None,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Routes the worker's log output to `sink` instead of the global
    /// subscriber.
    pub fn log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Validates the configuration and spawns the worker.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if validation fails.
    pub fn spawn(self) -> UaResult<Client> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let (tx, rx) = mpsc::channel(config.command_queue_capacity);
        let (events, _) = broadcast::channel(config.event_channel_capacity);
        let stats = Arc::new(ClientStats::new());
        let cancel = CancellationToken::new();

        let core = ClientCore::new(self.stack, config.clone(), events.clone(), stats.clone());
        let worker = worker::run(core, rx, cancel.clone());
        let task = match &self.log_sink {
            Some(sink) => tokio::spawn(sink.attach(worker)),
            None => tokio::spawn(worker),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                tx,
                events,
                stats,
                cancel,
                config,
                task: Mutex::new(Some(task)),
            }),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

struct ClientInner {
    tx: mpsc::Sender<Command>,
    events: broadcast::Sender<ClientEvent>,
    stats: Arc<ClientStats>,
    cancel: CancellationToken,
    config: Arc<ClientConfig>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a client connection.
///
/// Cloning is cheap; all clones talk to the same worker. The worker stops
/// when [`shutdown`](Self::shutdown) is called or every handle, including
/// [`Node`]s and [`HistoryReader`]s, is dropped.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Starts a builder around `stack`.
    pub fn builder<S: Stack>(stack: S) -> ClientBuilder<S> {
        ClientBuilder::new(stack)
    }

    /// Sends a command and waits for its reply.
    pub(crate) async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> UaResult<T> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .tx
            .send(command(reply))
            .await
            .map_err(|_| UaError::worker_stopped())?;
        rx.await.map_err(|_| UaError::worker_stopped())?
    }

    /// Sends a command without waiting; used from `Drop`.
    ///
    /// A full inbox hands the command to a spawned send instead of losing it.
    pub(crate) fn post(&self, command: Command) {
        let command = match self.inner.tx.try_send(command) {
            Ok(()) => return,
            Err(mpsc::error::TrySendError::Closed(command)) => {
                tracing::debug!(command = command.name(), "Worker stopped; posted command dropped");
                return;
            }
            Err(mpsc::error::TrySendError::Full(command)) => command,
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let tx = self.inner.tx.clone();
                runtime.spawn(async move {
                    if let Err(error) = tx.send(command).await {
                        tracing::debug!(command = error.0.name(), "Worker stopped before posted command arrived");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    command = command.name(),
                    "Worker inbox full outside a runtime; posted command dropped"
                );
            }
        }
    }

    /// Opens the connection.
    ///
    /// # Errors
    ///
    /// Fails if already connected or if the stack reports a bad status.
    pub async fn connect(&self, endpoint: EndpointDescriptor) -> UaResult<()> {
        self.request(|reply| Command::Connect { endpoint, reply }).await
    }

    /// Closes the connection.
    ///
    /// Pending requests resolve with `BadConnectionClosed` and every
    /// monitored item reports `MonitoringDisabled`.
    pub async fn disconnect(&self) -> UaResult<()> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Returns the connection state.
    pub async fn state(&self) -> UaResult<ConnectionState> {
        self.request(|reply| Command::State { reply }).await
    }

    /// Registers a node and returns its façade.
    pub async fn node(&self, node_id: NodeId) -> UaResult<Node> {
        let handle = self
            .request(|reply| Command::RegisterNode {
                node_id: node_id.clone(),
                reply,
            })
            .await?;
        Ok(Node::new(self.clone(), handle, node_id))
    }

    /// Reads attributes of several nodes in one request.
    ///
    /// Produces one result per item, in order.
    pub async fn read_node_attributes(&self, items: &[(&Node, AttributeId)]) -> UaResult<Vec<NodeReadResult>> {
        let items = items
            .iter()
            .map(|(node, attribute)| (node.handle(), *attribute))
            .collect();
        self.request(|reply| Command::ReadMany { items, reply }).await
    }

    /// Starts a paginated raw history read.
    ///
    /// # Errors
    ///
    /// Fails with `BadNothingToDo` for an empty node list and with
    /// `BadInternalError` if the continuation points do not match the nodes.
    pub async fn history_read_raw(&self, request: HistoryReadRawRequest) -> UaResult<HistoryReader> {
        let id = self
            .request(|reply| Command::HistoryStart { request, reply })
            .await?;
        Ok(HistoryReader {
            id,
            client: self.clone(),
            released: false,
        })
    }

    /// Subscribes to all client events.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Returns a snapshot of the client counters.
    pub fn stats(&self) -> ClientStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Returns the configuration the worker runs with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns `true` while the worker task is alive.
    pub fn is_running(&self) -> bool {
        !self.inner.tx.is_closed()
    }

    /// Stops the worker after a full teardown and waits for it to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            if let Err(error) = task.await {
                tracing::error!(error = %error, "Client worker panicked");
            }
        }
    }
}

// =============================================================================
// HistoryReader
// =============================================================================

/// A paginated history read.
///
/// Dropping the reader releases its continuation points on the server.
#[derive(Debug)]
pub struct HistoryReader {
    id: HistorySessionId,
    client: Client,
    released: bool,
}

impl HistoryReader {
    /// Session id.
    pub fn id(&self) -> HistorySessionId {
        self.id
    }

    /// Reads the next page and returns the accumulated results.
    ///
    /// # Errors
    ///
    /// Fails with "invalid state" once the read is finished or while
    /// another page is in flight.
    pub async fn read_more(&self) -> UaResult<HistoryPage> {
        let id = self.id;
        self.client
            .request(|reply| Command::HistoryReadMore { id, reply })
            .await
    }

    /// Returns the pagination state.
    pub async fn state(&self) -> UaResult<HistoryState> {
        let id = self.id;
        self.client
            .request(|reply| Command::HistoryState { id, reply })
            .await
    }

    /// Releases outstanding continuation points and ends the session.
    pub async fn release(mut self) -> UaResult<StatusCode> {
        self.released = true;
        let id = self.id;
        self.client
            .request(|reply| Command::HistoryRelease {
                id,
                reply: Some(reply),
            })
            .await
    }
}

impl Drop for HistoryReader {
    fn drop(&mut self) {
        if !self.released {
            self.client.post(Command::HistoryRelease {
                id: self.id,
                reply: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeHandle;

    fn detached_client(capacity: usize) -> (Client, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (events, _) = broadcast::channel(8);
        let client = Client {
            inner: Arc::new(ClientInner {
                tx,
                events,
                stats: Arc::new(ClientStats::new()),
                cancel: CancellationToken::new(),
                config: Arc::new(ClientConfig::default()),
                task: Mutex::new(None),
            }),
        };
        (client, rx)
    }

    fn unregister(handle: u32) -> Command {
        Command::UnregisterNode {
            handle: NodeHandle(handle),
            reply: None,
        }
    }

    #[tokio::test]
    async fn test_post_survives_full_inbox() {
        let (client, mut rx) = detached_client(1);
        client.post(unregister(1));
        client.post(unregister(2));

        let mut handles = Vec::new();
        for _ in 0..2 {
            match rx.recv().await {
                Some(Command::UnregisterNode { handle, .. }) => handles.push(handle.0),
                other => panic!("unexpected command {other:?}"),
            }
        }
        assert_eq!(handles, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_post_after_worker_stopped() {
        let (client, rx) = detached_client(1);
        drop(rx);
        client.post(unregister(1));
        assert!(!client.is_running());
    }
}
