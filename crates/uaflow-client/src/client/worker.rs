// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The per-connection worker task.
//!
//! Application calls arrive as [`Command`]s on a bounded channel. Between
//! commands the worker drives the stack on a fixed tick while connected.
//! After every pass it runs a disconnect that a continuation may have
//! requested.

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::codec::DynamicValue;
use crate::error::UaResult;
use crate::stack::Stack;
use crate::status::StatusCode;
use crate::types::{AttributeId, EndpointDescriptor, NodeHandle, NodeId, QualifiedName};

use super::engine::{send_reply, ClientCore, Reply};
use super::events::AttributeValue;
use super::history::{HistoryPage, HistoryReadRawRequest, HistorySessionId, HistoryState};
use super::monitoring::{MonitoringParameter, MonitoringResult, MonitoringSettings, MonitoringState, ParameterValue};
use super::results::{
    BrowseOptions, BrowseOutcome, BrowsePathOutcome, MethodResult, NodeReadResult, ReadResult,
    WriteItem, WriteResult,
};
use super::session::ConnectionState;

/// A request to the worker.
#[derive(Debug)]
pub(crate) enum Command {
    Connect {
        endpoint: EndpointDescriptor,
        reply: Reply<()>,
    },
    Disconnect {
        reply: Reply<()>,
    },
    State {
        reply: Reply<ConnectionState>,
    },
    RegisterNode {
        node_id: NodeId,
        reply: Reply<NodeHandle>,
    },
    /// `reply` is `None` when sent from a drop.
    UnregisterNode {
        handle: NodeHandle,
        reply: Option<Reply<()>>,
    },
    CachedAttribute {
        handle: NodeHandle,
        attribute: AttributeId,
        reply: Reply<Option<AttributeValue>>,
    },
    ReadAttributes {
        handle: NodeHandle,
        attributes: Vec<AttributeId>,
        index_range: Option<String>,
        reply: Reply<Vec<ReadResult>>,
    },
    ReadMany {
        items: Vec<(NodeHandle, AttributeId)>,
        reply: Reply<Vec<NodeReadResult>>,
    },
    WriteAttributes {
        handle: NodeHandle,
        items: Vec<WriteItem>,
        reply: Reply<Vec<WriteResult>>,
    },
    Browse {
        handle: NodeHandle,
        options: BrowseOptions,
        reply: Reply<BrowseOutcome>,
    },
    CallMethod {
        handle: NodeHandle,
        method_id: NodeId,
        inputs: Vec<DynamicValue>,
        reply: Reply<MethodResult>,
    },
    ResolveBrowsePath {
        handle: NodeHandle,
        path: Vec<QualifiedName>,
        reply: Reply<BrowsePathOutcome>,
    },
    EnableMonitoring {
        handle: NodeHandle,
        attribute: AttributeId,
        settings: Box<MonitoringSettings>,
        reply: Reply<MonitoringResult>,
    },
    DisableMonitoring {
        handle: NodeHandle,
        attribute: AttributeId,
        reply: Reply<StatusCode>,
    },
    ModifyMonitoring {
        handle: NodeHandle,
        attribute: AttributeId,
        parameter: MonitoringParameter,
        value: ParameterValue,
        reply: Reply<MonitoringResult>,
    },
    MonitoringState {
        handle: NodeHandle,
        attribute: AttributeId,
        reply: Reply<Option<MonitoringState>>,
    },
    HistoryStart {
        request: HistoryReadRawRequest,
        reply: Reply<HistorySessionId>,
    },
    HistoryReadMore {
        id: HistorySessionId,
        reply: Reply<HistoryPage>,
    },
    HistoryState {
        id: HistorySessionId,
        reply: Reply<HistoryState>,
    },
    /// `reply` is `None` when sent from a drop.
    HistoryRelease {
        id: HistorySessionId,
        reply: Option<Reply<StatusCode>>,
    },
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::State { .. } => "state",
            Self::RegisterNode { .. } => "register_node",
            Self::UnregisterNode { .. } => "unregister_node",
            Self::CachedAttribute { .. } => "cached_attribute",
            Self::ReadAttributes { .. } => "read_attributes",
            Self::ReadMany { .. } => "read_many",
            Self::WriteAttributes { .. } => "write_attributes",
            Self::Browse { .. } => "browse",
            Self::CallMethod { .. } => "call_method",
            Self::ResolveBrowsePath { .. } => "resolve_browse_path",
            Self::EnableMonitoring { .. } => "enable_monitoring",
            Self::DisableMonitoring { .. } => "disable_monitoring",
            Self::ModifyMonitoring { .. } => "modify_monitoring",
            Self::MonitoringState { .. } => "monitoring_state",
            Self::HistoryStart { .. } => "history_start",
            Self::HistoryReadMore { .. } => "history_read_more",
            Self::HistoryState { .. } => "history_state",
            Self::HistoryRelease { .. } => "history_release",
        }
    }
}

/// Runs the worker until cancelled or every sender is gone.
pub(crate) async fn run<S: Stack>(
    mut core: ClientCore<S>,
    mut inbox: mpsc::Receiver<Command>,
    cancel: CancellationToken,
) {
    let max_wait = core.config.drive_max_wait;
    let mut tick = tokio::time::interval(core.config.drive_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut events = Vec::new();

    tracing::info!(
        stack = %core.stack.display_name(),
        drive_interval_ms = core.config.drive_interval.as_millis() as u64,
        "Client worker started"
    );

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::info!("Client worker cancelled");
                break;
            }

            command = inbox.recv() => match command {
                Some(command) => handle(&mut core, command).await,
                None => {
                    tracing::debug!("All client handles dropped");
                    break;
                }
            },

            _ = tick.tick(), if core.is_connected() => {
                core.drive_once(max_wait, &mut events).await;
            }
        }

        core.run_deferred().await;
    }

    core.disconnect().await;
    tracing::info!(
        stats = ?core.stats.snapshot(),
        interval_floor_ms = core.subscriptions.floor_ms(),
        "Client worker stopped"
    );
}

async fn handle<S: Stack>(core: &mut ClientCore<S>, command: Command) {
    tracing::trace!(command = command.name(), "Handling command");
    match command {
        Command::Connect { endpoint, reply } => {
            let result = core.connect(&endpoint).await;
            send_reply(reply, result);
        }
        Command::Disconnect { reply } => {
            core.disconnect().await;
            send_reply(reply, Ok(()));
        }
        Command::State { reply } => send_reply(reply, Ok(core.state)),
        Command::RegisterNode { node_id, reply } => {
            send_reply(reply, Ok(core.register_node(node_id)));
        }
        Command::UnregisterNode { handle, reply } => {
            let result = core.unregister_node(handle);
            match reply {
                Some(reply) => send_reply(reply, result),
                None => log_unreplied("unregister node", result),
            }
        }
        Command::CachedAttribute {
            handle,
            attribute,
            reply,
        } => send_reply(reply, core.cached_attribute(handle, attribute)),
        Command::ReadAttributes {
            handle,
            attributes,
            index_range,
            reply,
        } => core.read_attributes(handle, attributes, index_range, reply),
        Command::ReadMany { items, reply } => core.read_many(items, reply),
        Command::WriteAttributes {
            handle,
            items,
            reply,
        } => core.write_attributes(handle, items, reply),
        Command::Browse {
            handle,
            options,
            reply,
        } => core.browse(handle, options, reply),
        Command::CallMethod {
            handle,
            method_id,
            inputs,
            reply,
        } => core.call_method(handle, method_id, inputs, reply),
        Command::ResolveBrowsePath {
            handle,
            path,
            reply,
        } => core.resolve_browse_path(handle, path, reply),
        Command::EnableMonitoring {
            handle,
            attribute,
            settings,
            reply,
        } => core.enable_monitoring(handle, attribute, *settings, reply),
        Command::DisableMonitoring {
            handle,
            attribute,
            reply,
        } => match core.check_node(handle) {
            Ok(_) => core.disable_monitoring(handle, attribute, Some(reply)),
            Err(error) => send_reply(reply, Err(error)),
        },
        Command::ModifyMonitoring {
            handle,
            attribute,
            parameter,
            value,
            reply,
        } => core.modify_monitoring(handle, attribute, parameter, value, reply),
        Command::MonitoringState {
            handle,
            attribute,
            reply,
        } => {
            let result = core
                .check_node(handle)
                .map(|_| core.monitoring_state(handle, attribute));
            send_reply(reply, result);
        }
        Command::HistoryStart { request, reply } => send_reply(reply, core.history_start(request)),
        Command::HistoryReadMore { id, reply } => core.history_read_more(id, reply),
        Command::HistoryState { id, reply } => send_reply(reply, core.history_state(id)),
        Command::HistoryRelease { id, reply } => core.history_release(id, reply),
    }
}

fn log_unreplied(context: &str, result: UaResult<()>) {
    if let Err(error) = result {
        error.log(context);
    }
}
