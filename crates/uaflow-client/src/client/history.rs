// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Paginated raw history reads.
//!
//! A session covers a batch of nodes that share one time range. Each
//! [`read_more`](ClientCore::history_read_more) issues one HistoryRead with
//! the current per-node continuation points and folds the returned values
//! into the session:
//!
//! ```text
//! Reading ──read──► MoreDataAvailable ──read──► ... ──read──► Finished
//!                   (some token non-empty)                    (all empty)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, UaError, UaResult};
use crate::stack::services::{
    HistoryReadRequest, HistoryReadResponse, HistoryReadValueId, ReadRawDetails,
};
use crate::stack::{ServiceOutcome, Stack};
use crate::status::StatusCode;
use crate::types::{NodeId, TimestampsToReturn};

use super::engine::{send_reply, typed_response, ClientCore, Reply};
use super::events::AttributeValue;

/// Identifies a history session on a worker.
pub type HistorySessionId = u64;

// =============================================================================
// Request
// =============================================================================

/// A raw history read over a batch of nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryReadRawRequest {
    /// Nodes to read.
    pub nodes: Vec<NodeId>,
    /// Range start.
    pub start_time: DateTime<Utc>,
    /// Range end.
    pub end_time: DateTime<Utc>,
    /// Values per node and page; 0 means no limit.
    pub max_values_per_node: u32,
    /// Return bounding values.
    pub return_bounds: bool,
    /// Timestamps to return.
    pub timestamps: TimestampsToReturn,
    /// Resume from these points, one per node.
    pub continuation_points: Option<Vec<Vec<u8>>>,
}

impl HistoryReadRawRequest {
    /// Creates a request without a page limit.
    pub fn new(nodes: Vec<NodeId>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            nodes,
            start_time,
            end_time,
            max_values_per_node: 0,
            return_bounds: false,
            timestamps: TimestampsToReturn::Both,
            continuation_points: None,
        }
    }

    /// Limits the values returned per node and page.
    pub fn max_values_per_node(mut self, max: u32) -> Self {
        self.max_values_per_node = max;
        self
    }

    /// Requests bounding values.
    pub fn return_bounds(mut self, return_bounds: bool) -> Self {
        self.return_bounds = return_bounds;
        self
    }

    /// Sets the timestamps to return.
    pub fn timestamps(mut self, timestamps: TimestampsToReturn) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Resumes a previous read.
    pub fn continuation_points(mut self, points: Vec<Vec<u8>>) -> Self {
        self.continuation_points = Some(points);
        self
    }
}

// =============================================================================
// Session state
// =============================================================================

/// Pagination state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HistoryState {
    /// No page received yet.
    #[default]
    Reading,
    /// At least one node has more values.
    MoreDataAvailable,
    /// Every node is exhausted.
    Finished,
}

impl fmt::Display for HistoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reading => write!(f, "Reading"),
            Self::MoreDataAvailable => write!(f, "MoreDataAvailable"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

/// Values read so far for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryNodeResult {
    /// Node.
    pub node_id: NodeId,
    /// Status of the last page for this node.
    pub status: StatusCode,
    /// Values in server order.
    pub values: Vec<AttributeValue>,
    /// Continuation point; empty when exhausted.
    pub continuation_point: Vec<u8>,
}

/// Result of one `read_more`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    /// Service status.
    pub status: StatusCode,
    /// State after the page.
    pub state: HistoryState,
    /// Accumulated per-node results.
    pub results: Vec<HistoryNodeResult>,
}

#[derive(Debug)]
pub(crate) struct HistoryReadSession {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    max_values_per_node: u32,
    return_bounds: bool,
    timestamps: TimestampsToReturn,
    results: Vec<HistoryNodeResult>,
    status: StatusCode,
    state: HistoryState,
    pages: u32,
    in_flight: bool,
}

impl HistoryReadSession {
    fn has_tokens(&self) -> bool {
        self.results.iter().any(|r| !r.continuation_point.is_empty())
    }

    fn page(&self) -> HistoryPage {
        HistoryPage {
            status: self.status,
            state: self.state,
            results: self.results.clone(),
        }
    }

    fn value_ids(&self, only_with_tokens: bool) -> Vec<HistoryReadValueId> {
        self.results
            .iter()
            .filter(|r| !only_with_tokens || !r.continuation_point.is_empty())
            .map(|r| HistoryReadValueId {
                node_id: r.node_id.clone(),
                index_range: None,
                continuation_point: r.continuation_point.clone(),
            })
            .collect()
    }

    fn apply(&mut self, response: HistoryReadResponse) {
        let first_page = self.pages == 0;
        let mut returned = response.results.into_iter();
        // Later pages only carry the nodes that still had a token.
        let requested = self
            .results
            .iter_mut()
            .filter(|r| first_page || !r.continuation_point.is_empty());
        for node in requested {
            match returned.next() {
                Some(result) => {
                    // Nodes here are ids, not handles, so no DataType is cached.
                    let values = result
                        .data_values
                        .iter()
                        .map(|dv| AttributeValue::from_data_value(dv, None));
                    if first_page {
                        node.values = values.collect();
                    } else {
                        node.values.extend(values);
                    }
                    node.status = result.status;
                    node.continuation_point = if result.status.is_bad() {
                        Vec::new()
                    } else {
                        result.continuation_point
                    };
                }
                None => {
                    node.status = StatusCode::BAD_UNKNOWN_RESPONSE;
                    node.continuation_point.clear();
                }
            }
        }
        self.pages += 1;
        self.status = StatusCode::GOOD;
        self.state = if self.has_tokens() {
            HistoryState::MoreDataAvailable
        } else {
            HistoryState::Finished
        };
    }
}

// =============================================================================
// HistoryPaginator
// =============================================================================

/// History sessions of a connection.
#[derive(Debug, Default)]
pub(crate) struct HistoryPaginator {
    sessions: HashMap<HistorySessionId, HistoryReadSession>,
    next_id: HistorySessionId,
}

impl HistoryPaginator {
    /// Validates `request` and opens a session for it.
    pub fn start(&mut self, request: HistoryReadRawRequest) -> UaResult<HistorySessionId> {
        if request.nodes.is_empty() {
            return Err(UaError::from_status(StatusCode::BAD_NOTHING_TO_DO, "history read without nodes"));
        }
        let tokens = match request.continuation_points {
            Some(points) if points.len() != request.nodes.len() => {
                return Err(UaError::from_status(
                    StatusCode::BAD_INTERNAL_ERROR,
                    format!(
                        "{} continuation points for {} nodes",
                        points.len(),
                        request.nodes.len()
                    ),
                ));
            }
            Some(points) => points,
            None => vec![Vec::new(); request.nodes.len()],
        };

        let results = request
            .nodes
            .into_iter()
            .zip(tokens)
            .map(|(node_id, continuation_point)| HistoryNodeResult {
                node_id,
                status: StatusCode::GOOD,
                values: Vec::new(),
                continuation_point,
            })
            .collect();

        self.next_id += 1;
        let id = self.next_id;
        self.sessions.insert(
            id,
            HistoryReadSession {
                start_time: request.start_time,
                end_time: request.end_time,
                max_values_per_node: request.max_values_per_node,
                return_bounds: request.return_bounds,
                timestamps: request.timestamps,
                results,
                status: StatusCode::GOOD,
                state: HistoryState::Reading,
                pages: 0,
                in_flight: false,
            },
        );
        Ok(id)
    }

    pub fn state(&self, id: HistorySessionId) -> Option<HistoryState> {
        self.sessions.get(&id).map(|s| s.state)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Drops every session without contacting the server.
    pub fn clear(&mut self) {
        if !self.sessions.is_empty() {
            tracing::debug!(count = self.sessions.len(), "Dropping history sessions");
        }
        self.sessions.clear();
    }
}

fn unknown_session(id: HistorySessionId) -> UaError {
    ClientError::invalid_state(format!("history session {} does not exist", id)).into()
}

// =============================================================================
// Operations on the worker
// =============================================================================

impl<S: Stack> ClientCore<S> {
    pub(crate) fn history_start(&mut self, request: HistoryReadRawRequest) -> UaResult<HistorySessionId> {
        let nodes = request.nodes.len();
        let id = self.history.start(request)?;
        tracing::debug!(session = id, nodes, "History session started");
        Ok(id)
    }

    /// Reads the next page of a session.
    pub(crate) fn history_read_more(&mut self, id: HistorySessionId, reply: Reply<HistoryPage>) {
        let connected = self.is_connected();
        let Some(session) = self.history.sessions.get_mut(&id) else {
            return send_reply(reply, Err(unknown_session(id)));
        };
        if session.state == HistoryState::Finished || session.in_flight {
            let reason = if session.in_flight {
                "a read is already in flight".to_string()
            } else {
                format!("history session {} is finished", id)
            };
            return send_reply(reply, Err(ClientError::invalid_state(reason).into()));
        }
        if !connected {
            return send_reply(reply, Err(UaError::not_connected()));
        }

        session.in_flight = true;
        let request = HistoryReadRequest {
            details: ReadRawDetails {
                start_time: session.start_time,
                end_time: session.end_time,
                num_values_per_node: session.max_values_per_node,
                return_bounds: session.return_bounds,
            },
            timestamps_to_return: session.timestamps,
            release_continuation_points: false,
            nodes_to_read: session.value_ids(session.pages > 0),
        };
        tracing::debug!(session = id, page = session.pages + 1, "Reading history page");
        self.dispatch(request, move |core, outcome| {
            core.on_history_page(id, outcome, reply)
        });
    }

    fn on_history_page(&mut self, id: HistorySessionId, outcome: ServiceOutcome, reply: Reply<HistoryPage>) {
        let teardown = self.teardown_status;
        let Some(session) = self.history.sessions.get_mut(&id) else {
            return send_reply(reply, Err(unknown_session(id)));
        };
        session.in_flight = false;

        match typed_response::<HistoryReadResponse>(outcome) {
            Ok(response) => session.apply(response),
            Err(status) => {
                let status = teardown.unwrap_or(status);
                tracing::warn!(session = id, status = %status, "History read failed");
                session.status = status;
            }
        }
        tracing::debug!(session = id, state = %session.state, "History page processed");
        send_reply(reply, Ok(session.page()));
    }

    /// Releases the continuation points of a session and drops it.
    pub(crate) fn history_release(&mut self, id: HistorySessionId, reply: Option<Reply<StatusCode>>) {
        let Some(session) = self.history.sessions.remove(&id) else {
            if let Some(reply) = reply {
                send_reply(reply, Err(unknown_session(id)));
            }
            return;
        };

        if !session.has_tokens() || !self.is_connected() {
            tracing::debug!(session = id, "History session released locally");
            if let Some(reply) = reply {
                send_reply(reply, Ok(StatusCode::GOOD));
            }
            return;
        }

        let epoch = DateTime::<Utc>::from(UNIX_EPOCH);
        let request = HistoryReadRequest {
            details: ReadRawDetails {
                start_time: epoch,
                end_time: epoch,
                num_values_per_node: 0,
                return_bounds: false,
            },
            timestamps_to_return: session.timestamps,
            release_continuation_points: true,
            nodes_to_read: session.value_ids(true),
        };
        tracing::debug!(session = id, "Releasing history continuation points");
        self.dispatch(request, move |_core, outcome| {
            let status = match typed_response::<HistoryReadResponse>(outcome) {
                Ok(_) => StatusCode::GOOD,
                Err(status) => status,
            };
            if status.is_bad() {
                tracing::warn!(session = id, status = %status, "Releasing continuation points failed");
            }
            if let Some(reply) = reply {
                send_reply(reply, Ok(status));
            }
        });
    }

    pub(crate) fn history_state(&self, id: HistorySessionId) -> UaResult<HistoryState> {
        self.history.state(id).ok_or_else(|| unknown_session(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DataValue, DynamicValue, Variant};
    use crate::stack::services::HistoryReadResult;

    fn request(nodes: usize) -> HistoryReadRawRequest {
        let nodes = (0..nodes).map(|i| NodeId::numeric(2, i as u32 + 1)).collect();
        HistoryReadRawRequest::new(nodes, Utc::now(), Utc::now()).max_values_per_node(2)
    }

    fn page(values: &[i32], token: &[u8]) -> HistoryReadResult {
        HistoryReadResult {
            status: StatusCode::GOOD,
            continuation_point: token.to_vec(),
            data_values: values.iter().map(|v| DataValue::new(Variant::Int32(*v))).collect(),
        }
    }

    #[test]
    fn test_start_validation() {
        let mut paginator = HistoryPaginator::default();
        let empty = HistoryReadRawRequest::new(Vec::new(), Utc::now(), Utc::now());
        assert_eq!(
            paginator.start(empty).unwrap_err().status_code(),
            StatusCode::BAD_NOTHING_TO_DO
        );

        let mismatched = request(2).continuation_points(vec![vec![1]]);
        assert_eq!(
            paginator.start(mismatched).unwrap_err().status_code(),
            StatusCode::BAD_INTERNAL_ERROR
        );

        let id = paginator.start(request(2)).unwrap();
        assert_eq!(paginator.state(id), Some(HistoryState::Reading));
        assert_eq!(paginator.len(), 1);
    }

    #[test]
    fn test_pages_accumulate() {
        let mut paginator = HistoryPaginator::default();
        let id = paginator.start(request(1)).unwrap();
        let session = paginator.sessions.get_mut(&id).unwrap();

        session.apply(HistoryReadResponse {
            results: vec![page(&[1, 2], b"cp")],
        });
        assert_eq!(session.state, HistoryState::MoreDataAvailable);
        assert_eq!(session.value_ids(true).len(), 1);

        session.apply(HistoryReadResponse {
            results: vec![page(&[3], b"")],
        });
        assert_eq!(session.state, HistoryState::Finished);
        let values: Vec<_> = session.results[0].values.iter().map(|v| v.value.clone()).collect();
        assert_eq!(
            values,
            vec![DynamicValue::Int32(1), DynamicValue::Int32(2), DynamicValue::Int32(3)]
        );
    }

    #[test]
    fn test_missing_node_result() {
        let mut paginator = HistoryPaginator::default();
        let id = paginator.start(request(2)).unwrap();
        let session = paginator.sessions.get_mut(&id).unwrap();
        session.apply(HistoryReadResponse {
            results: vec![page(&[1], b"more")],
        });
        assert_eq!(session.results[1].status, StatusCode::BAD_UNKNOWN_RESPONSE);
        assert_eq!(session.state, HistoryState::MoreDataAvailable);
    }
}
