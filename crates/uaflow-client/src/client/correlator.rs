// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Request correlation.
//!
//! Every dispatched request leaves a [`PendingRequest`] behind, keyed by the
//! id the stack returned. The matching completion removes it exactly once;
//! teardown removes whatever is left via [`Correlator::drain`].
//!
//! Entries live in a generation-checked arena. A stale index entry (slot
//! reused by a later request) never resolves the wrong continuation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::stack::{RequestId, ServiceKind, ServiceRequest, Stack};
use crate::status::StatusCode;

use super::stats::ClientStats;

// =============================================================================
// PendingRequest
// =============================================================================

/// A dispatched request awaiting its completion.
#[derive(Debug)]
pub struct PendingRequest<C> {
    /// Stack-assigned id.
    pub request_id: RequestId,
    /// Service.
    pub kind: ServiceKind,
    /// When the request was dispatched.
    pub dispatched_at: Instant,
    /// Dispatch order.
    pub sequence: u64,
    /// What to run on completion.
    pub continuation: C,
}

// =============================================================================
// PendingTable
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotKey {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Slot<C> {
    generation: u32,
    entry: Option<PendingRequest<C>>,
}

/// Arena of pending requests indexed by request id.
#[derive(Debug)]
pub struct PendingTable<C> {
    slots: Vec<Slot<C>>,
    free: Vec<usize>,
    index: HashMap<RequestId, SlotKey>,
    next_sequence: u64,
}

impl<C> Default for PendingTable<C> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            next_sequence: 0,
        }
    }
}

impl<C> PendingTable<C> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a continuation under `request_id`.
    ///
    /// Returns the continuation back if the id is already live.
    pub fn insert(&mut self, request_id: RequestId, kind: ServiceKind, continuation: C) -> Result<u64, C> {
        if self.index.contains_key(&request_id) {
            return Err(continuation);
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let entry = PendingRequest {
            request_id,
            kind,
            dispatched_at: Instant::now(),
            sequence,
            continuation,
        };

        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.entry = Some(entry);
                SlotKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                SlotKey {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        };
        self.index.insert(request_id, key);
        Ok(sequence)
    }

    /// Removes and returns the request stored under `request_id`.
    pub fn remove(&mut self, request_id: RequestId) -> Option<PendingRequest<C>> {
        let key = self.index.remove(&request_id)?;
        let slot = self.slots.get_mut(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        Some(entry)
    }

    /// Returns `true` if `request_id` is pending.
    pub fn contains(&self, request_id: RequestId) -> bool {
        self.index.contains_key(&request_id)
    }

    /// Returns the number of pending requests.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Removes every pending request, oldest first.
    pub fn drain(&mut self) -> Vec<PendingRequest<C>> {
        let mut drained: Vec<_> = self
            .slots
            .iter_mut()
            .filter_map(|slot| {
                let entry = slot.entry.take()?;
                slot.generation = slot.generation.wrapping_add(1);
                Some(entry)
            })
            .collect();
        self.index.clear();
        self.free = (0..self.slots.len()).collect();
        drained.sort_by_key(|p| p.sequence);
        drained
    }
}

// =============================================================================
// Correlator
// =============================================================================

/// A request the stack refused; the continuation is handed back unrun.
#[derive(Debug)]
pub struct Rejected<C> {
    /// Service.
    pub kind: ServiceKind,
    /// Why dispatch failed.
    pub status: StatusCode,
    /// The continuation, to be invoked with `status`.
    pub continuation: C,
}

/// Issues requests through the stack and matches completions to them.
#[derive(Debug)]
pub struct Correlator<C> {
    table: PendingTable<C>,
    stats: Arc<ClientStats>,
}

impl<C> Correlator<C> {
    /// Creates a correlator recording into `stats`.
    pub fn new(stats: Arc<ClientStats>) -> Self {
        Self {
            table: PendingTable::new(),
            stats,
        }
    }

    /// Submits `request` and stores `continuation` under the returned id.
    ///
    /// # Errors
    ///
    /// Returns the continuation inside [`Rejected`] if the stack refused the
    /// call, or `BadInternalError` if the stack returned an id that is
    /// already pending. The existing entry is kept in that case.
    pub fn dispatch<S: Stack + ?Sized>(
        &mut self,
        stack: &mut S,
        request: ServiceRequest,
        continuation: C,
    ) -> Result<RequestId, Rejected<C>> {
        let kind = request.kind();
        let request_id = match stack.service_call(request) {
            Ok(id) => id,
            Err(status) => {
                self.stats.record_rejected();
                tracing::debug!(service = %kind, status = %status, "Dispatch rejected by stack");
                return Err(Rejected {
                    kind,
                    status,
                    continuation,
                });
            }
        };

        match self.table.insert(request_id, kind, continuation) {
            Ok(sequence) => {
                self.stats.record_dispatched();
                tracing::debug!(service = %kind, request_id, sequence, "Request dispatched");
                Ok(request_id)
            }
            Err(continuation) => {
                self.stats.record_rejected();
                tracing::warn!(service = %kind, request_id, "Stack returned a request id that is already pending");
                Err(Rejected {
                    kind,
                    status: StatusCode::BAD_INTERNAL_ERROR,
                    continuation,
                })
            }
        }
    }

    /// Removes the request matching a completion.
    ///
    /// Unknown ids are logged, counted and dropped.
    pub fn complete(&mut self, request_id: RequestId) -> Option<PendingRequest<C>> {
        match self.table.remove(request_id) {
            Some(pending) => {
                self.stats.record_completed();
                tracing::trace!(
                    service = %pending.kind,
                    request_id,
                    elapsed_ms = pending.dispatched_at.elapsed().as_millis() as u64,
                    "Request completed"
                );
                Some(pending)
            }
            None => {
                self.stats.record_completion_dropped();
                tracing::warn!(request_id, "Dropping completion for unknown request");
                None
            }
        }
    }

    /// Removes every pending request in dispatch order.
    pub fn drain(&mut self) -> Vec<PendingRequest<C>> {
        let drained = self.table.drain();
        if !drained.is_empty() {
            self.stats.record_drained(drained.len());
            tracing::warn!(count = drained.len(), "Draining pending requests");
        }
        drained
    }

    /// Returns `true` if `request_id` is pending.
    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.table.contains(request_id)
    }

    /// Returns the number of pending requests.
    pub fn pending_count(&self) -> usize {
        self.table.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::stack::services::DeleteSubscriptionsRequest;
    use crate::stack::StackEvent;
    use crate::types::EndpointDescriptor;

    struct ScriptedStack {
        ids: Vec<Result<RequestId, StatusCode>>,
    }

    #[async_trait]
    impl Stack for ScriptedStack {
        async fn connect(&mut self, _endpoint: &EndpointDescriptor) -> StatusCode {
            StatusCode::GOOD
        }

        async fn disconnect(&mut self) {}

        fn service_call(&mut self, _request: ServiceRequest) -> Result<RequestId, StatusCode> {
            self.ids.remove(0)
        }

        async fn drive(&mut self, _max_wait: Duration, _events: &mut Vec<StackEvent>) -> StatusCode {
            StatusCode::GOOD
        }
    }

    fn request() -> ServiceRequest {
        DeleteSubscriptionsRequest {
            subscription_ids: vec![1],
        }
        .into()
    }

    #[test]
    fn test_table_generations() {
        let mut table = PendingTable::new();
        table.insert(10, ServiceKind::Read, "a").unwrap();
        assert_eq!(table.insert(10, ServiceKind::Read, "dup"), Err("dup"));

        let first = table.remove(10).unwrap();
        assert_eq!(first.continuation, "a");
        assert!(table.remove(10).is_none());

        // Slot is reused under a new generation.
        table.insert(11, ServiceKind::Write, "b").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.remove(11).unwrap().continuation, "b");
        assert!(table.is_empty());
    }

    #[test]
    fn test_drain_in_dispatch_order() {
        let mut table = PendingTable::new();
        for (id, name) in [(5, "x"), (1, "y"), (9, "z")] {
            table.insert(id, ServiceKind::Read, name).unwrap();
        }
        table.remove(1);
        table.insert(2, ServiceKind::Read, "w").unwrap();

        let order: Vec<_> = table.drain().into_iter().map(|p| p.continuation).collect();
        assert_eq!(order, vec!["x", "z", "w"]);
        assert!(table.is_empty());
        assert!(table.remove(5).is_none());
    }

    #[test]
    fn test_rejected_dispatch_never_pending() {
        let stats = Arc::new(ClientStats::new());
        let mut correlator = Correlator::new(stats.clone());
        let mut stack = ScriptedStack {
            ids: vec![Err(StatusCode::BAD_TOO_MANY_OPERATIONS)],
        };

        let rejected = correlator.dispatch(&mut stack, request(), 7u8).unwrap_err();
        assert_eq!(rejected.status, StatusCode::BAD_TOO_MANY_OPERATIONS);
        assert_eq!(rejected.continuation, 7);
        assert_eq!(correlator.pending_count(), 0);
        assert_eq!(stats.snapshot().requests_rejected, 1);
    }

    #[test]
    fn test_duplicate_id_keeps_existing() {
        let stats = Arc::new(ClientStats::new());
        let mut correlator = Correlator::new(stats);
        let mut stack = ScriptedStack {
            ids: vec![Ok(3), Ok(3)],
        };

        assert_eq!(correlator.dispatch(&mut stack, request(), 'a').unwrap(), 3);
        let rejected = correlator.dispatch(&mut stack, request(), 'b').unwrap_err();
        assert_eq!(rejected.status, StatusCode::BAD_INTERNAL_ERROR);
        assert_eq!(rejected.continuation, 'b');
        assert_eq!(correlator.complete(3).unwrap().continuation, 'a');
    }

    #[test]
    fn test_unknown_completion_dropped() {
        let stats = Arc::new(ClientStats::new());
        let mut correlator: Correlator<()> = Correlator::new(stats.clone());
        assert!(correlator.complete(42).is_none());
        assert_eq!(stats.snapshot().completions_dropped, 1);
    }
}
