// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Results of node operations.
//!
//! Every dispatched operation resolves to one of these. Each carries a
//! [`StatusCode`] that callers must check; data is present only when the
//! status allows it.

use crate::codec::{DynamicValue, WireType};
use crate::stack::services::{BrowsePathTarget, ReferenceDescription};
use crate::status::StatusCode;
use crate::types::{reference_types, AttributeId, BrowseDirection, NodeHandle, NodeId};

use super::events::AttributeValue;

/// One attribute read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    /// Attribute.
    pub attribute: AttributeId,
    /// Value with per-attribute status.
    pub value: AttributeValue,
}

/// One attribute read across nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReadResult {
    /// Node.
    pub handle: NodeHandle,
    /// Attribute.
    pub attribute: AttributeId,
    /// Value with per-attribute status.
    pub value: AttributeValue,
}

/// One attribute to write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteItem {
    /// Attribute.
    pub attribute: AttributeId,
    /// Value.
    pub value: DynamicValue,
    /// Optional index range.
    pub index_range: Option<String>,
    /// Wire type to encode as; inferred when absent.
    pub hint: Option<WireType>,
}

impl WriteItem {
    /// Writes `value` to `attribute`.
    pub fn new(attribute: AttributeId, value: impl Into<DynamicValue>) -> Self {
        Self {
            attribute,
            value: value.into(),
            index_range: None,
            hint: None,
        }
    }

    /// Writes only the elements in `range`.
    pub fn index_range(mut self, range: impl Into<String>) -> Self {
        self.index_range = Some(range.into());
        self
    }

    /// Encodes as `hint`.
    pub fn hint(mut self, hint: WireType) -> Self {
        self.hint = Some(hint);
        self
    }
}

/// One attribute write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    /// Attribute.
    pub attribute: AttributeId,
    /// Server status.
    pub status: StatusCode,
}

/// What to follow when browsing.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseOptions {
    /// Direction.
    pub direction: BrowseDirection,
    /// Reference type.
    pub reference_type: NodeId,
    /// Follow subtypes of the reference type.
    pub include_subtypes: bool,
    /// Node class mask; 0 returns all.
    pub node_class_mask: u32,
    /// References per response; 0 lets the server decide.
    pub max_references_per_node: u32,
}

impl Default for BrowseOptions {
    fn default() -> Self {
        Self {
            direction: BrowseDirection::Forward,
            reference_type: reference_types::HIERARCHICAL_REFERENCES,
            include_subtypes: true,
            node_class_mask: 0,
            max_references_per_node: 0,
        }
    }
}

impl BrowseOptions {
    /// Follows `reference_type` and its subtypes.
    pub fn reference_type(mut self, reference_type: NodeId) -> Self {
        self.reference_type = reference_type;
        self
    }

    /// Sets the direction.
    pub fn direction(mut self, direction: BrowseDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Limits references per response; the rest is fetched with BrowseNext.
    pub fn max_references_per_node(mut self, max: u32) -> Self {
        self.max_references_per_node = max;
        self
    }
}

/// All references of a browse, across continuation points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseOutcome {
    /// Status of the last Browse or BrowseNext.
    pub status: StatusCode,
    /// References in server order.
    pub references: Vec<ReferenceDescription>,
}

/// Result of a method call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodResult {
    /// Status.
    pub status: StatusCode,
    /// Per-input-argument status.
    pub input_argument_results: Vec<StatusCode>,
    /// Decoded output arguments.
    pub outputs: Vec<DynamicValue>,
}

/// Result of a browse path translation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowsePathOutcome {
    /// Status.
    pub status: StatusCode,
    /// Targets.
    pub targets: Vec<BrowsePathTarget>,
}

impl BrowsePathOutcome {
    /// Returns the first fully resolved target.
    pub fn node_id(&self) -> Option<&NodeId> {
        self.targets
            .iter()
            .find(|t| t.remaining_path_index == u32::MAX)
            .map(|t| &t.target_id.node_id)
    }
}
