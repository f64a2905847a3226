// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Attribute, view and method services on registered nodes.

use crate::codec::{self, DataValue, DynamicValue, WireType};
use crate::error::{UaError, UaResult};
use crate::stack::services::{
    BrowseDescription, BrowseNextRequest, BrowseNextResponse, BrowsePath, BrowseRequest,
    BrowseResponse, BrowseResult, CallMethodRequest, CallRequest, CallResponse, ReadRequest,
    ReadResponse, ReadValueId, RelativePathElement, TranslateBrowsePathsRequest,
    TranslateBrowsePathsResponse, WriteRequest, WriteResponse, WriteValue,
};
use crate::stack::Stack;
use crate::status::StatusCode;
use crate::types::{AttributeId, NodeHandle, NodeId, QualifiedName, TimestampsToReturn};

use super::engine::{send_reply, typed_response, ClientCore, Reply};
use super::events::AttributeValue;
use super::results::{
    BrowseOptions, BrowseOutcome, BrowsePathOutcome, MethodResult, NodeReadResult, ReadResult,
    WriteItem, WriteResult,
};

/// Result field mask requesting every reference field.
const BROWSE_RESULT_MASK_ALL: u32 = 0x3F;

/// Wire type an attribute is always encoded as, if fixed.
fn attribute_wire_type(attribute: AttributeId) -> Option<WireType> {
    match attribute {
        AttributeId::NodeId | AttributeId::DataType => Some(WireType::NodeId),
        AttributeId::NodeClass | AttributeId::ValueRank => Some(WireType::Int32),
        AttributeId::BrowseName => Some(WireType::QualifiedName),
        AttributeId::DisplayName | AttributeId::Description | AttributeId::InverseName => {
            Some(WireType::LocalizedText)
        }
        AttributeId::WriteMask
        | AttributeId::UserWriteMask
        | AttributeId::ArrayDimensions
        | AttributeId::AccessRestrictions
        | AttributeId::AccessLevelEx => Some(WireType::UInt32),
        AttributeId::IsAbstract
        | AttributeId::Symmetric
        | AttributeId::ContainsNoLoops
        | AttributeId::Historizing
        | AttributeId::Executable
        | AttributeId::UserExecutable => Some(WireType::Boolean),
        AttributeId::EventNotifier | AttributeId::AccessLevel | AttributeId::UserAccessLevel => {
            Some(WireType::Byte)
        }
        AttributeId::MinimumSamplingInterval => Some(WireType::Double),
        AttributeId::Value
        | AttributeId::DataTypeDefinition
        | AttributeId::RolePermissions
        | AttributeId::UserRolePermissions => None,
    }
}

impl<S: Stack> ClientCore<S> {
    // =========================================================================
    // Registration
    // =========================================================================

    pub(crate) fn register_node(&mut self, node_id: NodeId) -> NodeHandle {
        let handle = self.nodes.register(node_id);
        tracing::trace!(handle = handle.0, nodes = self.nodes.len(), "Node registered");
        handle
    }

    /// Releases a handle after disabling everything it monitors.
    pub(crate) fn unregister_node(&mut self, handle: NodeHandle) -> UaResult<()> {
        if !self.nodes.contains(handle) {
            return Err(UaError::unknown_handle(handle.0));
        }
        for attribute in self.registry.active_for(handle) {
            self.disable_monitoring(handle, attribute, None);
        }
        self.nodes.unregister(handle);
        tracing::trace!(handle = handle.0, nodes = self.nodes.len(), "Node unregistered");
        Ok(())
    }

    pub(crate) fn cached_attribute(
        &self,
        handle: NodeHandle,
        attribute: AttributeId,
    ) -> UaResult<Option<AttributeValue>> {
        if !self.nodes.contains(handle) {
            return Err(UaError::unknown_handle(handle.0));
        }
        Ok(self.nodes.cached(handle, attribute).cloned())
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Reads attributes of one node; one result per attribute.
    pub(crate) fn read_attributes(
        &mut self,
        handle: NodeHandle,
        attributes: Vec<AttributeId>,
        index_range: Option<String>,
        reply: Reply<Vec<ReadResult>>,
    ) {
        let node_id = match self.check_node(handle) {
            Ok(node_id) => node_id,
            Err(error) => return send_reply(reply, Err(error)),
        };
        let nodes_to_read = attributes
            .iter()
            .map(|attribute| ReadValueId {
                node_id: node_id.clone(),
                attribute_id: *attribute,
                index_range: index_range.clone(),
            })
            .collect();
        let cache = index_range.is_none();
        let items = attributes.into_iter().map(|a| (handle, a)).collect();
        self.read_batch(items, nodes_to_read, cache, move |results| {
            let results = results
                .into_iter()
                .map(|r| ReadResult {
                    attribute: r.attribute,
                    value: r.value,
                })
                .collect();
            send_reply(reply, Ok(results));
        });
    }

    /// Reads attributes across nodes in one request.
    pub(crate) fn read_many(
        &mut self,
        items: Vec<(NodeHandle, AttributeId)>,
        reply: Reply<Vec<NodeReadResult>>,
    ) {
        let mut nodes_to_read = Vec::with_capacity(items.len());
        for (handle, attribute) in &items {
            match self.check_node(*handle) {
                Ok(node_id) => nodes_to_read.push(ReadValueId::new(node_id, *attribute)),
                Err(error) => return send_reply(reply, Err(error)),
            }
        }
        self.read_batch(items, nodes_to_read, true, move |results| send_reply(reply, Ok(results)));
    }

    /// Issues one Read; `items[i]` names the node and attribute of
    /// `nodes_to_read[i]`.
    fn read_batch<F>(
        &mut self,
        items: Vec<(NodeHandle, AttributeId)>,
        nodes_to_read: Vec<ReadValueId>,
        cache: bool,
        finish: F,
    ) where
        F: FnOnce(Vec<NodeReadResult>) + Send + 'static,
    {
        if items.is_empty() {
            return finish(Vec::new());
        }

        let request = ReadRequest {
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read,
        };

        self.dispatch(request, move |core, outcome| {
            let response = typed_response::<ReadResponse>(outcome);
            let results = items
                .into_iter()
                .enumerate()
                .map(|(i, (handle, attribute))| {
                    let value = match &response {
                        Ok(response) => response
                            .results
                            .get(i)
                            .map(|dv| AttributeValue::from_data_value(dv, core.value_type(handle, attribute)))
                            .unwrap_or_else(|| AttributeValue::from_status(StatusCode::BAD_UNKNOWN_RESPONSE)),
                        Err(status) => AttributeValue::from_status(*status),
                    };
                    if cache && response.is_ok() {
                        core.nodes.update_cache(handle, attribute, value.clone());
                    }
                    NodeReadResult {
                        handle,
                        attribute,
                        value,
                    }
                })
                .collect();
            finish(results);
        });
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Picks the wire type for a write.
    ///
    /// Explicit hint, then the attribute's fixed type, then for `Value` the
    /// cached `DataType` if it names a built-in type.
    fn write_hint(&self, handle: NodeHandle, item: &WriteItem) -> Option<WireType> {
        item.hint
            .or_else(|| attribute_wire_type(item.attribute))
            .or_else(|| self.value_type(handle, item.attribute))
    }

    /// Built-in type of a node's `Value`, from its cached `DataType`.
    pub(crate) fn value_type(&self, handle: NodeHandle, attribute: AttributeId) -> Option<WireType> {
        if attribute != AttributeId::Value {
            return None;
        }
        match &self.nodes.cached(handle, AttributeId::DataType)?.value {
            DynamicValue::NodeId(data_type) => WireType::from_builtin_id(data_type.as_standard_numeric()?),
            _ => None,
        }
    }

    /// Writes attributes of one node; one result per item.
    pub(crate) fn write_attributes(
        &mut self,
        handle: NodeHandle,
        items: Vec<WriteItem>,
        reply: Reply<Vec<WriteResult>>,
    ) {
        let node_id = match self.check_node(handle) {
            Ok(node_id) => node_id,
            Err(error) => return send_reply(reply, Err(error)),
        };
        if items.is_empty() {
            return send_reply(reply, Ok(Vec::new()));
        }

        let mut nodes_to_write = Vec::with_capacity(items.len());
        for item in &items {
            let hint = self.write_hint(handle, item);
            let variant = match codec::encode(&item.value, hint) {
                Ok(variant) => variant,
                Err(error) => {
                    let error = UaError::from(error);
                    error.log("write");
                    return send_reply(reply, Err(error));
                }
            };
            nodes_to_write.push(WriteValue {
                node_id: node_id.clone(),
                attribute_id: item.attribute,
                index_range: item.index_range.clone(),
                value: DataValue::new(variant),
            });
        }

        self.dispatch(WriteRequest { nodes_to_write }, move |core, outcome| {
            let response = typed_response::<WriteResponse>(outcome);
            let results = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let status = match &response {
                        Ok(response) => response
                            .results
                            .get(i)
                            .copied()
                            .unwrap_or(StatusCode::BAD_UNKNOWN_RESPONSE),
                        Err(status) => *status,
                    };
                    if status.is_good() && item.index_range.is_none() {
                        core.nodes
                            .update_cache(handle, item.attribute, AttributeValue::new(item.value));
                    }
                    WriteResult {
                        attribute: item.attribute,
                        status,
                    }
                })
                .collect();
            send_reply(reply, Ok(results));
        });
    }

    // =========================================================================
    // Browse
    // =========================================================================

    /// Browses a node, following continuation points until exhausted.
    pub(crate) fn browse(&mut self, handle: NodeHandle, options: BrowseOptions, reply: Reply<BrowseOutcome>) {
        let node_id = match self.check_node(handle) {
            Ok(node_id) => node_id,
            Err(error) => return send_reply(reply, Err(error)),
        };

        let request = BrowseRequest {
            requested_max_references_per_node: options.max_references_per_node,
            nodes_to_browse: vec![BrowseDescription {
                node_id,
                browse_direction: options.direction,
                reference_type_id: options.reference_type,
                include_subtypes: options.include_subtypes,
                node_class_mask: options.node_class_mask,
                result_mask: BROWSE_RESULT_MASK_ALL,
            }],
        };
        self.dispatch(request, move |core, outcome| {
            let result = typed_response::<BrowseResponse>(outcome).map(|r| r.results);
            core.continue_browse(result, BrowseOutcome::default(), reply);
        });
    }

    fn continue_browse(
        &mut self,
        result: Result<Vec<BrowseResult>, StatusCode>,
        mut outcome: BrowseOutcome,
        reply: Reply<BrowseOutcome>,
    ) {
        let result = result.and_then(|results| {
            results
                .into_iter()
                .next()
                .ok_or(StatusCode::BAD_UNKNOWN_RESPONSE)
        });
        let result = match result {
            Ok(result) => result,
            Err(status) => {
                outcome.status = status;
                return send_reply(reply, Ok(outcome));
            }
        };

        outcome.status = result.status;
        outcome.references.extend(result.references);
        if result.status.is_bad() || result.continuation_point.is_empty() {
            tracing::trace!(references = outcome.references.len(), "Browse complete");
            return send_reply(reply, Ok(outcome));
        }

        tracing::trace!(references = outcome.references.len(), "Following browse continuation point");
        let request = BrowseNextRequest {
            release_continuation_points: false,
            continuation_points: vec![result.continuation_point],
        };
        self.dispatch(request, move |core, next| {
            let result = typed_response::<BrowseNextResponse>(next).map(|r| r.results);
            core.continue_browse(result, outcome, reply);
        });
    }

    // =========================================================================
    // Call / TranslateBrowsePaths
    // =========================================================================

    /// Calls `method_id` on the node as object.
    pub(crate) fn call_method(
        &mut self,
        handle: NodeHandle,
        method_id: NodeId,
        inputs: Vec<DynamicValue>,
        reply: Reply<MethodResult>,
    ) {
        let object_id = match self.check_node(handle) {
            Ok(node_id) => node_id,
            Err(error) => return send_reply(reply, Err(error)),
        };
        let input_arguments = match inputs
            .iter()
            .map(|v| codec::encode(v, None))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(arguments) => arguments,
            Err(error) => return send_reply(reply, Err(error.into())),
        };

        let request = CallRequest {
            methods_to_call: vec![CallMethodRequest {
                object_id,
                method_id,
                input_arguments,
            }],
        };
        self.dispatch(request, move |_core, outcome| {
            let result = typed_response::<CallResponse>(outcome).and_then(|r| {
                r.results
                    .into_iter()
                    .next()
                    .ok_or(StatusCode::BAD_UNKNOWN_RESPONSE)
            });
            let result = match result {
                Ok(result) => MethodResult {
                    status: result.status,
                    input_argument_results: result.input_argument_results,
                    outputs: result.output_arguments.iter().map(codec::decode).collect(),
                },
                Err(status) => MethodResult {
                    status,
                    ..MethodResult::default()
                },
            };
            send_reply(reply, Ok(result));
        });
    }

    /// Resolves a hierarchical path of browse names from the node.
    pub(crate) fn resolve_browse_path(
        &mut self,
        handle: NodeHandle,
        path: Vec<QualifiedName>,
        reply: Reply<BrowsePathOutcome>,
    ) {
        let starting_node = match self.check_node(handle) {
            Ok(node_id) => node_id,
            Err(error) => return send_reply(reply, Err(error)),
        };

        let request = TranslateBrowsePathsRequest {
            browse_paths: vec![BrowsePath {
                starting_node,
                relative_path: path.into_iter().map(RelativePathElement::child).collect(),
            }],
        };
        self.dispatch(request, move |_core, outcome| {
            let result = typed_response::<TranslateBrowsePathsResponse>(outcome).and_then(|r| {
                r.results
                    .into_iter()
                    .next()
                    .ok_or(StatusCode::BAD_UNKNOWN_RESPONSE)
            });
            let outcome = match result {
                Ok(result) => BrowsePathOutcome {
                    status: result.status,
                    targets: result.targets,
                },
                Err(status) => BrowsePathOutcome {
                    status,
                    targets: Vec::new(),
                },
            };
            send_reply(reply, Ok(outcome));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_wire_types() {
        assert_eq!(attribute_wire_type(AttributeId::DisplayName), Some(WireType::LocalizedText));
        assert_eq!(attribute_wire_type(AttributeId::AccessLevel), Some(WireType::Byte));
        assert_eq!(attribute_wire_type(AttributeId::Historizing), Some(WireType::Boolean));
        assert_eq!(attribute_wire_type(AttributeId::Value), None);
    }
}
