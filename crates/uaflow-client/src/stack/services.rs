// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Typed service payloads exchanged with the stack.
//!
//! Each service has a request and a response type. [`ServiceRequest`] and
//! [`ServiceResponse`] wrap them for the single `service_call` entry point;
//! typed responses are recovered with `TryFrom<ServiceResponse>`.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::codec::filter::{EventFilterResult, WireFilter};
use crate::codec::{DataValue, Variant};
use crate::status::StatusCode;
use crate::types::{
    AttributeId, BrowseDirection, ExpandedNodeId, LocalizedText, MonitoringMode, NodeClass,
    NodeId, QualifiedName, TimestampsToReturn,
};

// =============================================================================
// Attribute services
// =============================================================================

/// Identifies one attribute to read or monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadValueId {
    /// Node.
    pub node_id: NodeId,
    /// Attribute.
    pub attribute_id: AttributeId,
    /// Optional index range, e.g. `"1:3"`.
    pub index_range: Option<String>,
}

impl ReadValueId {
    /// Creates an id without index range.
    pub fn new(node_id: NodeId, attribute_id: AttributeId) -> Self {
        Self {
            node_id,
            attribute_id,
            index_range: None,
        }
    }
}

/// Read request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    /// Maximum cached value age in milliseconds; 0 forces a device read.
    pub max_age: f64,
    /// Timestamps to return.
    pub timestamps_to_return: TimestampsToReturn,
    /// Attributes to read.
    pub nodes_to_read: Vec<ReadValueId>,
}

/// Read response, one entry per requested attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadResponse {
    /// Results.
    pub results: Vec<DataValue>,
}

/// One attribute to write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteValue {
    /// Node.
    pub node_id: NodeId,
    /// Attribute.
    pub attribute_id: AttributeId,
    /// Optional index range.
    pub index_range: Option<String>,
    /// Value to write.
    pub value: DataValue,
}

/// Write request.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    /// Attributes to write.
    pub nodes_to_write: Vec<WriteValue>,
}

/// Write response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteResponse {
    /// Per-item status.
    pub results: Vec<StatusCode>,
}

// =============================================================================
// View services
// =============================================================================

/// One node to browse.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseDescription {
    /// Starting node.
    pub node_id: NodeId,
    /// Direction.
    pub browse_direction: BrowseDirection,
    /// Reference type to follow.
    pub reference_type_id: NodeId,
    /// Whether subtypes of the reference type are followed.
    pub include_subtypes: bool,
    /// Node class mask; 0 returns all classes.
    pub node_class_mask: u32,
    /// Result field mask.
    pub result_mask: u32,
}

/// Browse request.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseRequest {
    /// Per-node reference limit; 0 lets the server decide.
    pub requested_max_references_per_node: u32,
    /// Nodes to browse.
    pub nodes_to_browse: Vec<BrowseDescription>,
}

/// One reference returned by browse.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDescription {
    /// Reference type.
    pub reference_type_id: NodeId,
    /// Forward or inverse.
    pub is_forward: bool,
    /// Target node.
    pub node_id: ExpandedNodeId,
    /// Target browse name.
    pub browse_name: QualifiedName,
    /// Target display name.
    pub display_name: LocalizedText,
    /// Target node class.
    pub node_class: NodeClass,
    /// Target type definition.
    pub type_definition: ExpandedNodeId,
}

/// Browse result for one node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseResult {
    /// Status.
    pub status: StatusCode,
    /// Continuation point; empty when complete.
    pub continuation_point: Vec<u8>,
    /// References.
    pub references: Vec<ReferenceDescription>,
}

/// Browse response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseResponse {
    /// Per-node results.
    pub results: Vec<BrowseResult>,
}

/// BrowseNext request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseNextRequest {
    /// Release the points instead of continuing.
    pub release_continuation_points: bool,
    /// Continuation points.
    pub continuation_points: Vec<Vec<u8>>,
}

/// BrowseNext response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseNextResponse {
    /// Per-point results.
    pub results: Vec<BrowseResult>,
}

/// One hop of a relative path.
#[derive(Debug, Clone, PartialEq)]
pub struct RelativePathElement {
    /// Reference type to follow.
    pub reference_type_id: NodeId,
    /// Follow inverse references.
    pub is_inverse: bool,
    /// Follow subtypes of the reference type.
    pub include_subtypes: bool,
    /// Target browse name.
    pub target_name: QualifiedName,
}

impl RelativePathElement {
    /// A hierarchical forward hop to `target_name`.
    pub fn child(target_name: QualifiedName) -> Self {
        Self {
            reference_type_id: crate::types::reference_types::HIERARCHICAL_REFERENCES,
            is_inverse: false,
            include_subtypes: true,
            target_name,
        }
    }
}

/// A browse path.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowsePath {
    /// Starting node.
    pub starting_node: NodeId,
    /// Hops.
    pub relative_path: Vec<RelativePathElement>,
}

/// TranslateBrowsePathsToNodeIds request.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslateBrowsePathsRequest {
    /// Paths.
    pub browse_paths: Vec<BrowsePath>,
}

/// A resolved path target.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowsePathTarget {
    /// Target node.
    pub target_id: ExpandedNodeId,
    /// Index of the first unprocessed element; `u32::MAX` when fully resolved.
    pub remaining_path_index: u32,
}

/// Result for one browse path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowsePathResult {
    /// Status.
    pub status: StatusCode,
    /// Targets.
    pub targets: Vec<BrowsePathTarget>,
}

/// TranslateBrowsePathsToNodeIds response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslateBrowsePathsResponse {
    /// Per-path results.
    pub results: Vec<BrowsePathResult>,
}

// =============================================================================
// Method service
// =============================================================================

/// One method invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CallMethodRequest {
    /// Object the method is called on.
    pub object_id: NodeId,
    /// Method node.
    pub method_id: NodeId,
    /// Input arguments.
    pub input_arguments: Vec<Variant>,
}

/// Call request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    /// Invocations.
    pub methods_to_call: Vec<CallMethodRequest>,
}

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallMethodResult {
    /// Status.
    pub status: StatusCode,
    /// Per-input-argument status.
    pub input_argument_results: Vec<StatusCode>,
    /// Output arguments.
    pub output_arguments: Vec<Variant>,
}

/// Call response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallResponse {
    /// Per-invocation results.
    pub results: Vec<CallMethodResult>,
}

// =============================================================================
// Subscription services
// =============================================================================

/// CreateSubscription request.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSubscriptionRequest {
    /// Requested publishing interval in milliseconds.
    pub requested_publishing_interval: f64,
    /// Requested lifetime count.
    pub requested_lifetime_count: u32,
    /// Requested keep-alive count.
    pub requested_max_keep_alive_count: u32,
    /// Notifications per publish; 0 is unlimited.
    pub max_notifications_per_publish: u32,
    /// Publishing enabled.
    pub publishing_enabled: bool,
    /// Priority.
    pub priority: u8,
}

/// CreateSubscription response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateSubscriptionResponse {
    /// Server-assigned id.
    pub subscription_id: u32,
    /// Revised publishing interval.
    pub revised_publishing_interval: f64,
    /// Revised lifetime count.
    pub revised_lifetime_count: u32,
    /// Revised keep-alive count.
    pub revised_max_keep_alive_count: u32,
}

/// ModifySubscription request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifySubscriptionRequest {
    /// Subscription.
    pub subscription_id: u32,
    /// Requested publishing interval.
    pub requested_publishing_interval: f64,
    /// Requested lifetime count.
    pub requested_lifetime_count: u32,
    /// Requested keep-alive count.
    pub requested_max_keep_alive_count: u32,
    /// Notifications per publish.
    pub max_notifications_per_publish: u32,
    /// Priority.
    pub priority: u8,
}

/// ModifySubscription response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifySubscriptionResponse {
    /// Revised publishing interval.
    pub revised_publishing_interval: f64,
    /// Revised lifetime count.
    pub revised_lifetime_count: u32,
    /// Revised keep-alive count.
    pub revised_max_keep_alive_count: u32,
}

/// SetPublishingMode request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetPublishingModeRequest {
    /// New flag.
    pub publishing_enabled: bool,
    /// Subscriptions.
    pub subscription_ids: Vec<u32>,
}

/// SetPublishingMode response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetPublishingModeResponse {
    /// Per-subscription status.
    pub results: Vec<StatusCode>,
}

/// DeleteSubscriptions request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteSubscriptionsRequest {
    /// Subscriptions.
    pub subscription_ids: Vec<u32>,
}

/// DeleteSubscriptions response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteSubscriptionsResponse {
    /// Per-subscription status.
    pub results: Vec<StatusCode>,
}

// =============================================================================
// Monitored item services
// =============================================================================

/// Requested monitoring parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringParameters {
    /// Client handle echoed in notifications.
    pub client_handle: u32,
    /// Sampling interval in milliseconds; 0 samples as fast as possible.
    pub sampling_interval: f64,
    /// Filter.
    pub filter: Option<WireFilter>,
    /// Queue size.
    pub queue_size: u32,
    /// Discard oldest on overflow.
    pub discard_oldest: bool,
}

/// One monitored item to create.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItemCreateRequest {
    /// Attribute to monitor.
    pub item_to_monitor: ReadValueId,
    /// Mode.
    pub monitoring_mode: MonitoringMode,
    /// Parameters.
    pub requested_parameters: MonitoringParameters,
}

/// CreateMonitoredItems request.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateMonitoredItemsRequest {
    /// Subscription.
    pub subscription_id: u32,
    /// Timestamps to return.
    pub timestamps_to_return: TimestampsToReturn,
    /// Items.
    pub items_to_create: Vec<MonitoredItemCreateRequest>,
}

/// Result of one create.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemCreateResult {
    /// Status.
    pub status: StatusCode,
    /// Server-assigned id.
    pub monitored_item_id: u32,
    /// Revised sampling interval.
    pub revised_sampling_interval: f64,
    /// Revised queue size.
    pub revised_queue_size: u32,
    /// Event filter verdict.
    pub filter_result: Option<EventFilterResult>,
}

/// CreateMonitoredItems response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateMonitoredItemsResponse {
    /// Per-item results.
    pub results: Vec<MonitoredItemCreateResult>,
}

/// One monitored item to modify.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItemModifyRequest {
    /// Item.
    pub monitored_item_id: u32,
    /// New parameters.
    pub requested_parameters: MonitoringParameters,
}

/// ModifyMonitoredItems request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifyMonitoredItemsRequest {
    /// Subscription.
    pub subscription_id: u32,
    /// Timestamps to return.
    pub timestamps_to_return: TimestampsToReturn,
    /// Items.
    pub items_to_modify: Vec<MonitoredItemModifyRequest>,
}

/// Result of one modify.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemModifyResult {
    /// Status.
    pub status: StatusCode,
    /// Revised sampling interval.
    pub revised_sampling_interval: f64,
    /// Revised queue size.
    pub revised_queue_size: u32,
    /// Event filter verdict.
    pub filter_result: Option<EventFilterResult>,
}

/// ModifyMonitoredItems response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifyMonitoredItemsResponse {
    /// Per-item results.
    pub results: Vec<MonitoredItemModifyResult>,
}

/// SetMonitoringMode request.
#[derive(Debug, Clone, PartialEq)]
pub struct SetMonitoringModeRequest {
    /// Subscription.
    pub subscription_id: u32,
    /// New mode.
    pub monitoring_mode: MonitoringMode,
    /// Items.
    pub monitored_item_ids: Vec<u32>,
}

/// SetMonitoringMode response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetMonitoringModeResponse {
    /// Per-item status.
    pub results: Vec<StatusCode>,
}

/// DeleteMonitoredItems request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteMonitoredItemsRequest {
    /// Subscription.
    pub subscription_id: u32,
    /// Items.
    pub monitored_item_ids: Vec<u32>,
}

/// DeleteMonitoredItems response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteMonitoredItemsResponse {
    /// Per-item status.
    pub results: Vec<StatusCode>,
}

// =============================================================================
// History service
// =============================================================================

/// ReadRawModifiedDetails with `is_read_modified = false`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRawDetails {
    /// Start of the range.
    pub start_time: DateTime<Utc>,
    /// End of the range.
    pub end_time: DateTime<Utc>,
    /// Values per node; 0 is unlimited.
    pub num_values_per_node: u32,
    /// Return bounding values.
    pub return_bounds: bool,
}

/// One node to read history for.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryReadValueId {
    /// Node.
    pub node_id: NodeId,
    /// Optional index range.
    pub index_range: Option<String>,
    /// Continuation point; empty on the first read.
    pub continuation_point: Vec<u8>,
}

/// HistoryRead request (raw).
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryReadRequest {
    /// Details.
    pub details: ReadRawDetails,
    /// Timestamps to return.
    pub timestamps_to_return: TimestampsToReturn,
    /// Release the continuation points instead of reading.
    pub release_continuation_points: bool,
    /// Nodes.
    pub nodes_to_read: Vec<HistoryReadValueId>,
}

/// History result for one node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryReadResult {
    /// Status.
    pub status: StatusCode,
    /// Continuation point; empty when exhausted.
    pub continuation_point: Vec<u8>,
    /// Values in chronological order.
    pub data_values: Vec<DataValue>,
}

/// HistoryRead response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryReadResponse {
    /// Per-node results.
    pub results: Vec<HistoryReadResult>,
}

// =============================================================================
// Envelopes
// =============================================================================

/// Service name used in logs and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ServiceKind {
    Read,
    Write,
    Browse,
    BrowseNext,
    Call,
    TranslateBrowsePaths,
    CreateSubscription,
    ModifySubscription,
    SetPublishingMode,
    DeleteSubscriptions,
    CreateMonitoredItems,
    ModifyMonitoredItems,
    SetMonitoringMode,
    DeleteMonitoredItems,
    HistoryRead,
}

impl ServiceKind {
    /// Returns the protocol service name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::Write => "Write",
            Self::Browse => "Browse",
            Self::BrowseNext => "BrowseNext",
            Self::Call => "Call",
            Self::TranslateBrowsePaths => "TranslateBrowsePathsToNodeIds",
            Self::CreateSubscription => "CreateSubscription",
            Self::ModifySubscription => "ModifySubscription",
            Self::SetPublishingMode => "SetPublishingMode",
            Self::DeleteSubscriptions => "DeleteSubscriptions",
            Self::CreateMonitoredItems => "CreateMonitoredItems",
            Self::ModifyMonitoredItems => "ModifyMonitoredItems",
            Self::SetMonitoringMode => "SetMonitoringMode",
            Self::DeleteMonitoredItems => "DeleteMonitoredItems",
            Self::HistoryRead => "HistoryRead",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

macro_rules! service_envelopes {
    ($($kind:ident($request:ident, $response:ident)),* $(,)?) => {
        /// A request to any service.
        #[derive(Debug, Clone, PartialEq)]
        #[allow(missing_docs)]
        pub enum ServiceRequest {
            $($kind($request),)*
        }

        /// A response from any service.
        #[derive(Debug, Clone, PartialEq)]
        #[allow(missing_docs)]
        pub enum ServiceResponse {
            $($kind($response),)*
        }

        impl ServiceRequest {
            /// Returns the service this request targets.
            pub fn kind(&self) -> ServiceKind {
                match self {
                    $(Self::$kind(_) => ServiceKind::$kind,)*
                }
            }
        }

        impl ServiceResponse {
            /// Returns the service this response belongs to.
            pub fn kind(&self) -> ServiceKind {
                match self {
                    $(Self::$kind(_) => ServiceKind::$kind,)*
                }
            }
        }

        $(
            impl From<$request> for ServiceRequest {
                fn from(request: $request) -> Self {
                    Self::$kind(request)
                }
            }

            impl From<$response> for ServiceResponse {
                fn from(response: $response) -> Self {
                    Self::$kind(response)
                }
            }

            impl TryFrom<ServiceResponse> for $response {
                type Error = ServiceResponse;

                fn try_from(response: ServiceResponse) -> Result<Self, Self::Error> {
                    match response {
                        ServiceResponse::$kind(inner) => Ok(inner),
                        #[allow(unreachable_patterns)]
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

service_envelopes! {
    Read(ReadRequest, ReadResponse),
    Write(WriteRequest, WriteResponse),
    Browse(BrowseRequest, BrowseResponse),
    BrowseNext(BrowseNextRequest, BrowseNextResponse),
    Call(CallRequest, CallResponse),
    TranslateBrowsePaths(TranslateBrowsePathsRequest, TranslateBrowsePathsResponse),
    CreateSubscription(CreateSubscriptionRequest, CreateSubscriptionResponse),
    ModifySubscription(ModifySubscriptionRequest, ModifySubscriptionResponse),
    SetPublishingMode(SetPublishingModeRequest, SetPublishingModeResponse),
    DeleteSubscriptions(DeleteSubscriptionsRequest, DeleteSubscriptionsResponse),
    CreateMonitoredItems(CreateMonitoredItemsRequest, CreateMonitoredItemsResponse),
    ModifyMonitoredItems(ModifyMonitoredItemsRequest, ModifyMonitoredItemsResponse),
    SetMonitoringMode(SetMonitoringModeRequest, SetMonitoringModeResponse),
    DeleteMonitoredItems(DeleteMonitoredItemsRequest, DeleteMonitoredItemsResponse),
    HistoryRead(HistoryReadRequest, HistoryReadResponse),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_kinds() {
        let request = ServiceRequest::from(DeleteSubscriptionsRequest {
            subscription_ids: vec![1],
        });
        assert_eq!(request.kind(), ServiceKind::DeleteSubscriptions);
        assert_eq!(request.kind().to_string(), "DeleteSubscriptions");
        assert_eq!(
            ServiceKind::TranslateBrowsePaths.name(),
            "TranslateBrowsePathsToNodeIds"
        );
    }

    #[test]
    fn test_typed_response_recovery() {
        let response = ServiceResponse::from(WriteResponse {
            results: vec![StatusCode::GOOD],
        });
        let typed = WriteResponse::try_from(response.clone()).unwrap();
        assert_eq!(typed.results, vec![StatusCode::GOOD]);

        let wrong = ReadResponse::try_from(response).unwrap_err();
        assert_eq!(wrong.kind(), ServiceKind::Write);
    }
}
