// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Monitored items and notification routing.
//!
//! The [`MonitoringRegistry`] holds two non-owning indices:
//!
//! ```text
//! (handle, attribute)              ──► Pending | Active { subscription, item }
//! (subscription id, item id)       ──► (handle, attribute)
//! ```
//!
//! The items themselves live inside their [`Subscription`]. A pair is
//! reserved as `Pending` from the moment an enable is accepted until the
//! server answers, so a second enable in between is refused.
//!
//! [`Subscription`]: super::subscription::Subscription

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::filter::{
    encode_filter, EventFilter, EventFilterResult, MonitoringFilter, SimpleAttributeOperand,
    WireFilter,
};
use crate::codec::{self, DataValue, Variant};
use crate::error::{ClientError, UaError, UaResult};
use crate::stack::services::{
    CreateMonitoredItemsRequest, CreateMonitoredItemsResponse, DeleteMonitoredItemsRequest,
    DeleteMonitoredItemsResponse, ModifyMonitoredItemsRequest, ModifyMonitoredItemsResponse,
    ModifySubscriptionRequest, ModifySubscriptionResponse, MonitoredItemCreateRequest,
    MonitoredItemModifyRequest, MonitoringParameters, ReadValueId, SetMonitoringModeRequest,
    SetMonitoringModeResponse, SetPublishingModeRequest, SetPublishingModeResponse,
};
use crate::stack::{ServiceOutcome, Stack};
use crate::status::StatusCode;
use crate::types::{AttributeId, MonitoringMode, NodeHandle, NodeId, TimestampsToReturn};

use super::engine::{send_reply, typed_response, ClientCore, Reply};
use super::events::{AttributeValue, ClientEvent};
use super::subscription::{Subscription, SubscriptionRequest, SubscriptionType};

/// Fields selected when an `EventNotifier` is monitored without a filter.
const DEFAULT_EVENT_FIELDS: &[&str] = &[
    "EventId",
    "EventType",
    "SourceNode",
    "SourceName",
    "Time",
    "ReceiveTime",
    "Message",
    "Severity",
];

// =============================================================================
// MonitoringSettings
// =============================================================================

/// How to monitor an attribute.
///
/// Unset values fall back to the client configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoringSettings {
    /// Publishing interval of the subscription.
    pub publishing_interval_ms: Option<f64>,
    /// Whether the subscription may be shared.
    pub sharing: SubscriptionType,
    /// Place the item on this existing subscription.
    pub subscription_id: Option<u32>,
    /// Subscription lifetime count.
    pub lifetime_count: Option<u32>,
    /// Subscription keep-alive count.
    pub max_keep_alive_count: Option<u32>,
    /// Notifications per publish.
    pub max_notifications_per_publish: Option<u32>,
    /// Subscription priority.
    pub priority: Option<u8>,
    /// Sampling interval.
    pub sampling_interval_ms: Option<f64>,
    /// Queue size.
    pub queue_size: Option<u32>,
    /// Discard policy.
    pub discard_oldest: Option<bool>,
    /// Monitoring mode.
    pub monitoring_mode: MonitoringMode,
    /// Data-change or event filter.
    pub filter: Option<MonitoringFilter>,
    /// Timestamps on notifications.
    pub timestamps: TimestampsToReturn,
}

impl MonitoringSettings {
    /// Creates settings that use the configured defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the publishing interval.
    pub fn publishing_interval_ms(mut self, interval: f64) -> Self {
        self.publishing_interval_ms = Some(interval);
        self
    }

    /// Requests a subscription that is never shared.
    pub fn exclusive(mut self) -> Self {
        self.sharing = SubscriptionType::Exclusive;
        self
    }

    /// Places the item on an existing subscription.
    pub fn subscription(mut self, subscription_id: u32) -> Self {
        self.subscription_id = Some(subscription_id);
        self
    }

    /// Sets the sampling interval.
    pub fn sampling_interval_ms(mut self, interval: f64) -> Self {
        self.sampling_interval_ms = Some(interval);
        self
    }

    /// Sets queue size and discard policy.
    pub fn queue(mut self, queue_size: u32, discard_oldest: bool) -> Self {
        self.queue_size = Some(queue_size);
        self.discard_oldest = Some(discard_oldest);
        self
    }

    /// Sets the subscription priority.
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the monitoring mode.
    pub fn mode(mut self, mode: MonitoringMode) -> Self {
        self.monitoring_mode = mode;
        self
    }

    /// Sets a filter.
    pub fn filter(mut self, filter: MonitoringFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// A monitoring parameter that can be changed after enabling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringParameter {
    /// Subscription publishing enabled.
    PublishingEnabled,
    /// Subscription publishing interval.
    PublishingInterval,
    /// Subscription lifetime count.
    LifetimeCount,
    /// Subscription keep-alive count.
    MaxKeepAliveCount,
    /// Subscription priority.
    Priority,
    /// Notifications per publish.
    MaxNotificationsPerPublish,
    /// Item sampling interval.
    SamplingInterval,
    /// Item queue size.
    QueueSize,
    /// Item discard policy.
    DiscardOldest,
    /// Item filter.
    Filter,
    /// Item monitoring mode.
    MonitoringMode,
    /// Not supported.
    IndexRange,
    /// Not supported.
    Triggering,
}

impl fmt::Display for MonitoringParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PublishingEnabled => "PublishingEnabled",
            Self::PublishingInterval => "PublishingInterval",
            Self::LifetimeCount => "LifetimeCount",
            Self::MaxKeepAliveCount => "MaxKeepAliveCount",
            Self::Priority => "Priority",
            Self::MaxNotificationsPerPublish => "MaxNotificationsPerPublish",
            Self::SamplingInterval => "SamplingInterval",
            Self::QueueSize => "QueueSize",
            Self::DiscardOldest => "DiscardOldest",
            Self::Filter => "Filter",
            Self::MonitoringMode => "MonitoringMode",
            Self::IndexRange => "IndexRange",
            Self::Triggering => "Triggering",
        };
        f.write_str(name)
    }
}

/// New value for a [`MonitoringParameter`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// Boolean.
    Boolean(bool),
    /// Double.
    Double(f64),
    /// UInt32.
    UInt32(u32),
    /// Byte.
    Byte(u8),
    /// Monitoring mode.
    MonitoringMode(MonitoringMode),
    /// Filter.
    Filter(MonitoringFilter),
    /// Removes a filter.
    None,
}

impl ParameterValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Double(_) => "Double",
            Self::UInt32(_) => "UInt32",
            Self::Byte(_) => "Byte",
            Self::MonitoringMode(_) => "MonitoringMode",
            Self::Filter(_) => "Filter",
            Self::None => "None",
        }
    }

    fn mismatch(&self, expected: &str) -> ClientError {
        ClientError::type_mismatch(expected, self.type_name())
    }

    fn as_bool(&self) -> Result<bool, ClientError> {
        match self {
            Self::Boolean(v) => Ok(*v),
            other => Err(other.mismatch("Boolean")),
        }
    }

    fn as_f64(&self) -> Result<f64, ClientError> {
        match self {
            Self::Double(v) => Ok(*v),
            Self::UInt32(v) => Ok(f64::from(*v)),
            other => Err(other.mismatch("Double")),
        }
    }

    fn as_u32(&self) -> Result<u32, ClientError> {
        match self {
            Self::UInt32(v) => Ok(*v),
            Self::Byte(v) => Ok(u32::from(*v)),
            other => Err(other.mismatch("UInt32")),
        }
    }

    fn as_u8(&self) -> Result<u8, ClientError> {
        match self {
            Self::Byte(v) => Ok(*v),
            Self::UInt32(v) => u8::try_from(*v).map_err(|_| self.mismatch("Byte")),
            other => Err(other.mismatch("Byte")),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<u32> for ParameterValue {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<u8> for ParameterValue {
    fn from(v: u8) -> Self {
        Self::Byte(v)
    }
}

impl From<MonitoringMode> for ParameterValue {
    fn from(v: MonitoringMode) -> Self {
        Self::MonitoringMode(v)
    }
}

impl From<MonitoringFilter> for ParameterValue {
    fn from(v: MonitoringFilter) -> Self {
        Self::Filter(v)
    }
}

// =============================================================================
// MonitoredItem / MonitoringState
// =============================================================================

/// A monitored item, owned by its subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItem {
    /// Node.
    pub handle: NodeHandle,
    /// Attribute.
    pub attribute: AttributeId,
    /// Server-assigned id.
    pub monitored_item_id: u32,
    /// Client handle sent to the server.
    pub client_handle: u32,
    /// Revised sampling interval.
    pub sampling_interval_ms: f64,
    /// Revised queue size.
    pub queue_size: u32,
    /// Discard policy.
    pub discard_oldest: bool,
    /// Monitoring mode.
    pub monitoring_mode: MonitoringMode,
    /// Filter in effect.
    pub filter: Option<MonitoringFilter>,
    /// Last filter result.
    pub filter_result: Option<EventFilterResult>,
}

/// Current parameters of a monitored attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringState {
    /// Subscription id.
    pub subscription_id: u32,
    /// Monitored item id.
    pub monitored_item_id: u32,
    /// Revised publishing interval.
    pub publishing_interval_ms: f64,
    /// Revised lifetime count.
    pub lifetime_count: u32,
    /// Revised keep-alive count.
    pub max_keep_alive_count: u32,
    /// Notifications per publish.
    pub max_notifications_per_publish: u32,
    /// Subscription priority.
    pub priority: u8,
    /// Publishing enabled.
    pub publishing_enabled: bool,
    /// Revised sampling interval.
    pub sampling_interval_ms: f64,
    /// Revised queue size.
    pub queue_size: u32,
    /// Discard policy.
    pub discard_oldest: bool,
    /// Monitoring mode.
    pub monitoring_mode: MonitoringMode,
    /// Filter in effect.
    pub filter: Option<MonitoringFilter>,
    /// Last filter result.
    pub filter_result: Option<EventFilterResult>,
}

impl MonitoringState {
    fn new(subscription: &Subscription, item: &MonitoredItem) -> Self {
        Self {
            subscription_id: subscription.id,
            monitored_item_id: item.monitored_item_id,
            publishing_interval_ms: subscription.revised_interval_ms,
            lifetime_count: subscription.lifetime_count,
            max_keep_alive_count: subscription.max_keep_alive_count,
            max_notifications_per_publish: subscription.max_notifications_per_publish,
            priority: subscription.priority,
            publishing_enabled: subscription.publishing_enabled,
            sampling_interval_ms: item.sampling_interval_ms,
            queue_size: item.queue_size,
            discard_oldest: item.discard_oldest,
            monitoring_mode: item.monitoring_mode,
            filter: item.filter.clone(),
            filter_result: item.filter_result.clone(),
        }
    }
}

/// Outcome of an enable or modify.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringResult {
    /// Service or item status.
    pub status: StatusCode,
    /// Parameters after the operation, when it succeeded.
    pub state: Option<MonitoringState>,
}

impl MonitoringResult {
    fn failed(status: StatusCode) -> Self {
        Self {
            status,
            state: None,
        }
    }

    /// Returns `true` if the status is good.
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }
}

// =============================================================================
// MonitoringRegistry
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegistryEntry {
    Pending,
    Active {
        subscription_id: u32,
        monitored_item_id: u32,
    },
}

type AttributeKey = (NodeHandle, AttributeId);

/// Index of monitored pairs.
#[derive(Debug, Default)]
pub(crate) struct MonitoringRegistry {
    by_attribute: HashMap<AttributeKey, RegistryEntry>,
    by_item: HashMap<(u32, u32), AttributeKey>,
    next_client_handle: u32,
}

impl MonitoringRegistry {
    /// Reserves a pair and returns a fresh client handle.
    pub fn reserve(&mut self, handle: NodeHandle, attribute: AttributeId) -> Result<u32, ClientError> {
        if self.by_attribute.contains_key(&(handle, attribute)) {
            return Err(ClientError::already_monitored(handle.0, attribute));
        }
        self.by_attribute.insert((handle, attribute), RegistryEntry::Pending);
        self.next_client_handle = self.next_client_handle.wrapping_add(1);
        Ok(self.next_client_handle)
    }

    pub fn activate(
        &mut self,
        handle: NodeHandle,
        attribute: AttributeId,
        subscription_id: u32,
        monitored_item_id: u32,
    ) {
        self.by_attribute.insert(
            (handle, attribute),
            RegistryEntry::Active {
                subscription_id,
                monitored_item_id,
            },
        );
        self.by_item
            .insert((subscription_id, monitored_item_id), (handle, attribute));
    }

    /// Removes a pair from both indices.
    pub fn remove(&mut self, handle: NodeHandle, attribute: AttributeId) -> Option<RegistryEntry> {
        let entry = self.by_attribute.remove(&(handle, attribute))?;
        if let RegistryEntry::Active {
            subscription_id,
            monitored_item_id,
        } = entry
        {
            self.by_item.remove(&(subscription_id, monitored_item_id));
        }
        Some(entry)
    }

    pub fn get(&self, handle: NodeHandle, attribute: AttributeId) -> Option<RegistryEntry> {
        self.by_attribute.get(&(handle, attribute)).copied()
    }

    /// Returns `(subscription id, item id)` of an active pair.
    pub fn active(&self, handle: NodeHandle, attribute: AttributeId) -> Option<(u32, u32)> {
        match self.get(handle, attribute)? {
            RegistryEntry::Active {
                subscription_id,
                monitored_item_id,
            } => Some((subscription_id, monitored_item_id)),
            RegistryEntry::Pending => None,
        }
    }

    pub fn route(&self, subscription_id: u32, monitored_item_id: u32) -> Option<AttributeKey> {
        self.by_item.get(&(subscription_id, monitored_item_id)).copied()
    }

    /// Active attributes of a node.
    pub fn active_for(&self, handle: NodeHandle) -> Vec<AttributeId> {
        let mut attributes: Vec<_> = self
            .by_attribute
            .iter()
            .filter(|((h, _), entry)| *h == handle && matches!(entry, RegistryEntry::Active { .. }))
            .map(|((_, attribute), _)| *attribute)
            .collect();
        attributes.sort();
        attributes
    }

    pub fn len(&self) -> usize {
        self.by_attribute.len()
    }

}

// =============================================================================
// Filters
// =============================================================================

fn default_event_filter() -> MonitoringFilter {
    MonitoringFilter::Event(EventFilter {
        select_clauses: DEFAULT_EVENT_FIELDS
            .iter()
            .map(|name| SimpleAttributeOperand::event_field(*name))
            .collect(),
        ..EventFilter::default()
    })
}

/// Picks and encodes the filter for an attribute.
fn resolve_filter(
    attribute: AttributeId,
    filter: Option<MonitoringFilter>,
) -> UaResult<(Option<MonitoringFilter>, Option<WireFilter>)> {
    let filter = match (attribute, filter) {
        (AttributeId::EventNotifier, None) => Some(default_event_filter()),
        (AttributeId::EventNotifier, Some(MonitoringFilter::DataChange(_))) => {
            return Err(ClientError::invalid_argument(
                "EventNotifier requires an event filter",
            )
            .into())
        }
        (AttributeId::EventNotifier, Some(filter)) => Some(filter),
        (other, Some(MonitoringFilter::Event(_))) => {
            return Err(ClientError::invalid_argument(format!(
                "event filter is only valid on EventNotifier, not {}",
                other
            ))
            .into())
        }
        (_, filter) => filter,
    };

    let wire = filter.as_ref().map(encode_filter).transpose()?;
    Ok((filter, wire))
}

// =============================================================================
// Registry operations on the worker
// =============================================================================

/// What an item creation needs once its subscription exists.
struct ItemPlan {
    handle: NodeHandle,
    attribute: AttributeId,
    node_id: NodeId,
    client_handle: u32,
    sampling_interval_ms: f64,
    queue_size: u32,
    discard_oldest: bool,
    monitoring_mode: MonitoringMode,
    timestamps: TimestampsToReturn,
    filter: Option<MonitoringFilter>,
    wire_filter: Option<WireFilter>,
}

impl<S: Stack> ClientCore<S> {
    /// Starts monitoring `(handle, attribute)`.
    pub(crate) fn enable_monitoring(
        &mut self,
        handle: NodeHandle,
        attribute: AttributeId,
        settings: MonitoringSettings,
        reply: Reply<MonitoringResult>,
    ) {
        let prepared = self.prepare_enable(handle, attribute, settings);
        let (plan, request) = match prepared {
            Ok(prepared) => prepared,
            Err(error) => return send_reply(reply, Err(error)),
        };

        tracing::debug!(
            handle = handle.0,
            attribute = %attribute,
            client_handle = plan.client_handle,
            "Enabling monitoring"
        );
        let acquired = self.acquire_subscription(
            request,
            Box::new(move |core, subscription| core.create_item(plan, subscription, reply)),
        );
        if let Err(error) = acquired {
            // Checked in prepare_enable; only the reservation needs undoing.
            self.registry.remove(handle, attribute);
            UaError::from(error).log("enable monitoring");
        }
    }

    fn prepare_enable(
        &mut self,
        handle: NodeHandle,
        attribute: AttributeId,
        settings: MonitoringSettings,
    ) -> UaResult<(ItemPlan, SubscriptionRequest)> {
        let node_id = self.check_node(handle)?;
        if self.registry.get(handle, attribute).is_some() {
            return Err(ClientError::already_monitored(handle.0, attribute).into());
        }

        let defaults = &self.config.subscription;
        let request = SubscriptionRequest {
            publishing_interval_ms: settings
                .publishing_interval_ms
                .unwrap_or(defaults.publishing_interval_ms),
            sharing: settings.sharing,
            subscription_id: settings.subscription_id,
            lifetime_count: settings.lifetime_count.unwrap_or(defaults.lifetime_count),
            max_keep_alive_count: settings
                .max_keep_alive_count
                .unwrap_or(defaults.max_keep_alive_count),
            max_notifications_per_publish: settings
                .max_notifications_per_publish
                .unwrap_or(defaults.max_notifications_per_publish),
            priority: settings.priority.unwrap_or(defaults.priority),
        };
        self.subscriptions.check(&request)?;

        let (filter, wire_filter) = resolve_filter(attribute, settings.filter)?;
        let monitoring = &self.config.monitoring;
        let sampling_interval_ms = settings
            .sampling_interval_ms
            .unwrap_or(monitoring.sampling_interval_ms);
        let queue_size = settings.queue_size.unwrap_or(monitoring.queue_size);
        let discard_oldest = settings.discard_oldest.unwrap_or(monitoring.discard_oldest);

        let client_handle = self.registry.reserve(handle, attribute)?;
        let plan = ItemPlan {
            handle,
            attribute,
            node_id,
            client_handle,
            sampling_interval_ms,
            queue_size,
            discard_oldest,
            monitoring_mode: settings.monitoring_mode,
            timestamps: settings.timestamps,
            filter,
            wire_filter,
        };
        Ok((plan, request))
    }

    fn create_item(
        &mut self,
        plan: ItemPlan,
        subscription: Result<u32, StatusCode>,
        reply: Reply<MonitoringResult>,
    ) {
        let subscription_id = match subscription {
            Ok(id) => id,
            Err(status) => {
                self.registry.remove(plan.handle, plan.attribute);
                return self.finish_enable(&plan, MonitoringResult::failed(status), reply);
            }
        };

        match self.subscriptions.get_mut(subscription_id) {
            Some(subscription) => subscription.pending_items += 1,
            None => {
                self.registry.remove(plan.handle, plan.attribute);
                let status = StatusCode::BAD_SUBSCRIPTION_ID_INVALID;
                return self.finish_enable(&plan, MonitoringResult::failed(status), reply);
            }
        }

        let request = CreateMonitoredItemsRequest {
            subscription_id,
            timestamps_to_return: plan.timestamps,
            items_to_create: vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId::new(plan.node_id.clone(), plan.attribute),
                monitoring_mode: plan.monitoring_mode,
                requested_parameters: MonitoringParameters {
                    client_handle: plan.client_handle,
                    sampling_interval: plan.sampling_interval_ms,
                    filter: plan.wire_filter.clone(),
                    queue_size: plan.queue_size,
                    discard_oldest: plan.discard_oldest,
                },
            }],
        };
        self.dispatch(request, move |core, outcome| {
            core.on_item_created(subscription_id, plan, outcome, reply)
        });
    }

    fn on_item_created(
        &mut self,
        subscription_id: u32,
        plan: ItemPlan,
        outcome: ServiceOutcome,
        reply: Reply<MonitoringResult>,
    ) {
        if let Some(subscription) = self.subscriptions.get_mut(subscription_id) {
            subscription.pending_items = subscription.pending_items.saturating_sub(1);
        }

        let created = typed_response::<CreateMonitoredItemsResponse>(outcome).and_then(|response| {
            let result = response
                .results
                .into_iter()
                .next()
                .ok_or(StatusCode::BAD_UNKNOWN_RESPONSE)?;
            if result.status.is_bad() {
                Err(result.status)
            } else {
                Ok(result)
            }
        });

        let result = match created {
            Ok(result) => result,
            Err(status) => {
                let status = self.teardown_status.unwrap_or(status);
                self.registry.remove(plan.handle, plan.attribute);
                self.release_if_empty(subscription_id);
                return self.finish_enable(&plan, MonitoringResult::failed(status), reply);
            }
        };

        if result
            .filter_result
            .as_ref()
            .is_some_and(EventFilterResult::has_errors)
        {
            tracing::warn!(handle = plan.handle.0, attribute = %plan.attribute, "Server reported filter errors");
        }

        let item = MonitoredItem {
            handle: plan.handle,
            attribute: plan.attribute,
            monitored_item_id: result.monitored_item_id,
            client_handle: plan.client_handle,
            sampling_interval_ms: result.revised_sampling_interval,
            queue_size: result.revised_queue_size,
            discard_oldest: plan.discard_oldest,
            monitoring_mode: plan.monitoring_mode,
            filter: plan.filter.clone(),
            filter_result: result.filter_result,
        };

        let Some(subscription) = self.subscriptions.get_mut(subscription_id) else {
            self.registry.remove(plan.handle, plan.attribute);
            let status = StatusCode::BAD_SUBSCRIPTION_ID_INVALID;
            return self.finish_enable(&plan, MonitoringResult::failed(status), reply);
        };
        let state = MonitoringState::new(subscription, &item);
        subscription.items.insert(item.monitored_item_id, item);
        self.registry
            .activate(plan.handle, plan.attribute, subscription_id, result.monitored_item_id);

        tracing::info!(
            handle = plan.handle.0,
            attribute = %plan.attribute,
            subscription_id,
            monitored_item_id = result.monitored_item_id,
            "Monitoring enabled"
        );
        let node_gone = !self.nodes.contains(plan.handle);
        self.finish_enable(
            &plan,
            MonitoringResult {
                status: StatusCode::GOOD,
                state: Some(state),
            },
            reply,
        );

        if node_gone {
            tracing::debug!(handle = plan.handle.0, "Node unregistered while enabling; disabling");
            self.disable_monitoring(plan.handle, plan.attribute, None);
        }
    }

    fn finish_enable(&mut self, plan: &ItemPlan, result: MonitoringResult, reply: Reply<MonitoringResult>) {
        if result.status.is_bad() {
            tracing::warn!(handle = plan.handle.0, attribute = %plan.attribute, status = %result.status, "Enable monitoring failed");
        }
        self.emit(ClientEvent::MonitoringEnabled {
            handle: plan.handle,
            attribute: plan.attribute,
            status: result.status,
        });
        send_reply(reply, Ok(result));
    }

    /// Stops monitoring `(handle, attribute)`.
    ///
    /// Local state is removed at once; the reply carries the server status.
    pub(crate) fn disable_monitoring(
        &mut self,
        handle: NodeHandle,
        attribute: AttributeId,
        reply: Option<Reply<StatusCode>>,
    ) {
        let (subscription_id, monitored_item_id) = match self.registry.active(handle, attribute) {
            Some(ids) => ids,
            None => {
                let error = ClientError::not_monitored(handle.0, attribute).into();
                if let Some(reply) = reply {
                    send_reply(reply, Err(error));
                }
                return;
            }
        };

        self.registry.remove(handle, attribute);
        if let Some(subscription) = self.subscriptions.get_mut(subscription_id) {
            subscription.items.remove(&monitored_item_id);
        }
        tracing::debug!(handle = handle.0, attribute = %attribute, subscription_id, monitored_item_id, "Disabling monitoring");

        let request = DeleteMonitoredItemsRequest {
            subscription_id,
            monitored_item_ids: vec![monitored_item_id],
        };
        self.dispatch(request, move |core, outcome| {
            let status = match typed_response::<DeleteMonitoredItemsResponse>(outcome) {
                Ok(response) => response
                    .results
                    .first()
                    .copied()
                    .unwrap_or(StatusCode::BAD_UNKNOWN_RESPONSE),
                Err(status) => core.teardown_status.unwrap_or(status),
            };
            core.emit(ClientEvent::MonitoringDisabled {
                handle,
                attribute,
                status,
            });
            core.release_if_empty(subscription_id);
            if let Some(reply) = reply {
                send_reply(reply, Ok(status));
            }
        });
    }

    /// Returns the parameters of an active pair.
    pub(crate) fn monitoring_state(&self, handle: NodeHandle, attribute: AttributeId) -> Option<MonitoringState> {
        let (subscription_id, monitored_item_id) = self.registry.active(handle, attribute)?;
        let subscription = self.subscriptions.get(subscription_id)?;
        let item = subscription.items.get(&monitored_item_id)?;
        Some(MonitoringState::new(subscription, item))
    }

    // =========================================================================
    // Modify
    // =========================================================================

    /// Changes one parameter of an active pair.
    pub(crate) fn modify_monitoring(
        &mut self,
        handle: NodeHandle,
        attribute: AttributeId,
        parameter: MonitoringParameter,
        value: ParameterValue,
        reply: Reply<MonitoringResult>,
    ) {
        if let Err((error, reply)) = self.try_modify(handle, attribute, parameter, value, reply) {
            send_reply(reply, Err(error));
        }
    }

    /// Hands the reply back with the error when nothing was dispatched.
    fn try_modify(
        &mut self,
        handle: NodeHandle,
        attribute: AttributeId,
        parameter: MonitoringParameter,
        value: ParameterValue,
        reply: Reply<MonitoringResult>,
    ) -> Result<(), (UaError, Reply<MonitoringResult>)> {
        if let Err(error) = self.check_node(handle) {
            return Err((error, reply));
        }
        let Some((subscription_id, monitored_item_id)) = self.registry.active(handle, attribute) else {
            return Err((ClientError::not_monitored(handle.0, attribute).into(), reply));
        };
        let (subscription, item) = match self
            .subscriptions
            .get(subscription_id)
            .and_then(|s| s.items.get(&monitored_item_id).map(|i| (s, i)))
        {
            Some(found) => found,
            None => {
                return Err((ClientError::not_monitored(handle.0, attribute).into(), reply))
            }
        };

        macro_rules! value_or_reply {
            ($e:expr) => {
                match $e {
                    Ok(v) => v,
                    Err(error) => return Err((UaError::from(error), reply)),
                }
            };
        }

        tracing::debug!(handle = handle.0, attribute = %attribute, parameter = %parameter, "Modifying monitoring");
        match parameter {
            MonitoringParameter::PublishingEnabled => {
                let enabled = value_or_reply!(value.as_bool());
                let request = SetPublishingModeRequest {
                    publishing_enabled: enabled,
                    subscription_ids: vec![subscription_id],
                };
                self.dispatch(request, move |core, outcome| {
                    let status = first_status(typed_response::<SetPublishingModeResponse>(outcome).map(|r| r.results));
                    if status.is_good() {
                        if let Some(subscription) = core.subscriptions.get_mut(subscription_id) {
                            subscription.publishing_enabled = enabled;
                        }
                        core.broadcast_parameters(subscription_id);
                    }
                    core.finish_modify(handle, attribute, status, reply);
                });
            }

            MonitoringParameter::MonitoringMode => {
                let mode = match value {
                    ParameterValue::MonitoringMode(mode) => mode,
                    other => {
                        return Err((other.mismatch("MonitoringMode").into(), reply));
                    }
                };
                let request = SetMonitoringModeRequest {
                    subscription_id,
                    monitoring_mode: mode,
                    monitored_item_ids: vec![monitored_item_id],
                };
                self.dispatch(request, move |core, outcome| {
                    let status = first_status(typed_response::<SetMonitoringModeResponse>(outcome).map(|r| r.results));
                    if status.is_good() {
                        if let Some(item) = core.item_mut(subscription_id, monitored_item_id) {
                            item.monitoring_mode = mode;
                        }
                        core.emit_parameters(handle, attribute);
                    }
                    core.finish_modify(handle, attribute, status, reply);
                });
            }

            MonitoringParameter::PublishingInterval
            | MonitoringParameter::LifetimeCount
            | MonitoringParameter::MaxKeepAliveCount
            | MonitoringParameter::Priority
            | MonitoringParameter::MaxNotificationsPerPublish => {
                let mut request = ModifySubscriptionRequest {
                    subscription_id,
                    requested_publishing_interval: subscription.revised_interval_ms,
                    requested_lifetime_count: subscription.lifetime_count,
                    requested_max_keep_alive_count: subscription.max_keep_alive_count,
                    max_notifications_per_publish: subscription.max_notifications_per_publish,
                    priority: subscription.priority,
                };
                match parameter {
                    MonitoringParameter::PublishingInterval => {
                        request.requested_publishing_interval = value_or_reply!(value.as_f64())
                    }
                    MonitoringParameter::LifetimeCount => {
                        request.requested_lifetime_count = value_or_reply!(value.as_u32())
                    }
                    MonitoringParameter::MaxKeepAliveCount => {
                        request.requested_max_keep_alive_count = value_or_reply!(value.as_u32())
                    }
                    MonitoringParameter::Priority => request.priority = value_or_reply!(value.as_u8()),
                    _ => request.max_notifications_per_publish = value_or_reply!(value.as_u32()),
                }

                let (max_notifications, priority) = (request.max_notifications_per_publish, request.priority);
                self.dispatch(request, move |core, outcome| {
                    let status = match typed_response::<ModifySubscriptionResponse>(outcome) {
                        Ok(response) => {
                            if let Some(subscription) = core.subscriptions.get_mut(subscription_id) {
                                subscription.revised_interval_ms = response.revised_publishing_interval;
                                subscription.lifetime_count = response.revised_lifetime_count;
                                subscription.max_keep_alive_count = response.revised_max_keep_alive_count;
                                subscription.max_notifications_per_publish = max_notifications;
                                subscription.priority = priority;
                            }
                            core.broadcast_parameters(subscription_id);
                            StatusCode::GOOD
                        }
                        Err(status) => status,
                    };
                    core.finish_modify(handle, attribute, status, reply);
                });
            }

            MonitoringParameter::SamplingInterval
            | MonitoringParameter::QueueSize
            | MonitoringParameter::DiscardOldest
            | MonitoringParameter::Filter => {
                let mut parameters = MonitoringParameters {
                    client_handle: item.client_handle,
                    sampling_interval: item.sampling_interval_ms,
                    filter: None,
                    queue_size: item.queue_size,
                    discard_oldest: item.discard_oldest,
                };
                let mut filter = item.filter.clone();
                match parameter {
                    MonitoringParameter::SamplingInterval => {
                        parameters.sampling_interval = value_or_reply!(value.as_f64())
                    }
                    MonitoringParameter::QueueSize => parameters.queue_size = value_or_reply!(value.as_u32()),
                    MonitoringParameter::DiscardOldest => {
                        parameters.discard_oldest = value_or_reply!(value.as_bool())
                    }
                    _ => {
                        filter = match value {
                            ParameterValue::Filter(filter) => Some(filter),
                            ParameterValue::None => None,
                            other => return Err((other.mismatch("Filter").into(), reply)),
                        }
                    }
                }
                let (filter, wire_filter) = value_or_reply!(resolve_filter(attribute, filter));
                parameters.filter = wire_filter;
                let discard_oldest = parameters.discard_oldest;

                let request = ModifyMonitoredItemsRequest {
                    subscription_id,
                    timestamps_to_return: TimestampsToReturn::Both,
                    items_to_modify: vec![MonitoredItemModifyRequest {
                        monitored_item_id,
                        requested_parameters: parameters,
                    }],
                };
                self.dispatch(request, move |core, outcome| {
                    let result = typed_response::<ModifyMonitoredItemsResponse>(outcome)
                        .and_then(|r| r.results.into_iter().next().ok_or(StatusCode::BAD_UNKNOWN_RESPONSE));
                    let status = match result {
                        Ok(result) if result.status.is_good() => {
                            if let Some(item) = core.item_mut(subscription_id, monitored_item_id) {
                                item.sampling_interval_ms = result.revised_sampling_interval;
                                item.queue_size = result.revised_queue_size;
                                item.discard_oldest = discard_oldest;
                                item.filter = filter;
                                item.filter_result = result.filter_result;
                            }
                            core.emit_parameters(handle, attribute);
                            result.status
                        }
                        Ok(result) => result.status,
                        Err(status) => status,
                    };
                    core.finish_modify(handle, attribute, status, reply);
                });
            }

            MonitoringParameter::IndexRange | MonitoringParameter::Triggering => {
                return Err((
                    ClientError::not_implemented(format!("modify {}", parameter)).into(),
                    reply,
                ));
            }
        }
        Ok(())
    }

    fn item_mut(&mut self, subscription_id: u32, monitored_item_id: u32) -> Option<&mut MonitoredItem> {
        self.subscriptions
            .get_mut(subscription_id)?
            .items
            .get_mut(&monitored_item_id)
    }

    fn emit_parameters(&self, handle: NodeHandle, attribute: AttributeId) {
        if let Some(state) = self.monitoring_state(handle, attribute) {
            self.emit(ClientEvent::MonitoringParametersChanged {
                handle,
                attribute,
                state: Box::new(state),
            });
        }
    }

    /// Re-broadcasts subscription-level parameters to all of its items.
    fn broadcast_parameters(&self, subscription_id: u32) {
        let Some(subscription) = self.subscriptions.get(subscription_id) else {
            return;
        };
        let mut items: Vec<_> = subscription.items.values().collect();
        items.sort_by_key(|item| item.monitored_item_id);
        for item in items {
            self.emit(ClientEvent::MonitoringParametersChanged {
                handle: item.handle,
                attribute: item.attribute,
                state: Box::new(MonitoringState::new(subscription, item)),
            });
        }
    }

    fn finish_modify(
        &mut self,
        handle: NodeHandle,
        attribute: AttributeId,
        status: StatusCode,
        reply: Reply<MonitoringResult>,
    ) {
        let status = self.teardown_status.unwrap_or(status);
        if status.is_bad() {
            tracing::warn!(handle = handle.0, attribute = %attribute, status = %status, "Modify monitoring failed");
        }
        let state = status
            .is_good()
            .then(|| self.monitoring_state(handle, attribute))
            .flatten();
        send_reply(reply, Ok(MonitoringResult { status, state }));
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub(crate) fn route_data_change(&mut self, subscription_id: u32, monitored_item_id: u32, value: &DataValue) {
        let Some((handle, attribute)) = self.registry.route(subscription_id, monitored_item_id) else {
            self.stats.record_notification(false);
            tracing::trace!(subscription_id, monitored_item_id, "Dropping notification for unknown item");
            return;
        };
        self.stats.record_notification(true);

        let value = AttributeValue::from_data_value(value, self.value_type(handle, attribute));
        self.nodes.update_cache(handle, attribute, value.clone());
        self.emit(ClientEvent::DataChanged {
            handle,
            attribute,
            value,
        });
    }

    pub(crate) fn route_event(&mut self, subscription_id: u32, monitored_item_id: u32, fields: &[Variant]) {
        let Some((handle, _)) = self.registry.route(subscription_id, monitored_item_id) else {
            self.stats.record_notification(false);
            tracing::trace!(subscription_id, monitored_item_id, "Dropping event for unknown item");
            return;
        };
        self.stats.record_notification(true);

        self.emit(ClientEvent::EventReceived {
            handle,
            fields: fields.iter().map(codec::decode).collect(),
        });
    }
}

fn first_status(results: Result<Vec<StatusCode>, StatusCode>) -> StatusCode {
    match results {
        Ok(results) => results
            .first()
            .copied()
            .unwrap_or(StatusCode::BAD_UNKNOWN_RESPONSE),
        Err(status) => status,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::filter::{DataChangeFilter, DeadbandType};

    #[test]
    fn test_reserve_rejects_duplicates() {
        let mut registry = MonitoringRegistry::default();
        let handle = NodeHandle(1);
        let first = registry.reserve(handle, AttributeId::Value).unwrap();
        assert!(matches!(
            registry.reserve(handle, AttributeId::Value),
            Err(ClientError::AlreadyMonitored { .. })
        ));
        let second = registry.reserve(handle, AttributeId::DisplayName).unwrap();
        assert_ne!(first, second);
        assert_eq!(registry.get(handle, AttributeId::Value), Some(RegistryEntry::Pending));
        assert_eq!(registry.active(handle, AttributeId::Value), None);
    }

    #[test]
    fn test_activate_and_route() {
        let mut registry = MonitoringRegistry::default();
        let handle = NodeHandle(4);
        registry.reserve(handle, AttributeId::Value).unwrap();
        registry.activate(handle, AttributeId::Value, 10, 100);

        assert_eq!(registry.route(10, 100), Some((handle, AttributeId::Value)));
        assert_eq!(registry.route(10, 101), None);
        assert_eq!(registry.active_for(handle), vec![AttributeId::Value]);

        registry.remove(handle, AttributeId::Value);
        assert_eq!(registry.route(10, 100), None);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_resolve_filter() {
        let (filter, wire) = resolve_filter(AttributeId::EventNotifier, None).unwrap();
        assert!(matches!(filter, Some(MonitoringFilter::Event(_))));
        assert!(matches!(wire, Some(WireFilter::Event { .. })));

        let data_change = MonitoringFilter::DataChange(DataChangeFilter {
            deadband_type: DeadbandType::Absolute,
            deadband_value: 0.5,
            ..DataChangeFilter::default()
        });
        assert!(resolve_filter(AttributeId::EventNotifier, Some(data_change.clone())).is_err());
        assert!(resolve_filter(AttributeId::Value, Some(data_change)).is_ok());
        assert!(resolve_filter(AttributeId::Value, Some(default_event_filter())).is_err());
        assert_eq!(resolve_filter(AttributeId::Value, None).unwrap(), (None, None));
    }

    #[test]
    fn test_parameter_value_coercion() {
        assert_eq!(ParameterValue::UInt32(250).as_f64().unwrap(), 250.0);
        assert_eq!(ParameterValue::UInt32(7).as_u8().unwrap(), 7);
        assert!(ParameterValue::UInt32(300).as_u8().is_err());
        assert!(matches!(
            ParameterValue::Double(1.0).as_bool(),
            Err(ClientError::TypeMismatch { .. })
        ));
    }
}
