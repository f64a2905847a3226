// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! End-to-end tests of the client runtime against a scripted stack.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use uaflow_client::client::{
    BrowseOptions, HistoryReadRawRequest, HistoryState, MonitoringParameter,
};
use uaflow_client::codec::{self, DataValue, DynamicValue, Variant, WireType};
use uaflow_client::error::ClientError;
use uaflow_client::stack::services::*;
use uaflow_client::stack::{RequestId, ServiceOutcome, ServiceRequest, ServiceResponse};
use uaflow_client::types::{LocalizedText, NodeClass, QualifiedName};
use uaflow_client::{
    AttributeId, Client, ClientConfig, ClientEvent, ConnectionState, EndpointDescriptor,
    MonitoringSettings, NodeId, Stack, StackEvent, StatusCode, UaError,
};

// =============================================================================
// Scripted stack
// =============================================================================

#[derive(Default)]
struct MockState {
    next_request: RequestId,
    next_subscription: u32,
    next_item: u32,
    calls: Vec<ServiceRequest>,
    queue: VecDeque<StackEvent>,
    reject_next: Option<StatusCode>,
    /// Refuses the next call of one service at dispatch.
    reject_service: Option<(ServiceKind, StatusCode)>,
    /// Fails the next call of one service with a bad outcome.
    fail_service: Option<(ServiceKind, StatusCode)>,
    /// Completions stay queued while set.
    paused: bool,
    revised_interval_ms: Option<f64>,
    read_results_limit: Option<usize>,
    read_overrides: Vec<(AttributeId, Variant)>,
    browse_pages: VecDeque<BrowseResult>,
    history_pages: VecDeque<HistoryReadResponse>,
    disconnects: u32,
}

impl MockState {
    fn respond(&mut self, request: &ServiceRequest) -> ServiceOutcome {
        if let Some((kind, status)) = self.fail_service {
            if kind == request.kind() {
                self.fail_service = None;
                return Err(status);
            }
        }
        let response: ServiceResponse = match request {
            ServiceRequest::Read(read) => ReadResponse {
                results: read
                    .nodes_to_read
                    .iter()
                    .take(self.read_results_limit.unwrap_or(usize::MAX))
                    .map(|id| {
                        let value = self
                            .read_overrides
                            .iter()
                            .find(|(attribute, _)| *attribute == id.attribute_id)
                            .map(|(_, value)| value.clone())
                            .unwrap_or(Variant::Double(21.5));
                        DataValue::new(value)
                    })
                    .collect(),
            }
            .into(),
            ServiceRequest::Browse(_) => BrowseResponse {
                results: self.browse_pages.pop_front().into_iter().collect(),
            }
            .into(),
            ServiceRequest::BrowseNext(_) => BrowseNextResponse {
                results: self.browse_pages.pop_front().into_iter().collect(),
            }
            .into(),
            ServiceRequest::Call(call) => CallResponse {
                results: call
                    .methods_to_call
                    .iter()
                    .map(|method| CallMethodResult {
                        status: StatusCode::GOOD,
                        input_argument_results: vec![StatusCode::GOOD; method.input_arguments.len()],
                        output_arguments: method.input_arguments.clone(),
                    })
                    .collect(),
            }
            .into(),
            ServiceRequest::TranslateBrowsePaths(translate) => TranslateBrowsePathsResponse {
                results: translate
                    .browse_paths
                    .iter()
                    .map(|path| {
                        let names: Vec<&str> = path
                            .relative_path
                            .iter()
                            .map(|element| element.target_name.name.as_str())
                            .collect();
                        BrowsePathResult {
                            status: StatusCode::GOOD,
                            targets: vec![BrowsePathTarget {
                                target_id: NodeId::string(2, names.join(".")).into(),
                                remaining_path_index: u32::MAX,
                            }],
                        }
                    })
                    .collect(),
            }
            .into(),
            ServiceRequest::Write(write) => WriteResponse {
                results: vec![StatusCode::GOOD; write.nodes_to_write.len()],
            }
            .into(),
            ServiceRequest::CreateSubscription(create) => {
                self.next_subscription += 1;
                CreateSubscriptionResponse {
                    subscription_id: self.next_subscription,
                    revised_publishing_interval: self
                        .revised_interval_ms
                        .unwrap_or(create.requested_publishing_interval),
                    revised_lifetime_count: create.requested_lifetime_count,
                    revised_max_keep_alive_count: create.requested_max_keep_alive_count,
                }
                .into()
            }
            ServiceRequest::ModifySubscription(modify) => ModifySubscriptionResponse {
                revised_publishing_interval: modify.requested_publishing_interval,
                revised_lifetime_count: modify.requested_lifetime_count,
                revised_max_keep_alive_count: modify.requested_max_keep_alive_count,
            }
            .into(),
            ServiceRequest::DeleteSubscriptions(delete) => DeleteSubscriptionsResponse {
                results: vec![StatusCode::GOOD; delete.subscription_ids.len()],
            }
            .into(),
            ServiceRequest::CreateMonitoredItems(create) => CreateMonitoredItemsResponse {
                results: create
                    .items_to_create
                    .iter()
                    .map(|item| {
                        self.next_item += 1;
                        MonitoredItemCreateResult {
                            status: StatusCode::GOOD,
                            monitored_item_id: self.next_item,
                            revised_sampling_interval: item.requested_parameters.sampling_interval,
                            revised_queue_size: item.requested_parameters.queue_size,
                            filter_result: None,
                        }
                    })
                    .collect(),
            }
            .into(),
            ServiceRequest::ModifyMonitoredItems(modify) => ModifyMonitoredItemsResponse {
                results: modify
                    .items_to_modify
                    .iter()
                    .map(|item| MonitoredItemModifyResult {
                        status: StatusCode::GOOD,
                        revised_sampling_interval: item.requested_parameters.sampling_interval,
                        revised_queue_size: item.requested_parameters.queue_size,
                        filter_result: None,
                    })
                    .collect(),
            }
            .into(),
            ServiceRequest::DeleteMonitoredItems(delete) => DeleteMonitoredItemsResponse {
                results: vec![StatusCode::GOOD; delete.monitored_item_ids.len()],
            }
            .into(),
            ServiceRequest::HistoryRead(read) if read.release_continuation_points => {
                HistoryReadResponse {
                    results: vec![HistoryReadResult::default(); read.nodes_to_read.len()],
                }
                .into()
            }
            ServiceRequest::HistoryRead(_) => match self.history_pages.pop_front() {
                Some(page) => page.into(),
                None => return Err(StatusCode::BAD_NO_DATA),
            },
            _ => return Err(StatusCode::BAD_SERVICE_UNSUPPORTED),
        };
        Ok(response)
    }
}

#[derive(Clone, Default)]
struct MockStack {
    state: Arc<Mutex<MockState>>,
}

impl MockStack {
    fn calls_of(&self, predicate: impl Fn(&ServiceRequest) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    fn push_event(&self, event: StackEvent) {
        self.state.lock().queue.push_back(event);
    }
}

#[async_trait]
impl Stack for MockStack {
    async fn connect(&mut self, _endpoint: &EndpointDescriptor) -> StatusCode {
        StatusCode::GOOD
    }

    async fn disconnect(&mut self) {
        let mut state = self.state.lock();
        state.disconnects += 1;
        state.queue.clear();
    }

    fn service_call(&mut self, request: ServiceRequest) -> Result<RequestId, StatusCode> {
        let mut state = self.state.lock();
        if let Some(status) = state.reject_next.take() {
            return Err(status);
        }
        if let Some((kind, status)) = state.reject_service {
            if kind == request.kind() {
                state.reject_service = None;
                return Err(status);
            }
        }
        state.next_request += 1;
        let request_id = state.next_request;
        let outcome = state.respond(&request);
        state.calls.push(request);
        state.queue.push_back(StackEvent::ServiceCompleted {
            request_id,
            outcome,
        });
        Ok(request_id)
    }

    async fn drive(&mut self, _max_wait: Duration, events: &mut Vec<StackEvent>) -> StatusCode {
        let mut state = self.state.lock();
        if !state.paused {
            events.extend(state.queue.drain(..));
        }
        StatusCode::GOOD
    }

    fn display_name(&self) -> String {
        "mock".to_string()
    }
}

// =============================================================================
// Helpers
// =============================================================================

const WAIT: Duration = Duration::from_secs(5);

async fn connected_client() -> (Client, MockStack) {
    let stack = MockStack::default();
    let config = ClientConfig::builder()
        .drive_interval(Duration::from_millis(5))
        .drive_max_wait(Duration::from_millis(1))
        .build()
        .unwrap();
    let client = Client::builder(stack.clone()).config(config).spawn().unwrap();
    client
        .connect(EndpointDescriptor::new("opc.tcp://localhost:4840"))
        .await
        .unwrap();
    (client, stack)
}

fn node_id(name: &str) -> NodeId {
    NodeId::string(2, name)
}

fn drain(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn wait_for(condition: impl Fn() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap();
}

async fn next_events(
    rx: &mut broadcast::Receiver<ClientEvent>,
    count: usize,
    wanted: impl Fn(&ClientEvent) -> bool,
) -> Vec<ClientEvent> {
    tokio::time::timeout(WAIT, async {
        let mut found = Vec::new();
        while found.len() < count {
            let event = rx.recv().await.unwrap();
            if wanted(&event) {
                found.push(event);
            }
        }
        found
    })
    .await
    .unwrap()
}

fn reference(name: &str) -> ReferenceDescription {
    ReferenceDescription {
        reference_type_id: NodeId::numeric(0, 35),
        is_forward: true,
        node_id: node_id(name).into(),
        browse_name: QualifiedName::new(2, name),
        display_name: LocalizedText::new("en", name),
        node_class: NodeClass::Variable,
        type_definition: NodeId::numeric(0, 63).into(),
    }
}

fn client_error(error: UaError) -> ClientError {
    match error {
        UaError::Client(inner) => inner,
        other => panic!("expected a client error, got {other:?}"),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_codec_array_round_trip() {
    let value = DynamicValue::Array(vec![DynamicValue::Double(1.5), DynamicValue::Double(-2.0)]);
    let wire = codec::encode(&value, Some(WireType::Double)).unwrap();
    assert_eq!(codec::decode(&wire), value);
    assert!(codec::encode(&value, Some(WireType::Int32)).is_err());
}

#[tokio::test]
async fn test_read_and_write() {
    let (client, stack) = connected_client().await;
    let node = client.node(node_id("Boiler.Temperature")).await.unwrap();

    let results = node
        .read_attributes(&[AttributeId::Value, AttributeId::DisplayName])
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].attribute, AttributeId::Value);
    assert_eq!(results[0].value.value, DynamicValue::Double(21.5));

    let cached = node.attribute(AttributeId::Value).await.unwrap().unwrap();
    assert_eq!(cached.value, DynamicValue::Double(21.5));

    let written = node.write_attribute(AttributeId::Value, 42.0_f64).await.unwrap();
    assert_eq!(written.status, StatusCode::GOOD);
    let cached = node.attribute(AttributeId::Value).await.unwrap().unwrap();
    assert_eq!(cached.value, DynamicValue::Double(42.0));

    assert_eq!(stack.calls_of(|c| matches!(c, ServiceRequest::Read(_))), 1);
    client.shutdown().await;
}

#[tokio::test]
async fn test_double_enable_is_rejected() {
    let (client, _stack) = connected_client().await;
    let node = client.node(node_id("Pump.Speed")).await.unwrap();

    let first = node
        .enable_monitoring(AttributeId::Value, MonitoringSettings::new())
        .await
        .unwrap();
    assert!(first.is_good());

    let second = node
        .enable_monitoring(AttributeId::Value, MonitoringSettings::new())
        .await
        .unwrap_err();
    assert!(matches!(client_error(second), ClientError::AlreadyMonitored { .. }));
    client.shutdown().await;
}

#[tokio::test]
async fn test_shared_subscription_respects_floor() {
    let (client, stack) = connected_client().await;
    stack.state.lock().revised_interval_ms = Some(500.0);

    let a = client.node(node_id("A")).await.unwrap();
    let b = client.node(node_id("B")).await.unwrap();

    let first = a
        .enable_monitoring(
            AttributeId::Value,
            MonitoringSettings::new().publishing_interval_ms(100.0),
        )
        .await
        .unwrap();
    let second = b
        .enable_monitoring(
            AttributeId::Value,
            MonitoringSettings::new().publishing_interval_ms(200.0),
        )
        .await
        .unwrap();

    let first = first.state.unwrap();
    let second = second.state.unwrap();
    assert_eq!(first.subscription_id, second.subscription_id);
    assert_eq!(second.publishing_interval_ms, 500.0);
    assert_eq!(
        stack.calls_of(|c| matches!(c, ServiceRequest::CreateSubscription(_))),
        1
    );
    assert_eq!(client.stats().subscriptions_shared, 1);
    client.shutdown().await;
}

#[tokio::test]
async fn test_exclusive_never_shares() {
    let (client, stack) = connected_client().await;
    let a = client.node(node_id("A")).await.unwrap();
    let b = client.node(node_id("B")).await.unwrap();

    a.enable_monitoring(AttributeId::Value, MonitoringSettings::new())
        .await
        .unwrap();
    let exclusive = b
        .enable_monitoring(AttributeId::Value, MonitoringSettings::new().exclusive())
        .await
        .unwrap();
    assert!(exclusive.is_good());
    assert_eq!(
        stack.calls_of(|c| matches!(c, ServiceRequest::CreateSubscription(_))),
        2
    );
    client.shutdown().await;
}

#[tokio::test]
async fn test_data_change_reaches_node_events() {
    let (client, stack) = connected_client().await;
    let node = client.node(node_id("Tank.Level")).await.unwrap();
    let mut events = node.events();

    let enabled = node
        .enable_monitoring(AttributeId::Value, MonitoringSettings::new())
        .await
        .unwrap();
    let state = enabled.state.unwrap();

    stack.push_event(StackEvent::DataChange {
        subscription_id: state.subscription_id,
        monitored_item_id: state.monitored_item_id,
        value: DataValue::new(Variant::Float(3.5)),
    });

    let changed = tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Some(ClientEvent::DataChanged { value, .. }) => return Some(value),
                Some(_) => continue,
                None => return None,
            }
        }
    })
    .await
    .unwrap()
    .unwrap();
    assert_eq!(changed.value, DynamicValue::Float(3.5));
    assert_eq!(client.stats().notifications_routed, 1);
    client.shutdown().await;
}

#[tokio::test]
async fn test_last_item_disable_releases_subscription() {
    let (client, stack) = connected_client().await;
    let node = client.node(node_id("Valve.Open")).await.unwrap();
    node.enable_monitoring(AttributeId::Value, MonitoringSettings::new())
        .await
        .unwrap();

    let status = node.disable_monitoring(AttributeId::Value).await.unwrap();
    assert_eq!(status, StatusCode::GOOD);
    assert_eq!(
        stack.calls_of(|c| matches!(c, ServiceRequest::DeleteSubscriptions(_))),
        1
    );
    assert!(node.monitoring_state(AttributeId::Value).await.unwrap().is_none());

    let error = node
        .modify_monitoring(AttributeId::Value, MonitoringParameter::SamplingInterval, 100.0_f64)
        .await
        .unwrap_err();
    assert!(matches!(client_error(error), ClientError::NotMonitored { .. }));
    client.shutdown().await;
}

#[tokio::test]
async fn test_modify_sampling_interval() {
    let (client, _stack) = connected_client().await;
    let node = client.node(node_id("Motor.Current")).await.unwrap();
    node.enable_monitoring(AttributeId::Value, MonitoringSettings::new())
        .await
        .unwrap();

    let result = node
        .modify_monitoring(AttributeId::Value, MonitoringParameter::SamplingInterval, 1000.0_f64)
        .await
        .unwrap();
    assert!(result.is_good());
    let state = node.monitoring_state(AttributeId::Value).await.unwrap().unwrap();
    assert_eq!(state.sampling_interval_ms, 1000.0);

    let mismatch = node
        .modify_monitoring(AttributeId::Value, MonitoringParameter::QueueSize, true)
        .await
        .unwrap_err();
    assert!(matches!(client_error(mismatch), ClientError::TypeMismatch { .. }));

    let unsupported = node
        .modify_monitoring(AttributeId::Value, MonitoringParameter::Triggering, 1_u32)
        .await
        .unwrap_err();
    assert!(matches!(client_error(unsupported), ClientError::NotImplemented { .. }));
    client.shutdown().await;
}

#[tokio::test]
async fn test_teardown_disables_every_item() {
    let (client, stack) = connected_client().await;
    let mut rx = client.events();

    let mut nodes = Vec::new();
    for name in ["N1", "N2", "N3"] {
        let node = client.node(node_id(name)).await.unwrap();
        node.enable_monitoring(AttributeId::Value, MonitoringSettings::new())
            .await
            .unwrap();
        nodes.push(node);
    }
    drain(&mut rx);

    client.disconnect().await.unwrap();
    let disabled: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            ClientEvent::MonitoringDisabled { status, .. } => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(disabled, vec![StatusCode::BAD_DISCONNECT; 3]);
    assert_eq!(stack.state.lock().disconnects, 1);
    assert_eq!(client.state().await.unwrap(), ConnectionState::Disconnected);

    let error = nodes[0]
        .monitoring_state(AttributeId::Value)
        .await
        .unwrap_err();
    assert!(matches!(client_error(error), ClientError::NotConnected));

    client
        .connect(EndpointDescriptor::new("opc.tcp://localhost:4840"))
        .await
        .unwrap();
    for node in &nodes {
        assert!(node.monitoring_state(AttributeId::Value).await.unwrap().is_none());
    }
    client.shutdown().await;
}

#[tokio::test]
async fn test_history_pagination_concatenates_pages() {
    let (client, stack) = connected_client().await;
    let point = |v: i32| DataValue::new(Variant::Int32(v));
    {
        let mut state = stack.state.lock();
        state.history_pages.push_back(HistoryReadResponse {
            results: vec![
                HistoryReadResult {
                    status: StatusCode::GOOD,
                    continuation_point: b"a1".to_vec(),
                    data_values: vec![point(1), point(2)],
                },
                HistoryReadResult {
                    status: StatusCode::GOOD,
                    continuation_point: Vec::new(),
                    data_values: vec![point(10)],
                },
            ],
        });
        state.history_pages.push_back(HistoryReadResponse {
            results: vec![HistoryReadResult {
                status: StatusCode::GOOD,
                continuation_point: Vec::new(),
                data_values: vec![point(3)],
            }],
        });
    }

    let request = HistoryReadRawRequest::new(
        vec![node_id("Flow"), node_id("Pressure")],
        Utc::now() - chrono::Duration::hours(1),
        Utc::now(),
    )
    .max_values_per_node(2);
    let reader = client.history_read_raw(request).await.unwrap();
    assert_eq!(reader.state().await.unwrap(), HistoryState::Reading);

    let first = reader.read_more().await.unwrap();
    assert_eq!(first.state, HistoryState::MoreDataAvailable);

    let second = reader.read_more().await.unwrap();
    assert_eq!(second.state, HistoryState::Finished);
    let flow: Vec<_> = second.results[0].values.iter().map(|v| v.value.clone()).collect();
    assert_eq!(
        flow,
        vec![DynamicValue::Int32(1), DynamicValue::Int32(2), DynamicValue::Int32(3)]
    );
    assert_eq!(second.results[1].values.len(), 1);

    let history_reads: Vec<usize> = stack
        .state
        .lock()
        .calls
        .iter()
        .filter_map(|c| match c {
            ServiceRequest::HistoryRead(read) => Some(read.nodes_to_read.len()),
            _ => None,
        })
        .collect();
    assert_eq!(history_reads, vec![2, 1]);

    let error = reader.read_more().await.unwrap_err();
    assert!(matches!(client_error(error), ClientError::InvalidState { .. }));
    client.shutdown().await;
}

#[tokio::test]
async fn test_history_release_frees_continuation_points() {
    let (client, stack) = connected_client().await;
    stack.state.lock().history_pages.push_back(HistoryReadResponse {
        results: vec![HistoryReadResult {
            status: StatusCode::GOOD,
            continuation_point: b"cp".to_vec(),
            data_values: vec![DataValue::new(Variant::Int32(1))],
        }],
    });

    let request = HistoryReadRawRequest::new(vec![node_id("Flow")], Utc::now(), Utc::now())
        .max_values_per_node(1);
    let reader = client.history_read_raw(request).await.unwrap();
    let page = reader.read_more().await.unwrap();
    assert_eq!(page.state, HistoryState::MoreDataAvailable);

    let status = reader.release().await.unwrap();
    assert_eq!(status, StatusCode::GOOD);

    let release = stack
        .state
        .lock()
        .calls
        .iter()
        .find_map(|c| match c {
            ServiceRequest::HistoryRead(read) if read.release_continuation_points => Some(read.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(release.details.num_values_per_node, 0);
    assert_eq!(release.nodes_to_read[0].continuation_point, b"cp".to_vec());
    client.shutdown().await;
}

#[tokio::test]
async fn test_history_rejects_empty_node_list() {
    let (client, _stack) = connected_client().await;
    let request = HistoryReadRawRequest::new(Vec::new(), Utc::now(), Utc::now());
    let error = client.history_read_raw(request).await.unwrap_err();
    assert_eq!(error.status_code(), StatusCode::BAD_NOTHING_TO_DO);
    client.shutdown().await;
}

#[tokio::test]
async fn test_stack_rejection_fails_immediately() {
    let (client, stack) = connected_client().await;
    let node = client.node(node_id("Busy")).await.unwrap();
    stack.state.lock().reject_next = Some(StatusCode::BAD_TOO_MANY_OPERATIONS);

    let results = node
        .read_attributes(&[AttributeId::Value, AttributeId::BrowseName])
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results
        .iter()
        .all(|r| r.value.status == StatusCode::BAD_TOO_MANY_OPERATIONS));

    let stats = client.stats();
    assert_eq!(stats.requests_rejected, 1);
    assert_eq!(stats.in_flight(), 0);
    client.shutdown().await;
}

#[tokio::test]
async fn test_operations_fail_when_not_connected() {
    let (client, stack) = connected_client().await;
    let node = client.node(node_id("Line.Speed")).await.unwrap();
    client.disconnect().await.unwrap();

    let error = node.read_attribute(AttributeId::Value).await.unwrap_err();
    assert!(matches!(client_error(error), ClientError::NotConnected));

    let error = client
        .read_node_attributes(&[(&node, AttributeId::Value)])
        .await
        .unwrap_err();
    assert_eq!(error.status_code(), StatusCode::BAD_NOT_CONNECTED);

    let error = node
        .enable_monitoring(AttributeId::Value, MonitoringSettings::new())
        .await
        .unwrap_err();
    assert!(matches!(client_error(error), ClientError::NotConnected));

    // Nothing reached the stack.
    assert!(stack.state.lock().calls.is_empty());
    client.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_worker() {
    let (client, stack) = connected_client().await;
    client.shutdown().await;
    assert!(!client.is_running());
    assert_eq!(stack.state.lock().disconnects, 1);

    let error = client.state().await.unwrap_err();
    assert!(matches!(client_error(error), ClientError::WorkerStopped));
}

#[tokio::test]
async fn test_joined_enable_survives_sibling_rejection() {
    let (client, stack) = connected_client().await;
    let a = client.node(node_id("Joined.A")).await.unwrap();
    let b = client.node(node_id("Joined.B")).await.unwrap();
    stack.state.lock().paused = true;

    let (first, second, ()) = tokio::join!(
        a.enable_monitoring(AttributeId::Value, MonitoringSettings::new()),
        async {
            wait_for(|| stack.calls_of(|c| matches!(c, ServiceRequest::CreateSubscription(_))) == 1)
                .await;
            b.enable_monitoring(AttributeId::Value, MonitoringSettings::new())
                .await
        },
        async {
            wait_for(|| client.stats().subscriptions_shared == 1).await;
            let mut state = stack.state.lock();
            state.reject_service = Some((
                ServiceKind::CreateMonitoredItems,
                StatusCode::BAD_TOO_MANY_OPERATIONS,
            ));
            state.paused = false;
        },
    );

    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.status, StatusCode::BAD_TOO_MANY_OPERATIONS);
    assert!(second.is_good());
    assert_eq!(second.state.unwrap().subscription_id, 1);
    assert_eq!(
        stack.calls_of(|c| matches!(c, ServiceRequest::CreateSubscription(_))),
        1
    );
    assert_eq!(
        stack.calls_of(|c| matches!(c, ServiceRequest::DeleteSubscriptions(_))),
        0
    );
    assert!(a.monitoring_state(AttributeId::Value).await.unwrap().is_none());
    assert!(b.monitoring_state(AttributeId::Value).await.unwrap().is_some());
    client.shutdown().await;
}

#[tokio::test]
async fn test_browse_follows_continuation_points() {
    let (client, stack) = connected_client().await;
    {
        let mut state = stack.state.lock();
        state.browse_pages.push_back(BrowseResult {
            status: StatusCode::GOOD,
            continuation_point: b"c1".to_vec(),
            references: vec![reference("Line.Speed"), reference("Line.Torque")],
        });
        state.browse_pages.push_back(BrowseResult {
            status: StatusCode::GOOD,
            continuation_point: Vec::new(),
            references: vec![reference("Line.State")],
        });
    }

    let node = client.node(node_id("Line")).await.unwrap();
    let outcome = node
        .browse(BrowseOptions::default().max_references_per_node(2))
        .await
        .unwrap();
    assert_eq!(outcome.status, StatusCode::GOOD);
    let names: Vec<_> = outcome
        .references
        .iter()
        .map(|r| r.browse_name.name.as_str())
        .collect();
    assert_eq!(names, vec!["Line.Speed", "Line.Torque", "Line.State"]);

    let calls = stack.state.lock().calls.clone();
    let next: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            ServiceRequest::BrowseNext(next) => Some(next.continuation_points.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(next, vec![vec![b"c1".to_vec()]]);
    assert_eq!(stack.calls_of(|c| matches!(c, ServiceRequest::Browse(_))), 1);
    client.shutdown().await;
}

#[tokio::test]
async fn test_call_method_decodes_outputs() {
    let (client, stack) = connected_client().await;
    let node = client.node(node_id("Pump")).await.unwrap();

    let result = node
        .call_method(
            node_id("Pump.Start"),
            vec![DynamicValue::Double(2.5), DynamicValue::Boolean(true)],
        )
        .await
        .unwrap();
    assert_eq!(result.status, StatusCode::GOOD);
    assert_eq!(result.input_argument_results, vec![StatusCode::GOOD; 2]);
    assert_eq!(
        result.outputs,
        vec![DynamicValue::Double(2.5), DynamicValue::Boolean(true)]
    );

    let call = stack
        .state
        .lock()
        .calls
        .iter()
        .find_map(|c| match c {
            ServiceRequest::Call(call) => Some(call.methods_to_call[0].clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(call.object_id, node_id("Pump"));
    assert_eq!(call.method_id, node_id("Pump.Start"));
    client.shutdown().await;
}

#[tokio::test]
async fn test_resolve_browse_path() {
    let (client, stack) = connected_client().await;
    let node = client.node(node_id("Plant")).await.unwrap();

    let outcome = node
        .resolve_browse_path(vec![QualifiedName::new(2, "Motor"), QualifiedName::new(2, "Speed")])
        .await
        .unwrap();
    assert_eq!(outcome.status, StatusCode::GOOD);
    assert_eq!(outcome.node_id(), Some(&node_id("Motor.Speed")));

    let path = stack
        .state
        .lock()
        .calls
        .iter()
        .find_map(|c| match c {
            ServiceRequest::TranslateBrowsePaths(t) => Some(t.browse_paths[0].clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(path.starting_node, node_id("Plant"));
    assert_eq!(path.relative_path.len(), 2);
    assert!(path.relative_path.iter().all(|hop| !hop.is_inverse));
    client.shutdown().await;
}

#[tokio::test]
async fn test_session_fatal_completion_tears_down() {
    let (client, stack) = connected_client().await;
    let mut rx = client.events();
    let node = client.node(node_id("Session.Watch")).await.unwrap();
    node.enable_monitoring(AttributeId::Value, MonitoringSettings::new())
        .await
        .unwrap();
    drain(&mut rx);

    stack.state.lock().fail_service = Some((ServiceKind::Read, StatusCode::BAD_SESSION_CLOSED));
    let value = node.read_attribute(AttributeId::Value).await.unwrap();
    assert_eq!(value.status, StatusCode::BAD_SESSION_CLOSED);

    assert_eq!(client.state().await.unwrap(), ConnectionState::Disconnected);
    assert_eq!(stack.state.lock().disconnects, 1);
    assert_eq!(client.stats().teardowns, 1);

    let disabled: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            ClientEvent::MonitoringDisabled { status, .. } => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(disabled, vec![StatusCode::BAD_DISCONNECT]);
    client.shutdown().await;
}

#[tokio::test]
async fn test_inactive_subscription_times_out_items() {
    let (client, stack) = connected_client().await;
    let mut rx = client.events();
    let a = client.node(node_id("Oven.Temp")).await.unwrap();
    let b = client.node(node_id("Oven.Door")).await.unwrap();
    let state = a
        .enable_monitoring(AttributeId::Value, MonitoringSettings::new())
        .await
        .unwrap()
        .state
        .unwrap();
    b.enable_monitoring(AttributeId::Value, MonitoringSettings::new())
        .await
        .unwrap();
    drain(&mut rx);

    stack.push_event(StackEvent::SubscriptionInactive {
        subscription_id: state.subscription_id,
    });
    let disabled = next_events(&mut rx, 2, |e| matches!(e, ClientEvent::MonitoringDisabled { .. })).await;
    for event in disabled {
        match event {
            ClientEvent::MonitoringDisabled { status, .. } => assert_eq!(status, StatusCode::BAD_TIMEOUT),
            other => panic!("unexpected event {other:?}"),
        }
    }

    assert_eq!(client.state().await.unwrap(), ConnectionState::Connected);
    assert!(a.monitoring_state(AttributeId::Value).await.unwrap().is_none());
    assert!(b.monitoring_state(AttributeId::Value).await.unwrap().is_none());
    assert_eq!(
        stack.calls_of(|c| matches!(c, ServiceRequest::DeleteSubscriptions(_))),
        0
    );
    client.shutdown().await;
}

#[tokio::test]
async fn test_subscription_modify_reaches_every_item() {
    let (client, _stack) = connected_client().await;
    let mut rx = client.events();
    let a = client.node(node_id("Mixer.Rpm")).await.unwrap();
    let b = client.node(node_id("Mixer.Load")).await.unwrap();
    for node in [&a, &b] {
        node.enable_monitoring(AttributeId::Value, MonitoringSettings::new())
            .await
            .unwrap();
    }
    drain(&mut rx);

    let result = a
        .modify_monitoring(AttributeId::Value, MonitoringParameter::PublishingInterval, 250.0_f64)
        .await
        .unwrap();
    assert!(result.is_good());

    let changed: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            ClientEvent::MonitoringParametersChanged { handle, state, .. } => {
                Some((handle, state.publishing_interval_ms))
            }
            _ => None,
        })
        .collect();
    assert_eq!(changed.len(), 2);
    assert!(changed.contains(&(a.handle(), 250.0)));
    assert!(changed.contains(&(b.handle(), 250.0)));

    let state = b.monitoring_state(AttributeId::Value).await.unwrap().unwrap();
    assert_eq!(state.publishing_interval_ms, 250.0);
    client.shutdown().await;
}

#[tokio::test]
async fn test_short_read_response_keeps_result_length() {
    let (client, stack) = connected_client().await;
    stack.state.lock().read_results_limit = Some(1);
    let a = client.node(node_id("Short.A")).await.unwrap();
    let b = client.node(node_id("Short.B")).await.unwrap();

    let results = client
        .read_node_attributes(&[
            (&a, AttributeId::Value),
            (&b, AttributeId::Value),
            (&a, AttributeId::DisplayName),
        ])
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].value.value, DynamicValue::Double(21.5));
    assert_eq!(results[1].handle, b.handle());
    assert_eq!(results[1].value.status, StatusCode::BAD_UNKNOWN_RESPONSE);
    assert_eq!(results[2].attribute, AttributeId::DisplayName);
    assert_eq!(results[2].value.status, StatusCode::BAD_UNKNOWN_RESPONSE);
    client.shutdown().await;
}

#[tokio::test]
async fn test_value_decodes_as_cached_data_type() {
    let (client, stack) = connected_client().await;
    stack.state.lock().read_overrides = vec![
        // Float
        (AttributeId::DataType, Variant::NodeId(NodeId::numeric(0, 10))),
        (AttributeId::Value, Variant::Double(1.5)),
    ];
    let node = client.node(node_id("Dosing.Rate")).await.unwrap();

    let plain = node.read_attribute(AttributeId::Value).await.unwrap();
    assert_eq!(plain.value, DynamicValue::Double(1.5));

    let data_type = node.read_attribute(AttributeId::DataType).await.unwrap();
    assert_eq!(data_type.value, DynamicValue::NodeId(NodeId::numeric(0, 10)));
    let typed = node.read_attribute(AttributeId::Value).await.unwrap();
    assert_eq!(typed.value, DynamicValue::Float(1.5));

    let mut events = node.events();
    let state = node
        .enable_monitoring(AttributeId::Value, MonitoringSettings::new())
        .await
        .unwrap()
        .state
        .unwrap();
    stack.push_event(StackEvent::DataChange {
        subscription_id: state.subscription_id,
        monitored_item_id: state.monitored_item_id,
        value: DataValue::new(Variant::Double(2.25)),
    });
    let changed = tokio::time::timeout(WAIT, async {
        loop {
            if let Some(ClientEvent::DataChanged { value, .. }) = events.recv().await {
                return value;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(changed.value, DynamicValue::Float(2.25));
    client.shutdown().await;
}
