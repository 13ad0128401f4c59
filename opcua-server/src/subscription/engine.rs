//! Publish request matching and the subscription service set
//!
//! Every subscription runs in its own task that samples its monitored
//! items and ticks once per publishing interval. Publish requests wait in
//! a per-session FIFO until a subscription of that session has something
//! to deliver; responses travel back through a oneshot.
//!
//! Locking: the registry lock (publish queues and ownership) is always
//! taken before a subscription lock, never the other way around.

use super::state::{PublishingParameters, Subscription, TickOutcome};
use crate::address_space::AddressSpace;
use crate::config::SubscriptionLimits;
use crate::error::{UaError, UaResult};
use futures::future::join_all;
use opcua_core::{AttributeId, NodeId, StatusCode};
use opcua_services::{
    CreateMonitoredItemsRequest, CreateMonitoredItemsResponse, CreateSubscriptionRequest,
    CreateSubscriptionResponse, DeleteMonitoredItemsRequest, DeleteMonitoredItemsResponse,
    DeleteSubscriptionsRequest, DeleteSubscriptionsResponse, ModifySubscriptionRequest,
    ModifySubscriptionResponse, MonitoredItemCreateResult, NotificationMessage, PublishRequest,
    PublishResponse, RepublishRequest, RepublishResponse, ResponseHeader, ServiceResponse,
    SetPublishingModeRequest, SetPublishingModeResponse, TimestampsToReturn,
    TransferResult, TransferSubscriptionsRequest, TransferSubscriptionsResponse,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A queued Publish request
struct PendingPublish {
    request_handle: u32,
    /// Acknowledgement results, computed on arrival
    results: Vec<StatusCode>,
    deadline: Option<Instant>,
    responder: oneshot::Sender<ServiceResponse>,
}

impl PendingPublish {
    fn fail(self, status: StatusCode) {
        let _ = self
            .responder
            .send(ServiceResponse::fault(self.request_handle, status));
    }

    fn respond(self, subscription: &Subscription, message: NotificationMessage, more: bool) {
        let response = PublishResponse {
            response_header: ResponseHeader::for_handle(self.request_handle, StatusCode::GOOD),
            subscription_id: subscription.id(),
            available_sequence_numbers: subscription.available_sequence_numbers(),
            more_notifications: more,
            notification_message: message,
            results: self.results,
            diagnostic_infos: Vec::new(),
        };
        if self.responder.send(response.into()).is_err() {
            log::debug!(
                "Publish request {} abandoned, subscription {} keeps the message",
                self.request_handle,
                subscription.id()
            );
        }
    }
}

struct Entry {
    owner: NodeId,
    state: Arc<Mutex<Subscription>>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    /// Publish queues of sessions that are still open
    sessions: HashMap<NodeId, VecDeque<PendingPublish>>,
    /// Open sessions whose channel went away
    unbound: HashSet<NodeId>,
    subscriptions: HashMap<u32, Entry>,
}

impl Registry {
    fn owned(&self, session_id: &NodeId, subscription_id: u32) -> UaResult<&Entry> {
        self.subscriptions
            .get(&subscription_id)
            .filter(|entry| entry.owner == *session_id)
            .ok_or(UaError::Status(StatusCode::BAD_SUBSCRIPTION_ID_INVALID))
    }

    fn owned_count(&self, session_id: &NodeId) -> usize {
        self.subscriptions
            .values()
            .filter(|entry| entry.owner == *session_id)
            .count()
    }

    /// Highest priority ready subscription, oldest notification first
    fn select_ready(&self, session_id: &NodeId) -> Option<Arc<Mutex<Subscription>>> {
        self.subscriptions
            .values()
            .filter(|entry| entry.owner == *session_id)
            .filter_map(|entry| {
                let subscription = entry.state.lock();
                let since = subscription.ready_since()?;
                Some((subscription.priority(), since, entry.state.clone()))
            })
            .min_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)))
            .map(|(_, _, state)| state)
    }

    /// Serve queued publish requests of a session while anything is ready
    fn dispatch(&mut self, session_id: &NodeId) {
        loop {
            if self.sessions.get(session_id).is_none_or(VecDeque::is_empty) {
                return;
            }
            let Some(state) = self.select_ready(session_id) else {
                return;
            };
            let mut subscription = state.lock();
            let Some((message, more)) = subscription.next_message() else {
                return;
            };
            let Some(publish) = self.sessions.get_mut(session_id).and_then(VecDeque::pop_front) else {
                return;
            };
            publish.respond(&subscription, message, more);
        }
    }

    /// Fail queued publishes of a session left without subscriptions
    fn fail_if_unsubscribed(&mut self, session_id: &NodeId) {
        if self.owned_count(session_id) > 0 {
            return;
        }
        if let Some(queue) = self.sessions.get_mut(session_id) {
            for publish in queue.drain(..) {
                publish.fail(StatusCode::BAD_NO_SUBSCRIPTION);
            }
        }
    }

    /// Drop a subscription, optionally telling its session why
    fn remove(&mut self, subscription_id: u32, status: Option<StatusCode>) -> bool {
        let Some(entry) = self.subscriptions.remove(&subscription_id) else {
            return false;
        };
        entry.task.abort();
        if let Some(status) = status {
            if let Some(publish) = self.sessions.get_mut(&entry.owner).and_then(VecDeque::pop_front) {
                let mut subscription = entry.state.lock();
                match subscription.status_change_message(status) {
                    Ok(message) => publish.respond(&subscription, message, false),
                    Err(err) => publish.fail(err.status_code()),
                }
            }
        }
        self.fail_if_unsubscribed(&entry.owner);
        true
    }
}

/// All subscriptions of a server
pub struct SubscriptionEngine {
    limits: SubscriptionLimits,
    address_space: Arc<dyn AddressSpace>,
    registry: Mutex<Registry>,
    next_subscription_id: AtomicU32,
    me: Weak<SubscriptionEngine>,
}

impl SubscriptionEngine {
    pub fn new(limits: SubscriptionLimits, address_space: Arc<dyn AddressSpace>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            limits,
            address_space,
            registry: Mutex::new(Registry::default()),
            next_subscription_id: AtomicU32::new(1),
            me: me.clone(),
        })
    }

    pub fn limits(&self) -> &SubscriptionLimits {
        &self.limits
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.lock().subscriptions.len()
    }

    pub fn subscription_ids(&self, session_id: &NodeId) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .registry
            .lock()
            .subscriptions
            .iter()
            .filter(|(_, entry)| entry.owner == *session_id)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn queued_publish_requests(&self, session_id: &NodeId) -> usize {
        self.registry
            .lock()
            .sessions
            .get(session_id)
            .map_or(0, VecDeque::len)
    }

    pub fn create_subscription(
        &self,
        session_id: &NodeId,
        request: &CreateSubscriptionRequest,
    ) -> UaResult<CreateSubscriptionResponse> {
        let mut registry = self.registry.lock();
        if registry.owned_count(session_id) >= self.limits.max_subscriptions_per_session {
            return Err(UaError::Status(StatusCode::BAD_TOO_MANY_SUBSCRIPTIONS));
        }
        let parameters = PublishingParameters::revise(
            &self.limits,
            request.requested_publishing_interval,
            request.requested_max_keep_alive_count,
            request.requested_lifetime_count,
            request.max_notifications_per_publish,
            request.priority,
        );
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(Mutex::new(Subscription::new(
            id,
            session_id.clone(),
            parameters,
            request.publishing_enabled,
            self.limits.clone(),
        )));
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(run_subscription(self.me.clone(), id, state.clone(), wake.clone()));
        registry.sessions.entry(session_id.clone()).or_default();
        registry.subscriptions.insert(
            id,
            Entry {
                owner: session_id.clone(),
                state,
                wake,
                task,
            },
        );
        log::info!(
            "Subscription {} created for session {}: {} ms, keep-alive {}, lifetime {}",
            id,
            session_id,
            parameters.publishing_interval_ms,
            parameters.max_keep_alive_count,
            parameters.max_lifetime_count
        );

        Ok(CreateSubscriptionResponse {
            response_header: ResponseHeader::good(&request.request_header),
            subscription_id: id,
            revised_publishing_interval: parameters.publishing_interval_ms,
            revised_lifetime_count: parameters.max_lifetime_count,
            revised_max_keep_alive_count: parameters.max_keep_alive_count,
        })
    }

    pub fn modify_subscription(
        &self,
        session_id: &NodeId,
        request: &ModifySubscriptionRequest,
    ) -> UaResult<ModifySubscriptionResponse> {
        let registry = self.registry.lock();
        let entry = registry.owned(session_id, request.subscription_id)?;
        let parameters = PublishingParameters::revise(
            &self.limits,
            request.requested_publishing_interval,
            request.requested_max_keep_alive_count,
            request.requested_lifetime_count,
            request.max_notifications_per_publish,
            request.priority,
        );
        entry.state.lock().modify(parameters);
        entry.wake.notify_one();
        Ok(ModifySubscriptionResponse {
            response_header: ResponseHeader::good(&request.request_header),
            revised_publishing_interval: parameters.publishing_interval_ms,
            revised_lifetime_count: parameters.max_lifetime_count,
            revised_max_keep_alive_count: parameters.max_keep_alive_count,
        })
    }

    pub fn set_publishing_mode(
        &self,
        session_id: &NodeId,
        request: &SetPublishingModeRequest,
    ) -> UaResult<SetPublishingModeResponse> {
        if request.subscription_ids.is_empty() {
            return Err(UaError::Status(StatusCode::BAD_NOTHING_TO_DO));
        }
        let registry = self.registry.lock();
        let results = request
            .subscription_ids
            .iter()
            .map(|id| match registry.owned(session_id, *id) {
                Ok(entry) => {
                    entry.state.lock().set_publishing_enabled(request.publishing_enabled);
                    StatusCode::GOOD
                }
                Err(err) => err.status_code(),
            })
            .collect();
        Ok(SetPublishingModeResponse {
            response_header: ResponseHeader::good(&request.request_header),
            results,
            diagnostic_infos: Vec::new(),
        })
    }

    pub fn delete_subscriptions(
        &self,
        session_id: &NodeId,
        request: &DeleteSubscriptionsRequest,
    ) -> UaResult<DeleteSubscriptionsResponse> {
        if request.subscription_ids.is_empty() {
            return Err(UaError::Status(StatusCode::BAD_NOTHING_TO_DO));
        }
        let mut registry = self.registry.lock();
        let results = request
            .subscription_ids
            .iter()
            .map(|id| {
                if registry.owned(session_id, *id).is_err() {
                    return StatusCode::BAD_SUBSCRIPTION_ID_INVALID;
                }
                registry.remove(*id, None);
                log::info!("Subscription {} deleted", id);
                StatusCode::GOOD
            })
            .collect();
        Ok(DeleteSubscriptionsResponse {
            response_header: ResponseHeader::good(&request.request_header),
            results,
            diagnostic_infos: Vec::new(),
        })
    }

    /// Move subscriptions to `session_id`
    ///
    /// Orphaned subscriptions, whose session is closed or has lost its
    /// channel, may be claimed by anyone; subscriptions of a live session
    /// only when `same_user` accepts their owner.
    pub fn transfer_subscriptions(
        &self,
        session_id: &NodeId,
        request: &TransferSubscriptionsRequest,
        same_user: &dyn Fn(&NodeId) -> bool,
    ) -> UaResult<TransferSubscriptionsResponse> {
        if request.subscription_ids.is_empty() {
            return Err(UaError::Status(StatusCode::BAD_NOTHING_TO_DO));
        }
        let mut registry = self.registry.lock();
        registry.sessions.entry(session_id.clone()).or_default();
        registry.unbound.remove(session_id);
        let mut previous_owners = Vec::new();
        let mut results = Vec::with_capacity(request.subscription_ids.len());

        for id in &request.subscription_ids {
            let Registry { sessions, unbound, subscriptions } = &mut *registry;
            let Some(entry) = subscriptions.get_mut(id) else {
                results.push(TransferResult {
                    status_code: StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
                    available_sequence_numbers: Vec::new(),
                });
                continue;
            };
            let orphaned = !sessions.contains_key(&entry.owner) || unbound.contains(&entry.owner);
            if entry.owner != *session_id && !orphaned && !same_user(&entry.owner) {
                results.push(TransferResult {
                    status_code: StatusCode::BAD_USER_ACCESS_DENIED,
                    available_sequence_numbers: Vec::new(),
                });
                continue;
            }

            let previous = std::mem::replace(&mut entry.owner, session_id.clone());
            let mut subscription = entry.state.lock();
            subscription.set_session_id(session_id.clone());
            if request.send_initial_values {
                subscription.resend_initial_values();
            }
            if previous != *session_id {
                if let Some(publish) = sessions.get_mut(&previous).and_then(VecDeque::pop_front) {
                    match NotificationMessage::status_change(
                        subscription.next_sequence_number(),
                        StatusCode::GOOD_SUBSCRIPTION_TRANSFERRED,
                    ) {
                        Ok(message) => publish.respond(&subscription, message, false),
                        Err(err) => publish.fail(err.status_code()),
                    }
                }
                log::info!("Subscription {} transferred from {} to {}", id, previous, session_id);
                previous_owners.push(previous);
            }
            results.push(TransferResult {
                status_code: StatusCode::GOOD,
                available_sequence_numbers: subscription.available_sequence_numbers(),
            });
        }

        for previous in &previous_owners {
            registry.fail_if_unsubscribed(previous);
        }
        registry.dispatch(session_id);
        Ok(TransferSubscriptionsResponse {
            response_header: ResponseHeader::good(&request.request_header),
            results,
            diagnostic_infos: Vec::new(),
        })
    }

    /// Create monitored items, reading each node once for its initial value
    pub async fn create_monitored_items(
        &self,
        session_id: &NodeId,
        request: &CreateMonitoredItemsRequest,
    ) -> UaResult<CreateMonitoredItemsResponse> {
        if request.items_to_create.is_empty() {
            return Err(UaError::Status(StatusCode::BAD_NOTHING_TO_DO));
        }
        if request.timestamps_to_return == TimestampsToReturn::Invalid {
            return Err(UaError::Status(StatusCode::BAD_TIMESTAMPS_TO_RETURN_INVALID));
        }
        let (state, wake) = {
            let registry = self.registry.lock();
            let entry = registry.owned(session_id, request.subscription_id)?;
            (entry.state.clone(), entry.wake.clone())
        };

        let reads = request.items_to_create.iter().map(|item| async move {
            let attribute = AttributeId::from_u32(item.item_to_monitor.attribute_id)?;
            Some(
                self.address_space
                    .read_attribute(&item.item_to_monitor.node_id, attribute)
                    .await,
            )
        });
        let initial_values = join_all(reads).await;

        let now = Instant::now();
        let results: Vec<MonitoredItemCreateResult> = {
            let mut subscription = state.lock();
            request
                .items_to_create
                .iter()
                .zip(initial_values)
                .map(|(item, initial)| {
                    let unreadable = initial.as_ref().map(|value| value.status().code()).filter(|code| {
                        *code == StatusCode::BAD_NODE_ID_UNKNOWN || *code == StatusCode::BAD_ATTRIBUTE_ID_INVALID
                    });
                    match unreadable {
                        Some(code) => MonitoredItemCreateResult::failed(code),
                        None => subscription.create_item(item, request.timestamps_to_return, initial, now),
                    }
                })
                .collect()
        };
        wake.notify_one();
        log::debug!(
            "Subscription {}: {} monitored item(s) requested",
            request.subscription_id,
            results.len()
        );

        Ok(CreateMonitoredItemsResponse {
            response_header: ResponseHeader::good(&request.request_header),
            results,
            diagnostic_infos: Vec::new(),
        })
    }

    pub fn delete_monitored_items(
        &self,
        session_id: &NodeId,
        request: &DeleteMonitoredItemsRequest,
    ) -> UaResult<DeleteMonitoredItemsResponse> {
        if request.monitored_item_ids.is_empty() {
            return Err(UaError::Status(StatusCode::BAD_NOTHING_TO_DO));
        }
        let registry = self.registry.lock();
        let entry = registry.owned(session_id, request.subscription_id)?;
        let mut subscription = entry.state.lock();
        let results = request
            .monitored_item_ids
            .iter()
            .map(|id| subscription.delete_item(*id))
            .collect();
        Ok(DeleteMonitoredItemsResponse {
            response_header: ResponseHeader::good(&request.request_header),
            results,
            diagnostic_infos: Vec::new(),
        })
    }

    /// Queue a publish request; the receiver resolves with its response
    ///
    /// # Errors
    /// `BadNoSubscription` when the session owns no subscription
    pub fn publish(
        &self,
        session_id: &NodeId,
        request: &PublishRequest,
    ) -> UaResult<oneshot::Receiver<ServiceResponse>> {
        let mut registry = self.registry.lock();
        if registry.owned_count(session_id) == 0 {
            return Err(UaError::Status(StatusCode::BAD_NO_SUBSCRIPTION));
        }
        let results = request
            .subscription_acknowledgements
            .iter()
            .map(|ack| match registry.owned(session_id, ack.subscription_id) {
                Ok(entry) => entry.state.lock().acknowledge(ack.sequence_number),
                Err(err) => err.status_code(),
            })
            .collect();

        let (responder, receiver) = oneshot::channel();
        let timeout_hint = request.request_header.timeout_hint;
        let pending = PendingPublish {
            request_handle: request.request_header.request_handle,
            results,
            deadline: (timeout_hint > 0).then(|| Instant::now() + Duration::from_millis(u64::from(timeout_hint))),
            responder,
        };
        let queue = registry.sessions.entry(session_id.clone()).or_default();
        queue.push_back(pending);
        if queue.len() > self.limits.max_publish_requests_per_session.max(1) {
            if let Some(oldest) = queue.pop_front() {
                log::debug!("Session {} has too many publish requests", session_id);
                oldest.fail(StatusCode::BAD_TOO_MANY_PUBLISH_REQUESTS);
            }
        }
        registry.dispatch(session_id);
        Ok(receiver)
    }

    pub fn republish(&self, session_id: &NodeId, request: &RepublishRequest) -> UaResult<RepublishResponse> {
        let registry = self.registry.lock();
        let entry = registry.owned(session_id, request.subscription_id)?;
        let message = entry.state.lock().republish(request.retransmit_sequence_number)?;
        Ok(RepublishResponse {
            response_header: ResponseHeader::good(&request.request_header),
            notification_message: message,
        })
    }

    /// Fail every queued publish request of a session
    pub fn cancel_publish_requests(&self, session_id: &NodeId, status: StatusCode) {
        if let Some(queue) = self.registry.lock().sessions.get_mut(session_id) {
            for publish in queue.drain(..) {
                publish.fail(status);
            }
        }
    }

    /// Mark a session whose channel closed; its subscriptions become orphaned
    pub fn session_unbound(&self, session_id: &NodeId) {
        let mut registry = self.registry.lock();
        if registry.owned_count(session_id) > 0 {
            log::debug!("Subscriptions of session {} orphaned by channel close", session_id);
        }
        registry.unbound.insert(session_id.clone());
    }

    /// A session was activated on a channel again
    pub fn session_bound(&self, session_id: &NodeId) {
        self.registry.lock().unbound.remove(session_id);
    }

    /// Forget a closed session, deleting or orphaning its subscriptions
    pub fn session_closed(&self, session_id: &NodeId, delete_subscriptions: bool) {
        let mut registry = self.registry.lock();
        registry.unbound.remove(session_id);
        if let Some(queue) = registry.sessions.remove(session_id) {
            for publish in queue {
                publish.fail(StatusCode::BAD_SESSION_CLOSED);
            }
        }
        let owned: Vec<u32> = registry
            .subscriptions
            .iter()
            .filter(|(_, entry)| entry.owner == *session_id)
            .map(|(id, _)| *id)
            .collect();
        if owned.is_empty() {
            return;
        }
        if delete_subscriptions {
            for id in &owned {
                registry.remove(*id, None);
            }
            log::info!("Session {} closed, {} subscription(s) deleted", session_id, owned.len());
        } else {
            log::info!("Session {} closed, {} subscription(s) orphaned", session_id, owned.len());
        }
    }

    /// Time out publish requests past their timeout hint
    ///
    /// # Returns
    /// Number of requests failed with `BadTimeout`
    pub fn expire_publish_requests(&self, now: Instant) -> usize {
        let mut expired = 0;
        for queue in self.registry.lock().sessions.values_mut() {
            let (late, waiting): (VecDeque<_>, VecDeque<_>) = queue
                .drain(..)
                .partition(|publish| publish.deadline.is_some_and(|deadline| deadline <= now));
            *queue = waiting;
            expired += late.len();
            for publish in late {
                publish.fail(StatusCode::BAD_TIMEOUT);
            }
        }
        expired
    }

    /// Earliest publish request deadline, for the watchdog
    pub fn next_publish_deadline(&self) -> Option<Instant> {
        self.registry
            .lock()
            .sessions
            .values()
            .flatten()
            .filter_map(|publish| publish.deadline)
            .min()
    }

    /// One publishing cycle of a subscription
    ///
    /// # Returns
    /// `false` once the subscription is gone
    fn publish_tick(&self, subscription_id: u32) -> bool {
        let mut registry = self.registry.lock();
        let Some(entry) = registry.subscriptions.get(&subscription_id) else {
            return false;
        };
        let owner = entry.owner.clone();
        let state = entry.state.clone();
        let publish_available = registry.sessions.get(&owner).is_some_and(|queue| !queue.is_empty());
        let outcome = state.lock().tick(Instant::now(), publish_available);
        match outcome {
            Ok(TickOutcome::Idle) => true,
            Ok(TickOutcome::Ready) => {
                registry.dispatch(&owner);
                true
            }
            Ok(TickOutcome::Expired) => {
                log::info!("Subscription {} expired", subscription_id);
                registry.remove(subscription_id, Some(StatusCode::BAD_TIMEOUT));
                false
            }
            Err(err) => {
                log::error!("Subscription {} failed to package notifications: {}", subscription_id, err);
                true
            }
        }
    }
}

impl Drop for SubscriptionEngine {
    fn drop(&mut self) {
        for entry in self.registry.get_mut().subscriptions.values() {
            entry.task.abort();
        }
    }
}

/// Sampling and publishing timers of one subscription
async fn run_subscription(
    engine: Weak<SubscriptionEngine>,
    id: u32,
    state: Arc<Mutex<Subscription>>,
    wake: Arc<Notify>,
) {
    let mut next_tick = Instant::now() + state.lock().publishing_interval();
    loop {
        let next_sample = state.lock().next_sample_deadline();
        let deadline = next_sample.map_or(next_tick, |sample| sample.min(next_tick));
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = wake.notified() => {}
        }
        let Some(engine) = engine.upgrade() else {
            break;
        };

        let now = Instant::now();
        let due = state.lock().items_due(now);
        if !due.is_empty() {
            let reads = due
                .iter()
                .map(|(_, node_id, attribute)| engine.address_space.read_attribute(node_id, *attribute));
            let values = join_all(reads).await;
            let mut subscription = state.lock();
            for ((item_id, _, _), value) in due.into_iter().zip(values) {
                subscription.record_sample(item_id, value, now);
            }
        }

        if now >= next_tick {
            let interval = state.lock().publishing_interval();
            next_tick += interval;
            if next_tick <= now {
                next_tick = now + interval;
            }
            if !engine.publish_tick(id) {
                break;
            }
        }
    }
    log::debug!("Subscription {} task finished", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_space::MemoryAddressSpace;
    use opcua_codec::DecodingLimits;
    use opcua_core::{ExtensionObject, Variant};
    use opcua_services::{
        MonitoredItemCreateRequest, MonitoringMode, MonitoringParameters, ReadValueId, RequestHeader,
        SubscriptionAcknowledgement,
    };

    const FLAG: NodeId = NodeId::numeric(1, 100);

    fn engine() -> (Arc<SubscriptionEngine>, Arc<MemoryAddressSpace>) {
        let space = Arc::new(MemoryAddressSpace::new());
        space.add_variable(FLAG, false, true);
        (SubscriptionEngine::new(SubscriptionLimits::default(), space.clone()), space)
    }

    fn session(n: u32) -> NodeId {
        NodeId::numeric(1, n)
    }

    fn create(engine: &SubscriptionEngine, session_id: &NodeId, interval: f64, keep_alive: u32, priority: u8) -> u32 {
        let request = CreateSubscriptionRequest {
            request_header: RequestHeader::default(),
            requested_publishing_interval: interval,
            requested_lifetime_count: 10,
            requested_max_keep_alive_count: keep_alive,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority,
        };
        engine.create_subscription(session_id, &request).unwrap().subscription_id
    }

    fn items_request(subscription_id: u32, node_id: NodeId) -> CreateMonitoredItemsRequest {
        CreateMonitoredItemsRequest {
            request_header: RequestHeader::default(),
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId::value_of(node_id),
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 1,
                    sampling_interval: -1.0,
                    filter: ExtensionObject::null(),
                    queue_size: 1,
                    discard_oldest: true,
                },
            }],
        }
    }

    fn publish_request(handle: u32, acks: Vec<(u32, u32)>) -> PublishRequest {
        PublishRequest {
            request_header: RequestHeader::new(&NodeId::null(), handle),
            subscription_acknowledgements: acks
                .into_iter()
                .map(|(subscription_id, sequence_number)| SubscriptionAcknowledgement {
                    subscription_id,
                    sequence_number,
                })
                .collect(),
        }
    }

    async fn next_publish(receiver: oneshot::Receiver<ServiceResponse>) -> PublishResponse {
        match receiver.await.unwrap() {
            ServiceResponse::Publish(response) => response,
            other => panic!("unexpected response {:?}", other),
        }
    }

    async fn next_fault(receiver: oneshot::Receiver<ServiceResponse>) -> StatusCode {
        match receiver.await.unwrap() {
            ServiceResponse::ServiceFault(fault) => fault.response_header.service_result,
            other => panic!("unexpected response {:?}", other),
        }
    }

    fn published_values(response: &PublishResponse) -> Vec<Option<Variant>> {
        response
            .notification_message
            .data_changes(&DecodingLimits::default())
            .unwrap()
            .into_iter()
            .map(|item| item.value.value)
            .collect()
    }

    #[tokio::test]
    async fn test_publish_without_subscription() {
        let (engine, _) = engine();
        let err = engine.publish(&session(1), &publish_request(1, vec![])).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_NO_SUBSCRIPTION);
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_change_flow_with_acknowledgement() {
        let (engine, space) = engine();
        let s = session(1);
        let id = create(&engine, &s, 100.0, 3, 0);
        let created = engine.create_monitored_items(&s, &items_request(id, FLAG)).await.unwrap();
        assert_eq!(created.results[0].status_code, StatusCode::GOOD);
        assert_eq!(created.results[0].revised_sampling_interval, 100.0);

        let first = next_publish(engine.publish(&s, &publish_request(1, vec![])).unwrap()).await;
        assert_eq!(first.subscription_id, id);
        assert_eq!(first.notification_message.sequence_number, 1);
        assert_eq!(published_values(&first), vec![Some(Variant::Boolean(false))]);
        assert_eq!(first.available_sequence_numbers, vec![1]);

        space.set_value(&FLAG, true);
        let second = next_publish(engine.publish(&s, &publish_request(2, vec![(id, 1), (id, 9)])).unwrap()).await;
        assert_eq!(second.notification_message.sequence_number, 2);
        assert_eq!(published_values(&second), vec![Some(Variant::Boolean(true))]);
        assert_eq!(
            second.results,
            vec![StatusCode::GOOD, StatusCode::BAD_SEQUENCE_NUMBER_UNKNOWN]
        );
        assert_eq!(second.available_sequence_numbers, vec![2]);

        let republished = engine
            .republish(
                &s,
                &RepublishRequest {
                    request_header: RequestHeader::default(),
                    subscription_id: id,
                    retransmit_sequence_number: 2,
                },
            )
            .unwrap();
        assert_eq!(republished.notification_message, second.notification_message);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_is_delivered() {
        let (engine, _) = engine();
        let s = session(1);
        let id = create(&engine, &s, 100.0, 3, 0);
        let started = Instant::now();
        let response = next_publish(engine.publish(&s, &publish_request(1, vec![])).unwrap()).await;
        assert_eq!(response.subscription_id, id);
        assert!(response.notification_message.is_keep_alive());
        assert_eq!(response.notification_message.sequence_number, 1);
        assert!(Instant::now() - started >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifetime_expiry_removes_subscription() {
        let (engine, _) = engine();
        let s = session(1);
        create(&engine, &s, 100.0, 3, 0);
        tokio::time::sleep(Duration::from_millis(1050)).await;
        assert_eq!(engine.subscription_count(), 0);
        let err = engine.publish(&s, &publish_request(1, vec![])).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_NO_SUBSCRIPTION);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_selects_first() {
        let (engine, _) = engine();
        let s = session(1);
        create(&engine, &s, 100.0, 1, 1);
        let high = create(&engine, &s, 100.0, 1, 200);
        tokio::time::sleep(Duration::from_millis(150)).await;
        let response = next_publish(engine.publish(&s, &publish_request(1, vec![])).unwrap()).await;
        assert_eq!(response.subscription_id, high);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_queue_limit_and_timeout() {
        let space = Arc::new(MemoryAddressSpace::new());
        let limits = SubscriptionLimits {
            max_publish_requests_per_session: 2,
            ..Default::default()
        };
        let engine = SubscriptionEngine::new(limits, space);
        let s = session(1);
        create(&engine, &s, 1000.0, 100, 0);

        let oldest = engine.publish(&s, &publish_request(1, vec![])).unwrap();
        let mut with_hint = publish_request(2, vec![]);
        with_hint.request_header.timeout_hint = 500;
        let timed = engine.publish(&s, &with_hint).unwrap();
        let _newest = engine.publish(&s, &publish_request(3, vec![])).unwrap();
        assert_eq!(next_fault(oldest).await, StatusCode::BAD_TOO_MANY_PUBLISH_REQUESTS);
        assert_eq!(engine.queued_publish_requests(&s), 2);

        assert_eq!(engine.expire_publish_requests(Instant::now()), 0);
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(engine.expire_publish_requests(Instant::now()), 1);
        assert_eq!(next_fault(timed).await, StatusCode::BAD_TIMEOUT);
    }

    #[tokio::test]
    async fn test_transfer_between_sessions() {
        let (engine, _) = engine();
        let (a, b, c) = (session(1), session(2), session(3));
        let id = create(&engine, &a, 1000.0, 100, 0);
        let waiting = engine.publish(&a, &publish_request(1, vec![])).unwrap();

        let request = TransferSubscriptionsRequest {
            request_header: RequestHeader::default(),
            subscription_ids: vec![id, 999],
            send_initial_values: false,
        };
        let denied = engine.transfer_subscriptions(&c, &request, &|_| false).unwrap();
        assert_eq!(denied.results[0].status_code, StatusCode::BAD_USER_ACCESS_DENIED);

        let moved = engine.transfer_subscriptions(&b, &request, &|owner| *owner == a).unwrap();
        assert_eq!(moved.results[0].status_code, StatusCode::GOOD);
        assert_eq!(moved.results[1].status_code, StatusCode::BAD_SUBSCRIPTION_ID_INVALID);
        assert_eq!(engine.subscription_ids(&b), vec![id]);

        let notice = next_publish(waiting).await;
        assert_eq!(
            notice
                .notification_message
                .status_change_status(&DecodingLimits::default())
                .unwrap(),
            Some(StatusCode::GOOD_SUBSCRIPTION_TRANSFERRED)
        );

        // Orphaned subscriptions may be claimed by anyone
        engine.session_closed(&b, false);
        assert_eq!(engine.subscription_count(), 1);
        let claimed = engine.transfer_subscriptions(&c, &request, &|_| false).unwrap();
        assert_eq!(claimed.results[0].status_code, StatusCode::GOOD);
        assert_eq!(engine.subscription_ids(&c), vec![id]);
    }

    #[tokio::test]
    async fn test_channel_loss_orphans_subscriptions() {
        let (engine, _) = engine();
        let (a, b) = (session(1), session(2));
        let id = create(&engine, &a, 1000.0, 100, 0);
        let request = TransferSubscriptionsRequest {
            request_header: RequestHeader::default(),
            subscription_ids: vec![id],
            send_initial_values: false,
        };

        // Reactivated on a new channel, the owner is live again
        engine.session_unbound(&a);
        engine.session_bound(&a);
        let denied = engine.transfer_subscriptions(&b, &request, &|_| false).unwrap();
        assert_eq!(denied.results[0].status_code, StatusCode::BAD_USER_ACCESS_DENIED);

        engine.session_unbound(&a);
        let claimed = engine.transfer_subscriptions(&b, &request, &|_| false).unwrap();
        assert_eq!(claimed.results[0].status_code, StatusCode::GOOD);
        assert_eq!(engine.subscription_ids(&b), vec![id]);
        assert!(engine.subscription_ids(&a).is_empty());
    }

    #[tokio::test]
    async fn test_service_errors() {
        let (engine, _) = engine();
        let s = session(1);
        let id = create(&engine, &s, 1000.0, 10, 0);

        let created = engine
            .create_monitored_items(&s, &items_request(id, NodeId::numeric(1, 404)))
            .await
            .unwrap();
        assert_eq!(created.results[0].status_code, StatusCode::BAD_NODE_ID_UNKNOWN);

        let err = engine
            .create_monitored_items(&session(2), &items_request(id, FLAG))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_SUBSCRIPTION_ID_INVALID);

        let mut empty = items_request(id, FLAG);
        empty.items_to_create.clear();
        let err = engine.create_monitored_items(&s, &empty).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_NOTHING_TO_DO);

        let delete = DeleteSubscriptionsRequest {
            request_header: RequestHeader::default(),
            subscription_ids: vec![id, id],
        };
        let deleted = engine.delete_subscriptions(&s, &delete).unwrap();
        assert_eq!(
            deleted.results,
            vec![StatusCode::GOOD, StatusCode::BAD_SUBSCRIPTION_ID_INVALID]
        );
        assert_eq!(engine.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_too_many_subscriptions() {
        let space = Arc::new(MemoryAddressSpace::new());
        let limits = SubscriptionLimits {
            max_subscriptions_per_session: 1,
            ..Default::default()
        };
        let engine = SubscriptionEngine::new(limits, space);
        let s = session(1);
        create(&engine, &s, 1000.0, 10, 0);
        let request = CreateSubscriptionRequest {
            request_header: RequestHeader::default(),
            requested_publishing_interval: 1000.0,
            requested_lifetime_count: 30,
            requested_max_keep_alive_count: 10,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        };
        let err = engine.create_subscription(&s, &request).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_TOO_MANY_SUBSCRIPTIONS);
        // Other sessions are unaffected
        engine.create_subscription(&session(2), &request).unwrap();
    }

    #[tokio::test]
    async fn test_session_close_fails_queued_publishes() {
        let (engine, _) = engine();
        let s = session(1);
        create(&engine, &s, 1000.0, 100, 0);
        let waiting = engine.publish(&s, &publish_request(1, vec![])).unwrap();
        engine.session_closed(&s, true);
        assert_eq!(next_fault(waiting).await, StatusCode::BAD_SESSION_CLOSED);
        assert_eq!(engine.subscription_count(), 0);
    }
}
