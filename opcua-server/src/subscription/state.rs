//! Subscription state: counters, sequence numbers and message queues
//!
//! A `Subscription` is driven from outside: its task calls [`Subscription::tick`]
//! once per publishing interval and the engine pulls messages with
//! [`Subscription::next_message`] whenever a publish request is queued.

use super::monitored_item::MonitoredItem;
use crate::config::SubscriptionLimits;
use crate::error::{UaError, UaResult};
use opcua_core::{AttributeId, DataValue, ExtensionObject, NodeId, StatusCode};
use opcua_services::{
    MonitoredItemCreateRequest, MonitoredItemCreateResult, MonitoredItemNotification,
    NotificationMessage, TimestampsToReturn,
};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// What a publishing cycle left behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to publish yet
    Idle,
    /// A notification or keep-alive waits for a publish request
    Ready,
    /// The lifetime counter ran out
    Expired,
}

/// Revised publishing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishingParameters {
    pub publishing_interval_ms: f64,
    pub max_keep_alive_count: u32,
    pub max_lifetime_count: u32,
    pub max_notifications_per_publish: u32,
    pub priority: u8,
}

impl PublishingParameters {
    pub fn revise(
        limits: &SubscriptionLimits,
        publishing_interval_ms: f64,
        keep_alive_count: u32,
        lifetime_count: u32,
        max_notifications: u32,
        priority: u8,
    ) -> Self {
        let max_keep_alive_count = limits.revise_keep_alive_count(keep_alive_count);
        Self {
            publishing_interval_ms: limits.revise_publishing_interval(publishing_interval_ms),
            max_keep_alive_count,
            max_lifetime_count: limits.revise_lifetime_count(lifetime_count, max_keep_alive_count),
            max_notifications_per_publish: limits.revise_max_notifications(max_notifications),
            priority,
        }
    }
}

#[derive(Debug, Clone)]
struct Pending {
    since: Instant,
    message: NotificationMessage,
}

#[derive(Debug)]
pub struct Subscription {
    id: u32,
    session_id: NodeId,
    parameters: PublishingParameters,
    publishing_enabled: bool,
    keep_alive_counter: u32,
    lifetime_counter: u32,
    keep_alive_due_since: Option<Instant>,
    items: BTreeMap<u32, MonitoredItem>,
    next_item_id: u32,
    pending: VecDeque<Pending>,
    retransmission: VecDeque<NotificationMessage>,
    next_sequence_number: u32,
    limits: SubscriptionLimits,
}

impl Subscription {
    pub fn new(
        id: u32,
        session_id: NodeId,
        parameters: PublishingParameters,
        publishing_enabled: bool,
        limits: SubscriptionLimits,
    ) -> Self {
        Self {
            id,
            session_id,
            parameters,
            publishing_enabled,
            keep_alive_counter: 0,
            lifetime_counter: 0,
            keep_alive_due_since: None,
            items: BTreeMap::new(),
            next_item_id: 1,
            pending: VecDeque::new(),
            retransmission: VecDeque::new(),
            next_sequence_number: 1,
            limits,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn session_id(&self) -> &NodeId {
        &self.session_id
    }

    pub fn set_session_id(&mut self, session_id: NodeId) {
        self.session_id = session_id;
    }

    pub fn parameters(&self) -> &PublishingParameters {
        &self.parameters
    }

    pub fn priority(&self) -> u8 {
        self.parameters.priority
    }

    pub fn publishing_interval(&self) -> Duration {
        Duration::from_secs_f64(self.parameters.publishing_interval_ms / 1000.0)
    }

    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    pub fn set_publishing_enabled(&mut self, enabled: bool) {
        self.publishing_enabled = enabled;
    }

    pub fn lifetime_counter(&self) -> u32 {
        self.lifetime_counter
    }

    pub fn keep_alive_counter(&self) -> u32 {
        self.keep_alive_counter
    }

    pub fn next_sequence_number(&self) -> u32 {
        self.next_sequence_number
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn item(&self, id: u32) -> Option<&MonitoredItem> {
        self.items.get(&id)
    }

    /// Apply new publishing parameters; counters restart
    pub fn modify(&mut self, parameters: PublishingParameters) {
        self.parameters = parameters;
        self.lifetime_counter = 0;
    }

    fn allocate_sequence_number(&mut self) -> u32 {
        let number = self.next_sequence_number;
        self.next_sequence_number = match number {
            u32::MAX => 1,
            n => n + 1,
        };
        number
    }

    /// Create a monitored item, reporting failures in the result
    pub fn create_item(
        &mut self,
        request: &MonitoredItemCreateRequest,
        timestamps: TimestampsToReturn,
        initial: Option<DataValue>,
        now: Instant,
    ) -> MonitoredItemCreateResult {
        if self.items.len() >= self.limits.max_monitored_items_per_subscription {
            return MonitoredItemCreateResult::failed(StatusCode::BAD_TOO_MANY_MONITORED_ITEMS);
        }
        let id = self.next_item_id;
        let mut item = match MonitoredItem::new(
            id,
            request,
            timestamps,
            self.parameters.publishing_interval_ms,
            &self.limits,
        ) {
            Ok(item) => item,
            Err(err) => return MonitoredItemCreateResult::failed(err.status_code()),
        };
        if let Some(value) = initial {
            item.sample(value);
            item.schedule_next(now);
        }
        self.next_item_id = self.next_item_id.wrapping_add(1).max(1);
        let result = MonitoredItemCreateResult {
            status_code: StatusCode::GOOD,
            monitored_item_id: id,
            revised_sampling_interval: item.sampling_interval_ms(),
            revised_queue_size: item.queue_size() as u32,
            filter_result: ExtensionObject::null(),
        };
        self.items.insert(id, item);
        result
    }

    pub fn delete_item(&mut self, id: u32) -> StatusCode {
        match self.items.remove(&id) {
            Some(_) => StatusCode::GOOD,
            None => StatusCode::BAD_MONITORED_ITEM_ID_INVALID,
        }
    }

    /// Items whose sample is due, as (item id, node, attribute)
    pub fn items_due(&self, now: Instant) -> Vec<(u32, NodeId, AttributeId)> {
        self.items
            .values()
            .filter(|item| item.is_sample_due(now))
            .map(|item| (item.id(), item.node_id().clone(), item.attribute()))
            .collect()
    }

    /// Store a sample read for item `id`
    pub fn record_sample(&mut self, id: u32, value: DataValue, now: Instant) {
        if let Some(item) = self.items.get_mut(&id) {
            item.schedule_next(now);
            item.sample(value);
        }
    }

    /// Earliest sampling deadline of all sampling items
    pub fn next_sample_deadline(&self) -> Option<Instant> {
        self.items
            .values()
            .filter(|item| item.is_sampling())
            .map(MonitoredItem::next_sample)
            .min()
    }

    /// Queue every item's last value again
    pub fn resend_initial_values(&mut self) {
        for item in self.items.values_mut() {
            item.resend_last_value();
        }
    }

    /// Package queued item values into numbered messages
    fn collect_notifications(&mut self, now: Instant) -> UaResult<()> {
        let mut notifications: Vec<MonitoredItemNotification> = Vec::new();
        for item in self.items.values_mut() {
            notifications.extend(item.take_notifications());
        }
        if notifications.is_empty() {
            return Ok(());
        }
        let per_message = match self.parameters.max_notifications_per_publish {
            0 => notifications.len(),
            n => n as usize,
        };
        let mut remaining = notifications.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<_> = remaining.by_ref().take(per_message).collect();
            let message = NotificationMessage::data_change(self.allocate_sequence_number(), batch)?;
            if self.pending.len() >= self.limits.max_queued_notifications.max(1) {
                if let Some(dropped) = self.pending.pop_front() {
                    log::warn!(
                        "Subscription {} dropped notification {}, queue full",
                        self.id, dropped.message.sequence_number
                    );
                }
            }
            self.pending.push_back(Pending { since: now, message });
        }
        Ok(())
    }

    /// Run one publishing cycle
    ///
    /// `publish_available` tells whether the owning session has a queued
    /// publish request that a ready subscription would be served from.
    pub fn tick(&mut self, now: Instant, publish_available: bool) -> UaResult<TickOutcome> {
        if self.publishing_enabled {
            let before = self.pending.len();
            self.collect_notifications(now)?;
            if self.pending.len() > before {
                self.keep_alive_counter = 0;
                self.keep_alive_due_since = None;
            }
        }
        if self.pending.is_empty() && self.keep_alive_counter < self.parameters.max_keep_alive_count {
            self.keep_alive_counter += 1;
            if self.keep_alive_counter >= self.parameters.max_keep_alive_count {
                self.keep_alive_due_since = Some(now);
            }
        }
        self.lifetime_counter = self.lifetime_counter.saturating_add(1);

        let ready = self.is_ready();
        if self.lifetime_counter >= self.parameters.max_lifetime_count && !(ready && publish_available) {
            return Ok(TickOutcome::Expired);
        }
        Ok(if ready { TickOutcome::Ready } else { TickOutcome::Idle })
    }

    /// Whether a notification or keep-alive waits for delivery
    pub fn is_ready(&self) -> bool {
        !self.pending.is_empty() || self.keep_alive_due_since.is_some()
    }

    /// When the oldest undelivered message became available
    pub fn ready_since(&self) -> Option<Instant> {
        self.pending
            .front()
            .map(|pending| pending.since)
            .or(self.keep_alive_due_since)
    }

    /// Take the next message to deliver, resetting the counters
    ///
    /// # Returns
    /// The message and whether more notifications are queued
    pub fn next_message(&mut self) -> Option<(NotificationMessage, bool)> {
        let message = match self.pending.pop_front() {
            Some(pending) => {
                if self.retransmission.len() >= self.limits.max_retransmission_queue_size.max(1) {
                    self.retransmission.pop_front();
                }
                self.retransmission.push_back(pending.message.clone());
                pending.message
            }
            None if self.keep_alive_due_since.is_some() => {
                NotificationMessage::keep_alive(self.next_sequence_number)
            }
            None => return None,
        };
        self.keep_alive_counter = 0;
        self.keep_alive_due_since = None;
        self.lifetime_counter = 0;
        Some((message, !self.pending.is_empty()))
    }

    /// Final message announcing a status change such as expiry
    pub fn status_change_message(&mut self, status: StatusCode) -> UaResult<NotificationMessage> {
        let sequence_number = self.allocate_sequence_number();
        NotificationMessage::status_change(sequence_number, status)
    }

    /// Drop an acknowledged message from the retransmission queue
    pub fn acknowledge(&mut self, sequence_number: u32) -> StatusCode {
        match self
            .retransmission
            .iter()
            .position(|message| message.sequence_number == sequence_number)
        {
            Some(index) => {
                self.retransmission.remove(index);
                StatusCode::GOOD
            }
            None => StatusCode::BAD_SEQUENCE_NUMBER_UNKNOWN,
        }
    }

    /// Copy of an unacknowledged message
    ///
    /// # Errors
    /// `BadMessageNotAvailable` when it was acknowledged or evicted
    pub fn republish(&self, sequence_number: u32) -> UaResult<NotificationMessage> {
        self.retransmission
            .iter()
            .find(|message| message.sequence_number == sequence_number)
            .cloned()
            .ok_or(UaError::Status(StatusCode::BAD_MESSAGE_NOT_AVAILABLE))
    }

    pub fn available_sequence_numbers(&self) -> Vec<u32> {
        self.retransmission
            .iter()
            .map(|message| message.sequence_number)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_codec::DecodingLimits;
    use opcua_core::{ExtensionObject, Variant};
    use opcua_services::{MonitoringMode, MonitoringParameters, ReadValueId};

    fn subscription(keep_alive: u32, lifetime: u32) -> Subscription {
        let limits = SubscriptionLimits::default();
        let parameters = PublishingParameters::revise(&limits, 1000.0, keep_alive, lifetime, 0, 0);
        Subscription::new(1, NodeId::numeric(1, 1), parameters, true, limits)
    }

    fn item_request(handle: u32) -> MonitoredItemCreateRequest {
        MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId::value_of(NodeId::numeric(1, handle)),
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle: handle,
                sampling_interval: -1.0,
                filter: ExtensionObject::null(),
                queue_size: 1,
                discard_oldest: true,
            },
        }
    }

    fn with_item(subscription: &mut Subscription) -> u32 {
        let result = subscription.create_item(&item_request(7), TimestampsToReturn::Both, None, Instant::now());
        assert_eq!(result.status_code, StatusCode::GOOD);
        result.monitored_item_id
    }

    #[tokio::test]
    async fn test_keep_alive_after_max_count() {
        let mut subscription = subscription(3, 10);
        let now = Instant::now();
        assert_eq!(subscription.tick(now, true).unwrap(), TickOutcome::Idle);
        assert_eq!(subscription.tick(now, true).unwrap(), TickOutcome::Idle);
        assert!(subscription.next_message().is_none());
        assert_eq!(subscription.tick(now, true).unwrap(), TickOutcome::Ready);

        let (message, more) = subscription.next_message().unwrap();
        assert!(message.is_keep_alive());
        assert!(!more);
        // A keep-alive announces, but does not consume, the next number
        assert_eq!(message.sequence_number, 1);
        assert_eq!(subscription.next_sequence_number(), 1);
        assert_eq!(subscription.keep_alive_counter(), 0);
        assert_eq!(subscription.lifetime_counter(), 0);
    }

    #[tokio::test]
    async fn test_lifetime_expiry_without_publish_requests() {
        let mut subscription = subscription(3, 10);
        assert_eq!(subscription.parameters().max_lifetime_count, 10);
        let now = Instant::now();
        for _ in 0..9 {
            assert_ne!(subscription.tick(now, false).unwrap(), TickOutcome::Expired);
        }
        assert_eq!(subscription.tick(now, false).unwrap(), TickOutcome::Expired);
    }

    #[tokio::test]
    async fn test_delivery_resets_lifetime() {
        let mut subscription = subscription(1, 3);
        let now = Instant::now();
        for _ in 0..10 {
            assert_eq!(subscription.tick(now, true).unwrap(), TickOutcome::Ready);
            assert!(subscription.next_message().is_some());
        }
    }

    #[tokio::test]
    async fn test_data_change_is_numbered_and_retained() {
        let mut subscription = subscription(3, 10);
        let item = with_item(&mut subscription);
        let now = Instant::now();
        subscription.record_sample(item, DataValue::new_now(true), now);
        assert_eq!(subscription.tick(now, true).unwrap(), TickOutcome::Ready);

        let (message, _) = subscription.next_message().unwrap();
        assert_eq!(message.sequence_number, 1);
        let items = message.data_changes(&DecodingLimits::default()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].client_handle, 7);
        assert_eq!(items[0].value.value, Some(Variant::Boolean(true)));
        assert_eq!(subscription.available_sequence_numbers(), vec![1]);

        // Unchanged value produces nothing new
        subscription.record_sample(item, DataValue::new_now(true), now);
        assert_eq!(subscription.tick(now, true).unwrap(), TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_republish_hit_and_miss() {
        let mut subscription = subscription(3, 10);
        let item = with_item(&mut subscription);
        let now = Instant::now();
        for value in [1i32, 2] {
            subscription.record_sample(item, DataValue::new_now(value), now);
            subscription.tick(now, true).unwrap();
            subscription.next_message().unwrap();
        }
        assert_eq!(subscription.republish(2).unwrap().sequence_number, 2);
        let err = subscription.republish(3).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_MESSAGE_NOT_AVAILABLE);

        assert_eq!(subscription.acknowledge(1), StatusCode::GOOD);
        assert_eq!(subscription.acknowledge(1), StatusCode::BAD_SEQUENCE_NUMBER_UNKNOWN);
        assert!(subscription.republish(1).is_err());
        assert_eq!(subscription.available_sequence_numbers(), vec![2]);
    }

    #[tokio::test]
    async fn test_sequence_number_wraps_to_one() {
        let mut subscription = subscription(3, 10);
        subscription.next_sequence_number = u32::MAX;
        assert_eq!(subscription.allocate_sequence_number(), u32::MAX);
        assert_eq!(subscription.allocate_sequence_number(), 1);
        assert_eq!(subscription.allocate_sequence_number(), 2);
    }

    #[tokio::test]
    async fn test_notifications_split_by_max_per_publish() {
        let limits = SubscriptionLimits::default();
        let parameters = PublishingParameters::revise(&limits, 1000.0, 3, 10, 1, 0);
        let mut subscription = Subscription::new(2, NodeId::numeric(1, 1), parameters, true, limits);
        let now = Instant::now();
        let first = with_item(&mut subscription);
        let second = subscription
            .create_item(&item_request(8), TimestampsToReturn::Both, None, now)
            .monitored_item_id;
        subscription.record_sample(first, DataValue::new_now(1i32), now);
        subscription.record_sample(second, DataValue::new_now(2i32), now);
        subscription.tick(now, true).unwrap();

        let (message, more) = subscription.next_message().unwrap();
        assert_eq!(message.sequence_number, 1);
        assert!(more);
        let (message, more) = subscription.next_message().unwrap();
        assert_eq!(message.sequence_number, 2);
        assert!(!more);
    }

    #[tokio::test]
    async fn test_publishing_disabled_only_keeps_alive() {
        let mut subscription = subscription(1, 10);
        let item = with_item(&mut subscription);
        subscription.set_publishing_enabled(false);
        let now = Instant::now();
        subscription.record_sample(item, DataValue::new_now(5i32), now);
        assert_eq!(subscription.tick(now, true).unwrap(), TickOutcome::Ready);
        let (message, _) = subscription.next_message().unwrap();
        assert!(message.is_keep_alive());
    }

    #[tokio::test]
    async fn test_item_limit_and_delete() {
        let limits = SubscriptionLimits {
            max_monitored_items_per_subscription: 1,
            ..Default::default()
        };
        let parameters = PublishingParameters::revise(&limits, 100.0, 3, 10, 0, 0);
        let mut subscription = Subscription::new(3, NodeId::numeric(1, 1), parameters, true, limits);
        let item = with_item(&mut subscription);
        let result = subscription.create_item(&item_request(9), TimestampsToReturn::Both, None, Instant::now());
        assert_eq!(result.status_code, StatusCode::BAD_TOO_MANY_MONITORED_ITEMS);
        assert_eq!(subscription.delete_item(item), StatusCode::GOOD);
        assert_eq!(subscription.delete_item(item), StatusCode::BAD_MONITORED_ITEM_ID_INVALID);
    }
}
