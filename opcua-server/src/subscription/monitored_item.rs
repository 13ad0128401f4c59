//! Monitored items: sampling, change detection and the value queue

use crate::address_space::apply_timestamps;
use crate::config::SubscriptionLimits;
use crate::error::{UaError, UaResult};
use opcua_core::{AttributeId, DataValue, NodeId, StatusCode};
use opcua_services::{
    MonitoredItemCreateRequest, MonitoredItemNotification, MonitoringMode, TimestampsToReturn,
};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// One sampled node attribute of a subscription
#[derive(Debug, Clone)]
pub struct MonitoredItem {
    id: u32,
    node_id: NodeId,
    attribute: AttributeId,
    client_handle: u32,
    monitoring_mode: MonitoringMode,
    timestamps: TimestampsToReturn,
    sampling_interval_ms: f64,
    queue_size: usize,
    discard_oldest: bool,
    last_value: Option<DataValue>,
    queue: VecDeque<DataValue>,
    next_sample: Instant,
}

impl MonitoredItem {
    /// Build from a create request, revising interval and queue size
    ///
    /// # Errors
    /// `BadAttributeIdInvalid` for unknown attributes,
    /// `BadMonitoredItemFilterUnsupported` for any filter
    pub fn new(
        id: u32,
        request: &MonitoredItemCreateRequest,
        timestamps: TimestampsToReturn,
        publishing_interval_ms: f64,
        limits: &SubscriptionLimits,
    ) -> UaResult<Self> {
        let attribute = AttributeId::from_u32(request.item_to_monitor.attribute_id)
            .ok_or(UaError::Status(StatusCode::BAD_ATTRIBUTE_ID_INVALID))?;
        let parameters = &request.requested_parameters;
        if !parameters.filter.is_null() {
            return Err(UaError::Status(StatusCode::BAD_MONITORED_ITEM_FILTER_UNSUPPORTED));
        }
        Ok(Self {
            id,
            node_id: request.item_to_monitor.node_id.clone(),
            attribute,
            client_handle: parameters.client_handle,
            monitoring_mode: request.monitoring_mode,
            timestamps,
            sampling_interval_ms: limits
                .revise_sampling_interval(parameters.sampling_interval, publishing_interval_ms),
            queue_size: limits.revise_queue_size(parameters.queue_size) as usize,
            discard_oldest: parameters.discard_oldest,
            last_value: None,
            queue: VecDeque::new(),
            next_sample: Instant::now(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn attribute(&self) -> AttributeId {
        self.attribute
    }

    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    pub fn monitoring_mode(&self) -> MonitoringMode {
        self.monitoring_mode
    }

    pub fn sampling_interval_ms(&self) -> f64 {
        self.sampling_interval_ms
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs_f64(self.sampling_interval_ms.max(1.0) / 1000.0)
    }

    pub fn next_sample(&self) -> Instant {
        self.next_sample
    }

    pub fn is_sampling(&self) -> bool {
        self.monitoring_mode != MonitoringMode::Disabled
    }

    pub fn is_sample_due(&self, now: Instant) -> bool {
        self.is_sampling() && now >= self.next_sample
    }

    /// Record that a sample was taken at `now`
    pub fn schedule_next(&mut self, now: Instant) {
        self.next_sample = now + self.sampling_interval();
    }

    /// Offer a sampled value; queued only when value or status changed
    ///
    /// # Returns
    /// Whether the value was queued
    pub fn sample(&mut self, value: DataValue) -> bool {
        if !self.is_sampling() {
            return false;
        }
        if self
            .last_value
            .as_ref()
            .is_some_and(|last| !value.differs_from(last))
        {
            return false;
        }
        self.last_value = Some(value.clone());
        self.enqueue(apply_timestamps(value, self.timestamps));
        true
    }

    /// Queue the last value again, as initial value after a transfer
    pub fn resend_last_value(&mut self) {
        if let Some(value) = self.last_value.clone() {
            self.enqueue(apply_timestamps(value, self.timestamps));
        }
    }

    /// Bounded insert, marking the neighbour of a lost value with the
    /// overflow bit
    fn enqueue(&mut self, value: DataValue) {
        if self.queue.len() < self.queue_size {
            self.queue.push_back(value);
            return;
        }
        if self.discard_oldest {
            self.queue.pop_front();
            self.queue.push_back(value);
            if self.queue_size > 1 {
                if let Some(front) = self.queue.front_mut() {
                    front.status = Some(front.status().with_overflow());
                }
            }
        } else if self.queue_size > 1 {
            // The new sample is dropped; the last kept value reports the loss.
            if let Some(back) = self.queue.back_mut() {
                back.status = Some(back.status().with_overflow());
            }
        }
    }

    /// Drain queued values when reporting
    pub fn take_notifications(&mut self) -> Vec<MonitoredItemNotification> {
        if self.monitoring_mode != MonitoringMode::Reporting {
            return Vec::new();
        }
        self.queue
            .drain(..)
            .map(|value| MonitoredItemNotification {
                client_handle: self.client_handle,
                value,
            })
            .collect()
    }

    pub fn has_notifications(&self) -> bool {
        self.monitoring_mode == MonitoringMode::Reporting && !self.queue.is_empty()
    }
}
