//! Subscription and monitored item service sets, notification payloads

use crate::attribute::{ReadValueId, TimestampsToReturn};
use crate::header::{RequestHeader, ResponseHeader};
use crate::ids::ObjectId;
use opcua_codec::{DecodingLimits, ExtensionObjectExt};
use opcua_core::{DataValue, DateTime, DiagnosticInfo, ExtensionObject, StatusCode, UaResult};

ua_enum! {
    pub enum MonitoringMode {
        Disabled = 0,
        Sampling = 1,
        Reporting = 2,
    }
}

ua_struct! {
    pub struct CreateSubscriptionRequest {
        pub request_header: RequestHeader,
        /// Milliseconds
        pub requested_publishing_interval: f64,
        pub requested_lifetime_count: u32,
        pub requested_max_keep_alive_count: u32,
        /// 0 for no limit
        pub max_notifications_per_publish: u32,
        pub publishing_enabled: bool,
        pub priority: u8,
    }
}

ua_struct! {
    pub struct CreateSubscriptionResponse {
        pub response_header: ResponseHeader,
        pub subscription_id: u32,
        pub revised_publishing_interval: f64,
        pub revised_lifetime_count: u32,
        pub revised_max_keep_alive_count: u32,
    }
}

ua_struct! {
    pub struct ModifySubscriptionRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub requested_publishing_interval: f64,
        pub requested_lifetime_count: u32,
        pub requested_max_keep_alive_count: u32,
        pub max_notifications_per_publish: u32,
        pub priority: u8,
    }
}

ua_struct! {
    pub struct ModifySubscriptionResponse {
        pub response_header: ResponseHeader,
        pub revised_publishing_interval: f64,
        pub revised_lifetime_count: u32,
        pub revised_max_keep_alive_count: u32,
    }
}

ua_struct! {
    pub struct SetPublishingModeRequest {
        pub request_header: RequestHeader,
        pub publishing_enabled: bool,
        pub subscription_ids: Vec<u32>,
    }
}

ua_struct! {
    pub struct SetPublishingModeResponse {
        pub response_header: ResponseHeader,
        pub results: Vec<StatusCode>,
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    pub struct DeleteSubscriptionsRequest {
        pub request_header: RequestHeader,
        pub subscription_ids: Vec<u32>,
    }
}

ua_struct! {
    pub struct DeleteSubscriptionsResponse {
        pub response_header: ResponseHeader,
        pub results: Vec<StatusCode>,
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    pub struct TransferSubscriptionsRequest {
        pub request_header: RequestHeader,
        pub subscription_ids: Vec<u32>,
        pub send_initial_values: bool,
    }
}

ua_struct! {
    pub struct TransferResult {
        pub status_code: StatusCode,
        pub available_sequence_numbers: Vec<u32>,
    }
}

ua_struct! {
    pub struct TransferSubscriptionsResponse {
        pub response_header: ResponseHeader,
        pub results: Vec<TransferResult>,
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    pub struct MonitoringParameters {
        pub client_handle: u32,
        /// Milliseconds; negative means the publishing interval
        pub sampling_interval: f64,
        pub filter: ExtensionObject,
        pub queue_size: u32,
        pub discard_oldest: bool,
    }
}

ua_struct! {
    pub struct MonitoredItemCreateRequest {
        pub item_to_monitor: ReadValueId,
        pub monitoring_mode: MonitoringMode,
        pub requested_parameters: MonitoringParameters,
    }
}

ua_struct! {
    pub struct MonitoredItemCreateResult {
        pub status_code: StatusCode,
        pub monitored_item_id: u32,
        pub revised_sampling_interval: f64,
        pub revised_queue_size: u32,
        pub filter_result: ExtensionObject,
    }
}

impl MonitoredItemCreateResult {
    pub fn failed(status_code: StatusCode) -> Self {
        Self {
            status_code,
            monitored_item_id: 0,
            revised_sampling_interval: 0.0,
            revised_queue_size: 0,
            filter_result: ExtensionObject::null(),
        }
    }
}

ua_struct! {
    pub struct CreateMonitoredItemsRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub timestamps_to_return: TimestampsToReturn,
        pub items_to_create: Vec<MonitoredItemCreateRequest>,
    }
}

ua_struct! {
    pub struct CreateMonitoredItemsResponse {
        pub response_header: ResponseHeader,
        pub results: Vec<MonitoredItemCreateResult>,
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    pub struct DeleteMonitoredItemsRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub monitored_item_ids: Vec<u32>,
    }
}

ua_struct! {
    pub struct DeleteMonitoredItemsResponse {
        pub response_header: ResponseHeader,
        pub results: Vec<StatusCode>,
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    pub struct SubscriptionAcknowledgement {
        pub subscription_id: u32,
        pub sequence_number: u32,
    }
}

ua_struct! {
    pub struct MonitoredItemNotification {
        pub client_handle: u32,
        pub value: DataValue,
    }
}

ua_struct! {
    pub struct DataChangeNotification {
        pub monitored_items: Vec<MonitoredItemNotification>,
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    pub struct StatusChangeNotification {
        pub status: StatusCode,
        pub diagnostic_info: DiagnosticInfo,
    }
}

impl DataChangeNotification {
    pub const TYPE_ID: u32 = ObjectId::DATA_CHANGE_NOTIFICATION;
}

impl StatusChangeNotification {
    pub const TYPE_ID: u32 = ObjectId::STATUS_CHANGE_NOTIFICATION;
}

ua_struct! {
    /// One numbered (or keep-alive) publication of a subscription
    pub struct NotificationMessage {
        pub sequence_number: u32,
        pub publish_time: DateTime,
        pub notification_data: Vec<ExtensionObject>,
    }
}

impl NotificationMessage {
    /// A keep-alive carries no data and announces the next sequence number
    pub fn keep_alive(next_sequence_number: u32) -> Self {
        Self {
            sequence_number: next_sequence_number,
            publish_time: DateTime::now(),
            notification_data: Vec::new(),
        }
    }

    pub fn data_change(sequence_number: u32, items: Vec<MonitoredItemNotification>) -> UaResult<Self> {
        let notification = DataChangeNotification {
            monitored_items: items,
            diagnostic_infos: Vec::new(),
        };
        Ok(Self {
            sequence_number,
            publish_time: DateTime::now(),
            notification_data: vec![ExtensionObject::from_encodable(
                ObjectId::node_id(DataChangeNotification::TYPE_ID),
                &notification,
            )?],
        })
    }

    pub fn status_change(sequence_number: u32, status: StatusCode) -> UaResult<Self> {
        let notification = StatusChangeNotification {
            status,
            diagnostic_info: DiagnosticInfo::default(),
        };
        Ok(Self {
            sequence_number,
            publish_time: DateTime::now(),
            notification_data: vec![ExtensionObject::from_encodable(
                ObjectId::node_id(StatusChangeNotification::TYPE_ID),
                &notification,
            )?],
        })
    }

    pub fn is_keep_alive(&self) -> bool {
        self.notification_data.is_empty()
    }

    /// All data change items carried by this message
    pub fn data_changes(&self, limits: &DecodingLimits) -> UaResult<Vec<MonitoredItemNotification>> {
        let mut items = Vec::new();
        for object in &self.notification_data {
            if object.type_id.as_ns0_numeric() == Some(DataChangeNotification::TYPE_ID) {
                let notification: DataChangeNotification = object.decode_inner(limits)?;
                items.extend(notification.monitored_items);
            }
        }
        Ok(items)
    }

    /// The status change carried by this message, if any
    pub fn status_change_status(&self, limits: &DecodingLimits) -> UaResult<Option<StatusCode>> {
        for object in &self.notification_data {
            if object.type_id.as_ns0_numeric() == Some(StatusChangeNotification::TYPE_ID) {
                let notification: StatusChangeNotification = object.decode_inner(limits)?;
                return Ok(Some(notification.status));
            }
        }
        Ok(None)
    }
}

ua_struct! {
    pub struct PublishRequest {
        pub request_header: RequestHeader,
        pub subscription_acknowledgements: Vec<SubscriptionAcknowledgement>,
    }
}

ua_struct! {
    pub struct PublishResponse {
        pub response_header: ResponseHeader,
        pub subscription_id: u32,
        pub available_sequence_numbers: Vec<u32>,
        pub more_notifications: bool,
        pub notification_message: NotificationMessage,
        /// One result per acknowledgement of the request
        pub results: Vec<StatusCode>,
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    pub struct RepublishRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub retransmit_sequence_number: u32,
    }
}

ua_struct! {
    pub struct RepublishResponse {
        pub response_header: ResponseHeader,
        pub notification_message: NotificationMessage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_codec::BinaryEncodable;
    use opcua_core::Variant;

    #[test]
    fn test_data_change_payload() {
        let item = MonitoredItemNotification {
            client_handle: 7,
            value: DataValue::new_now(true),
        };
        let message = NotificationMessage::data_change(1, vec![item.clone()]).unwrap();
        assert!(!message.is_keep_alive());
        let bytes = message.encode_to_vec().unwrap();
        let decoded = NotificationMessage::decode_exact(&bytes, &DecodingLimits::default()).unwrap();
        let items = decoded.data_changes(&DecodingLimits::default()).unwrap();
        assert_eq!(items, vec![item]);
        assert_eq!(items[0].value.value, Some(Variant::Boolean(true)));
    }

    #[test]
    fn test_status_change_payload() {
        let message = NotificationMessage::status_change(4, StatusCode::BAD_TIMEOUT).unwrap();
        assert_eq!(
            message.status_change_status(&DecodingLimits::default()).unwrap(),
            Some(StatusCode::BAD_TIMEOUT)
        );
        assert!(message.data_changes(&DecodingLimits::default()).unwrap().is_empty());
        assert!(NotificationMessage::keep_alive(5).is_keep_alive());
    }
}
