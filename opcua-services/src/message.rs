//! Typed service messages as they travel in a secure channel body
//!
//! A message body is the NodeId of the structure's binary encoding
//! followed by the structure itself.

use crate::attribute::*;
use crate::header::{RequestHeader, ResponseHeader, ServiceFault};
use crate::ids::ObjectId;
use crate::secure_channel::*;
use crate::session::*;
use crate::subscription::*;
use opcua_codec::{BinaryDecoder, BinaryEncodable, BinaryEncoder, DecodingLimits};
use opcua_core::{NodeId, StatusCode, UaError, UaResult};

macro_rules! service_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($header_ty:ty, $header:ident) {
            $($variant:ident($ty:ty) = $id:expr),* $(,)?
        }
        unsupported: $unsupported:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub enum $name {
            $($variant($ty),)*
            /// A structure this stack does not handle; only its header was decoded
            $unsupported { type_id: NodeId, header: $header_ty },
        }

        impl $name {
            /// Binary encoding id of the carried structure
            pub fn type_id(&self) -> NodeId {
                match self {
                    $($name::$variant(_) => ObjectId::node_id($id),)*
                    $name::$unsupported { type_id, .. } => type_id.clone(),
                }
            }

            pub fn $header(&self) -> &$header_ty {
                match self {
                    $($name::$variant(message) => &message.$header,)*
                    $name::$unsupported { header, .. } => header,
                }
            }

            /// Encode type id and structure
            pub fn encode_message(&self) -> UaResult<Vec<u8>> {
                let mut encoder = BinaryEncoder::new();
                encoder.encode(&self.type_id())?;
                match self {
                    $($name::$variant(message) => message.encode(&mut encoder)?,)*
                    $name::$unsupported { .. } => {
                        return Err(UaError::Encoding(format!(
                            "Cannot encode unsupported message {}",
                            self.type_id()
                        )));
                    }
                }
                Ok(encoder.into_bytes())
            }

            /// Decode a complete message body
            pub fn decode_message(bytes: &[u8], limits: &DecodingLimits) -> UaResult<Self> {
                let mut decoder = BinaryDecoder::new(bytes, limits);
                let type_id: NodeId = decoder.decode()?;
                let message = match type_id.as_ns0_numeric() {
                    $(Some(id) if id == $id => $name::$variant(decoder.decode()?),)*
                    _ => {
                        let header = decoder.decode()?;
                        return Ok($name::$unsupported { type_id, header });
                    }
                };
                if !decoder.is_empty() {
                    return Err(UaError::Decoding(format!(
                        "{} trailing bytes after message {}",
                        decoder.remaining(),
                        type_id
                    )));
                }
                Ok(message)
            }
        }

        $(
            impl From<$ty> for $name {
                fn from(message: $ty) -> Self {
                    $name::$variant(message)
                }
            }
        )*
    };
}

service_enum! {
    /// Every request a client may send
    pub enum ServiceRequest (RequestHeader, request_header) {
        OpenSecureChannel(OpenSecureChannelRequest) = ObjectId::OPEN_SECURE_CHANNEL_REQUEST,
        CloseSecureChannel(CloseSecureChannelRequest) = ObjectId::CLOSE_SECURE_CHANNEL_REQUEST,
        CreateSession(CreateSessionRequest) = ObjectId::CREATE_SESSION_REQUEST,
        ActivateSession(ActivateSessionRequest) = ObjectId::ACTIVATE_SESSION_REQUEST,
        CloseSession(CloseSessionRequest) = ObjectId::CLOSE_SESSION_REQUEST,
        CreateSubscription(CreateSubscriptionRequest) = ObjectId::CREATE_SUBSCRIPTION_REQUEST,
        ModifySubscription(ModifySubscriptionRequest) = ObjectId::MODIFY_SUBSCRIPTION_REQUEST,
        SetPublishingMode(SetPublishingModeRequest) = ObjectId::SET_PUBLISHING_MODE_REQUEST,
        DeleteSubscriptions(DeleteSubscriptionsRequest) = ObjectId::DELETE_SUBSCRIPTIONS_REQUEST,
        TransferSubscriptions(TransferSubscriptionsRequest) = ObjectId::TRANSFER_SUBSCRIPTIONS_REQUEST,
        CreateMonitoredItems(CreateMonitoredItemsRequest) = ObjectId::CREATE_MONITORED_ITEMS_REQUEST,
        DeleteMonitoredItems(DeleteMonitoredItemsRequest) = ObjectId::DELETE_MONITORED_ITEMS_REQUEST,
        Publish(PublishRequest) = ObjectId::PUBLISH_REQUEST,
        Republish(RepublishRequest) = ObjectId::REPUBLISH_REQUEST,
        Read(ReadRequest) = ObjectId::READ_REQUEST,
        Write(WriteRequest) = ObjectId::WRITE_REQUEST,
    }
    unsupported: Unsupported
}

service_enum! {
    /// Every response a server may send
    pub enum ServiceResponse (ResponseHeader, response_header) {
        ServiceFault(ServiceFault) = ObjectId::SERVICE_FAULT,
        OpenSecureChannel(OpenSecureChannelResponse) = ObjectId::OPEN_SECURE_CHANNEL_RESPONSE,
        CloseSecureChannel(CloseSecureChannelResponse) = ObjectId::CLOSE_SECURE_CHANNEL_RESPONSE,
        CreateSession(CreateSessionResponse) = ObjectId::CREATE_SESSION_RESPONSE,
        ActivateSession(ActivateSessionResponse) = ObjectId::ACTIVATE_SESSION_RESPONSE,
        CloseSession(CloseSessionResponse) = ObjectId::CLOSE_SESSION_RESPONSE,
        CreateSubscription(CreateSubscriptionResponse) = ObjectId::CREATE_SUBSCRIPTION_RESPONSE,
        ModifySubscription(ModifySubscriptionResponse) = ObjectId::MODIFY_SUBSCRIPTION_RESPONSE,
        SetPublishingMode(SetPublishingModeResponse) = ObjectId::SET_PUBLISHING_MODE_RESPONSE,
        DeleteSubscriptions(DeleteSubscriptionsResponse) = ObjectId::DELETE_SUBSCRIPTIONS_RESPONSE,
        TransferSubscriptions(TransferSubscriptionsResponse) = ObjectId::TRANSFER_SUBSCRIPTIONS_RESPONSE,
        CreateMonitoredItems(CreateMonitoredItemsResponse) = ObjectId::CREATE_MONITORED_ITEMS_RESPONSE,
        DeleteMonitoredItems(DeleteMonitoredItemsResponse) = ObjectId::DELETE_MONITORED_ITEMS_RESPONSE,
        Publish(PublishResponse) = ObjectId::PUBLISH_RESPONSE,
        Republish(RepublishResponse) = ObjectId::REPUBLISH_RESPONSE,
        Read(ReadResponse) = ObjectId::READ_RESPONSE,
        Write(WriteResponse) = ObjectId::WRITE_RESPONSE,
    }
    unsupported: Unknown
}

impl ServiceResponse {
    /// A ServiceFault answering `request_handle`
    pub fn fault(request_handle: u32, status: StatusCode) -> Self {
        ServiceResponse::ServiceFault(ServiceFault::new(request_handle, status))
    }

    /// The service result, Bad for faults
    pub fn service_result(&self) -> StatusCode {
        self.response_header().service_result
    }

    /// Turn a fault into an error
    pub fn into_result(self) -> UaResult<Self> {
        let status = self.service_result();
        if status.is_bad() {
            Err(UaError::Status(status))
        } else {
            Ok(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_core::UaString;

    #[test]
    fn test_request_carries_type_id() {
        let request: ServiceRequest = CloseSessionRequest {
            request_header: RequestHeader::new(&NodeId::numeric(1, 5), 9),
            delete_subscriptions: true,
        }
        .into();
        let bytes = request.encode_message().unwrap();
        // FourByte NodeId form: 0x01, namespace 0, id 473
        assert_eq!(&bytes[..4], &[0x01, 0x00, 0xD9, 0x01]);
        let decoded = ServiceRequest::decode_message(&bytes, &DecodingLimits::default()).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.request_header().request_handle, 9);
    }

    #[test]
    fn test_unknown_request_keeps_header() {
        let mut encoder = BinaryEncoder::new();
        encoder.encode(&NodeId::numeric(0, 527)).unwrap();
        RequestHeader::new(&NodeId::null(), 42).encode(&mut encoder).unwrap();
        encoder.encode_string(&UaString::from("ignored")).unwrap();
        let bytes = encoder.into_bytes();

        let decoded = ServiceRequest::decode_message(&bytes, &DecodingLimits::default()).unwrap();
        match decoded {
            ServiceRequest::Unsupported { type_id, header } => {
                assert_eq!(type_id, NodeId::numeric(0, 527));
                assert_eq!(header.request_handle, 42);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fault_into_result() {
        let fault = ServiceResponse::fault(3, StatusCode::BAD_SESSION_ID_INVALID);
        let bytes = fault.encode_message().unwrap();
        let decoded = ServiceResponse::decode_message(&bytes, &DecodingLimits::default()).unwrap();
        assert_eq!(decoded.response_header().request_handle, 3);
        let err = decoded.into_result().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_SESSION_ID_INVALID);
    }
}
