//! Request and response headers, and the service fault

use crate::ids::ObjectId;
use opcua_core::{DateTime, DiagnosticInfo, ExtensionObject, NodeId, StatusCode, UaString};

ua_struct! {
    /// Common header of every service request
    pub struct RequestHeader {
        /// Session authentication token, null before CreateSession
        pub authentication_token: NodeId,
        pub timestamp: DateTime,
        pub request_handle: u32,
        pub return_diagnostics: u32,
        pub audit_entry_id: UaString,
        /// Milliseconds the client waits, 0 for no timeout
        pub timeout_hint: u32,
        pub additional_header: ExtensionObject,
    }
}

impl RequestHeader {
    pub fn new(authentication_token: &NodeId, request_handle: u32) -> Self {
        Self {
            authentication_token: authentication_token.clone(),
            timestamp: DateTime::now(),
            request_handle,
            return_diagnostics: 0,
            audit_entry_id: UaString::null(),
            timeout_hint: 0,
            additional_header: ExtensionObject::null(),
        }
    }
}

impl Default for RequestHeader {
    fn default() -> Self {
        Self::new(&NodeId::null(), 0)
    }
}

ua_struct! {
    /// Common header of every service response
    pub struct ResponseHeader {
        pub timestamp: DateTime,
        pub request_handle: u32,
        pub service_result: StatusCode,
        pub service_diagnostics: DiagnosticInfo,
        pub string_table: Option<Vec<UaString>>,
        pub additional_header: ExtensionObject,
    }
}

impl ResponseHeader {
    /// Header answering `request` with `service_result`
    pub fn new(request: &RequestHeader, service_result: StatusCode) -> Self {
        Self::for_handle(request.request_handle, service_result)
    }

    pub fn for_handle(request_handle: u32, service_result: StatusCode) -> Self {
        Self {
            timestamp: DateTime::now(),
            request_handle,
            service_result,
            service_diagnostics: DiagnosticInfo::default(),
            string_table: None,
            additional_header: ExtensionObject::null(),
        }
    }

    pub fn good(request: &RequestHeader) -> Self {
        Self::new(request, StatusCode::GOOD)
    }
}

ua_struct! {
    /// Response sent when a whole service call fails
    pub struct ServiceFault {
        pub response_header: ResponseHeader,
    }
}

impl ServiceFault {
    pub const TYPE_ID: u32 = ObjectId::SERVICE_FAULT;

    pub fn new(request_handle: u32, status: StatusCode) -> Self {
        Self {
            response_header: ResponseHeader::for_handle(request_handle, status),
        }
    }
}
