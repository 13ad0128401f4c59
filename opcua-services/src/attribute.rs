//! Attribute service set: Read and Write

use crate::header::{RequestHeader, ResponseHeader};
use opcua_core::{AttributeId, DataValue, DiagnosticInfo, NodeId, QualifiedName, StatusCode, UaString};

ua_enum! {
    /// Which timestamps a server returns with values
    pub enum TimestampsToReturn {
        Source = 0,
        Server = 1,
        Both = 2,
        Neither = 3,
        Invalid = 4,
    }
}

ua_struct! {
    /// Identifies one attribute of one node
    pub struct ReadValueId {
        pub node_id: NodeId,
        pub attribute_id: u32,
        pub index_range: UaString,
        pub data_encoding: QualifiedName,
    }
}

impl ReadValueId {
    pub fn new(node_id: NodeId, attribute_id: AttributeId) -> Self {
        Self {
            node_id,
            attribute_id: attribute_id.as_u32(),
            index_range: UaString::null(),
            data_encoding: QualifiedName::null(),
        }
    }

    /// Shorthand for the Value attribute of `node_id`
    pub fn value_of(node_id: NodeId) -> Self {
        Self::new(node_id, AttributeId::Value)
    }
}

ua_struct! {
    pub struct ReadRequest {
        pub request_header: RequestHeader,
        pub max_age: f64,
        pub timestamps_to_return: TimestampsToReturn,
        pub nodes_to_read: Vec<ReadValueId>,
    }
}

ua_struct! {
    pub struct ReadResponse {
        pub response_header: ResponseHeader,
        pub results: Vec<DataValue>,
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    pub struct WriteValue {
        pub node_id: NodeId,
        pub attribute_id: u32,
        pub index_range: UaString,
        pub value: DataValue,
    }
}

ua_struct! {
    pub struct WriteRequest {
        pub request_header: RequestHeader,
        pub nodes_to_write: Vec<WriteValue>,
    }
}

ua_struct! {
    pub struct WriteResponse {
        pub response_header: ResponseHeader,
        pub results: Vec<StatusCode>,
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}
