//! The address space the server reads and writes through
//!
//! The server treats the address space as an external, read-mostly
//! collaborator. `MemoryAddressSpace` is a small variable store good enough
//! for embedding and tests.

use async_trait::async_trait;
use opcua_core::{AttributeId, DataValue, DateTime, NodeId, StatusCode, Variant};
use opcua_services::TimestampsToReturn;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Attribute access used by Read, Write and monitored item sampling
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AddressSpace: Send + Sync {
    /// Read one attribute
    ///
    /// Failures are reported in the returned value's status
    /// (`BadNodeIdUnknown`, `BadAttributeIdInvalid`, `BadNotReadable`).
    async fn read_attribute(&self, node_id: &NodeId, attribute: AttributeId) -> DataValue;

    /// Write one attribute and report the outcome
    async fn write_attribute(&self, node_id: &NodeId, attribute: AttributeId, value: &DataValue) -> StatusCode;
}

/// Strip the timestamps a client did not ask for
pub fn apply_timestamps(mut value: DataValue, timestamps: TimestampsToReturn) -> DataValue {
    match timestamps {
        TimestampsToReturn::Source => value.server_timestamp = None,
        TimestampsToReturn::Server => value.source_timestamp = None,
        TimestampsToReturn::Neither => {
            value.source_timestamp = None;
            value.server_timestamp = None;
        }
        TimestampsToReturn::Both | TimestampsToReturn::Invalid => {}
    }
    value
}

#[derive(Debug, Clone)]
struct Variable {
    value: DataValue,
    writable: bool,
}

/// In-memory variables keyed by node id
#[derive(Debug, Default)]
pub struct MemoryAddressSpace {
    variables: RwLock<HashMap<NodeId, Variable>>,
}

impl MemoryAddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a variable
    pub fn add_variable(&self, node_id: NodeId, value: impl Into<Variant>, writable: bool) {
        self.variables.write().insert(
            node_id,
            Variable {
                value: DataValue::new_now(value),
                writable,
            },
        );
    }

    /// Update a value from the server side, regardless of writability
    ///
    /// # Returns
    /// `false` when the node does not exist
    pub fn set_value(&self, node_id: &NodeId, value: impl Into<Variant>) -> bool {
        match self.variables.write().get_mut(node_id) {
            Some(variable) => {
                variable.value = DataValue::new_now(value);
                true
            }
            None => false,
        }
    }

    pub fn value(&self, node_id: &NodeId) -> Option<DataValue> {
        self.variables.read().get(node_id).map(|variable| variable.value.clone())
    }
}

#[async_trait]
impl AddressSpace for MemoryAddressSpace {
    async fn read_attribute(&self, node_id: &NodeId, attribute: AttributeId) -> DataValue {
        let variables = self.variables.read();
        let Some(variable) = variables.get(node_id) else {
            return DataValue::from_status(StatusCode::BAD_NODE_ID_UNKNOWN);
        };
        match attribute {
            AttributeId::Value => {
                let mut value = variable.value.clone();
                value.server_timestamp = Some(DateTime::now());
                value
            }
            AttributeId::NodeId => DataValue::new_now(Variant::NodeId(Box::new(node_id.clone()))),
            _ => DataValue::from_status(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
        }
    }

    async fn write_attribute(&self, node_id: &NodeId, attribute: AttributeId, value: &DataValue) -> StatusCode {
        let mut variables = self.variables.write();
        let Some(variable) = variables.get_mut(node_id) else {
            return StatusCode::BAD_NODE_ID_UNKNOWN;
        };
        if attribute != AttributeId::Value {
            return StatusCode::BAD_ATTRIBUTE_ID_INVALID;
        }
        if !variable.writable {
            return StatusCode::BAD_NOT_WRITABLE;
        }
        let (Some(new), Some(old)) = (&value.value, &variable.value.value) else {
            return StatusCode::BAD_TYPE_MISMATCH;
        };
        if new.scalar_type() != old.scalar_type() {
            return StatusCode::BAD_TYPE_MISMATCH;
        }
        let now = DateTime::now();
        variable.value = DataValue {
            value: Some(new.clone()),
            status: value.status,
            source_timestamp: value.source_timestamp.or(Some(now)),
            server_timestamp: Some(now),
        };
        StatusCode::GOOD
    }
}
