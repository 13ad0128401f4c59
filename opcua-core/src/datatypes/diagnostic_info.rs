use crate::datatypes::string::UaString;
use crate::status_code::StatusCode;
use serde::{Deserialize, Serialize};

/// Vendor diagnostics attached to a response
///
/// Every field is optional; the wire encoding carries a mask of the
/// fields present. This stack never requests diagnostics, so responses it
/// builds always carry the empty value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiagnosticInfo {
    pub symbolic_id: Option<i32>,
    pub namespace_uri: Option<i32>,
    pub localized_text: Option<i32>,
    pub locale: Option<i32>,
    pub additional_info: Option<UaString>,
    pub inner_status_code: Option<StatusCode>,
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

impl DiagnosticInfo {
    pub fn is_empty(&self) -> bool {
        *self == DiagnosticInfo::default()
    }
}
