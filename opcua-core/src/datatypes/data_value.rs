use crate::datatypes::date_time::DateTime;
use crate::datatypes::variant::Variant;
use crate::status_code::StatusCode;
use serde::{Deserialize, Serialize};

/// A value with its status and timestamps
///
/// Every field is optional on the wire; a missing status means Good.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataValue {
    pub value: Option<Variant>,
    pub status: Option<StatusCode>,
    pub source_timestamp: Option<DateTime>,
    pub server_timestamp: Option<DateTime>,
}

impl DataValue {
    /// A good value stamped with the current time
    pub fn new_now(value: impl Into<Variant>) -> Self {
        let now = DateTime::now();
        Self {
            value: Some(value.into()),
            status: None,
            source_timestamp: Some(now),
            server_timestamp: Some(now),
        }
    }

    /// A value carrying only a bad status
    pub fn from_status(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Effective status, Good when absent
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::GOOD)
    }

    /// Whether value or status differ, ignoring timestamps
    pub fn differs_from(&self, other: &DataValue) -> bool {
        self.value != other.value || self.status().code() != other.status().code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_differs_ignores_timestamps() {
        let a = DataValue::new_now(true);
        let mut b = a.clone();
        b.source_timestamp = Some(DateTime::from_ticks(1));
        assert!(!a.differs_from(&b));
        b.value = Some(Variant::Boolean(false));
        assert!(a.differs_from(&b));
    }

    #[test]
    fn test_missing_status_is_good() {
        assert_eq!(DataValue::default().status(), StatusCode::GOOD);
        assert!(DataValue::from_status(StatusCode::BAD_NODE_ID_UNKNOWN).status().is_bad());
    }
}
