//! OPC UA status codes
//!
//! A status code is a 32-bit value: the top two bits carry the severity
//! (00 good, 01 uncertain, 10 bad), bits 16..28 the sub-code and the low
//! bits carry info flags such as the data-value overflow bit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-bit OPC UA status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u32);

const SEVERITY_MASK: u32 = 0xC000_0000;
const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;
const SEVERITY_BAD: u32 = 0x8000_0000;
const CODE_MASK: u32 = 0xFFFF_0000;
/// InfoType = DataValue (bit 10) plus Overflow (bit 7)
const INFO_OVERFLOW: u32 = 0x0000_0480;

macro_rules! status_codes {
    ($($name:ident = $value:literal),+ $(,)?) => {
        impl StatusCode {
            $(pub const $name: StatusCode = StatusCode($value);)+

            fn symbol(&self) -> Option<&'static str> {
                match self.0 & CODE_MASK {
                    $($value => Some(stringify!($name)),)+
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    GOOD = 0x0000_0000,
    GOOD_SUBSCRIPTION_TRANSFERRED = 0x002D_0000,
    UNCERTAIN = 0x4000_0000,
    BAD = 0x8000_0000,
    BAD_UNEXPECTED_ERROR = 0x8001_0000,
    BAD_INTERNAL_ERROR = 0x8002_0000,
    BAD_OUT_OF_MEMORY = 0x8003_0000,
    BAD_COMMUNICATION_ERROR = 0x8005_0000,
    BAD_ENCODING_ERROR = 0x8006_0000,
    BAD_DECODING_ERROR = 0x8007_0000,
    BAD_ENCODING_LIMITS_EXCEEDED = 0x8008_0000,
    BAD_UNKNOWN_RESPONSE = 0x8009_0000,
    BAD_TIMEOUT = 0x800A_0000,
    BAD_SERVICE_UNSUPPORTED = 0x800B_0000,
    BAD_SHUTDOWN = 0x800C_0000,
    BAD_SERVER_NOT_CONNECTED = 0x800D_0000,
    BAD_NOTHING_TO_DO = 0x800F_0000,
    BAD_TOO_MANY_OPERATIONS = 0x8010_0000,
    BAD_CERTIFICATE_INVALID = 0x8012_0000,
    BAD_SECURITY_CHECKS_FAILED = 0x8013_0000,
    BAD_CERTIFICATE_UNTRUSTED = 0x801A_0000,
    BAD_USER_ACCESS_DENIED = 0x801F_0000,
    BAD_IDENTITY_TOKEN_INVALID = 0x8020_0000,
    BAD_IDENTITY_TOKEN_REJECTED = 0x8021_0000,
    BAD_SECURE_CHANNEL_ID_INVALID = 0x8022_0000,
    BAD_NONCE_INVALID = 0x8024_0000,
    BAD_SESSION_ID_INVALID = 0x8025_0000,
    BAD_SESSION_CLOSED = 0x8026_0000,
    BAD_SESSION_NOT_ACTIVATED = 0x8027_0000,
    BAD_SUBSCRIPTION_ID_INVALID = 0x8028_0000,
    BAD_REQUEST_HEADER_INVALID = 0x802A_0000,
    BAD_TIMESTAMPS_TO_RETURN_INVALID = 0x802B_0000,
    BAD_NODE_ID_UNKNOWN = 0x8034_0000,
    BAD_ATTRIBUTE_ID_INVALID = 0x8035_0000,
    BAD_NOT_READABLE = 0x803A_0000,
    BAD_NOT_WRITABLE = 0x803B_0000,
    BAD_MONITORED_ITEM_ID_INVALID = 0x8042_0000,
    BAD_MONITORED_ITEM_FILTER_UNSUPPORTED = 0x8044_0000,
    BAD_SECURITY_MODE_REJECTED = 0x8054_0000,
    BAD_SECURITY_POLICY_REJECTED = 0x8055_0000,
    BAD_TOO_MANY_SESSIONS = 0x8056_0000,
    BAD_APPLICATION_SIGNATURE_INVALID = 0x8058_0000,
    BAD_TYPE_MISMATCH = 0x8074_0000,
    BAD_TOO_MANY_SUBSCRIPTIONS = 0x8077_0000,
    BAD_TOO_MANY_PUBLISH_REQUESTS = 0x8078_0000,
    BAD_NO_SUBSCRIPTION = 0x8079_0000,
    BAD_SEQUENCE_NUMBER_UNKNOWN = 0x807A_0000,
    BAD_MESSAGE_NOT_AVAILABLE = 0x807B_0000,
    BAD_TCP_MESSAGE_TYPE_INVALID = 0x807E_0000,
    BAD_TCP_SECURE_CHANNEL_UNKNOWN = 0x807F_0000,
    BAD_TCP_MESSAGE_TOO_LARGE = 0x8080_0000,
    BAD_TCP_NOT_ENOUGH_RESOURCES = 0x8081_0000,
    BAD_TCP_INTERNAL_ERROR = 0x8082_0000,
    BAD_TCP_ENDPOINT_URL_INVALID = 0x8083_0000,
    BAD_SECURE_CHANNEL_CLOSED = 0x8086_0000,
    BAD_SECURE_CHANNEL_TOKEN_UNKNOWN = 0x8087_0000,
    BAD_SEQUENCE_NUMBER_INVALID = 0x8088_0000,
    BAD_INVALID_ARGUMENT = 0x80AB_0000,
    BAD_CONNECTION_CLOSED = 0x80AE_0000,
    BAD_INVALID_STATE = 0x80AF_0000,
    BAD_REQUEST_TOO_LARGE = 0x80B8_0000,
    BAD_RESPONSE_TOO_LARGE = 0x80B9_0000,
    BAD_PROTOCOL_VERSION_UNSUPPORTED = 0x80BE_0000,
    BAD_TOO_MANY_MONITORED_ITEMS = 0x80DB_0000,
    BAD_CERTIFICATE_POLICY_CHECK_FAILED = 0x8114_0000,
}

impl StatusCode {
    /// Create a status code from its raw wire value
    pub const fn from_u32(value: u32) -> Self {
        StatusCode(value)
    }

    /// Raw wire value
    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_good(&self) -> bool {
        self.0 & SEVERITY_MASK == 0
    }

    pub const fn is_uncertain(&self) -> bool {
        self.0 & SEVERITY_MASK == SEVERITY_UNCERTAIN
    }

    pub const fn is_bad(&self) -> bool {
        self.0 & SEVERITY_MASK == SEVERITY_BAD
    }

    /// The status code with info bits stripped
    pub const fn code(&self) -> StatusCode {
        StatusCode(self.0 & CODE_MASK)
    }

    /// Set the data-value overflow info bits
    ///
    /// Marks a queued value whose neighbour was discarded because the
    /// monitored item queue was full.
    pub const fn with_overflow(&self) -> StatusCode {
        StatusCode(self.0 | INFO_OVERFLOW)
    }

    pub const fn has_overflow(&self) -> bool {
        self.0 & INFO_OVERFLOW == INFO_OVERFLOW
    }

    /// Transport level codes that always close the channel they occur on
    pub fn is_channel_fatal(&self) -> bool {
        matches!(
            self.code(),
            StatusCode::BAD_TCP_MESSAGE_TOO_LARGE
                | StatusCode::BAD_TCP_NOT_ENOUGH_RESOURCES
                | StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID
                | StatusCode::BAD_TCP_INTERNAL_ERROR
                | StatusCode::BAD_TCP_SECURE_CHANNEL_UNKNOWN
                | StatusCode::BAD_SECURITY_CHECKS_FAILED
                | StatusCode::BAD_SEQUENCE_NUMBER_INVALID
                | StatusCode::BAD_SECURE_CHANNEL_TOKEN_UNKNOWN
                | StatusCode::BAD_SECURE_CHANNEL_CLOSED
                | StatusCode::BAD_DECODING_ERROR
                | StatusCode::BAD_ENCODING_LIMITS_EXCEEDED
        )
    }

    /// Symbolic name, if the code is known
    pub fn name(&self) -> Option<&'static str> {
        self.symbol()
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        StatusCode(value)
    }
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}
