//! Nullable string and byte string types
//!
//! The binary protocol distinguishes a null string (length -1) from an
//! empty one (length 0), so both types wrap an `Option`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A UTF-8 string that may be null
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UaString(Option<String>);

impl UaString {
    /// The null string
    pub const fn null() -> Self {
        UaString(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Null or zero-length
    pub fn is_empty(&self) -> bool {
        self.0.as_deref().is_none_or(str::is_empty)
    }

    /// The string value, or `""` when null
    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }

    pub fn value(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

impl From<&str> for UaString {
    fn from(value: &str) -> Self {
        UaString(Some(value.to_string()))
    }
}

impl From<String> for UaString {
    fn from(value: String) -> Self {
        UaString(Some(value))
    }
}

impl From<Option<String>> for UaString {
    fn from(value: Option<String>) -> Self {
        UaString(value)
    }
}

impl fmt::Display for UaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque byte sequence that may be null
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ByteString(Option<Vec<u8>>);

impl ByteString {
    pub const fn null() -> Self {
        ByteString(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Null or zero-length
    pub fn is_empty(&self) -> bool {
        self.0.as_ref().is_none_or(Vec::is_empty)
    }

    /// The bytes, or an empty slice when null
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_deref().unwrap_or(&[])
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn into_inner(self) -> Option<Vec<u8>> {
        self.0
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(value: Vec<u8>) -> Self {
        ByteString(Some(value))
    }
}

impl From<&[u8]> for ByteString {
    fn from(value: &[u8]) -> Self {
        ByteString(Some(value.to_vec()))
    }
}

impl From<Option<Vec<u8>>> for ByteString {
    fn from(value: Option<Vec<u8>>) -> Self {
        ByteString(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_and_empty_are_distinct() {
        let null = UaString::null();
        let empty = UaString::from("");
        assert_ne!(null, empty);
        assert!(null.is_empty() && empty.is_empty());
        assert!(null.is_null() && !empty.is_null());
        assert_eq!(null.as_str(), "");
    }

    #[test]
    fn test_byte_string_access() {
        let bytes = ByteString::from(vec![1, 2, 3]);
        assert_eq!(bytes.len(), 3);
        assert_eq!(ByteString::null().as_bytes(), &[] as &[u8]);
        assert_ne!(ByteString::null(), ByteString::from(Vec::new()));
    }
}
