use serde::{Deserialize, Serialize};

/// Upper bounds applied while decoding untrusted input
///
/// A length prefix above its bound fails the decode before any allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodingLimits {
    /// Maximum characters (bytes) in a string
    pub max_string_length: usize,
    /// Maximum bytes in a byte string (certificates, nonces, bodies)
    pub max_byte_string_length: usize,
    /// Maximum elements in an array
    pub max_array_length: usize,
    /// Maximum nesting of recursive structures
    pub max_recursion_depth: usize,
}

impl Default for DecodingLimits {
    fn default() -> Self {
        Self {
            max_string_length: 65_535,
            max_byte_string_length: 1 << 20,
            max_array_length: 100_000,
            max_recursion_depth: 32,
        }
    }
}
