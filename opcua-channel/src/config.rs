//! Secure channel configuration

use crate::assembler::DEFAULT_MAX_PENDING_MESSAGES;
use opcua_codec::DecodingLimits;
use serde::{Deserialize, Serialize};

/// Token lifetime bounds and decoding limits of a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelLimits {
    /// Server: shortest token lifetime granted, milliseconds
    pub min_token_lifetime_ms: u32,
    /// Server: longest token lifetime granted, milliseconds
    pub max_token_lifetime_ms: u32,
    /// Client: lifetime asked for, milliseconds
    pub requested_token_lifetime_ms: u32,
    /// Messages that may be half assembled at once
    pub max_pending_messages: usize,
    pub decoding: DecodingLimits,
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            min_token_lifetime_ms: 10_000,
            max_token_lifetime_ms: 3_600_000,
            requested_token_lifetime_ms: 600_000,
            max_pending_messages: DEFAULT_MAX_PENDING_MESSAGES,
            decoding: DecodingLimits::default(),
        }
    }
}

impl ChannelLimits {
    /// Clamp a requested lifetime; 0 asks for the maximum
    pub fn revise_token_lifetime(&self, requested_ms: u32) -> u32 {
        if requested_ms == 0 {
            return self.max_token_lifetime_ms;
        }
        requested_ms.clamp(self.min_token_lifetime_ms, self.max_token_lifetime_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revise_token_lifetime() {
        let limits = ChannelLimits::default();
        assert_eq!(limits.revise_token_lifetime(0), 3_600_000);
        assert_eq!(limits.revise_token_lifetime(1), 10_000);
        assert_eq!(limits.revise_token_lifetime(60_000), 60_000);
        assert_eq!(limits.revise_token_lifetime(u32::MAX), 3_600_000);
    }
}
