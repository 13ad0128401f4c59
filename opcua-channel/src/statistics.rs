//! Secure channel statistics collection

/// Secure channel statistics
///
/// Counters are updated by the channel as chunks flow; owners may read
/// them at any time for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStatistics {
    /// Chunks encoded for sending
    pub chunks_sent: u64,
    /// Chunks accepted from the peer
    pub chunks_received: u64,
    /// Bytes of encoded chunks sent
    pub bytes_sent: u64,
    /// Bytes of chunks received
    pub bytes_received: u64,
    /// Signature, decryption, padding or certificate failures
    pub security_failures: u64,
    /// Sequence number mismatches
    pub sequence_errors: u64,
    /// Tokens issued after the first
    pub renewals: u64,
    /// Messages discarded because the sender aborted them
    pub aborted_messages: u64,
}

impl ChannelStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all statistics counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn record_sent(&mut self, bytes: usize) {
        self.chunks_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.chunks_received += 1;
        self.bytes_received += bytes as u64;
    }

    pub fn increment_security_failures(&mut self) {
        self.security_failures += 1;
    }

    pub fn increment_sequence_errors(&mut self) {
        self.sequence_errors += 1;
    }

    pub fn increment_renewals(&mut self) {
        self.renewals += 1;
    }

    pub fn increment_aborted_messages(&mut self) {
        self.aborted_messages += 1;
    }

    /// Get error rate as a percentage of received chunks
    ///
    /// Returns 0.0 if no chunks have been received.
    pub fn error_rate(&self) -> f64 {
        let errors = self.security_failures + self.sequence_errors;
        if self.chunks_received == 0 {
            0.0
        } else {
            (errors as f64 / self.chunks_received as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = ChannelStatistics::new();
        stats.record_received(100);
        stats.record_received(50);
        stats.increment_sequence_errors();
        assert_eq!(stats.bytes_received, 150);
        assert_eq!(stats.error_rate(), 50.0);
        stats.clear();
        assert_eq!(stats, ChannelStatistics::default());
    }
}
