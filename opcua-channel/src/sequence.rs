//! Chunk sequence numbers

use crate::error::{UaError, UaResult};
use opcua_core::StatusCode;

/// Numbers above this wrap back to 1 on the sending side
pub const WRAP_THRESHOLD: u32 = u32::MAX - 1024;

/// After a wrap the receiver expects a number below this
pub const WRAP_LIMIT: u32 = 1024;

/// Hands out outgoing sequence numbers
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    next: u32,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(next: u32) -> Self {
        Self { next }
    }

    /// Take the next number
    pub fn next(&mut self) -> u32 {
        let current = self.next;
        self.next = if current > WRAP_THRESHOLD { 1 } else { current + 1 };
        current
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks incoming sequence numbers
#[derive(Debug, Clone, Default)]
pub struct SequenceValidator {
    last: Option<u32>,
}

impl SequenceValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<u32> {
        self.last
    }

    /// Accept `number` if it continues the sequence
    ///
    /// The first number seen is accepted as is. A wrap is accepted only
    /// when the last number passed the wrap threshold.
    ///
    /// # Errors
    /// `BadSequenceNumberInvalid` on any gap, repeat or early wrap
    pub fn check(&mut self, number: u32) -> UaResult<()> {
        let valid = match self.last {
            None => true,
            Some(last) if last > WRAP_THRESHOLD && number < WRAP_LIMIT => true,
            Some(last) => last.checked_add(1) == Some(number),
        };
        if !valid {
            return Err(UaError::Status(StatusCode::BAD_SEQUENCE_NUMBER_INVALID));
        }
        self.last = Some(number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let mut counter = SequenceCounter::new();
        let mut validator = SequenceValidator::new();
        for expected in 1..=100 {
            let number = counter.next();
            assert_eq!(number, expected);
            validator.check(number).unwrap();
        }
    }

    #[test]
    fn test_wrap_accepted_after_threshold() {
        let mut counter = SequenceCounter::starting_at(WRAP_THRESHOLD);
        let mut validator = SequenceValidator::new();
        let numbers: Vec<u32> = (0..4).map(|_| counter.next()).collect();
        assert_eq!(numbers, vec![WRAP_THRESHOLD, WRAP_THRESHOLD + 1, 1, 2]);
        for number in numbers {
            validator.check(number).unwrap();
        }
    }

    #[test]
    fn test_gap_and_early_wrap_rejected() {
        let mut validator = SequenceValidator::new();
        validator.check(10).unwrap();
        let err = validator.check(12).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_SEQUENCE_NUMBER_INVALID);

        let mut validator = SequenceValidator::new();
        validator.check(WRAP_THRESHOLD).unwrap();
        assert!(validator.check(1).is_err());
        assert!(validator.check(WRAP_THRESHOLD).is_err());
    }
}
