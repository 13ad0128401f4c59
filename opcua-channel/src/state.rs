//! Secure channel state machine

use crate::error::{UaError, UaResult};

/// Secure channel state
///
/// # State Transitions
/// ```text
/// Closed -> OpeningAsymmetric (Issue request sent or received)
/// OpeningAsymmetric -> Open (token issued)
/// Open -> Renewing (Renew request sent or received)
/// Renewing -> Open (new token issued)
/// any -> Faulted (protocol violation, crypto failure)
/// any -> Closed (CloseSecureChannel, transport closed, token expired)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No channel (initial and final state)
    #[default]
    Closed,
    /// Issue exchange in progress
    ///
    /// Only asymmetrically secured OpenSecureChannel messages are valid.
    OpeningAsymmetric,
    /// A token is active and symmetric messages flow
    Open,
    /// A renewal is in progress
    ///
    /// Symmetric messages keep flowing under the current token.
    Renewing,
    /// A protocol violation occurred
    ///
    /// No further service messages are accepted; the owner tears down the
    /// transport and moves to `Closed`.
    Faulted,
}

impl ChannelState {
    /// Whether symmetric service messages may be sent and received
    ///
    /// # Returns
    /// `true` in `Open` and `Renewing`
    pub fn can_exchange_messages(&self) -> bool {
        matches!(self, ChannelState::Open | ChannelState::Renewing)
    }

    /// Whether a renew may start
    pub fn can_renew(&self) -> bool {
        matches!(self, ChannelState::Open)
    }

    /// Validate state transition
    ///
    /// # Arguments
    /// * `new_state` - The target state
    ///
    /// # Returns
    /// `Ok(())` if transition is valid, `Err` otherwise
    pub fn validate_transition(&self, new_state: ChannelState) -> UaResult<()> {
        let valid = match (*self, new_state) {
            (ChannelState::Closed, ChannelState::OpeningAsymmetric) => true,
            (ChannelState::OpeningAsymmetric, ChannelState::Open) => true,
            (ChannelState::Open, ChannelState::Renewing) => true,
            (ChannelState::Renewing, ChannelState::Open) => true,
            (_, ChannelState::Faulted) => true,
            (_, ChannelState::Closed) => true,
            (ChannelState::Open, ChannelState::Open) => true,
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(UaError::Protocol(format!(
                "Invalid channel state transition: {:?} -> {:?}",
                self, new_state
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Closed => "Closed",
            ChannelState::OpeningAsymmetric => "OpeningAsymmetric",
            ChannelState::Open => "Open",
            ChannelState::Renewing => "Renewing",
            ChannelState::Faulted => "Faulted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let path = [
            ChannelState::Closed,
            ChannelState::OpeningAsymmetric,
            ChannelState::Open,
            ChannelState::Renewing,
            ChannelState::Open,
            ChannelState::Closed,
        ];
        for pair in path.windows(2) {
            pair[0].validate_transition(pair[1]).unwrap();
        }
    }

    #[test]
    fn test_fault_from_anywhere() {
        for state in [ChannelState::OpeningAsymmetric, ChannelState::Open, ChannelState::Renewing] {
            state.validate_transition(ChannelState::Faulted).unwrap();
        }
        ChannelState::Faulted.validate_transition(ChannelState::Closed).unwrap();
        assert!(ChannelState::Faulted.validate_transition(ChannelState::Open).is_err());
        assert!(ChannelState::Closed.validate_transition(ChannelState::Open).is_err());
        assert!(!ChannelState::Faulted.can_exchange_messages());
    }
}
