//! Session state machine

use crate::error::{UaError, UaResult};

/// Session state
///
/// ```text
/// Created -> Active (ActivateSession)
/// Active -> Active (re-activation, possibly on another channel)
/// any -> Closed (CloseSession, inactivity timeout)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created but not yet activated; no other services allowed
    #[default]
    Created,
    Active,
    Closed,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }

    pub fn validate_transition(&self, new_state: SessionState) -> UaResult<()> {
        let valid = matches!(
            (*self, new_state),
            (SessionState::Created, SessionState::Active)
                | (SessionState::Active, SessionState::Active)
                | (SessionState::Created, SessionState::Closed)
                | (SessionState::Active, SessionState::Closed)
        );
        if valid {
            Ok(())
        } else {
            Err(UaError::Protocol(format!(
                "Invalid session state transition: {:?} -> {:?}",
                self, new_state
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "Created",
            SessionState::Active => "Active",
            SessionState::Closed => "Closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        SessionState::Created.validate_transition(SessionState::Active).unwrap();
        SessionState::Active.validate_transition(SessionState::Active).unwrap();
        SessionState::Active.validate_transition(SessionState::Closed).unwrap();
        assert!(SessionState::Closed.validate_transition(SessionState::Active).is_err());
        assert!(!SessionState::Created.is_active());
    }
}
