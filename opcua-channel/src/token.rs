//! Security tokens and the current/previous token pair

use crate::error::{UaError, UaResult};
use opcua_core::{DateTime, StatusCode};
use opcua_security::SymmetricKeys;
use std::time::Duration;
use tokio::time::Instant;

/// A token as issued by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityToken {
    pub channel_id: u32,
    pub token_id: u32,
    /// Wall clock creation time sent on the wire
    pub created_at: DateTime,
    /// Monotonic creation time used for expiry
    pub issued_at: Instant,
    pub lifetime: Duration,
}

impl SecurityToken {
    pub fn new(channel_id: u32, token_id: u32, lifetime: Duration) -> Self {
        Self {
            channel_id,
            token_id,
            created_at: DateTime::now(),
            issued_at: Instant::now(),
            lifetime,
        }
    }

    pub fn expires_at(&self) -> Instant {
        self.issued_at + self.lifetime
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }

    /// When a client should start renewing: 75% of the lifetime
    pub fn renew_at(&self) -> Instant {
        self.issued_at + self.lifetime.mul_f64(0.75)
    }

    pub fn lifetime_ms(&self) -> u32 {
        u32::try_from(self.lifetime.as_millis()).unwrap_or(u32::MAX)
    }
}

/// A token with the keys derived for it
#[derive(Debug, Clone)]
pub struct ActiveToken {
    pub token: SecurityToken,
    /// Keys protecting what we send
    pub sending: SymmetricKeys,
    /// Keys protecting what the peer sends
    pub receiving: SymmetricKeys,
}

/// The current token and, during a renewal overlap, the previous one
#[derive(Debug, Default)]
pub struct TokenSet {
    current: Option<ActiveToken>,
    previous: Option<ActiveToken>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token used for everything we send
    pub fn current(&self) -> Option<&ActiveToken> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&ActiveToken> {
        self.previous.as_ref()
    }

    /// Make `token` current
    ///
    /// The replaced token stays valid for receiving until its own lifetime
    /// passes. A replaced token that already expired is dropped, leaving
    /// the new token as the only valid one.
    pub fn install(&mut self, token: ActiveToken, now: Instant) {
        let replaced = self.current.replace(token);
        self.previous = replaced.filter(|old| !old.token.is_expired(now));
    }

    /// Keys for a message the peer sent under `token_id`
    ///
    /// Receiving under the current token ends the overlap with the
    /// previous one.
    ///
    /// # Errors
    /// `BadSecureChannelTokenUnknown` for unknown or expired tokens
    pub fn receiving_token(&mut self, token_id: u32, now: Instant) -> UaResult<&ActiveToken> {
        self.retire_expired(now);
        let unknown = || UaError::Status(StatusCode::BAD_SECURE_CHANNEL_TOKEN_UNKNOWN);

        let is_current = self
            .current
            .as_ref()
            .is_some_and(|current| current.token.token_id == token_id);
        if is_current {
            self.previous = None;
            return self.current.as_ref().ok_or_else(unknown);
        }
        match &self.previous {
            Some(previous) if previous.token.token_id == token_id => Ok(previous),
            _ => Err(unknown()),
        }
    }

    /// Drop tokens whose lifetime has passed
    pub fn retire_expired(&mut self, now: Instant) {
        if self.previous.as_ref().is_some_and(|t| t.token.is_expired(now)) {
            self.previous = None;
        }
        if self.current.as_ref().is_some_and(|t| t.token.is_expired(now)) {
            self.current = None;
        }
    }

    /// Whether no valid token remains
    pub fn is_expired(&self, now: Instant) -> bool {
        self.current.as_ref().is_none_or(|t| t.token.is_expired(now))
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.previous = None;
    }
}
