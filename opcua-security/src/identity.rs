//! User identity tokens and their validation

use crate::certificate::{Certificate, CertificateProvider};
use crate::error::{UaError, UaResult};
use crate::suite::{AsymmetricPadding, SecurityPolicy};
use crate::utils::Thumbprint;
use async_trait::async_trait;
use opcua_core::StatusCode;
use std::collections::{HashMap, HashSet};

/// A decoded identity token as presented in ActivateSession
///
/// Passwords are already decrypted and X.509 tokens already proven by
/// their signature when a validator sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityToken {
    Anonymous,
    UserName { user_name: String, password: Vec<u8> },
    X509 { certificate: Certificate },
}

/// The user a session runs as
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserIdentity {
    Anonymous,
    UserName(String),
    Certificate(Thumbprint),
}

/// Decides who may activate a session
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityValidator: Send + Sync {
    /// Accept or reject a token
    ///
    /// # Errors
    /// `BadIdentityTokenRejected` for token kinds that are not allowed,
    /// `BadUserAccessDenied` for wrong credentials
    async fn validate(&self, token: &IdentityToken) -> UaResult<UserIdentity>;
}

/// Validator backed by fixed lists
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityValidator {
    allow_anonymous: bool,
    users: HashMap<String, String>,
    certificates: HashSet<Thumbprint>,
}

impl StaticIdentityValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    pub fn with_user(mut self, user_name: &str, password: &str) -> Self {
        self.users.insert(user_name.to_string(), password.to_string());
        self
    }

    pub fn with_certificate(mut self, certificate: &Certificate) -> Self {
        self.certificates.insert(certificate.thumbprint());
        self
    }
}

#[async_trait]
impl IdentityValidator for StaticIdentityValidator {
    async fn validate(&self, token: &IdentityToken) -> UaResult<UserIdentity> {
        match token {
            IdentityToken::Anonymous if self.allow_anonymous => Ok(UserIdentity::Anonymous),
            IdentityToken::Anonymous => Err(UaError::Status(StatusCode::BAD_IDENTITY_TOKEN_REJECTED)),
            IdentityToken::UserName { user_name, password } => match self.users.get(user_name) {
                Some(expected) if expected.as_bytes() == password.as_slice() => {
                    Ok(UserIdentity::UserName(user_name.clone()))
                }
                _ => Err(UaError::Status(StatusCode::BAD_USER_ACCESS_DENIED)),
            },
            IdentityToken::X509 { certificate } => {
                if self.certificates.contains(&certificate.thumbprint()) {
                    Ok(UserIdentity::Certificate(certificate.thumbprint()))
                } else {
                    Err(UaError::Status(StatusCode::BAD_USER_ACCESS_DENIED))
                }
            }
        }
    }
}

/// Encrypt a password for the server
///
/// The plaintext is a u32 length prefix followed by the password and the
/// server's current session nonce.
pub fn encrypt_password(
    server_certificate: &Certificate,
    policy: SecurityPolicy,
    password: &[u8],
    server_nonce: &[u8],
) -> UaResult<Vec<u8>> {
    let length = u32::try_from(password.len() + server_nonce.len())
        .map_err(|_| UaError::InvalidData("Password too long".to_string()))?;
    let mut plain = Vec::with_capacity(4 + length as usize);
    plain.extend_from_slice(&length.to_le_bytes());
    plain.extend_from_slice(password);
    plain.extend_from_slice(server_nonce);
    server_certificate.encrypt(policy, &plain)
}

/// Decrypt a password sent under `algorithm_uri` and check its nonce
///
/// # Errors
/// `BadIdentityTokenInvalid` for unknown algorithms, malformed plaintext
/// or a nonce that is not the one issued for this session
pub fn decrypt_password(
    provider: &dyn CertificateProvider,
    policy: SecurityPolicy,
    algorithm_uri: &str,
    encrypted: &[u8],
    server_nonce: &[u8],
) -> UaResult<Vec<u8>> {
    let invalid = || UaError::Status(StatusCode::BAD_IDENTITY_TOKEN_INVALID);
    if AsymmetricPadding::from_uri(algorithm_uri) != policy.asymmetric_padding() {
        return Err(invalid());
    }
    let plain = provider.decrypt(policy, encrypted).map_err(|_| invalid())?;
    if plain.len() < 4 {
        return Err(invalid());
    }
    let length = u32::from_le_bytes([plain[0], plain[1], plain[2], plain[3]]) as usize;
    let body = &plain[4..];
    if length != body.len() || length < server_nonce.len() {
        return Err(invalid());
    }
    let (password, nonce) = body.split_at(length - server_nonce.len());
    if nonce != server_nonce {
        return Err(invalid());
    }
    Ok(password.to_vec())
}
