//! Security policies, message security modes and the channel security suite

use crate::error::{UaError, UaResult};
use opcua_core::StatusCode;
use std::fmt;

/// Asymmetric encryption padding scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsymmetricPadding {
    OaepSha1,
    OaepSha256,
}

impl AsymmetricPadding {
    /// Bytes of overhead per RSA block
    pub fn overhead(&self) -> usize {
        match self {
            AsymmetricPadding::OaepSha1 => 42,
            AsymmetricPadding::OaepSha256 => 66,
        }
    }

    /// Algorithm URI used in encrypted identity tokens
    pub fn uri(&self) -> &'static str {
        match self {
            AsymmetricPadding::OaepSha1 => "http://www.w3.org/2001/04/xmlenc#rsa-oaep",
            AsymmetricPadding::OaepSha256 => "http://opcfoundation.org/UA/security/rsa-oaep-sha2-256",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        [AsymmetricPadding::OaepSha1, AsymmetricPadding::OaepSha256]
            .into_iter()
            .find(|padding| padding.uri() == uri)
    }
}

/// Asymmetric signature scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsymmetricSignature {
    Pkcs1v15Sha256,
    PssSha256,
}

impl AsymmetricSignature {
    pub fn uri(&self) -> &'static str {
        match self {
            AsymmetricSignature::Pkcs1v15Sha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            AsymmetricSignature::PssSha256 => "http://opcfoundation.org/UA/security/rsa-pss-sha2-256",
        }
    }
}

/// Security policy
///
/// Each policy fixes the algorithms for the lifetime of a channel:
/// HMAC-SHA256 symmetric signatures, P_SHA256 key derivation, AES-CBC
/// symmetric encryption and an RSA padding/signature pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityPolicy {
    /// No signing, no encryption
    None,
    Basic256Sha256,
    Aes128Sha256RsaOaep,
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    pub const ALL: [SecurityPolicy; 4] = [
        SecurityPolicy::None,
        SecurityPolicy::Basic256Sha256,
        SecurityPolicy::Aes128Sha256RsaOaep,
        SecurityPolicy::Aes256Sha256RsaPss,
    ];

    pub fn uri(&self) -> &'static str {
        match self {
            SecurityPolicy::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            SecurityPolicy::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            SecurityPolicy::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// Look up a policy by URI
    ///
    /// # Errors
    /// `BadSecurityPolicyRejected` for unknown URIs
    pub fn from_uri(uri: &str) -> UaResult<Self> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.uri() == uri)
            .ok_or(UaError::Status(StatusCode::BAD_SECURITY_POLICY_REJECTED))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SecurityPolicy::None)
    }

    /// Length of the derived symmetric signing key
    pub fn signing_key_length(&self) -> usize {
        if self.is_none() { 0 } else { 32 }
    }

    /// Length of the derived AES key
    pub fn encrypting_key_length(&self) -> usize {
        match self {
            SecurityPolicy::None => 0,
            SecurityPolicy::Aes128Sha256RsaOaep => 16,
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes256Sha256RsaPss => 32,
        }
    }

    /// Cipher block size, also the IV length
    pub fn symmetric_block_size(&self) -> usize {
        if self.is_none() { 1 } else { 16 }
    }

    /// HMAC-SHA256 output size
    pub fn symmetric_signature_size(&self) -> usize {
        if self.is_none() { 0 } else { 32 }
    }

    /// Length of channel and session nonces
    pub fn nonce_length(&self) -> usize {
        if self.is_none() { 0 } else { 32 }
    }

    /// Smallest and largest RSA modulus the policy allows, in bits
    pub fn asymmetric_key_bits(&self) -> Option<(usize, usize)> {
        if self.is_none() { None } else { Some((2048, 4096)) }
    }

    /// Check a key size in bytes against the policy's RSA range
    ///
    /// # Errors
    /// `BadCertificatePolicyCheckFailed` for keys outside the range
    pub fn check_key_size(&self, key_size: usize) -> UaResult<()> {
        match self.asymmetric_key_bits() {
            Some((min, max)) if !(min..=max).contains(&(key_size * 8)) => {
                Err(UaError::Status(StatusCode::BAD_CERTIFICATE_POLICY_CHECK_FAILED))
            }
            _ => Ok(()),
        }
    }

    pub fn asymmetric_padding(&self) -> Option<AsymmetricPadding> {
        match self {
            SecurityPolicy::None => None,
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                Some(AsymmetricPadding::OaepSha1)
            }
            SecurityPolicy::Aes256Sha256RsaPss => Some(AsymmetricPadding::OaepSha256),
        }
    }

    pub fn asymmetric_signature(&self) -> Option<AsymmetricSignature> {
        match self {
            SecurityPolicy::None => None,
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                Some(AsymmetricSignature::Pkcs1v15Sha256)
            }
            SecurityPolicy::Aes256Sha256RsaPss => Some(AsymmetricSignature::PssSha256),
        }
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityPolicy::None => "None",
            SecurityPolicy::Basic256Sha256 => "Basic256Sha256",
            SecurityPolicy::Aes128Sha256RsaOaep => "Aes128_Sha256_RsaOaep",
            SecurityPolicy::Aes256Sha256RsaPss => "Aes256_Sha256_RsaPss",
        };
        f.write_str(name)
    }
}

/// Message security mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageSecurityMode {
    Invalid = 0,
    None = 1,
    Sign = 2,
    SignAndEncrypt = 3,
}

impl MessageSecurityMode {
    pub fn id(&self) -> u32 {
        *self as u32
    }

    pub fn from_id(id: u32) -> UaResult<Self> {
        match id {
            0 => Ok(MessageSecurityMode::Invalid),
            1 => Ok(MessageSecurityMode::None),
            2 => Ok(MessageSecurityMode::Sign),
            3 => Ok(MessageSecurityMode::SignAndEncrypt),
            _ => Err(UaError::Security(format!("Invalid message security mode: {}", id))),
        }
    }

    /// Name used in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            MessageSecurityMode::Invalid => "Invalid",
            MessageSecurityMode::None => "None",
            MessageSecurityMode::Sign => "Sign",
            MessageSecurityMode::SignAndEncrypt => "SignAndEncrypt",
        }
    }

    /// Parse a configured mode name
    ///
    /// # Errors
    /// Anything but `None`, `Sign` or `SignAndEncrypt`
    pub fn from_name(name: &str) -> UaResult<Self> {
        match name {
            "None" => Ok(MessageSecurityMode::None),
            "Sign" => Ok(MessageSecurityMode::Sign),
            "SignAndEncrypt" => Ok(MessageSecurityMode::SignAndEncrypt),
            other => Err(UaError::InvalidData(format!("Unknown security mode '{}'", other))),
        }
    }

    /// Whether symmetric messages carry a signature
    pub fn is_signed(&self) -> bool {
        matches!(self, MessageSecurityMode::Sign | MessageSecurityMode::SignAndEncrypt)
    }

    /// Whether symmetric messages are encrypted
    pub fn is_encrypted(&self) -> bool {
        matches!(self, MessageSecurityMode::SignAndEncrypt)
    }
}

/// Security suite builder
pub struct SecuritySuiteBuilder {
    policy: SecurityPolicy,
    mode: MessageSecurityMode,
}

impl SecuritySuiteBuilder {
    /// Start from policy None, mode None
    pub fn new() -> Self {
        Self {
            policy: SecurityPolicy::None,
            mode: MessageSecurityMode::None,
        }
    }

    pub fn set_security_policy(mut self, policy: SecurityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_security_mode(mut self, mode: MessageSecurityMode) -> Self {
        self.mode = mode;
        self
    }

    /// Build the suite
    ///
    /// # Errors
    /// Policy None is only valid with mode None and vice versa; mode
    /// Invalid is never accepted.
    pub fn build(self) -> UaResult<SecuritySuite> {
        match (self.policy.is_none(), self.mode) {
            (_, MessageSecurityMode::Invalid) => {
                Err(UaError::Status(StatusCode::BAD_SECURITY_MODE_REJECTED))
            }
            (true, MessageSecurityMode::None) => Ok(SecuritySuite::none()),
            (true, _) | (false, MessageSecurityMode::None) => Err(UaError::Security(format!(
                "Security policy {} cannot be combined with mode {:?}",
                self.policy, self.mode
            ))),
            (false, mode) => Ok(SecuritySuite {
                policy: self.policy,
                mode,
            }),
        }
    }
}

impl Default for SecuritySuiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Validated policy and mode pair of a secure channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecuritySuite {
    policy: SecurityPolicy,
    mode: MessageSecurityMode,
}

impl SecuritySuite {
    pub fn builder() -> SecuritySuiteBuilder {
        SecuritySuiteBuilder::new()
    }

    pub const fn none() -> Self {
        Self {
            policy: SecurityPolicy::None,
            mode: MessageSecurityMode::None,
        }
    }

    pub fn policy(&self) -> SecurityPolicy {
        self.policy
    }

    pub fn mode(&self) -> MessageSecurityMode {
        self.mode
    }

    /// OPN messages are signed and encrypted unless the mode is None
    pub fn secures_asymmetric(&self) -> bool {
        self.mode != MessageSecurityMode::None
    }
}

impl Default for SecuritySuite {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for SecuritySuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecuritySuite(policy={}, mode={:?})", self.policy, self.mode)
    }
}
