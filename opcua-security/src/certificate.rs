//! Application certificates and the certificate provider collaborator
//!
//! A certificate here is the DER encoded SubjectPublicKeyInfo of an RSA
//! key. It travels in OpenSecureChannel headers and CreateSession
//! messages, is identified by its SHA-1 thumbprint, and trust is decided
//! by thumbprint.

use crate::asymmetric;
use crate::error::{UaError, UaResult};
use crate::suite::SecurityPolicy;
use crate::utils::{Thumbprint, thumbprint};
use opcua_core::StatusCode;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::HashSet;
use std::fmt;

/// A peer or own certificate
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    public_key: RsaPublicKey,
    thumbprint: Thumbprint,
}

impl Certificate {
    /// Parse a DER blob
    ///
    /// # Errors
    /// `BadCertificateInvalid` when the blob is not an RSA public key
    pub fn from_der(der: &[u8]) -> UaResult<Self> {
        let public_key = RsaPublicKey::from_public_key_der(der)
            .map_err(|_| UaError::Status(StatusCode::BAD_CERTIFICATE_INVALID))?;
        Ok(Self {
            der: der.to_vec(),
            public_key,
            thumbprint: thumbprint(der),
        })
    }

    pub fn from_public_key(public_key: &RsaPublicKey) -> UaResult<Self> {
        let document = public_key
            .to_public_key_der()
            .map_err(|e| UaError::Security(format!("Failed to encode public key: {}", e)))?;
        Self::from_der(document.as_bytes())
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn thumbprint(&self) -> Thumbprint {
        self.thumbprint
    }

    /// Modulus size in bytes
    pub fn key_size(&self) -> usize {
        self.public_key.size()
    }

    /// Encrypt for the holder of this certificate
    pub fn encrypt(&self, policy: SecurityPolicy, data: &[u8]) -> UaResult<Vec<u8>> {
        let padding = policy
            .asymmetric_padding()
            .ok_or_else(|| UaError::Security("Policy None cannot encrypt".to_string()))?;
        asymmetric::encrypt(&self.public_key, padding, data)
    }

    /// Verify a signature made by the holder of this certificate
    pub fn verify(&self, policy: SecurityPolicy, data: &[u8], signature: &[u8]) -> UaResult<()> {
        let scheme = policy
            .asymmetric_signature()
            .ok_or_else(|| UaError::Security("Policy None cannot verify".to_string()))?;
        asymmetric::verify(&self.public_key, scheme, data, signature)
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex: String = self.thumbprint.iter().map(|b| format!("{:02x}", b)).collect();
        write!(f, "Certificate({})", hex)
    }
}

/// Own key material and the trust decision for peer certificates
pub trait CertificateProvider: Send + Sync {
    /// Our certificate, sent to peers
    fn certificate(&self) -> &Certificate;

    /// Decide whether a peer certificate is trusted
    ///
    /// # Errors
    /// `BadCertificateUntrusted` when it is not
    fn validate(&self, certificate: &Certificate) -> UaResult<()>;

    /// Sign with our private key
    fn sign(&self, policy: SecurityPolicy, data: &[u8]) -> UaResult<Vec<u8>>;

    /// Decrypt data encrypted for our certificate
    fn decrypt(&self, policy: SecurityPolicy, data: &[u8]) -> UaResult<Vec<u8>>;

    /// Our key size in bytes
    fn key_size(&self) -> usize {
        self.certificate().key_size()
    }
}

/// In-memory RSA key pair with a thumbprint trust list
pub struct RsaCertificateProvider {
    private_key: RsaPrivateKey,
    certificate: Certificate,
    trusted: HashSet<Thumbprint>,
    trust_all: bool,
}

impl RsaCertificateProvider {
    pub fn new(private_key: RsaPrivateKey) -> UaResult<Self> {
        let certificate = Certificate::from_public_key(&private_key.to_public_key())?;
        Ok(Self {
            private_key,
            certificate,
            trusted: HashSet::new(),
            trust_all: false,
        })
    }

    /// Create a provider around a fresh key of `bits` size
    pub fn generate(bits: usize) -> UaResult<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| UaError::Security(format!("RSA key generation failed: {}", e)))?;
        Self::new(private_key)
    }

    /// Add a peer certificate to the trust list
    pub fn trust(mut self, certificate: &Certificate) -> Self {
        self.trusted.insert(certificate.thumbprint());
        self
    }

    /// Accept any well-formed peer certificate
    pub fn trust_all(mut self) -> Self {
        self.trust_all = true;
        self
    }
}

impl fmt::Debug for RsaCertificateProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaCertificateProvider")
            .field("certificate", &self.certificate)
            .field("trusted", &self.trusted.len())
            .field("trust_all", &self.trust_all)
            .finish()
    }
}

impl CertificateProvider for RsaCertificateProvider {
    fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    fn validate(&self, certificate: &Certificate) -> UaResult<()> {
        if self.trust_all || self.trusted.contains(&certificate.thumbprint()) {
            Ok(())
        } else {
            Err(UaError::Status(StatusCode::BAD_CERTIFICATE_UNTRUSTED))
        }
    }

    fn sign(&self, policy: SecurityPolicy, data: &[u8]) -> UaResult<Vec<u8>> {
        let scheme = policy
            .asymmetric_signature()
            .ok_or_else(|| UaError::Security("Policy None cannot sign".to_string()))?;
        asymmetric::sign(&self.private_key, scheme, data)
    }

    fn decrypt(&self, policy: SecurityPolicy, data: &[u8]) -> UaResult<Vec<u8>> {
        let padding = policy
            .asymmetric_padding()
            .ok_or_else(|| UaError::Security("Policy None cannot decrypt".to_string()))?;
        asymmetric::decrypt(&self.private_key, padding, data)
    }
}
