//! Security layer for OPC UA
//!
//! This crate provides the security policies and message security modes,
//! P_SHA256 key derivation, symmetric (AES-CBC, HMAC-SHA256) and
//! asymmetric (RSA) primitives, the certificate provider and the user
//! identity validation used by sessions.

pub mod asymmetric;
pub mod certificate;
pub mod error;
pub mod identity;
pub mod kdf;
pub mod suite;
pub mod symmetric;
pub mod utils;

pub use certificate::{Certificate, CertificateProvider, RsaCertificateProvider};
pub use error::{UaError, UaResult};
pub use identity::{IdentityToken, IdentityValidator, StaticIdentityValidator, UserIdentity};
pub use kdf::{DerivedKeys, derive_keys, p_sha256};
pub use suite::{
    AsymmetricPadding, AsymmetricSignature, MessageSecurityMode, SecurityPolicy, SecuritySuite,
    SecuritySuiteBuilder,
};
pub use symmetric::SymmetricKeys;
pub use utils::{Thumbprint, generate_nonce, thumbprint};
