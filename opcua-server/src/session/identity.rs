//! Decoding and proving the identity token of an ActivateSession request

use crate::error::{UaError, UaResult};
use opcua_codec::{DecodingLimits, ExtensionObjectExt};
use opcua_core::{ExtensionObject, StatusCode};
use opcua_security::identity::decrypt_password;
use opcua_security::{Certificate, CertificateProvider, IdentityToken, SecurityPolicy};
use opcua_services::{AnonymousIdentityToken, SignatureData, UserNameIdentityToken, X509IdentityToken};

fn invalid() -> UaError {
    UaError::Status(StatusCode::BAD_IDENTITY_TOKEN_INVALID)
}

/// Inputs that tie a token to one activation
pub(crate) struct TokenProof<'a> {
    pub policy: SecurityPolicy,
    pub provider: Option<&'a dyn CertificateProvider>,
    /// Nonce the server issued with the previous Create/ActivateSession
    pub server_nonce: &'a [u8],
    pub user_token_signature: &'a SignatureData,
}

/// Turn the wire token into a validated `IdentityToken`
///
/// Encrypted passwords are decrypted and checked against the server
/// nonce; X.509 tokens must carry a signature over the server
/// certificate and nonce made with the user's key.
///
/// # Errors
/// `BadIdentityTokenInvalid` for malformed or unprovable tokens,
/// `BadIdentityTokenRejected` for X.509 tokens on an unsecured channel
pub(crate) fn decode_identity_token(
    object: &ExtensionObject,
    proof: &TokenProof<'_>,
    limits: &DecodingLimits,
) -> UaResult<IdentityToken> {
    if object.is_null() {
        return Ok(IdentityToken::Anonymous);
    }
    match object.type_id.as_ns0_numeric() {
        Some(AnonymousIdentityToken::TYPE_ID) => {
            let _: AnonymousIdentityToken = object.decode_inner(limits).map_err(|_| invalid())?;
            Ok(IdentityToken::Anonymous)
        }
        Some(UserNameIdentityToken::TYPE_ID) => {
            let token: UserNameIdentityToken = object.decode_inner(limits).map_err(|_| invalid())?;
            let user_name = token.user_name.value().ok_or_else(invalid)?.to_string();
            let password = match token.encryption_algorithm.value().filter(|uri| !uri.is_empty()) {
                None => token.password.as_bytes().to_vec(),
                Some(algorithm) => {
                    let provider = proof.provider.filter(|_| !proof.policy.is_none()).ok_or_else(invalid)?;
                    decrypt_password(
                        provider,
                        proof.policy,
                        algorithm,
                        token.password.as_bytes(),
                        proof.server_nonce,
                    )?
                }
            };
            Ok(IdentityToken::UserName { user_name, password })
        }
        Some(X509IdentityToken::TYPE_ID) => {
            let token: X509IdentityToken = object.decode_inner(limits).map_err(|_| invalid())?;
            let certificate = Certificate::from_der(token.certificate_data.as_bytes()).map_err(|_| invalid())?;
            let provider = match proof.provider {
                Some(provider) if !proof.policy.is_none() => provider,
                _ => return Err(UaError::Status(StatusCode::BAD_IDENTITY_TOKEN_REJECTED)),
            };
            let mut signed = provider.certificate().der().to_vec();
            signed.extend_from_slice(proof.server_nonce);
            certificate
                .verify(proof.policy, &signed, proof.user_token_signature.signature.as_bytes())
                .map_err(|_| invalid())?;
            Ok(IdentityToken::X509 { certificate })
        }
        _ => Err(invalid()),
    }
}
