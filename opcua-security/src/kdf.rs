//! P_SHA256 key derivation for symmetric channel keys

use crate::error::{UaError, UaResult};
use crate::suite::SecurityPolicy;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The TLS-style P_SHA256 pseudo random function
///
/// `A(0) = seed`, `A(i) = HMAC(secret, A(i-1))`, output is the
/// concatenation of `HMAC(secret, A(i) || seed)` cut to `length` bytes.
pub fn p_sha256(secret: &[u8], seed: &[u8], length: usize) -> UaResult<Vec<u8>> {
    let new_mac = || {
        HmacSha256::new_from_slice(secret)
            .map_err(|e| UaError::Security(format!("Failed to create HMAC: {}", e)))
    };

    let mut output = Vec::with_capacity(length + 32);
    let mut a = seed.to_vec();
    while output.len() < length {
        let mut mac = new_mac()?;
        mac.update(&a);
        a = mac.finalize().into_bytes().to_vec();

        let mut mac = new_mac()?;
        mac.update(&a);
        mac.update(seed);
        output.extend_from_slice(&mac.finalize().into_bytes());
    }
    output.truncate(length);
    Ok(output)
}

/// Signing key, encrypting key and IV for one direction of a channel
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKeys {
    pub signing_key: Vec<u8>,
    pub encrypting_key: Vec<u8>,
    pub iv: Vec<u8>,
}

impl std::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeys")
            .field("signing_key_len", &self.signing_key.len())
            .field("encrypting_key_len", &self.encrypting_key.len())
            .finish()
    }
}

/// Derive one direction's keys
///
/// Keys protecting what the client sends use `secret = server nonce`,
/// `seed = client nonce`; the server's keys swap the two. The output is
/// split in order: signing key, encrypting key, IV.
pub fn derive_keys(policy: SecurityPolicy, secret: &[u8], seed: &[u8]) -> UaResult<DerivedKeys> {
    let signing_len = policy.signing_key_length();
    let encrypting_len = policy.encrypting_key_length();
    let iv_len = policy.symmetric_block_size();
    if policy.is_none() {
        return Ok(DerivedKeys {
            signing_key: Vec::new(),
            encrypting_key: Vec::new(),
            iv: Vec::new(),
        });
    }

    let material = p_sha256(secret, seed, signing_len + encrypting_len + iv_len)?;
    Ok(DerivedKeys {
        signing_key: material[..signing_len].to_vec(),
        encrypting_key: material[signing_len..signing_len + encrypting_len].to_vec(),
        iv: material[signing_len + encrypting_len..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_p_sha256_prefix_stable() {
        // Longer outputs extend shorter ones.
        let short = p_sha256(b"secret", b"seed", 20).unwrap();
        let long = p_sha256(b"secret", b"seed", 100).unwrap();
        assert_eq!(short.len(), 20);
        assert_eq!(long.len(), 100);
        assert_eq!(&long[..20], &short[..]);
    }

    #[test]
    fn test_p_sha256_first_block_is_nested_hmac() {
        let mut mac = HmacSha256::new_from_slice(b"k").unwrap();
        mac.update(b"s");
        let a1 = mac.finalize().into_bytes();
        let mut mac = HmacSha256::new_from_slice(b"k").unwrap();
        mac.update(&a1);
        mac.update(b"s");
        let expected = mac.finalize().into_bytes();
        assert_eq!(p_sha256(b"k", b"s", 32).unwrap(), expected.to_vec());
    }

    #[test]
    fn test_derive_keys_lengths_and_direction() {
        let client_nonce = [1u8; 32];
        let server_nonce = [2u8; 32];
        let client = derive_keys(SecurityPolicy::Aes128Sha256RsaOaep, &server_nonce, &client_nonce).unwrap();
        let server = derive_keys(SecurityPolicy::Aes128Sha256RsaOaep, &client_nonce, &server_nonce).unwrap();
        assert_eq!(client.signing_key.len(), 32);
        assert_eq!(client.encrypting_key.len(), 16);
        assert_eq!(client.iv.len(), 16);
        assert_ne!(client, server);
    }
}
