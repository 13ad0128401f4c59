//! Nonces and thumbprints

use crate::error::{UaError, UaResult};
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};

/// SHA-1 certificate thumbprint
pub type Thumbprint = [u8; 20];

/// Fill a fresh nonce of `length` bytes from the system RNG
pub fn generate_nonce(length: usize) -> UaResult<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut nonce = vec![0u8; length];
    rng.fill(&mut nonce)
        .map_err(|_| UaError::Security("Failed to generate random nonce".to_string()))?;
    Ok(nonce)
}

/// SHA-1 digest of a DER blob
pub fn thumbprint(der: &[u8]) -> Thumbprint {
    let digest = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, der);
    let mut out = [0u8; 20];
    out.copy_from_slice(digest.as_ref());
    out
}

/// Check a peer nonce has the length the policy requires
pub fn check_nonce(nonce: &[u8], expected_length: usize) -> UaResult<()> {
    if nonce.len() != expected_length {
        return Err(UaError::Status(opcua_core::StatusCode::BAD_NONCE_INVALID));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_nonce() {
        let a = generate_nonce(32).unwrap();
        let b = generate_nonce(32).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(generate_nonce(0).unwrap().is_empty());
    }

    #[test]
    fn test_thumbprint_of_empty_input() {
        assert_eq!(
            thumbprint(b""),
            [
                0xda, 0x39, 0xa3, 0xee, 0x5e, 0x6b, 0x4b, 0x0d, 0x32, 0x55, 0xbf, 0xef, 0x95, 0x60,
                0x18, 0x90, 0xaf, 0xd8, 0x07, 0x09
            ]
        );
    }

    #[test]
    fn test_check_nonce() {
        assert!(check_nonce(&[0u8; 32], 32).is_ok());
        assert!(check_nonce(&[0u8; 16], 32).is_err());
    }
}
