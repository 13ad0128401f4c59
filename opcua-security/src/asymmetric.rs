//! RSA encryption and signatures used by OpenSecureChannel and sessions

use crate::error::{UaError, UaResult};
use crate::suite::{AsymmetricPadding, AsymmetricSignature};
use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

fn oaep(padding: AsymmetricPadding) -> Oaep {
    match padding {
        AsymmetricPadding::OaepSha1 => Oaep::new::<sha1::Sha1>(),
        AsymmetricPadding::OaepSha256 => Oaep::new::<Sha256>(),
    }
}

/// Plaintext bytes that fit in one RSA block
pub fn plain_block_size(key_size: usize, padding: AsymmetricPadding) -> usize {
    key_size.saturating_sub(padding.overhead())
}

/// Ciphertext size for `plain_len` bytes
pub fn encrypted_size(key_size: usize, padding: AsymmetricPadding, plain_len: usize) -> usize {
    let block = plain_block_size(key_size, padding).max(1);
    plain_len.div_ceil(block) * key_size
}

/// Encrypt `data` block by block with the peer's public key
pub fn encrypt(key: &RsaPublicKey, padding: AsymmetricPadding, data: &[u8]) -> UaResult<Vec<u8>> {
    let key_size = key.size();
    let block = plain_block_size(key_size, padding);
    if block == 0 {
        return Err(UaError::Security(format!("RSA key too small: {} bytes", key_size)));
    }
    let mut out = Vec::with_capacity(encrypted_size(key_size, padding, data.len()));
    let mut rng = OsRng;
    for chunk in data.chunks(block) {
        let encrypted = key
            .encrypt(&mut rng, oaep(padding), chunk)
            .map_err(|e| UaError::Security(format!("RSA encryption failed: {}", e)))?;
        out.extend_from_slice(&encrypted);
    }
    Ok(out)
}

/// Decrypt `data` block by block with our private key
pub fn decrypt(key: &RsaPrivateKey, padding: AsymmetricPadding, data: &[u8]) -> UaResult<Vec<u8>> {
    let key_size = key.size();
    if data.len() % key_size != 0 {
        return Err(UaError::Security(format!(
            "Ciphertext length {} is not a multiple of the key size {}",
            data.len(),
            key_size
        )));
    }
    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks(key_size) {
        let decrypted = key
            .decrypt(oaep(padding), chunk)
            .map_err(|e| UaError::Security(format!("RSA decryption failed: {}", e)))?;
        out.extend_from_slice(&decrypted);
    }
    Ok(out)
}

/// Sign the SHA-256 digest of `data`
pub fn sign(key: &RsaPrivateKey, signature: AsymmetricSignature, data: &[u8]) -> UaResult<Vec<u8>> {
    let hashed = Sha256::digest(data);
    let result = match signature {
        AsymmetricSignature::Pkcs1v15Sha256 => key.sign(Pkcs1v15Sign::new::<Sha256>(), &hashed),
        AsymmetricSignature::PssSha256 => {
            key.sign_with_rng(&mut OsRng, Pss::new::<Sha256>(), &hashed)
        }
    };
    result.map_err(|e| UaError::Security(format!("RSA signing failed: {}", e)))
}

/// Verify a signature over `data`
pub fn verify(
    key: &RsaPublicKey,
    signature: AsymmetricSignature,
    data: &[u8],
    signature_bytes: &[u8],
) -> UaResult<()> {
    let hashed = Sha256::digest(data);
    let result = match signature {
        AsymmetricSignature::Pkcs1v15Sha256 => {
            key.verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, signature_bytes)
        }
        AsymmetricSignature::PssSha256 => key.verify(Pss::new::<Sha256>(), &hashed, signature_bytes),
    };
    result.map_err(|_| UaError::Security("Asymmetric signature invalid".to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    pub(crate) static TEST_KEY: Lazy<RsaPrivateKey> =
        Lazy::new(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap());

    #[test]
    fn test_multi_block_round_trip() {
        let public = TEST_KEY.to_public_key();
        let data: Vec<u8> = (0..300u16).map(|i| i as u8).collect();
        for padding in [AsymmetricPadding::OaepSha1, AsymmetricPadding::OaepSha256] {
            let encrypted = encrypt(&public, padding, &data).unwrap();
            assert_eq!(encrypted.len(), encrypted_size(256, padding, data.len()));
            assert_eq!(decrypt(&TEST_KEY, padding, &encrypted).unwrap(), data);
        }
    }

    #[test]
    fn test_block_sizes() {
        assert_eq!(plain_block_size(256, AsymmetricPadding::OaepSha1), 214);
        assert_eq!(plain_block_size(256, AsymmetricPadding::OaepSha256), 190);
        assert_eq!(encrypted_size(256, AsymmetricPadding::OaepSha1, 215), 512);
    }

    #[test]
    fn test_sign_verify_both_schemes() {
        let public = TEST_KEY.to_public_key();
        for scheme in [AsymmetricSignature::Pkcs1v15Sha256, AsymmetricSignature::PssSha256] {
            let signature = sign(&TEST_KEY, scheme, b"header and body").unwrap();
            assert_eq!(signature.len(), 256);
            verify(&public, scheme, b"header and body", &signature).unwrap();
            assert!(verify(&public, scheme, b"header and bodY", &signature).is_err());
        }
    }
}
