//! HMAC-SHA256 signatures and AES-CBC encryption with derived channel keys

use crate::error::{UaError, UaResult};
use crate::kdf::DerivedKeys;
use crate::suite::SecurityPolicy;
use aes::{Aes128, Aes256};
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const AES_BLOCK: usize = 16;

#[derive(Clone)]
enum AesCipher {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl AesCipher {
    fn new(key: &[u8]) -> UaResult<Self> {
        match key.len() {
            16 => Ok(AesCipher::Aes128(Aes128::new(GenericArray::from_slice(key)))),
            32 => Ok(AesCipher::Aes256(Aes256::new(GenericArray::from_slice(key)))),
            n => Err(UaError::Security(format!("Invalid AES key length: {}", n))),
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesCipher::Aes128(cipher) => cipher.encrypt_block(block),
            AesCipher::Aes256(cipher) => cipher.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesCipher::Aes128(cipher) => cipher.decrypt_block(block),
            AesCipher::Aes256(cipher) => cipher.decrypt_block(block),
        }
    }
}

/// Keys of one channel direction, ready for use
///
/// Padding is the caller's job; `encrypt`/`decrypt` require whole blocks.
#[derive(Clone)]
pub struct SymmetricKeys {
    policy: SecurityPolicy,
    signing_key: Vec<u8>,
    cipher: Option<AesCipher>,
    iv: Vec<u8>,
}

impl std::fmt::Debug for SymmetricKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKeys").field("policy", &self.policy).finish()
    }
}

impl SymmetricKeys {
    pub fn new(policy: SecurityPolicy, keys: &DerivedKeys) -> UaResult<Self> {
        let cipher = if policy.is_none() {
            None
        } else {
            if keys.iv.len() != AES_BLOCK {
                return Err(UaError::Security(format!("Invalid IV length: {}", keys.iv.len())));
            }
            Some(AesCipher::new(&keys.encrypting_key)?)
        };
        Ok(Self {
            policy,
            signing_key: keys.signing_key.clone(),
            cipher,
            iv: keys.iv.clone(),
        })
    }

    pub fn policy(&self) -> SecurityPolicy {
        self.policy
    }

    fn mac(&self) -> UaResult<HmacSha256> {
        <HmacSha256 as Mac>::new_from_slice(&self.signing_key)
            .map_err(|e| UaError::Security(format!("Failed to create HMAC: {}", e)))
    }

    /// HMAC-SHA256 over `data`
    pub fn sign(&self, data: &[u8]) -> UaResult<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Constant-time signature check
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> UaResult<()> {
        let mut mac = self.mac()?;
        mac.update(data);
        mac.verify_slice(signature)
            .map_err(|_| UaError::Security("Symmetric signature invalid".to_string()))
    }

    fn cipher(&self) -> UaResult<&AesCipher> {
        self.cipher
            .as_ref()
            .ok_or_else(|| UaError::Security("Policy None has no cipher".to_string()))
    }

    fn check_blocks(data: &[u8]) -> UaResult<()> {
        if data.len() % AES_BLOCK != 0 {
            return Err(UaError::Security(format!(
                "Data length {} is not a multiple of the block size",
                data.len()
            )));
        }
        Ok(())
    }

    /// AES-CBC encrypt in place
    pub fn encrypt(&self, data: &mut [u8]) -> UaResult<()> {
        Self::check_blocks(data)?;
        let cipher = self.cipher()?;
        let mut previous = [0u8; AES_BLOCK];
        previous.copy_from_slice(&self.iv);
        for block in data.chunks_exact_mut(AES_BLOCK) {
            for (byte, prev) in block.iter_mut().zip(previous.iter()) {
                *byte ^= prev;
            }
            cipher.encrypt_block(block);
            previous.copy_from_slice(block);
        }
        Ok(())
    }

    /// AES-CBC decrypt in place
    pub fn decrypt(&self, data: &mut [u8]) -> UaResult<()> {
        Self::check_blocks(data)?;
        let cipher = self.cipher()?;
        let mut previous = [0u8; AES_BLOCK];
        previous.copy_from_slice(&self.iv);
        for block in data.chunks_exact_mut(AES_BLOCK) {
            let mut saved = [0u8; AES_BLOCK];
            saved.copy_from_slice(block);
            cipher.decrypt_block(block);
            for (byte, prev) in block.iter_mut().zip(previous.iter()) {
                *byte ^= prev;
            }
            previous = saved;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_keys;

    fn keys(policy: SecurityPolicy) -> SymmetricKeys {
        let derived = derive_keys(policy, &[7u8; 32], &[9u8; 32]).unwrap();
        SymmetricKeys::new(policy, &derived).unwrap()
    }

    #[test]
    fn test_cbc_round_trip() {
        for policy in [SecurityPolicy::Basic256Sha256, SecurityPolicy::Aes128Sha256RsaOaep] {
            let keys = keys(policy);
            let plain: Vec<u8> = (0..64u8).collect();
            let mut data = plain.clone();
            keys.encrypt(&mut data).unwrap();
            assert_ne!(data, plain);
            // Identical plaintext blocks must not produce identical ciphertext.
            let mut repeated = vec![0u8; 32];
            keys.encrypt(&mut repeated).unwrap();
            assert_ne!(&repeated[..16], &repeated[16..]);
            keys.decrypt(&mut data).unwrap();
            assert_eq!(data, plain);
        }
    }

    #[test]
    fn test_partial_block_rejected() {
        let keys = keys(SecurityPolicy::Basic256Sha256);
        assert!(keys.encrypt(&mut [0u8; 17]).is_err());
    }

    #[test]
    fn test_sign_verify() {
        let keys = keys(SecurityPolicy::Aes256Sha256RsaPss);
        let signature = keys.sign(b"chunk").unwrap();
        assert_eq!(signature.len(), 32);
        keys.verify(b"chunk", &signature).unwrap();
        assert!(keys.verify(b"chunK", &signature).is_err());
    }
}
