//! Splitting messages into secured chunks and opening received chunks
//!
//! Chunk layout: message header, secure channel id, security header,
//! sequence header, body, padding, signature. The signature covers
//! everything before it; encryption covers the sequence header through the
//! signature.

use crate::error::{UaError, UaResult};
use crate::header::{SEQUENCE_HEADER_SIZE, SecurityHeader, SequenceHeader};
use crate::sequence::SequenceCounter;
use opcua_codec::{BinaryDecoder, BinaryEncodable, BinaryEncoder, DecodingLimits};
use opcua_core::{StatusCode, UaString};
use opcua_security::asymmetric::plain_block_size;
use opcua_security::{
    Certificate, CertificateProvider, MessageSecurityMode, SecurityPolicy, SymmetricKeys,
};
use opcua_transport::{ChunkType, MESSAGE_HEADER_SIZE, MessageHeader, MessageType};

/// RSA keys above this many bytes need a second padding size byte
const EXTRA_PADDING_KEY_SIZE: usize = 256;

/// Protection applied to chunks in one direction
pub enum ChunkSecurity<'a> {
    /// Neither signed nor encrypted
    None,
    /// OpenSecureChannel chunks under a policy other than None
    ///
    /// Sealing signs with `local` and encrypts for `remote`; opening
    /// decrypts with `local` and verifies with `remote`.
    Asymmetric {
        policy: SecurityPolicy,
        local: &'a dyn CertificateProvider,
        remote: &'a Certificate,
    },
    /// Symmetric chunks under the token's keys for this direction
    Symmetric {
        mode: MessageSecurityMode,
        keys: &'a SymmetricKeys,
    },
}

/// Sizes derived from a `ChunkSecurity` for one direction
#[derive(Debug, Clone, Copy)]
struct Layout {
    signs: bool,
    encrypts: bool,
    signature_size: usize,
    plain_block: usize,
    cipher_block: usize,
    extra_padding: bool,
}

impl Layout {
    fn padding_overhead(&self) -> usize {
        if self.extra_padding { 2 } else { 1 }
    }
}

impl ChunkSecurity<'_> {
    /// Layout for sealing (`sending == true`) or opening
    fn layout(&self, sending: bool) -> UaResult<Layout> {
        Ok(match self {
            ChunkSecurity::None => Layout {
                signs: false,
                encrypts: false,
                signature_size: 0,
                plain_block: 1,
                cipher_block: 1,
                extra_padding: false,
            },
            ChunkSecurity::Asymmetric { policy, local, remote } => {
                let padding = policy
                    .asymmetric_padding()
                    .ok_or_else(|| UaError::Security("Policy None is not asymmetric".to_string()))?;
                // The signer's key sizes the signature, the recipient's key the cipher blocks.
                let (signer, recipient) = if sending {
                    (local.key_size(), remote.key_size())
                } else {
                    (remote.key_size(), local.key_size())
                };
                Layout {
                    signs: true,
                    encrypts: true,
                    signature_size: signer,
                    plain_block: plain_block_size(recipient, padding),
                    cipher_block: recipient,
                    extra_padding: recipient > EXTRA_PADDING_KEY_SIZE,
                }
            }
            ChunkSecurity::Symmetric { mode, keys } => {
                let policy = keys.policy();
                Layout {
                    signs: mode.is_signed(),
                    encrypts: mode.is_encrypted(),
                    signature_size: if mode.is_signed() { policy.symmetric_signature_size() } else { 0 },
                    plain_block: policy.symmetric_block_size(),
                    cipher_block: policy.symmetric_block_size(),
                    extra_padding: false,
                }
            }
        })
    }

    fn sign(&self, data: &[u8]) -> UaResult<Vec<u8>> {
        match self {
            ChunkSecurity::None => Ok(Vec::new()),
            ChunkSecurity::Asymmetric { policy, local, .. } => local.sign(*policy, data),
            ChunkSecurity::Symmetric { keys, .. } => keys.sign(data),
        }
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> UaResult<()> {
        match self {
            ChunkSecurity::None => Ok(()),
            ChunkSecurity::Asymmetric { policy, remote, .. } => remote.verify(*policy, data, signature),
            ChunkSecurity::Symmetric { keys, .. } => keys.verify(data, signature),
        }
    }

    /// Encrypt `data[offset..]`
    fn encrypt(&self, data: &mut Vec<u8>, offset: usize) -> UaResult<()> {
        match self {
            ChunkSecurity::None => Ok(()),
            ChunkSecurity::Asymmetric { policy, remote, .. } => {
                let encrypted = remote.encrypt(*policy, &data[offset..])?;
                data.truncate(offset);
                data.extend_from_slice(&encrypted);
                Ok(())
            }
            ChunkSecurity::Symmetric { keys, .. } => keys.encrypt(&mut data[offset..]),
        }
    }

    /// Decrypt `data[offset..]`
    fn decrypt(&self, data: &mut Vec<u8>, offset: usize) -> UaResult<()> {
        match self {
            ChunkSecurity::None => Ok(()),
            ChunkSecurity::Asymmetric { policy, local, .. } => {
                let decrypted = local.decrypt(*policy, &data[offset..])?;
                data.truncate(offset);
                data.extend_from_slice(&decrypted);
                Ok(())
            }
            ChunkSecurity::Symmetric { keys, .. } => keys.decrypt(&mut data[offset..]),
        }
    }
}

fn security_checks_failed() -> UaError {
    UaError::Status(StatusCode::BAD_SECURITY_CHECKS_FAILED)
}

/// Everything before the sequence header
fn header_length(security_header: &SecurityHeader) -> UaResult<usize> {
    let mut encoder = BinaryEncoder::new();
    security_header.encode(&mut encoder)?;
    Ok(MESSAGE_HEADER_SIZE + 4 + encoder.len())
}

/// Largest body that fits one chunk of `chunk_size` bytes
fn max_body_size(chunk_size: usize, header_len: usize, layout: &Layout) -> UaResult<usize> {
    let available = chunk_size.saturating_sub(header_len);
    let max_body = if layout.encrypts {
        (available / layout.cipher_block * layout.plain_block).checked_sub(
            SEQUENCE_HEADER_SIZE + layout.signature_size + layout.padding_overhead(),
        )
    } else {
        available.checked_sub(SEQUENCE_HEADER_SIZE + layout.signature_size)
    };
    match max_body {
        Some(size) if size > 0 => Ok(size),
        _ => Err(UaError::Status(StatusCode::BAD_TCP_NOT_ENOUGH_RESOURCES)),
    }
}

/// Padding size bringing `plain_len` bytes to a block multiple
fn padding_size(plain_len: usize, plain_block: usize) -> usize {
    (plain_block - plain_len % plain_block) % plain_block
}

/// Append padding: the size byte, `size` copies of it, then the high byte
/// of the size when `extra` is set
fn write_padding(encoder: &mut BinaryEncoder, size: usize, extra: bool) -> UaResult<()> {
    let low = (size & 0xFF) as u8;
    for _ in 0..=size {
        encoder.encode_u8(low)?;
    }
    if extra {
        encoder.encode_u8((size >> 8) as u8)?;
    }
    Ok(())
}

/// Validate and measure padding at the end of `data`
///
/// # Returns
/// Number of bytes to strip
fn padding_length(data: &[u8], extra: bool) -> UaResult<usize> {
    let len = data.len();
    let (size, overhead) = if extra {
        if len < 2 {
            return Err(security_checks_failed());
        }
        (((data[len - 1] as usize) << 8) | data[len - 2] as usize, 2)
    } else {
        let last = *data.last().ok_or_else(security_checks_failed)?;
        (last as usize, 1)
    };
    let total = size + overhead;
    if total > len {
        return Err(security_checks_failed());
    }
    let low = (size & 0xFF) as u8;
    let padding_end = len - (overhead - 1);
    if data[len - total..padding_end].iter().any(|byte| *byte != low) {
        return Err(security_checks_failed());
    }
    Ok(total)
}

/// Parameters shared by every chunk of one message
pub struct ChunkParams<'a> {
    pub message_type: MessageType,
    pub secure_channel_id: u32,
    pub request_id: u32,
    pub security_header: &'a SecurityHeader,
    /// Negotiated send buffer size
    pub max_chunk_size: usize,
    /// 0 for no limit
    pub max_chunk_count: usize,
    /// 0 for no limit
    pub max_message_size: usize,
}

/// Split `body` into sealed chunks
///
/// `sequence` only advances when every chunk was sealed.
///
/// # Errors
/// `BadEncodingLimitsExceeded` when the body is larger than the peer
/// accepts or needs more chunks than it accepts
pub fn encode_chunks(
    params: &ChunkParams<'_>,
    body: &[u8],
    sequence: &mut SequenceCounter,
    security: &ChunkSecurity<'_>,
) -> UaResult<Vec<Vec<u8>>> {
    if params.max_message_size > 0 && body.len() > params.max_message_size {
        return Err(UaError::Status(StatusCode::BAD_ENCODING_LIMITS_EXCEEDED));
    }
    let layout = security.layout(true)?;
    let header_len = header_length(params.security_header)?;
    let max_body = max_body_size(params.max_chunk_size, header_len, &layout)?;

    let segments: Vec<&[u8]> = if body.is_empty() {
        vec![body]
    } else {
        body.chunks(max_body).collect()
    };
    if params.max_chunk_count > 0 && segments.len() > params.max_chunk_count {
        return Err(UaError::Status(StatusCode::BAD_ENCODING_LIMITS_EXCEEDED));
    }

    let last = segments.len() - 1;
    let mut tentative = sequence.clone();
    let chunks = segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let chunk_type = if index == last { ChunkType::Final } else { ChunkType::Intermediate };
            seal_chunk(params, chunk_type, segment, tentative.next(), header_len, &layout, security)
        })
        .collect::<UaResult<Vec<_>>>()?;
    *sequence = tentative;
    Ok(chunks)
}

/// A single Abort chunk telling the peer to drop `request_id`'s message
pub fn encode_abort_chunk(
    params: &ChunkParams<'_>,
    status: StatusCode,
    reason: &str,
    sequence: &mut SequenceCounter,
    security: &ChunkSecurity<'_>,
) -> UaResult<Vec<u8>> {
    let mut encoder = BinaryEncoder::new();
    status.encode(&mut encoder)?;
    encoder.encode_string(&UaString::from(reason))?;
    let body = encoder.into_bytes();
    let layout = security.layout(true)?;
    let header_len = header_length(params.security_header)?;
    let mut tentative = sequence.clone();
    let chunk = seal_chunk(params, ChunkType::Abort, &body, tentative.next(), header_len, &layout, security)?;
    *sequence = tentative;
    Ok(chunk)
}

fn seal_chunk(
    params: &ChunkParams<'_>,
    chunk_type: ChunkType,
    segment: &[u8],
    sequence_number: u32,
    header_len: usize,
    layout: &Layout,
    security: &ChunkSecurity<'_>,
) -> UaResult<Vec<u8>> {
    let (padding, plain_len) = if layout.encrypts {
        let unpadded = SEQUENCE_HEADER_SIZE
            + segment.len()
            + layout.padding_overhead()
            + layout.signature_size;
        let padding = padding_size(unpadded, layout.plain_block);
        (Some(padding), unpadded + padding)
    } else {
        (None, SEQUENCE_HEADER_SIZE + segment.len() + layout.signature_size)
    };
    let total_size = if layout.encrypts {
        header_len + plain_len / layout.plain_block * layout.cipher_block
    } else {
        header_len + plain_len
    };
    let message_size = u32::try_from(total_size)
        .map_err(|_| UaError::Encoding("Chunk too large".to_string()))?;

    let mut encoder = BinaryEncoder::with_capacity(total_size);
    MessageHeader::new(params.message_type, chunk_type, message_size).encode(&mut encoder)?;
    encoder.encode_u32(params.secure_channel_id)?;
    params.security_header.encode(&mut encoder)?;
    SequenceHeader {
        sequence_number,
        request_id: params.request_id,
    }
    .encode(&mut encoder)?;
    encoder.encode_raw(segment)?;
    if let Some(padding) = padding {
        write_padding(&mut encoder, padding, layout.extra_padding)?;
    }

    let mut chunk = encoder.into_bytes();
    if layout.signs {
        let signature = security.sign(&chunk)?;
        chunk.extend_from_slice(&signature);
    }
    if layout.encrypts {
        security.encrypt(&mut chunk, header_len)?;
    }
    if chunk.len() != total_size {
        return Err(UaError::Encoding(format!(
            "Sealed chunk is {} bytes, header says {}",
            chunk.len(),
            total_size
        )));
    }
    Ok(chunk)
}

/// The plaintext parts of a received chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPrefix {
    pub header: MessageHeader,
    pub secure_channel_id: u32,
    pub security_header: SecurityHeader,
    /// Offset of the sequence header
    pub header_len: usize,
}

impl ChunkPrefix {
    /// Parse the unencrypted prefix of a secure channel chunk
    pub fn parse(chunk: &[u8], limits: &DecodingLimits) -> UaResult<Self> {
        let header = MessageHeader::decode(chunk)?;
        if !header.message_type.is_secure() {
            return Err(UaError::Status(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID));
        }
        if header.message_size as usize != chunk.len() {
            return Err(UaError::Decoding(format!(
                "Chunk size field {} does not match {} received bytes",
                header.message_size,
                chunk.len()
            )));
        }
        let mut decoder = BinaryDecoder::new(&chunk[MESSAGE_HEADER_SIZE..], limits);
        let secure_channel_id = decoder.decode_u32()?;
        let security_header = if header.message_type == MessageType::OpenSecureChannel {
            SecurityHeader::Asymmetric(decoder.decode()?)
        } else {
            SecurityHeader::Symmetric(decoder.decode()?)
        };
        let header_len = MESSAGE_HEADER_SIZE + decoder.position();
        Ok(Self {
            header,
            secure_channel_id,
            security_header,
            header_len,
        })
    }
}

/// Decrypt, verify and strip a received chunk
///
/// # Returns
/// The sequence header and the body segment
///
/// # Errors
/// `BadSecurityChecksFailed` on any signature, decryption or padding
/// failure
pub fn open_chunk(
    chunk: &[u8],
    header_len: usize,
    security: &ChunkSecurity<'_>,
) -> UaResult<(SequenceHeader, Vec<u8>)> {
    let layout = security.layout(false)?;
    let mut data = chunk.to_vec();

    if layout.encrypts {
        security
            .decrypt(&mut data, header_len)
            .map_err(|_| security_checks_failed())?;
    }
    if layout.signs {
        let signed_len = data
            .len()
            .checked_sub(layout.signature_size)
            .filter(|len| *len >= header_len + SEQUENCE_HEADER_SIZE)
            .ok_or_else(security_checks_failed)?;
        let (signed, signature) = data.split_at(signed_len);
        security
            .verify(signed, signature)
            .map_err(|_| security_checks_failed())?;
        data.truncate(signed_len);
    }
    if layout.encrypts {
        let padding = padding_length(&data[header_len + SEQUENCE_HEADER_SIZE..], layout.extra_padding)?;
        data.truncate(data.len() - padding);
    }
    if data.len() < header_len + SEQUENCE_HEADER_SIZE {
        return Err(UaError::Decoding("Chunk too short for its sequence header".to_string()));
    }

    let sequence = SequenceHeader {
        sequence_number: u32::from_le_bytes([
            data[header_len],
            data[header_len + 1],
            data[header_len + 2],
            data[header_len + 3],
        ]),
        request_id: u32::from_le_bytes([
            data[header_len + 4],
            data[header_len + 5],
            data[header_len + 6],
            data[header_len + 7],
        ]),
    };
    Ok((sequence, data.split_off(header_len + SEQUENCE_HEADER_SIZE)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::header::{AsymmetricSecurityHeader, SymmetricSecurityHeader};
    use once_cell::sync::Lazy;
    use opcua_core::ByteString;
    use opcua_security::{RsaCertificateProvider, derive_keys};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) static CLIENT_PROVIDER: Lazy<RsaCertificateProvider> =
        Lazy::new(|| RsaCertificateProvider::generate(2048).unwrap().trust_all());
    pub(crate) static SERVER_PROVIDER: Lazy<RsaCertificateProvider> =
        Lazy::new(|| RsaCertificateProvider::generate(2048).unwrap().trust_all());

    fn body(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn symmetric_keys(policy: SecurityPolicy) -> SymmetricKeys {
        let derived = derive_keys(policy, &[4u8; 32], &[8u8; 32]).unwrap();
        SymmetricKeys::new(policy, &derived).unwrap()
    }

    fn round_trip(
        security_header: &SecurityHeader,
        send: &ChunkSecurity<'_>,
        receive: &ChunkSecurity<'_>,
        chunk_size: usize,
        body: &[u8],
    ) -> usize {
        let params = ChunkParams {
            message_type: MessageType::Message,
            secure_channel_id: 7,
            request_id: 99,
            security_header,
            max_chunk_size: chunk_size,
            max_chunk_count: 0,
            max_message_size: 0,
        };
        let mut sequence = SequenceCounter::new();
        let chunks = encode_chunks(&params, body, &mut sequence, send).unwrap();
        let mut reassembled = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            assert!(chunk.len() <= chunk_size);
            let prefix = ChunkPrefix::parse(chunk, &DecodingLimits::default()).unwrap();
            assert_eq!(&prefix.security_header, security_header);
            let expected_type = if index + 1 == chunks.len() { ChunkType::Final } else { ChunkType::Intermediate };
            assert_eq!(prefix.header.chunk_type, expected_type);
            let (sequence_header, segment) = open_chunk(chunk, prefix.header_len, receive).unwrap();
            assert_eq!(sequence_header.sequence_number, index as u32 + 1);
            assert_eq!(sequence_header.request_id, 99);
            reassembled.extend_from_slice(&segment);
        }
        assert_eq!(reassembled, body);
        chunks.len()
    }

    #[test]
    fn test_symmetric_round_trip_all_modes() {
        let header = SecurityHeader::Symmetric(SymmetricSecurityHeader { token_id: 1 });
        let keys = symmetric_keys(SecurityPolicy::Basic256Sha256);
        let none_keys = symmetric_keys(SecurityPolicy::None);
        let modes = [
            (MessageSecurityMode::None, &none_keys),
            (MessageSecurityMode::Sign, &keys),
            (MessageSecurityMode::SignAndEncrypt, &keys),
        ];
        for (mode, keys) in modes {
            let security = ChunkSecurity::Symmetric { mode, keys };
            for chunk_size in [8192, 9000, 65_535] {
                for len in [0, 1, 15, 16, 8000, 50_000] {
                    round_trip(&header, &security, &security, chunk_size, &body(len));
                }
            }
        }
    }

    #[test]
    fn test_large_body_splits() {
        let header = SecurityHeader::Symmetric(SymmetricSecurityHeader { token_id: 1 });
        let keys = symmetric_keys(SecurityPolicy::Aes128Sha256RsaOaep);
        let security = ChunkSecurity::Symmetric {
            mode: MessageSecurityMode::SignAndEncrypt,
            keys: &keys,
        };
        assert_eq!(round_trip(&header, &security, &security, 8192, &body(40_000)), 5);
    }

    #[test]
    fn test_asymmetric_round_trip() {
        let policy = SecurityPolicy::Basic256Sha256;
        let header = SecurityHeader::Asymmetric(AsymmetricSecurityHeader {
            security_policy_uri: UaString::from(policy.uri()),
            sender_certificate: ByteString::from(CLIENT_PROVIDER.certificate().der()),
            receiver_certificate_thumbprint: ByteString::from(
                SERVER_PROVIDER.certificate().thumbprint().to_vec(),
            ),
        });
        let send = ChunkSecurity::Asymmetric {
            policy,
            local: &*CLIENT_PROVIDER,
            remote: SERVER_PROVIDER.certificate(),
        };
        let receive = ChunkSecurity::Asymmetric {
            policy,
            local: &*SERVER_PROVIDER,
            remote: CLIENT_PROVIDER.certificate(),
        };
        for len in [0, 100, 3000] {
            round_trip(&header, &send, &receive, 8192, &body(len));
        }
    }

    /// Signs like the wrapped provider until `budget` signatures are used up
    struct FlakySigner {
        inner: &'static RsaCertificateProvider,
        budget: AtomicUsize,
    }

    impl CertificateProvider for FlakySigner {
        fn certificate(&self) -> &Certificate {
            self.inner.certificate()
        }

        fn validate(&self, certificate: &Certificate) -> UaResult<()> {
            self.inner.validate(certificate)
        }

        fn sign(&self, policy: SecurityPolicy, data: &[u8]) -> UaResult<Vec<u8>> {
            self.budget
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .map_err(|_| UaError::Security("Signing key unavailable".to_string()))?;
            self.inner.sign(policy, data)
        }

        fn decrypt(&self, policy: SecurityPolicy, data: &[u8]) -> UaResult<Vec<u8>> {
            self.inner.decrypt(policy, data)
        }
    }

    #[test]
    fn test_failed_seal_keeps_sequence_numbers() {
        let policy = SecurityPolicy::Basic256Sha256;
        let header = SecurityHeader::Asymmetric(AsymmetricSecurityHeader {
            security_policy_uri: UaString::from(policy.uri()),
            sender_certificate: ByteString::from(CLIENT_PROVIDER.certificate().der()),
            receiver_certificate_thumbprint: ByteString::from(
                SERVER_PROVIDER.certificate().thumbprint().to_vec(),
            ),
        });
        let params = ChunkParams {
            message_type: MessageType::OpenSecureChannel,
            secure_channel_id: 7,
            request_id: 1,
            security_header: &header,
            max_chunk_size: 8192,
            max_chunk_count: 0,
            max_message_size: 0,
        };
        let signer = FlakySigner {
            inner: &*CLIENT_PROVIDER,
            budget: AtomicUsize::new(1),
        };
        let flaky = ChunkSecurity::Asymmetric {
            policy,
            local: &signer,
            remote: SERVER_PROVIDER.certificate(),
        };
        let mut sequence = SequenceCounter::starting_at(40);
        // The second chunk cannot be signed
        assert!(encode_chunks(&params, &body(20_000), &mut sequence, &flaky).is_err());
        assert!(encode_abort_chunk(&params, StatusCode::BAD_TIMEOUT, "late", &mut sequence, &flaky).is_err());

        let send = ChunkSecurity::Asymmetric {
            policy,
            local: &*CLIENT_PROVIDER,
            remote: SERVER_PROVIDER.certificate(),
        };
        let receive = ChunkSecurity::Asymmetric {
            policy,
            local: &*SERVER_PROVIDER,
            remote: CLIENT_PROVIDER.certificate(),
        };
        let chunks = encode_chunks(&params, b"retry", &mut sequence, &send).unwrap();
        let prefix = ChunkPrefix::parse(&chunks[0], &DecodingLimits::default()).unwrap();
        let (sequence_header, _) = open_chunk(&chunks[0], prefix.header_len, &receive).unwrap();
        assert_eq!(sequence_header.sequence_number, 40);
        assert_eq!(sequence.next(), 41);
    }

    #[test]
    fn test_tampered_chunk_fails_security_checks() {
        let header = SecurityHeader::Symmetric(SymmetricSecurityHeader { token_id: 1 });
        let keys = symmetric_keys(SecurityPolicy::Basic256Sha256);
        for mode in [MessageSecurityMode::Sign, MessageSecurityMode::SignAndEncrypt] {
            let security = ChunkSecurity::Symmetric { mode, keys: &keys };
            let params = ChunkParams {
                message_type: MessageType::Message,
                secure_channel_id: 7,
                request_id: 1,
                security_header: &header,
                max_chunk_size: 8192,
                max_chunk_count: 0,
                max_message_size: 0,
            };
            let mut chunk = encode_chunks(&params, b"payload", &mut SequenceCounter::new(), &security)
                .unwrap()
                .remove(0);
            let last = chunk.len() - 20;
            chunk[last] ^= 0x01;
            let prefix = ChunkPrefix::parse(&chunk, &DecodingLimits::default()).unwrap();
            let err = open_chunk(&chunk, prefix.header_len, &security).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_SECURITY_CHECKS_FAILED);
        }
    }

    #[test]
    fn test_limits_enforced_on_send() {
        let header = SecurityHeader::Symmetric(SymmetricSecurityHeader { token_id: 1 });
        let params = ChunkParams {
            message_type: MessageType::Message,
            secure_channel_id: 7,
            request_id: 1,
            security_header: &header,
            max_chunk_size: 8192,
            max_chunk_count: 2,
            max_message_size: 0,
        };
        let err = encode_chunks(&params, &body(30_000), &mut SequenceCounter::new(), &ChunkSecurity::None)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_ENCODING_LIMITS_EXCEEDED);
    }

    #[test]
    fn test_padding_with_extra_byte() {
        let mut encoder = BinaryEncoder::new();
        encoder.encode_raw(b"body").unwrap();
        write_padding(&mut encoder, 300, true).unwrap();
        let data = encoder.into_bytes();
        assert_eq!(data.len(), 4 + 302);
        assert_eq!(padding_length(&data, true).unwrap(), 302);

        let mut encoder = BinaryEncoder::new();
        write_padding(&mut encoder, 0, false).unwrap();
        assert_eq!(padding_length(&encoder.into_bytes(), false).unwrap(), 1);
        assert!(padding_length(&[1, 2, 2], false).is_err());
    }
}
