//! Session service set: CreateSession, ActivateSession, CloseSession

use crate::header::{RequestHeader, ResponseHeader};
use crate::ids::ObjectId;
use crate::secure_channel::{decode_mode, encode_mode};
use opcua_codec::{BinaryDecoder, BinaryEncodable, BinaryEncoder};
use opcua_core::{ByteString, DiagnosticInfo, ExtensionObject, LocalizedText, NodeId, StatusCode, UaResult, UaString};
use opcua_security::MessageSecurityMode;

ua_enum! {
    pub enum ApplicationType {
        Server = 0,
        Client = 1,
        ClientAndServer = 2,
        DiscoveryServer = 3,
    }
}

ua_enum! {
    pub enum UserTokenType {
        Anonymous = 0,
        UserName = 1,
        Certificate = 2,
        IssuedToken = 3,
    }
}

ua_struct! {
    pub struct ApplicationDescription {
        pub application_uri: UaString,
        pub product_uri: UaString,
        pub application_name: LocalizedText,
        pub application_type: ApplicationType,
        pub gateway_server_uri: UaString,
        pub discovery_profile_uri: UaString,
        pub discovery_urls: Vec<UaString>,
    }
}

impl ApplicationDescription {
    pub fn new(application_uri: &str, name: &str, application_type: ApplicationType) -> Self {
        Self {
            application_uri: UaString::from(application_uri),
            product_uri: UaString::from(application_uri),
            application_name: LocalizedText::text(name),
            application_type,
            gateway_server_uri: UaString::null(),
            discovery_profile_uri: UaString::null(),
            discovery_urls: Vec::new(),
        }
    }
}

ua_struct! {
    pub struct UserTokenPolicy {
        pub policy_id: UaString,
        pub token_type: UserTokenType,
        pub issued_token_type: UaString,
        pub issuer_endpoint_url: UaString,
        pub security_policy_uri: UaString,
    }
}

impl UserTokenPolicy {
    pub fn new(policy_id: &str, token_type: UserTokenType) -> Self {
        Self {
            policy_id: UaString::from(policy_id),
            token_type,
            issued_token_type: UaString::null(),
            issuer_endpoint_url: UaString::null(),
            security_policy_uri: UaString::null(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescription {
    pub endpoint_url: UaString,
    pub server: ApplicationDescription,
    pub server_certificate: ByteString,
    pub security_mode: MessageSecurityMode,
    pub security_policy_uri: UaString,
    pub user_identity_tokens: Vec<UserTokenPolicy>,
    pub transport_profile_uri: UaString,
    pub security_level: u8,
}

impl BinaryEncodable for EndpointDescription {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_string(&self.endpoint_url)?;
        self.server.encode(encoder)?;
        encoder.encode_byte_string(&self.server_certificate)?;
        encode_mode(self.security_mode, encoder)?;
        encoder.encode_string(&self.security_policy_uri)?;
        encoder.encode_slice(&self.user_identity_tokens)?;
        encoder.encode_string(&self.transport_profile_uri)?;
        encoder.encode_u8(self.security_level)
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        Ok(Self {
            endpoint_url: decoder.decode_string()?,
            server: decoder.decode()?,
            server_certificate: decoder.decode_byte_string()?,
            security_mode: decode_mode(decoder)?,
            security_policy_uri: decoder.decode_string()?,
            user_identity_tokens: decoder.decode_vec()?,
            transport_profile_uri: decoder.decode_string()?,
            security_level: decoder.decode_u8()?,
        })
    }
}

ua_struct! {
    /// Asymmetric signature proving possession of a private key
    pub struct SignatureData {
        pub algorithm: UaString,
        pub signature: ByteString,
    }
}

impl SignatureData {
    pub fn null() -> Self {
        Self {
            algorithm: UaString::null(),
            signature: ByteString::null(),
        }
    }
}

ua_struct! {
    pub struct SignedSoftwareCertificate {
        pub certificate_data: ByteString,
        pub signature: ByteString,
    }
}

ua_struct! {
    pub struct AnonymousIdentityToken {
        pub policy_id: UaString,
    }
}

ua_struct! {
    pub struct UserNameIdentityToken {
        pub policy_id: UaString,
        pub user_name: UaString,
        /// Plain or encrypted per `encryption_algorithm`
        pub password: ByteString,
        /// Null when the password travels unencrypted
        pub encryption_algorithm: UaString,
    }
}

ua_struct! {
    pub struct X509IdentityToken {
        pub policy_id: UaString,
        pub certificate_data: ByteString,
    }
}

impl AnonymousIdentityToken {
    pub const TYPE_ID: u32 = ObjectId::ANONYMOUS_IDENTITY_TOKEN;
}

impl UserNameIdentityToken {
    pub const TYPE_ID: u32 = ObjectId::USER_NAME_IDENTITY_TOKEN;
}

impl X509IdentityToken {
    pub const TYPE_ID: u32 = ObjectId::X509_IDENTITY_TOKEN;
}

ua_struct! {
    pub struct CreateSessionRequest {
        pub request_header: RequestHeader,
        pub client_description: ApplicationDescription,
        pub server_uri: UaString,
        pub endpoint_url: UaString,
        pub session_name: UaString,
        pub client_nonce: ByteString,
        pub client_certificate: ByteString,
        /// Milliseconds
        pub requested_session_timeout: f64,
        pub max_response_message_size: u32,
    }
}

ua_struct! {
    pub struct CreateSessionResponse {
        pub response_header: ResponseHeader,
        pub session_id: NodeId,
        pub authentication_token: NodeId,
        pub revised_session_timeout: f64,
        pub server_nonce: ByteString,
        pub server_certificate: ByteString,
        pub server_endpoints: Vec<EndpointDescription>,
        pub server_software_certificates: Vec<SignedSoftwareCertificate>,
        pub server_signature: SignatureData,
        pub max_request_message_size: u32,
    }
}

ua_struct! {
    pub struct ActivateSessionRequest {
        pub request_header: RequestHeader,
        pub client_signature: SignatureData,
        pub client_software_certificates: Vec<SignedSoftwareCertificate>,
        pub locale_ids: Vec<UaString>,
        pub user_identity_token: ExtensionObject,
        pub user_token_signature: SignatureData,
    }
}

ua_struct! {
    pub struct ActivateSessionResponse {
        pub response_header: ResponseHeader,
        pub server_nonce: ByteString,
        pub results: Vec<StatusCode>,
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    pub struct CloseSessionRequest {
        pub request_header: RequestHeader,
        pub delete_subscriptions: bool,
    }
}

ua_struct! {
    pub struct CloseSessionResponse {
        pub response_header: ResponseHeader,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_codec::{DecodingLimits, ExtensionObjectExt};

    #[test]
    fn test_endpoint_description_round_trip() {
        let endpoint = EndpointDescription {
            endpoint_url: UaString::from("opc.tcp://localhost:4840"),
            server: ApplicationDescription::new("urn:server", "Server", ApplicationType::Server),
            server_certificate: ByteString::from(vec![1, 2, 3]),
            security_mode: MessageSecurityMode::Sign,
            security_policy_uri: UaString::from("http://opcfoundation.org/UA/SecurityPolicy#None"),
            user_identity_tokens: vec![UserTokenPolicy::new("anonymous", UserTokenType::Anonymous)],
            transport_profile_uri: UaString::null(),
            security_level: 1,
        };
        let bytes = endpoint.encode_to_vec().unwrap();
        let decoded = EndpointDescription::decode_exact(&bytes, &DecodingLimits::default()).unwrap();
        assert_eq!(decoded, endpoint);
    }

    #[test]
    fn test_identity_token_in_extension_object() {
        let token = UserNameIdentityToken {
            policy_id: UaString::from("username"),
            user_name: UaString::from("operator"),
            password: ByteString::from(b"pw".to_vec()),
            encryption_algorithm: UaString::null(),
        };
        let object =
            ExtensionObject::from_encodable(ObjectId::node_id(UserNameIdentityToken::TYPE_ID), &token).unwrap();
        assert_eq!(object.type_id.as_ns0_numeric(), Some(324));
        let decoded: UserNameIdentityToken = object.decode_inner(&DecodingLimits::default()).unwrap();
        assert_eq!(decoded, token);
    }
}
