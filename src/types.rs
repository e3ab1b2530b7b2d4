//! Protocol enums shared by the record layer and the handshake.
//!
//! Every enum keeps an `Unknown` variant so values we do not implement can
//! still be parsed, logged and rejected with the right alert.

use std::fmt;

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::buffer::Buf;

// ============================================================================
// Record layer
// ============================================================================

/// Record content types (RFC 6347, RFC 6520, RFC 9146).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Heartbeat,
    /// Record carrying a connection ID, real type is inside the ciphertext.
    Tls12Cid,
    Unknown(u8),
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            24 => ContentType::Heartbeat,
            25 => ContentType::Tls12Cid,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Heartbeat => 24,
            ContentType::Tls12Cid => 25,
            ContentType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// DTLS protocol versions. DTLS counts minor versions downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    DTLS1_0,
    DTLS1_2,
    Unknown(u16),
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0xFEFF => ProtocolVersion::DTLS1_0,
            0xFEFD => ProtocolVersion::DTLS1_2,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::DTLS1_0 => 0xFEFF,
            ProtocolVersion::DTLS1_2 => 0xFEFD,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    /// Any version with the DTLS major byte, known or not.
    pub fn is_dtls(&self) -> bool {
        (self.as_u16() >> 8) == 0xFE
    }

    fn minor(&self) -> u8 {
        self.as_u16() as u8
    }

    /// True if `self` is the same DTLS version as `other` or a later one.
    pub fn is_equal_or_later_than(&self, other: ProtocolVersion) -> bool {
        self.is_dtls() && other.is_dtls() && self.minor() <= other.minor()
    }

    /// True if `self` is the same DTLS version as `other` or an earlier one.
    pub fn is_equal_or_earlier_than(&self, other: ProtocolVersion) -> bool {
        self.is_dtls() && other.is_dtls() && self.minor() >= other.minor()
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, version) = be_u16(input)?;
        Ok((input, Self::from_u16(version)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push_u16(self.as_u16());
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::DTLS1_0 => write!(f, "DTLS 1.0"),
            ProtocolVersion::DTLS1_2 => write!(f, "DTLS 1.2"),
            ProtocolVersion::Unknown(v) => write!(f, "Unknown(0x{:04x})", v),
        }
    }
}

// ============================================================================
// Handshake
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeType {
    HelloRequest,
    ClientHello,
    ServerHello,
    HelloVerifyRequest,
    NewSessionTicket,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    CertificateStatus,
    Unknown(u8),
}

impl HandshakeType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HandshakeType::HelloRequest,
            1 => HandshakeType::ClientHello,
            2 => HandshakeType::ServerHello,
            3 => HandshakeType::HelloVerifyRequest,
            4 => HandshakeType::NewSessionTicket,
            11 => HandshakeType::Certificate,
            12 => HandshakeType::ServerKeyExchange,
            13 => HandshakeType::CertificateRequest,
            14 => HandshakeType::ServerHelloDone,
            15 => HandshakeType::CertificateVerify,
            16 => HandshakeType::ClientKeyExchange,
            20 => HandshakeType::Finished,
            22 => HandshakeType::CertificateStatus,
            _ => HandshakeType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HandshakeType::HelloRequest => 0,
            HandshakeType::ClientHello => 1,
            HandshakeType::ServerHello => 2,
            HandshakeType::HelloVerifyRequest => 3,
            HandshakeType::NewSessionTicket => 4,
            HandshakeType::Certificate => 11,
            HandshakeType::ServerKeyExchange => 12,
            HandshakeType::CertificateRequest => 13,
            HandshakeType::ServerHelloDone => 14,
            HandshakeType::CertificateVerify => 15,
            HandshakeType::ClientKeyExchange => 16,
            HandshakeType::Finished => 20,
            HandshakeType::CertificateStatus => 22,
            HandshakeType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HandshakeType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Fatal,
    Unknown(u8),
}

impl AlertLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            _ => AlertLevel::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
            AlertLevel::Unknown(value) => *value,
        }
    }
}

/// Alert descriptions (RFC 5246 7.2 plus later registrations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertDescription {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    RecordOverflow,
    DecompressionFailure,
    HandshakeFailure,
    BadCertificate,
    UnsupportedCertificate,
    CertificateRevoked,
    CertificateExpired,
    CertificateUnknown,
    IllegalParameter,
    UnknownCa,
    AccessDenied,
    DecodeError,
    DecryptError,
    ProtocolVersion,
    InsufficientSecurity,
    InternalError,
    InappropriateFallback,
    UserCanceled,
    NoRenegotiation,
    UnsupportedExtension,
    UnrecognizedName,
    UnknownPskIdentity,
    Unknown(u8),
}

impl AlertDescription {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => AlertDescription::CloseNotify,
            10 => AlertDescription::UnexpectedMessage,
            20 => AlertDescription::BadRecordMac,
            22 => AlertDescription::RecordOverflow,
            30 => AlertDescription::DecompressionFailure,
            40 => AlertDescription::HandshakeFailure,
            42 => AlertDescription::BadCertificate,
            43 => AlertDescription::UnsupportedCertificate,
            44 => AlertDescription::CertificateRevoked,
            45 => AlertDescription::CertificateExpired,
            46 => AlertDescription::CertificateUnknown,
            47 => AlertDescription::IllegalParameter,
            48 => AlertDescription::UnknownCa,
            49 => AlertDescription::AccessDenied,
            50 => AlertDescription::DecodeError,
            51 => AlertDescription::DecryptError,
            70 => AlertDescription::ProtocolVersion,
            71 => AlertDescription::InsufficientSecurity,
            80 => AlertDescription::InternalError,
            86 => AlertDescription::InappropriateFallback,
            90 => AlertDescription::UserCanceled,
            100 => AlertDescription::NoRenegotiation,
            110 => AlertDescription::UnsupportedExtension,
            112 => AlertDescription::UnrecognizedName,
            115 => AlertDescription::UnknownPskIdentity,
            _ => AlertDescription::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            AlertDescription::CloseNotify => 0,
            AlertDescription::UnexpectedMessage => 10,
            AlertDescription::BadRecordMac => 20,
            AlertDescription::RecordOverflow => 22,
            AlertDescription::DecompressionFailure => 30,
            AlertDescription::HandshakeFailure => 40,
            AlertDescription::BadCertificate => 42,
            AlertDescription::UnsupportedCertificate => 43,
            AlertDescription::CertificateRevoked => 44,
            AlertDescription::CertificateExpired => 45,
            AlertDescription::CertificateUnknown => 46,
            AlertDescription::IllegalParameter => 47,
            AlertDescription::UnknownCa => 48,
            AlertDescription::AccessDenied => 49,
            AlertDescription::DecodeError => 50,
            AlertDescription::DecryptError => 51,
            AlertDescription::ProtocolVersion => 70,
            AlertDescription::InsufficientSecurity => 71,
            AlertDescription::InternalError => 80,
            AlertDescription::InappropriateFallback => 86,
            AlertDescription::UserCanceled => 90,
            AlertDescription::NoRenegotiation => 100,
            AlertDescription::UnsupportedExtension => 110,
            AlertDescription::UnrecognizedName => 112,
            AlertDescription::UnknownPskIdentity => 115,
            AlertDescription::Unknown(value) => *value,
        }
    }
}

impl fmt::Display for AlertDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// Cipher suites and key exchange
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum KeyExchangeAlgorithm {
    ECDHE_ECDSA,
    PSK,
    Unknown,
}

/// TLS 1.2 cipher suites usable over DTLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    /// ECDHE with ECDSA authentication, AES-128-GCM, SHA-256
    ECDHE_ECDSA_AES128_GCM_SHA256, // 0xC02B
    /// ECDHE with ECDSA authentication, AES-256-GCM, SHA-384
    ECDHE_ECDSA_AES256_GCM_SHA384, // 0xC02C
    /// Pre-shared key, AES-128-GCM, SHA-256
    PSK_AES128_GCM_SHA256, // 0x00A8
    /// Signalling value for secure renegotiation (RFC 5746)
    EMPTY_RENEGOTIATION_INFO_SCSV, // 0x00FF
    /// Unknown or unsupported cipher suite by its IANA value
    Unknown(u16),
}

impl CipherSuite {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0xC02B => CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
            0xC02C => CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384,
            0x00A8 => CipherSuite::PSK_AES128_GCM_SHA256,
            0x00FF => CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV,
            _ => CipherSuite::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256 => 0xC02B,
            CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384 => 0xC02C,
            CipherSuite::PSK_AES128_GCM_SHA256 => 0x00A8,
            CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV => 0x00FF,
            CipherSuite::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, Self::from_u16(value)))
    }

    /// Hash used by the PRF and the handshake transcript.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        match self {
            CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384 => HashAlgorithm::SHA384,
            CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256 | CipherSuite::PSK_AES128_GCM_SHA256 => {
                HashAlgorithm::SHA256
            }
            _ => HashAlgorithm::Unknown(0),
        }
    }

    pub fn key_exchange_algorithm(&self) -> KeyExchangeAlgorithm {
        match self {
            CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256
            | CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384 => KeyExchangeAlgorithm::ECDHE_ECDSA,
            CipherSuite::PSK_AES128_GCM_SHA256 => KeyExchangeAlgorithm::PSK,
            _ => KeyExchangeAlgorithm::Unknown,
        }
    }

    /// Length in bytes of verify_data for Finished MACs.
    pub fn verify_data_length(&self) -> usize {
        12
    }

    /// Whether the suite needs elliptic-curve extensions in the hellos.
    pub fn has_ecc(&self) -> bool {
        self.key_exchange_algorithm() == KeyExchangeAlgorithm::ECDHE_ECDSA
    }

    /// Whether this value names a real suite rather than a signal.
    pub fn is_real(&self) -> bool {
        !matches!(
            self,
            CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV | CipherSuite::Unknown(_)
        )
    }

    /// All implemented suites in default preference order.
    pub const fn all() -> &'static [CipherSuite; 3] {
        &[
            CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384,
            CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
            CipherSuite::PSK_AES128_GCM_SHA256,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Null,
    Unknown(u8),
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => CompressionMethod::Null,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::Null => 0x00,
            CompressionMethod::Unknown(value) => *value,
        }
    }
}

/// Key exchange groups (RFC 8422).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedGroup {
    /// secp256r1 / P-256.
    Secp256r1,
    /// secp384r1 / P-384.
    Secp384r1,
    X25519,
    Unknown(u16),
}

impl NamedGroup {
    pub fn from_u16(value: u16) -> Self {
        match value {
            23 => NamedGroup::Secp256r1,
            24 => NamedGroup::Secp384r1,
            29 => NamedGroup::X25519,
            _ => NamedGroup::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            NamedGroup::Secp256r1 => 23,
            NamedGroup::Secp384r1 => 24,
            NamedGroup::X25519 => 29,
            NamedGroup::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedGroup> {
        let (input, value) = be_u16(input)?;
        Ok((input, Self::from_u16(value)))
    }
}

/// `ECCurveType` in ServerKeyExchange; only named curves are used.
pub const CURVE_TYPE_NAMED_CURVE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    None,
    SHA1,
    SHA256,
    SHA384,
    SHA512,
    Unknown(u8),
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl HashAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HashAlgorithm::None,
            2 => HashAlgorithm::SHA1,
            4 => HashAlgorithm::SHA256,
            5 => HashAlgorithm::SHA384,
            6 => HashAlgorithm::SHA512,
            _ => HashAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HashAlgorithm::None => 0,
            HashAlgorithm::SHA1 => 2,
            HashAlgorithm::SHA256 => 4,
            HashAlgorithm::SHA384 => 5,
            HashAlgorithm::SHA512 => 6,
            HashAlgorithm::Unknown(value) => *value,
        }
    }

    /// Digest length in bytes, zero for unknown.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::SHA1 => 20,
            HashAlgorithm::SHA256 => 32,
            HashAlgorithm::SHA384 => 48,
            HashAlgorithm::SHA512 => 64,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Anonymous,
    RSA,
    DSA,
    ECDSA,
    Unknown(u8),
}

impl Default for SignatureAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl SignatureAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => SignatureAlgorithm::Anonymous,
            1 => SignatureAlgorithm::RSA,
            2 => SignatureAlgorithm::DSA,
            3 => SignatureAlgorithm::ECDSA,
            _ => SignatureAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            SignatureAlgorithm::Anonymous => 0,
            SignatureAlgorithm::RSA => 1,
            SignatureAlgorithm::DSA => 2,
            SignatureAlgorithm::ECDSA => 3,
            SignatureAlgorithm::Unknown(value) => *value,
        }
    }
}

const SUPPORTED_SIGNATURE_ALGORITHMS: [SignatureAndHashAlgorithm; 2] = [
    SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::ECDSA),
    SignatureAndHashAlgorithm::new(HashAlgorithm::SHA384, SignatureAlgorithm::ECDSA),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SignatureAndHashAlgorithm {
    pub hash: HashAlgorithm,
    pub signature: SignatureAlgorithm,
}

impl SignatureAndHashAlgorithm {
    pub const fn new(hash: HashAlgorithm, signature: SignatureAlgorithm) -> Self {
        SignatureAndHashAlgorithm { hash, signature }
    }

    pub fn from_u16(value: u16) -> Self {
        let hash = HashAlgorithm::from_u8((value >> 8) as u8);
        let signature = SignatureAlgorithm::from_u8(value as u8);
        SignatureAndHashAlgorithm { hash, signature }
    }

    pub fn as_u16(&self) -> u16 {
        ((self.hash.as_u8() as u16) << 8) | (self.signature.as_u8() as u16)
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAndHashAlgorithm> {
        let (input, value) = be_u16(input)?;
        Ok((input, SignatureAndHashAlgorithm::from_u16(value)))
    }

    /// Combinations we can produce and verify.
    pub const fn supported() -> &'static [SignatureAndHashAlgorithm; 2] {
        &SUPPORTED_SIGNATURE_ALGORITHMS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ClientCertificateType {
    RSA_SIGN,
    ECDSA_SIGN,
    Unknown(u8),
}

impl ClientCertificateType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ClientCertificateType::RSA_SIGN,
            64 => ClientCertificateType::ECDSA_SIGN,
            _ => ClientCertificateType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ClientCertificateType::RSA_SIGN => 1,
            ClientCertificateType::ECDSA_SIGN => 64,
            ClientCertificateType::Unknown(value) => *value,
        }
    }
}

// ============================================================================
// Extensions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionType {
    ServerName,
    MaxFragmentLength,
    StatusRequest,
    SupportedGroups,
    EcPointFormats,
    SignatureAlgorithms,
    Heartbeat,
    ExtendedMasterSecret,
    SessionTicket,
    ConnectionId,
    RenegotiationInfo,
    Unknown(u16),
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => ExtensionType::ServerName,
            1 => ExtensionType::MaxFragmentLength,
            5 => ExtensionType::StatusRequest,
            10 => ExtensionType::SupportedGroups,
            11 => ExtensionType::EcPointFormats,
            13 => ExtensionType::SignatureAlgorithms,
            15 => ExtensionType::Heartbeat,
            23 => ExtensionType::ExtendedMasterSecret,
            35 => ExtensionType::SessionTicket,
            54 => ExtensionType::ConnectionId,
            0xff01 => ExtensionType::RenegotiationInfo,
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::ServerName => 0,
            ExtensionType::MaxFragmentLength => 1,
            ExtensionType::StatusRequest => 5,
            ExtensionType::SupportedGroups => 10,
            ExtensionType::EcPointFormats => 11,
            ExtensionType::SignatureAlgorithms => 13,
            ExtensionType::Heartbeat => 15,
            ExtensionType::ExtendedMasterSecret => 23,
            ExtensionType::SessionTicket => 35,
            ExtensionType::ConnectionId => 54,
            ExtensionType::RenegotiationInfo => 0xff01,
            ExtensionType::Unknown(value) => *value,
        }
    }
}

/// RFC 6066 max_fragment_length codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFragmentLength {
    Pow2_9,
    Pow2_10,
    Pow2_11,
    Pow2_12,
}

impl MaxFragmentLength {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(MaxFragmentLength::Pow2_9),
            2 => Some(MaxFragmentLength::Pow2_10),
            3 => Some(MaxFragmentLength::Pow2_11),
            4 => Some(MaxFragmentLength::Pow2_12),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MaxFragmentLength::Pow2_9 => 1,
            MaxFragmentLength::Pow2_10 => 2,
            MaxFragmentLength::Pow2_11 => 3,
            MaxFragmentLength::Pow2_12 => 4,
        }
    }

    /// Plaintext limit in bytes.
    pub fn limit(&self) -> usize {
        1 << (8 + self.as_u8() as usize)
    }
}

/// RFC 6520 heartbeat modes, as advertised in the heartbeat extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatMode {
    PeerAllowedToSend,
    PeerNotAllowedToSend,
    Unknown(u8),
}

impl HeartbeatMode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => HeartbeatMode::PeerAllowedToSend,
            2 => HeartbeatMode::PeerNotAllowedToSend,
            _ => HeartbeatMode::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HeartbeatMode::PeerAllowedToSend => 1,
            HeartbeatMode::PeerNotAllowedToSend => 2,
            HeartbeatMode::Unknown(value) => *value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatMessageType {
    Request,
    Response,
    Unknown(u8),
}

impl HeartbeatMessageType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => HeartbeatMessageType::Request,
            2 => HeartbeatMessageType::Response,
            _ => HeartbeatMessageType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HeartbeatMessageType::Request => 1,
            HeartbeatMessageType::Response => 2,
            HeartbeatMessageType::Unknown(value) => *value,
        }
    }
}

/// Which side of the connection we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    Client,
    Server,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering_counts_down() {
        use ProtocolVersion::*;
        assert!(DTLS1_2.is_equal_or_later_than(DTLS1_0));
        assert!(!DTLS1_0.is_equal_or_later_than(DTLS1_2));
        assert!(DTLS1_0.is_equal_or_earlier_than(DTLS1_2));
        assert!(DTLS1_2.is_equal_or_later_than(DTLS1_2));
        assert!(!Unknown(0x0303).is_dtls());
        assert!(!Unknown(0x0303).is_equal_or_later_than(DTLS1_0));
        assert!(Unknown(0xFEFC).is_dtls());
    }

    #[test]
    fn supported_signature_algorithms_are_static() {
        let supported: &'static [SignatureAndHashAlgorithm] =
            SignatureAndHashAlgorithm::supported();
        assert_eq!(supported.len(), 2);
        assert!(supported.iter().all(|a| a.signature == SignatureAlgorithm::ECDSA));
        assert_eq!(supported[0].as_u16(), 0x0403);
    }

    #[test]
    fn unknown_values_round_trip() {
        assert_eq!(ContentType::from_u8(99), ContentType::Unknown(99));
        assert_eq!(ContentType::Unknown(99).as_u8(), 99);
        assert_eq!(CipherSuite::from_u16(0x1301).as_u16(), 0x1301);
        assert_eq!(AlertDescription::from_u8(200).as_u8(), 200);
    }

    #[test]
    fn suite_properties() {
        let s = CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384;
        assert_eq!(s.hash_algorithm(), HashAlgorithm::SHA384);
        assert!(s.has_ecc());

        let p = CipherSuite::PSK_AES128_GCM_SHA256;
        assert_eq!(p.key_exchange_algorithm(), KeyExchangeAlgorithm::PSK);
        assert!(!p.has_ecc());
        assert!(!CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV.is_real());
    }

    #[test]
    fn max_fragment_length_limits() {
        assert_eq!(MaxFragmentLength::Pow2_9.limit(), 512);
        assert_eq!(MaxFragmentLength::Pow2_12.limit(), 4096);
        assert_eq!(MaxFragmentLength::from_u8(5), None);
    }
}
