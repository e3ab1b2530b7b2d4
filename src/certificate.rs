//! Self-signed ECDSA certificates for DTLS peers.
//!
//! Peers that authenticate each other out of band (for example by comparing
//! fingerprints) do not need a CA-issued certificate. The generated key is a
//! P-256 key in PKCS#8 DER, which the default key provider loads directly.

use std::fmt;

use rcgen::{
    Certificate as RcgenCertificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256,
};
use sha2::{Digest, Sha256};

use crate::crypto::CryptoProvider;
use crate::dtls::Credentials;
use crate::Error;

/// A DER certificate and its PKCS#8 DER private key.
#[derive(Clone)]
pub struct DtlsCertificate {
    pub certificate: Vec<u8>,
    pub private_key: Vec<u8>,
}

impl DtlsCertificate {
    /// Generate a certificate for the common name `dgramtls`, valid for a year.
    pub fn generate() -> Result<Self, Error> {
        Self::generate_for("dgramtls")
    }

    pub fn generate_for(common_name: &str) -> Result<Self, Error> {
        let generation_failed = |e: rcgen::RcgenError| {
            Error::CryptoError(format!("certificate generation failed: {}", e))
        };

        let key_pair = KeyPair::generate(&PKCS_ECDSA_P256_SHA256).map_err(generation_failed)?;

        let mut params = CertificateParams::new(vec![common_name.to_string()]);
        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::CommonName, common_name.to_string());
        params.distinguished_name = distinguished_name;
        params.is_ca = IsCa::NoCa;
        params.key_pair = Some(key_pair);

        let not_before = time::OffsetDateTime::now_utc();
        params.not_before = not_before;
        params.not_after = not_before + time::Duration::days(365);

        let cert = RcgenCertificate::from_params(params).map_err(generation_failed)?;
        let certificate = cert.serialize_der().map_err(generation_failed)?;

        Ok(DtlsCertificate {
            certificate,
            private_key: cert.serialize_private_key_der(),
        })
    }

    /// SHA-256 of the DER certificate.
    pub fn fingerprint(&self) -> [u8; 32] {
        fingerprint(&self.certificate)
    }

    /// Single-certificate credentials for a client or server.
    pub fn credentials(&self, provider: &CryptoProvider) -> Result<Credentials, Error> {
        Credentials::from_der(vec![self.certificate.clone()], &self.private_key, provider)
    }
}

/// SHA-256 fingerprint of a DER certificate, for pinning a peer's
/// self-signed certificate.
pub fn fingerprint(certificate_der: &[u8]) -> [u8; 32] {
    Sha256::digest(certificate_der).into()
}

/// Colon separated upper case hex, as in SDP `a=fingerprint` lines.
pub fn format_fingerprint(fingerprint: &[u8]) -> String {
    fingerprint
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(":")
}

impl fmt::Debug for DtlsCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DtlsCertificate")
            .field("fingerprint", &format_fingerprint(&self.fingerprint()))
            .finish()
    }
}
