//! Signing and key loading implementations using RustCrypto.

use std::str;

use der::Decode;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256, Sha384};
use spki::ObjectIdentifier;
use x509_cert::Certificate as X509Certificate;

use crate::buffer::Buf;
use crate::crypto::provider::{KeyProvider, SignatureVerifier, SigningKey};
use crate::types::{HashAlgorithm, NamedGroup, SignatureAlgorithm};

const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// ECDSA signing key implementation.
enum EcdsaSigningKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl std::fmt::Debug for EcdsaSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EcdsaSigningKey::P256(_) => f.debug_tuple("EcdsaSigningKey::P256").finish(),
            EcdsaSigningKey::P384(_) => f.debug_tuple("EcdsaSigningKey::P384").finish(),
        }
    }
}

fn digest(hash_alg: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>, String> {
    match hash_alg {
        HashAlgorithm::SHA256 => Ok(Sha256::digest(data).to_vec()),
        HashAlgorithm::SHA384 => Ok(Sha384::digest(data).to_vec()),
        _ => Err(format!("Unsupported signature hash: {:?}", hash_alg)),
    }
}

impl SigningKey for EcdsaSigningKey {
    fn sign(&mut self, data: &[u8], out: &mut Buf) -> Result<(), String> {
        let hash = digest(self.hash_algorithm(), data)?;

        out.clear();
        match self {
            EcdsaSigningKey::P256(key) => {
                let signature: p256::ecdsa::Signature = key
                    .sign_prehash(&hash)
                    .map_err(|_| "Signing failed".to_string())?;
                out.extend_from_slice(signature.to_der().as_bytes());
            }
            EcdsaSigningKey::P384(key) => {
                let signature: p384::ecdsa::Signature = key
                    .sign_prehash(&hash)
                    .map_err(|_| "Signing failed".to_string())?;
                out.extend_from_slice(signature.to_der().as_bytes());
            }
        }
        Ok(())
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::ECDSA
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        match self {
            EcdsaSigningKey::P256(_) => HashAlgorithm::SHA256,
            EcdsaSigningKey::P384(_) => HashAlgorithm::SHA384,
        }
    }
}

/// Key provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoKeyProvider;

impl KeyProvider for RustCryptoKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String> {
        // PKCS#8 DER
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(EcdsaSigningKey::P256(key)));
        }
        if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(EcdsaSigningKey::P384(key)));
        }

        // SEC1 DER (OpenSSL "EC PRIVATE KEY")
        if let Ok(secret) = p256::SecretKey::from_sec1_der(key_der) {
            return Ok(Box::new(EcdsaSigningKey::P256(secret.into())));
        }
        if let Ok(secret) = p384::SecretKey::from_sec1_der(key_der) {
            return Ok(Box::new(EcdsaSigningKey::P384(secret.into())));
        }

        if let Ok(pem_str) = str::from_utf8(key_der) {
            if pem_str.contains("-----BEGIN") {
                if let Ok((_label, doc)) = pkcs8::Document::from_pem(pem_str) {
                    return self.load_private_key(doc.as_bytes());
                }
            }
        }

        Err("Failed to parse private key in any supported format".to_string())
    }
}

/// Signature verifier implementation.
#[derive(Debug)]
pub(super) struct RustCryptoSignatureVerifier;

impl SignatureVerifier for RustCryptoSignatureVerifier {
    fn verify_signature(
        &self,
        cert_der: &[u8],
        data: &[u8],
        signature: &[u8],
        hash_alg: HashAlgorithm,
        sig_alg: SignatureAlgorithm,
    ) -> Result<(), String> {
        if sig_alg != SignatureAlgorithm::ECDSA {
            return Err(format!("Unsupported signature algorithm: {:?}", sig_alg));
        }

        let cert = X509Certificate::from_der(cert_der)
            .map_err(|e| format!("Failed to parse certificate: {e}"))?;
        let spki = &cert.tbs_certificate.subject_public_key_info;

        if spki.algorithm.oid != OID_EC_PUBLIC_KEY {
            return Err(format!(
                "Unsupported public key algorithm: {}",
                spki.algorithm.oid
            ));
        }

        let pubkey_bytes = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| "Invalid EC subject_public_key bitstring".to_string())?;

        let curve_oid: ObjectIdentifier = spki
            .algorithm
            .parameters
            .as_ref()
            .ok_or("Missing EC curve parameter in certificate")?
            .decode_as()
            .map_err(|_| "Invalid EC curve parameter in certificate".to_string())?;

        let group = match curve_oid {
            OID_P256 => NamedGroup::Secp256r1,
            OID_P384 => NamedGroup::Secp384r1,
            _ => return Err(format!("Unsupported EC curve: {}", curve_oid)),
        };

        let hash = digest(hash_alg, data)?;

        let verified = match group {
            NamedGroup::Secp256r1 => {
                let verifying_key = p256::ecdsa::VerifyingKey::from_sec1_bytes(pubkey_bytes)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let sig = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|_| "Invalid signature format".to_string())?;
                verifying_key.verify_prehash(&hash, &sig)
            }
            _ => {
                let verifying_key = p384::ecdsa::VerifyingKey::from_sec1_bytes(pubkey_bytes)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let sig = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|_| "Invalid signature format".to_string())?;
                verifying_key.verify_prehash(&hash, &sig)
            }
        };

        verified.map_err(|_| format!("ECDSA signature verification failed for {:?}", hash_alg))
    }
}

pub(super) static KEY_PROVIDER: RustCryptoKeyProvider = RustCryptoKeyProvider;

pub(super) static SIGNATURE_VERIFIER: RustCryptoSignatureVerifier = RustCryptoSignatureVerifier;
