//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The [`CryptoProvider`] struct holds static references to trait objects,
//! one per capability:
//!
//! - **Cipher Suites** ([`SupportedCipherSuite`]): Factory for AEAD ciphers
//! - **Key Exchange Groups** ([`SupportedKxGroup`]): Factory for ECDHE key exchanges
//! - **Signature Verification** ([`SignatureVerifier`]): Verify signatures against certificates
//! - **Key Provider** ([`KeyProvider`]): Parse and load private keys
//! - **Secure Random** ([`SecureRandom`]): Cryptographically secure RNG
//! - **Hash Provider** ([`HashProvider`]): Factory for hash contexts
//! - **PRF Provider** ([`PrfProvider`]): TLS 1.2 PRF for key derivation
//! - **HMAC Provider** ([`HmacProvider`]): HMAC-SHA256, used for cookies
//!
//! # Using a Custom Provider
//!
//! ```
//! use dgramtls::Config;
//! use dgramtls::crypto::rust_crypto;
//!
//! let provider = rust_crypto::default_provider();
//! let config = Config::builder()
//!     .with_crypto_provider(provider)
//!     .build()
//!     .unwrap();
//! # let _ = config;
//! ```
//!
//! All provider traits require `Send + Sync + UnwindSafe + RefUnwindSafe`
//! since one provider is shared by every connection.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::sync::OnceLock;

use crate::buffer::{Buf, TmpBuf};
use crate::crypto::{Aad, Nonce};
use crate::types::{CipherSuite, HashAlgorithm, NamedGroup, SignatureAlgorithm};

// ============================================================================
// Marker Trait
// ============================================================================

/// Marker trait for types that are safe to use in crypto provider components.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance Traits
// ============================================================================

/// AEAD cipher for in-place encryption/decryption.
pub trait Cipher: CryptoSafe {
    /// Encrypt plaintext in-place, appending authentication tag.
    fn encrypt(&mut self, plaintext: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String>;

    /// Decrypt ciphertext in-place, verifying and removing authentication tag.
    fn decrypt(&mut self, ciphertext: &mut TmpBuf, aad: Aad, nonce: Nonce) -> Result<(), String>;
}

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    fn update(&mut self, data: &[u8]);

    /// Clone the context and finalize it, writing the hash to `out`.
    /// The original context can continue to be updated.
    fn clone_and_finalize(&self, out: &mut Buf);
}

/// Signing key for generating digital signatures.
pub trait SigningKey: CryptoSafe {
    /// Sign data and return the DER encoded signature.
    fn sign(&mut self, data: &[u8], out: &mut Buf) -> Result<(), String>;

    fn algorithm(&self) -> SignatureAlgorithm;

    /// Hash algorithm the key signs with.
    fn hash_algorithm(&self) -> HashAlgorithm;
}

/// Active key exchange instance (ephemeral keypair for one handshake).
pub trait ActiveKeyExchange: CryptoSafe {
    fn pub_key(&self) -> &[u8];

    /// Complete exchange with peer's public key, returning shared secret.
    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String>;

    fn group(&self) -> NamedGroup;
}

// ============================================================================
// Factory Traits
// ============================================================================

/// Cipher suite support (factory for Cipher instances).
pub trait SupportedCipherSuite: CryptoSafe {
    fn suite(&self) -> CipherSuite;

    /// Hash algorithm used by the PRF of this suite.
    fn hash_algorithm(&self) -> HashAlgorithm;

    /// Key material lengths: (mac_key_len, enc_key_len, fixed_iv_len).
    fn key_lengths(&self) -> (usize, usize, usize);

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String>;
}

/// Key exchange group support (factory for ActiveKeyExchange).
pub trait SupportedKxGroup: CryptoSafe {
    fn name(&self) -> NamedGroup;

    /// Start a new key exchange, generating ephemeral keypair.
    /// The provided `buf` will be used to store the public key.
    fn start_exchange(&self, buf: Buf) -> Result<Box<dyn ActiveKeyExchange>, String>;
}

/// Signature verification against certificates.
pub trait SignatureVerifier: CryptoSafe {
    /// Verify a signature on data using a DER-encoded X.509 certificate.
    fn verify_signature(
        &self,
        cert_der: &[u8],
        data: &[u8],
        signature: &[u8],
        hash_alg: HashAlgorithm,
        sig_alg: SignatureAlgorithm,
    ) -> Result<(), String>;
}

/// Private key parser (factory for SigningKey).
pub trait KeyProvider: CryptoSafe {
    /// Parse and load a private key from DER/PEM bytes.
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String>;
}

pub trait SecureRandom: CryptoSafe {
    /// Fill buffer with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

/// Hash provider (factory for HashContext).
pub trait HashProvider: CryptoSafe {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn HashContext>, String>;
}

/// PRF (Pseudo-Random Function) for TLS 1.2 key derivation.
pub trait PrfProvider: CryptoSafe {
    /// TLS 1.2 PRF: PRF(secret, label, seed) writing output to `out`.
    /// Uses `scratch` for temporary concatenation of label+seed.
    #[allow(clippy::too_many_arguments)]
    fn prf_tls12(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
        scratch: &mut Buf,
        hash: HashAlgorithm,
    ) -> Result<(), String>;
}

pub trait HmacProvider: CryptoSafe {
    /// Compute HMAC-SHA256(key, data).
    fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> Result<[u8; 32], String>;
}

// ============================================================================
// Core Provider Struct
// ============================================================================

/// Cryptographic provider for DTLS operations.
///
/// The provider uses static trait object references so it is cheap to
/// clone into every [`Config`](crate::Config).
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Supported key exchange groups, in preference order.
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],

    pub signature_verification: &'static dyn SignatureVerifier,

    pub key_provider: &'static dyn KeyProvider,

    pub secure_random: &'static dyn SecureRandom,

    /// Hash provider for the handshake transcript.
    pub hash_provider: &'static dyn HashProvider,

    /// HMAC provider, used for HelloVerifyRequest cookies.
    pub hmac_provider: &'static dyn HmacProvider,

    pub cipher_suites: &'static [&'static dyn SupportedCipherSuite],

    pub prf_provider: &'static dyn PrfProvider,
}

static DEFAULT: OnceLock<CryptoProvider> = OnceLock::new();

impl CryptoProvider {
    /// Install a default crypto provider for the process.
    ///
    /// Used by [`Config::builder()`](crate::Config::builder) when no explicit
    /// provider is given.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn install_default(provider: CryptoProvider) {
        DEFAULT
            .set(provider)
            .expect("CryptoProvider::install_default() called more than once");
    }

    /// The installed default, if any.
    pub fn get_default() -> Option<&'static CryptoProvider> {
        DEFAULT.get()
    }

    pub fn find_cipher_suite(&self, suite: CipherSuite) -> Option<&'static dyn SupportedCipherSuite> {
        self.cipher_suites.iter().copied().find(|cs| cs.suite() == suite)
    }

    pub fn find_kx_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups.iter().copied().find(|g| g.name() == group)
    }

    /// Named groups in preference order, as offered in supported_groups.
    pub fn supported_groups(&self) -> impl Iterator<Item = NamedGroup> + '_ {
        self.kx_groups.iter().map(|g| g.name())
    }

    /// Fill `out` from the provider's secure random source.
    pub(crate) fn fill_random(&self, out: &mut [u8]) -> Result<(), crate::Error> {
        self.secure_random
            .fill(out)
            .map_err(crate::Error::CryptoError)
    }
}
