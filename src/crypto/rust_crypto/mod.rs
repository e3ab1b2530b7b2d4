//! Default crypto provider built on the RustCrypto crates.
//!
//! - AES-GCM via `aes-gcm`
//! - ECDHE via `p256`, `p384` and `x25519-dalek`
//! - ECDSA via `p256`/`p384`, certificates parsed with `x509-cert`
//! - SHA-2 and HMAC via `sha2`/`hmac`

mod cipher_suite;
mod hash;
mod hmac;
mod kx_group;
mod random;
mod sign;

use crate::crypto::provider::CryptoProvider;

/// The RustCrypto backed provider.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: cipher_suite::ALL_CIPHER_SUITES,
        kx_groups: kx_group::ALL_KX_GROUPS,
        signature_verification: &sign::SIGNATURE_VERIFIER,
        key_provider: &sign::KEY_PROVIDER,
        secure_random: &random::SECURE_RANDOM,
        hash_provider: &hash::HASH_PROVIDER,
        prf_provider: &hmac::PRF_PROVIDER,
        hmac_provider: &hmac::HMAC_PROVIDER,
    }
}
