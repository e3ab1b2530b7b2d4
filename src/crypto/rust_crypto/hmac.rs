//! HMAC and the TLS 1.2 PRF using RustCrypto.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384};

use crate::buffer::Buf;
use crate::crypto::provider::{HmacProvider, PrfProvider};
use crate::types::HashAlgorithm;

/// P_hash from RFC 5246 section 5.
pub(super) fn p_hash(
    hash_alg: HashAlgorithm,
    secret: &[u8],
    full_seed: &[u8],
    out: &mut Buf,
    output_len: usize,
) -> Result<(), String> {
    match hash_alg {
        HashAlgorithm::SHA256 => p_hash_with::<Hmac<Sha256>>(secret, full_seed, out, output_len),
        HashAlgorithm::SHA384 => p_hash_with::<Hmac<Sha384>>(secret, full_seed, out, output_len),
        _ => Err(format!("Unsupported HMAC hash algorithm: {:?}", hash_alg)),
    }
}

fn p_hash_with<M: Mac + KeyInit + Clone>(
    secret: &[u8],
    seed: &[u8],
    out: &mut Buf,
    output_len: usize,
) -> Result<(), String> {
    let keyed = <M as Mac>::new_from_slice(secret)
        .map_err(|_| "Invalid HMAC key length".to_string())?;

    out.clear();

    // A(1) = HMAC(secret, seed)
    let mut a = keyed.clone().chain_update(seed).finalize().into_bytes();

    while out.len() < output_len {
        let block = keyed
            .clone()
            .chain_update(&a)
            .chain_update(seed)
            .finalize()
            .into_bytes();

        let take = (output_len - out.len()).min(block.len());
        out.extend_from_slice(&block[..take]);

        a = keyed.clone().chain_update(&a).finalize().into_bytes();
    }

    Ok(())
}

#[derive(Debug)]
pub(super) struct RustCryptoPrfProvider;

impl PrfProvider for RustCryptoPrfProvider {
    fn prf_tls12(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
        scratch: &mut Buf,
        hash: HashAlgorithm,
    ) -> Result<(), String> {
        if !label.is_ascii() {
            return Err("PRF label must be ASCII".to_string());
        }

        scratch.clear();
        scratch.extend_from_slice(label.as_bytes());
        scratch.extend_from_slice(seed);

        p_hash(hash, secret, scratch, out, output_len)
    }
}

#[derive(Debug)]
pub(super) struct RustCryptoHmacProvider;

impl HmacProvider for RustCryptoHmacProvider {
    fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> Result<[u8; 32], String> {
        let mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
            .map_err(|_| "Invalid HMAC key".to_string())?;
        let bytes = mac.chain_update(data).finalize().into_bytes();

        let mut output = [0u8; 32];
        output.copy_from_slice(&bytes);
        Ok(output)
    }
}

pub(super) static PRF_PROVIDER: RustCryptoPrfProvider = RustCryptoPrfProvider;

pub(super) static HMAC_PROVIDER: RustCryptoHmacProvider = RustCryptoHmacProvider;
