//! Cipher suite implementations using RustCrypto.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Key};

use crate::buffer::{Buf, TmpBuf};
use crate::crypto::provider::{Cipher, SupportedCipherSuite};
use crate::crypto::{Aad, Nonce};
use crate::types::{CipherSuite, HashAlgorithm};

/// AES-GCM cipher implementation using RustCrypto.
enum AesGcm {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl std::fmt::Debug for AesGcm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AesGcm::Aes128(_) => f.debug_tuple("AesGcm::Aes128").finish(),
            AesGcm::Aes256(_) => f.debug_tuple("AesGcm::Aes256").finish(),
        }
    }
}

impl AesGcm {
    fn new(key: &[u8]) -> Result<Self, String> {
        match key.len() {
            16 => {
                let key = Key::<Aes128Gcm>::from_slice(key);
                Ok(AesGcm::Aes128(Box::new(Aes128Gcm::new(key))))
            }
            32 => {
                let key = Key::<Aes256Gcm>::from_slice(key);
                Ok(AesGcm::Aes256(Box::new(Aes256Gcm::new(key))))
            }
            _ => Err(format!("Invalid key size for AES-GCM: {}", key.len())),
        }
    }
}

impl Cipher for AesGcm {
    fn encrypt(&mut self, data: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String> {
        let nonce = aes_gcm::Nonce::from_slice(&nonce.0);

        let result = match self {
            AesGcm::Aes128(cipher) => cipher.encrypt_in_place(nonce, &aad, data),
            AesGcm::Aes256(cipher) => cipher.encrypt_in_place(nonce, &aad, data),
        };

        result.map_err(|_| "AES-GCM encryption failed".to_string())
    }

    fn decrypt(&mut self, ciphertext: &mut TmpBuf, aad: Aad, nonce: Nonce) -> Result<(), String> {
        if ciphertext.len() < 16 {
            return Err(format!("Ciphertext too short: {}", ciphertext.len()));
        }

        let nonce = aes_gcm::Nonce::from_slice(&nonce.0);

        // decrypt_in_place strips the tag and shortens the buffer
        let result = match self {
            AesGcm::Aes128(cipher) => cipher.decrypt_in_place(nonce, &aad, ciphertext),
            AesGcm::Aes256(cipher) => cipher.decrypt_in_place(nonce, &aad, ciphertext),
        };

        result.map_err(|_| "AES-GCM decryption failed".to_string())
    }
}

/// An AES-GCM suite described by its code, PRF hash and key size.
#[derive(Debug)]
struct GcmSuite {
    suite: CipherSuite,
    hash: HashAlgorithm,
    key_len: usize,
}

impl SupportedCipherSuite for GcmSuite {
    fn suite(&self) -> CipherSuite {
        self.suite
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }

    fn key_lengths(&self) -> (usize, usize, usize) {
        (0, self.key_len, 4) // (mac_key_len, enc_key_len, fixed_iv_len)
    }

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        if key.len() != self.key_len {
            return Err(format!(
                "{:?} expects a {} byte key, got {}",
                self.suite,
                self.key_len,
                key.len()
            ));
        }
        Ok(Box::new(AesGcm::new(key)?))
    }
}

static ECDHE_ECDSA_AES128_GCM_SHA256: GcmSuite = GcmSuite {
    suite: CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
    hash: HashAlgorithm::SHA256,
    key_len: 16,
};

static ECDHE_ECDSA_AES256_GCM_SHA384: GcmSuite = GcmSuite {
    suite: CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384,
    hash: HashAlgorithm::SHA384,
    key_len: 32,
};

static PSK_AES128_GCM_SHA256: GcmSuite = GcmSuite {
    suite: CipherSuite::PSK_AES128_GCM_SHA256,
    hash: HashAlgorithm::SHA256,
    key_len: 16,
};

/// All supported cipher suites.
pub(super) static ALL_CIPHER_SUITES: &[&dyn SupportedCipherSuite] = &[
    &ECDHE_ECDSA_AES256_GCM_SHA384,
    &ECDHE_ECDSA_AES128_GCM_SHA256,
    &PSK_AES128_GCM_SHA256,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_and_open_in_place() {
        let key = [7u8; 16];
        let mut cipher = PSK_AES128_GCM_SHA256.create_cipher(&key).unwrap();
        let aad = Aad(tinyvec::TinyVec::from(&[1u8, 2, 3][..]));
        let nonce = Nonce([9; 12]);

        let mut data = Buf::from_slice(b"hello");
        cipher.encrypt(&mut data, aad.clone(), nonce).unwrap();
        assert_eq!(data.len(), 5 + 16);

        let mut raw = data.into_vec();
        let mut tmp = TmpBuf::new(&mut raw);
        cipher.decrypt(&mut tmp, aad, nonce).unwrap();
        assert_eq!(tmp.as_ref(), b"hello");
    }

    #[test]
    fn rejects_wrong_key_size() {
        assert!(ECDHE_ECDSA_AES256_GCM_SHA384.create_cipher(&[0; 16]).is_err());
    }
}
