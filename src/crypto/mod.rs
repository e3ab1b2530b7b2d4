//! Cryptographic primitives behind the record layer and the handshake.
//!
//! Everything goes through a [`CryptoProvider`]. The default provider is
//! [`rust_crypto::default_provider`].

use std::ops::Deref;

mod aead;
mod cipher;
pub(crate) mod key_schedule;
pub mod provider;
pub mod rust_crypto;
mod validation;

pub use aead::{Aad, Nonce};
pub(crate) use aead::{Iv, DTLS_AEAD_OVERHEAD};

pub use cipher::{AeadCipher, DecodedRecord, NullCipher, TlsCipher};

pub use provider::{
    ActiveKeyExchange, Cipher, CryptoProvider, CryptoSafe, HashContext, HashProvider,
};
pub use provider::{HmacProvider, KeyProvider, PrfProvider};
pub use provider::{SecureRandom, SignatureVerifier, SigningKey};
pub use provider::{SupportedCipherSuite, SupportedKxGroup};

pub use crate::buffer::{Buf, TmpBuf};
pub use crate::types::{CipherSuite, HashAlgorithm, NamedGroup, SignatureAlgorithm};

impl Deref for Aad {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0[..]
    }
}

impl Deref for Nonce {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
