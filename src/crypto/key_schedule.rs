//! TLS 1.2 key schedule (RFC 5246 section 6.3, 7.4.9 and 8.1, RFC 7627).

use zeroize::Zeroizing;

use crate::buffer::Buf;
use crate::crypto::aead::Iv;
use crate::crypto::cipher::{AeadCipher, AeadDirection};
use crate::crypto::provider::{CryptoProvider, SupportedCipherSuite};
use crate::types::{ConnectionEnd, HashAlgorithm};
use crate::Error;

pub(crate) const MASTER_SECRET_LEN: usize = 48;

/// PRF based derivations for one negotiated PRF hash.
pub(crate) struct KeySchedule<'a> {
    provider: &'a CryptoProvider,
    hash: HashAlgorithm,
}

impl<'a> KeySchedule<'a> {
    pub fn new(provider: &'a CryptoProvider, hash: HashAlgorithm) -> Self {
        Self { provider, hash }
    }

    fn prf(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        output_len: usize,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let mut out = Buf::with_capacity(output_len);
        let mut scratch = Buf::new();
        self.provider
            .prf_provider
            .prf_tls12(secret, label, seed, &mut out, output_len, &mut scratch, self.hash)
            .map_err(Error::CryptoError)?;
        Ok(Zeroizing::new(out.into_vec()))
    }

    /// master_secret = PRF(pre_master_secret, "master secret", client_random + server_random)
    pub fn master_secret(
        &self,
        pre_master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let seed = [client_random, server_random].concat();
        self.prf(pre_master_secret, "master secret", &seed, MASTER_SECRET_LEN)
    }

    /// master_secret = PRF(pre_master_secret, "extended master secret", session_hash)
    pub fn extended_master_secret(
        &self,
        pre_master_secret: &[u8],
        session_hash: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        self.prf(
            pre_master_secret,
            "extended master secret",
            session_hash,
            MASTER_SECRET_LEN,
        )
    }

    /// verify_data for the Finished message sent by `end`.
    pub fn verify_data(
        &self,
        master_secret: &[u8],
        end: ConnectionEnd,
        handshake_hash: &[u8],
        length: usize,
    ) -> Result<Vec<u8>, Error> {
        let label = match end {
            ConnectionEnd::Client => "client finished",
            ConnectionEnd::Server => "server finished",
        };
        let out = self.prf(master_secret, label, handshake_hash, length)?;
        Ok(out.to_vec())
    }

    /// Expand the key block and build the record cipher for `end`.
    ///
    /// `write_cid` is the connection ID the peer asked for, `read_cid` the
    /// one we asked for.
    #[allow(clippy::too_many_arguments)]
    pub fn record_cipher(
        &self,
        suite: &dyn SupportedCipherSuite,
        master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
        end: ConnectionEnd,
        write_cid: &[u8],
        read_cid: &[u8],
    ) -> Result<AeadCipher, Error> {
        let (mac_len, key_len, iv_len) = suite.key_lengths();
        let total = 2 * (mac_len + key_len + iv_len);

        let seed = [server_random, client_random].concat();
        let block = self.prf(master_secret, "key expansion", &seed, total)?;

        // client_write_MAC_key, server_write_MAC_key, client_write_key,
        // server_write_key, client_write_IV, server_write_IV
        let mut offset = 2 * mac_len;
        let client_key = &block[offset..offset + key_len];
        offset += key_len;
        let server_key = &block[offset..offset + key_len];
        offset += key_len;
        let client_iv = &block[offset..offset + iv_len];
        offset += iv_len;
        let server_iv = &block[offset..offset + iv_len];

        let (write_key, write_iv, read_key, read_iv) = match end {
            ConnectionEnd::Client => (client_key, client_iv, server_key, server_iv),
            ConnectionEnd::Server => (server_key, server_iv, client_key, client_iv),
        };

        let direction = |key: &[u8], iv: &[u8], cid: &[u8]| -> Result<AeadDirection, Error> {
            Ok(AeadDirection {
                cipher: suite.create_cipher(key).map_err(Error::CryptoError)?,
                iv: Iv::new(iv)
                    .ok_or_else(|| Error::CryptoError("fixed IV must be 4 bytes".into()))?,
                cid: cid.to_vec(),
            })
        };

        Ok(AeadCipher::new(
            direction(write_key, write_iv, write_cid)?,
            direction(read_key, read_iv, read_cid)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher::TlsCipher;
    use crate::crypto::rust_crypto;
    use crate::types::{CipherSuite, ContentType, ProtocolVersion};

    #[test]
    fn master_secret_length_and_determinism() {
        let provider = rust_crypto::default_provider();
        let ks = KeySchedule::new(&provider, HashAlgorithm::SHA256);
        let a = ks.master_secret(&[1; 32], &[2; 32], &[3; 32]).unwrap();
        let b = ks.master_secret(&[1; 32], &[2; 32], &[3; 32]).unwrap();
        assert_eq!(a.len(), MASTER_SECRET_LEN);
        assert_eq!(*a, *b);

        let ems = ks.extended_master_secret(&[1; 32], &[9; 32]).unwrap();
        assert_ne!(*a, *ems);
    }

    #[test]
    fn verify_data_differs_per_end() {
        let provider = rust_crypto::default_provider();
        let ks = KeySchedule::new(&provider, HashAlgorithm::SHA384);
        let c = ks.verify_data(&[5; 48], ConnectionEnd::Client, &[0; 48], 12).unwrap();
        let s = ks.verify_data(&[5; 48], ConnectionEnd::Server, &[0; 48], 12).unwrap();
        assert_eq!(c.len(), 12);
        assert_ne!(c, s);
    }

    #[test]
    fn client_and_server_ciphers_interoperate() {
        let provider = rust_crypto::default_provider();
        let suite = provider
            .find_cipher_suite(CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384)
            .unwrap();
        let ks = KeySchedule::new(&provider, suite.hash_algorithm());
        let master = [7u8; 48];

        let mut client = ks
            .record_cipher(suite, &master, &[1; 32], &[2; 32], ConnectionEnd::Client, &[], &[])
            .unwrap();
        let mut server = ks
            .record_cipher(suite, &master, &[1; 32], &[2; 32], ConnectionEnd::Server, &[], &[])
            .unwrap();

        let seq = 1u64 << 48;
        let mut out = Buf::new();
        let ty = client
            .encode_plaintext(seq, ContentType::Handshake, ProtocolVersion::DTLS1_2, b"fin", &mut out)
            .unwrap();
        let mut fragment = out.into_vec();
        let decoded = server
            .decode_ciphertext(seq, ty, ProtocolVersion::DTLS1_2, &mut fragment)
            .unwrap();
        assert_eq!(&fragment[decoded.range], b"fin");
    }
}
