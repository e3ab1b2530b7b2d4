//! Record protection for one epoch.
//!
//! A [`TlsCipher`] turns record plaintext into the record fragment and back.
//! Epoch 0 uses [`NullCipher`]; every later epoch uses [`AeadCipher`] built
//! from the key block.

use std::fmt;
use std::ops::Range;

use crate::buffer::{Buf, TmpBuf};
use crate::crypto::aead::{Aad, Iv, Nonce, DTLS_AEAD_OVERHEAD, DTLS_EXPLICIT_NONCE_LEN, GCM_TAG_LEN};
use crate::crypto::provider::Cipher;
use crate::types::{AlertDescription, ContentType, ProtocolVersion};
use crate::Error;

/// Plaintext recovered from a record fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    /// Content type of the plaintext. Differs from the header type for
    /// connection ID records.
    pub content_type: ContentType,
    /// Position of the plaintext inside the decoded fragment buffer.
    pub range: Range<usize>,
}

/// Protection of record fragments for one direction pair of an epoch.
///
/// `seq_no` is always the 64-bit `epoch << 48 | sequence` value.
pub trait TlsCipher: Send + fmt::Debug {
    /// Largest plaintext that decodes from a fragment of `ciphertext_limit` bytes.
    fn plaintext_decode_limit(&self, ciphertext_limit: usize) -> usize;

    /// Largest plaintext that encodes into at most `ciphertext_limit` bytes.
    fn plaintext_encode_limit(&self, ciphertext_limit: usize) -> usize;

    /// Encode `plaintext` into `out` (the record fragment). Returns the
    /// content type to write in the record header.
    fn encode_plaintext(
        &mut self,
        seq_no: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        plaintext: &[u8],
        out: &mut Buf,
    ) -> Result<ContentType, Error>;

    /// Decode the record fragment in place. Any error means the record must
    /// be discarded.
    fn decode_ciphertext(
        &mut self,
        seq_no: u64,
        record_type: ContentType,
        version: ProtocolVersion,
        fragment: &mut [u8],
    ) -> Result<DecodedRecord, Error>;

    /// Whether records written by this cipher carry a connection ID.
    fn uses_write_cid(&self) -> bool {
        false
    }
}

/// Pass-through protection used before keys are established.
#[derive(Debug, Default)]
pub struct NullCipher;

impl TlsCipher for NullCipher {
    fn plaintext_decode_limit(&self, ciphertext_limit: usize) -> usize {
        ciphertext_limit
    }

    fn plaintext_encode_limit(&self, ciphertext_limit: usize) -> usize {
        ciphertext_limit
    }

    fn encode_plaintext(
        &mut self,
        _seq_no: u64,
        content_type: ContentType,
        _version: ProtocolVersion,
        plaintext: &[u8],
        out: &mut Buf,
    ) -> Result<ContentType, Error> {
        out.clear();
        out.extend_from_slice(plaintext);
        Ok(content_type)
    }

    fn decode_ciphertext(
        &mut self,
        _seq_no: u64,
        record_type: ContentType,
        _version: ProtocolVersion,
        fragment: &mut [u8],
    ) -> Result<DecodedRecord, Error> {
        Ok(DecodedRecord {
            content_type: record_type,
            range: 0..fragment.len(),
        })
    }
}

/// One direction of an AEAD protected epoch.
pub struct AeadDirection {
    pub(crate) cipher: Box<dyn Cipher>,
    pub(crate) iv: Iv,
    /// Connection ID carried by records in this direction. Empty for none.
    pub(crate) cid: Vec<u8>,
}

impl fmt::Debug for AeadDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadDirection")
            .field("cid_len", &self.cid.len())
            .finish_non_exhaustive()
    }
}

/// AES-GCM record protection with an 8 byte explicit nonce (rfc5288), and
/// the rfc9146 inner plaintext when a connection ID is in use.
#[derive(Debug)]
pub struct AeadCipher {
    write: AeadDirection,
    read: AeadDirection,
}

impl AeadCipher {
    pub(crate) fn new(write: AeadDirection, read: AeadDirection) -> Self {
        Self { write, read }
    }

    fn cid_overhead(cid: &[u8]) -> usize {
        // Inner plaintext carries the real content type.
        if cid.is_empty() {
            0
        } else {
            1
        }
    }
}

impl TlsCipher for AeadCipher {
    fn plaintext_decode_limit(&self, ciphertext_limit: usize) -> usize {
        ciphertext_limit
            .saturating_sub(DTLS_AEAD_OVERHEAD)
            .saturating_sub(Self::cid_overhead(&self.read.cid))
    }

    fn plaintext_encode_limit(&self, ciphertext_limit: usize) -> usize {
        ciphertext_limit
            .saturating_sub(DTLS_AEAD_OVERHEAD)
            .saturating_sub(Self::cid_overhead(&self.write.cid))
    }

    fn encode_plaintext(
        &mut self,
        seq_no: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        plaintext: &[u8],
        out: &mut Buf,
    ) -> Result<ContentType, Error> {
        let explicit_nonce = seq_no.to_be_bytes();
        let nonce = Nonce::new(self.write.iv, &explicit_nonce);

        let mut body = Buf::with_capacity(plaintext.len() + DTLS_AEAD_OVERHEAD + 1);
        body.extend_from_slice(plaintext);

        let (record_type, aad) = if self.write.cid.is_empty() {
            let aad = Aad::new(seq_no, content_type, version, plaintext.len() as u16);
            (content_type, aad)
        } else {
            body.push(content_type.as_u8());
            let aad = Aad::new_cid(seq_no, version, &self.write.cid, body.len() as u16);
            (ContentType::Tls12Cid, aad)
        };

        self.write
            .cipher
            .encrypt(&mut body, aad, nonce)
            .map_err(|e| Error::internal_error(format!("record encryption failed: {e}")))?;

        out.clear();
        out.extend_from_slice(&explicit_nonce);
        out.extend_from_slice(&body);

        Ok(record_type)
    }

    fn decode_ciphertext(
        &mut self,
        seq_no: u64,
        record_type: ContentType,
        version: ProtocolVersion,
        fragment: &mut [u8],
    ) -> Result<DecodedRecord, Error> {
        let uses_cid = record_type == ContentType::Tls12Cid;
        if uses_cid == self.read.cid.is_empty() {
            return Err(Error::alert(
                AlertDescription::BadRecordMac,
                "connection id use does not match negotiation",
            ));
        }

        let min_len = DTLS_AEAD_OVERHEAD + Self::cid_overhead(&self.read.cid);
        if fragment.len() < min_len {
            return Err(Error::decode_error("record fragment shorter than AEAD overhead"));
        }

        let (explicit, ciphertext) = fragment.split_at_mut(DTLS_EXPLICIT_NONCE_LEN);
        let mut explicit_nonce = [0u8; DTLS_EXPLICIT_NONCE_LEN];
        explicit_nonce.copy_from_slice(explicit);
        let nonce = Nonce::new(self.read.iv, &explicit_nonce);

        let plaintext_len = (ciphertext.len() - GCM_TAG_LEN) as u16;
        let aad = if uses_cid {
            Aad::new_cid(seq_no, version, &self.read.cid, plaintext_len)
        } else {
            Aad::new(seq_no, record_type, version, plaintext_len)
        };

        let mut tmp = TmpBuf::new(ciphertext);
        self.read
            .cipher
            .decrypt(&mut tmp, aad, nonce)
            .map_err(|e| Error::alert(AlertDescription::BadRecordMac, e))?;
        let decrypted_len = tmp.len();

        let start = DTLS_EXPLICIT_NONCE_LEN;
        let mut end = start + decrypted_len;

        if !uses_cid {
            return Ok(DecodedRecord {
                content_type: record_type,
                range: start..end,
            });
        }

        // DTLSInnerPlaintext: content || type || zeros
        while end > start && fragment[end - 1] == 0 {
            end -= 1;
        }
        if end == start {
            return Err(Error::unexpected_message("inner plaintext without content type"));
        }
        end -= 1;

        Ok(DecodedRecord {
            content_type: ContentType::from_u8(fragment[end]),
            range: start..end,
        })
    }

    fn uses_write_cid(&self) -> bool {
        !self.write.cid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto;
    use crate::types::CipherSuite;

    fn direction(key: u8, iv: u8, cid: &[u8]) -> AeadDirection {
        let provider = rust_crypto::default_provider();
        let suite = provider
            .find_cipher_suite(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256)
            .unwrap();
        AeadDirection {
            cipher: suite.create_cipher(&[key; 16]).unwrap(),
            iv: Iv([iv; 4]),
            cid: cid.to_vec(),
        }
    }

    /// A pair of ciphers for two peers, where a's write matches b's read.
    fn pair(a_cid: &[u8], b_cid: &[u8]) -> (AeadCipher, AeadCipher) {
        // a writes with the cid b asked for and reads with its own
        let a = AeadCipher::new(direction(1, 2, b_cid), direction(3, 4, a_cid));
        let b = AeadCipher::new(direction(3, 4, a_cid), direction(1, 2, b_cid));
        (a, b)
    }

    #[test]
    fn aead_round_trip() {
        let (mut a, mut b) = pair(&[], &[]);
        let seq = (1u64 << 48) | 5;
        let mut out = Buf::new();
        let ty = a
            .encode_plaintext(seq, ContentType::ApplicationData, ProtocolVersion::DTLS1_2, b"ping", &mut out)
            .unwrap();
        assert_eq!(ty, ContentType::ApplicationData);
        assert_eq!(out.len(), 4 + DTLS_AEAD_OVERHEAD);

        let mut fragment = out.into_vec();
        let decoded = b
            .decode_ciphertext(seq, ty, ProtocolVersion::DTLS1_2, &mut fragment)
            .unwrap();
        assert_eq!(decoded.content_type, ContentType::ApplicationData);
        assert_eq!(&fragment[decoded.range], b"ping");
    }

    #[test]
    fn wrong_sequence_fails_authentication() {
        let (mut a, mut b) = pair(&[], &[]);
        let mut out = Buf::new();
        a.encode_plaintext(1 << 48, ContentType::Handshake, ProtocolVersion::DTLS1_2, b"x", &mut out)
            .unwrap();
        let mut fragment = out.into_vec();
        let err = b
            .decode_ciphertext((1 << 48) | 1, ContentType::Handshake, ProtocolVersion::DTLS1_2, &mut fragment)
            .unwrap_err();
        assert_eq!(err.alert_description(), Some(AlertDescription::BadRecordMac));
    }

    #[test]
    fn connection_id_inner_plaintext() {
        let (mut a, mut b) = pair(&[0xa1], &[0xb1, 0xb2]);
        assert!(a.uses_write_cid());
        let seq = 1u64 << 48;
        let mut out = Buf::new();
        let ty = a
            .encode_plaintext(seq, ContentType::Alert, ProtocolVersion::DTLS1_2, &[1, 0], &mut out)
            .unwrap();
        assert_eq!(ty, ContentType::Tls12Cid);
        assert_eq!(out.len(), 2 + 1 + DTLS_AEAD_OVERHEAD);

        let mut fragment = out.into_vec();
        let decoded = b
            .decode_ciphertext(seq, ty, ProtocolVersion::DTLS1_2, &mut fragment)
            .unwrap();
        assert_eq!(decoded.content_type, ContentType::Alert);
        assert_eq!(&fragment[decoded.range], &[1, 0]);
    }

    #[test]
    fn null_cipher_passes_through() {
        let mut c = NullCipher;
        let mut out = Buf::new();
        let ty = c
            .encode_plaintext(0, ContentType::Handshake, ProtocolVersion::DTLS1_0, b"abc", &mut out)
            .unwrap();
        assert_eq!(ty, ContentType::Handshake);
        let mut fragment = out.into_vec();
        let decoded = c
            .decode_ciphertext(0, ty, ProtocolVersion::DTLS1_0, &mut fragment)
            .unwrap();
        assert_eq!(decoded.range, 0..3);
        assert_eq!(c.plaintext_encode_limit(100), 100);
    }
}
