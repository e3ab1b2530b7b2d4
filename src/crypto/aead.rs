//! DTLS 1.2 AEAD record formatting types and constants.

use tinyvec::TinyVec;

use crate::types::{ContentType, ProtocolVersion};

/// Explicit nonce length for DTLS AEAD records.
///
/// The explicit nonce is transmitted with each record.
pub(crate) const DTLS_EXPLICIT_NONCE_LEN: usize = 8;

/// GCM authentication tag length.
pub(crate) const GCM_TAG_LEN: usize = 16;

/// Overhead per AEAD record (explicit nonce + tag).
pub(crate) const DTLS_AEAD_OVERHEAD: usize = DTLS_EXPLICIT_NONCE_LEN + GCM_TAG_LEN;

/// Fixed IV portion for DTLS AEAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Iv(pub [u8; 4]);

impl Iv {
    pub(crate) fn new(iv: &[u8]) -> Option<Self> {
        iv.try_into().ok().map(Self)
    }
}

/// Full AEAD nonce (fixed IV + explicit nonce).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub [u8; 12]);

impl Nonce {
    pub(crate) fn new(iv: Iv, explicit_nonce: &[u8; DTLS_EXPLICIT_NONCE_LEN]) -> Self {
        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(&iv.0);
        nonce[4..].copy_from_slice(explicit_nonce);
        Self(nonce)
    }
}

/// Additional Authenticated Data for DTLS records.
///
/// 13 bytes for plain records. Connection ID records (rfc9146) carry the
/// CID in the AAD and may spill to the heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aad(pub TinyVec<[u8; 32]>);

impl Aad {
    /// `seq_num(8) || type || version || length`, where `seq_num` is
    /// `epoch << 48 | sequence`.
    pub(crate) fn new(
        seq_no: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        length: u16,
    ) -> Self {
        let mut aad = TinyVec::new();
        aad.extend_from_slice(&seq_no.to_be_bytes());
        aad.push(content_type.as_u8());
        aad.extend_from_slice(&version.as_u16().to_be_bytes());
        aad.extend_from_slice(&length.to_be_bytes());
        Aad(aad)
    }

    /// AAD for a record using a connection ID.
    ///
    /// `0xff x 8 || tls12_cid || cid_len || tls12_cid || version || epoch ||
    /// seq48 || cid || length`
    pub(crate) fn new_cid(seq_no: u64, version: ProtocolVersion, cid: &[u8], length: u16) -> Self {
        let cid_type = ContentType::Tls12Cid.as_u8();
        let mut aad = TinyVec::new();
        aad.extend_from_slice(&[0xff; 8]);
        aad.push(cid_type);
        aad.push(cid.len() as u8);
        aad.push(cid_type);
        aad.extend_from_slice(&version.as_u16().to_be_bytes());
        aad.extend_from_slice(&seq_no.to_be_bytes());
        aad.extend_from_slice(cid);
        aad.extend_from_slice(&length.to_be_bytes());
        Aad(aad)
    }
}
