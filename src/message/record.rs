//! DTLS 1.2 record header, with the rfc9146 connection ID form.

use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::buffer::Buf;
use crate::types::{ContentType, ProtocolVersion};
use crate::util::be_u48;

/// Header length without a connection ID:
/// content_type(1) + version(2) + epoch(2) + seq(6) + length(2)
pub const RECORD_HEADER_LEN: usize = 13;

/// Largest fragment of a DTLSCiphertext (2^14 + 2048).
pub const MAX_FRAGMENT_LEN: usize = (1 << 14) + 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub epoch: u16,
    pub sequence_number: u64,
    /// Connection ID, only present on `tls12_cid` records.
    pub cid: Vec<u8>,
    pub length: u16,
}

impl RecordHeader {
    /// Parse a record header. `cid_len` is the length of the connection ID
    /// we expect on `tls12_cid` records.
    pub fn parse(input: &[u8], cid_len: usize) -> IResult<&[u8], RecordHeader> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, epoch) = be_u16(input)?;
        let (input, sequence_number) = be_u48(input)?;
        let (input, cid) = if content_type == ContentType::Tls12Cid {
            take(cid_len)(input)?
        } else {
            (input, &input[..0])
        };
        let (input, length) = be_u16(input)?;

        Ok((
            input,
            RecordHeader {
                content_type,
                version,
                epoch,
                sequence_number,
                cid: cid.to_vec(),
                length,
            },
        ))
    }

    pub fn header_len(&self) -> usize {
        RECORD_HEADER_LEN + self.cid.len()
    }

    /// `epoch << 48 | sequence_number`, used for MACs and nonces.
    pub fn seq_no(&self) -> u64 {
        ((self.epoch as u64) << 48) | self.sequence_number
    }

    /// Write a header. A non-empty `cid` is only valid for `tls12_cid` records.
    pub fn write(
        output: &mut Buf,
        content_type: ContentType,
        version: ProtocolVersion,
        epoch: u16,
        sequence_number: u64,
        cid: &[u8],
        length: u16,
    ) {
        output.push(content_type.as_u8());
        version.serialize(output);
        output.extend_from_slice(&epoch.to_be_bytes());
        output.extend_from_slice(&sequence_number.to_be_bytes()[2..]);
        output.extend_from_slice(cid);
        output.extend_from_slice(&length.to_be_bytes());
    }
}

/// Total length of the first record in `buf`, if its header is complete.
///
/// `cid_len` is the connection ID length of `tls12_cid` records.
pub fn record_len(buf: &[u8], cid_len: usize) -> Option<usize> {
    let header_len = if buf.first() == Some(&ContentType::Tls12Cid.as_u8()) {
        RECORD_HEADER_LEN + cid_len
    } else {
        RECORD_HEADER_LEN
    };
    if buf.len() < header_len {
        return None;
    }
    let length = u16::from_be_bytes([buf[header_len - 2], buf[header_len - 1]]) as usize;
    Some(header_len + length)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &[u8] = &[
        0x16, // ContentType::Handshake
        0xFE, 0xFD, // ProtocolVersion::DTLS1_2
        0x00, 0x01, // epoch
        0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // sequence_number
        0x00, 0x02, // length
        0xAA, 0xBB, // fragment
    ];

    #[test]
    fn parse_plain_header() {
        let (rest, header) = RecordHeader::parse(RECORD, 4).unwrap();
        assert_eq!(rest, &[0xAA, 0xBB]);
        assert_eq!(header.content_type, ContentType::Handshake);
        assert_eq!(header.epoch, 1);
        assert_eq!(header.seq_no(), (1 << 48) | 1);
        assert!(header.cid.is_empty());
        assert_eq!(record_len(RECORD, 4), Some(15));
    }

    #[test]
    fn write_then_parse_cid_header() {
        let mut out = Buf::new();
        RecordHeader::write(
            &mut out,
            ContentType::Tls12Cid,
            ProtocolVersion::DTLS1_2,
            1,
            9,
            &[1, 2, 3],
            0,
        );
        assert_eq!(out.len(), RECORD_HEADER_LEN + 3);
        let (_, header) = RecordHeader::parse(&out, 3).unwrap();
        assert_eq!(header.cid, vec![1, 2, 3]);
        assert_eq!(header.header_len(), 16);
        assert_eq!(record_len(&out, 3), Some(16));
    }

    #[test]
    fn short_header_has_no_length() {
        assert_eq!(record_len(&RECORD[..12], 0), None);
    }
}
