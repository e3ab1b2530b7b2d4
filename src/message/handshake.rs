use nom::number::complete::{be_u16, be_u24};
use nom::IResult;

use crate::buffer::Buf;
use crate::types::HandshakeType;

/// DTLS handshake message header (RFC 6347 4.2.2).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Header {
    pub msg_type: HandshakeType,
    pub length: u32,
    pub message_seq: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

impl Header {
    /// msg_type(1) + length(3) + message_seq(2) + fragment_offset(3) + fragment_length(3)
    pub const LEN: usize = 12;

    /// Header of a complete, unfragmented message.
    pub fn whole(msg_type: HandshakeType, message_seq: u16, length: u32) -> Self {
        Header {
            msg_type,
            length,
            message_seq,
            fragment_offset: 0,
            fragment_length: length,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, msg_type) = HandshakeType::parse(input)?;
        let (input, length) = be_u24(input)?;
        let (input, message_seq) = be_u16(input)?;
        let (input, fragment_offset) = be_u24(input)?;
        let (input, fragment_length) = be_u24(input)?;

        Ok((
            input,
            Header {
                msg_type,
                length,
                message_seq,
                fragment_offset,
                fragment_length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.msg_type.as_u8());
        output.push_u24(self.length);
        output.push_u16(self.message_seq);
        output.push_u24(self.fragment_offset);
        output.push_u24(self.fragment_length);
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment_offset > 0 || self.fragment_length < self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &[u8] = &[
        0x01, // client_hello
        0x00, 0x00, 0x30, // length
        0x00, 0x02, // message_seq
        0x00, 0x00, 0x10, // fragment_offset
        0x00, 0x00, 0x08, // fragment_length
    ];

    #[test]
    fn roundtrip() {
        let (rest, header) = Header::parse(HEADER).unwrap();
        assert!(rest.is_empty());
        assert_eq!(header.msg_type, HandshakeType::ClientHello);
        assert_eq!(header.length, 0x30);
        assert!(header.is_fragment());

        let mut out = Buf::new();
        header.serialize(&mut out);
        assert_eq!(&*out, HEADER);
    }

    #[test]
    fn whole_is_not_fragment() {
        assert!(!Header::whole(HandshakeType::Finished, 5, 12).is_fragment());
    }
}
