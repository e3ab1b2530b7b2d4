use nom::error::{Error, ErrorKind};
use nom::IResult;

use super::Cookie;
use crate::buffer::Buf;
use crate::types::ProtocolVersion;
use crate::util::{all_consumed, opaque8};

#[derive(Debug, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub server_version: ProtocolVersion,
    pub cookie: Cookie,
}

impl HelloVerifyRequest {
    pub fn new(server_version: ProtocolVersion, cookie: Cookie) -> Self {
        HelloVerifyRequest {
            server_version,
            cookie,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloVerifyRequest> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, cookie) = opaque8(input)?;
        let (input, _) = all_consumed(input)?;

        if cookie.is_empty() {
            return Err(nom::Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }

        Ok((
            input,
            HelloVerifyRequest {
                server_version,
                cookie: cookie.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.server_version.serialize(output);
        output.push(self.cookie.len() as u8);
        output.extend_from_slice(&self.cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0xFE, 0xFF, // ProtocolVersion::DTLS1_0
        0x01, // Cookie length
        0xBB, // Cookie
    ];

    #[test]
    fn roundtrip() {
        let hvr = HelloVerifyRequest::new(ProtocolVersion::DTLS1_0, vec![0xBB]);

        let mut serialized = Buf::new();
        hvr.serialize(&mut serialized);
        assert_eq!(&*serialized, MESSAGE);

        let (rest, parsed) = HelloVerifyRequest::parse(&serialized).unwrap();
        assert_eq!(parsed, hvr);
        assert!(rest.is_empty());
    }

    #[test]
    fn empty_cookie() {
        let message: &[u8] = &[0xFE, 0xFF, 0x00];
        assert!(HelloVerifyRequest::parse(message).is_err());
    }

    #[test]
    fn cookie_too_long() {
        let mut message = MESSAGE.to_vec();
        message[2] = 0xFF;
        assert!(HelloVerifyRequest::parse(&message).is_err());
    }
}
