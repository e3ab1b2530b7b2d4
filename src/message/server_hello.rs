use nom::IResult;

use super::{Extensions, Random, SessionId};
use crate::buffer::Buf;
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion};
use crate::util::all_consumed;

use nom::number::complete::be_u8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub extensions: Extensions,
}

impl ServerHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ServerHello> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = be_u8(input)?;
        let (input, extensions) = Extensions::parse(input)?;
        let (input, _) = all_consumed(input)?;

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method: CompressionMethod::from_u8(compression_method),
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.server_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        output.push_u16(self.cipher_suite.as_u16());
        output.push(self.compression_method.as_u8());
        self.extensions.serialize(output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_without_extensions() {
        let sh = ServerHello {
            server_version: ProtocolVersion::DTLS1_2,
            random: Random([1; 32]),
            session_id: SessionId::try_new(&[7; 32]).unwrap(),
            cipher_suite: CipherSuite::PSK_AES128_GCM_SHA256,
            compression_method: CompressionMethod::Null,
            extensions: Extensions::new(),
        };
        let mut out = Buf::new();
        sh.serialize(&mut out);
        assert_eq!(out.len(), 2 + 32 + 33 + 2 + 1);
        let (_, parsed) = ServerHello::parse(&out).unwrap();
        assert_eq!(parsed, sh);
    }

    #[test]
    fn trailing_garbage_fails() {
        let sh = ServerHello {
            server_version: ProtocolVersion::DTLS1_2,
            random: Random([1; 32]),
            session_id: SessionId::empty(),
            cipher_suite: CipherSuite::PSK_AES128_GCM_SHA256,
            compression_method: CompressionMethod::Null,
            extensions: Extensions::new(),
        };
        let mut out = Buf::new();
        sh.serialize(&mut out);
        out.extend_from_slice(&[0, 2, 0]);
        assert!(ServerHello::parse(&out).is_err());
    }
}
