use nom::number::complete::be_u16;
use nom::IResult;

use super::{Cookie, Extensions, Random, SessionId};
use crate::buffer::Buf;
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion};
use crate::util::{all_consumed, opaque16, opaque8};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cookie: Cookie,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<CompressionMethod>,
    pub extensions: Extensions,
}

/// Offset of the cookie length byte in a ClientHello body.
fn cookie_offset(body: &[u8]) -> Result<usize, Error> {
    let session_id_offset = 2 + Random::LEN;
    let session_id_len = *body
        .get(session_id_offset)
        .ok_or_else(|| Error::decode_error("truncated ClientHello"))?;
    let offset = session_id_offset + 1 + session_id_len as usize;
    if offset >= body.len() {
        return Err(Error::decode_error("truncated ClientHello"));
    }
    Ok(offset)
}

impl ClientHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientHello> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cookie) = opaque8(input)?;

        let (input, suites) = opaque16(input)?;
        let mut cipher_suites = Vec::with_capacity(suites.len() / 2);
        let mut rest = suites;
        while !rest.is_empty() {
            let (r, suite) = CipherSuite::parse(rest)?;
            cipher_suites.push(suite);
            rest = r;
        }

        let (input, methods) = opaque8(input)?;
        let compression_methods = methods
            .iter()
            .map(|m| CompressionMethod::from_u8(*m))
            .collect();

        let (input, extensions) = Extensions::parse(input)?;
        let (input, _) = all_consumed(input)?;

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cookie: cookie.to_vec(),
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        output.push(self.cookie.len() as u8);
        output.extend_from_slice(&self.cookie);
        output.push_u16((self.cipher_suites.len() * 2) as u16);
        for suite in &self.cipher_suites {
            output.push_u16(suite.as_u16());
        }
        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }
        self.extensions.serialize(output);
    }

    /// Whether the offered suites include the renegotiation SCSV.
    pub fn offers_scsv(&self) -> bool {
        self.cipher_suites
            .contains(&CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV)
    }

    /// Copy of an encoded ClientHello body with `cookie` put in place of its
    /// (empty) cookie. The rest of the message is kept byte for byte.
    pub fn patch_cookie(body: &[u8], cookie: &[u8]) -> Result<Vec<u8>, Error> {
        let offset = cookie_offset(body)?;
        if body[offset] != 0 {
            return Err(Error::internal_error("ClientHello already carries a cookie"));
        }
        if cookie.len() > 255 {
            return Err(Error::illegal_parameter("cookie longer than 255 bytes"));
        }

        let mut patched = Vec::with_capacity(body.len() + cookie.len());
        patched.extend_from_slice(&body[..offset]);
        patched.push(cookie.len() as u8);
        patched.extend_from_slice(cookie);
        patched.extend_from_slice(&body[offset + 1..]);
        Ok(patched)
    }

    /// An encoded ClientHello body with its cookie field left out. This is
    /// the part of the message a cookie is bound to.
    pub fn without_cookie(body: &[u8]) -> Result<Vec<u8>, Error> {
        let offset = cookie_offset(body)?;
        let cookie_end = offset + 1 + body[offset] as usize;
        if cookie_end > body.len() {
            return Err(Error::decode_error("truncated ClientHello cookie"));
        }
        let mut out = Vec::with_capacity(body.len());
        out.extend_from_slice(&body[..offset]);
        out.extend_from_slice(&body[cookie_end..]);
        Ok(out)
    }
}

/// Read just the version of an encoded ClientHello.
pub(crate) fn client_version(body: &[u8]) -> Option<ProtocolVersion> {
    be_u16::<_, nom::error::Error<&[u8]>>(body)
        .ok()
        .map(|(_, v)| ProtocolVersion::from_u16(v))
}

/// Cookie of an encoded ClientHello.
pub(crate) fn cookie(body: &[u8]) -> Result<&[u8], Error> {
    let offset = cookie_offset(body)?;
    let (_, cookie) = opaque8(&body[offset..])?;
    Ok(cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello() -> ClientHello {
        let mut extensions = Extensions::new();
        extensions.add_extended_master_secret();
        ClientHello {
            client_version: ProtocolVersion::DTLS1_2,
            random: Random([3; 32]),
            session_id: SessionId::try_new(&[1, 2]).unwrap(),
            cookie: Vec::new(),
            cipher_suites: vec![
                CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
                CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV,
            ],
            compression_methods: vec![CompressionMethod::Null],
            extensions,
        }
    }

    #[test]
    fn roundtrip() {
        let ch = hello();
        let mut out = Buf::new();
        ch.serialize(&mut out);
        let (rest, parsed) = ClientHello::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, ch);
        assert!(parsed.offers_scsv());
        assert_eq!(client_version(&out), Some(ProtocolVersion::DTLS1_2));
    }

    #[test]
    fn patch_cookie_keeps_everything_else() {
        let ch = hello();
        let mut out = Buf::new();
        ch.serialize(&mut out);

        let patched = ClientHello::patch_cookie(&out, &[0xc0, 0x0c]).unwrap();

        // version, random, session id length and a 2 byte session id
        let offset = 2 + 32 + 1 + 2;
        assert_eq!(patched.len(), out.len() + 2);
        assert_eq!(&patched[..offset], &out[..offset]);
        assert_eq!(&patched[offset..offset + 3], &[2, 0xc0, 0x0c]);
        assert_eq!(&patched[offset + 3..], &out[offset + 1..]);

        let (_, parsed) = ClientHello::parse(&patched).unwrap();
        assert_eq!(parsed.cookie, vec![0xc0, 0x0c]);
        assert_eq!(parsed.cipher_suites, ch.cipher_suites);
        assert_eq!(parsed.extensions, ch.extensions);
        assert_eq!(cookie(&patched).unwrap(), &[0xc0, 0x0c]);

        // A second patch is refused
        assert!(ClientHello::patch_cookie(&patched, &[1]).is_err());

        // Cookie excluded views match
        assert_eq!(
            ClientHello::without_cookie(&patched).unwrap(),
            ClientHello::without_cookie(&out).unwrap()
        );
    }
}
