//! Key exchange and signature bodies.

use nom::number::complete::{be_u16, be_u32, be_u8};
use nom::IResult;

use crate::buffer::Buf;
use crate::types::{NamedGroup, SignatureAndHashAlgorithm, CURVE_TYPE_NAMED_CURVE};
use crate::util::{all_consumed, opaque16, opaque8};

/// A signature with its algorithm pair (RFC 5246 4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitallySigned {
    pub algorithm: SignatureAndHashAlgorithm,
    pub signature: Vec<u8>,
}

impl DigitallySigned {
    pub fn parse(input: &[u8]) -> IResult<&[u8], DigitallySigned> {
        let (input, algorithm) = SignatureAndHashAlgorithm::parse(input)?;
        let (input, signature) = opaque16(input)?;
        Ok((
            input,
            DigitallySigned {
                algorithm,
                signature: signature.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push_u16(self.algorithm.as_u16());
        output.push_u16(self.signature.len() as u16);
        output.extend_from_slice(&self.signature);
    }
}

/// `ServerECDHParams` with a named curve (rfc8422).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdheParams {
    pub group: NamedGroup,
    pub public_key: Vec<u8>,
}

impl EcdheParams {
    pub fn parse(input: &[u8]) -> IResult<&[u8], EcdheParams> {
        let (input, curve_type) = be_u8(input)?;
        if curve_type != CURVE_TYPE_NAMED_CURVE {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
        let (input, group) = NamedGroup::parse(input)?;
        let (input, public_key) = opaque8(input)?;
        Ok((
            input,
            EcdheParams {
                group,
                public_key: public_key.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(CURVE_TYPE_NAMED_CURVE);
        output.push_u16(self.group.as_u16());
        output.push(self.public_key.len() as u8);
        output.extend_from_slice(&self.public_key);
    }
}

/// ServerKeyExchange for ECDHE_ECDSA: the params followed by a signature
/// over `client_random || server_random || params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEcdheParams {
    pub params: EcdheParams,
    pub signed: DigitallySigned,
}

impl SignedEcdheParams {
    pub fn parse(input: &[u8]) -> IResult<&[u8], SignedEcdheParams> {
        let (input, params) = EcdheParams::parse(input)?;
        let (input, signed) = DigitallySigned::parse(input)?;
        let (input, _) = all_consumed(input)?;
        Ok((input, SignedEcdheParams { params, signed }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.params.serialize(output);
        self.signed.serialize(output);
    }
}

/// `opaque psk_identity_hint<0..2^16-1>` / `opaque psk_identity<0..2^16-1>`
pub fn parse_psk_identity(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, identity) = opaque16(input)?;
    let (input, _) = all_consumed(input)?;
    Ok((input, identity))
}

pub fn serialize_psk_identity(identity: &[u8], output: &mut Buf) {
    output.push_u16(identity.len() as u16);
    output.extend_from_slice(identity);
}

/// `opaque point <1..2^8-1>` of an ECDHE ClientKeyExchange.
pub fn parse_ecdh_public(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, point) = opaque8(input)?;
    let (input, _) = all_consumed(input)?;
    if point.is_empty() {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::LengthValue,
        )));
    }
    Ok((input, point))
}

pub fn serialize_ecdh_public(point: &[u8], output: &mut Buf) {
    output.push(point.len() as u8);
    output.extend_from_slice(point);
}

/// NewSessionTicket (rfc5077).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionTicket {
    pub ticket_lifetime_hint: u32,
    pub ticket: Vec<u8>,
}

impl NewSessionTicket {
    pub fn parse(input: &[u8]) -> IResult<&[u8], NewSessionTicket> {
        let (input, ticket_lifetime_hint) = be_u32(input)?;
        let (input, ticket) = opaque16(input)?;
        let (input, _) = all_consumed(input)?;
        Ok((
            input,
            NewSessionTicket {
                ticket_lifetime_hint,
                ticket: ticket.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.ticket_lifetime_hint.to_be_bytes());
        output.push_u16(self.ticket.len() as u16);
        output.extend_from_slice(&self.ticket);
    }
}

/// The named group of a ServerKeyExchange, read without the signature.
pub(crate) fn peek_group(input: &[u8]) -> Option<NamedGroup> {
    let (input, _) = be_u8::<_, nom::error::Error<&[u8]>>(input).ok()?;
    let (_, group) = be_u16::<_, nom::error::Error<&[u8]>>(input).ok()?;
    Some(NamedGroup::from_u16(group))
}
