use nom::multi::many0;
use nom::number::complete::be_u8;
use nom::IResult;

use super::extension::parse_signature_algorithms;
use crate::buffer::Buf;
use crate::types::{ClientCertificateType, SignatureAndHashAlgorithm};
use crate::util::{all_consumed, opaque16, opaque24, opaque8};

/// `ASN.1Cert certificate_list<0..2^24-1>`, end-entity first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Certificate {
    pub certificate_list: Vec<Vec<u8>>,
}

impl Certificate {
    pub fn new(certificate_list: Vec<Vec<u8>>) -> Self {
        Certificate { certificate_list }
    }

    pub fn is_empty(&self) -> bool {
        self.certificate_list.is_empty()
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Certificate> {
        let (input, list) = opaque24(input)?;
        let (rest, certs) = many0(opaque24)(list)?;
        all_consumed(rest)?;
        let (input, _) = all_consumed(input)?;
        Ok((
            input,
            Certificate {
                certificate_list: certs.into_iter().map(|c| c.to_vec()).collect(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        let total: usize = self.certificate_list.iter().map(|c| 3 + c.len()).sum();
        output.push_u24(total as u32);
        for cert in &self.certificate_list {
            output.push_u24(cert.len() as u32);
            output.extend_from_slice(cert);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub certificate_types: Vec<ClientCertificateType>,
    pub supported_signature_algorithms: Vec<SignatureAndHashAlgorithm>,
    /// DER encoded distinguished names.
    pub certificate_authorities: Vec<Vec<u8>>,
}

impl CertificateRequest {
    pub fn parse(input: &[u8]) -> IResult<&[u8], CertificateRequest> {
        let (input, types) = opaque8(input)?;
        let (input, supported_signature_algorithms) = parse_signature_algorithms(input)?;
        let (input, authorities) = opaque16(input)?;
        let (rest, names) = many0(opaque16)(authorities)?;
        all_consumed(rest)?;
        let (input, _) = all_consumed(input)?;

        Ok((
            input,
            CertificateRequest {
                certificate_types: types
                    .iter()
                    .map(|t| ClientCertificateType::from_u8(*t))
                    .collect(),
                supported_signature_algorithms,
                certificate_authorities: names.into_iter().map(|n| n.to_vec()).collect(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.certificate_types.len() as u8);
        for t in &self.certificate_types {
            output.push(t.as_u8());
        }
        output.push_u16((self.supported_signature_algorithms.len() * 2) as u16);
        for alg in &self.supported_signature_algorithms {
            output.push_u16(alg.as_u16());
        }
        let total: usize = self
            .certificate_authorities
            .iter()
            .map(|n| 2 + n.len())
            .sum();
        output.push_u16(total as u16);
        for name in &self.certificate_authorities {
            output.push_u16(name.len() as u16);
            output.extend_from_slice(name);
        }
    }
}

/// `CertificateStatus` carrying an OCSP response (rfc6066).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateStatus {
    pub ocsp_response: Vec<u8>,
}

impl CertificateStatus {
    const STATUS_TYPE_OCSP: u8 = 1;

    pub fn parse(input: &[u8]) -> IResult<&[u8], CertificateStatus> {
        let (input, status_type) = be_u8(input)?;
        if status_type != Self::STATUS_TYPE_OCSP {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
        let (input, response) = opaque24(input)?;
        let (input, _) = all_consumed(input)?;
        Ok((
            input,
            CertificateStatus {
                ocsp_response: response.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(Self::STATUS_TYPE_OCSP);
        output.push_u24(self.ocsp_response.len() as u32);
        output.extend_from_slice(&self.ocsp_response);
    }
}
