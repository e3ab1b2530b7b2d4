//! Hello extensions.
//!
//! Extensions are kept as raw `(type, data)` pairs in wire order; typed
//! accessors decode the ones the handshake understands.

use nom::multi::many0;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::buffer::Buf;
use crate::types::{ExtensionType, HeartbeatMode, MaxFragmentLength};
use crate::types::{NamedGroup, SignatureAndHashAlgorithm};
use crate::util::{all_consumed, opaque16, opaque8};
use crate::Error;

/// `status_request` asking for OCSP with no responder ids or extensions.
const OCSP_STATUS_REQUEST: &[u8] = &[1, 0, 0, 0, 0];

/// `ec_point_formats` with only `uncompressed`.
const EC_POINT_FORMATS_UNCOMPRESSED: &[u8] = &[1, 0];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub extension_type: ExtensionType,
    pub data: Vec<u8>,
}

impl Extension {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Extension> {
        let (input, extension_type) = be_u16(input)?;
        let (input, data) = opaque16(input)?;
        Ok((
            input,
            Extension {
                extension_type: ExtensionType::from_u16(extension_type),
                data: data.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push_u16(self.extension_type.as_u16());
        output.push_u16(self.data.len() as u16);
        output.extend_from_slice(&self.data);
    }
}

/// Run `parser` over the whole of `data`.
fn decode_all<'a, T>(
    data: &'a [u8],
    parser: impl Fn(&'a [u8]) -> IResult<&'a [u8], T>,
) -> Result<T, Error> {
    let (rest, value) = parser(data)?;
    all_consumed(rest)?;
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extensions(Vec<Extension>);

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the optional extensions block at the end of a hello.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Extensions> {
        if input.is_empty() {
            return Ok((input, Extensions::new()));
        }
        let (input, block) = opaque16(input)?;
        let (rest, list) = many0(Extension::parse)(block)?;
        all_consumed(rest)?;
        Ok((input, Extensions(list)))
    }

    /// Write the extensions block. Nothing is written when empty.
    pub fn serialize(&self, output: &mut Buf) {
        if self.0.is_empty() {
            return;
        }
        let mut block = Buf::new();
        for ext in &self.0 {
            ext.serialize(&mut block);
        }
        output.push_u16(block.len() as u16);
        output.extend_from_slice(&block);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.0.iter()
    }

    pub fn push(&mut self, extension_type: ExtensionType, data: Vec<u8>) {
        self.0.push(Extension {
            extension_type,
            data,
        });
    }

    pub fn get(&self, extension_type: ExtensionType) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|e| e.extension_type == extension_type)
            .map(|e| e.data.as_slice())
    }

    pub fn contains(&self, extension_type: ExtensionType) -> bool {
        self.get(extension_type).is_some()
    }

    /// The same extension type must not appear twice in one hello.
    pub fn check_no_duplicates(&self) -> Result<(), Error> {
        for (i, ext) in self.0.iter().enumerate() {
            if self.0[..i]
                .iter()
                .any(|e| e.extension_type == ext.extension_type)
            {
                return Err(Error::illegal_parameter(format!(
                    "repeated extension {:?}",
                    ext.extension_type
                )));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    pub fn add_supported_groups(&mut self, groups: impl IntoIterator<Item = NamedGroup>) {
        let mut list = Buf::new();
        for g in groups {
            list.push_u16(g.as_u16());
        }
        let mut data = Buf::new();
        data.push_u16(list.len() as u16);
        data.extend_from_slice(&list);
        self.push(ExtensionType::SupportedGroups, data.into_vec());
    }

    pub fn add_ec_point_formats(&mut self) {
        self.push(
            ExtensionType::EcPointFormats,
            EC_POINT_FORMATS_UNCOMPRESSED.to_vec(),
        );
    }

    pub fn add_signature_algorithms(&mut self, algorithms: &[SignatureAndHashAlgorithm]) {
        let mut data = Buf::new();
        data.push_u16((algorithms.len() * 2) as u16);
        for alg in algorithms {
            data.push_u16(alg.as_u16());
        }
        self.push(ExtensionType::SignatureAlgorithms, data.into_vec());
    }

    pub fn add_heartbeat(&mut self, mode: HeartbeatMode) {
        self.push(ExtensionType::Heartbeat, vec![mode.as_u8()]);
    }

    pub fn add_max_fragment_length(&mut self, max: MaxFragmentLength) {
        self.push(ExtensionType::MaxFragmentLength, vec![max.as_u8()]);
    }

    pub fn add_connection_id(&mut self, cid: &[u8]) {
        let mut data = vec![cid.len() as u8];
        data.extend_from_slice(cid);
        self.push(ExtensionType::ConnectionId, data);
    }

    pub fn add_renegotiation_info(&mut self, renegotiated_connection: &[u8]) {
        let mut data = vec![renegotiated_connection.len() as u8];
        data.extend_from_slice(renegotiated_connection);
        self.push(ExtensionType::RenegotiationInfo, data);
    }

    pub fn add_extended_master_secret(&mut self) {
        self.push(ExtensionType::ExtendedMasterSecret, Vec::new());
    }

    pub fn add_status_request_ocsp(&mut self) {
        self.push(ExtensionType::StatusRequest, OCSP_STATUS_REQUEST.to_vec());
    }

    /// Empty for a ServerHello acknowledgement, or the client's ticket.
    pub fn add_session_ticket(&mut self, ticket: &[u8]) {
        self.push(ExtensionType::SessionTicket, ticket.to_vec());
    }

    pub fn add_empty_status_request(&mut self) {
        self.push(ExtensionType::StatusRequest, Vec::new());
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn supported_groups(&self) -> Result<Option<Vec<NamedGroup>>, Error> {
        let Some(data) = self.get(ExtensionType::SupportedGroups) else {
            return Ok(None);
        };
        let groups = decode_all(data, |input| {
            let (input, list) = opaque16(input)?;
            let (rest, groups) = many0(NamedGroup::parse)(list)?;
            all_consumed(rest)?;
            Ok((input, groups))
        })?;
        Ok(Some(groups))
    }

    pub fn signature_algorithms(&self) -> Result<Option<Vec<SignatureAndHashAlgorithm>>, Error> {
        let Some(data) = self.get(ExtensionType::SignatureAlgorithms) else {
            return Ok(None);
        };
        let algorithms = decode_all(data, parse_signature_algorithms)?;
        Ok(Some(algorithms))
    }

    pub fn heartbeat_mode(&self) -> Result<Option<HeartbeatMode>, Error> {
        let Some(data) = self.get(ExtensionType::Heartbeat) else {
            return Ok(None);
        };
        let mode = HeartbeatMode::from_u8(decode_all(data, be_u8)?);
        if let HeartbeatMode::Unknown(v) = mode {
            return Err(Error::illegal_parameter(format!("unknown heartbeat mode {v}")));
        }
        Ok(Some(mode))
    }

    pub fn max_fragment_length(&self) -> Result<Option<MaxFragmentLength>, Error> {
        let Some(data) = self.get(ExtensionType::MaxFragmentLength) else {
            return Ok(None);
        };
        let code = decode_all(data, be_u8)?;
        MaxFragmentLength::from_u8(code)
            .map(Some)
            .ok_or_else(|| Error::illegal_parameter(format!("invalid max_fragment_length {code}")))
    }

    pub fn connection_id(&self) -> Result<Option<Vec<u8>>, Error> {
        self.opaque8_extension(ExtensionType::ConnectionId)
    }

    pub fn renegotiation_info(&self) -> Result<Option<Vec<u8>>, Error> {
        self.opaque8_extension(ExtensionType::RenegotiationInfo)
    }

    fn opaque8_extension(&self, extension_type: ExtensionType) -> Result<Option<Vec<u8>>, Error> {
        let Some(data) = self.get(extension_type) else {
            return Ok(None);
        };
        let value = decode_all(data, opaque8)?;
        Ok(Some(value.to_vec()))
    }

    /// Presence of an extension whose data must be empty.
    pub fn has_empty(&self, extension_type: ExtensionType) -> Result<bool, Error> {
        match self.get(extension_type) {
            None => Ok(false),
            Some([]) => Ok(true),
            Some(_) => Err(Error::decode_error(format!(
                "extension {:?} must be empty",
                extension_type
            ))),
        }
    }

    /// Whether a client's status_request asks for OCSP.
    pub fn requests_ocsp(&self) -> bool {
        self.get(ExtensionType::StatusRequest)
            .is_some_and(|d| d.first() == Some(&1))
    }
}

pub(crate) fn parse_signature_algorithms(
    input: &[u8],
) -> IResult<&[u8], Vec<SignatureAndHashAlgorithm>> {
    let (input, list) = opaque16(input)?;
    let (rest, algorithms) = many0(SignatureAndHashAlgorithm::parse)(list)?;
    all_consumed(rest)?;
    Ok((input, algorithms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertDescription;

    #[test]
    fn build_and_read_back() {
        let mut exts = Extensions::new();
        exts.add_supported_groups([NamedGroup::X25519, NamedGroup::Secp256r1]);
        exts.add_heartbeat(HeartbeatMode::PeerAllowedToSend);
        exts.add_max_fragment_length(MaxFragmentLength::Pow2_10);
        exts.add_connection_id(&[9, 8]);
        exts.add_renegotiation_info(&[]);
        exts.add_extended_master_secret();

        let mut out = Buf::new();
        exts.serialize(&mut out);
        let (rest, parsed) = Extensions::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, exts);

        assert_eq!(
            parsed.supported_groups().unwrap(),
            Some(vec![NamedGroup::X25519, NamedGroup::Secp256r1])
        );
        assert_eq!(
            parsed.heartbeat_mode().unwrap(),
            Some(HeartbeatMode::PeerAllowedToSend)
        );
        assert_eq!(
            parsed.max_fragment_length().unwrap(),
            Some(MaxFragmentLength::Pow2_10)
        );
        assert_eq!(parsed.connection_id().unwrap(), Some(vec![9, 8]));
        assert_eq!(parsed.renegotiation_info().unwrap(), Some(vec![]));
        assert!(parsed.has_empty(ExtensionType::ExtendedMasterSecret).unwrap());
        assert!(!parsed.has_empty(ExtensionType::SessionTicket).unwrap());
    }

    #[test]
    fn empty_block_writes_nothing() {
        let mut out = Buf::new();
        Extensions::new().serialize(&mut out);
        assert!(out.is_empty());
        let (_, parsed) = Extensions::parse(&[]).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn duplicates_are_illegal() {
        let mut exts = Extensions::new();
        exts.add_extended_master_secret();
        exts.add_extended_master_secret();
        let err = exts.check_no_duplicates().unwrap_err();
        assert_eq!(err.alert_description(), Some(AlertDescription::IllegalParameter));
    }

    #[test]
    fn invalid_max_fragment_length() {
        let mut exts = Extensions::new();
        exts.push(ExtensionType::MaxFragmentLength, vec![7]);
        assert!(exts.max_fragment_length().is_err());
    }
}
