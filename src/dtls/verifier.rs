//! Stateless cookie exchange for servers (rfc6347 4.2.1).
//!
//! A server that has not committed any state to a client answers its first
//! ClientHello with a HelloVerifyRequest carrying a cookie, and only starts
//! the handshake once a ClientHello comes back with that cookie.

use zeroize::Zeroizing;

use super::record_layer::{receive_client_hello_record, send_hello_verify_request_record};
use super::transport::DatagramSender;
use crate::buffer::Buf;
use crate::crypto::CryptoProvider;
use crate::message::{ClientHello, Header, HelloVerifyRequest};
use crate::types::{HandshakeType, ProtocolVersion};
use crate::util::constant_time_eq;
use crate::Error;

const SECRET_LEN: usize = 32;

/// A ClientHello that came back with a valid cookie.
#[derive(Debug, Clone)]
pub struct DtlsRequest {
    pub(crate) record_seq: u64,
    /// The whole handshake message, header included.
    pub(crate) message: Vec<u8>,
    client_hello: ClientHello,
}

impl DtlsRequest {
    /// Record sequence number of the verified ClientHello.
    pub fn record_seq(&self) -> u64 {
        self.record_seq
    }

    pub fn message_seq(&self) -> u16 {
        u16::from_be_bytes([self.message[4], self.message[5]])
    }

    pub fn client_hello(&self) -> &ClientHello {
        &self.client_hello
    }

    pub(crate) fn client_hello_body(&self) -> &[u8] {
        &self.message[Header::LEN..]
    }
}

/// Issues and checks HelloVerifyRequest cookies.
///
/// The cookie is an HMAC under a per-verifier secret of the client's
/// identity (typically its address) and the ClientHello minus its cookie,
/// so no per-client state is kept.
pub struct DtlsVerifier {
    provider: CryptoProvider,
    secret: Zeroizing<[u8; SECRET_LEN]>,
}

impl DtlsVerifier {
    pub fn new(provider: &CryptoProvider) -> Result<Self, Error> {
        let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
        provider.fill_random(&mut secret[..])?;
        Ok(DtlsVerifier {
            provider: provider.clone(),
            secret,
        })
    }

    fn cookie(&self, client_id: &[u8], client_hello_body: &[u8]) -> Result<[u8; 32], Error> {
        let mut input = Vec::with_capacity(client_id.len() + client_hello_body.len());
        input.extend_from_slice(client_id);
        input.extend_from_slice(&ClientHello::without_cookie(client_hello_body)?);
        self.provider
            .hmac_provider
            .hmac_sha256(&self.secret[..], &input)
            .map_err(Error::CryptoError)
    }

    /// Check the first datagram from a client.
    ///
    /// Returns the request if it is an unfragmented ClientHello with a valid
    /// cookie. A well-formed ClientHello with a missing or wrong cookie is
    /// answered with a HelloVerifyRequest through `sender`. Anything else is
    /// ignored.
    pub fn verify_request(
        &self,
        client_id: &[u8],
        datagram: &[u8],
        sender: &dyn DatagramSender,
    ) -> Option<DtlsRequest> {
        let (record_seq, fragment) = receive_client_hello_record(datagram)?;

        let (body, header) = Header::parse(fragment).ok()?;
        if header.msg_type != HandshakeType::ClientHello
            || header.is_fragment()
            || body.len() != header.length as usize
        {
            return None;
        }

        let (_, client_hello) = ClientHello::parse(body).ok()?;
        let expected = match self.cookie(client_id, body) {
            Ok(cookie) => cookie,
            Err(e) => {
                debug!("Cannot compute cookie: {}", e);
                return None;
            }
        };

        if constant_time_eq(&client_hello.cookie, &expected) {
            trace!("ClientHello cookie verified");
            return Some(DtlsRequest {
                record_seq,
                message: fragment.to_vec(),
                client_hello,
            });
        }

        let mut hvr_body = Buf::new();
        HelloVerifyRequest::new(ProtocolVersion::DTLS1_0, expected.to_vec()).serialize(&mut hvr_body);

        let mut message = Buf::with_capacity(Header::LEN + hvr_body.len());
        Header::whole(
            HandshakeType::HelloVerifyRequest,
            header.message_seq,
            hvr_body.len() as u32,
        )
        .serialize(&mut message);
        message.extend_from_slice(&hvr_body);

        trace!("Sending HelloVerifyRequest");
        if let Err(e) = send_hello_verify_request_record(sender, record_seq, &message) {
            debug!("Failed to send HelloVerifyRequest: {}", e);
        }
        None
    }
}

impl std::fmt::Debug for DtlsVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DtlsVerifier").finish_non_exhaustive()
    }
}
