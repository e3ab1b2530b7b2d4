// DTLS 1.2 Client Handshake Flow (RFC 6347, RFC 5246):
//
// 1. Client sends ClientHello (record version DTLS 1.0, epoch 0)
// 2. Server may answer with HelloVerifyRequest carrying a cookie
//    - Client resends the same ClientHello with the cookie patched in and
//      starts the transcript again. This may repeat.
// 3. Server sends ServerHello
//    - Resumed session: pending epoch from the stored master secret, then
//      [NewSessionTicket], server Finished, client Finished.
// 4. Server sends Certificate (ECDHE_ECDSA only)
// 5. Server sends CertificateStatus (optional, if status_request was agreed)
// 6. Server sends ServerKeyExchange (required for ECDHE, optional for PSK)
// 7. Server sends CertificateRequest (optional)
// 8. Server sends ServerHelloDone
// 9. Client sends Certificate (if requested), ClientKeyExchange,
//    CertificateVerify (if a certificate was sent), ChangeCipherSpec and
//    Finished
// 10. Server sends [NewSessionTicket], ChangeCipherSpec and Finished
//
// Optional messages are detected by looking at the next message type; a
// message that does not belong to the current state is kept for the next.

use std::sync::Arc;

use super::common::{abort_handshake, apply_plaintext_limit, calculate_verify_data};
use super::common::{check_downgrade, check_ec_point_formats, check_finished};
use super::common::{check_renegotiation_info, encode, establish_master_secret};
use super::common::{init_heartbeat, init_pending_epoch};
use super::key_exchange::{EcdheClient, KeyExchange, PskClient};
use super::peer::{Credentials, DtlsClient, PskIdentity};
use super::record_layer::DtlsRecordLayer;
use super::reliable::{DtlsReliableHandshake, Message};
use super::session::{SecurityParameters, Session};
use super::transport::{DatagramTransport, DtlsTransport};
use crate::buffer::Buf;
use crate::message::{Certificate, CertificateRequest, CertificateStatus, ClientHello};
use crate::message::{DigitallySigned, Extensions, HelloVerifyRequest, NewSessionTicket};
use crate::message::{Random, ServerHello, SessionId};
use crate::types::{AlertDescription, CipherSuite, ClientCertificateType, CompressionMethod};
use crate::types::{ConnectionEnd, ExtensionType, HandshakeType, KeyExchangeAlgorithm};
use crate::types::{ProtocolVersion, SignatureAndHashAlgorithm};
use crate::{Config, Error};

/// Runs client handshakes over datagram transports.
#[derive(Debug, Clone)]
pub struct DtlsClientProtocol {
    config: Arc<Config>,
}

impl DtlsClientProtocol {
    pub fn new(config: Arc<Config>) -> Self {
        DtlsClientProtocol { config }
    }

    /// Handshake with the server at the other end of `transport`.
    ///
    /// On failure the session offered for resumption is invalidated, a fatal
    /// alert is sent (unless the server sent one) and the transport closed.
    pub fn connect<C: DtlsClient + 'static>(
        &self,
        client: Arc<C>,
        transport: Arc<dyn DatagramTransport>,
    ) -> Result<DtlsTransport, Error> {
        let record_layer = Arc::new(DtlsRecordLayer::new(
            self.config.clone(),
            transport,
            client.clone(),
        ));

        let mut state = ClientHandshake::new(self.config.clone(), client, record_layer.clone());
        let result = DtlsReliableHandshake::new(record_layer.clone(), None)
            .and_then(|handshake| state.run(handshake));

        match result {
            Ok(()) => Ok(DtlsTransport::new(record_layer)),
            Err(e) => {
                abort_handshake(&record_layer, state.session_to_resume.as_ref(), &e);
                Err(e)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SendClientHello,
    AwaitServerHello,
    AwaitCertificate,
    AwaitCertificateStatus,
    AwaitServerKeyExchange,
    AwaitCertificateRequest,
    AwaitServerHelloDone,
    SendClientFlight,
    SendFinished,
    AwaitNewSessionTicket,
    AwaitFinished,
    Complete,
}

impl State {
    fn make_progress(
        self,
        client: &mut ClientHandshake,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<Self, Error> {
        match self {
            State::SendClientHello => client.send_client_hello(handshake),
            State::AwaitServerHello => client.await_server_hello(handshake),
            State::AwaitCertificate => client.await_certificate(handshake),
            State::AwaitCertificateStatus => client.await_certificate_status(handshake),
            State::AwaitServerKeyExchange => client.await_server_key_exchange(handshake),
            State::AwaitCertificateRequest => client.await_certificate_request(handshake),
            State::AwaitServerHelloDone => client.await_server_hello_done(handshake),
            State::SendClientFlight => client.send_client_flight(handshake),
            State::SendFinished => client.send_finished(handshake),
            State::AwaitNewSessionTicket => client.await_new_session_ticket(handshake),
            State::AwaitFinished => client.await_finished(handshake),
            State::Complete => Ok(State::Complete),
        }
    }
}

struct ClientHandshake {
    config: Arc<Config>,
    client: Arc<dyn DtlsClient>,
    record_layer: Arc<DtlsRecordLayer>,
    params: SecurityParameters,

    /// Our ClientHello body without a cookie.
    client_hello: Vec<u8>,
    offered_suites: Vec<CipherSuite>,
    offered_extensions: Extensions,

    session_to_resume: Option<Session>,
    psk_identity: Option<PskIdentity>,
    key_exchange: Option<Box<dyn KeyExchange>>,
    certificate_request: Option<CertificateRequest>,
    expect_session_ticket: bool,

    /// A message received ahead of the state that handles it.
    pending: Option<Message>,
}

impl ClientHandshake {
    fn new(
        config: Arc<Config>,
        client: Arc<dyn DtlsClient>,
        record_layer: Arc<DtlsRecordLayer>,
    ) -> Self {
        ClientHandshake {
            config,
            client,
            record_layer,
            params: SecurityParameters::new(ConnectionEnd::Client),
            client_hello: Vec::new(),
            offered_suites: Vec::new(),
            offered_extensions: Extensions::new(),
            session_to_resume: None,
            psk_identity: None,
            key_exchange: None,
            certificate_request: None,
            expect_session_ticket: false,
            pending: None,
        }
    }

    fn run(&mut self, mut handshake: DtlsReliableHandshake) -> Result<(), Error> {
        let mut state = State::SendClientHello;
        while state != State::Complete {
            let next = state.make_progress(self, &mut handshake)?;
            trace!("{:?} -> {:?}", state, next);
            state = next;
        }
        handshake.finish()?;
        self.complete();
        Ok(())
    }

    fn next_message(&mut self, handshake: &mut DtlsReliableHandshake) -> Result<Message, Error> {
        match self.pending.take() {
            Some(message) => Ok(message),
            None => handshake.receive_message(),
        }
    }

    fn send_client_hello(&mut self, handshake: &mut DtlsReliableHandshake) -> Result<State, Error> {
        let config = self.config.clone();
        let provider = config.crypto_provider();

        self.params.client_random = Random::generate(provider)?;
        self.psk_identity = self.client.psk_identity();

        let psk_identity = &self.psk_identity;
        self.offered_suites = config
            .cipher_suites()
            .iter()
            .copied()
            .filter(|suite| provider.find_cipher_suite(*suite).is_some())
            .filter(|suite| match suite.key_exchange_algorithm() {
                KeyExchangeAlgorithm::ECDHE_ECDSA => true,
                KeyExchangeAlgorithm::PSK => psk_identity.is_some(),
                KeyExchangeAlgorithm::Unknown => false,
            })
            .collect();
        if self.offered_suites.is_empty() {
            return Err(Error::ConfigError("no cipher suite to offer".into()));
        }

        self.session_to_resume = self.client.session_to_resume().filter(|session| {
            let Some(parameters) = session.parameters().filter(|_| session.is_resumable()) else {
                return false;
            };
            let usable = self.offered_suites.contains(&parameters.cipher_suite)
                && (parameters.extended_master_secret || config.allow_legacy_resumption())
                && (!parameters.extended_master_secret || config.with_extended_master_secret());
            if !usable {
                debug!("Not offering session {:?} for resumption", session.id());
            }
            usable
        });
        let session_id = self
            .session_to_resume
            .as_ref()
            .map(|s| s.id().clone())
            .unwrap_or_else(SessionId::empty);

        let mut extensions = Extensions::new();
        if self.offered_suites.iter().any(CipherSuite::has_ecc) {
            extensions.add_supported_groups(provider.supported_groups());
            extensions.add_ec_point_formats();
        }
        extensions.add_signature_algorithms(SignatureAndHashAlgorithm::supported());
        if config.with_extended_master_secret() {
            extensions.add_extended_master_secret();
        }
        if let Some(mode) = config.heartbeat_policy() {
            extensions.add_heartbeat(mode);
        }
        if let Some(max) = config.max_fragment_length() {
            extensions.add_max_fragment_length(max);
        }
        if let Some(cid) = config.connection_id() {
            extensions.add_connection_id(cid);
        }
        if config.request_certificate_status() {
            extensions.add_status_request_ocsp();
        }
        if config.request_session_ticket() {
            extensions.add_session_ticket(&[]);
        }

        let mut cipher_suites = self.offered_suites.clone();
        cipher_suites.push(CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV);

        let client_hello = ClientHello {
            client_version: ProtocolVersion::DTLS1_2,
            random: self.params.client_random,
            session_id,
            cookie: Vec::new(),
            cipher_suites,
            compression_methods: vec![CompressionMethod::Null],
            extensions: extensions.clone(),
        };
        self.offered_extensions = extensions;
        self.client_hello = encode(|b| client_hello.serialize(b));

        debug!(
            "Sending ClientHello offering {:?}{}",
            self.offered_suites,
            if self.session_to_resume.is_some() {
                " with session resumption"
            } else {
                ""
            }
        );
        // The server may not speak DTLS 1.2; it answers in its own version.
        self.record_layer.set_write_version(ProtocolVersion::DTLS1_0);
        handshake.send_message(HandshakeType::ClientHello, self.client_hello.clone())?;

        Ok(State::AwaitServerHello)
    }

    fn await_server_hello(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let mut message = self.next_message(handshake)?;

        while message.msg_type == HandshakeType::HelloVerifyRequest {
            let (_, request) = HelloVerifyRequest::parse(&message.body)?;
            check_hello_verify_request(&request)?;
            debug!(
                "Received HelloVerifyRequest with {} byte cookie",
                request.cookie.len()
            );

            let client_hello = ClientHello::patch_cookie(&self.client_hello, &request.cookie)?;
            handshake.reset_after_hello_verify_request_client();
            handshake.send_message(HandshakeType::ClientHello, client_hello)?;
            message = handshake.receive_message()?;
        }

        if message.msg_type != HandshakeType::ServerHello {
            return Err(Error::unexpected_message(format!(
                "expected ServerHello, got {:?}",
                message.msg_type
            )));
        }
        self.process_server_hello(&message.body)?;
        apply_plaintext_limit(&self.record_layer, &self.params);

        if self.params.resumed_session {
            init_pending_epoch(&self.record_layer, &self.params, self.config.crypto_provider())?;
            if self.expect_session_ticket {
                return Ok(State::AwaitNewSessionTicket);
            }
            return Ok(State::AwaitFinished);
        }
        Ok(State::AwaitCertificate)
    }

    fn process_server_hello(&mut self, body: &[u8]) -> Result<(), Error> {
        let (_, server_hello) = ServerHello::parse(body)?;

        let version = server_hello.server_version;
        if version != ProtocolVersion::DTLS1_2 {
            if version.is_equal_or_earlier_than(ProtocolVersion::DTLS1_2) {
                check_downgrade(&server_hello.random)?;
            }
            return Err(Error::alert(
                AlertDescription::ProtocolVersion,
                format!("server selected {}", version),
            ));
        }
        self.record_layer.set_read_version(version);
        self.record_layer.set_write_version(version);
        self.params.negotiated_version = Some(version);
        self.params.server_random = server_hello.random;
        self.params.session_id = server_hello.session_id.clone();

        let suite = server_hello.cipher_suite;
        if !suite.is_real() || !self.offered_suites.contains(&suite) {
            return Err(Error::illegal_parameter(format!(
                "server selected {:?}, which was not offered",
                suite
            )));
        }
        if server_hello.compression_method != CompressionMethod::Null {
            return Err(Error::illegal_parameter("server selected compression"));
        }
        self.params.cipher_suite = suite;
        self.params.prf_hash = suite.hash_algorithm();

        let extensions = &server_hello.extensions;
        extensions.check_no_duplicates()?;
        for extension in extensions.iter() {
            let extension_type = extension.extension_type;
            if extension_type != ExtensionType::RenegotiationInfo
                && !self.offered_extensions.contains(extension_type)
            {
                return Err(Error::alert(
                    AlertDescription::UnsupportedExtension,
                    format!("server sent unrequested {:?}", extension_type),
                ));
            }
        }

        self.params.secure_renegotiation = check_renegotiation_info(extensions)?;
        if !self.params.secure_renegotiation {
            return Err(Error::handshake_failure("server does not support secure renegotiation"));
        }

        self.params.extended_master_secret =
            extensions.has_empty(ExtensionType::ExtendedMasterSecret)?;
        if !self.params.extended_master_secret && self.config.require_extended_master_secret() {
            return Err(Error::handshake_failure("extended master secret required"));
        }

        check_ec_point_formats(extensions)?;
        self.params.heartbeat_peer_mode = extensions.heartbeat_mode()?;

        let max_fragment_length = extensions.max_fragment_length()?;
        if max_fragment_length.is_some() && max_fragment_length != self.config.max_fragment_length()
        {
            return Err(Error::illegal_parameter("max_fragment_length differs from request"));
        }
        self.params.max_fragment_length = max_fragment_length;

        if let Some(peer_cid) = extensions.connection_id()? {
            debug!("Connection ID negotiated, peer {} bytes", peer_cid.len());
            self.params.connection_id_peer = peer_cid;
            self.params.connection_id_local = self
                .config
                .connection_id()
                .map(<[u8]>::to_vec)
                .unwrap_or_default();
        }

        self.params.status_request = extensions.has_empty(ExtensionType::StatusRequest)?;
        self.expect_session_ticket = extensions.has_empty(ExtensionType::SessionTicket)?;

        let resumed = self
            .session_to_resume
            .as_ref()
            .filter(|s| !server_hello.session_id.is_empty() && *s.id() == server_hello.session_id);

        if let Some(session) = resumed {
            let parameters = session
                .parameters()
                .ok_or_else(|| Error::handshake_failure("session was invalidated"))?;
            if parameters.cipher_suite != suite {
                return Err(Error::illegal_parameter("resumed session with another cipher suite"));
            }
            if parameters.extended_master_secret != self.params.extended_master_secret {
                return Err(Error::handshake_failure(
                    "extended master secret differs from resumed session",
                ));
            }
            debug!("Resuming session {:?}", session.id());
            self.params.master_secret = parameters.master_secret;
            self.params.peer_certificate = parameters.peer_certificate;
            self.params.psk_identity = parameters.psk_identity;
            self.params.resumed_session = true;
        } else if let Some(session) = self.session_to_resume.take() {
            debug!("Server declined resumption of {:?}", session.id());
        }

        debug!(
            "Received ServerHello: {:?}, extended master secret {}",
            suite, self.params.extended_master_secret
        );
        Ok(())
    }

    fn await_certificate(&mut self, handshake: &mut DtlsReliableHandshake) -> Result<State, Error> {
        let message = self.next_message(handshake)?;
        let ecdhe = self.params.cipher_suite.key_exchange_algorithm()
            == KeyExchangeAlgorithm::ECDHE_ECDSA;

        if message.msg_type != HandshakeType::Certificate {
            if ecdhe {
                return Err(Error::unexpected_message(format!(
                    "expected Certificate, got {:?}",
                    message.msg_type
                )));
            }
            self.pending = Some(message);
            return Ok(State::AwaitServerKeyExchange);
        }
        if !ecdhe {
            return Err(Error::unexpected_message("Certificate with a PSK suite"));
        }

        let (_, certificate) = Certificate::parse(&message.body)?;
        if certificate.is_empty() {
            return Err(Error::alert(
                AlertDescription::BadCertificate,
                "empty server certificate",
            ));
        }
        debug!(
            "Received server Certificate chain of {}",
            certificate.certificate_list.len()
        );
        self.client
            .verify_server_certificate(&certificate.certificate_list)?;
        self.params.peer_certificate = certificate.certificate_list;

        Ok(State::AwaitCertificateStatus)
    }

    fn await_certificate_status(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let message = self.next_message(handshake)?;
        if message.msg_type != HandshakeType::CertificateStatus {
            self.pending = Some(message);
            return Ok(State::AwaitServerKeyExchange);
        }
        if !self.params.status_request {
            return Err(Error::unexpected_message("CertificateStatus was not requested"));
        }

        let (_, status) = CertificateStatus::parse(&message.body)?;
        trace!("Received OCSP response of {} bytes", status.ocsp_response.len());
        self.client.notify_certificate_status(&status.ocsp_response);

        Ok(State::AwaitServerKeyExchange)
    }

    fn await_server_key_exchange(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let provider = self.config.crypto_provider();
        let mut key_exchange: Box<dyn KeyExchange> =
            match self.params.cipher_suite.key_exchange_algorithm() {
                KeyExchangeAlgorithm::ECDHE_ECDSA => {
                    let end_entity = self
                        .params
                        .peer_certificate
                        .first()
                        .cloned()
                        .ok_or_else(|| Error::internal_error("no server certificate"))?;
                    Box::new(EcdheClient::new(provider, end_entity))
                }
                KeyExchangeAlgorithm::PSK => {
                    let identity = self
                        .psk_identity
                        .clone()
                        .ok_or_else(|| Error::internal_error("PSK suite without identity"))?;
                    Box::new(PskClient::new(identity))
                }
                KeyExchangeAlgorithm::Unknown => {
                    return Err(Error::internal_error("unknown key exchange"));
                }
            };

        let client_random = self.params.client_random;
        let server_random = self.params.server_random;
        let message = self.next_message(handshake)?;
        if message.msg_type == HandshakeType::ServerKeyExchange {
            trace!("Received ServerKeyExchange");
            key_exchange.process_server_key_exchange(
                Some(&message.body),
                client_random.as_ref(),
                server_random.as_ref(),
            )?;
        } else {
            self.pending = Some(message);
            key_exchange.process_server_key_exchange(
                None,
                client_random.as_ref(),
                server_random.as_ref(),
            )?;
        }
        self.key_exchange = Some(key_exchange);

        Ok(State::AwaitCertificateRequest)
    }

    fn await_certificate_request(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let message = self.next_message(handshake)?;
        if message.msg_type != HandshakeType::CertificateRequest {
            self.pending = Some(message);
            return Ok(State::AwaitServerHelloDone);
        }
        // Only an authenticated server may ask.
        if self.params.peer_certificate.is_empty() {
            return Err(Error::unexpected_message("CertificateRequest from a PSK server"));
        }

        let (_, request) = CertificateRequest::parse(&message.body)?;
        debug!(
            "Received CertificateRequest for {:?}",
            request.certificate_types
        );
        self.certificate_request = Some(request);

        Ok(State::AwaitServerHelloDone)
    }

    fn await_server_hello_done(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let message = self.next_message(handshake)?;
        if message.msg_type != HandshakeType::ServerHelloDone {
            return Err(Error::unexpected_message(format!(
                "expected ServerHelloDone, got {:?}",
                message.msg_type
            )));
        }
        if !message.body.is_empty() {
            return Err(Error::decode_error("ServerHelloDone with a body"));
        }
        Ok(State::SendClientFlight)
    }

    fn send_client_flight(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let config = self.config.clone();
        let provider = config.crypto_provider();

        let mut credentials = None;
        if let Some(request) = &self.certificate_request {
            credentials = self
                .client
                .client_credentials(request)
                .filter(|c| acceptable_credentials(request, c));
            let chain = credentials
                .as_ref()
                .map(|c| c.certificate_chain.clone())
                .unwrap_or_default();
            debug!("Sending client Certificate chain of {}", chain.len());
            let body = encode(|b| Certificate::new(chain).serialize(b));
            handshake.send_message(HandshakeType::Certificate, body)?;
        }

        let key_exchange = self
            .key_exchange
            .as_mut()
            .ok_or_else(|| Error::internal_error("key exchange not started"))?;
        handshake.send_message(
            HandshakeType::ClientKeyExchange,
            key_exchange.client_key_exchange()?,
        )?;
        self.params.psk_identity = key_exchange.psk_identity().map(<[u8]>::to_vec);

        let prepare_finish_hash = handshake.prepare_to_finish();
        self.params.session_hash =
            prepare_finish_hash.current_hash(provider, self.params.prf_hash)?;
        let pre_master_secret = key_exchange.premaster_secret()?;
        establish_master_secret(&mut self.params, provider, &pre_master_secret)?;
        init_pending_epoch(&self.record_layer, &self.params, provider)?;

        if let Some(mut credentials) = credentials {
            let key = &mut credentials.signing_key;
            let algorithm = SignatureAndHashAlgorithm::new(key.hash_algorithm(), key.algorithm());
            let mut signature = Buf::new();
            key.sign(prepare_finish_hash.transcript(), &mut signature)
                .map_err(Error::CryptoError)?;

            let signed = DigitallySigned {
                algorithm,
                signature: signature.into_vec(),
            };
            trace!("Sending CertificateVerify with {:?}", algorithm);
            handshake.send_message(HandshakeType::CertificateVerify, encode(|b| signed.serialize(b)))?;
        }

        Ok(State::SendFinished)
    }

    fn send_finished(&mut self, handshake: &mut DtlsReliableHandshake) -> Result<State, Error> {
        let verify_data = calculate_verify_data(
            &self.params,
            self.config.crypto_provider(),
            ConnectionEnd::Client,
            handshake.handshake_hash(),
        )?;
        trace!("Sending Finished");
        handshake.send_message(HandshakeType::Finished, verify_data.clone())?;
        self.params.local_verify_data = verify_data;

        if self.params.resumed_session {
            Ok(State::Complete)
        } else if self.expect_session_ticket {
            Ok(State::AwaitNewSessionTicket)
        } else {
            Ok(State::AwaitFinished)
        }
    }

    fn await_new_session_ticket(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let message = self.next_message(handshake)?;
        if message.msg_type != HandshakeType::NewSessionTicket {
            return Err(Error::unexpected_message(format!(
                "expected NewSessionTicket, got {:?}",
                message.msg_type
            )));
        }
        let (_, ticket) = NewSessionTicket::parse(&message.body)?;
        debug!(
            "Received NewSessionTicket ({} bytes, lifetime {}s)",
            ticket.ticket.len(),
            ticket.ticket_lifetime_hint
        );
        self.client.notify_new_session_ticket(&ticket);
        Ok(State::AwaitFinished)
    }

    fn await_finished(&mut self, handshake: &mut DtlsReliableHandshake) -> Result<State, Error> {
        if let Some(message) = self.pending.take() {
            return Err(Error::unexpected_message(format!(
                "expected Finished, got {:?}",
                message.msg_type
            )));
        }
        let expected = calculate_verify_data(
            &self.params,
            self.config.crypto_provider(),
            ConnectionEnd::Server,
            handshake.handshake_hash(),
        )?;
        let message = handshake.receive_message_delayed_digest(HandshakeType::Finished)?;
        check_finished(&expected, &message.body)?;
        handshake.update_handshake_messages_digest(&message);
        trace!("Server Finished verified");
        self.params.peer_verify_data = message.body;

        if self.params.resumed_session {
            Ok(State::SendFinished)
        } else {
            Ok(State::Complete)
        }
    }

    fn complete(&mut self) {
        let session = if self.params.resumed_session {
            self.session_to_resume.clone()
        } else if !self.params.session_id.is_empty() {
            Some(Session::new(
                self.params.session_id.clone(),
                Some(self.params.export()),
            ))
        } else {
            None
        };
        if let Some(session) = &session {
            self.client.notify_session(session);
        }

        init_heartbeat(&self.record_layer, &self.config, &self.params);
        debug!(
            "Handshake complete; {:?}{}",
            self.params.cipher_suite,
            if self.params.resumed_session {
                " (resumed)"
            } else {
                ""
            }
        );
        self.client.notify_handshake_complete();
    }
}

/// Cookie limit for servers answering in a version before DTLS 1.2.
const LEGACY_COOKIE_MAX_LEN: usize = 32;

/// rfc6347 4.2.1: the HelloVerifyRequest version is no later than DTLS 1.2,
/// and a DTLS 1.0 cookie is at most 32 bytes.
fn check_hello_verify_request(request: &HelloVerifyRequest) -> Result<(), Error> {
    let version = request.server_version;
    if !version.is_equal_or_earlier_than(ProtocolVersion::DTLS1_2) {
        return Err(Error::illegal_parameter(format!(
            "HelloVerifyRequest version {}",
            version
        )));
    }
    if !version.is_equal_or_later_than(ProtocolVersion::DTLS1_2)
        && request.cookie.len() > LEGACY_COOKIE_MAX_LEN
    {
        return Err(Error::illegal_parameter(format!(
            "{} byte cookie in {} HelloVerifyRequest",
            request.cookie.len(),
            version
        )));
    }
    Ok(())
}

/// Our certificate must be ECDSA and signed with an algorithm the server
/// listed. Unsuitable credentials are answered with an empty Certificate.
fn acceptable_credentials(request: &CertificateRequest, credentials: &Credentials) -> bool {
    let key = &credentials.signing_key;
    let algorithm = SignatureAndHashAlgorithm::new(key.hash_algorithm(), key.algorithm());
    let acceptable = request
        .certificate_types
        .contains(&ClientCertificateType::ECDSA_SIGN)
        && request.supported_signature_algorithms.contains(&algorithm);
    if !acceptable {
        warn!("Client credentials do not match the CertificateRequest");
    }
    acceptable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::DtlsCertificate;
    use crate::crypto::rust_crypto::default_provider;
    use crate::types::{HashAlgorithm, SignatureAlgorithm};

    fn request(
        types: &[ClientCertificateType],
        algorithms: &[SignatureAndHashAlgorithm],
    ) -> CertificateRequest {
        CertificateRequest {
            certificate_types: types.to_vec(),
            supported_signature_algorithms: algorithms.to_vec(),
            certificate_authorities: Vec::new(),
        }
    }

    #[test]
    fn hello_verify_request_cookie_limit_depends_on_version() {
        use ProtocolVersion::*;

        let check = |version: ProtocolVersion, len: usize| {
            check_hello_verify_request(&HelloVerifyRequest::new(version, vec![7; len]))
        };
        assert!(check(DTLS1_0, 32).is_ok());
        assert!(matches!(
            check(DTLS1_0, 33),
            Err(Error::FatalAlert(AlertDescription::IllegalParameter, _))
        ));
        assert!(check(DTLS1_2, 33).is_ok());
        assert!(check(DTLS1_2, 255).is_ok());
        assert!(matches!(
            check(Unknown(0xFEFC), 1),
            Err(Error::FatalAlert(AlertDescription::IllegalParameter, _))
        ));
    }

    #[test]
    fn credentials_must_match_request() {
        let credentials = DtlsCertificate::generate()
            .unwrap()
            .credentials(&default_provider())
            .unwrap();
        let p256_sha256 =
            SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::ECDSA);
        let p384_sha384 =
            SignatureAndHashAlgorithm::new(HashAlgorithm::SHA384, SignatureAlgorithm::ECDSA);

        let ok = request(&[ClientCertificateType::ECDSA_SIGN], &[p256_sha256]);
        assert!(acceptable_credentials(&ok, &credentials));

        let wrong_type = request(&[ClientCertificateType::RSA_SIGN], &[p256_sha256]);
        assert!(!acceptable_credentials(&wrong_type, &credentials));

        let wrong_hash = request(&[ClientCertificateType::ECDSA_SIGN], &[p384_sha384]);
        assert!(!acceptable_credentials(&wrong_hash, &credentials));
    }
}
