// DTLS 1.2 Server Handshake Flow (RFC 6347, RFC 5246):
//
// 1. Client sends ClientHello
//    - With request verification the first ClientHello is answered with a
//      HelloVerifyRequest and the handshake starts from the ClientHello
//      that returns the cookie.
// 2. Server sends ServerHello
//    - Resumed session: [NewSessionTicket], server Finished, then the
//      client Finished.
// 3. Server sends Certificate and CertificateStatus (ECDHE_ECDSA), the
//    ServerKeyExchange if the method has one, CertificateRequest (optional)
//    and ServerHelloDone
// 4. Client sends Certificate (if requested), ClientKeyExchange,
//    CertificateVerify (if it sent a certificate) and Finished
// 5. Server sends [NewSessionTicket] and Finished

use std::io;
use std::sync::Arc;

use super::common::{abort_handshake, apply_plaintext_limit, calculate_verify_data};
use super::common::{check_ec_point_formats, check_finished, check_renegotiation_info};
use super::common::{encode, establish_master_secret, init_heartbeat, init_pending_epoch};
use super::key_exchange::{EcdheServer, KeyExchange, PskServer};
use super::peer::{Credentials, DtlsServer};
use super::record_layer::DtlsRecordLayer;
use super::reliable::{DtlsReliableHandshake, Message};
use super::session::{SecurityParameters, Session};
use super::transport::{DatagramReceiver, DatagramSender, DatagramTransport, DtlsTransport};
use super::verifier::{DtlsRequest, DtlsVerifier};
use crate::message::{Certificate, CertificateRequest, CertificateStatus, ClientHello};
use crate::message::{DigitallySigned, Extensions, Random, ServerHello, SessionId};
use crate::timeout::Timeout;
use crate::types::{AlertDescription, CipherSuite, ClientCertificateType, CompressionMethod};
use crate::types::{ConnectionEnd, ExtensionType, HandshakeType, KeyExchangeAlgorithm};
use crate::types::{NamedGroup, ProtocolVersion, SignatureAndHashAlgorithm};
use crate::{ClientAuth, Config, Error};

const SESSION_ID_LEN: usize = 32;

/// Runs server handshakes over datagram transports.
#[derive(Debug, Clone)]
pub struct DtlsServerProtocol {
    config: Arc<Config>,
}

impl DtlsServerProtocol {
    pub fn new(config: Arc<Config>) -> Self {
        DtlsServerProtocol { config }
    }

    /// Handshake with the client at the other end of `transport`.
    ///
    /// `request` is a ClientHello already verified by a [`DtlsVerifier`].
    /// Without one, and with request verification configured, the cookie
    /// exchange runs on `transport` first.
    pub fn accept<S: DtlsServer + 'static>(
        &self,
        server: Arc<S>,
        transport: Arc<dyn DatagramTransport>,
        request: Option<DtlsRequest>,
    ) -> Result<DtlsTransport, Error> {
        let request = match request {
            Some(request) => Some(request),
            None if self.config.verify_requests() => Some(self.verify_request(&*transport)?),
            None => None,
        };

        let record_layer = Arc::new(DtlsRecordLayer::new(
            self.config.clone(),
            transport,
            server.clone(),
        ));

        let mut state = ServerHandshake::new(self.config.clone(), server, record_layer.clone());
        let result = DtlsReliableHandshake::new(record_layer.clone(), request.as_ref())
            .and_then(|handshake| state.run(handshake, request.as_ref()));

        match result {
            Ok(()) => Ok(DtlsTransport::new(record_layer)),
            Err(e) => {
                abort_handshake(&record_layer, state.session.as_ref(), &e);
                Err(e)
            }
        }
    }

    /// Cookie exchange on a transport dedicated to one client.
    fn verify_request(&self, transport: &dyn DatagramTransport) -> Result<DtlsRequest, Error> {
        let verifier = DtlsVerifier::new(self.config.crypto_provider())?;
        let sender = Outbound(transport);
        let mut timeout = Timeout::for_wait_millis(
            self.config.handshake_timeout_millis(),
            self.config.now_millis(),
        );
        let mut buf = vec![0; transport.receive_limit()];

        while let Some(wait) = Timeout::wait_millis(timeout.as_mut(), self.config.now_millis()) {
            let Some(len) = transport.receive(&mut buf, wait)? else {
                continue;
            };
            if let Some(request) = verifier.verify_request(&[], &buf[..len], &sender) {
                debug!("ClientHello verified");
                return Ok(request);
            }
        }
        Err(Error::Timeout("handshake"))
    }
}

/// The sending half of a transport, for the verifier.
struct Outbound<'a>(&'a dyn DatagramTransport);

impl DatagramSender for Outbound<'_> {
    fn send_limit(&self) -> usize {
        self.0.send_limit()
    }

    fn send(&self, datagram: &[u8]) -> io::Result<()> {
        self.0.send(datagram)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitClientHello,
    SendServerHello,
    SendServerFlight,
    AwaitClientCertificate,
    AwaitClientKeyExchange,
    AwaitCertificateVerify,
    AwaitFinished,
    SendFinished,
    Complete,
}

struct ServerHandshake {
    config: Arc<Config>,
    server: Arc<dyn DtlsServer>,
    record_layer: Arc<DtlsRecordLayer>,
    params: SecurityParameters,

    client_hello: Option<ClientHello>,
    /// The resumed session, or the one this handshake establishes.
    session: Option<Session>,
    credentials: Option<Credentials>,
    group: Option<NamedGroup>,
    ocsp_response: Option<Vec<u8>>,
    key_exchange: Option<Box<dyn KeyExchange>>,
    server_extensions: Extensions,
    certificate_requested: bool,
    issue_session_ticket: bool,

    /// A message received ahead of the state that handles it.
    pending: Option<Message>,
}

impl ServerHandshake {
    fn new(
        config: Arc<Config>,
        server: Arc<dyn DtlsServer>,
        record_layer: Arc<DtlsRecordLayer>,
    ) -> Self {
        ServerHandshake {
            config,
            server,
            record_layer,
            params: SecurityParameters::new(ConnectionEnd::Server),
            client_hello: None,
            session: None,
            credentials: None,
            group: None,
            ocsp_response: None,
            key_exchange: None,
            server_extensions: Extensions::new(),
            certificate_requested: false,
            issue_session_ticket: false,
            pending: None,
        }
    }

    fn run(
        &mut self,
        mut handshake: DtlsReliableHandshake,
        request: Option<&DtlsRequest>,
    ) -> Result<(), Error> {
        let mut state = match request {
            Some(request) => {
                self.process_client_hello(request.client_hello_body())?;
                State::SendServerHello
            }
            None => State::AwaitClientHello,
        };

        while state != State::Complete {
            let next = match state {
                State::AwaitClientHello => self.await_client_hello(&mut handshake),
                State::SendServerHello => self.send_server_hello(&mut handshake),
                State::SendServerFlight => self.send_server_flight(&mut handshake),
                State::AwaitClientCertificate => self.await_client_certificate(&mut handshake),
                State::AwaitClientKeyExchange => self.await_client_key_exchange(&mut handshake),
                State::AwaitCertificateVerify => self.await_certificate_verify(&mut handshake),
                State::AwaitFinished => self.await_finished(&mut handshake),
                State::SendFinished => self.send_finished(&mut handshake),
                State::Complete => Ok(State::Complete),
            }?;
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

    fn await_client_hello(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let body = handshake.receive_message_body(HandshakeType::ClientHello)?;
        self.process_client_hello(&body)?;
        Ok(State::SendServerHello)
    }

    fn process_client_hello(&mut self, body: &[u8]) -> Result<(), Error> {
        let (_, client_hello) = ClientHello::parse(body)?;

        let version = client_hello.client_version;
        if !version.is_dtls() {
            return Err(Error::illegal_parameter(format!("client version {}", version)));
        }
        if !version.is_equal_or_later_than(ProtocolVersion::DTLS1_2) {
            return Err(Error::alert(
                AlertDescription::ProtocolVersion,
                format!("client offered {}", version),
            ));
        }
        self.params.negotiated_version = Some(ProtocolVersion::DTLS1_2);
        // The first ClientHello may carry a DTLS 1.0 record version; the
        // rest of the client's records use the negotiated one.
        self.record_layer.set_read_version(ProtocolVersion::DTLS1_2);
        self.record_layer.set_write_version(ProtocolVersion::DTLS1_2);
        self.params.client_random = client_hello.random;

        if !client_hello
            .compression_methods
            .contains(&CompressionMethod::Null)
        {
            return Err(Error::illegal_parameter("null compression not offered"));
        }

        let extensions = &client_hello.extensions;
        extensions.check_no_duplicates()?;
        check_ec_point_formats(extensions)?;

        self.params.secure_renegotiation =
            check_renegotiation_info(extensions)? || client_hello.offers_scsv();

        let client_offers_ems = extensions.has_empty(ExtensionType::ExtendedMasterSecret)?;
        self.params.extended_master_secret =
            client_offers_ems && self.config.with_extended_master_secret();

        if !self.try_resume(&client_hello, client_offers_ems)? {
            if !self.params.extended_master_secret && self.config.require_extended_master_secret()
            {
                return Err(Error::handshake_failure("extended master secret required"));
            }
            self.select_cipher_suite(&client_hello)?;
            self.params.session_id = self.new_session_id()?;
        }
        self.params.prf_hash = self.params.cipher_suite.hash_algorithm();

        self.negotiate_extensions(extensions)?;
        debug!(
            "Received ClientHello; selected {:?}{}",
            self.params.cipher_suite,
            if self.params.resumed_session {
                " (resuming)"
            } else {
                ""
            }
        );

        self.client_hello = Some(client_hello);
        Ok(())
    }

    /// Resume the session named in the ClientHello if the host still has it
    /// and it is compatible with this hello.
    fn try_resume(
        &mut self,
        client_hello: &ClientHello,
        client_offers_ems: bool,
    ) -> Result<bool, Error> {
        if client_hello.session_id.is_empty() {
            return Ok(false);
        }
        let Some(session) = self
            .server
            .session_to_resume(client_hello.session_id.as_ref())
            .filter(Session::is_resumable)
        else {
            return Ok(false);
        };
        let Some(parameters) = session.parameters() else {
            return Ok(false);
        };

        // rfc7627 5.3
        if parameters.extended_master_secret && !client_offers_ems {
            return Err(Error::handshake_failure(
                "session used extended master secret, resumption offer does not",
            ));
        }
        if parameters.extended_master_secret != client_offers_ems
            || (!parameters.extended_master_secret && !self.config.allow_legacy_resumption())
        {
            debug!("Not resuming {:?}: extended master secret mismatch", session.id());
            return Ok(false);
        }
        if !client_hello.cipher_suites.contains(&parameters.cipher_suite)
            || !self.config.cipher_suites().contains(&parameters.cipher_suite)
        {
            debug!("Not resuming {:?}: cipher suite not offered", session.id());
            return Ok(false);
        }

        self.params.cipher_suite = parameters.cipher_suite;
        self.params.session_id = session.id().clone();
        self.params.master_secret = parameters.master_secret;
        self.params.extended_master_secret = parameters.extended_master_secret;
        self.params.peer_certificate = parameters.peer_certificate;
        self.params.psk_identity = parameters.psk_identity;
        self.params.resumed_session = true;
        self.session = Some(session);
        Ok(true)
    }

    /// First suite in our preference order that the client offered and we
    /// can serve.
    fn select_cipher_suite(&mut self, client_hello: &ClientHello) -> Result<(), Error> {
        let provider = self.config.crypto_provider();
        let extensions = &client_hello.extensions;
        let client_groups = extensions.supported_groups()?;
        let client_algorithms = extensions.signature_algorithms()?;

        let group = provider
            .supported_groups()
            .find(|g| client_groups.as_ref().map_or(true, |groups| groups.contains(g)));

        let mut credentials = None;
        let mut credentials_loaded = false;

        for &suite in self.config.cipher_suites() {
            if !client_hello.cipher_suites.contains(&suite)
                || provider.find_cipher_suite(suite).is_none()
            {
                continue;
            }
            let usable = match suite.key_exchange_algorithm() {
                KeyExchangeAlgorithm::ECDHE_ECDSA => {
                    if !credentials_loaded {
                        credentials = self.server.server_credentials();
                        credentials_loaded = true;
                    }
                    group.is_some()
                        && credentials.as_ref().is_some_and(|c: &Credentials| {
                            let key = &c.signing_key;
                            let algorithm = SignatureAndHashAlgorithm::new(
                                key.hash_algorithm(),
                                key.algorithm(),
                            );
                            client_algorithms
                                .as_ref()
                                .map_or(true, |algs| algs.contains(&algorithm))
                        })
                }
                KeyExchangeAlgorithm::PSK => self.server.supports_psk(),
                KeyExchangeAlgorithm::Unknown => false,
            };
            if usable {
                self.params.cipher_suite = suite;
                if suite.has_ecc() {
                    self.group = group;
                    self.credentials = credentials;
                }
                return Ok(());
            }
        }
        Err(Error::handshake_failure("no shared cipher suite"))
    }

    fn new_session_id(&self) -> Result<SessionId, Error> {
        let mut id = [0; SESSION_ID_LEN];
        self.config.crypto_provider().fill_random(&mut id)?;
        SessionId::try_new(&id).ok_or_else(|| Error::internal_error("session id"))
    }

    /// Decide the ServerHello extensions from the client's.
    fn negotiate_extensions(&mut self, client: &Extensions) -> Result<(), Error> {
        let mut server = Extensions::new();

        if self.params.secure_renegotiation {
            server.add_renegotiation_info(&[]);
        }
        if self.params.extended_master_secret {
            server.add_extended_master_secret();
        }
        if self.params.cipher_suite.has_ecc() && client.contains(ExtensionType::EcPointFormats) {
            server.add_ec_point_formats();
        }

        if let Some(max) = client.max_fragment_length()? {
            server.add_max_fragment_length(max);
            self.params.max_fragment_length = Some(max);
        }

        if let (Some(peer_mode), Some(our_mode)) =
            (client.heartbeat_mode()?, self.config.heartbeat_policy())
        {
            server.add_heartbeat(our_mode);
            self.params.heartbeat_peer_mode = Some(peer_mode);
        }

        if let (Some(peer_cid), Some(our_cid)) = (client.connection_id()?, self.config.connection_id())
        {
            server.add_connection_id(our_cid);
            debug!("Connection ID negotiated, peer {} bytes", peer_cid.len());
            self.params.connection_id_peer = peer_cid;
            self.params.connection_id_local = our_cid.to_vec();
        }

        if !self.params.resumed_session
            && self.params.cipher_suite.has_ecc()
            && client.requests_ocsp()
        {
            self.ocsp_response = self.server.certificate_status();
            if self.ocsp_response.is_some() {
                server.add_empty_status_request();
                self.params.status_request = true;
            }
        }

        if client.contains(ExtensionType::SessionTicket) && self.server.issues_session_tickets() {
            server.add_session_ticket(&[]);
            self.issue_session_ticket = true;
        }

        self.server_extensions = server;
        Ok(())
    }

    fn send_server_hello(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let provider = self.config.crypto_provider();
        self.params.server_random = Random::generate(provider)?;

        let server_hello = ServerHello {
            server_version: ProtocolVersion::DTLS1_2,
            random: self.params.server_random,
            session_id: self.params.session_id.clone(),
            cipher_suite: self.params.cipher_suite,
            compression_method: CompressionMethod::Null,
            extensions: self.server_extensions.clone(),
        };
        trace!("Sending ServerHello");
        handshake.send_message(HandshakeType::ServerHello, encode(|b| server_hello.serialize(b)))?;
        apply_plaintext_limit(&self.record_layer, &self.params);

        if self.params.resumed_session {
            init_pending_epoch(&self.record_layer, &self.params, provider)?;
            return Ok(State::SendFinished);
        }
        Ok(State::SendServerFlight)
    }

    fn send_server_flight(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let config = self.config.clone();
        let provider = config.crypto_provider();
        let ecdhe =
            self.params.cipher_suite.key_exchange_algorithm() == KeyExchangeAlgorithm::ECDHE_ECDSA;

        let mut key_exchange: Box<dyn KeyExchange> = if ecdhe {
            let credentials = self
                .credentials
                .take()
                .ok_or_else(|| Error::internal_error("no server credentials"))?;
            let group = self
                .group
                .ok_or_else(|| Error::internal_error("no key exchange group"))?;

            debug!(
                "Sending Certificate chain of {}",
                credentials.certificate_chain.len()
            );
            let certificate = Certificate::new(credentials.certificate_chain);
            handshake.send_message(HandshakeType::Certificate, encode(|b| certificate.serialize(b)))?;

            if let Some(ocsp_response) = self.ocsp_response.take() {
                let status = CertificateStatus { ocsp_response };
                handshake.send_message(
                    HandshakeType::CertificateStatus,
                    encode(|b| status.serialize(b)),
                )?;
            }

            let client_algorithms = match &self.client_hello {
                Some(client_hello) => client_hello.extensions.signature_algorithms()?,
                None => None,
            };
            Box::new(EcdheServer::new(
                provider,
                group,
                credentials.signing_key,
                client_algorithms.as_deref(),
            )?)
        } else {
            Box::new(PskServer::new(self.server.clone()))
        };

        let client_random = self.params.client_random;
        let server_random = self.params.server_random;
        if let Some(body) =
            key_exchange.server_key_exchange(client_random.as_ref(), server_random.as_ref())?
        {
            trace!("Sending ServerKeyExchange");
            handshake.send_message(HandshakeType::ServerKeyExchange, body)?;
        }
        self.key_exchange = Some(key_exchange);

        if ecdhe && config.client_auth() != ClientAuth::None {
            let request = CertificateRequest {
                certificate_types: vec![ClientCertificateType::ECDSA_SIGN],
                supported_signature_algorithms: SignatureAndHashAlgorithm::supported().to_vec(),
                certificate_authorities: Vec::new(),
            };
            debug!("Sending CertificateRequest ({:?})", config.client_auth());
            handshake.send_message(
                HandshakeType::CertificateRequest,
                encode(|b| request.serialize(b)),
            )?;
            self.certificate_requested = true;
        }

        trace!("Sending ServerHelloDone");
        handshake.send_message(HandshakeType::ServerHelloDone, Vec::new())?;
        Ok(State::AwaitClientCertificate)
    }

    fn await_client_certificate(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let message = self.next_message(handshake)?;

        let chain = if self.certificate_requested && message.msg_type == HandshakeType::Certificate
        {
            let (_, certificate) = Certificate::parse(&message.body)?;
            certificate.certificate_list
        } else {
            self.pending = Some(message);
            Vec::new()
        };

        if !self.certificate_requested {
            return Ok(State::AwaitClientKeyExchange);
        }
        if chain.is_empty() {
            if self.config.client_auth() == ClientAuth::Required {
                return Err(Error::handshake_failure("client certificate required"));
            }
            debug!("Client sent no certificate");
            return Ok(State::AwaitClientKeyExchange);
        }

        debug!("Received client Certificate chain of {}", chain.len());
        self.server.verify_client_certificate(&chain)?;
        self.params.peer_certificate = chain;
        Ok(State::AwaitClientKeyExchange)
    }

    fn await_client_key_exchange(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let message = self.next_message(handshake)?;
        if message.msg_type != HandshakeType::ClientKeyExchange {
            return Err(Error::unexpected_message(format!(
                "expected ClientKeyExchange, got {:?}",
                message.msg_type
            )));
        }

        let provider = self.config.crypto_provider();
        let key_exchange = self
            .key_exchange
            .as_mut()
            .ok_or_else(|| Error::internal_error("key exchange not started"))?;
        key_exchange.process_client_key_exchange(&message.body)?;
        self.params.psk_identity = key_exchange.psk_identity().map(<[u8]>::to_vec);

        let prepare_finish_hash = handshake.prepare_to_finish();
        self.params.session_hash =
            prepare_finish_hash.current_hash(provider, self.params.prf_hash)?;
        let pre_master_secret = key_exchange.premaster_secret()?;
        establish_master_secret(&mut self.params, provider, &pre_master_secret)?;
        init_pending_epoch(&self.record_layer, &self.params, provider)?;
        trace!("Received ClientKeyExchange; keys derived");

        if self.params.peer_certificate.is_empty() {
            Ok(State::AwaitFinished)
        } else {
            Ok(State::AwaitCertificateVerify)
        }
    }

    fn await_certificate_verify(
        &mut self,
        handshake: &mut DtlsReliableHandshake,
    ) -> Result<State, Error> {
        let message = handshake.receive_message_delayed_digest(HandshakeType::CertificateVerify)?;
        let (_, signed) = DigitallySigned::parse(&message.body)?;

        if !SignatureAndHashAlgorithm::supported().contains(&signed.algorithm) {
            return Err(Error::illegal_parameter(format!(
                "CertificateVerify with {:?}",
                signed.algorithm
            )));
        }
        let end_entity = self
            .params
            .peer_certificate
            .first()
            .ok_or_else(|| Error::internal_error("no client certificate"))?;

        self.config
            .crypto_provider()
            .signature_verification
            .verify_signature(
                end_entity,
                handshake.handshake_hash().transcript(),
                &signed.signature,
                signed.algorithm.hash,
                signed.algorithm.signature,
            )
            .map_err(|e| Error::alert(AlertDescription::DecryptError, e))?;
        handshake.update_handshake_messages_digest(&message);
        trace!("Client CertificateVerify verified");

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
            ConnectionEnd::Client,
            handshake.handshake_hash(),
        )?;
        let message = handshake.receive_message_delayed_digest(HandshakeType::Finished)?;
        check_finished(&expected, &message.body)?;
        handshake.update_handshake_messages_digest(&message);
        trace!("Client Finished verified");
        self.params.peer_verify_data = message.body;

        if self.params.resumed_session {
            Ok(State::Complete)
        } else {
            Ok(State::SendFinished)
        }
    }

    fn send_finished(&mut self, handshake: &mut DtlsReliableHandshake) -> Result<State, Error> {
        if self.issue_session_ticket {
            let ticket = self.server.new_session_ticket();
            trace!("Sending NewSessionTicket ({} bytes)", ticket.ticket.len());
            handshake.send_message(HandshakeType::NewSessionTicket, encode(|b| ticket.serialize(b)))?;
        }

        let verify_data = calculate_verify_data(
            &self.params,
            self.config.crypto_provider(),
            ConnectionEnd::Server,
            handshake.handshake_hash(),
        )?;
        trace!("Sending Finished");
        handshake.send_message(HandshakeType::Finished, verify_data.clone())?;
        self.params.local_verify_data = verify_data;

        if self.params.resumed_session {
            Ok(State::AwaitFinished)
        } else {
            Ok(State::Complete)
        }
    }

    fn complete(&mut self) {
        if !self.params.resumed_session {
            let session = Session::new(self.params.session_id.clone(), Some(self.params.export()));
            self.server.notify_session(&session);
            self.session = Some(session);
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
        self.server.notify_handshake_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtls::peer::DtlsPeer;
    use crate::dtls::transport::MemoryTransport;
    use crate::message::Header;
    use crate::message::RecordHeader;
    use crate::types::ContentType;

    struct NoSuites;
    impl DtlsPeer for NoSuites {}
    impl DtlsServer for NoSuites {}

    fn client_hello_datagram(suites: Vec<CipherSuite>, version: ProtocolVersion) -> Vec<u8> {
        let client_hello = ClientHello {
            client_version: version,
            random: Random([5; 32]),
            session_id: SessionId::empty(),
            cookie: Vec::new(),
            cipher_suites: suites,
            compression_methods: vec![CompressionMethod::Null],
            extensions: Extensions::new(),
        };
        let body = encode(|b| client_hello.serialize(b));
        let mut message = encode(|b| {
            Header::whole(HandshakeType::ClientHello, 0, body.len() as u32).serialize(b)
        });
        message.extend_from_slice(&body);
        let mut datagram = encode(|b| {
            RecordHeader::write(
                b,
                ContentType::Handshake,
                ProtocolVersion::DTLS1_0,
                0,
                0,
                &[],
                message.len() as u16,
            )
        });
        datagram.extend_from_slice(&message);
        datagram
    }

    fn alert_in(datagram: &[u8]) -> Option<AlertDescription> {
        let (rest, header) = RecordHeader::parse(datagram, 0).ok()?;
        (header.content_type == ContentType::Alert).then(|| AlertDescription::from_u8(rest[1]))
    }

    fn protocol() -> DtlsServerProtocol {
        let config = Config::builder().verify_requests(false).build().unwrap();
        DtlsServerProtocol::new(Arc::new(config))
    }

    #[test]
    fn no_shared_suite_is_handshake_failure() {
        let (server_end, client_end) = MemoryTransport::pair(1500);
        server_end.inject(&client_hello_datagram(
            vec![CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256],
            ProtocolVersion::DTLS1_2,
        ));

        let err = protocol()
            .accept(Arc::new(NoSuites), Arc::new(server_end), None)
            .err()
            .unwrap();
        assert_eq!(err.alert_description(), Some(AlertDescription::HandshakeFailure));

        let mut buf = [0; 1500];
        let n = client_end.receive(&mut buf, 100).unwrap().unwrap();
        assert_eq!(alert_in(&buf[..n]), Some(AlertDescription::HandshakeFailure));
    }

    #[test]
    fn old_client_version_is_protocol_version() {
        let (server_end, _client_end) = MemoryTransport::pair(1500);
        server_end.inject(&client_hello_datagram(
            vec![CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256],
            ProtocolVersion::DTLS1_0,
        ));

        let err = protocol()
            .accept(Arc::new(NoSuites), Arc::new(server_end), None)
            .err()
            .unwrap();
        assert_eq!(err.alert_description(), Some(AlertDescription::ProtocolVersion));
    }
}
