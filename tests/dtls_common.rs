//! Shared helpers for the DTLS integration tests.
//!
//! This file has no `#[test]` functions; Cargo compiles it as a no-op binary.
//! Import it from other test files via `mod dtls_common;`.

#![allow(unused)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use zeroize::Zeroizing;

use dgramtls::crypto::rust_crypto::default_provider;
use dgramtls::message::{CertificateRequest, NewSessionTicket};
use dgramtls::types::{AlertDescription, AlertLevel};
use dgramtls::{
    Config, ConfigBuilder, Credentials, DatagramTransport, DtlsCertificate, DtlsClient,
    DtlsClientProtocol, DtlsPeer, DtlsServer, DtlsServerProtocol, DtlsTransport, Error,
    MemoryTransport, PskIdentity, Session, SessionCache,
};

pub const MTU: usize = 1200;
pub const PSK_IDENTITY: &[u8] = b"client";
pub const PSK_KEY: &[u8] = b"0123456789abcdef";

/// Record content types (RFC 6347, RFC 9146).
pub const CHANGE_CIPHER_SPEC: u8 = 20;
pub const ALERT: u8 = 21;
pub const HANDSHAKE: u8 = 22;
pub const APPLICATION_DATA: u8 = 23;
pub const HEARTBEAT: u8 = 24;
pub const TLS12_CID: u8 = 25;

/// Content type of every record in a datagram. CID records are skipped
/// by length only when `cid_len` is given.
pub fn record_types(datagram: &[u8], cid_len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + 13 <= datagram.len() {
        let ctype = datagram[i];
        let extra = if ctype == TLS12_CID { cid_len } else { 0 };
        if i + 13 + extra > datagram.len() {
            break;
        }
        let len_at = i + 11 + extra;
        let len = u16::from_be_bytes([datagram[len_at], datagram[len_at + 1]]) as usize;
        out.push(ctype);
        i += 13 + extra + len;
    }
    out
}

/// Handshake message types of the plaintext handshake records in a datagram.
pub fn handshake_types(datagram: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + 13 <= datagram.len() {
        let ctype = datagram[i];
        let epoch = u16::from_be_bytes([datagram[i + 3], datagram[i + 4]]);
        let len = u16::from_be_bytes([datagram[i + 11], datagram[i + 12]]) as usize;
        if ctype == HANDSHAKE && epoch == 0 && i + 13 < datagram.len() {
            out.push(datagram[i + 13]);
        }
        i += 13 + len;
    }
    out
}

/// Config builder with short timers and no inline cookie exchange.
pub fn config() -> ConfigBuilder {
    Config::builder()
        .verify_requests(false)
        .flight_start_rto(Duration::from_millis(100))
        .handshake_timeout(Duration::from_secs(10))
}

pub fn certificate(name: &str) -> DtlsCertificate {
    DtlsCertificate::generate_for(name).expect("generate certificate")
}

/// Client peer recording what the handshake tells it.
#[derive(Default)]
pub struct TestClient {
    pub certificate: Option<DtlsCertificate>,
    pub psk: Option<PskIdentity>,
    pub resume: Mutex<Option<Session>>,
    pub session: Mutex<Option<Session>>,
    pub server_chain: Mutex<Option<Vec<Vec<u8>>>>,
    pub certificate_requested: Mutex<bool>,
    pub ocsp_response: Mutex<Option<Vec<u8>>>,
    pub ticket: Mutex<Option<NewSessionTicket>>,
    pub alerts_received: Mutex<Vec<AlertDescription>>,
    pub alerts_raised: Mutex<Vec<AlertDescription>>,
    pub completed: Mutex<bool>,
}

impl TestClient {
    pub fn new() -> Self {
        TestClient::default()
    }

    pub fn with_certificate(certificate: DtlsCertificate) -> Self {
        TestClient {
            certificate: Some(certificate),
            ..TestClient::default()
        }
    }

    pub fn with_psk(identity: &[u8], key: &[u8]) -> Self {
        TestClient {
            psk: Some(PskIdentity::new(identity, key)),
            ..TestClient::default()
        }
    }

    pub fn resuming(session: Session) -> Self {
        TestClient {
            resume: Mutex::new(Some(session)),
            ..TestClient::default()
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }
}

impl DtlsPeer for TestClient {
    fn notify_alert_raised(
        &self,
        _level: AlertLevel,
        description: AlertDescription,
        _message: Option<&str>,
    ) {
        self.alerts_raised.lock().unwrap().push(description);
    }

    fn notify_alert_received(&self, _level: AlertLevel, description: AlertDescription) {
        self.alerts_received.lock().unwrap().push(description);
    }

    fn notify_handshake_complete(&self) {
        *self.completed.lock().unwrap() = true;
    }
}

impl DtlsClient for TestClient {
    fn psk_identity(&self) -> Option<PskIdentity> {
        self.psk.clone()
    }

    fn client_credentials(&self, _request: &CertificateRequest) -> Option<Credentials> {
        *self.certificate_requested.lock().unwrap() = true;
        let certificate = self.certificate.as_ref()?;
        certificate.credentials(&default_provider()).ok()
    }

    fn verify_server_certificate(&self, chain: &[Vec<u8>]) -> Result<(), Error> {
        *self.server_chain.lock().unwrap() = Some(chain.to_vec());
        Ok(())
    }

    fn session_to_resume(&self) -> Option<Session> {
        self.resume.lock().unwrap().clone()
    }

    fn notify_session(&self, session: &Session) {
        *self.session.lock().unwrap() = Some(session.clone());
    }

    fn notify_certificate_status(&self, ocsp_response: &[u8]) {
        *self.ocsp_response.lock().unwrap() = Some(ocsp_response.to_vec());
    }

    fn notify_new_session_ticket(&self, ticket: &NewSessionTicket) {
        *self.ticket.lock().unwrap() = Some(ticket.clone());
    }
}

/// Server peer with an ECDSA certificate, an optional PSK and a session
/// cache.
pub struct TestServer {
    pub certificate: Option<DtlsCertificate>,
    pub psk: Option<(Vec<u8>, Vec<u8>)>,
    pub cache: SessionCache,
    pub ocsp_response: Option<Vec<u8>>,
    pub tickets: bool,
    pub reject_client_certificates: bool,
    pub client_chain: Mutex<Option<Vec<Vec<u8>>>>,
    pub sessions_established: Mutex<usize>,
    pub alerts_received: Mutex<Vec<AlertDescription>>,
    pub alerts_raised: Mutex<Vec<AlertDescription>>,
}

impl TestServer {
    pub fn new(certificate: DtlsCertificate) -> Self {
        TestServer {
            certificate: Some(certificate),
            psk: None,
            cache: SessionCache::new(16),
            ocsp_response: None,
            tickets: false,
            reject_client_certificates: false,
            client_chain: Mutex::new(None),
            sessions_established: Mutex::new(0),
            alerts_received: Mutex::new(Vec::new()),
            alerts_raised: Mutex::new(Vec::new()),
        }
    }

    pub fn with_psk(identity: &[u8], key: &[u8]) -> Self {
        TestServer {
            certificate: None,
            psk: Some((identity.to_vec(), key.to_vec())),
            ..TestServer::new(certificate("unused"))
        }
    }

    pub fn sessions_established(&self) -> usize {
        *self.sessions_established.lock().unwrap()
    }
}

impl DtlsPeer for TestServer {
    fn notify_alert_raised(
        &self,
        _level: AlertLevel,
        description: AlertDescription,
        _message: Option<&str>,
    ) {
        self.alerts_raised.lock().unwrap().push(description);
    }

    fn notify_alert_received(&self, _level: AlertLevel, description: AlertDescription) {
        self.alerts_received.lock().unwrap().push(description);
    }
}

impl DtlsServer for TestServer {
    fn server_credentials(&self) -> Option<Credentials> {
        let certificate = self.certificate.as_ref()?;
        certificate.credentials(&default_provider()).ok()
    }

    fn supports_psk(&self) -> bool {
        self.psk.is_some()
    }

    fn psk_identity_hint(&self) -> Option<Vec<u8>> {
        self.psk.as_ref().map(|_| b"hint".to_vec())
    }

    fn psk(&self, identity: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        let (known, key) = self.psk.as_ref()?;
        (known.as_slice() == identity).then(|| Zeroizing::new(key.clone()))
    }

    fn verify_client_certificate(&self, chain: &[Vec<u8>]) -> Result<(), Error> {
        *self.client_chain.lock().unwrap() = Some(chain.to_vec());
        if self.reject_client_certificates {
            return Err(Error::alert(
                AlertDescription::BadCertificate,
                "client certificate not trusted",
            ));
        }
        Ok(())
    }

    fn session_to_resume(&self, session_id: &[u8]) -> Option<Session> {
        self.cache.get(session_id)
    }

    fn notify_session(&self, session: &Session) {
        *self.sessions_established.lock().unwrap() += 1;
        self.cache.insert(session.clone());
    }

    fn certificate_status(&self) -> Option<Vec<u8>> {
        self.ocsp_response.clone()
    }

    fn issues_session_tickets(&self) -> bool {
        self.tickets
    }

    fn new_session_ticket(&self) -> NewSessionTicket {
        NewSessionTicket {
            ticket_lifetime_hint: 3600,
            ticket: b"opaque ticket".to_vec(),
        }
    }
}

/// Both ends of an in-memory datagram pipe.
pub struct Pipe {
    pub client: Arc<MemoryTransport>,
    pub server: Arc<MemoryTransport>,
}

impl Pipe {
    pub fn new(mtu: usize) -> Self {
        let (client, server) = MemoryTransport::pair(mtu);
        Pipe {
            client: Arc::new(client),
            server: Arc::new(server),
        }
    }
}

/// Run both handshakes, the server on its own thread.
pub fn handshake<C, S>(
    pipe: &Pipe,
    client_config: Config,
    client: Arc<C>,
    server_config: Config,
    server: Arc<S>,
) -> (Result<DtlsTransport, Error>, Result<DtlsTransport, Error>)
where
    C: DtlsClient + 'static,
    S: DtlsServer + 'static,
{
    let server_transport: Arc<dyn DatagramTransport> = pipe.server.clone();
    let server_thread = thread::spawn(move || {
        DtlsServerProtocol::new(Arc::new(server_config)).accept(server, server_transport, None)
    });

    let client_transport: Arc<dyn DatagramTransport> = pipe.client.clone();
    let client_result =
        DtlsClientProtocol::new(Arc::new(client_config)).connect(client, client_transport);

    let server_result = server_thread.join().expect("server thread panicked");
    (client_result, server_result)
}

/// Send `payload` on `from` and expect it to arrive on `to`.
pub fn assert_delivers(from: &DtlsTransport, to: &DtlsTransport, payload: &[u8]) {
    from.send(payload).expect("send");
    let mut buf = vec![0; to.receive_limit()];
    let n = to
        .receive(&mut buf, 2000)
        .expect("receive")
        .expect("data before timeout");
    assert_eq!(&buf[..n], payload);
}
