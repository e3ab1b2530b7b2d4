//! Host callbacks consulted during the handshake.
//!
//! Every method has a default so hosts only implement what they use.
//! Callbacks take `&self`; implementations keep their own interior state.

use std::fmt;

use zeroize::Zeroizing;

use super::session::Session;
use crate::crypto::{CryptoProvider, SigningKey};
use crate::message::{CertificateRequest, NewSessionTicket};
use crate::types::{AlertDescription, AlertLevel};
use crate::Error;

/// Certificate chain and the private key of its end-entity certificate.
pub struct Credentials {
    /// DER certificates, end-entity first.
    pub certificate_chain: Vec<Vec<u8>>,
    pub signing_key: Box<dyn SigningKey>,
}

impl Credentials {
    /// Load credentials from a DER chain and a DER or PEM private key.
    pub fn from_der(
        certificate_chain: Vec<Vec<u8>>,
        private_key: &[u8],
        provider: &CryptoProvider,
    ) -> Result<Self, Error> {
        if certificate_chain.is_empty() {
            return Err(Error::ConfigError("empty certificate chain".into()));
        }
        let signing_key = provider
            .key_provider
            .load_private_key(private_key)
            .map_err(Error::ConfigError)?;
        Ok(Credentials {
            certificate_chain,
            signing_key,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("certificates", &self.certificate_chain.len())
            .field("signing_key", &self.signing_key)
            .finish()
    }
}

/// A pre-shared key and the identity that names it.
#[derive(Clone)]
pub struct PskIdentity {
    pub identity: Vec<u8>,
    pub key: Zeroizing<Vec<u8>>,
}

impl PskIdentity {
    pub fn new(identity: &[u8], key: &[u8]) -> Self {
        PskIdentity {
            identity: identity.to_vec(),
            key: Zeroizing::new(key.to_vec()),
        }
    }
}

impl fmt::Debug for PskIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PskIdentity")
            .field("identity", &String::from_utf8_lossy(&self.identity))
            .finish()
    }
}

/// Callbacks common to both ends.
pub trait DtlsPeer: Send + Sync {
    /// We are sending an alert to the peer.
    fn notify_alert_raised(
        &self,
        level: AlertLevel,
        description: AlertDescription,
        message: Option<&str>,
    ) {
        let _ = (level, description, message);
    }

    fn notify_alert_received(&self, level: AlertLevel, description: AlertDescription) {
        let _ = (level, description);
    }

    fn notify_handshake_complete(&self) {}
}

pub trait DtlsClient: DtlsPeer {
    /// Identity and key for PSK suites. PSK suites are only offered when
    /// this returns something.
    fn psk_identity(&self) -> Option<PskIdentity> {
        None
    }

    /// Credentials answering a CertificateRequest. `None` sends an empty
    /// certificate.
    fn client_credentials(&self, request: &CertificateRequest) -> Option<Credentials> {
        let _ = request;
        None
    }

    /// Decide whether to trust the server's chain. The handshake checks the
    /// ServerKeyExchange signature against the end-entity certificate
    /// itself.
    fn verify_server_certificate(&self, chain: &[Vec<u8>]) -> Result<(), Error> {
        let _ = chain;
        Ok(())
    }

    /// A session to offer for resumption.
    fn session_to_resume(&self) -> Option<Session> {
        None
    }

    /// The session established by a completed handshake.
    fn notify_session(&self, session: &Session) {
        let _ = session;
    }

    /// OCSP response stapled by the server.
    fn notify_certificate_status(&self, ocsp_response: &[u8]) {
        let _ = ocsp_response;
    }

    fn notify_new_session_ticket(&self, ticket: &NewSessionTicket) {
        let _ = ticket;
    }
}

pub trait DtlsServer: DtlsPeer {
    /// Certificate and key for ECDHE_ECDSA suites. Those suites are only
    /// selected when this returns something.
    fn server_credentials(&self) -> Option<Credentials> {
        None
    }

    /// Whether PSK suites may be selected.
    fn supports_psk(&self) -> bool {
        false
    }

    fn psk_identity_hint(&self) -> Option<Vec<u8>> {
        None
    }

    /// Key for a client's PSK identity.
    fn psk(&self, identity: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        let _ = identity;
        None
    }

    /// Decide whether to trust a client certificate chain. Only called for
    /// non-empty chains.
    fn verify_client_certificate(&self, chain: &[Vec<u8>]) -> Result<(), Error> {
        let _ = chain;
        Ok(())
    }

    /// Look up a session the client asked to resume.
    fn session_to_resume(&self, session_id: &[u8]) -> Option<Session> {
        let _ = session_id;
        None
    }

    /// The session established by a completed full handshake.
    fn notify_session(&self, session: &Session) {
        let _ = session;
    }

    /// OCSP response to staple when the client asks for one.
    fn certificate_status(&self) -> Option<Vec<u8>> {
        None
    }

    /// Whether to answer a client's session_ticket extension.
    fn issues_session_tickets(&self) -> bool {
        false
    }

    fn new_session_ticket(&self) -> NewSessionTicket {
        NewSessionTicket {
            ticket_lifetime_hint: 0,
            ticket: Vec::new(),
        }
    }
}
