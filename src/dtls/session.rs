//! Resumable sessions and the per-handshake security parameters.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use zeroize::Zeroizing;

use crate::crypto::key_schedule::MASTER_SECRET_LEN;
use crate::message::{Random, SessionId};
use crate::types::{CipherSuite, ConnectionEnd, HashAlgorithm, HeartbeatMode};
use crate::types::{MaxFragmentLength, ProtocolVersion};
use crate::util::lock;

/// What a resumed handshake needs from the original one.
#[derive(Clone)]
pub struct SessionParameters {
    pub cipher_suite: CipherSuite,
    pub negotiated_version: ProtocolVersion,
    pub master_secret: Zeroizing<Vec<u8>>,
    pub extended_master_secret: bool,
    /// Peer certificate chain, DER, end-entity first. Empty for PSK.
    pub peer_certificate: Vec<Vec<u8>>,
    pub psk_identity: Option<Vec<u8>>,
    pub max_fragment_length: Option<MaxFragmentLength>,
}

impl fmt::Debug for SessionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionParameters")
            .field("cipher_suite", &self.cipher_suite)
            .field("negotiated_version", &self.negotiated_version)
            .field("extended_master_secret", &self.extended_master_secret)
            .finish()
    }
}

struct SessionInner {
    id: SessionId,
    parameters: Mutex<Option<SessionParameters>>,
}

/// A session identified by its ID.
///
/// Clones share state: invalidating one invalidates all of them, and the
/// master secret is wiped.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(id: SessionId, parameters: Option<SessionParameters>) -> Self {
        Session {
            inner: Arc::new(SessionInner {
                id,
                parameters: Mutex::new(parameters),
            }),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.inner.id
    }

    pub fn parameters(&self) -> Option<SessionParameters> {
        lock(&self.inner.parameters).clone()
    }

    /// Non-empty ID with DTLS 1.2 parameters and a full master secret.
    pub fn is_resumable(&self) -> bool {
        if self.inner.id.is_empty() {
            return false;
        }
        lock(&self.inner.parameters).as_ref().is_some_and(|p| {
            p.negotiated_version == ProtocolVersion::DTLS1_2
                && p.master_secret.len() == MASTER_SECRET_LEN
        })
    }

    pub fn invalidate(&self) {
        if lock(&self.inner.parameters).take().is_some() {
            debug!("Invalidated session {:?}", self.inner.id);
        }
    }

    pub fn same_as(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("resumable", &self.is_resumable())
            .finish()
    }
}

/// Bounded server side store of sessions, evicting the oldest first.
pub struct SessionCache {
    capacity: usize,
    sessions: Mutex<VecDeque<Session>>,
}

impl SessionCache {
    pub fn new(capacity: usize) -> Self {
        SessionCache {
            capacity: capacity.max(1),
            sessions: Mutex::new(VecDeque::new()),
        }
    }

    pub fn insert(&self, session: Session) {
        if session.id().is_empty() {
            return;
        }
        let mut sessions = lock(&self.sessions);
        sessions.retain(|s| s.id() != session.id());
        if sessions.len() == self.capacity {
            sessions.pop_front();
        }
        sessions.push_back(session);
    }

    /// A resumable session with this ID. Invalidated sessions are dropped.
    pub fn get(&self, id: &[u8]) -> Option<Session> {
        let mut sessions = lock(&self.sessions);
        sessions.retain(|s| s.is_resumable());
        sessions.iter().find(|s| s.id().as_ref() == id).cloned()
    }

    pub fn remove(&self, id: &[u8]) {
        lock(&self.sessions).retain(|s| s.id().as_ref() != id);
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

/// State negotiated by one handshake.
pub(crate) struct SecurityParameters {
    pub entity: ConnectionEnd,
    pub cipher_suite: CipherSuite,
    pub prf_hash: HashAlgorithm,
    pub negotiated_version: Option<ProtocolVersion>,
    pub client_random: Random,
    pub server_random: Random,
    pub session_id: SessionId,
    pub master_secret: Zeroizing<Vec<u8>>,
    pub session_hash: Vec<u8>,
    pub extended_master_secret: bool,
    pub secure_renegotiation: bool,
    pub resumed_session: bool,
    pub max_fragment_length: Option<MaxFragmentLength>,
    /// Connection ID the peer wants on records we send.
    pub connection_id_peer: Vec<u8>,
    /// Connection ID we want on records we receive.
    pub connection_id_local: Vec<u8>,
    /// Heartbeat mode the peer advertised.
    pub heartbeat_peer_mode: Option<HeartbeatMode>,
    pub status_request: bool,
    pub peer_certificate: Vec<Vec<u8>>,
    pub psk_identity: Option<Vec<u8>>,
    pub local_verify_data: Vec<u8>,
    pub peer_verify_data: Vec<u8>,
}

impl SecurityParameters {
    pub fn new(entity: ConnectionEnd) -> Self {
        SecurityParameters {
            entity,
            cipher_suite: CipherSuite::Unknown(0),
            prf_hash: HashAlgorithm::SHA256,
            negotiated_version: None,
            client_random: Random([0; Random::LEN]),
            server_random: Random([0; Random::LEN]),
            session_id: SessionId::empty(),
            master_secret: Zeroizing::new(Vec::new()),
            session_hash: Vec::new(),
            extended_master_secret: false,
            secure_renegotiation: false,
            resumed_session: false,
            max_fragment_length: None,
            connection_id_peer: Vec::new(),
            connection_id_local: Vec::new(),
            heartbeat_peer_mode: None,
            status_request: false,
            peer_certificate: Vec::new(),
            psk_identity: None,
            local_verify_data: Vec::new(),
            peer_verify_data: Vec::new(),
        }
    }

    /// Parameters to store for resumption.
    pub fn export(&self) -> SessionParameters {
        SessionParameters {
            cipher_suite: self.cipher_suite,
            negotiated_version: self.negotiated_version.unwrap_or_default(),
            master_secret: self.master_secret.clone(),
            extended_master_secret: self.extended_master_secret,
            peer_certificate: self.peer_certificate.clone(),
            psk_identity: self.psk_identity.clone(),
            max_fragment_length: self.max_fragment_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SessionParameters {
        SessionParameters {
            cipher_suite: CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
            negotiated_version: ProtocolVersion::DTLS1_2,
            master_secret: Zeroizing::new(vec![1; MASTER_SECRET_LEN]),
            extended_master_secret: true,
            peer_certificate: vec![],
            psk_identity: None,
            max_fragment_length: None,
        }
    }

    fn id(b: u8) -> SessionId {
        SessionId::try_new(&[b; 32]).unwrap()
    }

    #[test]
    fn resumability() {
        assert!(Session::new(id(1), Some(params())).is_resumable());
        assert!(!Session::new(SessionId::empty(), Some(params())).is_resumable());
        assert!(!Session::new(id(1), None).is_resumable());

        let mut short = params();
        short.master_secret = Zeroizing::new(vec![1; 20]);
        assert!(!Session::new(id(1), Some(short)).is_resumable());

        let mut old = params();
        old.negotiated_version = ProtocolVersion::DTLS1_0;
        assert!(!Session::new(id(1), Some(old)).is_resumable());
    }

    #[test]
    fn invalidate_is_shared() {
        let session = Session::new(id(2), Some(params()));
        let clone = session.clone();
        clone.invalidate();
        assert!(!session.is_resumable());
        assert!(session.parameters().is_none());
    }

    #[test]
    fn cache_evicts_oldest_and_skips_invalid() {
        let cache = SessionCache::new(2);
        let a = Session::new(id(1), Some(params()));
        cache.insert(a.clone());
        cache.insert(Session::new(id(2), Some(params())));
        cache.insert(Session::new(id(3), Some(params())));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&[1; 32]).is_none());
        assert!(cache.get(&[2; 32]).is_some());

        cache.get(&[3; 32]).unwrap().invalidate();
        assert!(cache.get(&[3; 32]).is_none());
        assert_eq!(cache.len(), 1);
    }
}
