//! Key exchange methods: ECDHE_ECDSA and plain PSK.

use std::sync::Arc;

use zeroize::Zeroizing;

use super::peer::{DtlsServer, PskIdentity};
use crate::buffer::Buf;
use crate::crypto::{ActiveKeyExchange, CryptoProvider, SigningKey};
use crate::message::{parse_ecdh_public, parse_psk_identity, serialize_ecdh_public};
use crate::message::{serialize_psk_identity, DigitallySigned, EcdheParams, SignedEcdheParams};
use crate::types::{AlertDescription, NamedGroup, SignatureAndHashAlgorithm};
use crate::Error;

/// One side of the premaster secret agreement.
///
/// Both ends drive the same object through their half of the messages:
/// the server through `server_key_exchange` and
/// `process_client_key_exchange`, the client through
/// `process_server_key_exchange` and `client_key_exchange`.
pub(crate) trait KeyExchange: Send {
    /// ServerKeyExchange body, `None` when the method sends none.
    fn server_key_exchange(
        &mut self,
        client_random: &[u8],
        server_random: &[u8],
    ) -> Result<Option<Vec<u8>>, Error>;

    /// `None` when the server sent no ServerKeyExchange.
    fn process_server_key_exchange(
        &mut self,
        body: Option<&[u8]>,
        client_random: &[u8],
        server_random: &[u8],
    ) -> Result<(), Error>;

    fn client_key_exchange(&mut self) -> Result<Vec<u8>, Error>;

    fn process_client_key_exchange(&mut self, body: &[u8]) -> Result<(), Error>;

    fn premaster_secret(&mut self) -> Result<Zeroizing<Vec<u8>>, Error>;

    /// PSK identity the exchange was keyed with.
    fn psk_identity(&self) -> Option<&[u8]> {
        None
    }
}

fn signed_data(client_random: &[u8], server_random: &[u8], params: &EcdheParams) -> Vec<u8> {
    let mut data = Buf::with_capacity(64 + 4 + params.public_key.len());
    data.extend_from_slice(client_random);
    data.extend_from_slice(server_random);
    params.serialize(&mut data);
    data.into_vec()
}

fn complete(active: Box<dyn ActiveKeyExchange>, peer_public: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut out = Buf::new();
    active
        .complete(peer_public, &mut out)
        .map_err(|e| Error::illegal_parameter(format!("key agreement failed: {}", e)))?;
    Ok(Zeroizing::new(out.into_vec()))
}

/// Client half of ECDHE_ECDSA.
pub(crate) struct EcdheClient {
    provider: CryptoProvider,
    /// End-entity certificate of the server.
    server_certificate: Vec<u8>,
    offered_groups: Vec<NamedGroup>,
    server_params: Option<EcdheParams>,
    active: Option<Box<dyn ActiveKeyExchange>>,
}

impl EcdheClient {
    pub fn new(provider: &CryptoProvider, server_certificate: Vec<u8>) -> Self {
        EcdheClient {
            provider: provider.clone(),
            server_certificate,
            offered_groups: provider.supported_groups().collect(),
            server_params: None,
            active: None,
        }
    }
}

impl KeyExchange for EcdheClient {
    fn server_key_exchange(&mut self, _: &[u8], _: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Err(Error::internal_error("client cannot send ServerKeyExchange"))
    }

    fn process_server_key_exchange(
        &mut self,
        body: Option<&[u8]>,
        client_random: &[u8],
        server_random: &[u8],
    ) -> Result<(), Error> {
        let body = body.ok_or_else(|| Error::unexpected_message("missing ServerKeyExchange"))?;
        let (_, ske) = SignedEcdheParams::parse(body)?;

        if !self.offered_groups.contains(&ske.params.group) {
            return Err(Error::illegal_parameter(format!(
                "server chose group {:?} we did not offer",
                ske.params.group
            )));
        }
        let algorithm = ske.signed.algorithm;
        if !SignatureAndHashAlgorithm::supported().contains(&algorithm) {
            return Err(Error::illegal_parameter(format!(
                "server signed with {:?} which we did not offer",
                algorithm
            )));
        }

        let data = signed_data(client_random, server_random, &ske.params);
        self.provider
            .signature_verification
            .verify_signature(
                &self.server_certificate,
                &data,
                &ske.signed.signature,
                algorithm.hash,
                algorithm.signature,
            )
            .map_err(|e| {
                Error::alert(
                    AlertDescription::DecryptError,
                    format!("ServerKeyExchange signature: {}", e),
                )
            })?;

        trace!("ServerKeyExchange verified, group {:?}", ske.params.group);
        self.server_params = Some(ske.params);
        Ok(())
    }

    fn client_key_exchange(&mut self) -> Result<Vec<u8>, Error> {
        let params = self
            .server_params
            .as_ref()
            .ok_or_else(|| Error::internal_error("no server params"))?;
        let group = self
            .provider
            .find_kx_group(params.group)
            .ok_or_else(|| Error::internal_error("group not supported by provider"))?;
        let active = group
            .start_exchange(Buf::new())
            .map_err(Error::CryptoError)?;

        let mut body = Buf::new();
        serialize_ecdh_public(active.pub_key(), &mut body);
        self.active = Some(active);
        Ok(body.into_vec())
    }

    fn process_client_key_exchange(&mut self, _: &[u8]) -> Result<(), Error> {
        Err(Error::internal_error("client cannot receive ClientKeyExchange"))
    }

    fn premaster_secret(&mut self) -> Result<Zeroizing<Vec<u8>>, Error> {
        let active = self
            .active
            .take()
            .ok_or_else(|| Error::internal_error("key exchange not started"))?;
        let params = self
            .server_params
            .as_ref()
            .ok_or_else(|| Error::internal_error("no server params"))?;
        complete(active, &params.public_key)
    }
}

/// Server half of ECDHE_ECDSA.
pub(crate) struct EcdheServer {
    provider: CryptoProvider,
    group: NamedGroup,
    signing_key: Box<dyn SigningKey>,
    algorithm: SignatureAndHashAlgorithm,
    active: Option<Box<dyn ActiveKeyExchange>>,
    client_public: Option<Vec<u8>>,
}

impl EcdheServer {
    /// `client_algorithms` is the client's signature_algorithms extension,
    /// if it sent one.
    pub fn new(
        provider: &CryptoProvider,
        group: NamedGroup,
        signing_key: Box<dyn SigningKey>,
        client_algorithms: Option<&[SignatureAndHashAlgorithm]>,
    ) -> Result<Self, Error> {
        let algorithm =
            SignatureAndHashAlgorithm::new(signing_key.hash_algorithm(), signing_key.algorithm());
        if let Some(offered) = client_algorithms {
            if !offered.contains(&algorithm) {
                return Err(Error::handshake_failure(format!(
                    "client does not accept {:?} signatures",
                    algorithm
                )));
            }
        }

        Ok(EcdheServer {
            provider: provider.clone(),
            group,
            signing_key,
            algorithm,
            active: None,
            client_public: None,
        })
    }
}

impl KeyExchange for EcdheServer {
    fn server_key_exchange(
        &mut self,
        client_random: &[u8],
        server_random: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        let group = self
            .provider
            .find_kx_group(self.group)
            .ok_or_else(|| Error::internal_error("group not supported by provider"))?;
        let active = group
            .start_exchange(Buf::new())
            .map_err(Error::CryptoError)?;

        let params = EcdheParams {
            group: self.group,
            public_key: active.pub_key().to_vec(),
        };
        let data = signed_data(client_random, server_random, &params);

        let mut signature = Buf::new();
        self.signing_key
            .sign(&data, &mut signature)
            .map_err(Error::CryptoError)?;

        let ske = SignedEcdheParams {
            params,
            signed: DigitallySigned {
                algorithm: self.algorithm,
                signature: signature.into_vec(),
            },
        };
        let mut body = Buf::new();
        ske.serialize(&mut body);

        self.active = Some(active);
        Ok(Some(body.into_vec()))
    }

    fn process_server_key_exchange(
        &mut self,
        _: Option<&[u8]>,
        _: &[u8],
        _: &[u8],
    ) -> Result<(), Error> {
        Err(Error::internal_error("server cannot receive ServerKeyExchange"))
    }

    fn client_key_exchange(&mut self) -> Result<Vec<u8>, Error> {
        Err(Error::internal_error("server cannot send ClientKeyExchange"))
    }

    fn process_client_key_exchange(&mut self, body: &[u8]) -> Result<(), Error> {
        let (_, point) = parse_ecdh_public(body)?;
        self.client_public = Some(point.to_vec());
        Ok(())
    }

    fn premaster_secret(&mut self) -> Result<Zeroizing<Vec<u8>>, Error> {
        let active = self
            .active
            .take()
            .ok_or_else(|| Error::internal_error("key exchange not started"))?;
        let client_public = self
            .client_public
            .as_ref()
            .ok_or_else(|| Error::internal_error("no client public key"))?;
        complete(active, client_public)
    }
}

/// rfc4279 2: `uint16 N, N zeroes, uint16 N, psk`.
fn psk_premaster_secret(psk: &[u8]) -> Zeroizing<Vec<u8>> {
    let n = psk.len() as u16;
    let mut out = Zeroizing::new(Vec::with_capacity(4 + 2 * psk.len()));
    out.extend_from_slice(&n.to_be_bytes());
    out.resize(2 + psk.len(), 0);
    out.extend_from_slice(&n.to_be_bytes());
    out.extend_from_slice(psk);
    out
}

/// Client half of PSK.
pub(crate) struct PskClient {
    identity: PskIdentity,
}

impl PskClient {
    pub fn new(identity: PskIdentity) -> Self {
        PskClient { identity }
    }
}

impl KeyExchange for PskClient {
    fn server_key_exchange(&mut self, _: &[u8], _: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Err(Error::internal_error("client cannot send ServerKeyExchange"))
    }

    fn process_server_key_exchange(
        &mut self,
        body: Option<&[u8]>,
        _: &[u8],
        _: &[u8],
    ) -> Result<(), Error> {
        if let Some(body) = body {
            let (_, hint) = parse_psk_identity(body)?;
            debug!("PSK identity hint: {}", String::from_utf8_lossy(hint));
        }
        Ok(())
    }

    fn client_key_exchange(&mut self) -> Result<Vec<u8>, Error> {
        let mut body = Buf::new();
        serialize_psk_identity(&self.identity.identity, &mut body);
        Ok(body.into_vec())
    }

    fn process_client_key_exchange(&mut self, _: &[u8]) -> Result<(), Error> {
        Err(Error::internal_error("client cannot receive ClientKeyExchange"))
    }

    fn premaster_secret(&mut self) -> Result<Zeroizing<Vec<u8>>, Error> {
        Ok(psk_premaster_secret(&self.identity.key))
    }

    fn psk_identity(&self) -> Option<&[u8]> {
        Some(&self.identity.identity)
    }
}

/// Server half of PSK. Keys are looked up through the host.
pub(crate) struct PskServer {
    server: Arc<dyn DtlsServer>,
    identity: Option<Vec<u8>>,
    psk: Option<Zeroizing<Vec<u8>>>,
}

impl PskServer {
    pub fn new(server: Arc<dyn DtlsServer>) -> Self {
        PskServer {
            server,
            identity: None,
            psk: None,
        }
    }
}

impl KeyExchange for PskServer {
    fn server_key_exchange(&mut self, _: &[u8], _: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.server.psk_identity_hint().map(|hint| {
            let mut body = Buf::new();
            serialize_psk_identity(&hint, &mut body);
            body.into_vec()
        }))
    }

    fn process_server_key_exchange(
        &mut self,
        _: Option<&[u8]>,
        _: &[u8],
        _: &[u8],
    ) -> Result<(), Error> {
        Err(Error::internal_error("server cannot receive ServerKeyExchange"))
    }

    fn client_key_exchange(&mut self) -> Result<Vec<u8>, Error> {
        Err(Error::internal_error("server cannot send ClientKeyExchange"))
    }

    fn process_client_key_exchange(&mut self, body: &[u8]) -> Result<(), Error> {
        let (_, identity) = parse_psk_identity(body)?;
        let psk = self.server.psk(identity).ok_or_else(|| {
            Error::alert(
                AlertDescription::UnknownPskIdentity,
                format!("unknown PSK identity {}", String::from_utf8_lossy(identity)),
            )
        })?;
        self.identity = Some(identity.to_vec());
        self.psk = Some(psk);
        Ok(())
    }

    fn premaster_secret(&mut self) -> Result<Zeroizing<Vec<u8>>, Error> {
        let psk = self
            .psk
            .as_ref()
            .ok_or_else(|| Error::internal_error("no PSK"))?;
        Ok(psk_premaster_secret(psk))
    }

    fn psk_identity(&self) -> Option<&[u8]> {
        self.identity.as_deref()
    }
}
