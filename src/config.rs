use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::crypto::CryptoProvider;
use crate::timeout::{Clock, MonotonicClock};
use crate::types::{CipherSuite, HeartbeatMode, MaxFragmentLength};
use crate::Error;

/// Whether a server asks the client for a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuth {
    /// No CertificateRequest is sent.
    None,
    /// CertificateRequest is sent, an empty client Certificate is accepted.
    Optional,
    /// CertificateRequest is sent, an empty client Certificate fails the handshake.
    Required,
}

/// DTLS configuration
#[derive(Clone)]
pub struct Config {
    cipher_suites: Vec<CipherSuite>,
    handshake_timeout: Duration,
    flight_start_rto: Duration,
    flight_max_rto: Duration,
    crypto_provider: CryptoProvider,
    with_extended_master_secret: bool,
    require_extended_master_secret: bool,
    allow_legacy_resumption: bool,
    client_auth: ClientAuth,
    verify_requests: bool,
    connection_id: Option<Vec<u8>>,
    max_fragment_length: Option<MaxFragmentLength>,
    heartbeat_policy: Option<HeartbeatMode>,
    heartbeat_interval: Option<Duration>,
    heartbeat_timeout: Duration,
    request_certificate_status: bool,
    request_session_ticket: bool,
    rng_seed: Option<u64>,
    clock: Arc<dyn Clock>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            cipher_suites: CipherSuite::all().to_vec(),
            handshake_timeout: Duration::from_secs(40),
            flight_start_rto: Duration::from_secs(1),
            flight_max_rto: Duration::from_secs(60),
            crypto_provider: None,
            with_extended_master_secret: true,
            require_extended_master_secret: false,
            allow_legacy_resumption: false,
            client_auth: ClientAuth::None,
            verify_requests: true,
            connection_id: None,
            max_fragment_length: None,
            heartbeat_policy: None,
            heartbeat_interval: None,
            heartbeat_timeout: Duration::from_secs(10),
            request_certificate_status: false,
            request_session_ticket: false,
            rng_seed: None,
            clock: None,
        }
    }

    /// Cipher suites we offer (client) or accept (server), in preference order.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    /// Timeout for the entire handshake, regardless of flights.
    ///
    /// Zero means the handshake may take forever.
    #[inline(always)]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Time of first flight retransmission.
    ///
    /// Every flight restarts with this value and it doubles on every resend.
    #[inline(always)]
    pub fn flight_start_rto(&self) -> Duration {
        self.flight_start_rto
    }

    /// Upper bound for the doubling flight retransmission timer.
    #[inline(always)]
    pub fn flight_max_rto(&self) -> Duration {
        self.flight_max_rto
    }

    /// Cryptographic provider.
    ///
    /// Provides all cryptographic operations (ciphers, key exchange, signing, etc.).
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Whether to offer (client) or accept (server) Extended Master Secret (rfc7627).
    #[inline(always)]
    pub fn with_extended_master_secret(&self) -> bool {
        self.with_extended_master_secret
    }

    /// Fail handshakes where the peer does not negotiate Extended Master Secret.
    #[inline(always)]
    pub fn require_extended_master_secret(&self) -> bool {
        self.require_extended_master_secret
    }

    /// Allow resuming sessions that were established without Extended Master Secret.
    #[inline(always)]
    pub fn allow_legacy_resumption(&self) -> bool {
        self.allow_legacy_resumption
    }

    /// For a server, whether to request a client certificate.
    #[inline(always)]
    pub fn client_auth(&self) -> ClientAuth {
        self.client_auth
    }

    /// For a server accepting without a pre-verified request, run the
    /// HelloVerifyRequest cookie exchange before the handshake.
    #[inline(always)]
    pub fn verify_requests(&self) -> bool {
        self.verify_requests
    }

    /// Connection ID we ask the peer to put on records sent to us (rfc9146).
    ///
    /// `None` does not negotiate connection IDs. An empty ID negotiates
    /// support without asking the peer to use one.
    #[inline(always)]
    pub fn connection_id(&self) -> Option<&[u8]> {
        self.connection_id.as_deref()
    }

    /// For a client, the max_fragment_length to request (rfc6066).
    #[inline(always)]
    pub fn max_fragment_length(&self) -> Option<MaxFragmentLength> {
        self.max_fragment_length
    }

    /// Heartbeat mode to advertise (rfc6520). `None` leaves the extension out.
    #[inline(always)]
    pub fn heartbeat_policy(&self) -> Option<HeartbeatMode> {
        self.heartbeat_policy
    }

    /// Idle time after which we send a heartbeat request, if the peer allows it.
    #[inline(always)]
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
    }

    /// How long to wait for a heartbeat response before failing the connection.
    #[inline(always)]
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    /// For a client, ask the server for OCSP stapling (rfc6066 status_request).
    #[inline(always)]
    pub fn request_certificate_status(&self) -> bool {
        self.request_certificate_status
    }

    /// For a client, signal support for NewSessionTicket (rfc5077).
    #[inline(always)]
    pub fn request_session_ticket(&self) -> bool {
        self.request_session_ticket
    }

    /// Seed for non-cryptographic randomness.
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }

    /// Time source for handshake, retransmission and heartbeat timers.
    #[inline(always)]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    pub(crate) fn handshake_timeout_millis(&self) -> u32 {
        self.handshake_timeout.as_millis().min(u32::MAX as u128) as u32
    }

    pub(crate) fn flight_start_rto_millis(&self) -> u32 {
        self.flight_start_rto.as_millis().min(u32::MAX as u128) as u32
    }

    pub(crate) fn flight_max_rto_millis(&self) -> u32 {
        self.flight_max_rto.as_millis().min(u32::MAX as u128) as u32
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("cipher_suites", &self.cipher_suites)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("flight_start_rto", &self.flight_start_rto)
            .field("flight_max_rto", &self.flight_max_rto)
            .field("crypto_provider", &self.crypto_provider)
            .field("with_extended_master_secret", &self.with_extended_master_secret)
            .field("require_extended_master_secret", &self.require_extended_master_secret)
            .field("allow_legacy_resumption", &self.allow_legacy_resumption)
            .field("client_auth", &self.client_auth)
            .field("verify_requests", &self.verify_requests)
            .field("connection_id", &self.connection_id)
            .field("max_fragment_length", &self.max_fragment_length)
            .field("heartbeat_policy", &self.heartbeat_policy)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("heartbeat_timeout", &self.heartbeat_timeout)
            .field("request_certificate_status", &self.request_certificate_status)
            .field("request_session_ticket", &self.request_session_ticket)
            .field("rng_seed", &self.rng_seed)
            .finish_non_exhaustive()
    }
}

/// Builder for DTLS configuration.
pub struct ConfigBuilder {
    cipher_suites: Vec<CipherSuite>,
    handshake_timeout: Duration,
    flight_start_rto: Duration,
    flight_max_rto: Duration,
    crypto_provider: Option<CryptoProvider>,
    with_extended_master_secret: bool,
    require_extended_master_secret: bool,
    allow_legacy_resumption: bool,
    client_auth: ClientAuth,
    verify_requests: bool,
    connection_id: Option<Vec<u8>>,
    max_fragment_length: Option<MaxFragmentLength>,
    heartbeat_policy: Option<HeartbeatMode>,
    heartbeat_interval: Option<Duration>,
    heartbeat_timeout: Duration,
    request_certificate_status: bool,
    request_session_ticket: bool,
    rng_seed: Option<u64>,
    clock: Option<Arc<dyn Clock>>,
}

impl ConfigBuilder {
    /// Set the cipher suites, in preference order.
    ///
    /// Defaults to every implemented suite.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = suites.to_vec();
        self
    }

    /// Set the timeout for the entire handshake, regardless of flights.
    ///
    /// Defaults to 40 seconds. Zero disables it.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the time of first retry.
    ///
    /// Defaults to 1 second.
    pub fn flight_start_rto(mut self, rto: Duration) -> Self {
        self.flight_start_rto = rto;
        self
    }

    /// Set the cap for the doubling retry timer.
    ///
    /// Defaults to 60 seconds.
    pub fn flight_max_rto(mut self, rto: Duration) -> Self {
        self.flight_max_rto = rto;
        self
    }

    /// Set a custom crypto provider.
    ///
    /// If not set, the installed default or the built-in RustCrypto
    /// provider is used.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Set whether to enable Extended Master Secret extension (rfc7627)
    ///
    /// Defaults to true.
    pub fn with_extended_master_secret(mut self, enable: bool) -> Self {
        self.with_extended_master_secret = enable;
        self
    }

    /// Defaults to false.
    pub fn require_extended_master_secret(mut self, require: bool) -> Self {
        self.require_extended_master_secret = require;
        self
    }

    /// Defaults to false.
    pub fn allow_legacy_resumption(mut self, allow: bool) -> Self {
        self.allow_legacy_resumption = allow;
        self
    }

    /// Defaults to [`ClientAuth::None`].
    pub fn client_auth(mut self, client_auth: ClientAuth) -> Self {
        self.client_auth = client_auth;
        self
    }

    /// Defaults to true.
    pub fn verify_requests(mut self, verify: bool) -> Self {
        self.verify_requests = verify;
        self
    }

    /// Set the connection ID peers should address us with.
    ///
    /// Defaults to none.
    pub fn connection_id(mut self, cid: Vec<u8>) -> Self {
        self.connection_id = Some(cid);
        self
    }

    pub fn max_fragment_length(mut self, max: MaxFragmentLength) -> Self {
        self.max_fragment_length = Some(max);
        self
    }

    pub fn heartbeat_policy(mut self, mode: HeartbeatMode) -> Self {
        self.heartbeat_policy = Some(mode);
        self
    }

    /// Send heartbeat requests after this much idle time.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Defaults to 10 seconds.
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn request_certificate_status(mut self, request: bool) -> Self {
        self.request_certificate_status = request;
        self
    }

    pub fn request_session_ticket(mut self, request: bool) -> Self {
        self.request_session_ticket = request;
        self
    }

    /// Seed the non-cryptographic RNG for reproducible runs.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Replace the clock. Defaults to [`MonotonicClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::ConfigError` if the provider is invalid, no real
    /// cipher suite is configured, or a setting is out of range.
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .or_else(|| CryptoProvider::get_default().cloned())
            .unwrap_or_else(crate::crypto::rust_crypto::default_provider);

        crypto_provider.validate()?;

        if !self.cipher_suites.iter().any(|s| s.is_real()) {
            return Err(Error::ConfigError("no cipher suites configured".into()));
        }

        for suite in self.cipher_suites.iter().filter(|s| s.is_real()) {
            if crypto_provider.find_cipher_suite(*suite).is_none() {
                return Err(Error::ConfigError(format!(
                    "cipher suite {:?} not supported by crypto provider",
                    suite
                )));
            }
        }

        if let Some(cid) = &self.connection_id {
            if cid.len() > 255 {
                return Err(Error::ConfigError("connection id longer than 255".into()));
            }
        }

        if self.flight_start_rto.is_zero() {
            return Err(Error::ConfigError("flight_start_rto must be > 0".into()));
        }

        Ok(Config {
            cipher_suites: self.cipher_suites,
            handshake_timeout: self.handshake_timeout,
            flight_start_rto: self.flight_start_rto,
            flight_max_rto: self.flight_max_rto.max(self.flight_start_rto),
            crypto_provider,
            with_extended_master_secret: self.with_extended_master_secret,
            require_extended_master_secret: self.require_extended_master_secret,
            allow_legacy_resumption: self.allow_legacy_resumption,
            client_auth: self.client_auth,
            verify_requests: self.verify_requests,
            connection_id: self.connection_id,
            max_fragment_length: self.max_fragment_length,
            heartbeat_policy: self.heartbeat_policy,
            heartbeat_interval: self.heartbeat_interval,
            heartbeat_timeout: self.heartbeat_timeout,
            request_certificate_status: self.request_certificate_status,
            request_session_ticket: self.request_session_ticket,
            rng_seed: self.rng_seed,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::default())),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.handshake_timeout(), Duration::from_secs(40));
        assert_eq!(config.flight_start_rto_millis(), 1000);
        assert_eq!(config.flight_max_rto_millis(), 60_000);
        assert!(config.with_extended_master_secret());
        assert!(!config.require_extended_master_secret());
        assert!(config.verify_requests());
        assert_eq!(config.client_auth(), ClientAuth::None);
        assert!(config.connection_id().is_none());
    }

    #[test]
    fn debug_lists_settings_without_clock() {
        let config = Config::builder().connection_id(vec![1, 2]).build().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.starts_with("Config {"));
        assert!(debug.contains("connection_id: Some([1, 2])"));
        assert!(!debug.contains("clock"));

        let protocol = crate::DtlsClientProtocol::new(Arc::new(config));
        assert!(format!("{:?}", protocol).contains("DtlsClientProtocol"));
    }

    #[test]
    fn rejects_signal_only_suites() {
        let result = Config::builder()
            .cipher_suites(&[CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV])
            .build();
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn rejects_long_connection_id() {
        let result = Config::builder().connection_id(vec![0; 256]).build();
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }
}
