//! DTLS 1.2 record layer.
//!
//! Turns a [`DatagramTransport`] into a stream of authenticated record
//! payloads. Inbound records are demultiplexed by epoch, checked against the
//! replay window and decrypted; anything malformed or unauthenticated is
//! dropped without an error. The layer also switches epochs on
//! ChangeCipherSpec/Finished and runs the heartbeat timers from inside the
//! receive loop.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use super::epoch::DtlsEpoch;
use super::heartbeat::Heartbeat;
use super::peer::DtlsPeer;
use super::reliable::{HandshakeRetransmit, Message};
use super::transport::{is_timeout, DatagramSender, DatagramTransport};
use crate::buffer::{Buf, ByteQueue};
use crate::crypto::{NullCipher, TlsCipher};
use crate::message::{record_len, HeartbeatMessage, RecordHeader, MIN_PADDING_LEN};
use crate::message::{Header, RECORD_HEADER_LEN};
use crate::rng::SeededRng;
use crate::timeout::Timeout;
use crate::timer::ExponentialBackoff;
use crate::types::{AlertDescription, AlertLevel, ContentType, HandshakeType};
use crate::types::{HeartbeatMessageType, ProtocolVersion};
use crate::util::{constant_time_eq, lock, read_u16};
use crate::{Config, Error};

/// Largest plaintext fragment (2^14).
pub(crate) const MAX_PLAINTEXT_LEN: usize = 1 << 14;

/// Twice the TCP maximum segment lifetime (rfc6347 4.2.4).
const RETRANSMIT_EPOCH_MILLIS: u64 = 240_000;

const HEARTBEAT_RESEND_START_MILLIS: u32 = 1000;
const HEARTBEAT_RESEND_MAX_MILLIS: u32 = 60_000;

/// What became of one inbound record.
#[derive(Debug)]
enum RecordOutcome {
    /// Malformed, unauthenticated, replayed or otherwise unwanted.
    Discard(&'static str),
    /// Handled internally (alert, ChangeCipherSpec, heartbeat).
    Consumed,
    /// Payload copied to the caller's buffer.
    Data { len: usize, epoch: u16 },
    /// Post-handshake handshake record for the retransmit helper.
    PeerRetransmit { epoch: u16, fragment: Vec<u8> },
}

struct Inner {
    closed: bool,
    failed: bool,
    /// A datagram has been seen from the peer.
    in_connection: bool,
    in_handshake: bool,
    read_version: Option<ProtocolVersion>,
    write_version: Option<ProtocolVersion>,
    plaintext_limit: usize,

    current_epoch: Arc<DtlsEpoch>,
    pending_epoch: Option<Arc<DtlsEpoch>>,
    read_epoch: Arc<DtlsEpoch>,
    write_epoch: Arc<DtlsEpoch>,

    retransmit: Option<HandshakeRetransmit>,
    retransmit_epoch: Option<Arc<DtlsEpoch>>,
    retransmit_timeout: Option<Timeout>,

    connection_id_local: Vec<u8>,
    connection_id_peer: Vec<u8>,

    heartbeat: Option<Box<dyn Heartbeat>>,
    heartbeat_responder: bool,
    heartbeat_in_flight: Option<Vec<u8>>,
    heartbeat_timeout: Option<Timeout>,
    heartbeat_backoff: ExponentialBackoff,
    heartbeat_resend_timeout: Option<Timeout>,

    record_queue: ByteQueue,
    rng: SeededRng,
}

pub(crate) struct DtlsRecordLayer {
    config: Arc<Config>,
    transport: Arc<dyn DatagramTransport>,
    peer: Arc<dyn DtlsPeer>,
    inner: Mutex<Inner>,
}

impl DtlsRecordLayer {
    pub fn new(
        config: Arc<Config>,
        transport: Arc<dyn DatagramTransport>,
        peer: Arc<dyn DtlsPeer>,
    ) -> Self {
        let epoch0 = Arc::new(DtlsEpoch::new(0, Box::new(NullCipher), 0, 0));
        let rng = SeededRng::new(config.rng_seed());

        DtlsRecordLayer {
            config,
            transport,
            peer,
            inner: Mutex::new(Inner {
                closed: false,
                failed: false,
                in_connection: false,
                in_handshake: true,
                read_version: None,
                write_version: None,
                plaintext_limit: MAX_PLAINTEXT_LEN,
                current_epoch: epoch0.clone(),
                pending_epoch: None,
                read_epoch: epoch0.clone(),
                write_epoch: epoch0,
                retransmit: None,
                retransmit_epoch: None,
                retransmit_timeout: None,
                connection_id_local: Vec::new(),
                connection_id_peer: Vec::new(),
                heartbeat: None,
                heartbeat_responder: false,
                heartbeat_in_flight: None,
                heartbeat_timeout: None,
                heartbeat_backoff: ExponentialBackoff::new(
                    HEARTBEAT_RESEND_START_MILLIS,
                    HEARTBEAT_RESEND_MAX_MILLIS,
                ),
                heartbeat_resend_timeout: None,
                record_queue: ByteQueue::new(),
                rng,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner().closed
    }

    pub fn read_epoch(&self) -> u16 {
        self.inner().read_epoch.epoch()
    }

    pub fn read_version(&self) -> Option<ProtocolVersion> {
        self.inner().read_version
    }

    pub fn set_read_version(&self, version: ProtocolVersion) {
        self.inner().read_version = Some(version);
    }

    /// Nothing is sent before a write version is set.
    pub fn set_write_version(&self, version: ProtocolVersion) {
        self.inner().write_version = Some(version);
    }

    pub fn set_plaintext_limit(&self, limit: usize) {
        self.inner().plaintext_limit = limit.min(MAX_PLAINTEXT_LEN);
    }

    /// Create the next epoch from negotiated keys. It takes over reads on
    /// ChangeCipherSpec and writes on our Finished.
    pub fn init_pending_epoch(
        &self,
        cipher: Box<dyn TlsCipher>,
        connection_id_local: Vec<u8>,
        connection_id_peer: Vec<u8>,
    ) -> Result<(), Error> {
        let mut inner = self.inner();
        if inner.pending_epoch.is_some() {
            return Err(Error::internal_error("pending epoch already initialized"));
        }
        let epoch = inner.write_epoch.epoch().wrapping_add(1);
        debug!("Initialized pending epoch {}", epoch);

        let pending = DtlsEpoch::new(
            epoch,
            cipher,
            connection_id_local.len(),
            connection_id_peer.len(),
        );
        inner.connection_id_local = connection_id_local;
        inner.connection_id_peer = connection_id_peer;
        inner.pending_epoch = Some(Arc::new(pending));
        Ok(())
    }

    /// Promote the pending epoch once both directions switched to it.
    ///
    /// `retransmit` is kept for a while to answer retransmissions of the
    /// peer's last flight.
    pub fn handshake_successful(
        &self,
        retransmit: Option<HandshakeRetransmit>,
    ) -> Result<(), Error> {
        let now = self.config.now_millis();
        let mut inner = self.inner();

        if Arc::ptr_eq(&inner.read_epoch, &inner.current_epoch)
            || Arc::ptr_eq(&inner.write_epoch, &inner.current_epoch)
        {
            return Err(Error::internal_error("handshake finished before epoch change"));
        }
        let pending = inner
            .pending_epoch
            .take()
            .ok_or_else(|| Error::internal_error("no pending epoch"))?;

        if let Some(retransmit) = retransmit {
            inner.retransmit = Some(retransmit);
            inner.retransmit_epoch = Some(inner.current_epoch.clone());
            inner.retransmit_timeout = Some(Timeout::new(RETRANSMIT_EPOCH_MILLIS, now));
        }

        inner.in_handshake = false;
        inner.current_epoch = pending;
        debug!("Handshake complete, epoch {}", inner.current_epoch.epoch());
        Ok(())
    }

    /// Start heartbeat requests (`heartbeat`) and/or answering the peer's
    /// requests (`responder`).
    pub fn init_heartbeat(&self, heartbeat: Option<Box<dyn Heartbeat>>, responder: bool) {
        let now = self.config.now_millis();
        let mut inner = self.inner();
        inner.heartbeat = heartbeat;
        inner.heartbeat_responder = responder;
        if inner.heartbeat.is_some() {
            Self::reset_heartbeat(&mut inner, now);
        }
    }

    /// Server side, after a cookie exchange: continue the record sequence of
    /// the verified ClientHello and ignore anything up to it.
    pub fn reset_after_hello_verify_request_server(&self, record_seq: u64) {
        let mut inner = self.inner();
        inner.in_connection = true;
        inner.current_epoch.set_sequence_number(record_seq);
        inner.current_epoch.replay_window().reset(record_seq);
    }

    pub fn receive_limit(&self) -> usize {
        let inner = self.inner();
        let epoch = &inner.read_epoch;
        let ciphertext_limit = self
            .transport
            .receive_limit()
            .saturating_sub(epoch.record_header_len_read());
        let plaintext = epoch.cipher().plaintext_decode_limit(ciphertext_limit);
        plaintext.min(inner.plaintext_limit)
    }

    pub fn send_limit(&self) -> usize {
        self.send_limit_locked(&self.inner())
    }

    fn send_limit_locked(&self, inner: &Inner) -> usize {
        let epoch = &inner.write_epoch;
        let ciphertext_limit = self
            .transport
            .send_limit()
            .saturating_sub(epoch.record_header_len_write());
        let plaintext = epoch.cipher().plaintext_encode_limit(ciphertext_limit);
        plaintext.min(inner.plaintext_limit)
    }

    /// Receive application data. See [`receive_record`](Self::receive_record).
    pub fn receive(&self, buf: &mut [u8], wait_millis: u32) -> Result<Option<usize>, Error> {
        Ok(self.receive_record(buf, wait_millis)?.map(|(len, _)| len))
    }

    /// Receive the payload of the next deliverable record together with its
    /// epoch, waiting at most `wait_millis` (`0` waits forever).
    pub fn receive_record(
        &self,
        buf: &mut [u8],
        wait_millis: u32,
    ) -> Result<Option<(usize, u16)>, Error> {
        let mut now = self.config.now_millis();
        let mut timeout = Timeout::for_wait_millis(wait_millis, now);
        let mut wait = Some(wait_millis);
        let mut record = vec![0u8; self.transport.receive_limit()];

        while let Some(w) = wait {
            let w = {
                let mut inner = self.inner();
                if inner.closed {
                    return Err(Error::Closed);
                }
                Self::expire_retransmit(&mut inner, now);
                self.service_heartbeat(&mut inner, now)?;

                let w = Timeout::constrain_wait_millis(
                    Some(w),
                    inner.heartbeat_timeout.as_mut(),
                    now,
                );
                let w = Timeout::constrain_wait_millis(
                    w,
                    inner.heartbeat_resend_timeout.as_mut(),
                    now,
                );
                // Expired heartbeat timers are serviced on the next pass.
                w.unwrap_or(1)
            };

            if let Some(received) = self.receive_datagram_record(&mut record, w)? {
                let outcome = {
                    let mut inner = self.inner();
                    self.process_record(&mut inner, &mut record[..received], buf)?
                };
                if let Some(data) = self.finish_outcome(outcome)? {
                    return Ok(Some(data));
                }
            }

            now = self.config.now_millis();
            wait = Timeout::wait_millis(timeout.as_mut(), now);
        }

        Ok(None)
    }

    /// Process records already queued from earlier datagrams without
    /// touching the transport.
    pub fn receive_pending(&self, buf: &mut [u8]) -> Result<Option<usize>, Error> {
        let mut record = Vec::new();
        loop {
            let outcome = {
                let mut inner = self.inner();
                let available = inner.record_queue.available();
                if available == 0 {
                    return Ok(None);
                }
                record.resize(available, 0);
                let received = Self::take_queued_record(&mut inner, &mut record);
                self.process_record(&mut inner, &mut record[..received], buf)?
            };
            if let Some((len, _)) = self.finish_outcome(outcome)? {
                return Ok(Some(len));
            }
        }
    }

    fn finish_outcome(&self, outcome: RecordOutcome) -> Result<Option<(usize, u16)>, Error> {
        match outcome {
            RecordOutcome::Data { len, epoch } => Ok(Some((len, epoch))),
            RecordOutcome::Discard(reason) => {
                trace!("Discarded record: {}", reason);
                Ok(None)
            }
            RecordOutcome::Consumed => Ok(None),
            RecordOutcome::PeerRetransmit { epoch, fragment } => {
                self.on_peer_retransmit(epoch, &fragment)?;
                Ok(None)
            }
        }
    }

    fn on_peer_retransmit(&self, epoch: u16, fragment: &[u8]) -> Result<(), Error> {
        // The helper resends through `self`, which locks `inner`, so it runs
        // outside the lock and is put back afterwards.
        let Some(mut retransmit) = self.inner().retransmit.take() else {
            return Ok(());
        };
        let result = retransmit.received_handshake_record(self, epoch, fragment);

        // Not if the retransmit epoch expired or was cleared meanwhile.
        let mut inner = self.inner();
        if inner.retransmit_epoch.is_some() && inner.retransmit.is_none() {
            inner.retransmit = Some(retransmit);
        }
        result
    }

    /// One record, from the queue if anything is left there, otherwise from
    /// a fresh datagram whose trailing records are queued.
    fn receive_datagram_record(
        &self,
        record: &mut [u8],
        wait_millis: u32,
    ) -> Result<Option<usize>, Error> {
        {
            let mut inner = self.inner();
            if inner.record_queue.available() > 0 {
                return Ok(Some(Self::take_queued_record(&mut inner, record)));
            }
        }

        let received = match self.transport.receive(record, wait_millis) {
            Ok(received) => received,
            Err(e) if is_timeout(&e) => None,
            Err(e) => return Err(e.into()),
        };
        let Some(received) = received else {
            return Ok(None);
        };

        let mut inner = self.inner();
        if received >= RECORD_HEADER_LEN {
            inner.in_connection = true;
            let cid_len = inner.connection_id_local.len();
            if let Some(len) = record_len(&record[..received], cid_len) {
                if received > len {
                    inner.record_queue.add_data(&record[len..received]);
                    return Ok(Some(len));
                }
            }
        }
        Ok(Some(received))
    }

    fn take_queued_record(inner: &mut Inner, record: &mut [u8]) -> usize {
        let available = inner.record_queue.available();
        let cid_len = inner.connection_id_local.len();
        let len = record_len(inner.record_queue.peek(), cid_len)
            .unwrap_or(available)
            .min(available)
            .min(record.len());
        inner.record_queue.read_into(&mut record[..len])
    }

    fn process_record(
        &self,
        inner: &mut Inner,
        record: &mut [u8],
        buf: &mut [u8],
    ) -> Result<RecordOutcome, Error> {
        use RecordOutcome::Discard;

        if record.len() < RECORD_HEADER_LEN {
            return Ok(Discard("short record"));
        }

        let record_type = ContentType::from_u8(record[0]);
        if !matches!(
            record_type,
            ContentType::Alert
                | ContentType::ApplicationData
                | ContentType::ChangeCipherSpec
                | ContentType::Handshake
                | ContentType::Heartbeat
                | ContentType::Tls12Cid
        ) {
            return Ok(Discard("unknown content type"));
        }

        let version = ProtocolVersion::from_u16(read_u16(record, 1));
        if !version.is_dtls() {
            return Ok(Discard("not a DTLS version"));
        }

        let epoch = read_u16(record, 3);
        let may_be_retransmit = matches!(record_type, ContentType::Handshake | ContentType::Tls12Cid);
        let record_epoch = if epoch == inner.read_epoch.epoch() {
            inner.read_epoch.clone()
        } else {
            match &inner.retransmit_epoch {
                Some(e) if may_be_retransmit && e.epoch() == epoch => e.clone(),
                _ => return Ok(Discard("epoch")),
            }
        };
        let from_retransmit_epoch = !Arc::ptr_eq(&record_epoch, &inner.read_epoch);

        let seq = record[5..11]
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | *b as u64);
        if record_epoch.replay_window().should_discard(seq) {
            return Ok(Discard("replay"));
        }

        let header_len = record_epoch.record_header_len_read();
        if header_len > RECORD_HEADER_LEN {
            if record_type != ContentType::Tls12Cid || record.len() < header_len {
                return Ok(Discard("missing connection id"));
            }
            if !constant_time_eq(&record[11..header_len - 2], &inner.connection_id_local) {
                return Ok(Discard("connection id mismatch"));
            }
        } else if record_type == ContentType::Tls12Cid {
            return Ok(Discard("unexpected connection id"));
        }

        let length = read_u16(record, header_len - 2) as usize;
        if record.len() != header_len + length {
            return Ok(Discard("length"));
        }

        let first_byte = record.get(header_len).copied();
        let read_epoch_zero = inner.read_epoch.epoch() == 0;
        let is_handshake_type = |t: HandshakeType| {
            read_epoch_zero
                && record_type == ContentType::Handshake
                && first_byte == Some(t.as_u8())
        };

        if let Some(read_version) = inner.read_version {
            // A ClientHello retransmitted across the cookie exchange may use
            // a different record version.
            if read_version != version && !is_handshake_type(HandshakeType::ClientHello) {
                return Ok(Discard("record version"));
            }
        }

        // Plaintext never exceeds its ciphertext.
        let undecoded = (length > buf.len()).then(|| record.to_vec());

        let seq_no = ((epoch as u64) << 48) | seq;
        let decoded = match record_epoch.cipher().decode_ciphertext(
            seq_no,
            record_type,
            version,
            &mut record[header_len..],
        ) {
            Ok(decoded) => decoded,
            Err(e) => {
                trace!("Record epoch {} seq {} failed to decode: {}", epoch, seq, e);
                return Ok(Discard("decode"));
            }
        };

        let plaintext_len = decoded.range.len();
        if plaintext_len > inner.plaintext_limit {
            return Ok(Discard("plaintext limit"));
        }
        if plaintext_len < 1 && decoded.content_type != ContentType::ApplicationData {
            return Ok(Discard("empty record"));
        }
        if from_retransmit_epoch && decoded.content_type != ContentType::Handshake {
            return Ok(Discard("non-handshake record in retransmit epoch"));
        }

        let delivered = match decoded.content_type {
            ContentType::ApplicationData => !inner.in_handshake,
            ContentType::Handshake => inner.in_handshake,
            _ => false,
        };
        if delivered && plaintext_len > buf.len() {
            // Back in the queue, unseen by the replay window, for a retry
            // with a larger buffer.
            if let Some(undecoded) = undecoded {
                inner.record_queue.push_front(&undecoded);
            }
            return Err(Error::BufferTooSmall {
                needed: plaintext_len,
                available: buf.len(),
            });
        }

        if inner.read_version.is_none() {
            if is_handshake_type(HandshakeType::HelloVerifyRequest) {
                // rfc6347 4.2.1: the HelloVerifyRequest record version does
                // not take part in version negotiation.
                if !ProtocolVersion::DTLS1_2.is_equal_or_later_than(version) {
                    return Ok(Discard("hello verify request version"));
                }
            } else {
                inner.read_version = Some(version);
            }
        }

        record_epoch.replay_window().report_authenticated(seq);

        let start = header_len + decoded.range.start;
        let plaintext = &record[start..start + plaintext_len];

        match decoded.content_type {
            ContentType::Alert => {
                if let &[level, description] = plaintext {
                    let level = AlertLevel::from_u8(level);
                    let description = AlertDescription::from_u8(description);
                    debug!("Received alert {:?} {:?}", level, description);
                    self.peer.notify_alert_received(level, description);

                    if level == AlertLevel::Fatal {
                        self.failed(inner);
                        return Err(Error::AlertReceived(description));
                    }
                    if description == AlertDescription::CloseNotify {
                        self.close_transport(inner);
                    }
                }
                return Ok(RecordOutcome::Consumed);
            }
            ContentType::ApplicationData => {
                if inner.in_handshake {
                    // Not buffered: early data of the next epoch is lost.
                    return Ok(Discard("application data during handshake"));
                }
            }
            ContentType::ChangeCipherSpec => {
                if plaintext.contains(&1) {
                    if let Some(pending) = inner.pending_epoch.clone() {
                        debug!("Read epoch -> {}", pending.epoch());
                        inner.read_epoch = pending;
                    }
                }
                return Ok(RecordOutcome::Consumed);
            }
            ContentType::Handshake => {
                if !inner.in_handshake {
                    if inner.retransmit.is_some() {
                        return Ok(RecordOutcome::PeerRetransmit {
                            epoch,
                            fragment: plaintext.to_vec(),
                        });
                    }
                    return Ok(Discard("handshake record after handshake"));
                }
            }
            ContentType::Heartbeat => {
                self.process_heartbeat(inner, plaintext);
                return Ok(RecordOutcome::Consumed);
            }
            _ => return Ok(Discard("inner content type")),
        }

        // Non-handshake data in the new epoch means the peer got our last
        // flight.
        if !inner.in_handshake && inner.retransmit.is_some() {
            Self::clear_retransmit(inner);
        }

        buf[..plaintext_len].copy_from_slice(plaintext);
        Ok(RecordOutcome::Data {
            len: plaintext_len,
            epoch,
        })
    }

    fn expire_retransmit(inner: &mut Inner, now: u64) {
        if let Some(timeout) = inner.retransmit_timeout.as_mut() {
            if timeout.remaining_millis(now) < 1 {
                debug!("Retransmit epoch expired");
                Self::clear_retransmit(inner);
            }
        }
    }

    fn clear_retransmit(inner: &mut Inner) {
        inner.retransmit = None;
        inner.retransmit_epoch = None;
        inner.retransmit_timeout = None;
    }

    fn reset_heartbeat(inner: &mut Inner, now: u64) {
        inner.heartbeat_in_flight = None;
        inner.heartbeat_resend_timeout = None;
        inner.heartbeat_backoff.reset();
        inner.heartbeat_timeout = inner
            .heartbeat
            .as_ref()
            .map(|hb| Timeout::new(hb.idle_millis() as u64, now));
    }

    fn service_heartbeat(&self, inner: &mut Inner, now: u64) -> Result<(), Error> {
        if inner.heartbeat.is_none() {
            return Ok(());
        }

        if Timeout::has_expired(inner.heartbeat_timeout.as_mut(), now) {
            if inner.heartbeat_in_flight.is_some() {
                warn!("Heartbeat response timed out");
                return Err(Error::Timeout("heartbeat"));
            }

            let Some(heartbeat) = inner.heartbeat.as_mut() else {
                return Ok(());
            };
            let payload = heartbeat.generate_payload();
            let timeout_millis = heartbeat.timeout_millis();

            inner.heartbeat_timeout = Some(Timeout::new(timeout_millis as u64, now));
            inner.heartbeat_backoff.reset();
            inner.heartbeat_resend_timeout =
                Some(Timeout::new(inner.heartbeat_backoff.millis() as u64, now));
            inner.heartbeat_in_flight = Some(payload.clone());

            trace!("Sending heartbeat request");
            self.send_heartbeat(inner, HeartbeatMessageType::Request, &payload)?;
        } else if Timeout::has_expired(inner.heartbeat_resend_timeout.as_mut(), now) {
            inner.heartbeat_backoff.attempt();
            inner.heartbeat_resend_timeout =
                Some(Timeout::new(inner.heartbeat_backoff.millis() as u64, now));

            if let Some(payload) = inner.heartbeat_in_flight.clone() {
                trace!("Resending heartbeat request");
                self.send_heartbeat(inner, HeartbeatMessageType::Request, &payload)?;
            }
        }
        Ok(())
    }

    fn process_heartbeat(&self, inner: &mut Inner, record: &[u8]) {
        if inner.heartbeat_in_flight.is_none() && !inner.heartbeat_responder {
            return;
        }
        let Ok((_, message)) = HeartbeatMessage::parse(record) else {
            trace!("Ignoring malformed heartbeat");
            return;
        };

        match message.message_type {
            HeartbeatMessageType::Request if inner.heartbeat_responder => {
                if let Err(e) =
                    self.send_heartbeat(inner, HeartbeatMessageType::Response, &message.payload)
                {
                    debug!("Failed to answer heartbeat: {}", e);
                }
            }
            HeartbeatMessageType::Response => {
                if inner.heartbeat_in_flight.as_deref() == Some(&message.payload[..]) {
                    trace!("Heartbeat answered");
                    Self::reset_heartbeat(inner, self.config.now_millis());
                }
            }
            _ => {}
        }
    }

    fn send_heartbeat(
        &self,
        inner: &mut Inner,
        message_type: HeartbeatMessageType,
        payload: &[u8],
    ) -> Result<(), Error> {
        let mut padding = [0u8; MIN_PADDING_LEN];
        inner.rng.fill(&mut padding);

        let message = HeartbeatMessage {
            message_type,
            payload: payload.to_vec(),
            padding_len: padding.len(),
        };
        let mut out = Buf::new();
        message.serialize(&padding, &mut out);
        self.send_record(inner, ContentType::Heartbeat, &out)
    }

    /// Send application data.
    pub fn send(&self, buf: &[u8]) -> Result<(), Error> {
        let mut inner = self.inner();
        if inner.closed {
            return Err(Error::Closed);
        }
        if inner.in_handshake {
            return Err(Error::internal_error("handshake in progress"));
        }
        self.send_record(&mut inner, ContentType::ApplicationData, buf)
    }

    /// Send handshake messages, fragmented to the send limit. With `resend`
    /// the write epoch first goes back to the one the flight started in.
    ///
    /// A Finished message is preceded by an implicit ChangeCipherSpec that
    /// moves the write epoch forward.
    pub fn send_flight(&self, messages: &[Message], resend: bool) -> Result<(), Error> {
        let mut inner = self.inner();
        if inner.closed {
            return Err(Error::Closed);
        }
        if resend {
            inner.write_epoch = inner
                .retransmit_epoch
                .clone()
                .unwrap_or_else(|| inner.current_epoch.clone());
        }

        for message in messages {
            if message.msg_type == HandshakeType::Finished {
                self.change_write_epoch(&mut inner)?;
            }

            let fragment_limit = self.send_limit_locked(&inner).saturating_sub(Header::LEN);
            if fragment_limit < 1 {
                return Err(Error::internal_error("send limit too small for handshake"));
            }
            for fragment in message.fragments(fragment_limit) {
                self.send_record(&mut inner, ContentType::Handshake, &fragment)?;
            }
        }
        Ok(())
    }

    fn change_write_epoch(&self, inner: &mut Inner) -> Result<(), Error> {
        let next = if inner.in_handshake {
            inner.pending_epoch.clone()
        } else {
            match &inner.retransmit_epoch {
                Some(e) if Arc::ptr_eq(e, &inner.write_epoch) => Some(inner.current_epoch.clone()),
                _ => None,
            }
        };
        let next = next.ok_or_else(|| Error::internal_error("no epoch to switch to"))?;

        self.send_record(inner, ContentType::ChangeCipherSpec, &[1])?;
        debug!("Write epoch -> {}", next.epoch());
        inner.write_epoch = next;
        Ok(())
    }

    fn send_record(
        &self,
        inner: &mut Inner,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<(), Error> {
        // Nothing goes out before the version is known.
        let Some(version) = inner.write_version else {
            return Ok(());
        };
        if plaintext.len() > inner.plaintext_limit {
            return Err(Error::internal_error("record exceeds plaintext limit"));
        }
        if plaintext.is_empty() && content_type != ContentType::ApplicationData {
            return Err(Error::internal_error("empty non-application record"));
        }

        let epoch = inner.write_epoch.clone();
        let seq = epoch.allocate_sequence_number()?;
        let seq_no = ((epoch.epoch() as u64) << 48) | seq;

        let mut fragment = Buf::with_capacity(plaintext.len() + 64);
        let record_type =
            epoch
                .cipher()
                .encode_plaintext(seq_no, content_type, version, plaintext, &mut fragment)?;
        if fragment.len() > u16::MAX as usize {
            return Err(Error::internal_error("record too long"));
        }

        let cid: &[u8] = if record_type == ContentType::Tls12Cid {
            &inner.connection_id_peer
        } else {
            &[]
        };

        let mut datagram = Buf::with_capacity(RECORD_HEADER_LEN + cid.len() + fragment.len());
        RecordHeader::write(
            &mut datagram,
            record_type,
            version,
            epoch.epoch(),
            seq,
            cid,
            fragment.len() as u16,
        );
        datagram.extend_from_slice(&fragment);

        self.transport.send(&datagram)?;
        Ok(())
    }

    fn raise_alert(
        &self,
        inner: &mut Inner,
        level: AlertLevel,
        description: AlertDescription,
        message: Option<&str>,
    ) -> Result<(), Error> {
        self.peer.notify_alert_raised(level, description, message);
        self.send_record(
            inner,
            ContentType::Alert,
            &[level.as_u8(), description.as_u8()],
        )
    }

    /// Close gracefully. A handshake in progress is abandoned with
    /// `user_canceled`.
    pub fn close(&self) {
        let mut inner = self.inner();
        if inner.closed {
            return;
        }
        if inner.in_handshake && inner.in_connection {
            let _ = self.raise_alert(
                &mut inner,
                AlertLevel::Warning,
                AlertDescription::UserCanceled,
                Some("User canceled handshake"),
            );
        }
        self.close_transport(&mut inner);
    }

    /// Send a fatal alert (best effort) and close.
    pub fn fail(&self, description: AlertDescription) {
        let mut inner = self.inner();
        if inner.closed {
            return;
        }
        if inner.in_connection {
            if let Err(e) = self.raise_alert(&mut inner, AlertLevel::Fatal, description, None) {
                debug!("Failed to send fatal alert: {}", e);
            }
        }
        inner.failed = true;
        self.close_transport(&mut inner);
    }

    fn failed(&self, inner: &mut Inner) {
        if !inner.closed {
            inner.failed = true;
            self.close_transport(inner);
        }
    }

    fn close_transport(&self, inner: &mut Inner) {
        if inner.closed {
            return;
        }
        // rfc5246 7.2.1: close_notify unless a fatal alert was sent.
        if !inner.failed {
            let _ = self.raise_alert(inner, AlertLevel::Warning, AlertDescription::CloseNotify, None);
        }
        if let Err(e) = self.transport.close() {
            debug!("Closing transport: {}", e);
        }
        inner.closed = true;
    }
}

/// Extract the first record of a datagram if it can carry an initial
/// ClientHello. Returns its sequence number and fragment.
pub(crate) fn receive_client_hello_record(datagram: &[u8]) -> Option<(u64, &[u8])> {
    let (_, header) = RecordHeader::parse(datagram, 0).ok()?;
    if header.content_type != ContentType::Handshake
        || !header.version.is_equal_or_later_than(ProtocolVersion::DTLS1_0)
        || header.epoch != 0
    {
        return None;
    }
    let length = header.length as usize;
    if length < 1 || length > MAX_PLAINTEXT_LEN {
        return None;
    }
    // Anything after the first record is ignored.
    datagram
        .get(RECORD_HEADER_LEN..RECORD_HEADER_LEN + length)
        .map(|fragment| (header.sequence_number, fragment))
}

/// Send a HelloVerifyRequest handshake message in a DTLS 1.0 epoch 0 record
/// reusing the ClientHello's record sequence number.
pub(crate) fn send_hello_verify_request_record(
    sender: &dyn DatagramSender,
    record_seq: u64,
    message: &[u8],
) -> io::Result<()> {
    let mut datagram = Buf::with_capacity(RECORD_HEADER_LEN + message.len());
    RecordHeader::write(
        &mut datagram,
        ContentType::Handshake,
        ProtocolVersion::DTLS1_0,
        0,
        record_seq,
        &[],
        message.len() as u16,
    );
    datagram.extend_from_slice(message);
    sender.send(&datagram)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::crypto::key_schedule::KeySchedule;
    use crate::crypto::rust_crypto::default_provider;
    use crate::dtls::heartbeat::DefaultHeartbeat;
    use crate::dtls::transport::{DatagramReceiver, Delivery, MemoryTransport};
    use crate::timeout::ManualClock;
    use crate::types::{CipherSuite, ConnectionEnd, HashAlgorithm};

    struct Quiet;
    impl DtlsPeer for Quiet {}

    fn layer(transport: MemoryTransport) -> (DtlsRecordLayer, Arc<MemoryTransport>) {
        let transport = Arc::new(transport);
        let config = Arc::new(Config::default());
        let rl = DtlsRecordLayer::new(config, transport.clone(), Arc::new(Quiet));
        rl.set_write_version(ProtocolVersion::DTLS1_2);
        (rl, transport)
    }

    fn record(content_type: ContentType, epoch: u16, seq: u64, body: &[u8]) -> Vec<u8> {
        versioned_record(ProtocolVersion::DTLS1_2, content_type, epoch, seq, body)
    }

    fn versioned_record(
        version: ProtocolVersion,
        content_type: ContentType,
        epoch: u16,
        seq: u64,
        body: &[u8],
    ) -> Vec<u8> {
        let mut out = Buf::new();
        RecordHeader::write(
            &mut out,
            content_type,
            version,
            epoch,
            seq,
            &[],
            body.len() as u16,
        );
        out.extend_from_slice(body);
        out.into_vec()
    }

    fn ciphers(cid_client: &[u8], cid_server: &[u8]) -> (Box<dyn TlsCipher>, Box<dyn TlsCipher>) {
        let provider = default_provider();
        let suite = provider
            .find_cipher_suite(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256)
            .unwrap();
        let ks = KeySchedule::new(&provider, HashAlgorithm::SHA256);
        let master = [7u8; 48];
        let (cr, sr) = ([1u8; 32], [2u8; 32]);
        let client = ks
            .record_cipher(suite, &master, &cr, &sr, ConnectionEnd::Client, cid_server, cid_client)
            .unwrap();
        let server = ks
            .record_cipher(suite, &master, &cr, &sr, ConnectionEnd::Server, cid_client, cid_server)
            .unwrap();
        (Box::new(client), Box::new(server))
    }

    /// Both layers moved to epoch 1 with real keys.
    fn established(
        cid_client: &[u8],
        cid_server: &[u8],
    ) -> (DtlsRecordLayer, DtlsRecordLayer, Arc<MemoryTransport>) {
        let (a, b) = MemoryTransport::pair(1500);
        let (client, _) = layer(a);
        let (server, server_transport) = layer(b);
        let (cc, sc) = ciphers(cid_client, cid_server);
        client
            .init_pending_epoch(cc, cid_client.to_vec(), cid_server.to_vec())
            .unwrap();
        server
            .init_pending_epoch(sc, cid_server.to_vec(), cid_client.to_vec())
            .unwrap();

        let finished = Message::new(0, HandshakeType::Finished, vec![0; 12]);
        client.send_flight(std::slice::from_ref(&finished), false).unwrap();
        server.send_flight(std::slice::from_ref(&finished), false).unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(server.receive_record(&mut buf, 50).unwrap(), Some((24, 1)));
        assert_eq!(client.receive_record(&mut buf, 50).unwrap(), Some((24, 1)));
        client.handshake_successful(None).unwrap();
        server.handshake_successful(None).unwrap();
        (client, server, server_transport)
    }

    #[test]
    fn nothing_is_sent_without_write_version() {
        let (a, b) = MemoryTransport::pair(1500);
        let transport = Arc::new(a);
        let rl = DtlsRecordLayer::new(Arc::new(Config::default()), transport, Arc::new(Quiet));
        let m = Message::new(0, HandshakeType::ClientHello, vec![1, 2, 3]);
        rl.send_flight(&[m], false).unwrap();
        assert_eq!(b.pending(), 0);
    }

    #[test]
    fn splits_datagram_with_two_records() {
        let (a, b) = MemoryTransport::pair(1500);
        let (rl, _) = layer(a);

        let mut datagram = record(ContentType::Handshake, 0, 0, &[1, 0, 0, 0]);
        datagram.extend(record(ContentType::Handshake, 0, 1, &[2, 0, 0, 0, 0]));
        b.send(&datagram).unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(rl.receive(&mut buf, 50).unwrap(), Some(4));
        assert_eq!(&buf[..4], &[1, 0, 0, 0]);
        assert_eq!(rl.receive_pending(&mut buf).unwrap(), Some(5));
        assert_eq!(&buf[..5], &[2, 0, 0, 0, 0]);
        assert_eq!(rl.receive_pending(&mut buf).unwrap(), None);
    }

    #[test]
    fn duplicate_record_is_discarded() {
        let (a, b) = MemoryTransport::pair(1500);
        let (rl, _) = layer(a);

        let r = record(ContentType::Handshake, 0, 5, &[1, 2]);
        b.send(&r).unwrap();
        b.send(&r).unwrap();
        b.send(&record(ContentType::Handshake, 0, 6, &[3])).unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(rl.receive(&mut buf, 50).unwrap(), Some(2));
        assert_eq!(rl.receive(&mut buf, 50).unwrap(), Some(1));
        assert_eq!(buf[0], 3);
    }

    #[test]
    fn negotiated_version_replaces_client_hello_record_version() {
        let (a, b) = MemoryTransport::pair(1500);
        let (rl, _) = layer(a);
        let client_hello = HandshakeType::ClientHello.as_u8();
        let client_key_exchange = HandshakeType::ClientKeyExchange.as_u8();

        b.send(&versioned_record(
            ProtocolVersion::DTLS1_0,
            ContentType::Handshake,
            0,
            0,
            &[client_hello, 0, 0, 0],
        ))
        .unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(rl.receive(&mut buf, 50).unwrap(), Some(4));
        assert_eq!(rl.read_version(), Some(ProtocolVersion::DTLS1_0));

        b.send(&record(ContentType::Handshake, 0, 1, &[client_key_exchange, 1]))
            .unwrap();
        assert_eq!(rl.receive(&mut buf, 30).unwrap(), None);

        rl.set_read_version(ProtocolVersion::DTLS1_2);
        b.send(&record(ContentType::Handshake, 0, 2, &[client_key_exchange, 2]))
            .unwrap();
        assert_eq!(rl.receive(&mut buf, 50).unwrap(), Some(2));
        assert_eq!(buf[1], 2);
    }

    #[test]
    fn wrong_epoch_and_garbage_are_discarded() {
        let (a, b) = MemoryTransport::pair(1500);
        let (rl, _) = layer(a);

        b.send(&record(ContentType::Handshake, 3, 0, &[1])).unwrap();
        b.send(&[0x16, 0xfe]).unwrap();
        b.send(&record(ContentType::Unknown(99), 0, 0, &[1])).unwrap();
        let mut bad_len = record(ContentType::Handshake, 0, 1, &[1, 2]);
        bad_len.pop();
        b.send(&bad_len).unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(rl.receive(&mut buf, 30).unwrap(), None);
        assert!(!rl.is_closed());
    }

    #[test]
    fn finished_switches_write_epoch_after_change_cipher_spec() {
        let (a, b) = MemoryTransport::pair(1500);
        let (rl, _) = layer(a);
        let (cc, _) = ciphers(&[], &[]);
        rl.init_pending_epoch(cc, vec![], vec![]).unwrap();

        let flight = [
            Message::new(0, HandshakeType::ClientKeyExchange, vec![9; 10]),
            Message::new(1, HandshakeType::Finished, vec![0; 12]),
        ];
        rl.send_flight(&flight, false).unwrap();

        let mut buf = [0u8; 1500];
        let mut types = Vec::new();
        while let Some(n) = b.receive(&mut buf, 10).unwrap() {
            let (_, h) = RecordHeader::parse(&buf[..n], 0).unwrap();
            types.push((h.content_type, h.epoch));
        }
        assert_eq!(
            types,
            vec![
                (ContentType::Handshake, 0),
                (ContentType::ChangeCipherSpec, 0),
                (ContentType::Handshake, 1),
            ]
        );
    }

    #[test]
    fn application_data_round_trip_and_bad_mac() {
        let (client, server, server_transport) = established(&[], &[]);

        client.send(b"hello").unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(server.receive(&mut buf, 50).unwrap(), Some(5));
        assert_eq!(&buf[..5], b"hello");

        // Corrupt the ciphertext of a valid record.
        let mut captured = [0u8; 1500];
        client.send(b"again").unwrap();
        let n = server_transport.receive(&mut captured, 50).unwrap().unwrap();
        captured[n - 1] ^= 0xff;
        server_transport.inject(&captured[..n]);
        assert_eq!(server.receive(&mut buf, 30).unwrap(), None);
        assert!(!server.is_closed());

        client.send(b"still open").unwrap();
        assert_eq!(server.receive(&mut buf, 50).unwrap(), Some(10));
    }

    #[test]
    fn connection_id_records() {
        let (client, server, _) = established(&[1, 2, 3], &[9, 9]);
        client.send(b"cid").unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(server.receive(&mut buf, 50).unwrap(), Some(3));
        server.send(b"back").unwrap();
        assert_eq!(client.receive(&mut buf, 50).unwrap(), Some(4));
    }

    #[test]
    fn fatal_alert_fails_the_layer() {
        let (client, server, _) = established(&[], &[]);
        client.fail(AlertDescription::HandshakeFailure);
        let mut buf = [0u8; 64];
        assert!(matches!(
            server.receive(&mut buf, 50),
            Err(Error::AlertReceived(AlertDescription::HandshakeFailure))
        ));
        assert!(server.is_closed());
    }

    #[test]
    fn close_notify_closes_receiver() {
        let (client, server, _) = established(&[], &[]);
        client.close();
        assert!(client.is_closed());
        let mut buf = [0u8; 64];
        assert!(matches!(server.receive(&mut buf, 50), Err(Error::Closed)));
        assert!(matches!(client.send(b"x"), Err(Error::Closed)));
    }

    #[test]
    fn small_buffer_keeps_record_for_retry() {
        let (client, server, _) = established(&[], &[]);
        client.send(&[7; 32]).unwrap();

        let mut small = [0u8; 8];
        assert!(matches!(
            server.receive(&mut small, 50),
            Err(Error::BufferTooSmall {
                needed: 32,
                available: 8
            })
        ));

        let mut buf = [0u8; 64];
        assert_eq!(server.receive(&mut buf, 50).unwrap(), Some(32));
        assert_eq!(&buf[..32], &[7; 32]);
        assert_eq!(server.receive(&mut buf, 30).unwrap(), None);
    }

    #[test]
    fn unanswered_heartbeat_times_out() {
        let clock = Arc::new(ManualClock::new(0));
        let config = Config::builder().clock(clock.clone()).build().unwrap();
        let (a, _b) = MemoryTransport::pair(1500);
        let transport = Arc::new(a);
        let rl = DtlsRecordLayer::new(Arc::new(config), transport.clone(), Arc::new(Quiet));
        rl.set_write_version(ProtocolVersion::DTLS1_2);
        rl.init_heartbeat(
            Some(Box::new(DefaultHeartbeat::new(
                Duration::from_secs(1),
                Duration::from_millis(200),
            ))),
            false,
        );

        // Requests are lost and time moves past the response timeout.
        let requests = Arc::new(AtomicUsize::new(0));
        let (sent, tick) = (requests.clone(), clock.clone());
        transport.set_filter(move |datagram| {
            if datagram[0] == ContentType::Heartbeat.as_u8() {
                sent.fetch_add(1, Ordering::SeqCst);
                tick.advance(500);
            }
            Delivery::Drop
        });

        let mut buf = [0u8; 64];
        clock.set(1000);
        assert!(matches!(
            rl.receive(&mut buf, 60_000),
            Err(Error::Timeout("heartbeat"))
        ));
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn client_hello_record_extraction() {
        let r = record(ContentType::Handshake, 0, 42, &[1, 2, 3]);
        assert_eq!(receive_client_hello_record(&r), Some((42, &[1u8, 2, 3][..])));
        assert!(receive_client_hello_record(&record(ContentType::Handshake, 1, 0, &[1])).is_none());
        assert!(receive_client_hello_record(&record(ContentType::Alert, 0, 0, &[1])).is_none());
        assert!(receive_client_hello_record(&record(ContentType::Handshake, 0, 0, &[])).is_none());
    }
}
