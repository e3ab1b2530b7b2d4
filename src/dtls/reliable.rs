//! Reliable delivery of handshake flights (rfc6347 4.2.4).
//!
//! Outbound messages are kept per flight and resent with exponential backoff
//! until the peer's next flight starts arriving. Inbound fragments are
//! reassembled per message sequence number; a complete retransmission of the
//! peer's previous flight triggers a resend of ours.

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use super::handshake_hash::HandshakeHash;
use super::reassembler::DtlsReassembler;
use super::record_layer::DtlsRecordLayer;
use super::verifier::DtlsRequest;
use crate::buffer::Buf;
use crate::message::Header;
use crate::timeout::Timeout;
use crate::timer::ExponentialBackoff;
use crate::types::HandshakeType;
use crate::Error;

/// Messages further ahead than this are dropped instead of buffered.
const MAX_RECEIVE_AHEAD: u16 = 16;

type Flight = BTreeMap<u16, DtlsReassembler>;

/// A complete handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Message {
    pub seq: u16,
    pub msg_type: HandshakeType,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(seq: u16, msg_type: HandshakeType, body: Vec<u8>) -> Self {
        Message {
            seq,
            msg_type,
            body,
        }
    }

    /// Split into handshake fragments (header included) carrying at most
    /// `fragment_limit` body bytes each. An empty body is one empty fragment.
    pub fn fragments(&self, fragment_limit: usize) -> impl Iterator<Item = Buf> + '_ {
        let length = self.body.len();
        let limit = fragment_limit.max(1);
        let count = if length == 0 { 1 } else { length.div_ceil(limit) };

        (0..count).map(move |i| {
            let offset = i * limit;
            let end = (offset + limit).min(length);
            let mut out = Buf::with_capacity(Header::LEN + end - offset);
            Header {
                msg_type: self.msg_type,
                length: length as u32,
                message_seq: self.seq,
                fragment_offset: offset as u32,
                fragment_length: (end - offset) as u32,
            }
            .serialize(&mut out);
            out.extend_from_slice(&self.body[offset..end]);
            out
        })
    }

    /// The message as one unfragmented handshake message.
    pub fn to_whole(&self) -> Buf {
        let mut out = Buf::with_capacity(Header::LEN + self.body.len());
        Header::whole(self.msg_type, self.seq, self.body.len() as u32).serialize(&mut out);
        out.extend_from_slice(&self.body);
        out
    }
}

/// Feed the handshake fragments of one record into the inbound flights.
///
/// Returns true when the record completed a retransmission of the previous
/// flight, which is then reset so the next retransmission is detected too.
fn process_fragments(
    current: &mut Flight,
    mut previous: Option<&mut Flight>,
    next_receive_seq: u16,
    window: u16,
    epoch: u16,
    mut record: &[u8],
) -> bool {
    let mut check_previous = false;

    while record.len() >= Header::LEN {
        let Ok((rest, header)) = Header::parse(record) else {
            break;
        };
        let fragment_length = header.fragment_length as usize;
        if rest.len() < fragment_length {
            break;
        }
        let (fragment, rest) = rest.split_at(fragment_length);
        record = rest;

        if header.fragment_offset + header.fragment_length > header.length {
            break;
        }
        // No renegotiation: Finished is the only message of epoch 1.
        let expected_epoch = if header.msg_type == HandshakeType::Finished { 1 } else { 0 };
        if epoch != expected_epoch {
            break;
        }

        let seq = header.message_seq;
        let length = header.length as usize;
        let offset = header.fragment_offset as usize;

        if seq as u32 >= next_receive_seq as u32 + window as u32 {
            trace!("Dropping handshake message {} too far ahead", seq);
        } else if seq >= next_receive_seq {
            current
                .entry(seq)
                .or_insert_with(|| DtlsReassembler::new(header.msg_type, length))
                .contribute_fragment(header.msg_type, length, fragment, offset);
        } else if let Some(previous) = previous.as_mut() {
            if let Some(reassembler) = previous.get_mut(&seq) {
                reassembler.contribute_fragment(header.msg_type, length, fragment, offset);
                check_previous = true;
            }
        }
    }

    let Some(previous) = previous else {
        return false;
    };
    let complete = check_previous && previous.values().all(|r| r.body_if_complete().is_some());
    if complete {
        previous.values_mut().for_each(DtlsReassembler::reset);
    }
    complete
}

/// State kept after the handshake to answer retransmissions of the peer's
/// last flight with our own last flight.
pub(crate) struct HandshakeRetransmit {
    previous_inbound_flight: Flight,
    outbound_flight: Vec<Message>,
    next_receive_seq: u16,
}

impl HandshakeRetransmit {
    pub fn received_handshake_record(
        &mut self,
        record_layer: &DtlsRecordLayer,
        epoch: u16,
        record: &[u8],
    ) -> Result<(), Error> {
        let mut ignored = Flight::new();
        let resend = process_fragments(
            &mut ignored,
            Some(&mut self.previous_inbound_flight),
            self.next_receive_seq,
            0,
            epoch,
            record,
        );
        if resend {
            debug!("Peer retransmitted its last flight, resending ours");
            record_layer.send_flight(&self.outbound_flight, true)?;
        }
        Ok(())
    }
}

pub(crate) struct DtlsReliableHandshake {
    record_layer: Arc<DtlsRecordLayer>,
    handshake_hash: HandshakeHash,
    handshake_timeout: Option<Timeout>,

    current_inbound_flight: Flight,
    previous_inbound_flight: Option<Flight>,
    outbound_flight: Vec<Message>,

    resend_backoff: ExponentialBackoff,
    resend_timeout: Option<Timeout>,

    next_send_seq: u16,
    next_receive_seq: u16,
}

impl DtlsReliableHandshake {
    /// With a verified `request` the handshake continues from its
    /// ClientHello: the message is already in the transcript and the
    /// server's first message reuses its sequence number.
    pub fn new(
        record_layer: Arc<DtlsRecordLayer>,
        request: Option<&DtlsRequest>,
    ) -> Result<Self, Error> {
        let config = record_layer.config().clone();
        let now = config.now_millis();

        let mut handshake = DtlsReliableHandshake {
            record_layer,
            handshake_hash: HandshakeHash::new(),
            handshake_timeout: Timeout::for_wait_millis(config.handshake_timeout_millis(), now),
            current_inbound_flight: Flight::new(),
            previous_inbound_flight: None,
            outbound_flight: Vec::new(),
            resend_backoff: ExponentialBackoff::new(
                config.flight_start_rto_millis(),
                config.flight_max_rto_millis(),
            ),
            resend_timeout: None,
            next_send_seq: 0,
            next_receive_seq: 0,
        };

        if let Some(request) = request {
            let (_, header) = Header::parse(&request.message)?;
            let seq = header.message_seq;

            handshake.resend_timeout =
                Some(Timeout::new(handshake.resend_backoff.millis() as u64, now));
            handshake
                .record_layer
                .reset_after_hello_verify_request_server(request.record_seq);
            // Never completes: it only recognizes a retransmitted ClientHello.
            handshake.current_inbound_flight.insert(
                seq,
                DtlsReassembler::new(HandshakeType::ClientHello, header.length as usize),
            );
            handshake.next_send_seq = seq;
            handshake.next_receive_seq = seq
                .checked_add(1)
                .ok_or_else(|| Error::unexpected_message("message sequence exhausted"))?;
            handshake.handshake_hash.update(&request.message);
        }

        Ok(handshake)
    }

    pub fn record_layer(&self) -> &Arc<DtlsRecordLayer> {
        &self.record_layer
    }

    pub fn handshake_hash(&self) -> &HandshakeHash {
        &self.handshake_hash
    }

    /// Snapshot of the transcript for the Finished computation. Tracking
    /// continues on the live hash.
    pub fn prepare_to_finish(&self) -> HandshakeHash {
        self.handshake_hash.clone()
    }

    pub fn send_message(&mut self, msg_type: HandshakeType, body: Vec<u8>) -> Result<(), Error> {
        // First message of a new outbound flight.
        if self.resend_timeout.take().is_some() {
            self.outbound_flight.clear();
        }

        let seq = self.next_send_seq;
        self.next_send_seq = seq
            .checked_add(1)
            .ok_or_else(|| Error::internal_error("message sequence exhausted"))?;

        let message = Message::new(seq, msg_type, body);
        trace!("Sending {:?} seq {} ({} bytes)", msg_type, seq, message.body.len());
        self.record_layer
            .send_flight(std::slice::from_ref(&message), false)?;
        self.update_handshake_messages_digest(&message);
        self.outbound_flight.push(message);
        Ok(())
    }

    pub fn receive_message(&mut self) -> Result<Message, Error> {
        let message = self.impl_receive_message()?;
        self.update_handshake_messages_digest(&message);
        Ok(message)
    }

    /// Receive a message of `msg_type` and return its body.
    pub fn receive_message_body(&mut self, msg_type: HandshakeType) -> Result<Vec<u8>, Error> {
        let message = self.receive_message()?;
        if message.msg_type != msg_type {
            return Err(Error::unexpected_message(format!(
                "expected {:?}, got {:?}",
                msg_type, message.msg_type
            )));
        }
        Ok(message.body)
    }

    /// Receive a message without adding it to the transcript. The caller
    /// adds it with [`update_handshake_messages_digest`](Self::update_handshake_messages_digest)
    /// once the transcript before it has been used.
    pub fn receive_message_delayed_digest(
        &mut self,
        msg_type: HandshakeType,
    ) -> Result<Message, Error> {
        let message = self.impl_receive_message()?;
        if message.msg_type != msg_type {
            return Err(Error::unexpected_message(format!(
                "expected {:?}, got {:?}",
                msg_type, message.msg_type
            )));
        }
        Ok(message)
    }

    pub fn update_handshake_messages_digest(&mut self, message: &Message) {
        if !matches!(
            message.msg_type,
            HandshakeType::HelloRequest | HandshakeType::HelloVerifyRequest
        ) {
            self.handshake_hash.update(&message.to_whole());
        }
    }

    /// Client side, after a HelloVerifyRequest: the next ClientHello starts
    /// the transcript again.
    pub fn reset_after_hello_verify_request_client(&mut self) {
        self.current_inbound_flight.clear();
        self.previous_inbound_flight = None;
        self.outbound_flight.clear();
        self.resend_timeout = None;
        self.resend_backoff.reset();
        self.next_receive_seq = 1;
        self.handshake_hash.reset();
    }

    /// Hand over to the record layer. The side that sent the last flight
    /// keeps it around to answer the peer's retransmissions.
    pub fn finish(mut self) -> Result<(), Error> {
        let retransmit = if self.resend_timeout.is_some() {
            None
        } else {
            self.prepare_inbound_flight(Flight::new());
            self.previous_inbound_flight
                .take()
                .map(|previous| HandshakeRetransmit {
                    previous_inbound_flight: previous,
                    outbound_flight: mem::take(&mut self.outbound_flight),
                    next_receive_seq: self.next_receive_seq,
                })
        };
        self.record_layer.handshake_successful(retransmit)
    }

    fn impl_receive_message(&mut self) -> Result<Message, Error> {
        let config = self.record_layer.config().clone();
        let mut now = config.now_millis();

        // First message of a new inbound flight.
        if self.resend_timeout.is_none() {
            self.resend_backoff.reset();
            self.resend_timeout = Some(Timeout::new(self.resend_backoff.millis() as u64, now));
            self.prepare_inbound_flight(Flight::new());
        }

        let mut buf = Vec::new();
        loop {
            if self.record_layer.is_closed() {
                return Err(Error::alert(
                    crate::types::AlertDescription::UserCanceled,
                    "record layer closed during handshake",
                ));
            }

            if let Some(message) = self.pending_message() {
                return Ok(message);
            }

            if Timeout::has_expired(self.handshake_timeout.as_mut(), now) {
                return Err(Error::Timeout("handshake"));
            }

            let wait = Timeout::wait_millis(self.handshake_timeout.as_mut(), now);
            let wait = Timeout::constrain_wait_millis(wait, self.resend_timeout.as_mut(), now);
            let wait = wait.unwrap_or(0).max(1);

            buf.resize(self.record_layer.receive_limit(), 0);
            let resent = match self.record_layer.receive_record(&mut buf, wait)? {
                Some((len, epoch)) => self.process_record(epoch, &buf[..len])?,
                None => false,
            };

            now = config.now_millis();
            if resent {
                self.resend_backoff.reset();
                self.resend_timeout = Some(Timeout::new(self.resend_backoff.millis() as u64, now));
            } else if Timeout::has_expired(self.resend_timeout.as_mut(), now) {
                debug!(
                    "Resending flight of {} messages after {} ms",
                    self.outbound_flight.len(),
                    self.resend_backoff.millis()
                );
                self.resend_outbound_flight()?;
                self.resend_backoff.attempt();
                self.resend_timeout = Some(Timeout::new(self.resend_backoff.millis() as u64, now));
            }
        }
    }

    fn process_record(&mut self, epoch: u16, record: &[u8]) -> Result<bool, Error> {
        let resend = process_fragments(
            &mut self.current_inbound_flight,
            self.previous_inbound_flight.as_mut(),
            self.next_receive_seq,
            MAX_RECEIVE_AHEAD,
            epoch,
            record,
        );
        if resend {
            debug!("Peer retransmitted its previous flight");
            self.resend_outbound_flight()?;
        }
        Ok(resend)
    }

    fn pending_message(&mut self) -> Option<Message> {
        let reassembler = self.current_inbound_flight.get(&self.next_receive_seq)?;
        let body = reassembler.body_if_complete()?.to_vec();
        let message = Message::new(self.next_receive_seq, reassembler.msg_type(), body);

        // The peer has moved on, its previous flight will not come again.
        self.previous_inbound_flight = None;
        self.next_receive_seq = self.next_receive_seq.wrapping_add(1);
        trace!("Received {:?} seq {}", message.msg_type, message.seq);
        Some(message)
    }

    fn prepare_inbound_flight(&mut self, next: Flight) {
        self.current_inbound_flight
            .values_mut()
            .for_each(DtlsReassembler::reset);
        self.previous_inbound_flight = Some(mem::replace(&mut self.current_inbound_flight, next));
    }

    fn resend_outbound_flight(&mut self) -> Result<(), Error> {
        self.record_layer.send_flight(&self.outbound_flight, true)
    }
}
