//! Wire formats of DTLS 1.2 records and handshake messages.
//!
//! Parsers are `nom` functions over byte slices; serializers append to a
//! [`Buf`](crate::buffer::Buf).

mod certificate;
mod client_hello;
mod extension;
mod handshake;
mod heartbeat;
mod hello_verify;
mod id;
mod key_exchange;
mod record;
mod server_hello;

pub use certificate::{Certificate, CertificateRequest, CertificateStatus};
pub use client_hello::ClientHello;
pub(crate) use client_hello::{client_version, cookie};
pub use extension::{Extension, Extensions};
pub use handshake::Header;
pub use heartbeat::{HeartbeatMessage, MIN_PADDING_LEN};
pub use hello_verify::HelloVerifyRequest;
pub use id::{Cookie, Random, SessionId};
pub(crate) use key_exchange::peek_group;
pub use key_exchange::{parse_ecdh_public, parse_psk_identity};
pub use key_exchange::{serialize_ecdh_public, serialize_psk_identity};
pub use key_exchange::{DigitallySigned, EcdheParams, NewSessionTicket, SignedEcdheParams};
pub use record::{record_len, RecordHeader, MAX_FRAGMENT_LEN, RECORD_HEADER_LEN};
pub use server_hello::ServerHello;
