//! DTLS 1.2 over an unreliable datagram transport.
//!
//! [`DtlsClientProtocol`] and [`DtlsServerProtocol`] run the handshake and
//! hand back a [`DtlsTransport`] for application data. A server facing
//! many clients on one socket puts a [`DtlsVerifier`] in front of it.

mod client;
mod common;
mod epoch;
mod handshake_hash;
mod heartbeat;
mod key_exchange;
mod peer;
mod reassembler;
mod record_layer;
mod reliable;
mod server;
mod session;
mod transport;
mod verifier;

pub use client::DtlsClientProtocol;
pub use heartbeat::{DefaultHeartbeat, Heartbeat};
pub use peer::{Credentials, DtlsClient, DtlsPeer, DtlsServer, PskIdentity};
pub use server::DtlsServerProtocol;
pub use session::{Session, SessionCache, SessionParameters};
pub use transport::{DatagramReceiver, DatagramSender, DatagramTransport};
pub use transport::{Delivery, DtlsTransport, MemoryTransport, UdpTransport};
pub use verifier::{DtlsRequest, DtlsVerifier};
