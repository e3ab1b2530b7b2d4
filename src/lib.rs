#![forbid(unsafe_code)]
#![warn(clippy::all)]
// #![deny(missing_docs)]

//! DTLS 1.2 record layer and handshake engine over pluggable datagram
//! transports.

#[macro_use]
extern crate log;

mod buffer;
mod certificate;
mod config;
pub mod crypto;
mod dtls;
mod error;
pub mod message;
mod rng;
mod timeout;
mod timer;
pub mod types;
mod util;
mod window;

pub use certificate::{fingerprint, format_fingerprint, DtlsCertificate};
pub use config::{ClientAuth, Config, ConfigBuilder};
pub use dtls::*;
pub use error::Error;
pub use timeout::{Clock, ManualClock, MonotonicClock, Timeout};
