//! Heartbeat scheduling (rfc6520).

use std::time::Duration;

/// Source of heartbeat payloads and timing for a connection that may send
/// heartbeat requests.
pub trait Heartbeat: Send {
    /// Payload of the next request.
    fn generate_payload(&mut self) -> Vec<u8>;

    /// Idle time before a request is sent.
    fn idle_millis(&self) -> u32;

    /// Time to wait for the response before the connection fails.
    fn timeout_millis(&self) -> u32;
}

/// Heartbeat with a 4-byte counter payload.
#[derive(Debug)]
pub struct DefaultHeartbeat {
    counter: u32,
    idle_millis: u32,
    timeout_millis: u32,
}

impl DefaultHeartbeat {
    pub fn new(idle: Duration, timeout: Duration) -> Self {
        let millis = |d: Duration| d.as_millis().clamp(1, u32::MAX as u128) as u32;
        DefaultHeartbeat {
            counter: 0,
            idle_millis: millis(idle),
            timeout_millis: millis(timeout),
        }
    }
}

impl Heartbeat for DefaultHeartbeat {
    fn generate_payload(&mut self) -> Vec<u8> {
        self.counter = self.counter.wrapping_add(1);
        self.counter.to_be_bytes().to_vec()
    }

    fn idle_millis(&self) -> u32 {
        self.idle_millis
    }

    fn timeout_millis(&self) -> u32 {
        self.timeout_millis
    }
}
