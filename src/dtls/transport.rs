//! Datagram I/O seams and the public post-handshake transport.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use super::record_layer::DtlsRecordLayer;
use crate::util::lock;
use crate::Error;

/// Outbound half of a datagram transport.
pub trait DatagramSender: Send + Sync {
    /// Largest datagram that may be sent.
    fn send_limit(&self) -> usize;

    fn send(&self, datagram: &[u8]) -> io::Result<()>;
}

/// Inbound half of a datagram transport.
pub trait DatagramReceiver: Send + Sync {
    /// Largest datagram that may be received.
    fn receive_limit(&self) -> usize;

    /// Receive one datagram into `buf`, waiting at most `wait_millis`.
    ///
    /// A wait of `0` blocks until a datagram arrives. `Ok(None)` means
    /// nothing arrived in time.
    fn receive(&self, buf: &mut [u8], wait_millis: u32) -> io::Result<Option<usize>>;
}

pub trait DatagramTransport: DatagramSender + DatagramReceiver {
    fn close(&self) -> io::Result<()>;
}

/// Transport over a connected [`UdpSocket`].
pub struct UdpTransport {
    socket: UdpSocket,
    mtu: usize,
}

/// IPv4 (20) + UDP (8) header overhead.
const UDP_OVERHEAD: usize = 28;

impl UdpTransport {
    /// `socket` must already be connected to the peer.
    pub fn new(socket: UdpSocket, mtu: usize) -> Self {
        UdpTransport { socket, mtu }
    }

    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

impl DatagramSender for UdpTransport {
    fn send_limit(&self) -> usize {
        self.mtu.saturating_sub(UDP_OVERHEAD)
    }

    fn send(&self, datagram: &[u8]) -> io::Result<()> {
        self.socket.send(datagram)?;
        Ok(())
    }
}

impl DatagramReceiver for UdpTransport {
    fn receive_limit(&self) -> usize {
        self.mtu.saturating_sub(UDP_OVERHEAD)
    }

    fn receive(&self, buf: &mut [u8], wait_millis: u32) -> io::Result<Option<usize>> {
        let timeout = (wait_millis > 0).then(|| Duration::from_millis(wait_millis as u64));
        self.socket.set_read_timeout(timeout)?;

        match self.socket.recv(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl DatagramTransport for UdpTransport {
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpTransport")
            .field("peer", &self.socket.peer_addr().ok())
            .field("mtu", &self.mtu)
            .finish()
    }
}

pub(crate) fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// What a [`MemoryTransport`] filter does with an outgoing datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Deliver,
    Drop,
    Duplicate,
}

type Filter = Box<dyn FnMut(&[u8]) -> Delivery + Send>;

#[derive(Default)]
struct Queue {
    datagrams: Mutex<VecDeque<Vec<u8>>>,
    ready: Condvar,
}

impl Queue {
    fn push(&self, datagram: Vec<u8>) {
        lock(&self.datagrams).push_back(datagram);
        self.ready.notify_one();
    }
}

/// One end of an in-process datagram pipe.
///
/// Outgoing datagrams pass through an optional filter that may drop or
/// duplicate them, which makes loss and retransmission reproducible.
pub struct MemoryTransport {
    mtu: usize,
    inbound: Arc<Queue>,
    outbound: Arc<Queue>,
    filter: Mutex<Option<Filter>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// Two connected ends with the same `mtu`.
    pub fn pair(mtu: usize) -> (MemoryTransport, MemoryTransport) {
        let a = Arc::new(Queue::default());
        let b = Arc::new(Queue::default());
        let end = |inbound: &Arc<Queue>, outbound: &Arc<Queue>| MemoryTransport {
            mtu,
            inbound: inbound.clone(),
            outbound: outbound.clone(),
            filter: Mutex::new(None),
            closed: AtomicBool::new(false),
        };
        (end(&a, &b), end(&b, &a))
    }

    /// Install a filter applied to every datagram this end sends.
    pub fn set_filter(&self, filter: impl FnMut(&[u8]) -> Delivery + Send + 'static) {
        *lock(&self.filter) = Some(Box::new(filter));
    }

    pub fn clear_filter(&self) {
        *lock(&self.filter) = None;
    }

    /// Queue a datagram as if the peer had sent it.
    pub fn inject(&self, datagram: &[u8]) {
        self.inbound.push(datagram.to_vec());
    }

    /// Datagrams waiting to be received by this end.
    pub fn pending(&self) -> usize {
        lock(&self.inbound.datagrams).len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl DatagramSender for MemoryTransport {
    fn send_limit(&self) -> usize {
        self.mtu
    }

    fn send(&self, datagram: &[u8]) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport closed"));
        }
        if datagram.len() > self.mtu {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "datagram larger than mtu",
            ));
        }

        let delivery = match lock(&self.filter).as_mut() {
            Some(filter) => filter(datagram),
            None => Delivery::Deliver,
        };

        match delivery {
            Delivery::Deliver => self.outbound.push(datagram.to_vec()),
            Delivery::Drop => trace!("Filter dropped datagram of {} bytes", datagram.len()),
            Delivery::Duplicate => {
                self.outbound.push(datagram.to_vec());
                self.outbound.push(datagram.to_vec());
            }
        }
        Ok(())
    }
}

impl DatagramReceiver for MemoryTransport {
    fn receive_limit(&self) -> usize {
        self.mtu
    }

    fn receive(&self, buf: &mut [u8], wait_millis: u32) -> io::Result<Option<usize>> {
        let mut queue = lock(&self.inbound.datagrams);

        if wait_millis == 0 {
            while queue.is_empty() {
                queue = self
                    .inbound
                    .ready
                    .wait(queue)
                    .unwrap_or_else(|e| e.into_inner());
            }
        } else if queue.is_empty() {
            let timeout = Duration::from_millis(wait_millis as u64);
            let (guard, _) = self
                .inbound
                .ready
                .wait_timeout_while(queue, timeout, |q| q.is_empty())
                .unwrap_or_else(|e| e.into_inner());
            queue = guard;
        }

        let Some(datagram) = queue.pop_front() else {
            return Ok(None);
        };
        let n = datagram.len().min(buf.len());
        buf[..n].copy_from_slice(&datagram[..n]);
        Ok(Some(n))
    }
}

impl DatagramTransport for MemoryTransport {
    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("mtu", &self.mtu)
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// An established DTLS connection.
///
/// Fatal errors raised while receiving or sending fail the connection: a
/// fatal alert is sent (best effort) and the datagram transport is closed.
pub struct DtlsTransport {
    record_layer: Arc<DtlsRecordLayer>,
}

impl DtlsTransport {
    pub(crate) fn new(record_layer: Arc<DtlsRecordLayer>) -> Self {
        DtlsTransport { record_layer }
    }

    /// Largest application payload [`receive`](Self::receive) can return.
    pub fn receive_limit(&self) -> usize {
        self.record_layer.receive_limit()
    }

    /// Largest application payload [`send`](Self::send) accepts.
    pub fn send_limit(&self) -> usize {
        self.record_layer.send_limit()
    }

    /// Receive application data, waiting at most `wait_millis` (`0` waits
    /// forever). `Ok(None)` means no data arrived in time.
    pub fn receive(&self, buf: &mut [u8], wait_millis: u32) -> Result<Option<usize>, Error> {
        let result = self.record_layer.receive(buf, wait_millis);
        self.fail_on_error(result)
    }

    /// Receive application data from records already queued, without
    /// touching the datagram transport.
    pub fn receive_pending(&self, buf: &mut [u8]) -> Result<Option<usize>, Error> {
        let result = self.record_layer.receive_pending(buf);
        self.fail_on_error(result)
    }

    pub fn send(&self, buf: &[u8]) -> Result<(), Error> {
        if buf.len() > self.send_limit() {
            return Err(Error::internal_error(format!(
                "payload of {} bytes exceeds send limit {}",
                buf.len(),
                self.send_limit()
            )));
        }
        let result = self.record_layer.send(buf);
        self.fail_on_error(result)
    }

    /// Close gracefully with a `close_notify` alert.
    pub fn close(&self) {
        self.record_layer.close();
    }

    pub fn is_closed(&self) -> bool {
        self.record_layer.is_closed()
    }

    fn fail_on_error<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &result {
            match e {
                Error::BufferTooSmall { .. } | Error::Closed => {}
                _ => {
                    if let Some(description) = e.alert_description() {
                        self.record_layer.fail(description);
                    }
                }
            }
        }
        result
    }
}

impl fmt::Debug for DtlsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DtlsTransport")
            .field("closed", &self.is_closed())
            .finish()
    }
}
