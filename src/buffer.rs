//! Byte buffers used by the record layer and the handshake codecs.
//!
//! [`Buf`] wraps `Vec<u8>` with the handful of operations the codecs need and
//! plugs into the AEAD in-place APIs. [`TmpBuf`] is a borrowed window used for
//! in-place decryption, and [`ByteQueue`] holds records that arrived packed in
//! the same datagram as an earlier one.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// Growable buffer wrapper used for records and handshake message bodies.
///
/// The `Debug` impl only reports the length so key material and plaintext
/// never end up in logs.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Buf(Vec<u8>);

impl Buf {
    /// Create a new empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Buf(Vec::with_capacity(capacity))
    }

    /// Create a new buffer from a slice.
    pub fn from_slice(data: &[u8]) -> Self {
        Buf(data.to_vec())
    }

    /// Clear the buffer, removing all data.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Extend the buffer with a slice of bytes.
    pub fn extend_from_slice(&mut self, other: &[u8]) {
        self.0.extend_from_slice(other);
    }

    /// Push a single byte onto the buffer.
    pub fn push(&mut self, byte: u8) {
        self.0.push(byte);
    }

    /// Append a big-endian u16.
    pub fn push_u16(&mut self, value: u16) {
        self.0.extend_from_slice(&value.to_be_bytes());
    }

    /// Append the low 24 bits of `value`, big-endian.
    pub fn push_u24(&mut self, value: u32) {
        self.0.extend_from_slice(&value.to_be_bytes()[1..]);
    }

    /// Resize the buffer to the specified length, filling with the given value.
    pub fn resize(&mut self, len: usize, value: u8) {
        self.0.resize(len, value);
    }

    /// Truncate the buffer to the specified length.
    /// If `len` is greater than the buffer's current length, this has no effect.
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    /// Convert the buffer into the underlying `Vec<u8>`.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Buf {
    fn from(value: Vec<u8>) -> Self {
        Buf(value)
    }
}

impl Deref for Buf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Buf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl AsRef<[u8]> for Buf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Buf {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for Buf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buf").field("len", &self.0.len()).finish()
    }
}

/// Temporary mutable buffer wrapper for in-place operations.
///
/// Used for decryption where the ciphertext is turned into plaintext inside
/// the receive buffer. The tracked length shrinks when the tag is stripped.
#[allow(clippy::len_without_is_empty)]
pub struct TmpBuf<'a>(&'a mut [u8], usize);

impl<'a> TmpBuf<'a> {
    /// Create a new temporary buffer from a mutable slice.
    pub fn new(buf: &'a mut [u8]) -> Self {
        let len = buf.len();
        Self(buf, len)
    }

    /// Get the length of the buffer
    pub fn len(&self) -> usize {
        self.1
    }
}

impl AsRef<[u8]> for TmpBuf<'_> {
    fn as_ref(&self) -> &[u8] {
        &self.0[..self.1]
    }
}

impl AsMut<[u8]> for TmpBuf<'_> {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0[..self.1]
    }
}

impl aes_gcm::aead::Buffer for TmpBuf<'_> {
    fn extend_from_slice(&mut self, other: &[u8]) -> Result<(), aes_gcm::aead::Error> {
        let available = self.0.len() - self.1;
        if available < other.len() {
            return Err(aes_gcm::aead::Error);
        }
        self.0[self.1..self.1 + other.len()].copy_from_slice(other);
        self.1 += other.len();
        Ok(())
    }

    fn truncate(&mut self, len: usize) {
        if len <= self.1 {
            self.1 = len;
        }
    }
}

impl aes_gcm::aead::Buffer for Buf {
    fn extend_from_slice(&mut self, other: &[u8]) -> Result<(), aes_gcm::aead::Error> {
        self.0.extend_from_slice(other);
        Ok(())
    }

    fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }
}

/// FIFO of bytes left over after the first record of a datagram.
///
/// Consumed bytes are skipped rather than shifted; the backing storage is
/// compacted lazily when new data is appended.
#[derive(Default)]
pub struct ByteQueue {
    data: Vec<u8>,
    skipped: usize,
}

impl ByteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unread bytes.
    pub fn available(&self) -> usize {
        self.data.len() - self.skipped
    }

    pub fn add_data(&mut self, bytes: &[u8]) {
        if self.skipped > 0 && self.skipped >= self.data.len() / 2 {
            self.data.drain(..self.skipped);
            self.skipped = 0;
        }
        self.data.extend_from_slice(bytes);
    }

    /// Unread bytes, without consuming them.
    pub fn peek(&self) -> &[u8] {
        &self.data[self.skipped..]
    }

    /// Copy up to `out.len()` bytes out of the queue and consume them.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.available());
        out[..n].copy_from_slice(&self.data[self.skipped..self.skipped + n]);
        self.remove(n);
        n
    }

    /// Put `bytes` back in front of the unread data.
    pub fn push_front(&mut self, bytes: &[u8]) {
        if bytes.len() <= self.skipped {
            self.skipped -= bytes.len();
            self.data[self.skipped..self.skipped + bytes.len()].copy_from_slice(bytes);
        } else {
            self.data.splice(self.skipped..self.skipped, bytes.iter().copied());
        }
    }

    /// Discard `n` bytes from the front of the queue.
    pub fn remove(&mut self, n: usize) {
        self.skipped = (self.skipped + n).min(self.data.len());
        if self.skipped == self.data.len() {
            self.data.clear();
            self.skipped = 0;
        }
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.skipped = 0;
    }
}

impl fmt::Debug for ByteQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteQueue")
            .field("available", &self.available())
            .finish()
    }
}
