use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::crypto::TlsCipher;
use crate::message::RECORD_HEADER_LEN;
use crate::util::lock;
use crate::window::ReplayWindow;
use crate::Error;

const MAX_SEQUENCE_NUMBER: u64 = 1 << 48;

/// One generation of record protection.
///
/// The epoch number and header lengths never change. The cipher, the
/// sequence counter and the replay window are each behind their own lock
/// since the receive path and several senders touch them independently.
pub(crate) struct DtlsEpoch {
    epoch: u16,
    cipher: Mutex<Box<dyn TlsCipher>>,
    sequence_number: Mutex<u64>,
    replay_window: Mutex<ReplayWindow>,
    record_header_len_read: usize,
    record_header_len_write: usize,
}

impl DtlsEpoch {
    /// `read_cid_len`/`write_cid_len` are the connection ID lengths carried
    /// by inbound and outbound records of this epoch.
    pub fn new(
        epoch: u16,
        cipher: Box<dyn TlsCipher>,
        read_cid_len: usize,
        write_cid_len: usize,
    ) -> Self {
        DtlsEpoch {
            epoch,
            cipher: Mutex::new(cipher),
            sequence_number: Mutex::new(0),
            replay_window: Mutex::new(ReplayWindow::new()),
            record_header_len_read: RECORD_HEADER_LEN + read_cid_len,
            record_header_len_write: RECORD_HEADER_LEN + write_cid_len,
        }
    }

    /// Take the next record sequence number.
    pub fn allocate_sequence_number(&self) -> Result<u64, Error> {
        let mut seq = lock(&self.sequence_number);
        if *seq >= MAX_SEQUENCE_NUMBER {
            return Err(Error::internal_error("sequence number exhausted"));
        }
        let allocated = *seq;
        *seq += 1;
        Ok(allocated)
    }

    pub fn set_sequence_number(&self, seq: u64) {
        *lock(&self.sequence_number) = seq;
    }

    pub fn epoch(&self) -> u16 {
        self.epoch
    }

    pub fn cipher(&self) -> MutexGuard<'_, Box<dyn TlsCipher>> {
        lock(&self.cipher)
    }

    pub fn replay_window(&self) -> MutexGuard<'_, ReplayWindow> {
        lock(&self.replay_window)
    }

    pub fn record_header_len_read(&self) -> usize {
        self.record_header_len_read
    }

    pub fn record_header_len_write(&self) -> usize {
        self.record_header_len_write
    }
}

impl fmt::Debug for DtlsEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DtlsEpoch")
            .field("epoch", &self.epoch)
            .field("sequence_number", &*lock(&self.sequence_number))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::crypto::NullCipher;

    #[test]
    fn concurrent_allocation_is_unique() {
        let epoch = Arc::new(DtlsEpoch::new(0, Box::new(NullCipher), 0, 0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let epoch = epoch.clone();
                thread::spawn(move || {
                    (0..250)
                        .map(|_| epoch.allocate_sequence_number().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for seq in h.join().unwrap() {
                assert!(seen.insert(seq));
            }
        }
        assert_eq!(seen, (0..1000).collect());
    }

    #[test]
    fn refuses_to_wrap() {
        let epoch = DtlsEpoch::new(1, Box::new(NullCipher), 0, 0);
        epoch.set_sequence_number(MAX_SEQUENCE_NUMBER - 1);
        assert_eq!(epoch.allocate_sequence_number().unwrap(), MAX_SEQUENCE_NUMBER - 1);
        assert!(epoch.allocate_sequence_number().is_err());
    }

    #[test]
    fn header_lengths_include_cid() {
        let epoch = DtlsEpoch::new(1, Box::new(NullCipher), 4, 2);
        assert_eq!(epoch.record_header_len_read(), 17);
        assert_eq!(epoch.record_header_len_write(), 15);
    }
}
