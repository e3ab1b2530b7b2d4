/// Sliding replay window for DTLS record sequence numbers (RFC 6347 4.1.2.6).
///
/// Maintains the latest authenticated sequence number and a 64-bit bitmap of
/// the last 64 sequence numbers seen. Checking and recording are split: a
/// record is checked before decryption and only recorded once it has been
/// authenticated, so forged records cannot move the window.
///
/// Each epoch has its own window.
#[derive(Debug, Default)]
pub struct ReplayWindow {
    latest: Option<u64>,
    bitmap: u64,
}

const WINDOW_SIZE: u64 = 64;
const VALID_SEQ_MASK: u64 = (1 << 48) - 1;

impl ReplayWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a record with `seq` must be dropped as a duplicate or as too
    /// old for the window.
    pub fn should_discard(&self, seq: u64) -> bool {
        if seq & VALID_SEQ_MASK != seq {
            return true;
        }

        match self.latest {
            Some(latest) if seq <= latest => {
                let offset = latest - seq;
                offset >= WINDOW_SIZE || (self.bitmap & (1u64 << offset)) != 0
            }
            _ => false,
        }
    }

    /// Record that a record with `seq` decrypted and authenticated.
    pub fn report_authenticated(&mut self, seq: u64) {
        if seq & VALID_SEQ_MASK != seq {
            return;
        }

        match self.latest {
            Some(latest) if seq <= latest => {
                let offset = latest - seq;
                if offset < WINDOW_SIZE {
                    self.bitmap |= 1u64 << offset;
                }
            }
            Some(latest) => {
                let shift = seq - latest;
                self.bitmap = if shift >= WINDOW_SIZE {
                    1
                } else {
                    (self.bitmap << shift) | 1
                };
                self.latest = Some(seq);
            }
            None => {
                self.bitmap = 1;
                self.latest = Some(seq);
            }
        }
    }

    /// Treat `seq` as the latest seen record: anything at or below it is
    /// discarded from now on.
    pub fn reset(&mut self, seq: u64) {
        self.latest = Some(seq & VALID_SEQ_MASK);
        self.bitmap = u64::MAX;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(w: &mut ReplayWindow, seq: u64) -> bool {
        if w.should_discard(seq) {
            return false;
        }
        w.report_authenticated(seq);
        true
    }

    #[test]
    fn accepts_fresh_and_rejects_duplicate() {
        let mut w = ReplayWindow::new();
        assert!(accept(&mut w, 0));
        assert!(accept(&mut w, 1));
        assert!(!accept(&mut w, 1));
        assert!(accept(&mut w, 2));
    }

    #[test]
    fn accepts_out_of_order_within_window() {
        let mut w = ReplayWindow::new();
        assert!(accept(&mut w, 10));
        assert!(accept(&mut w, 8));
        assert!(!accept(&mut w, 8));
        assert!(accept(&mut w, 9));
    }

    #[test]
    fn rejects_too_old() {
        let mut w = ReplayWindow::new();
        assert!(accept(&mut w, 100));
        // offset = 64 -> too old
        assert!(!accept(&mut w, 36));
        // offset = 63 -> allowed once
        assert!(accept(&mut w, 37));
        assert!(!accept(&mut w, 37));
    }

    #[test]
    fn large_jump_clears_bitmap() {
        let mut w = ReplayWindow::new();
        assert!(accept(&mut w, 1));
        assert!(accept(&mut w, 500));
        assert!(!accept(&mut w, 1));
        assert!(accept(&mut w, 499));
    }

    #[test]
    fn check_does_not_record() {
        let mut w = ReplayWindow::new();
        assert!(!w.should_discard(5));
        // A forged record that failed authentication is never reported.
        assert!(!w.should_discard(5));
        w.report_authenticated(5);
        assert!(w.should_discard(5));
    }

    #[test]
    fn rejects_out_of_range_sequence() {
        let w = ReplayWindow::new();
        assert!(w.should_discard(1 << 48));
    }

    #[test]
    fn reset_discards_up_to_seq() {
        let mut w = ReplayWindow::new();
        assert!(accept(&mut w, 3));
        w.reset(7);
        assert!(w.should_discard(7));
        assert!(w.should_discard(6));
        assert!(w.should_discard(3));
        assert!(accept(&mut w, 8));
    }
}
