use std::ops::Range;

use crate::types::HandshakeType;

/// Collects the fragments of one handshake message.
#[derive(Debug)]
pub(crate) struct DtlsReassembler {
    msg_type: HandshakeType,
    body: Vec<u8>,
    missing: Vec<Range<usize>>,
}

impl DtlsReassembler {
    pub fn new(msg_type: HandshakeType, length: usize) -> Self {
        DtlsReassembler {
            msg_type,
            body: vec![0; length],
            missing: vec![0..length],
        }
    }

    pub fn msg_type(&self) -> HandshakeType {
        self.msg_type
    }

    pub fn body_if_complete(&self) -> Option<&[u8]> {
        self.missing.is_empty().then_some(&self.body[..])
    }

    /// Copy the parts of `fragment` we do not have yet. Fragments that do not
    /// match the message type or length are ignored.
    pub fn contribute_fragment(
        &mut self,
        msg_type: HandshakeType,
        length: usize,
        fragment: &[u8],
        fragment_offset: usize,
    ) {
        let fragment_end = fragment_offset + fragment.len();
        if self.msg_type != msg_type || self.body.len() != length || fragment_end > length {
            return;
        }

        if fragment.is_empty() {
            // An empty message still needs its empty fragment.
            if fragment_offset == 0 && self.missing.first().is_some_and(|r| r.end == 0) {
                self.missing.remove(0);
            }
            return;
        }

        let mut i = 0;
        while i < self.missing.len() {
            let range = self.missing[i].clone();
            if range.start >= fragment_end {
                break;
            }
            if range.end > fragment_offset {
                let copy_start = range.start.max(fragment_offset);
                let copy_end = range.end.min(fragment_end);
                self.body[copy_start..copy_end].copy_from_slice(
                    &fragment[copy_start - fragment_offset..copy_end - fragment_offset],
                );

                if copy_start == range.start {
                    if copy_end == range.end {
                        self.missing.remove(i);
                        continue;
                    }
                    self.missing[i].start = copy_end;
                } else {
                    self.missing[i].end = copy_start;
                    if copy_end != range.end {
                        i += 1;
                        self.missing.insert(i, copy_end..range.end);
                    }
                }
            }
            i += 1;
        }
    }

    /// Forget everything received so far.
    pub fn reset(&mut self) {
        self.missing.clear();
        self.missing.push(0..self.body.len());
    }
}
