//! Test utilities and fault-injecting buffers.
//!
//! These stand in for caller memory that cannot be accessed, so tests can
//! drive the `Fault` paths of read and write.

use crate::error::{FifoError, Result};
use crate::uaccess::{UserSliceReader, UserSliceWriter};

/// Write source that claims `len` bytes but faults on every copy.
#[derive(Debug, Clone, Copy)]
pub struct FaultingReader {
    len: usize,
}

impl FaultingReader {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl UserSliceReader for FaultingReader {
    fn len(&self) -> usize {
        self.len
    }

    fn read_into(&mut self, _dst: &mut [u8]) -> Result<()> {
        Err(FifoError::Fault)
    }
}

/// Read destination that claims `len` bytes but faults on every copy.
#[derive(Debug, Clone, Copy)]
pub struct FaultingWriter {
    len: usize,
}

impl FaultingWriter {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl UserSliceWriter for FaultingWriter {
    fn len(&self) -> usize {
        self.len
    }

    fn write_from(&mut self, _src: &[u8]) -> Result<()> {
        Err(FifoError::Fault)
    }
}

/// Build a message that carries its own sequence number and length.
///
/// Layout: `seq` (u64 BE), `len` (u32 BE), then `len - 12` copies of the
/// low byte of `seq`. A reader holding a consistent snapshot can verify all
/// three agree.
pub fn sequenced_message(seq: u64, len: usize) -> Vec<u8> {
    assert!(len >= SEQUENCED_HEADER_LEN, "message too short for header");
    let mut msg = Vec::with_capacity(len);
    msg.extend_from_slice(&seq.to_be_bytes());
    msg.extend_from_slice(&(len as u32).to_be_bytes());
    msg.resize(len, seq as u8);
    msg
}

/// Header size of [`sequenced_message`].
pub const SEQUENCED_HEADER_LEN: usize = 12;

/// Check a message built by [`sequenced_message`].
///
/// Returns the sequence number when header, length and fill all agree.
pub fn verify_sequenced_message(msg: &[u8]) -> Option<u64> {
    let seq = u64::from_be_bytes(msg.get(..8)?.try_into().ok()?);
    let len = u32::from_be_bytes(msg.get(8..12)?.try_into().ok()?) as usize;
    if len != msg.len() {
        return None;
    }
    let fill = seq as u8;
    msg[SEQUENCED_HEADER_LEN..]
        .iter()
        .all(|b| *b == fill)
        .then_some(seq)
}
