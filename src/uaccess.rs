//! Caller buffer access.
//!
//! The device never touches caller memory directly: it copies in through a
//! [`UserSliceReader`] and out through a [`UserSliceWriter`], the equivalents
//! of `copy_from_user` and `copy_to_user`. Either copy may fail with
//! [`FifoError::Fault`], in which case the operation must leave the device
//! as it found it.

use crate::error::{FifoError, Result};

/// Source of bytes supplied by the caller of `write`.
pub trait UserSliceReader {
    /// Number of bytes the caller offered.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the first `dst.len()` bytes of the source into `dst`.
    fn read_into(&mut self, dst: &mut [u8]) -> Result<()>;
}

/// Destination supplied by the caller of `read`.
pub trait UserSliceWriter {
    /// Capacity of the destination; the `maxLen` of a read.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `src` to the start of the destination.
    fn write_from(&mut self, src: &[u8]) -> Result<()>;
}

impl UserSliceReader for &[u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read_into(&mut self, dst: &mut [u8]) -> Result<()> {
        let src = self.get(..dst.len()).ok_or(FifoError::Fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl UserSliceReader for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn read_into(&mut self, dst: &mut [u8]) -> Result<()> {
        self.as_slice().read_into(dst)
    }
}

impl UserSliceWriter for &mut [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn write_from(&mut self, src: &[u8]) -> Result<()> {
        let dst = self.get_mut(..src.len()).ok_or(FifoError::Fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Growable read destination with a fixed maximum length.
///
/// Convenient for callers that want the read result as an owned vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBuffer {
    max_len: usize,
    data: Vec<u8>,
}

impl ReadBuffer {
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len,
            data: Vec::new(),
        }
    }

    /// Bytes written by the last read.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl UserSliceWriter for ReadBuffer {
    fn len(&self) -> usize {
        self.max_len
    }

    fn write_from(&mut self, src: &[u8]) -> Result<()> {
        if src.len() > self.max_len {
            return Err(FifoError::Fault);
        }
        self.data.clear();
        self.data.extend_from_slice(src);
        Ok(())
    }
}
