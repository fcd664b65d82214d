//! Single-slot message channel.
//!
//! The channel holds exactly one message: a fixed-capacity buffer and the
//! number of valid bytes in it. Writers replace the message wholesale;
//! readers consume it through a private [`ReadCursor`] and sleep while their
//! cursor has caught up with the published length.
//!
//! ```text
//!                 write (length grows past offset)
//!   ┌──────────┐ ─────────────────────────────────▶ ┌─────────┐
//!   │ WAITING  │                                    │  READY  │
//!   │ off >= n │ ◀───────────────────────────────── │ off < n │
//!   └──────────┘   read catches up / reset (n = 0)  └─────────┘
//! ```
//!
//! `buffer` and `length` live behind one lock and are only ever changed
//! together, so a reader never sees a new length paired with old bytes.

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::error::{FifoError, Result};
use crate::signal::InterruptToken;
use crate::uaccess::{ReadBuffer, UserSliceReader, UserSliceWriter};

/// Default buffer capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Number of payload bytes included in debug logs.
const LOG_PREVIEW_BYTES: usize = 32;

/// Read position of one open file.
///
/// Owned by exactly one handle and never shared. It only moves forward;
/// [`SlotChannel::reset`] does not rewind it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadCursor {
    offset: usize,
}

impl ReadCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of the current message this handle has consumed.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Lock-protected part of the channel.
#[derive(Debug)]
struct SlotState {
    buffer: Box<[u8]>,
    length: usize,
}

/// Fixed-capacity, replace-on-write channel with blocking reads.
///
/// One instance backs one device; share it with `Arc`.
#[derive(Debug)]
pub struct SlotChannel {
    state: Mutex<SlotState>,
    /// Signalled on every completed write.
    ready: Notify,
    capacity: usize,
}

impl SlotChannel {
    /// Create an empty channel with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty channel holding at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(SlotState {
                buffer: vec![0u8; capacity].into_boxed_slice(),
                length: 0,
            }),
            ready: Notify::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid bytes in the current message.
    pub async fn len(&self) -> usize {
        self.state.lock().await.length
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of the current message.
    pub async fn contents(&self) -> Vec<u8> {
        let state = self.state.lock().await;
        state.buffer[..state.length].to_vec()
    }

    /// Start a new reader at offset 0. Does not touch the message.
    pub fn open(&self) -> ReadCursor {
        ReadCursor::new()
    }

    /// Drop a reader. Does not touch the message.
    pub fn close(&self, cursor: ReadCursor) {
        debug!(offset = cursor.offset, "Cursor closed");
    }

    /// Replace the message with the bytes offered by `src`.
    ///
    /// Accepts at most `capacity` bytes; the rest is dropped without an
    /// error. Returns the number of bytes accepted. If `src` faults, the
    /// current message is left untouched.
    pub async fn write<R>(&self, src: &mut R) -> Result<usize>
    where
        R: UserSliceReader + Send + ?Sized,
    {
        let offered = src.len();
        let accepted = offered.min(self.capacity);
        if offered > self.capacity {
            warn!(
                offered,
                capacity = self.capacity,
                "Data too large, truncating"
            );
        }

        // Copy in before taking the lock so a faulting source cannot leave
        // a cleared buffer behind.
        let mut staged = vec![0u8; accepted];
        src.read_into(&mut staged)?;

        let mut state = self.state.lock().await;
        state.buffer.fill(0);
        state.buffer[..accepted].copy_from_slice(&staged);
        state.length = accepted;
        self.ready.notify_waiters();
        drop(state);

        debug!(
            bytes = accepted,
            preview = %hex::encode(&staged[..accepted.min(LOG_PREVIEW_BYTES)]),
            "Received bytes from user"
        );
        Ok(accepted)
    }

    /// Replace the message with `data`. Infallible form of [`write`](Self::write).
    pub async fn write_bytes(&self, data: &[u8]) -> usize {
        let mut src = data;
        // A byte slice always covers its own length.
        self.write(&mut src).await.unwrap_or(0)
    }

    /// Read from the current message at the cursor position.
    ///
    /// Sleeps while the cursor has consumed everything published so far.
    /// Copies `min(dst.len(), length - offset)` bytes and advances the
    /// cursor by that amount.
    ///
    /// # Errors
    /// - [`FifoError::Interrupted`] if `token` fires while sleeping.
    /// - [`FifoError::Fault`] if `dst` cannot be written.
    ///
    /// Neither error moves the cursor.
    pub async fn read<W>(
        &self,
        cursor: &mut ReadCursor,
        dst: &mut W,
        token: &InterruptToken,
    ) -> Result<usize>
    where
        W: UserSliceWriter + Send + ?Sized,
    {
        let max_len = dst.len();

        loop {
            let state = self.state.lock().await;

            if cursor.offset < state.length {
                let count = max_len.min(state.length - cursor.offset);
                let start = cursor.offset;
                dst.write_from(&state.buffer[start..start + count])?;
                cursor.offset += count;
                drop(state);

                debug!(bytes = count, offset = cursor.offset, "Sent bytes to user");
                return Ok(count);
            }

            // Register before unlocking: a write that lands between the
            // unlock and the await below still wakes this reader.
            let ready = self.ready.notified();
            drop(state);

            tokio::select! {
                _ = ready => {}
                _ = token.interrupted() => {
                    debug!(offset = cursor.offset, "Read interrupted");
                    return Err(FifoError::Interrupted);
                }
            }
        }
    }

    /// Read up to `max_len` bytes into a new vector.
    pub async fn read_to_vec(
        &self,
        cursor: &mut ReadCursor,
        max_len: usize,
        token: &InterruptToken,
    ) -> Result<Vec<u8>> {
        let mut buf = ReadBuffer::with_max_len(max_len);
        self.read(cursor, &mut buf, token).await?;
        Ok(buf.into_vec())
    }

    /// Discard the current message.
    ///
    /// Cursors keep their offsets, so a reader that had consumed part of the
    /// old message sleeps until a write publishes more than it has read.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.length = 0;
        state.buffer.fill(0);
        drop(state);

        info!("Buffer reset");
    }
}

impl Default for SlotChannel {
    fn default() -> Self {
        Self::new()
    }
}
