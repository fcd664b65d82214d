//! Character-device surface of the FIFO.
//!
//! [`FifoDevice`] is what gets registered with the host; every `open` on it
//! yields a [`FifoFile`] that owns a private read cursor into the shared
//! [`SlotChannel`].

mod module;
mod registry;

pub use module::{FifoModule, RegistrationError};
pub use registry::{ClassHandle, DeviceRegistry, LocalRegistry, RegistrationStage};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use myfifo_abi::MYFIFO_RESET;
use tracing::{debug, info};
use uuid::Uuid;

use crate::channel::{ReadCursor, SlotChannel};
use crate::error::{FifoError, Result};
use crate::signal::InterruptToken;
use crate::uaccess::{UserSliceReader, UserSliceWriter};

/// Identifier of one open file, for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.0)
    }
}

/// Commands accepted by [`FileOperations::ioctl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoCommand {
    /// Discard the current message (`MYFIFO_RESET`).
    Reset,
}

impl FifoCommand {
    /// Decode a raw ioctl number.
    pub fn decode(cmd: u32) -> Result<Self> {
        match cmd {
            MYFIFO_RESET => Ok(FifoCommand::Reset),
            other => Err(FifoError::UnsupportedOperation(other)),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            FifoCommand::Reset => MYFIFO_RESET,
        }
    }
}

/// Operations on an open file, as a `file_operations` table provides them.
///
/// Dropping the box without calling [`release`](Self::release) is allowed;
/// `release` only adds the close-time bookkeeping.
#[async_trait]
pub trait FileOperations: Send {
    fn id(&self) -> FileId;

    /// Blocking read into `dst`; at most `dst.len()` bytes.
    async fn read(
        &mut self,
        dst: &mut (dyn UserSliceWriter + Send),
        token: &InterruptToken,
    ) -> Result<usize>;

    /// Non-blocking write from `src`; returns the bytes accepted.
    async fn write(&mut self, src: &mut (dyn UserSliceReader + Send)) -> Result<usize>;

    /// Device-specific control command.
    async fn ioctl(&mut self, cmd: u32, arg: u64) -> Result<i64>;

    /// Last close of the file.
    fn release(self: Box<Self>);
}

/// Something that can be opened through a device node.
pub trait CharDevice: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self) -> Result<Box<dyn FileOperations>>;
}

/// The FIFO character device.
pub struct FifoDevice {
    name: String,
    channel: Arc<SlotChannel>,
}

impl FifoDevice {
    pub fn new(name: impl Into<String>, channel: Arc<SlotChannel>) -> Self {
        Self {
            name: name.into(),
            channel,
        }
    }

    pub fn channel(&self) -> &Arc<SlotChannel> {
        &self.channel
    }

    /// Open a file with its concrete type.
    pub fn open_file(&self) -> FifoFile {
        let file = FifoFile {
            id: FileId::new(),
            cursor: self.channel.open(),
            channel: Arc::clone(&self.channel),
        };
        info!(device = %self.name, file = %file.id, "Device open");
        file
    }
}

impl CharDevice for FifoDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Box<dyn FileOperations>> {
        Ok(Box::new(self.open_file()))
    }
}

/// One open file on the FIFO device.
pub struct FifoFile {
    id: FileId,
    cursor: ReadCursor,
    channel: Arc<SlotChannel>,
}

impl FifoFile {
    /// Current read position.
    pub fn offset(&self) -> usize {
        self.cursor.offset()
    }

    pub fn channel(&self) -> &Arc<SlotChannel> {
        &self.channel
    }
}

#[async_trait]
impl FileOperations for FifoFile {
    fn id(&self) -> FileId {
        self.id
    }

    async fn read(
        &mut self,
        dst: &mut (dyn UserSliceWriter + Send),
        token: &InterruptToken,
    ) -> Result<usize> {
        self.channel.read(&mut self.cursor, dst, token).await
    }

    async fn write(&mut self, src: &mut (dyn UserSliceReader + Send)) -> Result<usize> {
        self.channel.write(src).await
    }

    async fn ioctl(&mut self, cmd: u32, _arg: u64) -> Result<i64> {
        match FifoCommand::decode(cmd) {
            Ok(FifoCommand::Reset) => {
                info!(file = %self.id, "Resetting buffer");
                self.channel.reset().await;
                Ok(0)
            }
            Err(e) => {
                debug!(file = %self.id, cmd = format_args!("{cmd:#x}"), "Unsupported ioctl");
                Err(e)
            }
        }
    }

    fn release(self: Box<Self>) {
        let FifoFile { id, cursor, channel } = *self;
        channel.close(cursor);
        info!(file = %id, "Device closed");
    }
}
