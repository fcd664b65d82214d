//! Userspace access to the device over a Unix domain socket.
//!
//! Outside a kernel there is no `/dev/myfifo` a process could `open(2)`.
//! The daemon stands in for the VFS: every accepted connection is one open
//! file on the device, and the requests on it map one-to-one onto
//! `read(2)`, `write(2)` and `ioctl(2)`.
//!
//! ```text
//! ┌──────────┐  UDS   ┌──────────────┐  open/read/write/ioctl  ┌────────────┐
//! │ client A │──────▶│              │───────────────────────▶│            │
//! └──────────┘        │  FifoServer  │                         │ FifoDevice │
//! ┌──────────┐  UDS   │ (1 conn = 1  │───────────────────────▶│ (channel)  │
//! │ client B │──────▶│  open file)  │                         │            │
//! └──────────┘        └──────────────┘                         └────────────┘
//! ```

mod client;
mod codec;
mod server;

pub use client::FifoClient;
pub use codec::{
    read_frame, write_frame, Request, Response, MAX_FRAME_LEN, MAX_READ_LEN, MAX_WRITE_LEN,
};
pub use server::FifoServer;

use myfifo_abi::Errno;

/// Errors on the userspace transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame of {0} bytes exceeds limit of {max}", max = MAX_FRAME_LEN)]
    FrameTooLarge(usize),

    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// The device returned an error for the request.
    #[error("Device error: {0}")]
    Errno(Errno),
}

pub type Result<T> = std::result::Result<T, TransportError>;
