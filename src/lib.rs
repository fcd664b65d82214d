//! myfifo - single-slot FIFO character device
//!
//! A device that holds at most one message. Writers replace the message,
//! readers block until one is present and then consume it through a
//! per-file cursor, and an ioctl clears it.
//!
//! ```text
//! write ──▶ [ SlotChannel: one message, capacity C ] ──▶ read (cursor A)
//!                        ▲                          └──▶ read (cursor B)
//!                 ioctl(MYFIFO_RESET)
//! ```
//!
//! The [`device`] module registers the channel as a character device with a
//! [`device::DeviceRegistry`]; [`transport`] serves the device node to other
//! processes over a Unix socket.

pub mod channel;
pub mod config;
pub mod device;
pub mod error;
pub mod signal;
pub mod transport;
pub mod uaccess;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use channel::{ReadCursor, SlotChannel, DEFAULT_CAPACITY};
pub use config::Config;
pub use device::{FifoDevice, FifoFile, FifoModule, FileOperations};
pub use error::{FifoError, Result};
pub use signal::{InterruptToken, Interrupter};
