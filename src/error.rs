//! Device error types.
//!
//! Every failure a file operation can report, plus the errno each one
//! becomes at the user/kernel boundary.

use myfifo_abi::Errno;

/// Result type for file operations on the device.
pub type Result<T> = std::result::Result<T, FifoError>;

/// Errors returned by file operations.
///
/// Truncated writes and short reads are not errors; callers compare the
/// returned count against what they asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FifoError {
    /// A blocked read was interrupted before data arrived.
    /// Nothing was consumed; the caller should retry.
    #[error("Read interrupted before data was available")]
    Interrupted,

    /// The caller's buffer could not be accessed during a copy.
    #[error("Bad address in user buffer")]
    Fault,

    /// ioctl command the device does not implement.
    #[error("Unsupported ioctl command {0:#x}")]
    UnsupportedOperation(u32),
}

impl FifoError {
    /// Kernel-side errno for this error.
    pub fn errno(self) -> Errno {
        match self {
            FifoError::Interrupted => Errno::ERESTARTSYS,
            FifoError::Fault => Errno::EFAULT,
            FifoError::UnsupportedOperation(_) => Errno::ENOTTY,
        }
    }

    /// Negative errno, as a file operation returns it.
    pub fn to_errno(self) -> i32 {
        self.errno().to_errno()
    }
}

impl From<FifoError> for Errno {
    fn from(err: FifoError) -> Self {
        err.errno()
    }
}
