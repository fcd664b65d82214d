//! Error codes matching Linux kernel errno values
//!
//! Kernel entry points return `0`/a count on success and a negative errno on
//! failure. `Errno` is the typed side of that convention.

use libc::c_int;

/// Errno values produced by the device and its registration path.
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Errno {
    EPERM = 1,
    ENOENT = 2,
    EINTR = 4,
    EIO = 5,
    ENXIO = 6,
    EAGAIN = 11,
    ENOMEM = 12,
    EFAULT = 14,
    EBUSY = 16,
    EEXIST = 17,
    ENODEV = 19,
    EINVAL = 22,
    ENOTTY = 25,
    ENOSPC = 28,
    /// Kernel-internal: the syscall should be restarted after the signal
    /// handler runs. Never visible to userspace.
    ERESTARTSYS = 512,
}

impl Errno {
    /// Negative errno as returned from a file operation.
    pub fn to_errno(self) -> c_int {
        -(self as c_int)
    }

    /// The errno userspace observes for this error.
    ///
    /// `ERESTARTSYS` surfaces as `EINTR` when the interrupted call is not
    /// restarted (SA_RESTART unset).
    pub fn to_user(self) -> Errno {
        match self {
            Errno::ERESTARTSYS => Errno::EINTR,
            other => other,
        }
    }

    /// Look up a positive errno value.
    pub fn from_raw(value: c_int) -> Option<Errno> {
        let errno = match value {
            1 => Errno::EPERM,
            2 => Errno::ENOENT,
            4 => Errno::EINTR,
            5 => Errno::EIO,
            6 => Errno::ENXIO,
            11 => Errno::EAGAIN,
            12 => Errno::ENOMEM,
            14 => Errno::EFAULT,
            16 => Errno::EBUSY,
            17 => Errno::EEXIST,
            19 => Errno::ENODEV,
            22 => Errno::EINVAL,
            25 => Errno::ENOTTY,
            28 => Errno::ENOSPC,
            512 => Errno::ERESTARTSYS,
            _ => return None,
        };
        Some(errno)
    }

    /// Symbolic name, as printed by `strerrorname_np`.
    pub fn name(self) -> &'static str {
        match self {
            Errno::EPERM => "EPERM",
            Errno::ENOENT => "ENOENT",
            Errno::EINTR => "EINTR",
            Errno::EIO => "EIO",
            Errno::ENXIO => "ENXIO",
            Errno::EAGAIN => "EAGAIN",
            Errno::ENOMEM => "ENOMEM",
            Errno::EFAULT => "EFAULT",
            Errno::EBUSY => "EBUSY",
            Errno::EEXIST => "EEXIST",
            Errno::ENODEV => "ENODEV",
            Errno::EINVAL => "EINVAL",
            Errno::ENOTTY => "ENOTTY",
            Errno::ENOSPC => "ENOSPC",
            Errno::ERESTARTSYS => "ERESTARTSYS",
        }
    }
}

impl core::fmt::Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.name(), *self as c_int)
    }
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, Errno>;
