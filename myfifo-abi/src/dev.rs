//! Device numbers (`dev_t`, kernel-internal encoding)

/// Bits reserved for the minor number.
pub const MINORBITS: u32 = 20;
/// Mask selecting the minor number.
pub const MINORMASK: u32 = (1 << MINORBITS) - 1;

/// Kernel `dev_t`: major in the upper 12 bits, minor in the lower 20.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevNum(pub u32);

impl DevNum {
    /// `MKDEV(major, minor)`
    pub const fn new(major: u32, minor: u32) -> Self {
        DevNum((major << MINORBITS) | (minor & MINORMASK))
    }

    /// `MAJOR(dev)`
    pub const fn major(self) -> u32 {
        self.0 >> MINORBITS
    }

    /// `MINOR(dev)`
    pub const fn minor(self) -> u32 {
        self.0 & MINORMASK
    }

    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for DevNum {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}
