//! Kernel ABI numbers for the myfifo character device
//!
//! This crate holds the values that cross the user/kernel boundary:
//! errno codes, ioctl command encoding and device numbers. They must match
//! the Linux kernel bit for bit, so nothing here depends on the device
//! implementation.

#![cfg_attr(not(test), no_std)]
#![allow(non_camel_case_types)]

pub mod dev;
pub mod errno;
pub mod ioctl;

pub use dev::{DevNum, MINORBITS, MINORMASK};
pub use errno::{Errno, KernelResult};
pub use ioctl::{io, ioc, ioc_dir, ioc_nr, ioc_size, ioc_type, MYFIFO_IOC_MAGIC, MYFIFO_RESET};
