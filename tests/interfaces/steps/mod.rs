//! Cucumber step definitions for interface tests.

pub mod fifo_device;
