//! Process-level helpers shared by the daemon and its clients.

pub mod bootstrap;
