//! Userspace socket configuration.

use std::path::PathBuf;

use serde::Deserialize;

use super::ConfigError;

/// Default socket the daemon listens on.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/myfifo/myfifo.sock";

/// Settings for the Unix socket that exposes the device.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Path of the listening socket. Parent directories are created.
    pub socket_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("server.socket_path must be set".into()));
        }
        Ok(())
    }
}
