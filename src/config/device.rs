//! Character device configuration.

use serde::Deserialize;

use super::ConfigError;
use crate::channel::DEFAULT_CAPACITY;
use crate::transport::MAX_READ_LEN;

/// Default device node name.
pub const DEFAULT_DEVICE_NAME: &str = "myfifo";
/// Default device class name.
pub const DEFAULT_CLASS_NAME: &str = "myfifo_class";

/// Settings for the FIFO character device.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device name; also the node name under the dev root.
    pub name: String,
    /// Device class the node is created in.
    pub class: String,
    /// Buffer capacity in bytes. Longer writes are truncated.
    pub capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            class: DEFAULT_CLASS_NAME.to_string(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("device.capacity must be > 0".into()));
        }
        // A whole message must fit in one socket read.
        if self.capacity > MAX_READ_LEN {
            return Err(ConfigError::Invalid(format!(
                "device.capacity {} exceeds {}",
                self.capacity, MAX_READ_LEN
            )));
        }
        if self.name.is_empty() || self.name.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "device.name '{}' is not a valid node name",
                self.name
            )));
        }
        if self.class.is_empty() {
            return Err(ConfigError::Invalid("device.class must not be empty".into()));
        }
        Ok(())
    }
}
