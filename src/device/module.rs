//! Module lifecycle: bring the FIFO device up and tear it down.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use myfifo_abi::{DevNum, Errno, KernelResult};
use tracing::{error, info};

use super::registry::{ClassHandle, DeviceRegistry, RegistrationStage};
use super::{FifoDevice, FileOperations};
use crate::channel::SlotChannel;
use crate::config::DeviceConfig;

/// Number of minors the FIFO reserves.
const MINOR_COUNT: u32 = 1;

/// Failure while loading the module.
///
/// Stages completed before the failure have already been undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{stage} failed: {errno}")]
pub struct RegistrationError {
    pub stage: RegistrationStage,
    pub errno: Errno,
}

impl RegistrationError {
    fn new(stage: RegistrationStage, errno: Errno) -> Self {
        Self { stage, errno }
    }
}

/// A loaded FIFO device.
///
/// Owns the channel for as long as the device is registered. Call
/// [`unload`](Self::unload) to remove it from the host.
pub struct FifoModule {
    registry: Arc<dyn DeviceRegistry>,
    dev: DevNum,
    class: ClassHandle,
    node: PathBuf,
    channel: Arc<SlotChannel>,
}

impl FifoModule {
    /// Register the device with `registry`.
    ///
    /// Steps run in order (region, cdev, class, node); if one fails, the
    /// completed ones are rolled back in reverse before returning.
    pub async fn load(
        registry: Arc<dyn DeviceRegistry>,
        config: &DeviceConfig,
    ) -> Result<Self, RegistrationError> {
        let channel = Arc::new(SlotChannel::with_capacity(config.capacity));
        let device = Arc::new(FifoDevice::new(config.name.clone(), Arc::clone(&channel)));

        let dev = registry
            .alloc_chrdev_region(&config.name, MINOR_COUNT)
            .await
            .map_err(|errno| Self::failed(RegistrationStage::Region, errno))?;
        info!(name = %config.name, major = dev.major(), "Registered with major");

        if let Err(errno) = registry.cdev_add(dev, device).await {
            registry.unregister_chrdev_region(dev, MINOR_COUNT).await;
            return Err(Self::failed(RegistrationStage::Cdev, errno));
        }

        let class = match registry.class_create(&config.class).await {
            Ok(class) => class,
            Err(errno) => {
                registry.cdev_del(dev).await;
                registry.unregister_chrdev_region(dev, MINOR_COUNT).await;
                return Err(Self::failed(RegistrationStage::Class, errno));
            }
        };

        let node = match registry.device_create(&class, dev, &config.name).await {
            Ok(node) => node,
            Err(errno) => {
                registry.class_destroy(&class).await;
                registry.cdev_del(dev).await;
                registry.unregister_chrdev_region(dev, MINOR_COUNT).await;
                return Err(Self::failed(RegistrationStage::Device, errno));
            }
        };

        info!(
            node = %node.display(),
            %dev,
            capacity = config.capacity,
            "Driver loaded successfully"
        );

        Ok(Self {
            registry,
            dev,
            class,
            node,
            channel,
        })
    }

    fn failed(stage: RegistrationStage, errno: Errno) -> RegistrationError {
        error!(%stage, %errno, "Driver load failed, registration rolled back");
        RegistrationError::new(stage, errno)
    }

    pub fn dev(&self) -> DevNum {
        self.dev
    }

    /// Path of the device node.
    pub fn node(&self) -> &Path {
        &self.node
    }

    pub fn channel(&self) -> &Arc<SlotChannel> {
        &self.channel
    }

    /// Open the device through its node.
    pub async fn open(&self) -> KernelResult<Box<dyn FileOperations>> {
        self.registry.open(&self.node).await
    }

    /// Remove the device from the host, in reverse registration order.
    ///
    /// Files that are still open keep working against the channel; they
    /// just can no longer be reached through the node.
    pub async fn unload(self) {
        self.registry.device_destroy(&self.class, self.dev).await;
        self.registry.class_destroy(&self.class).await;
        self.registry.cdev_del(self.dev).await;
        self.registry
            .unregister_chrdev_region(self.dev, MINOR_COUNT)
            .await;
        info!(node = %self.node.display(), "Driver unloaded");
    }
}
