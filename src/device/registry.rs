//! Host registration boundary.
//!
//! A kernel module announces a character device in four steps: reserve a
//! device-number region, attach the cdev, create a device class, create the
//! device node. [`DeviceRegistry`] is that boundary; [`LocalRegistry`] is an
//! in-process host used by the daemon and by tests.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use myfifo_abi::{DevNum, Errno, KernelResult};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{CharDevice, FileOperations};

/// Highest dynamically allocated character major (`CHRDEV_MAJOR_DYN_END`
/// is the lowest; Linux hands out majors from the top down).
pub const DYNAMIC_MAJOR_START: u32 = 254;
/// Lowest dynamically allocated character major.
pub const DYNAMIC_MAJOR_END: u32 = 234;

/// Default directory device nodes appear in.
pub const DEFAULT_DEV_ROOT: &str = "/dev";

/// Registration steps, in the order a module performs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationStage {
    /// `alloc_chrdev_region`
    Region,
    /// `cdev_add`
    Cdev,
    /// `class_create`
    Class,
    /// `device_create`
    Device,
}

impl fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistrationStage::Region => "alloc_chrdev_region",
            RegistrationStage::Cdev => "cdev_add",
            RegistrationStage::Class => "class_create",
            RegistrationStage::Device => "device_create",
        };
        f.write_str(name)
    }
}

/// A created device class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassHandle(String);

impl ClassHandle {
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Interface to the host's device tables.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Reserve `count` minors under a dynamically chosen major.
    async fn alloc_chrdev_region(&self, name: &str, count: u32) -> KernelResult<DevNum>;

    /// Release a region reserved by [`alloc_chrdev_region`](Self::alloc_chrdev_region).
    async fn unregister_chrdev_region(&self, base: DevNum, count: u32);

    /// Attach a device to a reserved number.
    async fn cdev_add(&self, dev: DevNum, device: Arc<dyn CharDevice>) -> KernelResult<()>;

    async fn cdev_del(&self, dev: DevNum);

    async fn class_create(&self, name: &str) -> KernelResult<ClassHandle>;

    async fn class_destroy(&self, class: &ClassHandle);

    /// Create the device node; returns its path.
    async fn device_create(
        &self,
        class: &ClassHandle,
        dev: DevNum,
        name: &str,
    ) -> KernelResult<PathBuf>;

    async fn device_destroy(&self, class: &ClassHandle, dev: DevNum);

    /// Open a device node.
    async fn open(&self, path: &Path) -> KernelResult<Box<dyn FileOperations>>;
}

#[derive(Debug, Clone)]
struct DeviceNode {
    class: String,
    dev: DevNum,
}

#[derive(Default)]
struct RegistryState {
    /// Reserved regions by major.
    regions: HashMap<u32, String>,
    cdevs: HashMap<DevNum, Arc<dyn CharDevice>>,
    classes: HashSet<String>,
    nodes: HashMap<PathBuf, DeviceNode>,
}

/// In-process device tables.
///
/// Supports fault injection per stage so callers can exercise their
/// unwind paths.
pub struct LocalRegistry {
    dev_root: PathBuf,
    state: RwLock<RegistryState>,
    faults: RwLock<HashMap<RegistrationStage, Errno>>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::with_dev_root(DEFAULT_DEV_ROOT)
    }

    /// Registry whose nodes appear under `dev_root`.
    pub fn with_dev_root(dev_root: impl Into<PathBuf>) -> Self {
        Self {
            dev_root: dev_root.into(),
            state: RwLock::new(RegistryState::default()),
            faults: RwLock::new(HashMap::new()),
        }
    }

    pub fn dev_root(&self) -> &Path {
        &self.dev_root
    }

    /// Make the next calls of `stage` fail with `errno`.
    pub async fn fail_at(&self, stage: RegistrationStage, errno: Errno) {
        self.faults.write().await.insert(stage, errno);
    }

    /// Remove all injected faults.
    pub async fn clear_faults(&self) {
        self.faults.write().await.clear();
    }

    async fn injected(&self, stage: RegistrationStage) -> KernelResult<()> {
        match self.faults.read().await.get(&stage) {
            Some(errno) => {
                warn!(%stage, %errno, "Injected registration failure");
                Err(*errno)
            }
            None => Ok(()),
        }
    }

    /// Whether a region is reserved under `major`.
    pub async fn has_region(&self, major: u32) -> bool {
        self.state.read().await.regions.contains_key(&major)
    }

    pub async fn has_cdev(&self, dev: DevNum) -> bool {
        self.state.read().await.cdevs.contains_key(&dev)
    }

    pub async fn has_class(&self, name: &str) -> bool {
        self.state.read().await.classes.contains(name)
    }

    pub async fn has_node(&self, path: &Path) -> bool {
        self.state.read().await.nodes.contains_key(path)
    }

    /// True when nothing is registered.
    pub async fn is_empty(&self) -> bool {
        let state = self.state.read().await;
        state.regions.is_empty()
            && state.cdevs.is_empty()
            && state.classes.is_empty()
            && state.nodes.is_empty()
    }
}

impl Default for LocalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceRegistry for LocalRegistry {
    async fn alloc_chrdev_region(&self, name: &str, count: u32) -> KernelResult<DevNum> {
        self.injected(RegistrationStage::Region).await?;
        if count == 0 {
            return Err(Errno::EINVAL);
        }

        let mut state = self.state.write().await;
        let major = (DYNAMIC_MAJOR_END..=DYNAMIC_MAJOR_START)
            .rev()
            .find(|major| !state.regions.contains_key(major))
            .ok_or(Errno::EBUSY)?;
        state.regions.insert(major, name.to_string());

        let dev = DevNum::new(major, 0);
        info!(name, major, count, "Registered chrdev region");
        Ok(dev)
    }

    async fn unregister_chrdev_region(&self, base: DevNum, count: u32) {
        let mut state = self.state.write().await;
        if let Some(name) = state.regions.remove(&base.major()) {
            debug!(name = %name, major = base.major(), count, "Unregistered chrdev region");
        }
    }

    async fn cdev_add(&self, dev: DevNum, device: Arc<dyn CharDevice>) -> KernelResult<()> {
        self.injected(RegistrationStage::Cdev).await?;

        let mut state = self.state.write().await;
        if !state.regions.contains_key(&dev.major()) {
            return Err(Errno::EINVAL);
        }
        if state.cdevs.contains_key(&dev) {
            return Err(Errno::EBUSY);
        }
        debug!(%dev, device = device.name(), "cdev added");
        state.cdevs.insert(dev, device);
        Ok(())
    }

    async fn cdev_del(&self, dev: DevNum) {
        self.state.write().await.cdevs.remove(&dev);
    }

    async fn class_create(&self, name: &str) -> KernelResult<ClassHandle> {
        self.injected(RegistrationStage::Class).await?;

        let mut state = self.state.write().await;
        if !state.classes.insert(name.to_string()) {
            return Err(Errno::EEXIST);
        }
        debug!(class = name, "Class created");
        Ok(ClassHandle(name.to_string()))
    }

    async fn class_destroy(&self, class: &ClassHandle) {
        let mut state = self.state.write().await;
        state.classes.remove(class.name());
        // Destroying a class takes its remaining device nodes with it.
        state.nodes.retain(|_, node| node.class != class.name());
    }

    async fn device_create(
        &self,
        class: &ClassHandle,
        dev: DevNum,
        name: &str,
    ) -> KernelResult<PathBuf> {
        self.injected(RegistrationStage::Device).await?;

        let path = self.dev_root.join(name);
        let mut state = self.state.write().await;
        if !state.classes.contains(class.name()) {
            return Err(Errno::ENODEV);
        }
        if state.nodes.contains_key(&path) {
            return Err(Errno::EEXIST);
        }
        state.nodes.insert(
            path.clone(),
            DeviceNode {
                class: class.name().to_string(),
                dev,
            },
        );
        debug!(path = %path.display(), %dev, "Device node created");
        Ok(path)
    }

    async fn device_destroy(&self, class: &ClassHandle, dev: DevNum) {
        self.state
            .write()
            .await
            .nodes
            .retain(|_, node| !(node.class == class.name() && node.dev == dev));
    }

    async fn open(&self, path: &Path) -> KernelResult<Box<dyn FileOperations>> {
        let device = {
            let state = self.state.read().await;
            let node = state.nodes.get(path).ok_or(Errno::ENOENT)?;
            // A node without a driver behind it opens with ENXIO.
            Arc::clone(state.cdevs.get(&node.dev).ok_or(Errno::ENXIO)?)
        };
        device.open().map_err(Errno::from)
    }
}
