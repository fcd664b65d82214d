//! FIFO device interface step definitions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when, World};
use tokio::task::JoinHandle;

use myfifo::device::{FifoDevice, FifoFile, FileOperations};
use myfifo::error::FifoError;
use myfifo::signal::Interrupter;
use myfifo::uaccess::ReadBuffer;
use myfifo::SlotChannel;

/// How long a read must stay pending to count as blocked.
const BLOCKED_GRACE: Duration = Duration::from_millis(50);
/// Upper bound for a woken read to complete.
const WAKE_TIMEOUT: Duration = Duration::from_secs(2);

type ReadOutcome = Result<Vec<u8>, FifoError>;

/// A read running in the background.
struct PendingRead {
    interrupter: Interrupter,
    handle: JoinHandle<(FifoFile, ReadOutcome)>,
}

/// Test context for FIFO device scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct FifoDeviceWorld {
    device: FifoDevice,
    files: HashMap<String, FifoFile>,
    pending: HashMap<String, PendingRead>,
    reads: HashMap<String, ReadOutcome>,
    last_write: Option<usize>,
    last_ioctl: Option<Result<i64, FifoError>>,
}

impl fmt::Debug for FifoDeviceWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoDeviceWorld")
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .field("reads", &self.reads)
            .field("last_write", &self.last_write)
            .field("last_ioctl", &self.last_ioctl)
            .finish()
    }
}

impl FifoDeviceWorld {
    fn new() -> Self {
        Self {
            device: device_with_capacity(myfifo::DEFAULT_CAPACITY),
            files: HashMap::new(),
            pending: HashMap::new(),
            reads: HashMap::new(),
            last_write: None,
            last_ioctl: None,
        }
    }

    fn file(&mut self, name: &str) -> &mut FifoFile {
        self.files
            .get_mut(name)
            .unwrap_or_else(|| panic!("{name} has not opened the device"))
    }

    fn read_result(&self, name: &str) -> &ReadOutcome {
        self.reads
            .get(name)
            .unwrap_or_else(|| panic!("{name} has not read"))
    }

    /// Wait for a background read and put its file back.
    async fn finish_read(&mut self, name: &str) {
        let pending = self
            .pending
            .remove(name)
            .unwrap_or_else(|| panic!("{name} has no read in progress"));
        let (file, outcome) = tokio::time::timeout(WAKE_TIMEOUT, pending.handle)
            .await
            .expect("read did not complete")
            .expect("read task panicked");
        self.files.insert(name.to_string(), file);
        self.reads.insert(name.to_string(), outcome);
    }
}

fn device_with_capacity(capacity: usize) -> FifoDevice {
    FifoDevice::new("myfifo", Arc::new(SlotChannel::with_capacity(capacity)))
}

fn errno_name(err: &FifoError) -> &'static str {
    err.errno().to_user().name()
}

// --- Given steps ---

#[given(expr = "a FIFO device with capacity {int}")]
async fn given_device_with_capacity(world: &mut FifoDeviceWorld, capacity: usize) {
    world.device = device_with_capacity(capacity);
}

#[given(expr = "{string} has opened the device")]
async fn given_opened(world: &mut FifoDeviceWorld, name: String) {
    let file = world.device.open_file();
    world.files.insert(name, file);
}

// --- When steps ---

#[when(expr = "{string} writes {string}")]
async fn when_writes(world: &mut FifoDeviceWorld, name: String, data: String) {
    let mut src: &[u8] = data.as_bytes();
    let written = world.file(&name).write(&mut src).await.expect("write failed");
    world.last_write = Some(written);
}

#[when(expr = "{string} writes {int} bytes of {string}")]
async fn when_writes_repeated(
    world: &mut FifoDeviceWorld,
    name: String,
    len: usize,
    fill: String,
) {
    let byte = *fill.as_bytes().first().expect("fill must not be empty");
    let mut src = vec![byte; len];
    let written = world.file(&name).write(&mut src).await.expect("write failed");
    world.last_write = Some(written);
}

#[when(expr = "{string} reads up to {int} bytes")]
async fn when_reads(world: &mut FifoDeviceWorld, name: String, max_len: usize) {
    let interrupter = Interrupter::new();
    let mut dst = ReadBuffer::with_max_len(max_len);
    let result = tokio::time::timeout(
        WAKE_TIMEOUT,
        world.file(&name).read(&mut dst, &interrupter.token()),
    )
    .await
    .expect("read blocked unexpectedly");
    world.reads.insert(name, result.map(|_| dst.into_vec()));
}

#[when(expr = "{string} starts reading up to {int} bytes")]
async fn when_starts_reading(world: &mut FifoDeviceWorld, name: String, max_len: usize) {
    let mut file = world
        .files
        .remove(&name)
        .unwrap_or_else(|| panic!("{name} has not opened the device"));
    let interrupter = Interrupter::new();
    let token = interrupter.token();

    let handle = tokio::spawn(async move {
        let mut dst = ReadBuffer::with_max_len(max_len);
        let result = file.read(&mut dst, &token).await;
        (file, result.map(|_| dst.into_vec()))
    });

    world.pending.insert(name, PendingRead { interrupter, handle });
}

#[when(expr = "{string} is interrupted")]
async fn when_interrupted(world: &mut FifoDeviceWorld, name: String) {
    world
        .pending
        .get(&name)
        .unwrap_or_else(|| panic!("{name} has no read in progress"))
        .interrupter
        .interrupt();
    world.finish_read(&name).await;
}

#[when(expr = "{string} resets the device")]
async fn when_resets(world: &mut FifoDeviceWorld, name: String) {
    let result = world.file(&name).ioctl(myfifo_abi::MYFIFO_RESET, 0).await;
    world.last_ioctl = Some(result);
}

#[when(expr = "{string} issues ioctl {int}")]
async fn when_issues_ioctl(world: &mut FifoDeviceWorld, name: String, cmd: u32) {
    let result = world.file(&name).ioctl(cmd, 0).await;
    world.last_ioctl = Some(result);
}

#[when(expr = "{string} closes the device")]
async fn when_closes(world: &mut FifoDeviceWorld, name: String) {
    let file = world
        .files
        .remove(&name)
        .unwrap_or_else(|| panic!("{name} has not opened the device"));
    Box::new(file).release();
}

// --- Then steps ---

#[then(expr = "the write returns {int}")]
async fn then_write_returns(world: &mut FifoDeviceWorld, expected: usize) {
    assert_eq!(world.last_write, Some(expected));
}

#[then(expr = "{string} receives {string}")]
async fn then_receives(world: &mut FifoDeviceWorld, name: String, expected: String) {
    let data = world.read_result(&name).as_ref().expect("read failed");
    assert_eq!(String::from_utf8_lossy(data), expected);
}

#[then(expr = "{string} receives {int} bytes")]
async fn then_receives_len(world: &mut FifoDeviceWorld, name: String, expected: usize) {
    let data = world.read_result(&name).as_ref().expect("read failed");
    assert_eq!(data.len(), expected);
}

#[then(expr = "{string} is still blocked")]
async fn then_still_blocked(world: &mut FifoDeviceWorld, name: String) {
    tokio::time::sleep(BLOCKED_GRACE).await;
    let pending = world
        .pending
        .get(&name)
        .unwrap_or_else(|| panic!("{name} has no read in progress"));
    assert!(!pending.handle.is_finished(), "{name} returned early");
}

#[then(expr = "{string} wakes with {string}")]
async fn then_wakes_with(world: &mut FifoDeviceWorld, name: String, expected: String) {
    world.finish_read(&name).await;
    let data = world.read_result(&name).as_ref().expect("read failed");
    assert_eq!(String::from_utf8_lossy(data), expected);
}

#[then(expr = "the read of {string} fails with {string}")]
async fn then_read_fails(world: &mut FifoDeviceWorld, name: String, errno: String) {
    let err = world
        .read_result(&name)
        .as_ref()
        .expect_err("read should have failed");
    assert_eq!(errno_name(err), errno);
}

#[then("the ioctl succeeds")]
async fn then_ioctl_succeeds(world: &mut FifoDeviceWorld) {
    assert_eq!(world.last_ioctl, Some(Ok(0)));
}

#[then(expr = "the ioctl fails with {string}")]
async fn then_ioctl_fails(world: &mut FifoDeviceWorld, errno: String) {
    let err = world
        .last_ioctl
        .as_ref()
        .expect("no ioctl issued")
        .as_ref()
        .expect_err("ioctl should have failed");
    assert_eq!(errno_name(err), errno);
}

#[then(expr = "the offset of {string} is {int}")]
async fn then_offset(world: &mut FifoDeviceWorld, name: String, expected: usize) {
    assert_eq!(world.file(&name).offset(), expected);
}

#[then(expr = "the device holds {int} bytes")]
async fn then_device_holds(world: &mut FifoDeviceWorld, expected: usize) {
    assert_eq!(world.device.channel().len().await, expected);
}
