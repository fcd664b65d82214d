//! Round trips through the daemon's Unix socket.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;

use myfifo::config::{DeviceConfig, ServerConfig};
use myfifo::device::{DeviceRegistry, FifoModule, LocalRegistry};
use myfifo::signal::Interrupter;
use myfifo::transport::{self, FifoClient, FifoServer, TransportError, MAX_FRAME_LEN};
use myfifo_abi::{Errno, MYFIFO_RESET};

const TIMEOUT: Duration = Duration::from_secs(5);
const BLOCKED_GRACE: Duration = Duration::from_millis(100);

struct Daemon {
    _dir: TempDir,
    socket: PathBuf,
    module: Option<FifoModule>,
    shutdown: Interrupter,
    server: JoinHandle<transport::Result<()>>,
}

impl Daemon {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let registry: Arc<dyn DeviceRegistry> =
            Arc::new(LocalRegistry::with_dev_root(dir.path().join("dev")));
        let module = FifoModule::load(Arc::clone(&registry), &DeviceConfig::default())
            .await
            .unwrap();

        let config = ServerConfig {
            socket_path: dir.path().join("run").join("myfifo.sock"),
        };
        let server = FifoServer::bind(&config, registry, module.node())
            .await
            .unwrap();
        let socket = server.socket_path().to_path_buf();

        let shutdown = Interrupter::new();
        let server = tokio::spawn(server.run(shutdown.token()));

        Self {
            _dir: dir,
            socket,
            module: Some(module),
            shutdown,
            server,
        }
    }

    async fn client(&self) -> FifoClient {
        FifoClient::connect_with_retry(&self.socket, 10).await.unwrap()
    }

    async fn stop(mut self) {
        self.shutdown.interrupt();
        tokio::time::timeout(TIMEOUT, &mut self.server)
            .await
            .expect("server did not shut down")
            .unwrap()
            .unwrap();
        if let Some(module) = self.module.take() {
            module.unload().await;
        }
    }
}

#[tokio::test]
async fn test_write_then_read_across_connections() {
    let daemon = Daemon::start().await;
    let mut writer = daemon.client().await;
    let mut reader = daemon.client().await;

    assert_eq!(writer.write(b"hello").await.unwrap(), 5);
    assert_eq!(reader.read(64).await.unwrap(), b"hello");

    daemon.stop().await;
}

#[tokio::test]
async fn test_each_connection_has_its_own_cursor() {
    let daemon = Daemon::start().await;
    let mut writer = daemon.client().await;
    let mut a = daemon.client().await;
    let mut b = daemon.client().await;

    writer.write(b"0123456789").await.unwrap();
    assert_eq!(a.read(4).await.unwrap(), b"0123");
    assert_eq!(a.read(4).await.unwrap(), b"4567");
    assert_eq!(b.read(16).await.unwrap(), b"0123456789");
    assert_eq!(a.read(16).await.unwrap(), b"89");

    daemon.stop().await;
}

#[tokio::test]
async fn test_oversized_write_is_truncated() {
    let daemon = Daemon::start().await;
    let mut client = daemon.client().await;

    let data = vec![b'z'; 2000];
    assert_eq!(client.write(&data).await.unwrap(), 1024);

    let mut reader = daemon.client().await;
    assert_eq!(reader.read(4096).await.unwrap().len(), 1024);

    daemon.stop().await;
}

#[tokio::test]
async fn test_write_larger_than_a_frame_is_truncated() {
    let daemon = Daemon::start().await;
    let mut client = daemon.client().await;

    let data = vec![b'a'; 2 * MAX_FRAME_LEN];
    assert_eq!(client.write(&data).await.unwrap(), 1024);
    // The connection is still usable afterwards.
    assert_eq!(client.write(b"ok").await.unwrap(), 2);

    let mut reader = daemon.client().await;
    assert_eq!(reader.read(4096).await.unwrap(), b"ok");

    daemon.stop().await;
}

#[tokio::test]
async fn test_read_blocks_until_write() {
    let daemon = Daemon::start().await;
    let mut reader = daemon.client().await;
    let mut writer = daemon.client().await;

    let pending = tokio::spawn(async move { reader.read(64).await });
    tokio::time::sleep(BLOCKED_GRACE).await;
    assert!(!pending.is_finished());

    writer.write(b"late").await.unwrap();
    let data = tokio::time::timeout(TIMEOUT, pending)
        .await
        .expect("reader was not woken")
        .unwrap()
        .unwrap();
    assert_eq!(data, b"late");

    daemon.stop().await;
}

#[tokio::test]
async fn test_reset_over_socket() {
    let daemon = Daemon::start().await;
    let mut client = daemon.client().await;
    let mut reader = daemon.client().await;

    client.write(b"abc").await.unwrap();
    assert_eq!(reader.read(16).await.unwrap(), b"abc");
    client.reset().await.unwrap();

    // A new file sees an empty device.
    let mut fresh = daemon.client().await;
    let blocked = tokio::time::timeout(BLOCKED_GRACE, fresh.read(16)).await;
    assert!(blocked.is_err(), "read should block after reset");

    daemon.stop().await;
}

#[tokio::test]
async fn test_unknown_ioctl_is_enotty() {
    let daemon = Daemon::start().await;
    let mut client = daemon.client().await;

    client.write(b"keep").await.unwrap();
    let err = client.ioctl(MYFIFO_RESET + 1, 0).await.unwrap_err();
    assert!(matches!(err, TransportError::Errno(Errno::ENOTTY)), "got {err:?}");

    let mut reader = daemon.client().await;
    assert_eq!(reader.read(16).await.unwrap(), b"keep");

    daemon.stop().await;
}

#[tokio::test]
async fn test_shutdown_interrupts_blocked_read() {
    let daemon = Daemon::start().await;
    let mut reader = daemon.client().await;

    let pending = tokio::spawn(async move { reader.read(16).await });
    tokio::time::sleep(BLOCKED_GRACE).await;

    let socket = daemon.socket.clone();
    daemon.stop().await;

    let err = tokio::time::timeout(TIMEOUT, pending)
        .await
        .expect("read was not interrupted")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, TransportError::Errno(Errno::EINTR)), "got {err:?}");
    assert!(!socket.exists(), "socket should be removed on shutdown");
}

#[tokio::test]
async fn test_hangup_during_read_leaves_server_serving() {
    let daemon = Daemon::start().await;
    let mut reader = daemon.client().await;

    let pending = tokio::spawn(async move { reader.read(16).await });
    tokio::time::sleep(BLOCKED_GRACE).await;
    pending.abort();
    let _ = pending.await;

    let mut writer = daemon.client().await;
    let mut other = daemon.client().await;
    writer.write(b"still here").await.unwrap();
    assert_eq!(other.read(64).await.unwrap(), b"still here");

    daemon.stop().await;
}

#[tokio::test]
async fn test_zero_length_read_returns_empty() {
    let daemon = Daemon::start().await;
    let mut client = daemon.client().await;

    client.write(b"data").await.unwrap();
    assert!(client.read(0).await.unwrap().is_empty());
    assert_eq!(client.read(16).await.unwrap(), b"data");

    daemon.stop().await;
}

#[tokio::test]
async fn test_open_fails_after_unload() {
    let mut daemon = Daemon::start().await;
    if let Some(module) = daemon.module.take() {
        module.unload().await;
    }

    let mut client = daemon.client().await;
    assert!(client.write(b"nobody home").await.is_err());

    daemon.stop().await;
}

#[tokio::test]
async fn test_close_releases_connection() {
    let daemon = Daemon::start().await;
    let mut client = daemon.client().await;
    client.write(b"bye").await.unwrap();
    client.close().await.unwrap();

    let mut reader = daemon.client().await;
    assert_eq!(reader.read(16).await.unwrap(), b"bye");

    daemon.stop().await;
}
