//! Socket server exposing the device node.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::codec::{read_frame, write_frame, Request, Response, MAX_READ_LEN};
use super::{Result, TransportError};
use crate::config::ServerConfig;
use crate::device::{DeviceRegistry, FileOperations};
use crate::error::FifoError;
use crate::signal::{InterruptToken, Interrupter};
use crate::uaccess::ReadBuffer;

/// Serves one device node on a Unix socket.
pub struct FifoServer {
    listener: UnixListener,
    socket_path: PathBuf,
    registry: Arc<dyn DeviceRegistry>,
    node: PathBuf,
}

impl FifoServer {
    /// Bind the socket from `config`, serving opens of `node`.
    ///
    /// Creates the socket's parent directory and replaces a stale socket
    /// left behind by a previous run.
    pub async fn bind(
        config: &ServerConfig,
        registry: Arc<dyn DeviceRegistry>,
        node: impl Into<PathBuf>,
    ) -> Result<Self> {
        let socket_path = config.socket_path.clone();
        if let Some(parent) = socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::fs::remove_file(&socket_path).await {
            Ok(()) => debug!(path = %socket_path.display(), "Removed stale socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let listener = UnixListener::bind(&socket_path)?;
        let node = node.into();
        info!(
            socket = %socket_path.display(),
            node = %node.display(),
            "Device server listening"
        );

        Ok(Self {
            listener,
            socket_path,
            registry,
            node,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until `shutdown` fires.
    ///
    /// On shutdown, blocked reads are interrupted, every connection is
    /// closed and the socket file is removed before returning.
    pub async fn run(self, shutdown: InterruptToken) -> Result<()> {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let registry = Arc::clone(&self.registry);
                            let node = self.node.clone();
                            let shutdown = shutdown.clone();
                            connections.spawn(async move {
                                if let Err(e) = handle_connection(stream, registry, node, shutdown).await {
                                    warn!(error = %e, "Connection ended with error");
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "Accept failed"),
                    }
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Connection task failed");
                    }
                }
                _ = shutdown.interrupted() => break,
            }
        }

        info!(open = connections.len(), "Device server shutting down");
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Connection task failed");
            }
        }

        if let Err(e) = tokio::fs::remove_file(&self.socket_path).await {
            warn!(path = %self.socket_path.display(), error = %e, "Failed to remove socket");
        }
        Ok(())
    }
}

/// One connection is one open file: open on accept, release on hangup.
async fn handle_connection(
    stream: UnixStream,
    registry: Arc<dyn DeviceRegistry>,
    node: PathBuf,
    shutdown: InterruptToken,
) -> Result<()> {
    let mut file = registry
        .open(&node)
        .await
        .map_err(TransportError::Errno)?;
    let id = file.id();
    debug!(file = %id, "Connection opened file");

    let (mut rd, mut wr) = stream.into_split();
    let result = serve_file(file.as_mut(), &mut rd, &mut wr, &shutdown).await;

    file.release();
    debug!(file = %id, "Connection closed file");
    result
}

async fn serve_file(
    file: &mut dyn FileOperations,
    rd: &mut OwnedReadHalf,
    wr: &mut OwnedWriteHalf,
    shutdown: &InterruptToken,
) -> Result<()> {
    loop {
        let body = tokio::select! {
            frame = read_frame(rd) => match frame? {
                Some(body) => body,
                None => return Ok(()),
            },
            _ = shutdown.interrupted() => return Ok(()),
        };

        let (response, hung_up) = match Request::decode(body)? {
            Request::Read { max_len } => {
                let max_len = (max_len as usize).min(MAX_READ_LEN);
                serve_read(file, rd, max_len, shutdown).await
            }
            Request::Write { data } => {
                let mut src: &[u8] = &data;
                (respond(file.write(&mut src).await.map(|n| n as i64)), false)
            }
            Request::Ioctl { cmd, arg } => (respond(file.ioctl(cmd, arg).await), false),
        };

        if hung_up {
            return Ok(());
        }
        write_frame(wr, &response.encode()).await?;
    }
}

/// Run a blocking read, interrupting it if the peer hangs up or the server
/// shuts down. Returns whether the peer is gone.
async fn serve_read(
    file: &mut dyn FileOperations,
    rd: &mut OwnedReadHalf,
    max_len: usize,
    shutdown: &InterruptToken,
) -> (Response, bool) {
    let interrupter = Interrupter::new();
    let token = interrupter.token();
    let mut dst = ReadBuffer::with_max_len(max_len);
    let mut hung_up = false;

    let result = {
        let read = file.read(&mut dst, &token);
        tokio::pin!(read);
        let mut probe = [0u8; 1];

        loop {
            tokio::select! {
                result = &mut read => break result,
                _ = shutdown.interrupted(), if !interrupter.is_interrupted() => {
                    interrupter.interrupt();
                }
                // The protocol is strictly request/response, so anything the
                // peer does while a read is pending (EOF or early bytes) ends
                // the connection.
                _ = rd.read(&mut probe), if !hung_up => {
                    hung_up = true;
                    interrupter.interrupt();
                }
            }
        }
    };

    let response = match result {
        Ok(_) => Response::with_data(Bytes::from(dst.into_vec())),
        Err(e) => error_response(e),
    };
    (response, hung_up)
}

fn respond(result: std::result::Result<i64, FifoError>) -> Response {
    match result {
        Ok(value) => Response::ok(value),
        Err(e) => error_response(e),
    }
}

/// Errors cross to userspace with their user-visible errno.
fn error_response(err: FifoError) -> Response {
    Response::errno(err.errno().to_user())
}
