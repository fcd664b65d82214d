//! Client side of the device socket.

use std::path::Path;

use bytes::Bytes;
use myfifo_abi::MYFIFO_RESET;
use tokio::net::UnixStream;
use tracing::debug;

use super::codec::{read_frame, write_frame, Request, Response, MAX_WRITE_LEN};
use super::{Result, TransportError};
use crate::utils::bootstrap::connect_with_retry;

/// An open file on the device, reached through the daemon's socket.
///
/// Dropping the client closes the file.
pub struct FifoClient {
    stream: UnixStream,
}

impl FifoClient {
    /// Open the device served at `socket_path`.
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self> {
        let socket_path = socket_path.as_ref();
        let stream = UnixStream::connect(socket_path).await?;
        debug!(socket = %socket_path.display(), "Connected to device");
        Ok(Self { stream })
    }

    /// Open the device, retrying while the daemon is still starting up.
    pub async fn connect_with_retry(
        socket_path: impl AsRef<Path>,
        max_attempts: u32,
    ) -> Result<Self> {
        let socket_path = socket_path.as_ref();
        let target = socket_path.display().to_string();
        connect_with_retry(&target, max_attempts, || Self::connect(socket_path)).await
    }

    /// Read at most `max_len` bytes, blocking until a message is available.
    pub async fn read(&mut self, max_len: u32) -> Result<Vec<u8>> {
        let (_, data) = self.call(Request::Read { max_len }).await?;
        Ok(data.to_vec())
    }

    /// Replace the stored message. Returns the number of bytes kept.
    ///
    /// Like the device, never rejects oversized data: anything past
    /// [`MAX_WRITE_LEN`] is dropped here, the rest past the device capacity
    /// by the device.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let data = &data[..data.len().min(MAX_WRITE_LEN)];
        let (status, _) = self
            .call(Request::Write {
                data: Bytes::copy_from_slice(data),
            })
            .await?;
        Ok(status as usize)
    }

    pub async fn ioctl(&mut self, cmd: u32, arg: u64) -> Result<i64> {
        let (status, _) = self.call(Request::Ioctl { cmd, arg }).await?;
        Ok(status)
    }

    /// Clear the stored message.
    pub async fn reset(&mut self) -> Result<()> {
        self.ioctl(MYFIFO_RESET, 0).await.map(|_| ())
    }

    /// Close the file by shutting down the write side of the socket.
    pub async fn close(mut self) -> Result<()> {
        use tokio::io::AsyncWriteExt;
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn call(&mut self, request: Request) -> Result<(i64, Bytes)> {
        write_frame(&mut self.stream, &request.encode()).await?;
        let body = read_frame(&mut self.stream)
            .await?
            .ok_or(TransportError::ConnectionClosed)?;
        Response::decode(body)?.into_result()
    }
}
