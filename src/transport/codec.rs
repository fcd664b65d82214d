//! Wire format.
//!
//! Every message is a frame: a 4-byte big-endian length followed by that
//! many body bytes.
//!
//! Request bodies start with an op byte:
//!
//! | op | request | payload                       |
//! |----|---------|-------------------------------|
//! | 1  | read    | `max_len: u32`                |
//! | 2  | write   | data bytes                    |
//! | 3  | ioctl   | `cmd: u32`, `arg: u64`        |
//!
//! Response bodies are `status: i64` followed, for reads, by `status`
//! data bytes. A negative status is a negated errno.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use myfifo_abi::Errno;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Result, TransportError};

/// Largest frame body accepted in either direction.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

const OP_READ: u8 = 1;
const OP_WRITE: u8 = 2;
const OP_IOCTL: u8 = 3;

/// Size of the status field at the start of a response.
pub(crate) const RESPONSE_HEADER_LEN: usize = 8;

/// Largest payload a single write request can carry.
pub const MAX_WRITE_LEN: usize = MAX_FRAME_LEN - 1;
/// Largest payload a single read response can carry.
pub const MAX_READ_LEN: usize = MAX_FRAME_LEN - RESPONSE_HEADER_LEN;

/// A request on an open file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Read { max_len: u32 },
    Write { data: Bytes },
    Ioctl { cmd: u32, arg: u64 },
}

impl Request {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Request::Read { max_len } => {
                buf.put_u8(OP_READ);
                buf.put_u32(*max_len);
            }
            Request::Write { data } => {
                buf.reserve(1 + data.len());
                buf.put_u8(OP_WRITE);
                buf.put_slice(data);
            }
            Request::Ioctl { cmd, arg } => {
                buf.put_u8(OP_IOCTL);
                buf.put_u32(*cmd);
                buf.put_u64(*arg);
            }
        }
        buf.freeze()
    }

    pub fn decode(mut body: Bytes) -> Result<Self> {
        if body.is_empty() {
            return Err(TransportError::Malformed("empty request".into()));
        }
        let op = body.get_u8();
        match op {
            OP_READ => {
                expect_len(&body, 4, "read")?;
                Ok(Request::Read {
                    max_len: body.get_u32(),
                })
            }
            OP_WRITE => Ok(Request::Write { data: body }),
            OP_IOCTL => {
                expect_len(&body, 12, "ioctl")?;
                let cmd = body.get_u32();
                let arg = body.get_u64();
                Ok(Request::Ioctl { cmd, arg })
            }
            other => Err(TransportError::Malformed(format!("unknown op {other}"))),
        }
    }
}

fn expect_len(body: &Bytes, len: usize, what: &str) -> Result<()> {
    if body.len() != len {
        return Err(TransportError::Malformed(format!(
            "{what} payload is {} bytes, expected {len}",
            body.len()
        )));
    }
    Ok(())
}

/// Result of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Non-negative return value, or a negated errno.
    pub status: i64,
    /// Data returned by a read.
    pub data: Bytes,
}

impl Response {
    pub fn ok(status: i64) -> Self {
        Self {
            status,
            data: Bytes::new(),
        }
    }

    pub fn with_data(data: Bytes) -> Self {
        Self {
            status: data.len() as i64,
            data,
        }
    }

    pub fn errno(errno: Errno) -> Self {
        Self {
            status: -(errno as i64),
            data: Bytes::new(),
        }
    }

    /// Split into the return value or the errno it carries.
    pub fn into_result(self) -> Result<(i64, Bytes)> {
        if self.status >= 0 {
            return Ok((self.status, self.data));
        }
        let raw = i32::try_from(-self.status).unwrap_or(i32::MAX);
        Err(TransportError::Errno(
            Errno::from_raw(raw).unwrap_or(Errno::EIO),
        ))
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RESPONSE_HEADER_LEN + self.data.len());
        buf.put_i64(self.status);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    pub fn decode(mut body: Bytes) -> Result<Self> {
        if body.len() < RESPONSE_HEADER_LEN {
            return Err(TransportError::Malformed("short response".into()));
        }
        let status = body.get_i64();
        if status >= 0 && !body.is_empty() && body.len() as i64 != status {
            return Err(TransportError::Malformed(format!(
                "status {status} does not match {} data bytes",
                body.len()
            )));
        }
        Ok(Self { status, data: body })
    }
}

/// Read one frame body. Returns `None` on a clean EOF between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    // Read length prefix (4 bytes, big-endian)
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::ConnectionClosed
        } else {
            e.into()
        }
    })?;
    Ok(Some(Bytes::from(body)))
}

/// Write one frame.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if body.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(body.len()));
    }
    let len_bytes = (body.len() as u32).to_be_bytes();
    writer.write_all(&len_bytes).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}
