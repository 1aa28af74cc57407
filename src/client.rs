//! Client driver: one connection, one outstanding request at a time.
//!
//! Each method knows the exact response shape its request kind expects and
//! fully consumes it, trailing payload included, before returning, so the
//! next request always starts on a synchronized stream. Server-reported
//! errors come back as the matching [`FerryError`] variant; a transfer
//! shortfall is a transport error, never silently tolerated.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use crate::error::{FerryError, Result};
use crate::message::{DirEntry, Request, Response};
use crate::protocol::timeouts;
use crate::wire;

pub struct Client {
    stream: TcpStream,
}

impl Client {
    /// Connect to a ferry server at `addr` (host:port).
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = timeout(
            Duration::from_millis(timeouts::CONNECT_MS),
            TcpStream::connect(addr),
        )
        .await
        .map_err(|_| FerryError::transport(format!("connect timeout to {addr}")))?
        .map_err(|e| FerryError::transport(format!("connect to {addr} failed: {e}")))?;
        let _ = stream.set_nodelay(true);
        Ok(Self { stream })
    }

    /// List the immediate children of a root-relative directory.
    pub async fn list(&mut self, path: &str) -> Result<Vec<DirEntry>> {
        wire::send_request(&mut self.stream, &Request::List { path: path.into() }).await?;
        match self.response().await? {
            Response::Entries { entries } => Ok(entries),
            other => Err(unexpected("entries", other)),
        }
    }

    /// Create a directory (and missing ancestors); succeeds if it already
    /// exists.
    pub async fn mkdir(&mut self, path: &str) -> Result<()> {
        wire::send_request(&mut self.stream, &Request::Mkdir { path: path.into() }).await?;
        match self.response().await? {
            Response::Ok => Ok(()),
            other => Err(unexpected("ok", other)),
        }
    }

    /// Download a file into memory.
    pub async fn get(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.get_to_writer(path, &mut buf).await?;
        Ok(buf)
    }

    /// Download a file, streaming its bytes into `sink`. Returns the byte
    /// count the server declared, which is exactly what was written.
    pub async fn get_to_writer<W>(&mut self, path: &str, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        wire::send_request(&mut self.stream, &Request::Get { path: path.into() }).await?;
        let size = match self.response().await? {
            Response::Size { size } => size,
            other => return Err(unexpected("size", other)),
        };
        wire::send_response(&mut self.stream, &Response::Ready).await?;
        wire::recv_payload(&mut self.stream, sink, size).await?;
        Ok(size)
    }

    /// Upload a byte slice as a file, overwriting any existing file there.
    pub async fn put(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let mut source = data;
        self.put_from_reader(path, data.len() as u64, &mut source).await
    }

    /// Upload exactly `size` bytes read from `source`. The server creates
    /// missing parent directories for the target.
    pub async fn put_from_reader<R>(&mut self, path: &str, size: u64, source: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        wire::send_request(
            &mut self.stream,
            &Request::Put { path: path.into(), size },
        )
        .await?;
        match self.response().await? {
            Response::Ready => {}
            other => return Err(unexpected("ready", other)),
        }
        wire::send_payload(&mut self.stream, source, size).await
    }

    /// Await the next structured response, surfacing server-reported errors.
    async fn response(&mut self) -> Result<Response> {
        match wire::recv_response(&mut self.stream, timeouts::RESPONSE_MS).await? {
            Response::Error { kind, message } => Err(FerryError::from_wire(kind, message)),
            response => Ok(response),
        }
    }
}

fn unexpected(expected: &str, got: Response) -> FerryError {
    FerryError::protocol(format!("expected {expected} response, got {got:?}"))
}
