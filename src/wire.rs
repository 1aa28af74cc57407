//! Transport framing layer: discrete structured frames plus exact-size raw
//! payload movement over one duplex stream.
//!
//! Structured messages are length-prefixed (header codec in
//! [`crate::protocol`]) so arbitrary-size messages never truncate or merge.
//! Raw file payloads carry no per-chunk framing; both sides account against
//! the size agreed in the preceding handshake and stop exactly at that
//! boundary. Any failure inside an in-flight payload desynchronizes the
//! stream and is reported as a transport error.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Duration};

use crate::error::{FerryError, Result};
use crate::message::{Request, Response};
use crate::protocol::{self, frame, timeouts, COPY_CHUNK, HEADER_LEN};

async fn read_exact_timed<S>(stream: &mut S, buf: &mut [u8], ms: u64) -> Result<()>
where
    S: AsyncRead + Unpin,
{
    match timeout(Duration::from_millis(ms), stream.read_exact(buf)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(FerryError::transport(format!("read failed: {e}"))),
        Err(_) => Err(FerryError::transport(format!("read timeout ({ms} ms)"))),
    }
}

async fn write_all_timed<S>(stream: &mut S, buf: &[u8], ms: u64) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    match timeout(Duration::from_millis(ms), stream.write_all(buf)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(FerryError::transport(format!("write failed: {e}"))),
        Err(_) => Err(FerryError::transport(format!("write timeout ({ms} ms)"))),
    }
}

/// Write one self-delimited frame.
pub async fn write_frame<S>(stream: &mut S, frame_type: u8, payload: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    protocol::validate_frame_size(payload.len())?;
    let header = protocol::build_frame_header(frame_type, payload.len() as u32);
    let ms = timeouts::write_deadline_ms(payload.len());
    write_all_timed(stream, &header, ms).await?;
    if !payload.is_empty() {
        write_all_timed(stream, payload, ms).await?;
    }
    stream
        .flush()
        .await
        .map_err(|e| FerryError::transport(format!("flush failed: {e}")))
}

/// Read one complete frame. Returns `None` on clean end-of-stream, i.e. the
/// peer closed the connection on a frame boundary; EOF anywhere inside a
/// frame is a transport error.
///
/// The wait for the first header byte is unbounded (a session may idle
/// between requests); the rest of the frame is deadline-bounded. Callers
/// expecting a frame promptly wrap this in [`read_frame_timed`].
pub async fn read_frame<S>(stream: &mut S) -> Result<Option<(u8, Vec<u8>)>>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let n = stream
        .read(&mut header[..1])
        .await
        .map_err(|e| FerryError::transport(format!("read failed: {e}")))?;
    if n == 0 {
        return Ok(None);
    }
    read_exact_timed(stream, &mut header[1..], timeouts::read_deadline_ms(HEADER_LEN)).await?;

    let (frame_type, payload_len) = protocol::parse_frame_header(&header)?;
    let len = payload_len as usize;
    protocol::validate_frame_size(len)?;

    let mut payload = vec![0u8; len];
    if len > 0 {
        read_exact_timed(stream, &mut payload, timeouts::read_deadline_ms(len)).await?;
    }
    Ok(Some((frame_type, payload)))
}

/// [`read_frame`] with a deadline on the whole frame, for reads that occur
/// inside an in-flight exchange.
pub async fn read_frame_timed<S>(stream: &mut S, ms: u64) -> Result<Option<(u8, Vec<u8>)>>
where
    S: AsyncRead + Unpin,
{
    match timeout(Duration::from_millis(ms), read_frame(stream)).await {
        Ok(res) => res,
        Err(_) => Err(FerryError::transport(format!("frame timeout ({ms} ms)"))),
    }
}

/// Send one structured request in its own frame.
pub async fn send_request<S>(stream: &mut S, request: &Request) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(request)
        .map_err(|e| FerryError::protocol(format!("encode request: {e}")))?;
    write_frame(stream, frame::REQUEST, &payload).await
}

/// Receive one structured request. Returns `None` when the peer disconnects
/// cleanly between requests.
pub async fn recv_request<S>(stream: &mut S) -> Result<Option<Request>>
where
    S: AsyncRead + Unpin,
{
    let (frame_type, payload) = match read_frame(stream).await? {
        Some(f) => f,
        None => return Ok(None),
    };
    if frame_type != frame::REQUEST {
        return Err(FerryError::protocol(format!(
            "expected request frame, got type {frame_type}"
        )));
    }
    let request = serde_json::from_slice(&payload)
        .map_err(|e| FerryError::protocol(format!("malformed request: {e}")))?;
    Ok(Some(request))
}

/// Send one structured response (or handshake token) in its own frame.
pub async fn send_response<S>(stream: &mut S, response: &Response) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(response)
        .map_err(|e| FerryError::protocol(format!("encode response: {e}")))?;
    write_frame(stream, frame::RESPONSE, &payload).await
}

/// Receive one structured response within `ms`. A disconnect here is never
/// clean: the peer owed us a message.
pub async fn recv_response<S>(stream: &mut S, ms: u64) -> Result<Response>
where
    S: AsyncRead + Unpin,
{
    let (frame_type, payload) = match read_frame_timed(stream, ms).await? {
        Some(f) => f,
        None => {
            return Err(FerryError::transport(
                "connection closed while awaiting response",
            ))
        }
    };
    if frame_type != frame::RESPONSE {
        return Err(FerryError::protocol(format!(
            "expected response frame, got type {frame_type}"
        )));
    }
    serde_json::from_slice(&payload)
        .map_err(|e| FerryError::protocol(format!("malformed response: {e}")))
}

/// Stream exactly `size` bytes from `source` onto the wire, unframed.
pub async fn send_payload<S, R>(stream: &mut S, source: &mut R, size: u64) -> Result<()>
where
    S: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut remaining = size;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = source
            .read(&mut buf[..want])
            .await
            .map_err(|e| FerryError::transport(format!("payload source failed mid-transfer: {e}")))?;
        if n == 0 {
            return Err(FerryError::transport(format!(
                "payload source ended with {remaining} of {size} bytes unsent"
            )));
        }
        write_all_timed(stream, &buf[..n], timeouts::write_deadline_ms(n)).await?;
        remaining -= n as u64;
    }
    stream
        .flush()
        .await
        .map_err(|e| FerryError::transport(format!("flush failed: {e}")))
}

/// Accumulate exactly `size` bytes from the wire into `sink`, buffering
/// partial reads and stopping precisely at the declared boundary however the
/// transport chunked them.
pub async fn recv_payload<S, W>(stream: &mut S, sink: &mut W, size: u64) -> Result<()>
where
    S: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut remaining = size;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let ms = timeouts::read_deadline_ms(want);
        let n = match timeout(Duration::from_millis(ms), stream.read(&mut buf[..want])).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                return Err(FerryError::transport(format!("payload read failed: {e}")))
            }
            Err(_) => {
                return Err(FerryError::transport(format!("payload read timeout ({ms} ms)")))
            }
        };
        if n == 0 {
            return Err(FerryError::transport(format!(
                "peer closed with {remaining} of {size} payload bytes outstanding"
            )));
        }
        sink.write_all(&buf[..n])
            .await
            .map_err(|e| FerryError::transport(format!("payload sink failed mid-transfer: {e}")))?;
        remaining -= n as u64;
    }
    sink.flush()
        .await
        .map_err(|e| FerryError::transport(format!("payload sink flush failed: {e}")))
}
