//! Server session engine: accept loop and per-connection request handling.
//!
//! One task per accepted connection; sessions share no mutable state beyond
//! the filesystem under the root, so concurrent sessions need no locking.
//! Two sessions writing the same path race with undefined interleaving, and
//! a reader may observe a partially written file while an upload is in
//! flight; that is a documented limitation of the protocol, not coordinated
//! away here. A `put` aborted mid-transfer leaves the partial file behind.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::{FerryError, Result};
use crate::message::{Request, Response};
use crate::protocol::timeouts;
use crate::sandbox;
use crate::wire;

/// Bind `addr` and serve the directory tree under `root` until the process
/// exits. Per-connection failures close that connection only; the accept
/// loop itself only fails on listener-level errors.
pub async fn serve(addr: &str, root: &Path) -> Result<()> {
    let root = std::fs::canonicalize(root)?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, root = %root.display(), "ferry server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        info!(%peer, "connection accepted");
        let root = root.clone();
        tokio::spawn(async move {
            match handle_session(stream, &root).await {
                Ok(()) => info!(%peer, "session closed"),
                Err(e) => warn!(%peer, error = %e, "session terminated"),
            }
        });
    }
}

/// One session: receive a request, execute it against the root, respond,
/// repeat until the peer disconnects or the session desynchronizes.
///
/// Path and storage failures are reported to the peer and the session
/// continues; protocol and transport failures propagate and tear the
/// connection down. Dropping the stream and any open file handle on every
/// exit path is the only cleanup a session needs.
async fn handle_session(mut stream: TcpStream, root: &Path) -> Result<()> {
    loop {
        let request = match wire::recv_request(&mut stream).await? {
            Some(request) => request,
            None => return Ok(()),
        };
        debug!(kind = request.kind(), "request received");

        match execute(&mut stream, root, request).await {
            Ok(()) => {}
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "request failed");
                let response = Response::Error {
                    kind: e.wire_kind(),
                    message: e.wire_message(),
                };
                wire::send_response(&mut stream, &response).await?;
            }
        }
    }
}

/// Dispatch one request. Recoverable errors are returned before any bytes of
/// the exchange have been written, so the caller can still answer with a
/// structured error response on a synchronized stream. Failures after a
/// bulk payload is in flight are remapped to transport errors
/// ([`fatal_after_payload`]) because at that point no structured reply can
/// be delivered without desynchronizing the peer.
async fn execute(stream: &mut TcpStream, root: &Path, request: Request) -> Result<()> {
    match request {
        Request::List { path } => {
            let dir = resolve_existing_dir(root, &path)?;
            let entries = sandbox::list_directory(root, &dir)?;
            wire::send_response(stream, &Response::Entries { entries }).await
        }
        Request::Mkdir { path } => {
            let dir = sandbox::normalize_under_root(root, Path::new(&path))?;
            sandbox::ensure_dir_exists(&dir)?;
            debug!(%path, "directory created");
            wire::send_response(stream, &Response::Ok).await
        }
        Request::Get { path } => {
            let file_path = resolve_regular_file(root, &path)?;
            let mut file = tokio::fs::File::open(&file_path).await?;
            let size = file.metadata().await?.len();

            wire::send_response(stream, &Response::Size { size }).await?;
            match wire::recv_response(stream, timeouts::READY_MS).await? {
                Response::Ready => {}
                other => {
                    return Err(FerryError::protocol(format!(
                        "expected ready token before download, got {other:?}"
                    )))
                }
            }
            wire::send_payload(stream, &mut file, size).await?;
            debug!(%path, size, "file sent");
            Ok(())
        }
        Request::Put { path, size } => {
            let file_path = resolve_put_target(root, &path)?;
            sandbox::ensure_parent_exists(&file_path)?;
            let mut file = tokio::fs::File::create(&file_path).await?;

            wire::send_response(stream, &Response::Ready).await?;
            wire::recv_payload(stream, &mut file, size).await?;
            // The peer considers the exchange complete once its payload is
            // consumed and will not read another frame before its next
            // request, so a late storage failure here must tear the session
            // down rather than be reported.
            file.flush()
                .await
                .map_err(|e| fatal_after_payload(e.into(), &path))?;
            debug!(%path, size, "file received");
            Ok(())
        }
    }
}

fn resolve_existing_dir(root: &Path, path: &str) -> Result<PathBuf> {
    let dir = sandbox::normalize_under_root(root, Path::new(path))?;
    let meta = std::fs::metadata(&dir)
        .map_err(|_| FerryError::path(format!("no such directory: {path}")))?;
    if !meta.is_dir() {
        return Err(FerryError::path(format!("not a directory: {path}")));
    }
    Ok(dir)
}

fn resolve_regular_file(root: &Path, path: &str) -> Result<PathBuf> {
    let file_path = sandbox::normalize_under_root(root, Path::new(path))?;
    let meta = std::fs::metadata(&file_path)
        .map_err(|_| FerryError::path(format!("no such file: {path}")))?;
    if !meta.is_file() {
        return Err(FerryError::path(format!("not a regular file: {path}")));
    }
    Ok(file_path)
}

fn resolve_put_target(root: &Path, path: &str) -> Result<PathBuf> {
    let file_path = sandbox::normalize_under_root(root, Path::new(path))?;
    if file_path.is_dir() {
        return Err(FerryError::path(format!("upload target is a directory: {path}")));
    }
    Ok(file_path)
}

/// Remap an error that occurred after the peer delivered a full payload.
/// Nothing can be sent on the structured channel at that point without the
/// peer misreading it as the reply to its next request, so anything not
/// already session-fatal becomes a transport error and closes the session.
fn fatal_after_payload(e: FerryError, path: &str) -> FerryError {
    if e.is_session_fatal() {
        e
    } else {
        FerryError::transport(format!("post-upload failure for {path}: {e}"))
    }
}
