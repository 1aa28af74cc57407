//! Structured wire messages for the ferry protocol.
//!
//! Every request and response travels as one JSON object inside one frame.
//! Requests are tagged by `type`, responses by `status`. The `ready` token is
//! a response in both directions: the server sends it to accept an upload,
//! the client sends it to accept a download after the size handshake.

use serde::{Deserialize, Serialize};

/// One directory child produced by a `list` request. `path` is relative to
/// the server root; entries are transient and never stored server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
}

/// Client request. `path` is always relative to the session root; the server
/// rejects any path that would resolve outside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Request {
    /// List the immediate children of a directory.
    List { path: String },
    /// Create a directory (and missing ancestors), idempotently.
    Mkdir { path: String },
    /// Download a regular file.
    Get { path: String },
    /// Upload exactly `size` bytes to a file, overwriting it.
    Put { path: String, size: u64 },
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::List { .. } => "list",
            Request::Mkdir { .. } => "mkdir",
            Request::Get { .. } => "get",
            Request::Put { .. } => "put",
        }
    }
}

/// Error kind tag carried on the wire, mirroring the crate error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Protocol,
    Path,
    Transport,
    Io,
}

/// Structured response or handshake token.
///
/// `Size` and `Ready` are the bulk-transfer handshake: `get` answers with
/// `Size`, waits for the peer's `Ready`, then streams exactly that many raw
/// bytes with no further framing; `put` answers with `Ready` and then reads
/// exactly the declared byte count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    /// Directory listing: directories first, then files, each group sorted
    /// by name.
    Entries { entries: Vec<DirEntry> },
    /// Simple acknowledgement (`mkdir`).
    Ok,
    /// Readiness token preceding a bulk transfer.
    Ready,
    /// Byte count handshake preceding a download.
    Size { size: u64 },
    /// Structured error; sent in place of any other response, never in place
    /// of raw payload bytes.
    Error { kind: ErrorKind, message: String },
}
