//! Error taxonomy for the ferry protocol.
//!
//! `Path` and `Io` failures are recoverable: the server reports them to the
//! peer as a structured error response and the session continues. `Protocol`
//! and `Transport` failures desynchronize the connection and terminate that
//! session (never the listening process).

use thiserror::Error;

use crate::message::ErrorKind;

pub type Result<T> = std::result::Result<T, FerryError>;

#[derive(Debug, Error)]
pub enum FerryError {
    /// Malformed or unexpected wire message, bad magic/version, oversized
    /// frame, or a response of the wrong shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Request named a path that escapes the root, does not exist, or is of
    /// the wrong type (file expected but directory found, or vice versa).
    #[error("path error: {0}")]
    Path(String),

    /// Connection-level failure: disconnect, short read/write, or timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// Underlying storage failure on read/write/create.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl FerryError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        FerryError::Protocol(msg.into())
    }

    pub fn path(msg: impl Into<String>) -> Self {
        FerryError::Path(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        FerryError::Transport(msg.into())
    }

    /// Whether this error must tear down the session instead of being
    /// reported to the peer as a structured error response.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, FerryError::Protocol(_) | FerryError::Transport(_))
    }

    /// The kind tag carried by the wire `error` response.
    pub fn wire_kind(&self) -> ErrorKind {
        match self {
            FerryError::Protocol(_) => ErrorKind::Protocol,
            FerryError::Path(_) => ErrorKind::Path,
            FerryError::Transport(_) => ErrorKind::Transport,
            FerryError::Io(_) => ErrorKind::Io,
        }
    }

    /// The message carried by the wire `error` response, without the
    /// `Display` prefix so it does not double up on reconstruction.
    pub fn wire_message(&self) -> String {
        match self {
            FerryError::Protocol(m) | FerryError::Path(m) | FerryError::Transport(m) => m.clone(),
            FerryError::Io(e) => e.to_string(),
        }
    }

    /// Rebuild the taxonomy from a wire `error` response received by the
    /// client driver.
    pub fn from_wire(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Protocol => FerryError::Protocol(message),
            ErrorKind::Path => FerryError::Path(message),
            ErrorKind::Transport => FerryError::Transport(message),
            ErrorKind::Io => FerryError::Io(std::io::Error::other(message)),
        }
    }
}
