//! Ferry
//!
//! A minimal remote-filesystem protocol: a server exposes one sandboxed
//! directory tree over framed TCP, and clients list, create, upload, and
//! download against it. Structured JSON messages are length-prefixed; file
//! bytes ride unframed behind a size handshake.

pub mod cli;
pub mod client;
pub mod error;
pub mod message;
pub mod protocol;
pub mod sandbox;
pub mod server;
pub mod wire;

pub use client::Client;
pub use error::{FerryError, Result};
pub use message::{DirEntry, Request, Response};
