//! Shared CLI helpers and small reusable Clap fragments

use clap::Parser;
use std::path::PathBuf;

/// Daemon options for ferryd
#[derive(Clone, Debug, Parser)]
#[command(name = "ferryd", about = "Serve a sandboxed directory tree over the ferry protocol")]
pub struct DaemonOpts {
    /// Bind address (host:port)
    #[arg(long, default_value = "127.0.0.1:9999")]
    pub bind: String,

    /// Root directory to serve (created if missing)
    #[arg(long, default_value = "server_files")]
    pub root: PathBuf,
}
