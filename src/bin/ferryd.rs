use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use ferry::cli::DaemonOpts;

fn main() -> Result<()> {
    let opts = DaemonOpts::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Create the root on first run, then insist it is a directory
    if !opts.root.exists() {
        std::fs::create_dir_all(&opts.root)
            .with_context(|| format!("failed to create root directory: {}", opts.root.display()))?;
    }
    if !opts.root.is_dir() {
        anyhow::bail!("root path is not a directory: {}", opts.root.display());
    }

    let canonical_root = std::fs::canonicalize(&opts.root)
        .with_context(|| format!("failed to canonicalize root path: {}", opts.root.display()))?;

    if opts.bind.starts_with("0.0.0.0") {
        warn!("binding to 0.0.0.0 exposes the server to all network interfaces");
        warn!("the protocol is unauthenticated and unencrypted; only use on trusted networks");
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    rt.block_on(ferry::server::serve(&opts.bind, &canonical_root))?;
    Ok(())
}
