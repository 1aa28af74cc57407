//! Root confinement and filesystem helpers for the server session engine.
//!
//! Every client-supplied path is relative to the server root and must stay
//! there: components are filtered, the result is canonicalized, and the final
//! path is prefix-checked against the root before any filesystem operation.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

use crate::error::{FerryError, Result};
use crate::message::DirEntry;

/// Normalize a client-supplied relative path to be safely under `root`.
///
/// Rejects parent-directory components, absolute/prefix components, and NUL
/// bytes, then canonicalizes the nearest existing ancestor of the joined
/// path — so a symlink at any intermediate component is resolved before the
/// prefix check, not just at the leaf — and verifies the result still starts
/// with `root`. `root` must already be canonical.
pub fn normalize_under_root(root: &Path, p: &Path) -> Result<PathBuf> {
    use Component::{CurDir, Normal, ParentDir, Prefix, RootDir};

    if p.to_string_lossy().contains('\0') {
        return Err(FerryError::path("path contains NUL byte"));
    }

    let mut safe = PathBuf::new();
    for component in p.components() {
        match component {
            CurDir => {}
            Normal(s) => safe.push(s),
            ParentDir | RootDir | Prefix(_) => {
                return Err(FerryError::path(format!(
                    "path contains disallowed component: {component:?}"
                )));
            }
        }
    }

    let joined = root.join(&safe);

    // Walk up to the nearest existing ancestor and canonicalize it, then
    // re-append the missing components (already known to be ParentDir-free).
    // Canonicalizing only the leaf or its direct parent would let a symlink
    // at a deeper intermediate component slip past the prefix check.
    let mut existing = joined.clone();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            // The walk bottoms out at `root`, which exists.
            _ => break,
        }
    }
    let mut final_path = existing
        .canonicalize()
        .map_err(|e| FerryError::path(format!("cannot resolve {}: {e}", existing.display())))?;
    for name in missing.iter().rev() {
        final_path.push(name);
    }

    if !final_path.starts_with(root) {
        return Err(FerryError::path(format!(
            "path {} escapes the server root",
            p.display()
        )));
    }

    Ok(final_path)
}

/// Create directory with parent creation
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Create parent directory if needed
pub fn ensure_parent_exists(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent)?;
    }
    Ok(())
}

/// List the immediate children of `dir`, each carrying a root-relative path.
/// Directories sort before files; each group is alphabetical by name.
pub fn list_directory(root: &Path, dir: &Path) -> Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type()?.is_dir();
        let path = entry
            .path()
            .strip_prefix(root)
            .map(|rel| rel.to_string_lossy().into_owned())
            .unwrap_or_else(|_| name.clone());
        entries.push(DirEntry { name, path, is_dir });
    }
    entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
    Ok(entries)
}
