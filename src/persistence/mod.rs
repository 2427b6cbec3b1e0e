//! Persistence layer modules.
//!
//! Everything here lives on the local filesystem: one JSON result file per
//! completed background run and a single session ledger. Writes are atomic
//! and owner-only; reads degrade to empty/absent instead of failing.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::Builder;

use crate::{AppError, Result};

pub mod result_store;
pub mod session_store;

/// Permission bits for every file this layer writes.
#[cfg(unix)]
const OWNER_ONLY: u32 = 0o600;

/// Write `bytes` to `path` through a sibling temp file and a rename.
///
/// The temp file is named `<file>.<random>.tmp` in the same directory and is
/// created owner-only, so readers never observe a partially written or
/// world-readable file. Parent directories are created when missing.
///
/// # Errors
///
/// Returns `AppError::Persistence` if the directory, temp file, or rename
/// fails.
pub(crate) fn write_atomic_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|err| {
        AppError::Persistence(format!(
            "failed to create directory {}: {err}",
            parent.display()
        ))
    })?;

    let prefix = path
        .file_name()
        .map(|name| format!("{}.", name.to_string_lossy()))
        .unwrap_or_default();
    let mut builder = Builder::new();
    builder.prefix(&prefix).suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(OWNER_ONLY));
    }

    let mut tmp = builder.tempfile_in(parent).map_err(|err| {
        AppError::Persistence(format!("failed to create temporary file: {err}"))
    })?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|err| AppError::Persistence(format!("failed to write temporary file: {err}")))?;

    tmp.persist(path).map_err(|err| {
        AppError::Persistence(format!(
            "failed to persist file to {}: {err}",
            path.display()
        ))
    })?;
    Ok(())
}
