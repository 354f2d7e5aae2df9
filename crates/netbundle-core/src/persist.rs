//! Atomic file operations for JSON documents.
//!
//! Writes go through a temp file with a unique PID+TID suffix, are validated
//! by re-parsing, synced to disk and then renamed over the target.

use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::process;
use std::thread;
use tracing::{debug, warn};

use crate::{NetBundleError, Result};

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist, or an error if parsing fails.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut file = File::open(path).map_err(|e| NetBundleError::Io {
        message: format!("Failed to open {}", path.display()),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| NetBundleError::Io {
            message: format!("Failed to read {}", path.display()),
            path: Some(path.to_path_buf()),
            source: Some(e),
        })?;

    let data: T = serde_json::from_str(&contents).map_err(|e| NetBundleError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Read and parse a JSON file that must exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    atomic_read_json(path)?.ok_or_else(|| NetBundleError::Io {
        message: format!("File not found: {}", path.display()),
        path: Some(path.to_path_buf()),
        source: None,
    })
}

/// Write data to a JSON file atomically.
///
/// This function:
/// 1. Serializes data (compact or pretty) to a temp file with PID+TID suffix
/// 2. Validates the JSON by re-parsing
/// 3. Syncs the temp file to disk
/// 4. Optionally copies the previous document to `.json.bak`
/// 5. Renames the temp file over the target
pub fn atomic_write_json<T: Serialize>(
    path: &Path,
    data: &T,
    pretty: bool,
    keep_backup: bool,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| NetBundleError::Io {
                message: format!("Failed to create directory {}", parent.display()),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }
    }

    let pid = process::id();
    let tid = thread_id();
    let temp_path = path.with_extension(format!("json.{}.{}.tmp", pid, tid));

    let serialized = if pretty {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    }
    .map_err(|e| NetBundleError::Json {
        message: format!("Failed to serialize data: {}", e),
        source: Some(e),
    })?;

    serde_json::from_str::<serde_json::Value>(&serialized).map_err(|e| NetBundleError::Json {
        message: format!("JSON validation failed: {}", e),
        source: Some(e),
    })?;

    let write_result = write_synced(&temp_path, serialized.as_bytes());
    if write_result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    write_result?;

    if keep_backup && path.exists() {
        let backup_path = path.with_extension("json.bak");
        if let Err(e) = fs::copy(path, &backup_path) {
            warn!("Failed to create backup {}: {}", backup_path.display(), e);
        } else {
            debug!("Created backup: {}", backup_path.display());
        }
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        NetBundleError::Io {
            message: format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            ),
            path: Some(path.to_path_buf()),
            source: Some(e),
        }
    })?;

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

fn write_synced(temp_path: &Path, bytes: &[u8]) -> Result<()> {
    let io_error = |what: &str, e: std::io::Error| NetBundleError::Io {
        message: format!("Failed to {} temp file {}", what, temp_path.display()),
        path: Some(temp_path.to_path_buf()),
        source: Some(e),
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp_path)
        .map_err(|e| io_error("create", e))?;

    file.write_all(bytes).map_err(|e| io_error("write", e))?;
    file.flush().map_err(|e| io_error("flush", e))?;
    file.sync_all().map_err(|e| io_error("sync", e))?;
    Ok(())
}

/// Get a unique thread identifier.
fn thread_id() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    format!("{:?}", thread::current().id()).hash(&mut hasher);
    hasher.finish()
}
