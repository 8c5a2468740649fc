//! Newline-delimited artifact files.
//!
//! Artifacts are what the stage cache looks at, so they are only ever
//! replaced whole: content goes to a temporary sibling first and is renamed
//! into place once fully written.

use crate::error::{StorageError, StorageResult};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Read a line artifact, trimming lines and dropping blank ones.
pub fn read_lines(path: &Path) -> StorageResult<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(path.to_path_buf())
        } else {
            StorageError::ReadFailed {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Write `lines` to `path`, one per line, replacing it atomically.
pub fn write_lines_atomic<S: AsRef<str>>(path: &Path, lines: &[S]) -> StorageResult<()> {
    let mut content = String::new();
    for line in lines {
        content.push_str(line.as_ref());
        content.push('\n');
    }
    write_atomic(path, content.as_bytes())
}

/// Replace `path` with `bytes` through a temporary sibling and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let write_failed = |source| StorageError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_failed)?;
    }

    let temp = temp_sibling(path);
    let result = fs::File::create(&temp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&temp, path));

    if let Err(source) = result {
        let _ = fs::remove_file(&temp);
        return Err(write_failed(source));
    }

    Ok(())
}

/// Whether `path` is an existing file with at least one byte.
pub fn is_nonempty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Remove a file; a missing file is not an error.
pub fn remove_file_if_exists(path: &Path) -> StorageResult<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(StorageError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        }),
        _ => Ok(()),
    }
}

/// Remove a directory tree; a missing directory is not an error.
pub fn remove_dir_if_exists(path: &Path) -> StorageResult<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(StorageError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        }),
        _ => Ok(()),
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}
