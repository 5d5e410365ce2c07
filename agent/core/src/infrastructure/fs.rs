// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Atomic file persistence for agent state: write to a temp file in the same
//! directory, fsync the data, rename over the final path, then fsync the
//! parent directory. A crash at any point leaves either the old complete
//! file or the new complete file observable, never a partial write.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("path has no parent directory: {}", path.display())]
    NoParentDirectory { path: PathBuf },

    #[error("path has no file name: {}", path.display())]
    NoFileName { path: PathBuf },

    #[error("I/O error during {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Replace `path` with `contents` atomically. The final file carries mode
/// 0644 on Unix.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), FsError> {
    let dir = path
        .parent()
        .ok_or_else(|| FsError::NoParentDirectory {
            path: path.to_path_buf(),
        })?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| FsError::NoFileName {
            path: path.to_path_buf(),
        })?;

    // Same directory as the target so the rename cannot cross filesystems.
    let tmp_path = dir.join(format!(".{file_name}.tmp"));

    let mut tmp = File::create(&tmp_path).map_err(|e| FsError::io("create temp file", e))?;
    tmp.write_all(contents)
        .map_err(|e| FsError::io("write temp file", e))?;
    tmp.sync_all().map_err(|e| FsError::io("sync temp file", e))?;
    drop(tmp);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o644))
            .map_err(|e| FsError::io("set temp file permissions", e))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| FsError::io("rename into place", e))?;

    // The rename itself must survive a crash.
    #[cfg(unix)]
    {
        let dir_handle = File::open(dir).map_err(|e| FsError::io("open parent directory", e))?;
        dir_handle
            .sync_all()
            .map_err(|e| FsError::io("sync parent directory", e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_sees_full_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle");

        atomic_write(&path, b"first").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"first");

        atomic_write(&path, b"second, longer contents").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second, longer contents");
    }

    #[test]
    fn no_temp_file_is_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle");

        atomic_write(&path, b"payload").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("bundle")]);
    }

    #[cfg(unix)]
    #[test]
    fn final_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device-id");

        atomic_write(&path, b"dev_1").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn missing_parent_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("bundle");
        assert!(atomic_write(&path, b"x").is_err());
    }
}
