//! Storage Preparation Module
//!
//! Guarantees the cache directory and cache files exist with the expected
//! permissions before the engine touches them.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{CacheError, Result};

// == Storage Preparer ==
/// Creates and validates the files the cache lives in.
///
/// Implementations either hand back a usable path or fail with
/// [`CacheError::Setup`].
pub trait StoragePreparer: fmt::Debug + Send + Sync {
    /// Ensures `dir` exists as a readable and writable directory.
    fn prepare_dir(&self, dir: &Path, mode: u32) -> Result<PathBuf>;

    /// Ensures `dir/file_name` exists as a readable and writable file.
    fn prepare_file(&self, dir: &Path, file_name: &str, mode: u32) -> Result<PathBuf>;
}

// == Filesystem Preparer ==
/// Default preparer backed by the local filesystem.
///
/// Permission masks are applied on Unix only.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStoragePreparer;

impl StoragePreparer for FsStoragePreparer {
    fn prepare_dir(&self, dir: &Path, mode: u32) -> Result<PathBuf> {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| CacheError::setup(dir, e.to_string()))?;
            set_mode(dir, mode).map_err(|e| CacheError::setup(dir, e.to_string()))?;
            debug!(path = %dir.display(), "created cache directory");
        }

        let meta = fs::metadata(dir).map_err(|e| CacheError::setup(dir, e.to_string()))?;
        if !meta.is_dir() {
            return Err(CacheError::setup(dir, "is not a dir"));
        }
        if meta.permissions().readonly() {
            return Err(CacheError::setup(dir, "is not readable or writable"));
        }

        Ok(dir.to_path_buf())
    }

    fn prepare_file(&self, dir: &Path, file_name: &str, mode: u32) -> Result<PathBuf> {
        if !dir.is_dir() {
            return Err(CacheError::setup(dir, "is not a dir"));
        }

        let path = dir.join(file_name);
        if !path.exists() {
            create_with_mode(&path, mode).map_err(|e| CacheError::setup(&path, e.to_string()))?;
            debug!(path = %path.display(), "created cache file");
        }

        let meta = fs::metadata(&path).map_err(|e| CacheError::setup(&path, e.to_string()))?;
        if !meta.is_file() {
            return Err(CacheError::setup(&path, "is not a file"));
        }
        if current_mode(&meta) != Some(mode) {
            set_mode(&path, mode).map_err(|e| {
                CacheError::setup(&path, format!("cannot change file permissions: {e}"))
            })?;
        }
        if fs::metadata(&path)
            .map(|m| m.permissions().readonly())
            .unwrap_or(true)
        {
            return Err(CacheError::setup(&path, "is not readable or writable"));
        }

        Ok(path)
    }
}

fn create_with_mode(path: &Path, mode: u32) -> io::Result<fs::File> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .mode(mode)
            .open(path)
    }
    #[cfg(not(unix))]
    {
        let _ = mode;
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn current_mode(meta: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn current_mode(_meta: &fs::Metadata) -> Option<u32> {
    None
}
