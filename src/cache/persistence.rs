//! Persistence Module
//!
//! Moves namespaces and the hash table between memory and their JSON files:
//! lazy loads, and read-merge-write saves under an exclusive file lock.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cache::entry::CacheEntry;
use crate::cache::eviction::{EvictionOutcome, EvictionPolicy};
use crate::cache::hash_table::HashTable;
use crate::cache::key::HashKey;
use crate::cache::namespace::NamespaceStore;
use crate::cache::storage::StoragePreparer;
use crate::cache::{CACHE_DIR_MODE, CACHE_FILE_EXTENSION, CACHE_FILE_MODE, HASH_FILE_NAME};
use crate::error::{CacheError, Result};

// == Persistence Coordinator ==
/// Owns the cache directory layout and every read/write of cache files.
#[derive(Debug)]
pub struct PersistenceCoordinator {
    dir: PathBuf,
    preparer: Box<dyn StoragePreparer>,
}

impl PersistenceCoordinator {
    // == Constructor ==
    /// Prepares the cache directory and the hash table file.
    pub fn new(dir: &Path, preparer: Box<dyn StoragePreparer>) -> Result<Self> {
        let dir = preparer.prepare_dir(dir, CACHE_DIR_MODE)?;
        preparer.prepare_file(&dir, &file_name(HASH_FILE_NAME), CACHE_FILE_MODE)?;
        Ok(Self { dir, preparer })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/hashtable.cache`
    pub fn hash_table_path(&self) -> PathBuf {
        self.dir.join(file_name(HASH_FILE_NAME))
    }

    /// `<dir>/<namespace>.cache`
    pub fn namespace_path(&self, name: &str) -> Result<PathBuf> {
        validate_namespace(name)?;
        Ok(self.dir.join(file_name(name)))
    }

    fn prepare_namespace_file(&self, name: &str) -> Result<PathBuf> {
        validate_namespace(name)?;
        self.preparer
            .prepare_file(&self.dir, &file_name(name), CACHE_FILE_MODE)
    }

    // == Load ==
    /// Reads a namespace file, creating it empty if absent.
    ///
    /// Unreadable or corrupt content loads as an empty namespace.
    pub fn load_namespace(&self, name: &str) -> Result<HashMap<HashKey, CacheEntry>> {
        let path = self.prepare_namespace_file(name)?;
        let mut entries: HashMap<HashKey, CacheEntry> = read_shared(&path);

        entries.retain(|hash, entry| {
            if entry.has_value() {
                return true;
            }
            warn!(namespace = name, hash = %hash, "skipping cache record without a value");
            false
        });
        debug!(namespace = name, records = entries.len(), "loaded namespace");
        Ok(entries)
    }

    /// Reads the shared hash table file.
    pub fn load_hash_table(&self, max_records: usize) -> HashTable {
        let reverse: HashMap<HashKey, String> = read_shared(&self.hash_table_path());
        debug!(records = reverse.len(), "loaded hash table");
        HashTable::from_reverse(reverse, max_records)
    }

    // == Save ==
    /// Persists one namespace.
    ///
    /// Holds an exclusive lock on the file while it re-reads what is on disk,
    /// merges it underneath `store`, applies `policy`, serializes values, and
    /// rewrites the file in place.
    pub fn save_namespace(
        &self,
        name: &str,
        store: &mut NamespaceStore,
        policy: &EvictionPolicy,
        now: i64,
    ) -> Result<EvictionOutcome> {
        let path = self.prepare_namespace_file(name)?;
        let mut file = open_locked(&path)?;

        store.merge_underneath(read_locked(&mut file, &path));
        // A discard empties `store`, so the rewrite below leaves `{}` in the
        // same inode other writers may already be waiting to lock.
        let outcome = policy.apply(name, store, now);

        store.freeze()?;
        let bytes = serde_json::to_vec(store.entries())?;
        write_locked(&mut file, &path, &bytes)?;
        store.mark_persisted();
        debug!(namespace = name, records = store.len(), ?outcome, "saved namespace");
        Ok(outcome)
    }

    /// Persists the hash table as one authoritative document.
    pub fn save_hash_table(&self, table: &HashTable) -> Result<()> {
        let path = self.preparer.prepare_file(
            &self.dir,
            &file_name(HASH_FILE_NAME),
            CACHE_FILE_MODE,
        )?;
        let mut file = open_locked(&path)?;
        let bytes = serde_json::to_vec(table.reverse_table())?;
        write_locked(&mut file, &path, &bytes)?;
        debug!(records = table.len(), "saved hash table");
        Ok(())
    }

    // == Delete ==
    /// Removes a namespace file. Returns whether one existed.
    pub fn delete_namespace_file(&self, name: &str) -> Result<bool> {
        let path = self.namespace_path(name)?;
        let existed = path.exists();
        remove_file(&path)?;
        Ok(existed)
    }

    // == Discovery ==
    /// Names of every namespace that has a file in the cache directory.
    pub fn namespace_names(&self) -> Result<Vec<String>> {
        let read_dir =
            fs::read_dir(&self.dir).map_err(|e| CacheError::setup(&self.dir, e.to_string()))?;

        let mut names: Vec<String> = read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == CACHE_FILE_EXTENSION)
            })
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .filter(|name| validate_namespace(name).is_ok())
            .collect();
        names.sort();
        Ok(names)
    }
}

// == Namespace Names ==
/// Rejects names that cannot be a plain file stem inside the cache directory.
pub fn validate_namespace(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == HASH_FILE_NAME
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(CacheError::InvalidNamespace(name.to_string()));
    }
    Ok(())
}

fn file_name(stem: &str) -> String {
    format!("{stem}.{CACHE_FILE_EXTENSION}")
}

// == File Helpers ==
/// Decodes a JSON document under a shared lock; any failure yields the default.
fn read_shared<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = File::open(path).and_then(|mut file| {
        FileExt::lock_shared(&file)?;
        let mut content = String::new();
        let read = file.read_to_string(&mut content);
        let _ = FileExt::unlock(&file);
        read.map(|_| content)
    });

    match content {
        Ok(content) => decode_or_default(&content, path),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read cache file, starting cold");
            T::default()
        }
    }
}

fn decode_or_default<T: DeserializeOwned + Default>(content: &str, path: &Path) -> T {
    if content.trim().is_empty() {
        return T::default();
    }
    match serde_json::from_str(content) {
        Ok(value) => value,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "corrupt cache file, starting cold");
            T::default()
        }
    }
}

fn open_locked(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| CacheError::write(path, e))?;
    file.lock_exclusive().map_err(|e| CacheError::write(path, e))?;
    Ok(file)
}

fn read_locked(file: &mut File, path: &Path) -> HashMap<HashKey, CacheEntry> {
    let mut content = String::new();
    match file.read_to_string(&mut content) {
        Ok(_) => {
            let mut entries: HashMap<HashKey, CacheEntry> = decode_or_default(&content, path);
            entries.retain(|_, entry| entry.has_value());
            entries
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot re-read cache file before save");
            HashMap::new()
        }
    }
}

/// Replaces the whole content of a locked file. The lock is released when
/// `file` is dropped.
fn write_locked(file: &mut File, path: &Path, bytes: &[u8]) -> Result<()> {
    rewrite(file, bytes).map_err(|e| CacheError::write(path, e))
}

fn rewrite(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(bytes)?;
    file.flush()
}

fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(CacheError::write(path, err)),
    }
}
