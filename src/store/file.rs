//! File-backed key-value store.
//!
//! One JSON file per key under a directory. Writes go to a temp file that is
//! synced and renamed over the target; the directory is synced after the
//! rename. A record `set` has returned for survives a crash whole.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{KeyValueStore, StoreError};

/// Directory of one-file-per-key records.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::Io(format!("{}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// Store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_name(key)))
    }
}

/// Keys map to file names: `:` becomes `.`, anything outside `[A-Za-z0-9_-]`
/// is percent-escaped.
fn file_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' => out.push(b as char),
            b':' => out.push('.'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn io(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io(format!("{}: {e}", path.display()))
}

fn write_synced(path: &Path, value: &str) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()
}

/// Flush the directory entry after a rename.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io(&path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = write_synced(&tmp, value) {
            let _ = fs::remove_file(&tmp);
            return Err(io(&tmp, e));
        }
        fs::rename(&tmp, &path).map_err(|e| io(&path, e))?;
        sync_dir(&self.dir).map_err(|e| io(&self.dir, e))?;
        debug!(path = %path.display(), "record written");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_escaping() {
        assert_eq!(file_name("cangkulan:seed:42:GABC"), "cangkulan.seed.42.GABC");
        assert_eq!(file_name("a/b c"), "a%2Fb%20c");
    }

    #[test]
    fn test_set_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("k:1").unwrap(), None);
        store.set("k:1", "{\"v\":1}").unwrap();
        assert_eq!(store.get("k:1").unwrap().as_deref(), Some("{\"v\":1}"));
        assert!(!dir.path().join("k.1.json.tmp").exists());
        store.delete("k:1").unwrap();
        store.delete("k:1").unwrap();
        assert_eq!(store.get("k:1").unwrap(), None);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::open(dir.path()).unwrap().set("x:y", "kept").unwrap();
        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("x:y").unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn test_overwrite_replaces_leftover_temp() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set("k:1", "old").unwrap();
        // Torn temp file from an interrupted write.
        fs::write(dir.path().join("k.1.json.tmp"), "{\"trunc").unwrap();

        store.set("k:1", "new").unwrap();
        assert_eq!(store.get("k:1").unwrap().as_deref(), Some("new"));
        assert!(!dir.path().join("k.1.json.tmp").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_set_into_removed_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("records");
        let store = FileStore::open(&root).unwrap();
        fs::remove_dir_all(&root).unwrap();

        assert!(matches!(store.set("k:1", "v"), Err(StoreError::Io(_))));
        assert!(!root.exists());
    }

    #[test]
    fn test_open_creates_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStore::open(&nested).unwrap();
        assert_eq!(store.dir(), nested.as_path());
        assert!(nested.is_dir());
    }
}
