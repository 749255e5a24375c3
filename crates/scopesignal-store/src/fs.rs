//! Filesystem backend: one `<key>.json` file per record in a cache directory.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::StoreError;
use crate::backend::{CacheBackend, StoredEntry};

const EXTENSION: &str = "json";

/// Directory-backed cache storage.
///
/// Writes land in a temporary file inside the cache directory and are
/// renamed over the target, so concurrent readers see either the old record
/// or the new one.
pub struct FsBackend {
    dir: PathBuf,
}

impl FsBackend {
    /// Open (creating if needed) a cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Directory {
            path: dir.clone(),
            source,
        })?;
        debug!(dir = %dir.display(), "opened cache directory");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{EXTENSION}"))
    }
}

impl CacheBackend for FsBackend {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn entries(&self) -> Result<Vec<StoredEntry>, StoreError> {
        let mut entries = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let dirent = dirent?;
            let path = dirent.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Entries can vanish between listing and stat.
            let Ok(meta) = dirent.metadata() else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            entries.push(StoredEntry {
                key: key.to_string(),
                size_bytes: meta.len(),
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("cache");
        let backend = FsBackend::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(backend.dir(), dir.as_path());
    }

    #[test]
    fn open_fails_on_file_path() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();
        let result = FsBackend::open(&file);
        assert!(matches!(result, Err(StoreError::Directory { .. })));
    }

    #[test]
    fn save_load_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(tmp.path()).unwrap();

        assert_eq!(backend.load("abc").unwrap(), None);
        backend.save("abc", b"{\"a\":1}").unwrap();
        assert!(tmp.path().join("abc.json").is_file());
        assert_eq!(
            backend.load("abc").unwrap().as_deref(),
            Some(&b"{\"a\":1}"[..])
        );

        assert!(backend.remove("abc").unwrap());
        assert!(!backend.remove("abc").unwrap());
        assert_eq!(backend.load("abc").unwrap(), None);
    }

    #[test]
    fn entries_only_list_json_files() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(tmp.path()).unwrap();
        backend.save("one", b"1234").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();
        fs::create_dir(tmp.path().join("sub.json")).unwrap();

        let entries = backend.entries().unwrap();
        assert_eq!(
            entries,
            vec![StoredEntry {
                key: "one".into(),
                size_bytes: 4
            }]
        );
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(tmp.path()).unwrap();
        backend.save("k", b"v1").unwrap();
        backend.save("k", b"v2").unwrap();
        let count = fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(count, 1);
    }
}
