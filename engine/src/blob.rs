//! Storage for the uploaded audio bytes, keyed by sanitised filename.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::EngineError;

/// Stores uploaded files. Names passed in must already be sanitised with
/// [`sanitize_filename`].
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` under `name`, replacing any previous content. Returns
    /// true when something was replaced.
    async fn put(&self, name: &str, data: &[u8]) -> Result<bool, EngineError>;

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, EngineError>;

    /// All stored names, sorted.
    async fn list(&self) -> Result<Vec<String>, EngineError>;

    /// Remove every blob and return how many were removed.
    async fn clear(&self) -> Result<usize, EngineError>;
}

/// Reduce an uploaded filename to a single safe path component.
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_`, and leading dots are stripped. Returns `None` when nothing usable
/// remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return None;
    }
    Some(cleaned.to_string())
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// Blobs as plain files in one directory, created on first write.
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> Result<PathBuf, EngineError> {
        match sanitize_filename(name) {
            Some(safe) if safe == name => Ok(self.dir.join(safe)),
            _ => Err(EngineError::InvalidRecord(format!("unsafe blob name {name:?}"))),
        }
    }
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, name: &str, data: &[u8]) -> Result<bool, EngineError> {
        let path = self.path(name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let replaced = tokio::fs::try_exists(&path).await?;
        tokio::fs::write(&path, data).await?;
        tracing::debug!(path = %path.display(), bytes = data.len(), replaced, "engine: blob stored");
        Ok(replaced)
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, EngineError> {
        let path = self.path(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, EngineError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn clear(&self) -> Result<usize, EngineError> {
        let names = self.list().await?;
        for name in &names {
            tokio::fs::remove_file(self.dir.join(name)).await?;
        }
        Ok(names.len())
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// In-process blob store for tests and ephemeral engines.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, name: &str, data: &[u8]) -> Result<bool, EngineError> {
        Ok(self
            .blobs
            .lock()
            .insert(name.to_string(), data.to_vec())
            .is_some())
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self.blobs.lock().get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.blobs.lock().keys().cloned().collect())
    }

    async fn clear(&self) -> Result<usize, EngineError> {
        let mut blobs = self.blobs.lock();
        let n = blobs.len();
        blobs.clear();
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_filename("clip.wav").as_deref(), Some("clip.wav"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("C:\\music\\my song.wav").as_deref(), Some("my_song.wav"));
        assert_eq!(sanitize_filename(".hidden").as_deref(), Some("hidden"));
        assert_eq!(sanitize_filename("dir/").as_deref(), None);
        assert_eq!(sanitize_filename("..").as_deref(), None);
        assert_eq!(sanitize_filename("声音").as_deref(), None);
    }

    #[tokio::test]
    async fn fs_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("uploads"));

        assert!(store.list().await.unwrap().is_empty());
        assert!(store.get("a.wav").await.unwrap().is_none());

        assert!(!store.put("b.wav", b"bbb").await.unwrap());
        assert!(!store.put("a.wav", b"old").await.unwrap());
        assert!(store.put("a.wav", b"aaa").await.unwrap());
        assert_eq!(store.get("a.wav").await.unwrap().unwrap(), b"aaa");
        assert_eq!(store.list().await.unwrap(), vec!["a.wav", "b.wav"]);

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fs_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert!(matches!(
            store.put("../x.wav", b"x").await,
            Err(EngineError::InvalidRecord(_))
        ));
    }

    #[tokio::test]
    async fn memory_store() {
        let store = MemoryBlobStore::new();
        assert!(!store.put("x.wav", b"1").await.unwrap());
        assert!(store.put("x.wav", b"2").await.unwrap());
        assert_eq!(store.get("x.wav").await.unwrap().unwrap(), b"2");
        assert_eq!(store.clear().await.unwrap(), 1);
        assert!(store.get("x.wav").await.unwrap().is_none());
    }
}
