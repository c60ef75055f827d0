use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::Memorizer;
use crate::foundation::{MemorizerError, MemorizerResult};

/// Memorizer persisted as a JSON snapshot file.
///
/// The whole map is rewritten on every mutation. Writes go to a sibling
/// temporary file first and are renamed into place, so a crash never leaves a
/// truncated snapshot behind.
///
/// If the snapshot cannot be loaded the store starts empty and the failure is
/// reported through [`Memorizer::error`].
#[derive(Debug)]
pub struct FileMemorizer {
    path: PathBuf,
    entries: Mutex<HashMap<String, Vec<u8>>>,
    load_error: Option<MemorizerError>,
}

impl FileMemorizer {
    /// Opens the store at `path`. A missing file yields an empty store.
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let (entries, load_error) = match load_snapshot(&path).await {
            Ok(entries) => {
                debug!(path = %path.display(), keys = entries.len(), "Memorizer snapshot loaded");
                (entries, None)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load memorizer snapshot");
                (HashMap::new(), Some(e))
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
            load_error,
        }
    }

    /// Returns the snapshot path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<String, Vec<u8>>) -> MemorizerResult<()> {
        let data = serde_json::to_vec(entries)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

async fn load_snapshot(path: &Path) -> MemorizerResult<HashMap<String, Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(data) if data.is_empty() => Ok(HashMap::new()),
        Ok(data) => Ok(serde_json::from_slice(&data)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Memorizer for FileMemorizer {
    async fn save(&self, key: &str, value: Vec<u8>) -> MemorizerResult<()> {
        let mut entries = self.entries.lock().await;
        let previous = entries.insert(key.to_string(), value);

        if let Err(e) = self.persist(&entries).await {
            // Memory must not run ahead of the snapshot.
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> MemorizerResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> MemorizerResult<()> {
        let mut entries = self.entries.lock().await;
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&entries).await {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn error(&self) -> Option<MemorizerError> {
        self.load_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let memo = FileMemorizer::open(dir.path().join("memo.json")).await;

        assert!(memo.error().is_none());
        assert_eq!(memo.read("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.json");

        {
            let memo = FileMemorizer::open(&path).await;
            memo.save("a", b"alpha".to_vec()).await.unwrap();
            memo.save("b", b"beta".to_vec()).await.unwrap();
            memo.delete("b").await.unwrap();
        }

        let memo = FileMemorizer::open(&path).await;
        assert!(memo.error().is_none());
        assert_eq!(memo.read("a").await.unwrap(), Some(b"alpha".to_vec()));
        assert_eq!(memo.read("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let memo = FileMemorizer::open(&path).await;

        assert!(matches!(
            memo.error(),
            Some(MemorizerError::Serialization(_))
        ));
        // Still usable in memory.
        memo.save("k", b"v".to_vec()).await.unwrap();
        assert_eq!(memo.read("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let memo = FileMemorizer::open(dir.path().join("missing").join("memo.json")).await;

        assert!(matches!(
            memo.save("k", b"v".to_vec()).await,
            Err(MemorizerError::Io(_))
        ));
        assert_eq!(memo.read("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_write_restores_previous_values() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("store");
        tokio::fs::create_dir(&sub).await.unwrap();
        let memo = FileMemorizer::open(sub.join("memo.json")).await;
        memo.save("k", b"old".to_vec()).await.unwrap();

        tokio::fs::remove_dir_all(&sub).await.unwrap();

        assert!(memo.save("k", b"new".to_vec()).await.is_err());
        assert_eq!(memo.read("k").await.unwrap(), Some(b"old".to_vec()));

        assert!(memo.delete("k").await.is_err());
        assert_eq!(memo.read("k").await.unwrap(), Some(b"old".to_vec()));
    }
}
