use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::Memorizer;
use crate::foundation::MemorizerResult;

/// In-process memorizer backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryMemorizer {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryMemorizer {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl Memorizer for MemoryMemorizer {
    async fn save(&self, key: &str, value: Vec<u8>) -> MemorizerResult<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn read(&self, key: &str) -> MemorizerResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> MemorizerResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_save_read_delete() {
        let memo = MemoryMemorizer::new();

        memo.save("k", b"v1".to_vec()).await.unwrap();
        assert_eq!(memo.read("k").await.unwrap(), Some(b"v1".to_vec()));

        memo.update("k", b"v2".to_vec()).await.unwrap();
        assert_eq!(memo.read("k").await.unwrap(), Some(b"v2".to_vec()));

        memo.delete("k").await.unwrap();
        assert_eq!(memo.read("k").await.unwrap(), None);
        assert!(memo.is_empty());
        assert!(memo.error().is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let memo = MemoryMemorizer::new();
        assert_eq!(memo.read("nothing").await.unwrap(), None);
        memo.delete("nothing").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_on_distinct_keys() {
        let memo = Arc::new(MemoryMemorizer::new());

        let mut handles = Vec::new();
        for i in 0..32 {
            let memo = memo.clone();
            handles.push(tokio::spawn(async move {
                memo.save(&format!("key-{i}"), vec![i as u8]).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(memo.len(), 32);
        for i in 0..32 {
            assert_eq!(
                memo.read(&format!("key-{i}")).await.unwrap(),
                Some(vec![i as u8])
            );
        }
    }
}
