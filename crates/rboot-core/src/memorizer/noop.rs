use async_trait::async_trait;
use tracing::trace;

use super::Memorizer;
use crate::foundation::{MemorizerError, MemorizerResult};

/// Degraded memorizer that stores nothing.
///
/// Used by the runtime when the configured backend is unknown or fails to
/// initialize; [`error`](Memorizer::error) reports the reason.
#[derive(Debug, Clone)]
pub struct NoopMemorizer {
    reason: String,
}

impl NoopMemorizer {
    /// Creates a no-op store explaining why no real backend is available.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Memorizer for NoopMemorizer {
    async fn save(&self, key: &str, _value: Vec<u8>) -> MemorizerResult<()> {
        trace!(key, "Dropping write to no-op memorizer");
        Ok(())
    }

    async fn read(&self, _key: &str) -> MemorizerResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn delete(&self, _key: &str) -> MemorizerResult<()> {
        Ok(())
    }

    fn error(&self) -> Option<MemorizerError> {
        Some(MemorizerError::Unavailable(self.reason.clone()))
    }
}
