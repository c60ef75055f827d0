//! Key/value store available to scripts and event subscribers.
//!
//! The [`Memorizer`] trait is the only shared mutable resource of the engine.
//! Backends own their locking so every operation is safe under concurrent
//! calls from different message tasks.
//!
//! # Backends
//!
//! - [`MemoryMemorizer`]: process-local map, lost on restart
//! - [`FileMemorizer`]: JSON snapshot persisted on every write
//! - [`NoopMemorizer`]: degraded store used when detection fails

mod file;
mod memory;
mod noop;

use std::sync::Arc;

use async_trait::async_trait;

use crate::foundation::{MemorizerError, MemorizerResult};

pub use file::FileMemorizer;
pub use memory::MemoryMemorizer;
pub use noop::NoopMemorizer;

/// Async key/value contract.
///
/// A missing key is reported as `Ok(None)` by [`read`](Self::read), never as
/// an error.
#[async_trait]
pub trait Memorizer: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    async fn save(&self, key: &str, value: Vec<u8>) -> MemorizerResult<()>;

    /// Reads the value stored under `key`.
    async fn read(&self, key: &str) -> MemorizerResult<Option<Vec<u8>>>;

    /// Overwrites the value stored under `key`.
    async fn update(&self, key: &str, value: Vec<u8>) -> MemorizerResult<()> {
        self.save(key, value).await
    }

    /// Removes `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> MemorizerResult<()>;

    /// Returns the initialization failure of this backend, if any.
    fn error(&self) -> Option<MemorizerError> {
        None
    }
}

/// A shared memorizer trait object.
pub type BoxedMemorizer = Arc<dyn Memorizer>;

#[async_trait]
impl<M: Memorizer + ?Sized> Memorizer for Arc<M> {
    async fn save(&self, key: &str, value: Vec<u8>) -> MemorizerResult<()> {
        (**self).save(key, value).await
    }

    async fn read(&self, key: &str) -> MemorizerResult<Option<Vec<u8>>> {
        (**self).read(key).await
    }

    async fn update(&self, key: &str, value: Vec<u8>) -> MemorizerResult<()> {
        (**self).update(key, value).await
    }

    async fn delete(&self, key: &str) -> MemorizerResult<()> {
        (**self).delete(key).await
    }

    fn error(&self) -> Option<MemorizerError> {
        (**self).error()
    }
}
