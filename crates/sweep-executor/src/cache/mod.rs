//! Content-addressable store of previously produced changeset specs.
//!
//! Entries are keyed by a task's [`ExecutionCacheKey`]. Implementations must be
//! safe for concurrent use by every in-flight task.

/// In-memory cache storage
pub mod storage;

use async_trait::async_trait;
use sweep_core::{ChangesetSpec, ExecutionCacheKey};

use crate::error::CacheError;

pub use storage::MemoryCache;

/// Contract for execution result caches.
#[async_trait]
pub trait ExecutionCache: Send + Sync {
    /// Returns the spec stored under `key`, if any.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be read.
    async fn get(&self, key: &ExecutionCacheKey) -> Result<Option<ChangesetSpec>, CacheError>;

    /// Stores `spec` under `key`, replacing any previous entry.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be written.
    async fn set(&self, key: &ExecutionCacheKey, spec: &ChangesetSpec) -> Result<(), CacheError>;

    /// Removes the entry stored under `key`. Removing a missing entry succeeds.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be written.
    async fn clear(&self, key: &ExecutionCacheKey) -> Result<(), CacheError>;
}
