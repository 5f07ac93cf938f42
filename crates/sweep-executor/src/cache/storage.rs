//! In-memory cache backend.

use std::collections::HashMap;

use async_trait::async_trait;
use sweep_core::{ChangesetSpec, ExecutionCacheKey};
use tokio::sync::RwLock;

use super::ExecutionCache;
use crate::error::CacheError;

/// Execution cache held in process memory.
#[derive(Debug, Default)]
pub struct MemoryCache {
    storage: RwLock<HashMap<ExecutionCacheKey, ChangesetSpec>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries in the cache
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Returns whether the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }
}

#[async_trait]
impl ExecutionCache for MemoryCache {
    async fn get(&self, key: &ExecutionCacheKey) -> Result<Option<ChangesetSpec>, CacheError> {
        Ok(self.storage.read().await.get(key).cloned())
    }

    async fn set(&self, key: &ExecutionCacheKey, spec: &ChangesetSpec) -> Result<(), CacheError> {
        self.storage.write().await.insert(key.clone(), spec.clone());
        Ok(())
    }

    async fn clear(&self, key: &ExecutionCacheKey) -> Result<(), CacheError> {
        self.storage.write().await.remove(key);
        Ok(())
    }
}
