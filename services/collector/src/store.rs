//! Key-value store seam
//!
//! The collector persists one JSON record per detector key. The store
//! technology itself is an external service; this module defines the narrow
//! interface the retention writer needs (get / set / exists over string
//! keys and values) plus an in-memory backend used by tests, simulation,
//! and standalone runs.

use async_trait::async_trait;
use dashmap::DashMap;

use types::errors::StoreError;

/// Narrow persistence interface for per-detector records.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the raw record for a key, if present.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write the raw record for a key, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Whether a record exists for the key.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// In-memory store backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.contains_key(key))
    }
}
