//! Key/value store contract.
//!
//! # Responsibilities
//! - String keys and values, no ordering semantics beyond `range`
//! - Single `put`/`remove` atomic with respect to concurrent reads
//! - `replace` moves a value to a new key as one transaction

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use thiserror::Error;

/// Errors raised by a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("stored value is not UTF-8 for key '{0}'")]
    Encoding(String),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A durable string key/value store.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`, returning the previous value.
    fn remove(&self, key: &str) -> StoreResult<Option<String>>;

    /// Every entry, ordered by key.
    fn range(&self) -> StoreResult<BTreeMap<String, String>>;

    /// Remove `old_key` and write `value` under `new_key` in one transaction.
    ///
    /// On error neither change is visible.
    fn replace(&self, old_key: &str, new_key: &str, value: &str) -> StoreResult<()>;
}

/// In-process store used by tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, to exercise error paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store is read-only".into()));
        }
        Ok(())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check_writable()?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_writable()?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        Ok(entries.remove(key))
    }

    fn range(&self) -> StoreResult<BTreeMap<String, String>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.clone())
    }

    fn replace(&self, old_key: &str, new_key: &str, value: &str) -> StoreResult<()> {
        self.check_writable()?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(old_key);
        entries.insert(new_key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_operations() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);

        store.put("a", "1").unwrap();
        store.put("b", "2").unwrap();
        store.put("a", "3").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("3"));

        assert_eq!(store.remove("b").unwrap().as_deref(), Some("2"));
        assert_eq!(store.remove("b").unwrap(), None);

        store.replace("a", "c", "3").unwrap();
        let all = store.range().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("c").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_failed_writes_leave_state_untouched() {
        let store = MemoryStore::new();
        store.put("a", "1").unwrap();
        store.set_fail_writes(true);

        assert!(store.put("b", "2").is_err());
        assert!(store.replace("a", "b", "1").is_err());
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").unwrap(), None);
    }
}
