//! Key/value stores backing sessions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

/// A store of JSON values keyed by string.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn exists(&self, key: &str) -> bool;
    fn set(&self, key: &str, data: Value);
    fn delete(&self, key: &str);
}

/// Process-local store. Data is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: Mutex<HashMap<String, Value>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Store for InMemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries().get(key).cloned()
    }

    fn exists(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    fn set(&self, key: &str, data: Value) {
        self.entries().insert(key.to_string(), data);
    }

    fn delete(&self, key: &str) {
        self.entries().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryStore::new();
        assert!(!store.exists("a"));
        store.set("a", json!({"n": 1}));
        assert!(store.exists("a"));
        assert_eq!(store.get("a"), Some(json!({"n": 1})));
        store.set("a", json!({"n": 2}));
        assert_eq!(store.len(), 1);
        store.delete("a");
        assert!(store.get("a").is_none());
        assert!(store.is_empty());
    }
}
