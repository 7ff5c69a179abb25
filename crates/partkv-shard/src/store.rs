//! In-memory mapping owned by one shard

use partkv_common::{Key, ShardSpec, Value};
use std::collections::HashMap;

/// Key-value mapping for a single partition
#[derive(Debug)]
pub struct ShardStore {
    spec: ShardSpec,
    entries: HashMap<Key, Value>,
}

impl ShardStore {
    /// Create an empty store for the given partition
    pub fn new(spec: ShardSpec) -> Self {
        Self {
            spec,
            entries: HashMap::new(),
        }
    }

    /// Look up a key
    pub fn get(&self, key: Key) -> Option<&Value> {
        self.entries.get(&key)
    }

    /// Insert or overwrite a key, returning the previous value
    pub fn put(&mut self, key: Key, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn spec(&self) -> ShardSpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partkv_common::{PartitionIndex, ShardCount};

    fn store() -> ShardStore {
        ShardStore::new(ShardSpec::new(
            ShardCount::new(8).unwrap(),
            PartitionIndex::new(1),
        ))
    }

    #[test]
    fn test_get_missing() {
        let store = store();
        assert!(store.get(Key::new(1)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_and_overwrite() {
        let mut store = store();
        assert_eq!(store.put(Key::new(9), "a".to_string()), None);
        assert_eq!(store.put(Key::new(9), "b".to_string()), Some("a".to_string()));
        assert_eq!(store.get(Key::new(9)).map(String::as_str), Some("b"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_no_ownership_check() {
        // Key 2 routes to partition 2, but the store accepts whatever it is given.
        let mut store = store();
        store.put(Key::new(2), String::new());
        assert_eq!(store.get(Key::new(2)).map(String::as_str), Some(""));
        assert!(!store.spec().owns(Key::new(2)));
    }
}
