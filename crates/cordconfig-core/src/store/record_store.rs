// # Record Store
//
// Concurrent in-memory map from device id to one record family.
//
// ## Consistency
//
// - Each key is replaced atomically: a reader sees either the old or the new
//   record, never a mix.
// - `all_values()` copies the records out, so a snapshot never changes after
//   it is returned.
// - Missing keys are not errors: `get` and `remove` return `None`.
//
// ## Writers
//
// Only the config listener mutates a store. Readers can be on any thread
// and never need external locking.

use dashmap::DashMap;
use std::collections::HashSet;
use std::hash::Hash;

use crate::model::DeviceId;

/// Concurrent device-id keyed record map
///
/// # Example
///
/// ```rust
/// use cordconfig_core::store::RecordStore;
/// use cordconfig_core::model::DeviceId;
///
/// let store: RecordStore<String> = RecordStore::new();
/// let device = DeviceId::new("of:1");
///
/// store.put(device.clone(), "uplink=1".to_string());
/// assert_eq!(store.get(&device), Some("uplink=1".to_string()));
///
/// let snapshot = store.all_values();
/// store.remove(&device);
/// assert_eq!(snapshot.len(), 1);
/// assert!(store.is_empty());
/// ```
#[derive(Debug)]
pub struct RecordStore<R> {
    records: DashMap<DeviceId, R>,
}

impl<R> RecordStore<R>
where
    R: Clone + Eq + Hash,
{
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Insert or replace the record for `key`, returning the replaced one
    pub fn put(&self, key: DeviceId, record: R) -> Option<R> {
        self.records.insert(key, record)
    }

    /// Remove the record for `key`
    pub fn remove(&self, key: &DeviceId) -> Option<R> {
        self.records.remove(key).map(|(_, record)| record)
    }

    /// Current record for `key`
    pub fn get(&self, key: &DeviceId) -> Option<R> {
        self.records.get(key).map(|entry| entry.value().clone())
    }

    /// Whether a record is stored for `key`
    pub fn contains(&self, key: &DeviceId) -> bool {
        self.records.contains_key(key)
    }

    /// Copy of every record currently stored
    pub fn all_values(&self) -> HashSet<R> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Remove every record, returning what was removed
    ///
    /// Keys are removed one at a time, so concurrent readers still see
    /// whole records.
    pub fn drain(&self) -> Vec<R> {
        let keys: Vec<DeviceId> = self.records.iter().map(|entry| entry.key().clone()).collect();
        keys.iter().filter_map(|key| self.remove(key)).collect()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R> Default for RecordStore<R>
where
    R: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> DeviceId {
        DeviceId::new(id)
    }

    #[test]
    fn test_record_store_basic() {
        let store = RecordStore::new();

        // Initially empty
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);

        // Put and get
        assert_eq!(store.put(key("of:1"), 10u32), None);
        assert_eq!(store.get(&key("of:1")), Some(10));
        assert!(store.contains(&key("of:1")));

        // Replace returns the previous record
        assert_eq!(store.put(key("of:1"), 11), Some(10));
        assert_eq!(store.len(), 1);

        // Remove
        assert_eq!(store.remove(&key("of:1")), Some(11));
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_keys_are_not_errors() {
        let store: RecordStore<u32> = RecordStore::new();

        assert_eq!(store.get(&key("of:404")), None);
        assert_eq!(store.remove(&key("of:404")), None);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let store = RecordStore::new();
        store.put(key("of:1"), 1u32);
        store.put(key("of:2"), 2);

        let snapshot = store.all_values();

        store.put(key("of:3"), 3);
        store.remove(&key("of:1"));

        assert_eq!(snapshot, HashSet::from([1, 2]));
        assert_eq!(store.all_values(), HashSet::from([2, 3]));
    }

    #[test]
    fn test_drain() {
        let store = RecordStore::new();
        store.put(key("of:1"), 1u32);
        store.put(key("of:2"), 2);

        let mut drained = store.drain();
        drained.sort();

        assert_eq!(drained, vec![1, 2]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_readers_see_whole_records() {
        let store = std::sync::Arc::new(RecordStore::new());
        store.put(key("of:1"), (0u32, 0u32));

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 1..1000u32 {
                    store.put(key("of:1"), (i, i));
                }
            })
        };

        for _ in 0..1000 {
            if let Some((a, b)) = store.get(&key("of:1")) {
                assert_eq!(a, b);
            }
        }

        writer.join().unwrap();
        assert_eq!(store.get(&key("of:1")), Some((999, 999)));
    }
}
