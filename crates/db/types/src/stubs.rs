//! In-memory [`KvStore`] stub for tests.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use crate::{BatchOp, DbResult, KvIter, KvStore, WriteBatch};

/// A [`KvStore`] backed by a `BTreeMap`.
///
/// Prefix iteration snapshots the matching range at call time, so holding an
/// iterator does not block writers.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across all keyspaces.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> DbResult<Option<Vec<u8>>> {
        Ok(self.map.write().insert(key.to_vec(), value.to_vec()))
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        self.map.write().remove(key);
        Ok(())
    }

    fn write_batch_sync(&self, batch: WriteBatch) -> DbResult<()> {
        let mut map = self.map.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> DbResult<KvIter<'_>> {
        let map = self.map.read();
        let entries: Vec<_> = map
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| Ok((k.clone(), v.clone())))
            .collect();
        Ok(Box::new(entries.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let db = MemoryKvStore::new();
        assert_eq!(db.put(b"k1", b"v1").unwrap(), None);
        assert_eq!(db.put(b"k1", b"v2").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(db.get(b"k1").unwrap(), Some(b"v2".to_vec()));
        assert!(db.has(b"k1").unwrap());

        db.delete(b"k1").unwrap();
        assert_eq!(db.get(b"k1").unwrap(), None);
        assert!(!db.has(b"k1").unwrap());
    }

    #[test]
    fn test_iter_prefix_is_ordered_and_bounded() {
        let db = MemoryKvStore::new();
        db.put(&[10, 0, 2], b"c").unwrap();
        db.put(&[10, 0, 1], b"b").unwrap();
        db.put(&[9, 0, 9], b"a").unwrap();
        db.put(&[11, 0, 0], b"d").unwrap();

        let keys: Vec<_> = db
            .iter_prefix(&[10])
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(keys, vec![vec![10, 0, 1], vec![10, 0, 2]]);
    }

    #[test]
    fn test_batch_applies_all_ops() {
        let db = MemoryKvStore::new();
        db.put(b"stale", b"x").unwrap();

        let mut batch = WriteBatch::new();
        batch.put(b"fresh".to_vec(), b"y".to_vec());
        batch.delete(b"stale".to_vec());
        db.write_batch_sync(batch).unwrap();

        assert!(db.has(b"fresh").unwrap());
        assert!(!db.has(b"stale").unwrap());
    }
}
