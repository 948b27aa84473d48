use tessera_db_types::{BatchOp, DbError, DbResult, KvIter, KvStore, WriteBatch};

/// A [`KvStore`] over a single sled tree.
///
/// Batches are applied through [`sled::Tree::apply_batch`] followed by a
/// flush, giving the atomic-and-durable contract the trait requires.
/// Individual puts are not flushed; callers needing a durability barrier go
/// through [`KvStore::write_batch_sync`].
#[derive(Clone, Debug)]
pub struct SledKvStore {
    tree: sled::Tree,
}

impl SledKvStore {
    /// Opens (or creates) the named tree on `db`.
    pub fn open(db: &sled::Db, tree_name: &str) -> DbResult<Self> {
        let tree = db.open_tree(tree_name).map_err(DbError::backend)?;
        Ok(Self { tree })
    }
}

impl KvStore for SledKvStore {
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        let value = self.tree.get(key).map_err(DbError::backend)?;
        Ok(value.map(|ivec| ivec.to_vec()))
    }

    fn has(&self, key: &[u8]) -> DbResult<bool> {
        self.tree.contains_key(key).map_err(DbError::backend)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> DbResult<Option<Vec<u8>>> {
        let previous = self.tree.insert(key, value).map_err(DbError::backend)?;
        Ok(previous.map(|ivec| ivec.to_vec()))
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        self.tree.remove(key).map_err(DbError::backend)?;
        Ok(())
    }

    fn write_batch_sync(&self, batch: WriteBatch) -> DbResult<()> {
        let mut sled_batch = sled::Batch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => sled_batch.insert(key, value),
                BatchOp::Delete { key } => sled_batch.remove(key),
            }
        }
        self.tree.apply_batch(sled_batch).map_err(DbError::backend)?;
        self.tree.flush().map_err(DbError::backend)?;
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> DbResult<KvIter<'_>> {
        let iter = self.tree.scan_prefix(prefix).map(|item| {
            item.map(|(k, v)| (k.to_vec(), v.to_vec()))
                .map_err(DbError::backend)
        });
        Ok(Box::new(iter))
    }
}
