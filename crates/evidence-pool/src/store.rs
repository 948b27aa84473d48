//! Store layer: the two evidence keyspaces over the raw KV engine.

use std::sync::Arc;

use tessera_db_types::{DbError, DbResult, KvStore, WriteBatch};
use tessera_evidence_types::{codec, Evidence};

use crate::keys;

/// Typed view of the pending and committed keyspaces.
///
/// Values are the canonical evidence encoding under pending keys, and the
/// encoded commit height under committed keys.
#[derive(Clone)]
pub(crate) struct EvidenceStore {
    db: Arc<dyn KvStore>,
}

impl std::fmt::Debug for EvidenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EvidenceStore")
    }
}

impl EvidenceStore {
    pub(crate) fn new(db: Arc<dyn KvStore>) -> Self {
        Self { db }
    }

    /// Persists `ev` into the pending keyspace. Returns whether the entry is
    /// new, so racing writers agree on who inserted it.
    pub(crate) fn put_pending(&self, ev: &Evidence) -> DbResult<bool> {
        let key = keys::pending_key(ev.height(), &ev.hash());
        let previous = self.db.put(&key, &codec::encode_evidence(ev))?;
        Ok(previous.is_none())
    }

    pub(crate) fn is_pending(&self, ev: &Evidence) -> DbResult<bool> {
        self.db.has(&keys::pending_key(ev.height(), &ev.hash()))
    }

    pub(crate) fn is_committed(&self, ev: &Evidence) -> DbResult<bool> {
        self.db.has(&keys::committed_key(ev.height(), &ev.hash()))
    }

    /// Loads the stored pending copy of `ev`, if any, for the fast-check.
    pub(crate) fn get_pending(&self, ev: &Evidence) -> DbResult<Option<Evidence>> {
        let key = keys::pending_key(ev.height(), &ev.hash());
        match self.db.get(&key)? {
            Some(bytes) => Ok(Some(
                codec::decode_evidence(&bytes).map_err(DbError::codec)?,
            )),
            None => Ok(None),
        }
    }

    /// Writes the committed record for `ev` with the height of the block that
    /// included it.
    pub(crate) fn put_committed(&self, ev: &Evidence, commit_height: u64) -> DbResult<()> {
        let key = keys::committed_key(ev.height(), &ev.hash());
        self.db.put(&key, &codec::encode_height(commit_height))?;
        Ok(())
    }

    /// Iterates the pending keyspace in ascending `(height, hash)` order.
    pub(crate) fn iter_pending(
        &self,
    ) -> DbResult<impl Iterator<Item = DbResult<(Vec<u8>, Evidence)>> + '_> {
        let iter = self.db.iter_prefix(&keys::pending_prefix())?;
        Ok(iter.map(|item| {
            let (key, value) = item?;
            let ev = codec::decode_evidence(&value).map_err(DbError::codec)?;
            Ok((key, ev))
        }))
    }

    /// Atomically and durably deletes a set of pending keys.
    pub(crate) fn delete_pending_batch(&self, keys: Vec<Vec<u8>>) -> DbResult<()> {
        let mut batch = WriteBatch::new();
        for key in keys {
            batch.delete(key);
        }
        self.db.write_batch_sync(batch)
    }
}
