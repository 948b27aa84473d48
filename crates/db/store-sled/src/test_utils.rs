//! Helpers for tests that need a throwaway sled engine.

use crate::SledKvStore;

/// Opens a [`SledKvStore`] on a temporary sled database.
pub fn get_test_sled_kv() -> SledKvStore {
    let db = sled::Config::new().temporary(true).open().unwrap();
    SledKvStore::open(&db, "test").unwrap()
}
