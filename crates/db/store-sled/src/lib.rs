//! sled-backed [`KvStore`](tessera_db_types::KvStore) engine.

mod kv;

#[cfg(feature = "test_utils")]
pub mod test_utils;

pub use kv::SledKvStore;
