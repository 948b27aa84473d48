//! Interface types for the key-value engines backing tessera components.
//!
//! Engines are ordered byte-keyed stores with atomic durable batches. The
//! concrete production engine lives in `tessera-db-store-sled`; an in-memory
//! stub for tests is available behind the `stubs` feature.

mod errors;
mod kv;

#[cfg(feature = "stubs")]
pub mod stubs;

pub use errors::{DbError, DbResult};
pub use kv::{BatchOp, KvIter, KvPair, KvStore, WriteBatch};
