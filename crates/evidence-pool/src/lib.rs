//! The per-node evidence pool.
//!
//! Collects proofs of validator misbehavior, verifies and persists them,
//! deduplicates and expires them, and serves them to the block proposer and
//! the gossip layer. Pending evidence lives in a prefixed keyspace of the
//! backing KV engine mirrored by an in-memory broadcast queue; once the block
//! including a piece of evidence is finalized, the pending copy is dropped
//! and a committed record is retained in a second keyspace.

mod errors;
mod keys;
mod pool;
mod queue;
mod store;
mod traits;

pub use errors::{PoolError, PoolResult, VerificationError};
pub use pool::EvidencePool;
pub use queue::{EvidenceQueue, EvidenceRef};
pub use traits::{BlockMeta, BlockStore, EvidenceVerifier, StateStore};
