//! Seams to the host node: state store, block store, and the cryptographic
//! verifier. The pool orchestrates these; it implements none of them.

use tessera_evidence_types::{ChainState, Evidence};
use tessera_primitives::{Buf32, TimestampMs};

use crate::errors::VerificationError;

/// Source of the committed chain state at startup.
pub trait StateStore: Send + Sync {
    fn load(&self) -> anyhow::Result<ChainState>;
}

/// Header metadata the verifier needs from the block store.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockMeta {
    pub height: u64,
    pub time: TimestampMs,
    pub block_hash: Buf32,
}

/// Read-only access to finalized headers.
pub trait BlockStore: Send + Sync {
    /// The canonical header metadata at `height`, if the block exists.
    fn block_meta(&self, height: u64) -> Option<BlockMeta>;
}

/// Cryptographic verification of a single piece of evidence.
///
/// Implementations check signatures, validator membership, and (for
/// light-client attacks) run the bisection against stored headers. The pool
/// only enforces freshness and dedup around this.
pub trait EvidenceVerifier: Send + Sync {
    fn verify(
        &self,
        evidence: &Evidence,
        state: &ChainState,
        blocks: &dyn BlockStore,
    ) -> Result<(), VerificationError>;
}
