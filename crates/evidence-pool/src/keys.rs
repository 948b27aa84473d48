//! Key layout for the two evidence keyspaces.
//!
//! Keys are `[prefix][height be64][hash]`, which sorts a prefix scan by
//! ascending `(height, hash)`. The committed tag sorts below the pending tag
//! so the keyspaces never interleave.

use tessera_primitives::Buf32;

/// Keyspace tag for evidence whose including block has been finalized.
pub(crate) const PREFIX_COMMITTED: u8 = 9;

/// Keyspace tag for evidence awaiting inclusion in a block.
pub(crate) const PREFIX_PENDING: u8 = 10;

const KEY_LEN: usize = 1 + 8 + Buf32::LEN;

fn evidence_key(prefix: u8, height: u64, hash: &Buf32) -> Vec<u8> {
    let mut key = Vec::with_capacity(KEY_LEN);
    key.push(prefix);
    key.extend_from_slice(&height.to_be_bytes());
    key.extend_from_slice(hash.as_slice());
    key
}

pub(crate) fn pending_key(height: u64, hash: &Buf32) -> Vec<u8> {
    evidence_key(PREFIX_PENDING, height, hash)
}

pub(crate) fn committed_key(height: u64, hash: &Buf32) -> Vec<u8> {
    evidence_key(PREFIX_COMMITTED, height, hash)
}

pub(crate) fn pending_prefix() -> [u8; 1] {
    [PREFIX_PENDING]
}
