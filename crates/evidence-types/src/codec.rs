//! Canonical byte encoding for evidence values.
//!
//! Everything the pool persists or hashes goes through this module, so that
//! the on-disk form, the gossip form, and the fingerprint input are all the
//! same bytes.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use tessera_primitives::Buf32;
use thiserror::Error;

use crate::Evidence;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed evidence bytes: {0}")]
    MalformedEvidence(String),

    #[error("malformed height bytes: {0}")]
    MalformedHeight(String),
}

/// Canonical encoding of a piece of evidence.
///
/// Encoding is total over the evidence types; a failure here is a programming
/// bug, so this panics rather than returning an error (the decode direction
/// handles untrusted bytes and is fallible).
pub fn encode_evidence(ev: &Evidence) -> Vec<u8> {
    to_canonical_bytes(ev)
}

/// Decodes evidence from its canonical encoding.
pub fn decode_evidence(bytes: &[u8]) -> Result<Evidence, CodecError> {
    Evidence::try_from_slice(bytes).map_err(|e| CodecError::MalformedEvidence(e.to_string()))
}

/// Size of the canonical encoding, in bytes.
pub fn encoded_size(ev: &Evidence) -> u64 {
    encode_evidence(ev).len() as u64
}

/// Canonical size of an evidence list: the sum of its members' encodings.
pub fn list_size(evs: &[Evidence]) -> u64 {
    evs.iter().map(encoded_size).sum()
}

/// Stable fingerprint of a piece of evidence.
///
/// Duplicate votes hash over the full canonical encoding. Light-client
/// attacks hash over the attack identity (forged header + common height)
/// only: the byzantine-validator attribution may legitimately differ between
/// two reports of the same attack and must not fork the fingerprint.
pub fn hash_evidence(ev: &Evidence) -> Buf32 {
    let digest = match ev {
        Evidence::DuplicateVote(_) => Sha256::digest(encode_evidence(ev)),
        Evidence::LightClientAttack(attack) => {
            let mut hasher = Sha256::new();
            hasher.update(attack.conflicting_header_hash.as_slice());
            hasher.update(attack.common_height.to_be_bytes());
            hasher.finalize()
        }
    };
    Buf32::new(digest.into())
}

/// Encoding for the commit-height value stored under committed keys.
pub fn encode_height(height: u64) -> Vec<u8> {
    to_canonical_bytes(&height)
}

/// Decodes a commit-height value.
pub fn decode_height(bytes: &[u8]) -> Result<u64, CodecError> {
    u64::try_from_slice(bytes).map_err(|e| CodecError::MalformedHeight(e.to_string()))
}

fn to_canonical_bytes<T: BorshSerialize>(value: &T) -> Vec<u8> {
    borsh::to_vec(value).expect("codec: canonical encoding cannot fail")
}
