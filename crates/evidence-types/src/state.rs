use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tessera_primitives::TimestampMs;

use crate::ValidatorSet;

/// Consensus parameters governing evidence handling.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Arbitrary,
    BorshDeserialize,
    BorshSerialize,
    Deserialize,
    Serialize,
)]
pub struct EvidenceParams {
    /// Pending evidence older than this many blocks is eligible for expiry.
    pub max_age_num_blocks: u64,

    /// Pending evidence older than this duration is eligible for expiry.
    /// Both age bounds must be exceeded for evidence to expire.
    pub max_age_duration_ms: u64,
}

/// Snapshot of the committed chain state the pool operates against.
///
/// Produced by the state store at startup and handed to the pool by the
/// consensus driver on every committed block thereafter.
#[derive(Clone, Debug, Eq, PartialEq, Arbitrary, Deserialize, Serialize)]
pub struct ChainState {
    /// Height of the latest finalized block.
    pub last_block_height: u64,

    /// Block time of the latest finalized block.
    pub last_block_time: TimestampMs,

    /// Evidence consensus parameters at that height.
    pub evidence_params: EvidenceParams,

    /// Active validator set, as needed by the evidence verifier.
    pub validators: ValidatorSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_snapshot_clone_is_independent() {
        let state = ChainState {
            last_block_height: 5,
            last_block_time: 1_000,
            evidence_params: EvidenceParams {
                max_age_num_blocks: 20,
                max_age_duration_ms: 48 * 3600 * 1000,
            },
            validators: ValidatorSet::empty(),
        };
        let mut other = state.clone();
        other.last_block_height = 6;
        assert_eq!(state.last_block_height, 5);
    }
}
