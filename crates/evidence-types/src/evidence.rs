use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tessera_primitives::{Buf20, Buf32, TimestampMs};

use crate::{codec, ValidatorInfo};

/// A single signed vote, as referenced by duplicate-vote evidence.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct Vote {
    pub validator_address: Buf20,
    pub height: u64,
    pub round: u32,
    pub block_hash: Buf32,
    pub timestamp: TimestampMs,
    pub signature: Vec<u8>,
}

/// Proof that a validator signed two different blocks at the same height and
/// round.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct DuplicateVoteEvidence {
    pub vote_a: Vote,
    pub vote_b: Vote,

    /// Total voting power of the set at the offending height.
    pub total_voting_power: i64,

    /// The offender's voting power at that height.
    pub validator_power: i64,

    /// Block time at the offending height.
    pub timestamp: TimestampMs,
}

impl DuplicateVoteEvidence {
    pub fn height(&self) -> u64 {
        self.vote_a.height
    }

    pub fn time(&self) -> TimestampMs {
        self.timestamp
    }
}

/// Proof that a subset of validators colluded to convince a light client of a
/// forged header.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct LightClientAttackEvidence {
    /// Hash of the forged header presented to the light client.
    pub conflicting_header_hash: Buf32,

    /// Height of the last header the light client and the chain agree on.
    pub common_height: u64,

    /// Validators that signed the forged header, sorted by voting power.
    ///
    /// Attribution only: two reports of the same attack may disagree here,
    /// so this list is excluded from the evidence fingerprint.
    pub byzantine_validators: Vec<ValidatorInfo>,

    /// Total voting power of the set at the common height.
    pub total_voting_power: i64,

    /// Block time at the common height.
    pub timestamp: TimestampMs,
}

impl LightClientAttackEvidence {
    pub fn height(&self) -> u64 {
        self.common_height
    }

    pub fn time(&self) -> TimestampMs {
        self.timestamp
    }
}

/// Verifiable proof of a validator protocol violation.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub enum Evidence {
    DuplicateVote(DuplicateVoteEvidence),
    LightClientAttack(LightClientAttackEvidence),
}

impl Evidence {
    /// The height at which the misbehavior occurred.
    pub fn height(&self) -> u64 {
        match self {
            Evidence::DuplicateVote(ev) => ev.height(),
            Evidence::LightClientAttack(ev) => ev.height(),
        }
    }

    /// The block time at that height.
    pub fn time(&self) -> TimestampMs {
        match self {
            Evidence::DuplicateVote(ev) => ev.time(),
            Evidence::LightClientAttack(ev) => ev.time(),
        }
    }

    /// Stable fingerprint: sha256 over the canonical encoding.
    pub fn hash(&self) -> Buf32 {
        codec::hash_evidence(self)
    }

    /// Short human-readable tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Evidence::DuplicateVote(_) => "duplicate-vote",
            Evidence::LightClientAttack(_) => "light-client-attack",
        }
    }
}
