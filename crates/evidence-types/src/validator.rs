use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tessera_primitives::{Buf20, Buf32};

/// Identity and weight of a validator named in a piece of evidence.
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
pub struct ValidatorInfo {
    /// Address the validator signs under.
    pub address: Buf20,

    /// Voting power at the height the misbehavior occurred.
    pub voting_power: i64,
}

/// A validator entry in the active set.
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
pub struct Validator {
    pub address: Buf20,
    pub pub_key: Buf32,
    pub voting_power: i64,
}

impl Validator {
    pub fn info(&self) -> ValidatorInfo {
        ValidatorInfo {
            address: self.address,
            voting_power: self.voting_power,
        }
    }
}

/// The active validator set at some height.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
}

impl ValidatorSet {
    pub fn new(validators: Vec<Validator>) -> Self {
        Self { validators }
    }

    pub fn empty() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Looks up a validator by address.
    pub fn get_by_address(&self, address: &Buf20) -> Option<&Validator> {
        self.validators.iter().find(|v| v.address == *address)
    }

    /// Sum of the voting power of all members.
    pub fn total_voting_power(&self) -> i64 {
        self.validators.iter().map(|v| v.voting_power).sum()
    }
}
