use tessera_db_types::DbError;
use tessera_evidence_types::Evidence;
use thiserror::Error;

/// Return type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

#[derive(Debug, Error)]
pub enum PoolError {
    /// The evidence failed verification or block-level validation. This is
    /// the only variant a block validator must treat as fatal to the block.
    #[error("invalid evidence {}: {reason}", evidence.hash())]
    InvalidEvidence {
        evidence: Box<Evidence>,
        reason: String,
    },

    /// The backing store failed.
    #[error("db: {0}")]
    Db(#[from] DbError),

    /// The initial chain state could not be loaded at startup.
    #[error("loading initial chain state: {0}")]
    InitState(String),
}

impl PoolError {
    pub(crate) fn invalid(evidence: &Evidence, reason: impl Into<String>) -> Self {
        Self::InvalidEvidence {
            evidence: Box::new(evidence.clone()),
            reason: reason.into(),
        }
    }

    /// Whether this is an [`PoolError::InvalidEvidence`] rejection.
    pub fn is_invalid_evidence(&self) -> bool {
        matches!(self, Self::InvalidEvidence { .. })
    }
}

/// Failure reported by an external evidence verifier.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct VerificationError {
    pub reason: String,
}

impl VerificationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
