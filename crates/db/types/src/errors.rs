use thiserror::Error;

/// Return type for KV engine operations.
pub type DbResult<T> = Result<T, DbError>;

#[derive(Clone, Debug, Error)]
pub enum DbError {
    /// The backing engine failed an I/O or storage operation.
    #[error("backend: {0}")]
    Backend(String),

    /// A stored value failed to decode.
    #[error("codec: {0}")]
    Codec(String),
}

impl DbError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }

    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }
}
