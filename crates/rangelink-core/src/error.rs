use thiserror::Error;

/// Shared lightweight error type for core operations.
#[derive(Debug, Error)]
pub enum RangelinkError {
    /// Invalid caller input or malformed field value.
    #[error("{0}")]
    InvalidInput(&'static str),
    /// Decode/parsing failure.
    #[error("decode error: {0}")]
    Decode(&'static str),
}
