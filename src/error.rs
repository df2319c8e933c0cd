//! Error taxonomy for the county market core.

use thiserror::Error;

/// Result type alias using `MarketError`.
pub type MarketResult<T> = std::result::Result<T, MarketError>;

/// Coarse classification used by callers to decide how to render a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed caller input (bad letter, bad date, empty id list where one is required).
    Validation,
    /// Well-formed request with no backing data.
    NotFound,
    /// Backing store returned a row that cannot be shaped.
    Schema,
    /// Storage, IO or configuration failure.
    Internal,
}

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("ValidationError: {0}")]
    Validation(String),

    #[error("NotFoundError: {0}")]
    NotFound(String),

    #[error("SchemaError: {0}")]
    Schema(String),

    #[error("ConfigError: {0}")]
    Config(String),

    /// Invariant broken inside this process (e.g. a poisoned store lock).
    #[error("InternalError: {0}")]
    Internal(String),

    #[error("StoreError: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("CsvError: {0}")]
    Csv(#[from] csv::Error),

    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
}

impl MarketError {
    pub fn validation(msg: impl Into<String>) -> Self {
        MarketError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        MarketError::NotFound(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        MarketError::Schema(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::Validation(_) => ErrorKind::Validation,
            MarketError::NotFound(_) => ErrorKind::NotFound,
            MarketError::Schema(_) => ErrorKind::Schema,
            MarketError::Config(_)
            | MarketError::Internal(_)
            | MarketError::Store(_)
            | MarketError::Csv(_)
            | MarketError::Io(_) => ErrorKind::Internal,
        }
    }
}
