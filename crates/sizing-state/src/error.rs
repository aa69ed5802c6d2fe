//! Errors raised by the sizing state store.
//!
//! redb reports failures through several unrelated error types; each is
//! flattened into a string here so callers only match on which stage of a
//! store operation failed.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    /// The database file could not be created or opened.
    #[error("failed to open state database: {0}")]
    Open(String),

    /// Beginning or committing a transaction failed. A failed commit leaves
    /// the store as it was before the operation.
    #[error("state transaction failed: {0}")]
    Transaction(String),

    #[error("cannot open state table: {0}")]
    Table(String),

    #[error("cannot read state entry: {0}")]
    Read(String),

    #[error("cannot write state entry: {0}")]
    Write(String),

    /// A cluster record, ledger entry or condition could not be encoded.
    #[error("cannot encode state value: {0}")]
    Serialize(String),

    /// A stored value no longer decodes as the expected record type.
    #[error("stored value is corrupt: {0}")]
    Deserialize(String),
}
