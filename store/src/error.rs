use thiserror::Error;

/// Errors shared by every storage trait.
///
/// `NotFound` and `Duplicate` are part of the traits' contracts — callers
/// match on them (idempotent redelivery, flag updates on missing rows).
/// The other variants are backend failures surfaced for logging.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no such key: {0}")]
    NotFound(String),

    #[error("key already present: {0}")]
    Duplicate(String),

    #[error("storage backend: {0}")]
    Backend(String),

    #[error("record did not (de)serialize: {0}")]
    Serialization(String),

    #[error("store is corrupted: {0}")]
    Corruption(String),
}
