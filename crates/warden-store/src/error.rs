//! Error types for the store.

use thiserror::Error;

/// Errors that can occur when reading or writing persisted state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure on the backing file.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be serialized or deserialized.
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
