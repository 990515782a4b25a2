use thiserror::Error;

/// Errors produced by datastore and repository operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure: create/read/write/remove/list.
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    /// Record could not be encoded.
    #[error("serialize failed: {reason}")]
    Serialize { reason: String },
    /// File content is not a valid record.
    #[error("deserialize failed: {reason}")]
    Deserialize { reason: String },
    /// Cipher failure while encrypting.
    #[error("encrypt failed: {reason}")]
    Encrypt { reason: String },
    /// Cipher failure or undersized ciphertext while decrypting.
    #[error("decrypt failed: {reason}")]
    Decrypt { reason: String },
}
