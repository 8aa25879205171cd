//! Error types for Mend core operations.
//!
//! Errors are descriptive at the core level; the CLI layer maps these
//! to user-friendly messages and exit codes. No variant ever carries
//! plaintext or key bytes.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Mend operations.
pub type Result<T> = std::result::Result<T, MendError>;

/// Core error type for Mend operations.
#[derive(Debug, Error)]
pub enum MendError {
    /// The crypto backend refused to generate a key of this size
    #[error("Unsupported key size: {bits} bits")]
    UnsupportedKeySize { bits: usize },

    /// Key bytes could not be parsed as a standard key encoding
    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Wrong key, corrupted ciphertext or bad padding (indistinguishable)
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Short read at a framing boundary
    #[error("Malformed log: {0}")]
    MalformedLog(String),

    /// Password does not match the stored pass-check
    #[error("Incorrect password")]
    IncorrectPassword,

    /// Encryption attempted before setup
    #[error("No public key configured; run setup first")]
    MissingPublicKey,

    /// Decryption attempted while no working key material exists
    #[error("Private key is locked; unlock first")]
    Locked,

    /// A required setting is absent
    #[error("Missing setting: {0}")]
    MissingSetting(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Lock could not confirm that working key material is gone
    #[error("Key material still present after secure delete: {}", .0.display())]
    KeyMaterialRemains(PathBuf),

    /// Underlying stream or filesystem failure
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl MendError {
    /// Build a `MalformedLog` error.
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        MendError::MalformedLog(message.into())
    }
}
