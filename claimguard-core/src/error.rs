//! Error types for claimguard-core.

use thiserror::Error;

/// Result type alias using claimguard-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for session operations
#[derive(Error, Debug)]
pub enum Error {
    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    // Marker errors
    #[error("Invalid background marker: {0}")]
    InvalidMarker(String),

    // Key registry errors
    #[error("Key is reserved for remembered credentials: {0}")]
    KeyConflict(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Check if this error came from the storage backend
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::LockPoisoned | Self::Io(_))
    }
}
