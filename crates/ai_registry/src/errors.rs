//! Error types for the AI Registry module

use gasbal_ai_core::{AiCoreError, ModelKind};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by artifact stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// No manifest exists for the entity
    #[error("Entity not found in store: {0}")]
    EntityNotFound(String),

    /// Manifest lists the kind but its artifact is absent
    #[error("Artifact not found: {entity}/{kind}")]
    ArtifactNotFound { entity: String, kind: ModelKind },

    /// Entity key cannot be mapped to a storage location
    #[error("Invalid entity key: {0:?}")]
    InvalidEntityKey(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Canonical encoding failed
    #[error("Canonical serialization error: {0}")]
    Canonical(#[from] gasbal_ai_core::serde_canon::CanonicalError),
}

/// Errors that can occur in the AI Registry module
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Entity has no manifest
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Loading did not complete before the caller's deadline
    #[error("Loading models for {entity} exceeded {timeout:?}")]
    LoadTimeout { entity: String, timeout: Duration },

    /// Artifact bytes do not match the digest recorded in the manifest
    #[error("Hash mismatch for {entity}/{kind}: expected {expected}, got {actual}")]
    HashMismatch {
        entity: String,
        kind: ModelKind,
        expected: String,
        actual: String,
    },

    /// Manifest is internally inconsistent
    #[error("Invalid manifest for {entity}: {reason}")]
    InvalidManifest { entity: String, reason: String },

    /// Artifact failed to decode into a model
    #[error("Model decode error: {0}")]
    Decode(#[from] AiCoreError),

    /// Store error
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound(_) | Self::Store(StoreError::EntityNotFound(_))
        )
    }
}

/// Result type for AI Registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Result type for artifact store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
