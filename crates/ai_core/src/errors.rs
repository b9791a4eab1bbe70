//! Error types for the AI Core module

use crate::types::ModelKind;
use thiserror::Error;

/// Errors raised while decoding or validating model artifacts
#[derive(Error, Debug)]
pub enum AiCoreError {
    /// Artifact parameters are structurally invalid
    #[error("Invalid model parameters: {0}")]
    InvalidParameters(String),

    /// Model kind or artifact format not supported
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    /// Artifact bytes are not valid JSON for the kind
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Canonical encoding failed
    #[error("Canonical serialization error: {0}")]
    Canonical(#[from] crate::serde_canon::CanonicalError),
}

/// Result type for AI Core operations
pub type Result<T> = std::result::Result<T, AiCoreError>;

/// Per-model inference failures.
///
/// These never abort an ensemble call; the ensemble excludes the failing kind
/// and carries on with the rest.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    /// Calendar-indexed model invoked without a date
    #[error("{kind} model requires a calendar date")]
    MissingTimestamp { kind: ModelKind },

    /// A composite model lacks one of its components
    #[error("{kind} component '{component}' unavailable: {reason}")]
    ComponentUnavailable {
        kind: ModelKind,
        component: &'static str,
        reason: String,
    },

    /// The kind is configured for the entity but its artifact never loaded
    #[error("{kind} model unavailable: {reason}")]
    Unavailable { kind: ModelKind, reason: String },

    /// Internal execution failure (malformed structure, non-finite output)
    #[error("{kind} model execution failed: {reason}")]
    Execution { kind: ModelKind, reason: String },
}

impl PredictionError {
    /// Kind of the model that failed
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::MissingTimestamp { kind }
            | Self::ComponentUnavailable { kind, .. }
            | Self::Unavailable { kind, .. }
            | Self::Execution { kind, .. } => *kind,
        }
    }

    pub(crate) fn execution(kind: ModelKind, reason: impl Into<String>) -> Self {
        Self::Execution {
            kind,
            reason: reason.into(),
        }
    }
}
