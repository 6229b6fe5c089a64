//! Error types for the classification decision engine

use crate::models::{DocumentType, SignalSource};
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for classification operations
pub type Result<T> = std::result::Result<T, ClassificationError>;

#[derive(Error, Debug)]
pub enum ClassificationError {

    // =============================
    // Per-document errors (isolated to one document)
    // =============================

    #[error("Invalid {signal_source} signal: {reason}")]
    InvalidSignal {
        signal_source: SignalSource,
        reason: String,
    },

    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),

    // =============================
    // Collaborator errors (decision already computed)
    // =============================

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Review queue error: {0}")]
    ReviewQueue(String),

    #[error("Decision record not found: {0}")]
    RecordNotFound(Uuid),

    // =============================
    // Startup errors (fatal)
    // =============================

    #[error("Invalid thresholds for {document_type}: high {high} must exceed medium {medium}, both within [0, 1]")]
    InvalidThreshold {
        document_type: DocumentType,
        high: f64,
        medium: f64,
    },

    #[error("No threshold entry for {0}")]
    MissingThreshold(DocumentType),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ClassificationError {
    pub fn invalid_signal(signal_source: SignalSource, reason: impl Into<String>) -> Self {
        Self::InvalidSignal {
            signal_source,
            reason: reason.into(),
        }
    }

    /// Startup errors abort the process; everything else is scoped to one document.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidThreshold { .. } | Self::MissingThreshold(_) | Self::Config(_)
        )
    }
}
