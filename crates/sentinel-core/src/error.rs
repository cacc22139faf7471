//! Error types for the forensics pipeline.

use thiserror::Error;

/// Result type alias using `EngineError`.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur during batch analysis.
///
/// Only [`EngineError::MalformedInput`] aborts a batch; every other failure
/// is contained at the detector boundary and surfaces as diagnostics.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input record failed validation (non-positive amount, unparseable
    /// timestamp, missing field). Fatal for the batch.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A detector exhausted its operation budget. Non-fatal; the detector
    /// returns the partial results it accumulated.
    #[error("{detector} exhausted its operation budget after {ops} ops")]
    BudgetExceeded {
        /// Detector identifier.
        detector: String,
        /// Operations performed before the budget ran out.
        ops: u64,
    },

    /// The batch contained zero usable transactions. The engine answers
    /// with an empty report instead of propagating this to the caller.
    #[error("empty graph: batch contains no usable transactions")]
    EmptyGraph,

    /// A detector failed internally. Isolated: the pipeline logs, counts
    /// the failure, and continues with an empty result for that detector.
    #[error("detector {name} failed: {reason}")]
    DetectorFailed {
        /// Detector identifier.
        name: String,
        /// Failure description.
        reason: String,
    },

    /// Report serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Create a malformed-input error.
    #[must_use]
    pub fn malformed(msg: impl Into<String>) -> Self {
        EngineError::MalformedInput(msg.into())
    }

    /// Create a detector failure error.
    #[must_use]
    pub fn detector(name: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::DetectorFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a budget-exceeded error.
    #[must_use]
    pub fn budget(detector: impl Into<String>, ops: u64) -> Self {
        EngineError::BudgetExceeded {
            detector: detector.into(),
            ops,
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::Config(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        EngineError::Internal(msg.into())
    }

    /// Returns true if this error aborts the batch.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::MalformedInput(_) | EngineError::Config(_)
        )
    }

    /// Returns true if this error still carries partial results.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, EngineError::BudgetExceeded { .. })
    }
}
