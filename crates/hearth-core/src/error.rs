// Error types for the residency scheduler

use hearth_abstraction::MemoryTier;
use thiserror::Error;

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Failure taxonomy at the scheduler boundary.
///
/// All failures below the scheduler are translated into one of these kinds
/// before reaching the router; the router is the only component permitted to
/// retry against an alternate model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// No tier/eviction combination frees enough space for the model.
    #[error("Capacity exceeded for model '{model_id}'")]
    CapacityExceeded {
        /// The model that could not be admitted.
        model_id: String,
    },

    /// The backend stayed unreachable through the bounded retry budget.
    #[error("Model '{model_id}' unavailable: {reason}")]
    ModelUnavailable {
        /// The affected model.
        model_id: String,
        /// Last backend error observed.
        reason: String,
    },

    /// Registry/configuration mismatch: unknown alias, or the backend does
    /// not know a model the registry claims exists. Never transient.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The caller's deadline expired. Surfaced to that caller only; a load
    /// in progress continues for other waiters.
    #[error("Deadline expired waiting for model '{model_id}'")]
    Timeout {
        /// The model the caller was waiting for.
        model_id: String,
    },

    /// Explicit unload requested for a model that is not resident.
    #[error("Model '{model_id}' is not resident in tier {tier:?}")]
    NotResident {
        /// The model that was expected to be resident.
        model_id: String,
        /// Tier checked, if the caller named one.
        tier: Option<MemoryTier>,
    },
}

impl SchedulerError {
    /// Stable short label for telemetry and router attempt records.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::ConfigurationError(_) => "configuration_error",
            Self::Timeout { .. } => "timeout",
            Self::NotResident { .. } => "not_resident",
        }
    }

    /// Whether the router should advance to the next candidate in a
    /// fallback chain after this failure.
    #[must_use]
    pub fn advances_fallback(&self) -> bool {
        !matches!(self, Self::NotResident { .. })
    }
}
