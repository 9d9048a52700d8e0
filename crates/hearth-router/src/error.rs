// Error types for capability routing

use serde::Serialize;
use thiserror::Error;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Record of one failed candidate in a fallback chain.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptFailure {
    /// The candidate that was tried.
    pub model_id: String,
    /// Stable failure label from the scheduler taxonomy.
    pub kind: String,
    /// Human-readable failure detail.
    pub detail: String,
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.model_id, self.kind, self.detail)
    }
}

/// Errors that can occur during request routing.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// No route is configured for the requested capability.
    #[error("No route configured for capability '{capability}'")]
    UnknownCapability {
        /// The capability the request named.
        capability: String,
    },

    /// Every candidate in the fallback chain failed.
    #[error("No capable model for '{capability}': {}", format_attempts(.attempts))]
    NoCapableModel {
        /// The capability the request named.
        capability: String,
        /// Per-candidate failures, in chain order.
        attempts: Vec<AttemptFailure>,
    },
}

fn format_attempts(attempts: &[AttemptFailure]) -> String {
    attempts.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_capable_model_lists_every_attempt() {
        let err = RoutingError::NoCapableModel {
            capability: "research".to_string(),
            attempts: vec![
                AttemptFailure {
                    model_id: "scout-7b".to_string(),
                    kind: "capacity_exceeded".to_string(),
                    detail: "Capacity exceeded for model 'scout-7b'".to_string(),
                },
                AttemptFailure {
                    model_id: "archivist-3b".to_string(),
                    kind: "timeout".to_string(),
                    detail: "Deadline expired waiting for model 'archivist-3b'".to_string(),
                },
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("research"));
        assert!(msg.contains("scout-7b (capacity_exceeded)"));
        assert!(msg.contains("archivist-3b (timeout)"));
    }
}
