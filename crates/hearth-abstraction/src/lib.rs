//! Execution-backend abstraction layer for Hearth.
//!
//! This crate defines the core trait and types the residency scheduler uses
//! to talk to a model-execution backend. The scheduler treats the backend as
//! the sole source of truth for whether a load or unload actually succeeded;
//! it never assumes success without backend confirmation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Represents an error reported by the model-execution backend.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendError {
    /// The backend ran out of memory while loading a model. Treated by the
    /// scheduler as a capacity signal, not a terminal failure.
    #[error("Backend out of memory while loading '{model_id}'")]
    OutOfMemory {
        /// The model that could not be loaded.
        model_id: String,
    },

    /// The backend does not know the requested model. Always a
    /// registry/configuration mismatch, never transient.
    #[error("Model '{model_id}' not found by backend")]
    NotFound {
        /// The unknown model identifier.
        model_id: String,
    },

    /// The backend could not be reached or refused the request. Transient;
    /// the scheduler retries with bounded backoff.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Other unexpected backend errors.
    #[error("Backend error: {0}")]
    Other(String),
}

/// A bounded memory region a model may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    /// Accelerator memory: small, fast, the preferred home for hot models.
    Fast,
    /// Host memory: larger, slower, the fallback for `Either` models.
    Slow,
}

impl MemoryTier {
    /// Returns the other tier.
    #[must_use]
    pub fn alternate(self) -> Self {
        match self {
            Self::Fast => Self::Slow,
            Self::Slow => Self::Fast,
        }
    }

    /// Parses a tier name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fast" => Some(Self::Fast),
            "slow" => Some(Self::Slow),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Slow => write!(f, "slow"),
        }
    }
}

/// The response from executing a prompt against a resident model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendResponse {
    /// The generated content.
    pub content: String,

    /// Optional: the ID of the model that produced the response.
    pub model_id: Option<String>,
}

/// A trait for the model-execution backend consumed by the scheduler.
///
/// One concrete adapter per underlying model family implements this trait;
/// the scheduler depends only on this interface. All implementations must be
/// `Send + Sync` to allow concurrent use across request workers.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Loads a model into the given memory tier.
    ///
    /// # Errors
    /// Returns a `BackendError` if the load fails. `OutOfMemory` and
    /// `Unavailable` are recoverable from the scheduler's point of view;
    /// `NotFound` is not.
    async fn load(&self, model_id: &str, tier: MemoryTier) -> Result<(), BackendError>;

    /// Unloads a previously loaded model.
    ///
    /// # Errors
    /// Returns a `BackendError` if the unload fails; the scheduler keeps the
    /// model accounted as resident in that case.
    async fn unload(&self, model_id: &str) -> Result<(), BackendError>;

    /// Executes a prompt against an already-resident model.
    ///
    /// # Errors
    /// Returns a `BackendError` if execution fails.
    async fn execute(&self, model_id: &str, prompt: &str)
    -> Result<BackendResponse, BackendError>;
}
