//! A scriptable mock execution backend for tests and demos.
//!
//! Supports per-model load delays, scripted failure sequences, canned
//! responses, and call counters for asserting coalescing and retry
//! behavior.

use async_trait::async_trait;
use hearth_abstraction::{BackendError, BackendResponse, ExecutionBackend, MemoryTier};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// A scripted failure: `remaining = None` fails forever, `Some(n)` fails
/// the next `n` calls and then succeeds.
#[derive(Debug, Clone)]
struct FailureScript {
    error: BackendError,
    remaining: Option<usize>,
}

#[derive(Default)]
struct MockState {
    default_load_delay: Duration,
    load_delays: HashMap<String, Duration>,
    load_failures: HashMap<String, FailureScript>,
    responses: HashMap<String, String>,
    loaded: HashSet<String>,
    load_calls: HashMap<String, usize>,
    unload_calls: HashMap<String, usize>,
    execute_calls: HashMap<String, usize>,
}

/// Mock implementation of [`ExecutionBackend`].
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    /// Creates a mock that loads instantly and always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the load delay applied to every model without a specific delay.
    #[must_use]
    pub fn with_default_load_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().default_load_delay = delay;
        self
    }

    /// Sets the load delay for one model.
    #[must_use]
    pub fn with_load_delay(self, model_id: &str, delay: Duration) -> Self {
        self.state.lock().unwrap().load_delays.insert(model_id.to_string(), delay);
        self
    }

    /// Scripts load failures for one model. `times = None` fails every
    /// load; `Some(n)` fails the next `n` loads and then succeeds.
    #[must_use]
    pub fn fail_load(self, model_id: &str, error: BackendError, times: Option<usize>) -> Self {
        self.state
            .lock()
            .unwrap()
            .load_failures
            .insert(model_id.to_string(), FailureScript { error, remaining: times });
        self
    }

    /// Sets a canned execute response for one model.
    #[must_use]
    pub fn with_response(self, model_id: &str, content: &str) -> Self {
        self.state.lock().unwrap().responses.insert(model_id.to_string(), content.to_string());
        self
    }

    /// Number of `load` calls observed for a model.
    #[must_use]
    pub fn load_calls(&self, model_id: &str) -> usize {
        self.state.lock().unwrap().load_calls.get(model_id).copied().unwrap_or(0)
    }

    /// Number of `unload` calls observed for a model.
    #[must_use]
    pub fn unload_calls(&self, model_id: &str) -> usize {
        self.state.lock().unwrap().unload_calls.get(model_id).copied().unwrap_or(0)
    }

    /// Number of `execute` calls observed for a model.
    #[must_use]
    pub fn execute_calls(&self, model_id: &str) -> usize {
        self.state.lock().unwrap().execute_calls.get(model_id).copied().unwrap_or(0)
    }

    /// Whether the backend currently considers a model loaded.
    #[must_use]
    pub fn is_loaded(&self, model_id: &str) -> bool {
        self.state.lock().unwrap().loaded.contains(model_id)
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    async fn load(&self, model_id: &str, tier: MemoryTier) -> Result<(), BackendError> {
        let (delay, scripted) = {
            let mut state = self.state.lock().unwrap();
            *state.load_calls.entry(model_id.to_string()).or_insert(0) += 1;

            let scripted = match state.load_failures.get_mut(model_id) {
                Some(script) => match &mut script.remaining {
                    None => Some(script.error.clone()),
                    Some(0) => None,
                    Some(n) => {
                        *n -= 1;
                        Some(script.error.clone())
                    }
                },
                None => None,
            };
            let delay = state
                .load_delays
                .get(model_id)
                .copied()
                .unwrap_or(state.default_load_delay);
            (delay, scripted)
        };

        if let Some(error) = scripted {
            debug!(model_id = %model_id, error = %error, "MockBackend scripted load failure");
            return Err(error);
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        debug!(model_id = %model_id, tier = %tier, "MockBackend loaded model");
        self.state.lock().unwrap().loaded.insert(model_id.to_string());
        Ok(())
    }

    async fn unload(&self, model_id: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        *state.unload_calls.entry(model_id.to_string()).or_insert(0) += 1;
        state.loaded.remove(model_id);
        debug!(model_id = %model_id, "MockBackend unloaded model");
        Ok(())
    }

    async fn execute(
        &self,
        model_id: &str,
        prompt: &str,
    ) -> Result<BackendResponse, BackendError> {
        let mut state = self.state.lock().unwrap();
        *state.execute_calls.entry(model_id.to_string()).or_insert(0) += 1;

        if !state.loaded.contains(model_id) {
            return Err(BackendError::Other(format!(
                "Execute on model '{}' which is not loaded",
                model_id
            )));
        }

        let content = state
            .responses
            .get(model_id)
            .cloned()
            .unwrap_or_else(|| format!("mock response from {}: {}", model_id, prompt));
        Ok(BackendResponse { content, model_id: Some(model_id.to_string()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_then_execute() {
        let backend = MockBackend::new().with_response("scout-7b", "elementary");

        backend.load("scout-7b", MemoryTier::Fast).await.unwrap();
        let response = backend.execute("scout-7b", "hello").await.unwrap();
        assert_eq!(response.content, "elementary");
        assert_eq!(backend.load_calls("scout-7b"), 1);
        assert_eq!(backend.execute_calls("scout-7b"), 1);
    }

    #[tokio::test]
    async fn test_execute_unloaded_model_fails() {
        let backend = MockBackend::new();
        assert!(backend.execute("scout-7b", "hello").await.is_err());
    }

    #[tokio::test]
    async fn test_scripted_failures_then_success() {
        let backend = MockBackend::new().fail_load(
            "flaky",
            BackendError::Unavailable("socket closed".to_string()),
            Some(2),
        );

        assert!(backend.load("flaky", MemoryTier::Fast).await.is_err());
        assert!(backend.load("flaky", MemoryTier::Fast).await.is_err());
        assert!(backend.load("flaky", MemoryTier::Fast).await.is_ok());
        assert_eq!(backend.load_calls("flaky"), 3);
    }

    #[tokio::test]
    async fn test_unload_clears_loaded_set() {
        let backend = MockBackend::new();
        backend.load("scout-7b", MemoryTier::Fast).await.unwrap();
        assert!(backend.is_loaded("scout-7b"));

        backend.unload("scout-7b").await.unwrap();
        assert!(!backend.is_loaded("scout-7b"));
        assert_eq!(backend.unload_calls("scout-7b"), 1);
    }
}
