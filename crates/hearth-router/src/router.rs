//! Capability-based request routing over the residency scheduler.
//!
//! A route maps a capability string to an ordered candidate chain: the
//! primary model first, fallbacks after. The router walks the chain until a
//! candidate serves the request, recording every failure along the way. It
//! is the only component that retries a request against a different model;
//! everything below it fails a single model definitively.

use crate::error::{AttemptFailure, Result, RoutingError};
use hearth_abstraction::MemoryTier;
use hearth_core::ResidencyScheduler;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A successfully routed response.
#[derive(Debug, Clone, Serialize)]
pub struct RoutedResponse {
    /// The capability the request named.
    pub capability: String,
    /// The model that served the request.
    pub model_id: String,
    /// The tier it served from.
    pub tier: MemoryTier,
    /// Position in the chain that served: 0 is the primary.
    pub fallback_depth: usize,
    /// The backend response content.
    pub content: String,
}

/// Routes requests to models by capability, with ordered fallback.
pub struct RequestRouter {
    chains: HashMap<String, Vec<String>>,
    scheduler: ResidencyScheduler,
}

impl RequestRouter {
    /// Builds a router over a capability-to-chain table.
    ///
    /// The table is validated at configuration load time; every candidate
    /// resolves in the scheduler's registry.
    #[must_use]
    pub fn new(chains: HashMap<String, Vec<String>>, scheduler: ResidencyScheduler) -> Self {
        Self { chains, scheduler }
    }

    /// The scheduler this router admits requests through.
    #[must_use]
    pub fn scheduler(&self) -> &ResidencyScheduler {
        &self.scheduler
    }

    /// Capabilities this router knows, sorted.
    #[must_use]
    pub fn capabilities(&self) -> Vec<&str> {
        let mut capabilities: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        capabilities.sort_unstable();
        capabilities
    }

    /// Routes one request: walks the capability's chain in order until a
    /// candidate serves it.
    ///
    /// `deadline` applies per candidate, not to the chain as a whole; a
    /// candidate that times out advances the chain like any other failure.
    ///
    /// # Errors
    /// `UnknownCapability` if no route matches, or `NoCapableModel` with
    /// the per-candidate failure records once the chain is exhausted.
    pub async fn route_request(
        &self,
        capability: &str,
        prompt: &str,
        deadline: Option<Duration>,
    ) -> Result<RoutedResponse> {
        let chain = self.chains.get(capability).ok_or_else(|| {
            RoutingError::UnknownCapability { capability: capability.to_string() }
        })?;

        let mut attempts = Vec::new();
        for (depth, candidate) in chain.iter().enumerate() {
            debug!(capability = %capability, model_id = %candidate, depth = depth, "Trying candidate");
            match self.scheduler.execute(candidate, prompt, deadline).await {
                Ok(outcome) => {
                    if depth > 0 {
                        info!(
                            capability = %capability,
                            model_id = %outcome.model_id,
                            depth = depth,
                            "Request served by fallback candidate"
                        );
                    }
                    return Ok(RoutedResponse {
                        capability: capability.to_string(),
                        model_id: outcome.model_id,
                        tier: outcome.tier,
                        fallback_depth: depth,
                        content: outcome.response.content,
                    });
                }
                Err(err) => {
                    warn!(
                        capability = %capability,
                        model_id = %candidate,
                        kind = err.kind(),
                        error = %err,
                        "Candidate failed"
                    );
                    let advance = err.advances_fallback();
                    attempts.push(AttemptFailure {
                        model_id: candidate.clone(),
                        kind: err.kind().to_string(),
                        detail: err.to_string(),
                    });
                    if !advance {
                        break;
                    }
                }
            }
        }

        Err(RoutingError::NoCapableModel { capability: capability.to_string(), attempts })
    }

    /// Routes a request to an explicit model id or alias, bypassing the
    /// capability table. No fallback applies.
    ///
    /// # Errors
    /// `NoCapableModel` carrying the single attempt record on failure.
    pub async fn route_model(
        &self,
        model: &str,
        prompt: &str,
        deadline: Option<Duration>,
    ) -> Result<RoutedResponse> {
        match self.scheduler.execute(model, prompt, deadline).await {
            Ok(outcome) => Ok(RoutedResponse {
                capability: model.to_string(),
                model_id: outcome.model_id,
                tier: outcome.tier,
                fallback_depth: 0,
                content: outcome.response.content,
            }),
            Err(err) => {
                warn!(model_id = %model, kind = err.kind(), error = %err, "Explicit-model request failed");
                Err(RoutingError::NoCapableModel {
                    capability: model.to_string(),
                    attempts: vec![AttemptFailure {
                        model_id: model.to_string(),
                        kind: err.kind().to_string(),
                        detail: err.to_string(),
                    }],
                })
            }
        }
    }
}
