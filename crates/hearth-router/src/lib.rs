//! Capability routing for Hearth.
//!
//! Requests name a capability, not a model. This crate resolves the
//! capability to its configured candidate chain and walks the chain through
//! the residency scheduler until one candidate serves the request.

pub mod error;
pub mod router;

pub use error::{AttemptFailure, Result, RoutingError};
pub use router::{RequestRouter, RoutedResponse};
