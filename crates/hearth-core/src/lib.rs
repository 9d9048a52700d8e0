//! Core residency scheduling for Hearth.
//!
//! Hearth decides which inference models occupy limited accelerator
//! ("fast") and host ("slow") memory, and admits requests to a resident or
//! newly loaded model under hard memory budgets. This crate holds the
//! scheduler and everything it consults: the model registry, the memory
//! ledger, the usage tracker, the eviction policy engine, and the
//! load-failure retry policy.
//!
//! The execution backend itself is external; see `hearth-abstraction` for
//! the trait and [`mock::MockBackend`] for the scriptable test double.

pub mod config;
pub mod error;
pub mod eviction;
pub mod ledger;
pub mod mock;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod usage;

pub use config::{ConfigError, RouteEntry, SchedulerConfig, SchedulerConfigLoader};
pub use error::{Result, SchedulerError};
pub use eviction::{EvictionCandidate, EvictionPolicy, EvictionWeights};
pub use ledger::{MemoryLedger, OccupantInfo, PoolSnapshot, ReserveOutcome};
pub use mock::MockBackend;
pub use registry::{ModelDescriptor, ModelRegistry, PriorityClass, TierAffinity};
pub use retry::{FailureDisposition, RetryPolicy, classify};
pub use scheduler::{
    ExecuteOutcome, LifecycleState, LoadFailure, ModelLease, PoolStatus, ResidencyScheduler,
    ResidentStatus, SchedulerStatus, UnloadReason,
};
pub use usage::UsageTracker;

/// Epoch milliseconds, the scheduler's wall-clock currency.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
