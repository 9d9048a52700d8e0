//! Residency scheduler: admission control for model memory residency.
//!
//! The scheduler owns every lifecycle transition
//! (`Unloaded -> Loading -> Resident -> Unloading -> Unloaded`, with the
//! error branch `Loading -> Failed`). Exactly one load or unload transition
//! is in flight per model at a time; concurrent acquires for a non-resident
//! model coalesce into a single backend load, and every waiter observes the
//! outcome through a per-model watch channel. Loads run in detached tasks,
//! so a caller hitting its deadline detaches without aborting the load for
//! anyone else.

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::eviction::{EvictionCandidate, EvictionPolicy};
use crate::ledger::{MemoryLedger, ReserveOutcome};
use crate::now_millis;
use crate::registry::{ModelDescriptor, ModelRegistry, PriorityClass};
use crate::retry::{FailureDisposition, RetryPolicy, classify};
use crate::usage::UsageTracker;
use hearth_abstraction::{BackendError, BackendResponse, ExecutionBackend, MemoryTier};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, RwLock, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lifecycle state of one model, broadcast to waiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not resident anywhere.
    Unloaded,
    /// A load transition is in flight.
    Loading,
    /// Resident in the given tier and ready to execute.
    Resident(MemoryTier),
    /// An unload transition is in flight; new requests wait it out.
    Unloading,
    /// The most recent load attempt failed; the next acquire retries.
    Failed(LoadFailure),
}

impl LifecycleState {
    /// Short label for status output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Resident(_) => "resident",
            Self::Unloading => "unloading",
            Self::Failed(_) => "failed",
        }
    }
}

/// Terminal outcome of a failed load, shared with every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// No tier/eviction combination freed enough space.
    CapacityExceeded,
    /// The backend stayed unreachable through the retry budget.
    Unavailable(String),
    /// The backend does not know the model.
    NotFound,
}

impl LoadFailure {
    fn into_error(self, model_id: &str) -> SchedulerError {
        match self {
            Self::CapacityExceeded => {
                SchedulerError::CapacityExceeded { model_id: model_id.to_string() }
            }
            Self::Unavailable(reason) => {
                SchedulerError::ModelUnavailable { model_id: model_id.to_string(), reason }
            }
            Self::NotFound => SchedulerError::ConfigurationError(format!(
                "Backend does not know model '{}'; registry and backend disagree",
                model_id
            )),
        }
    }
}

/// Why an unload was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadReason {
    /// Explicit operator request.
    Operator,
    /// The eviction engine selected this model as a victim.
    Eviction,
}

/// Per-model coordination state.
///
/// The watch channel is the authoritative lifecycle state; `send_if_modified`
/// gives atomic check-and-set, which is how loaders and unloaders are
/// elected. The gate tracks in-flight requests: each lease holds a read
/// guard, and an unload drains by taking the write half within the grace
/// timeout.
#[derive(Debug)]
struct ModelEntry {
    model_id: String,
    state: watch::Sender<LifecycleState>,
    gate: Arc<RwLock<()>>,
    /// Epoch millis of the last successful request; shared with the ledger
    /// slot so the fast path never takes the pool lock.
    last_used: Arc<AtomicI64>,
    /// Callers currently holding or waiting on this model. Eviction skips
    /// models with live interest.
    interest: AtomicUsize,
}

/// RAII registration of a caller's interest in a model.
#[derive(Debug)]
struct InterestGuard {
    entry: Arc<ModelEntry>,
}

impl InterestGuard {
    fn register(entry: Arc<ModelEntry>) -> Self {
        entry.interest.fetch_add(1, Ordering::SeqCst);
        Self { entry }
    }
}

impl Drop for InterestGuard {
    fn drop(&mut self) {
        self.entry.interest.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A handle to a resident model, valid for one request.
///
/// While a lease is alive the model counts as in-flight: unloads wait for it
/// (bounded by the grace timeout) and eviction will not target the model.
#[derive(Debug)]
pub struct ModelLease {
    model_id: String,
    tier: MemoryTier,
    _gate: OwnedRwLockReadGuard<()>,
    _interest: InterestGuard,
}

impl ModelLease {
    /// The leased model's canonical id.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// The tier the model is resident in.
    #[must_use]
    pub fn tier(&self) -> MemoryTier {
        self.tier
    }
}

/// Result of a routed execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteOutcome {
    /// The model that served the request.
    pub model_id: String,
    /// The tier it served from.
    pub tier: MemoryTier,
    /// The backend response.
    pub response: BackendResponse,
}

/// Status of one resident (or loading) model, for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct ResidentStatus {
    /// The occupant model.
    pub model_id: String,
    /// Slot footprint in bytes.
    pub size_bytes: u64,
    /// Lifecycle state label.
    pub state: String,
    /// Milliseconds since the model last served a request.
    pub idle_ms: i64,
}

/// Status of one memory pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    /// The tier this pool backs.
    pub tier: MemoryTier,
    /// Pool capacity in bytes.
    pub capacity_bytes: u64,
    /// Bytes currently reserved.
    pub used_bytes: u64,
    /// Occupants, sorted by model id.
    pub residents: Vec<ResidentStatus>,
}

/// Full scheduler status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Both pools, fast first.
    pub pools: Vec<PoolStatus>,
}

enum LoadAbort {
    /// Capacity-shaped failure; the alternate tier may still work.
    Capacity,
    /// Terminal failure; stop trying tiers.
    Terminal(LoadFailure),
}

struct Inner {
    backend: Arc<dyn ExecutionBackend>,
    registry: ModelRegistry,
    ledger: MemoryLedger,
    usage: UsageTracker,
    eviction: EvictionPolicy,
    retry: RetryPolicy,
    grace: Duration,
    entries: Mutex<HashMap<String, Arc<ModelEntry>>>,
}

/// The residency scheduler: admission controller over both memory tiers.
#[derive(Clone)]
pub struct ResidencyScheduler {
    inner: Arc<Inner>,
}

impl ResidencyScheduler {
    /// Builds a scheduler from validated configuration and a backend.
    ///
    /// # Errors
    /// Returns `ConfigurationError` if the model catalog is inconsistent.
    pub fn new(config: &SchedulerConfig, backend: Arc<dyn ExecutionBackend>) -> Result<Self> {
        let registry = ModelRegistry::new(config.models.clone())?;
        info!(
            models = registry.len(),
            fast_capacity = config.fast_tier_capacity_bytes,
            slow_capacity = config.slow_tier_capacity_bytes,
            "Residency scheduler initialized"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                backend,
                registry,
                ledger: MemoryLedger::new(
                    config.fast_tier_capacity_bytes,
                    config.slow_tier_capacity_bytes,
                ),
                usage: UsageTracker::new(),
                eviction: EvictionPolicy::new(config.eviction.clone()),
                retry: config.load_retry.clone(),
                grace: config.graceful_unload_timeout,
                entries: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// The read-only model catalog.
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.inner.registry
    }

    /// The usage tracker feeding eviction and pre-load decisions.
    #[must_use]
    pub fn usage(&self) -> &UsageTracker {
        &self.inner.usage
    }

    /// Acquires a lease on a model, loading it if necessary.
    ///
    /// Suspends until the model is resident, the load fails, or `deadline`
    /// expires. A deadline expiry unblocks only this caller; a load in
    /// progress continues for other waiters.
    ///
    /// # Errors
    /// `CapacityExceeded`, `ModelUnavailable`, `ConfigurationError`, or
    /// `Timeout` per the scheduler failure taxonomy.
    pub async fn acquire(&self, model: &str, deadline: Option<Duration>) -> Result<ModelLease> {
        self.acquire_on(model, None, deadline).await
    }

    /// Like [`acquire`](Self::acquire), with a preferred tier for models
    /// whose affinity is `Either`.
    pub async fn acquire_on(
        &self,
        model: &str,
        preferred: Option<MemoryTier>,
        deadline: Option<Duration>,
    ) -> Result<ModelLease> {
        let descriptor = self
            .inner
            .registry
            .resolve(model)
            .ok_or_else(|| {
                SchedulerError::ConfigurationError(format!("Unknown model or alias '{}'", model))
            })?
            .clone();

        match deadline {
            Some(limit) => {
                let model_id = descriptor.id.clone();
                timeout(limit, Inner::acquire_inner(self.inner.clone(), descriptor, preferred))
                    .await
                    .map_err(|_| SchedulerError::Timeout { model_id })?
            }
            None => Inner::acquire_inner(self.inner.clone(), descriptor, preferred).await,
        }
    }

    /// Acquires a model and executes a prompt against it.
    ///
    /// # Errors
    /// Any acquire failure, plus backend execution errors translated into
    /// the scheduler taxonomy.
    pub async fn execute(
        &self,
        model: &str,
        prompt: &str,
        deadline: Option<Duration>,
    ) -> Result<ExecuteOutcome> {
        let lease = self.acquire(model, deadline).await?;
        match self.inner.backend.execute(lease.model_id(), prompt).await {
            Ok(response) => Ok(ExecuteOutcome {
                model_id: lease.model_id().to_string(),
                tier: lease.tier(),
                response,
            }),
            Err(BackendError::NotFound { model_id }) => Err(SchedulerError::ConfigurationError(
                format!("Backend lost model '{}' mid-residency", model_id),
            )),
            Err(err) => Err(SchedulerError::ModelUnavailable {
                model_id: lease.model_id().to_string(),
                reason: err.to_string(),
            }),
        }
    }

    /// Warms a model into residency without issuing a request.
    ///
    /// # Errors
    /// Same failure taxonomy as [`acquire`](Self::acquire).
    pub async fn preload(&self, model: &str, preferred: Option<MemoryTier>) -> Result<()> {
        self.acquire_on(model, preferred, None).await.map(|_| ())
    }

    /// Explicitly unloads a model (operator path).
    ///
    /// Quiesces in-flight requests bounded by the graceful unload timeout,
    /// then releases the model's slot once the backend confirms.
    ///
    /// # Errors
    /// `NotResident` if the model holds no slot; `ModelUnavailable` if the
    /// backend refuses the unload (residency is restored in that case).
    pub async fn unload(&self, model: &str) -> Result<()> {
        let descriptor = self.inner.registry.resolve(model).ok_or_else(|| {
            SchedulerError::ConfigurationError(format!("Unknown model or alias '{}'", model))
        })?;
        let model_id = descriptor.id.clone();
        Inner::unload_inner(&self.inner, &model_id, UnloadReason::Operator).await
    }

    /// Point-in-time status of both pools and their occupants.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        let now = now_millis();
        let pools = self
            .inner
            .ledger
            .snapshot_all()
            .into_iter()
            .map(|pool| {
                let mut residents: Vec<ResidentStatus> = pool
                    .occupants
                    .into_iter()
                    .map(|occupant| {
                        let state = {
                            let entries = self.inner.entries.lock().unwrap();
                            entries
                                .get(&occupant.model_id)
                                .map_or("resident", |e| e.state.borrow().label())
                                .to_string()
                        };
                        ResidentStatus {
                            idle_ms: (now - occupant.last_used_ms).max(0),
                            model_id: occupant.model_id,
                            size_bytes: occupant.size_bytes,
                            state,
                        }
                    })
                    .collect();
                residents.sort_by(|a, b| a.model_id.cmp(&b.model_id));
                PoolStatus {
                    tier: pool.tier,
                    capacity_bytes: pool.capacity_bytes,
                    used_bytes: pool.used_bytes,
                    residents,
                }
            })
            .collect();
        SchedulerStatus { pools }
    }
}

impl Inner {
    fn entry(&self, model_id: &str) -> Arc<ModelEntry> {
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(model_id.to_string())
            .or_insert_with(|| {
                Arc::new(ModelEntry {
                    model_id: model_id.to_string(),
                    state: watch::channel(LifecycleState::Unloaded).0,
                    gate: Arc::new(RwLock::new(())),
                    last_used: Arc::new(AtomicI64::new(0)),
                    interest: AtomicUsize::new(0),
                })
            })
            .clone()
    }

    async fn acquire_inner(
        inner: Arc<Self>,
        descriptor: ModelDescriptor,
        preferred: Option<MemoryTier>,
    ) -> Result<ModelLease> {
        let entry = inner.entry(&descriptor.id);
        let interest = InterestGuard::register(entry.clone());
        let mut rx = entry.state.subscribe();
        // Failures observed on arrival belong to an earlier attempt and are
        // retried; failures observed after waiting are this caller's answer.
        let mut fresh_arrival = true;

        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                LifecycleState::Resident(_) => {
                    let gate = entry.gate.clone().read_owned().await;
                    // Re-check after taking the gate: an unload may have
                    // started while we queued behind its write request.
                    let current = entry.state.borrow().clone();
                    if let LifecycleState::Resident(tier) = current {
                        entry.last_used.store(now_millis(), Ordering::Relaxed);
                        inner.usage.record_use(&descriptor.id);
                        return Ok(ModelLease {
                            model_id: descriptor.id.clone(),
                            tier,
                            _gate: gate,
                            _interest: interest,
                        });
                    }
                    drop(gate);
                    fresh_arrival = false;
                }
                LifecycleState::Failed(failure) if !fresh_arrival => {
                    return Err(failure.into_error(&descriptor.id));
                }
                LifecycleState::Unloaded | LifecycleState::Failed(_) => {
                    let elected = entry.state.send_if_modified(|s| {
                        if matches!(s, LifecycleState::Unloaded | LifecycleState::Failed(_)) {
                            *s = LifecycleState::Loading;
                            true
                        } else {
                            false
                        }
                    });
                    if elected {
                        debug!(model_id = %descriptor.id, "Elected loader");
                        tokio::spawn(Self::run_load(
                            inner.clone(),
                            descriptor.clone(),
                            entry.clone(),
                            preferred,
                        ));
                    }
                    Self::wait_for_change(&mut rx, &descriptor.id).await?;
                    fresh_arrival = false;
                }
                LifecycleState::Loading | LifecycleState::Unloading => {
                    Self::wait_for_change(&mut rx, &descriptor.id).await?;
                    fresh_arrival = false;
                }
            }
        }
    }

    async fn wait_for_change(
        rx: &mut watch::Receiver<LifecycleState>,
        model_id: &str,
    ) -> Result<()> {
        rx.changed().await.map_err(|_| SchedulerError::ModelUnavailable {
            model_id: model_id.to_string(),
            reason: "Scheduler shut down".to_string(),
        })
    }

    /// Detached load task. Drives the whole reserve/evict/load sequence and
    /// publishes the outcome; caller deadlines never cancel it.
    async fn run_load(
        inner: Arc<Self>,
        descriptor: ModelDescriptor,
        entry: Arc<ModelEntry>,
        preferred: Option<MemoryTier>,
    ) {
        match Self::drive_load(&inner, &descriptor, &entry, preferred).await {
            Ok(tier) => {
                entry.last_used.store(now_millis(), Ordering::Relaxed);
                info!(model_id = %descriptor.id, tier = %tier, "Model resident");
                entry.state.send_replace(LifecycleState::Resident(tier));
            }
            Err(failure) => {
                warn!(model_id = %descriptor.id, failure = ?failure, "Model load failed");
                entry.state.send_replace(LifecycleState::Failed(failure));
            }
        }
    }

    async fn drive_load(
        inner: &Arc<Self>,
        descriptor: &ModelDescriptor,
        entry: &Arc<ModelEntry>,
        preferred: Option<MemoryTier>,
    ) -> std::result::Result<MemoryTier, LoadFailure> {
        let mut saw_deadlock = false;

        for tier in descriptor.affinity.tier_order(preferred) {
            if !Self::reserve_with_eviction(inner, descriptor, entry, tier, &mut saw_deadlock)
                .await
            {
                debug!(model_id = %descriptor.id, tier = %tier, "Tier admission failed");
                continue;
            }

            match Self::backend_load(inner, descriptor, tier).await {
                Ok(()) => return Ok(tier),
                Err(LoadAbort::Capacity) => {
                    inner.ledger.release(tier, &descriptor.id);
                    continue;
                }
                Err(LoadAbort::Terminal(failure)) => {
                    inner.ledger.release(tier, &descriptor.id);
                    return Err(failure);
                }
            }
        }

        if saw_deadlock {
            warn!(
                model_id = %descriptor.id,
                "Eviction blocked on models with active waiters; reporting capacity exhaustion"
            );
        }
        Err(LoadFailure::CapacityExceeded)
    }

    /// Atomic reserve; on shortage, one eviction pass and exactly one
    /// reservation retry.
    async fn reserve_with_eviction(
        inner: &Arc<Self>,
        descriptor: &ModelDescriptor,
        entry: &Arc<ModelEntry>,
        tier: MemoryTier,
        saw_deadlock: &mut bool,
    ) -> bool {
        match inner.ledger.reserve(
            tier,
            &descriptor.id,
            descriptor.size_bytes,
            entry.last_used.clone(),
        ) {
            ReserveOutcome::Reserved => return true,
            ReserveOutcome::AlreadyResident { tier: occupied } => {
                // Lifecycle transitions are serialized per model, so a live
                // slot here means accounting drifted. Refuse rather than
                // double-book.
                warn!(
                    model_id = %descriptor.id,
                    tier = %occupied,
                    "Reservation found an existing slot for a loading model"
                );
                return false;
            }
            ReserveOutcome::Insufficient { free } => {
                let needed = descriptor.size_bytes.saturating_sub(free);
                info!(
                    model_id = %descriptor.id,
                    tier = %tier,
                    bytes_needed = needed,
                    free = free,
                    "Pool under pressure; invoking eviction"
                );
                if !Self::evict_for(inner, &descriptor.id, tier, needed, saw_deadlock).await {
                    return false;
                }
            }
        }

        matches!(
            inner.ledger.reserve(
                tier,
                &descriptor.id,
                descriptor.size_bytes,
                entry.last_used.clone()
            ),
            ReserveOutcome::Reserved
        )
    }

    /// One eviction pass: snapshot, score, unload victims.
    ///
    /// Models with live interest (another caller holding or awaiting them)
    /// are excluded; if only their exclusion made eviction infeasible, the
    /// pass records an eviction deadlock.
    async fn evict_for(
        inner: &Arc<Self>,
        requester: &str,
        tier: MemoryTier,
        bytes_needed: u64,
        saw_deadlock: &mut bool,
    ) -> bool {
        let now = now_millis();
        let mut candidates = Vec::new();
        let mut excluded_busy_bytes = 0u64;

        for occupant in inner.ledger.snapshot(tier) {
            if occupant.model_id == requester {
                continue;
            }
            let Some(occupant_descriptor) = inner.registry.resolve(&occupant.model_id) else {
                continue;
            };
            if occupant_descriptor.priority == PriorityClass::Pinned {
                continue;
            }
            let occupant_entry = inner.entry(&occupant.model_id);
            if !matches!(&*occupant_entry.state.borrow(), LifecycleState::Resident(_)) {
                continue;
            }
            if occupant_entry.interest.load(Ordering::SeqCst) > 0 {
                excluded_busy_bytes += occupant.size_bytes;
                continue;
            }
            candidates.push(EvictionCandidate {
                model_id: occupant.model_id.clone(),
                size_bytes: occupant.size_bytes,
                priority: occupant_descriptor.priority,
                idle_ms: (now - occupant.last_used_ms).max(0),
                predicted_demand: inner.usage.predicted_demand(&occupant.model_id),
            });
        }

        let Some(victims) = inner.eviction.select_victims(&candidates, bytes_needed) else {
            let evictable: u64 = candidates.iter().map(|c| c.size_bytes).sum();
            if excluded_busy_bytes > 0 && evictable + excluded_busy_bytes >= bytes_needed {
                *saw_deadlock = true;
            }
            return false;
        };

        for victim in victims {
            if let Err(err) = Self::unload_inner(inner, &victim, UnloadReason::Eviction).await {
                warn!(model_id = %victim, error = %err, "Eviction unload failed");
                return false;
            }
        }
        true
    }

    /// Backend load with failure classification: one eviction retry on OOM,
    /// bounded exponential backoff on unavailability, immediate surface on
    /// not-found.
    async fn backend_load(
        inner: &Arc<Self>,
        descriptor: &ModelDescriptor,
        tier: MemoryTier,
    ) -> std::result::Result<(), LoadAbort> {
        let mut transient_attempts = 0u32;
        let mut oom_retried = false;

        loop {
            match inner.backend.load(&descriptor.id, tier).await {
                Ok(()) => return Ok(()),
                Err(err) => match classify(&err) {
                    FailureDisposition::Fatal => {
                        return Err(LoadAbort::Terminal(LoadFailure::NotFound));
                    }
                    FailureDisposition::CapacitySignal => {
                        if oom_retried {
                            return Err(LoadAbort::Capacity);
                        }
                        oom_retried = true;
                        warn!(
                            model_id = %descriptor.id,
                            tier = %tier,
                            "Backend reported OOM; evicting and retrying once"
                        );
                        let mut unused = false;
                        if !Self::evict_for(
                            inner,
                            &descriptor.id,
                            tier,
                            descriptor.size_bytes,
                            &mut unused,
                        )
                        .await
                        {
                            return Err(LoadAbort::Capacity);
                        }
                    }
                    FailureDisposition::RetryTransient => {
                        if !inner.retry.should_retry(transient_attempts) {
                            return Err(LoadAbort::Terminal(LoadFailure::Unavailable(
                                err.to_string(),
                            )));
                        }
                        let delay = inner.retry.backoff_delay(transient_attempts);
                        transient_attempts += 1;
                        debug!(
                            model_id = %descriptor.id,
                            attempt = transient_attempts,
                            delay_ms = delay.as_millis() as u64,
                            "Backend unavailable; backing off before retry"
                        );
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }
    }

    /// Unload transition: elect, quiesce, confirm with backend, release.
    async fn unload_inner(
        inner: &Arc<Self>,
        model_id: &str,
        reason: UnloadReason,
    ) -> Result<()> {
        let entry = inner.entry(model_id);

        let mut occupied = None;
        let began = entry.state.send_if_modified(|state| {
            if let LifecycleState::Resident(tier) = *state {
                occupied = Some(tier);
                *state = LifecycleState::Unloading;
                true
            } else {
                false
            }
        });
        let Some(tier) = occupied.filter(|_| began) else {
            return match reason {
                // The victim moved on between snapshot and unload; the
                // retried reservation will see whatever space exists now.
                UnloadReason::Eviction => Ok(()),
                UnloadReason::Operator => Err(SchedulerError::NotResident {
                    model_id: model_id.to_string(),
                    tier: None,
                }),
            };
        };

        debug!(model_id = %model_id, tier = %tier, reason = ?reason, "Quiescing for unload");
        let drained = timeout(inner.grace, entry.gate.clone().write_owned()).await;
        if drained.is_err() {
            warn!(
                model_id = %model_id,
                grace_ms = inner.grace.as_millis() as u64,
                "Grace timeout expired; unloading with requests in flight"
            );
        }

        match inner.backend.unload(model_id).await {
            Ok(()) => {
                inner.ledger.release(tier, model_id);
                entry.state.send_replace(LifecycleState::Unloaded);
                info!(model_id = %model_id, tier = %tier, reason = ?reason, "Model unloaded");
                Ok(())
            }
            Err(err) => {
                // The backend still holds the model; keep it accounted.
                entry.state.send_replace(LifecycleState::Resident(tier));
                warn!(model_id = %model_id, error = %err, "Backend refused unload; residency restored");
                Err(SchedulerError::ModelUnavailable {
                    model_id: model_id.to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfigLoader;
    use crate::mock::MockBackend;

    fn config(fast: u64, slow: u64) -> SchedulerConfig {
        let content = format!(
            r#"
fast_tier_capacity_bytes = {fast}
slow_tier_capacity_bytes = {slow}

[[models]]
id = "scout-7b"
aliases = ["scout"]
size_bytes = 500
affinity = "either"
priority = "preferred"
"#
        );
        SchedulerConfigLoader::parse(&content).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_model_is_configuration_error() {
        let scheduler =
            ResidencyScheduler::new(&config(1000, 1000), Arc::new(MockBackend::new())).unwrap();
        let err = scheduler.acquire("ghost", None).await.unwrap_err();
        assert_eq!(err.kind(), "configuration_error");
    }

    #[tokio::test]
    async fn test_acquire_by_alias_loads_and_leases() {
        let backend = Arc::new(MockBackend::new());
        let scheduler = ResidencyScheduler::new(&config(1000, 1000), backend.clone()).unwrap();

        let lease = scheduler.acquire("scout", None).await.unwrap();
        assert_eq!(lease.model_id(), "scout-7b");
        assert_eq!(lease.tier(), MemoryTier::Fast);
        assert_eq!(backend.load_calls("scout-7b"), 1);
    }

    #[tokio::test]
    async fn test_second_acquire_is_fast_path() {
        let backend = Arc::new(MockBackend::new());
        let scheduler = ResidencyScheduler::new(&config(1000, 1000), backend.clone()).unwrap();

        drop(scheduler.acquire("scout-7b", None).await.unwrap());
        drop(scheduler.acquire("scout-7b", None).await.unwrap());
        assert_eq!(backend.load_calls("scout-7b"), 1);
    }

    #[tokio::test]
    async fn test_operator_unload_of_nonresident_fails() {
        let scheduler =
            ResidencyScheduler::new(&config(1000, 1000), Arc::new(MockBackend::new())).unwrap();
        let err = scheduler.unload("scout-7b").await.unwrap_err();
        assert!(matches!(err, SchedulerError::NotResident { .. }));
    }

    #[tokio::test]
    async fn test_status_reflects_residency() {
        let scheduler =
            ResidencyScheduler::new(&config(1000, 1000), Arc::new(MockBackend::new())).unwrap();

        let status = scheduler.status();
        assert!(status.pools.iter().all(|p| p.residents.is_empty()));

        drop(scheduler.acquire("scout-7b", None).await.unwrap());
        let status = scheduler.status();
        let fast = &status.pools[0];
        assert_eq!(fast.tier, MemoryTier::Fast);
        assert_eq!(fast.used_bytes, 500);
        assert_eq!(fast.residents.len(), 1);
        assert_eq!(fast.residents[0].state, "resident");
    }

    #[tokio::test]
    async fn test_either_affinity_falls_back_to_slow_tier() {
        // Fast tier too small for the model; slow tier fits.
        let backend = Arc::new(MockBackend::new());
        let scheduler = ResidencyScheduler::new(&config(100, 1000), backend.clone()).unwrap();

        let lease = scheduler.acquire("scout-7b", None).await.unwrap();
        assert_eq!(lease.tier(), MemoryTier::Slow);
    }
}
