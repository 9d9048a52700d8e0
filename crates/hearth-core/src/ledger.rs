//! Memory ledger: capacity accounting for the fast and slow tiers.
//!
//! Reservation and occupant-slot creation happen inside one critical
//! section, so there is never a window where bytes are reserved without a
//! slot recording the occupant, or vice versa. The lock guards only this
//! constant-time accounting and is never held across a backend call.

use crate::now_millis;
use hearth_abstraction::MemoryTier;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Outcome of an atomic check-and-reserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Bytes reserved and occupant slot created.
    Reserved,
    /// Not enough free space in the pool.
    Insufficient {
        /// Free bytes available at the time of the check.
        free: u64,
    },
    /// The model already occupies a slot somewhere; duplicate residency is
    /// refused regardless of the requested tier.
    AlreadyResident {
        /// The tier the model currently occupies.
        tier: MemoryTier,
    },
}

/// Point-in-time view of one occupant slot.
#[derive(Debug, Clone, Serialize)]
pub struct OccupantInfo {
    /// The resident model.
    pub model_id: String,
    /// Slot footprint in bytes.
    pub size_bytes: u64,
    /// Epoch milliseconds when the load began.
    pub loaded_at_ms: i64,
    /// Epoch milliseconds of the last successful request.
    pub last_used_ms: i64,
}

/// Consistent point-in-time view of one pool.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    /// The tier this pool backs.
    pub tier: MemoryTier,
    /// Pool capacity in bytes.
    pub capacity_bytes: u64,
    /// Bytes currently reserved.
    pub used_bytes: u64,
    /// Current occupants.
    pub occupants: Vec<OccupantInfo>,
}

/// One occupant slot inside a pool.
struct Slot {
    size_bytes: u64,
    loaded_at_ms: i64,
    /// Shared with the scheduler's per-model entry: the resident fast path
    /// refreshes this atomic without taking the pool lock.
    last_used: Arc<AtomicI64>,
}

/// One memory tier: capacity, usage, and its occupant slots.
struct Pool {
    capacity: u64,
    used: u64,
    occupants: HashMap<String, Slot>,
}

impl Pool {
    fn new(capacity: u64) -> Self {
        Self { capacity, used: 0, occupants: HashMap::new() }
    }

    fn free(&self) -> u64 {
        self.capacity.saturating_sub(self.used)
    }
}

struct Inner {
    fast: Pool,
    slow: Pool,
}

impl Inner {
    fn pool(&self, tier: MemoryTier) -> &Pool {
        match tier {
            MemoryTier::Fast => &self.fast,
            MemoryTier::Slow => &self.slow,
        }
    }

    fn pool_mut(&mut self, tier: MemoryTier) -> &mut Pool {
        match tier {
            MemoryTier::Fast => &mut self.fast,
            MemoryTier::Slow => &mut self.slow,
        }
    }

    fn resident_tier(&self, model_id: &str) -> Option<MemoryTier> {
        if self.fast.occupants.contains_key(model_id) {
            Some(MemoryTier::Fast)
        } else if self.slow.occupants.contains_key(model_id) {
            Some(MemoryTier::Slow)
        } else {
            None
        }
    }
}

/// Thread-safe capacity ledger over both tiers.
///
/// Both pools sit behind one mutex: the duplicate-residency invariant spans
/// pools, so the check and the reservation must see a consistent view of
/// both. Critical sections stay constant-time.
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

impl MemoryLedger {
    /// Creates a ledger with the given tier capacities in bytes.
    #[must_use]
    pub fn new(fast_capacity: u64, slow_capacity: u64) -> Self {
        Self { inner: Mutex::new(Inner { fast: Pool::new(fast_capacity), slow: Pool::new(slow_capacity) }) }
    }

    /// Atomically checks capacity and, if sufficient, reserves bytes and
    /// creates the occupant slot.
    ///
    /// `last_used` is shared with the caller so the resident fast path can
    /// refresh recency without the pool lock.
    pub fn reserve(
        &self,
        tier: MemoryTier,
        model_id: &str,
        size_bytes: u64,
        last_used: Arc<AtomicI64>,
    ) -> ReserveOutcome {
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) = inner.resident_tier(model_id) {
            return ReserveOutcome::AlreadyResident { tier: existing };
        }

        let now = now_millis();
        let pool = inner.pool_mut(tier);
        if pool.free() < size_bytes {
            return ReserveOutcome::Insufficient { free: pool.free() };
        }

        pool.used += size_bytes;
        last_used.store(now, Ordering::Relaxed);
        pool.occupants.insert(
            model_id.to_string(),
            Slot { size_bytes, loaded_at_ms: now, last_used },
        );

        debug!(
            model_id = %model_id,
            tier = %tier,
            size_bytes = size_bytes,
            used = pool.used,
            capacity = pool.capacity,
            "Reserved pool bytes"
        );
        ReserveOutcome::Reserved
    }

    /// Destroys the occupant slot and returns its bytes to the pool.
    ///
    /// Returns the released byte count, or `None` if the model held no slot
    /// in that tier.
    pub fn release(&self, tier: MemoryTier, model_id: &str) -> Option<u64> {
        let mut inner = self.inner.lock().unwrap();
        let pool = inner.pool_mut(tier);
        let slot = pool.occupants.remove(model_id)?;
        pool.used = pool.used.saturating_sub(slot.size_bytes);

        debug!(
            model_id = %model_id,
            tier = %tier,
            released = slot.size_bytes,
            used = pool.used,
            "Released pool bytes"
        );
        Some(slot.size_bytes)
    }

    /// Current `(used, capacity)` for a tier.
    #[must_use]
    pub fn occupancy(&self, tier: MemoryTier) -> (u64, u64) {
        let inner = self.inner.lock().unwrap();
        let pool = inner.pool(tier);
        (pool.used, pool.capacity)
    }

    /// Free bytes in a tier.
    #[must_use]
    pub fn free(&self, tier: MemoryTier) -> u64 {
        let inner = self.inner.lock().unwrap();
        inner.pool(tier).free()
    }

    /// Which tier, if any, the model currently occupies.
    #[must_use]
    pub fn resident_tier(&self, model_id: &str) -> Option<MemoryTier> {
        let inner = self.inner.lock().unwrap();
        inner.resident_tier(model_id)
    }

    /// Point-in-time view of a tier's occupants, for eviction scoring.
    #[must_use]
    pub fn snapshot(&self, tier: MemoryTier) -> Vec<OccupantInfo> {
        let inner = self.inner.lock().unwrap();
        Self::occupants_of(inner.pool(tier))
    }

    /// Consistent view of both pools under one critical section, so status
    /// readers never observe a model mid-move between tiers.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<PoolSnapshot> {
        let inner = self.inner.lock().unwrap();
        [MemoryTier::Fast, MemoryTier::Slow]
            .into_iter()
            .map(|tier| {
                let pool = inner.pool(tier);
                PoolSnapshot {
                    tier,
                    capacity_bytes: pool.capacity,
                    used_bytes: pool.used,
                    occupants: Self::occupants_of(pool),
                }
            })
            .collect()
    }

    fn occupants_of(pool: &Pool) -> Vec<OccupantInfo> {
        pool.occupants
            .iter()
            .map(|(id, slot)| OccupantInfo {
                model_id: id.clone(),
                size_bytes: slot.size_bytes,
                loaded_at_ms: slot.loaded_at_ms,
                last_used_ms: slot.last_used.load(Ordering::Relaxed),
            })
            .collect()
    }
}
