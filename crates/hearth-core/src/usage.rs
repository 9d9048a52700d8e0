//! Usage tracker: recency/frequency statistics per model.
//!
//! Pure observer. Updates are best-effort and lossy under contention; the
//! tracker must never block the request hot path. Its output is only an
//! eviction/pre-load signal, never a correctness invariant.

use crate::now_millis;
use chrono::Timelike;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::trace;

/// Decay half-life for the rolling request counter.
const HALF_LIFE_MS: f64 = 15.0 * 60.0 * 1000.0;

/// Request rate at which the demand signal saturates toward 1.0.
const RATE_KNEE: f64 = 4.0;

/// Per-model rolling counters.
#[derive(Debug, Clone)]
struct UsageStat {
    /// Exponentially decayed request count.
    decayed_count: f64,
    /// Epoch millis of the last decay update.
    updated_at_ms: i64,
    /// Requests per hour-of-day, the time-of-day demand signal.
    hour_histogram: [u32; 24],
    /// Sum over the histogram.
    histogram_total: u64,
}

impl UsageStat {
    fn new(now_ms: i64) -> Self {
        Self { decayed_count: 0.0, updated_at_ms: now_ms, hour_histogram: [0; 24], histogram_total: 0 }
    }

    fn decay_to(&mut self, now_ms: i64) {
        let elapsed = (now_ms - self.updated_at_ms).max(0) as f64;
        if elapsed > 0.0 {
            self.decayed_count *= 0.5_f64.powf(elapsed / HALF_LIFE_MS);
            self.updated_at_ms = now_ms;
        }
    }
}

/// Tracks per-model usage to inform eviction and pre-loading.
///
/// Entries are created lazily on first request and never removed, so the
/// map is bounded by registry size.
pub struct UsageTracker {
    stats: RwLock<HashMap<String, UsageStat>>,
}

impl UsageTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self { stats: RwLock::new(HashMap::new()) }
    }

    /// Records one request against a model.
    ///
    /// Best-effort: if the stats map is contended the update is dropped
    /// rather than blocking the caller.
    pub fn record_use(&self, model_id: &str) {
        let Ok(mut stats) = self.stats.try_write() else {
            trace!(model_id = %model_id, "Usage update dropped under contention");
            return;
        };

        let now_ms = now_millis();
        let hour = chrono::Utc::now().hour() as usize;
        let stat = stats.entry(model_id.to_string()).or_insert_with(|| UsageStat::new(now_ms));
        stat.decay_to(now_ms);
        stat.decayed_count += 1.0;
        stat.hour_histogram[hour % 24] += 1;
        stat.histogram_total += 1;
    }

    /// Predicted near-term demand for a model, in `[0, 1]`.
    ///
    /// Blends the decayed request rate with the model's historical share of
    /// traffic in the current hour of day. Models never seen score 0.
    #[must_use]
    pub fn predicted_demand(&self, model_id: &str) -> f64 {
        let stats = self.stats.read().unwrap();
        let Some(stat) = stats.get(model_id) else {
            return 0.0;
        };

        let now_ms = now_millis();
        let elapsed = (now_ms - stat.updated_at_ms).max(0) as f64;
        let decayed = stat.decayed_count * 0.5_f64.powf(elapsed / HALF_LIFE_MS);
        let rate_component = decayed / (decayed + RATE_KNEE);

        let hour = chrono::Utc::now().hour() as usize;
        let hour_component = if stat.histogram_total == 0 {
            0.0
        } else {
            f64::from(stat.hour_histogram[hour % 24]) / stat.histogram_total as f64
        };

        (0.7 * rate_component + 0.3 * hour_component).clamp(0.0, 1.0)
    }

    /// Number of models with recorded usage.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stats.read().unwrap().len()
    }

    /// Whether any usage has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.read().unwrap().is_empty()
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}
