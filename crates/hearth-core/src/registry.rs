//! Model registry: the read-only catalog of known models.
//!
//! Loaded once from configuration at startup; immutable thereafter. The
//! registry fails fast at construction if two entries share an id or alias.

use crate::error::SchedulerError;
use hearth_abstraction::MemoryTier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Hardware affinity of a model: which tiers it may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierAffinity {
    /// The model only runs from the fast (accelerator) tier.
    FastOnly,
    /// The model only runs from the slow (host) tier.
    SlowOnly,
    /// The model can run from either tier; fast is preferred.
    Either,
}

impl TierAffinity {
    /// Whether the model may occupy the given tier.
    #[must_use]
    pub fn allows(self, tier: MemoryTier) -> bool {
        match self {
            Self::FastOnly => tier == MemoryTier::Fast,
            Self::SlowOnly => tier == MemoryTier::Slow,
            Self::Either => true,
        }
    }

    /// Ordered list of tiers to attempt, starting from a preference.
    ///
    /// For `Either`, the preferred tier (default fast) is tried first and
    /// the alternate second. Fixed-affinity models get exactly one entry.
    #[must_use]
    pub fn tier_order(self, preferred: Option<MemoryTier>) -> Vec<MemoryTier> {
        match self {
            Self::FastOnly => vec![MemoryTier::Fast],
            Self::SlowOnly => vec![MemoryTier::Slow],
            Self::Either => {
                let first = preferred.unwrap_or(MemoryTier::Fast);
                vec![first, first.alternate()]
            }
        }
    }
}

/// Priority class used by the eviction engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityClass {
    /// Evicted first under pressure.
    BestEffort,
    /// Evicted only when no best-effort candidate covers the need.
    Preferred,
    /// Exempt from eviction entirely.
    Pinned,
}

/// Immutable catalog entry for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Canonical model identifier.
    pub id: String,
    /// Human-friendly aliases resolving to this model.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Resident footprint in bytes.
    pub size_bytes: u64,
    /// Which tiers the model may occupy.
    pub affinity: TierAffinity,
    /// Eviction priority class.
    pub priority: PriorityClass,
    /// Estimated load latency, as a hint for monitoring and mocks.
    #[serde(rename = "est_load_ms", with = "duration_millis", default)]
    pub est_load_latency: Duration,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Read-only lookup over the model catalog.
#[derive(Debug)]
pub struct ModelRegistry {
    /// Canonical id to descriptor.
    descriptors: HashMap<String, ModelDescriptor>,
    /// Alias (or id) to canonical id.
    aliases: HashMap<String, String>,
}

impl ModelRegistry {
    /// Builds a registry from descriptors.
    ///
    /// # Errors
    /// Returns `ConfigurationError` if two entries share an id or alias, or
    /// if any model declares a zero footprint.
    pub fn new(descriptors: Vec<ModelDescriptor>) -> Result<Self, SchedulerError> {
        let mut by_id = HashMap::new();
        let mut aliases = HashMap::new();

        for descriptor in descriptors {
            if descriptor.size_bytes == 0 {
                return Err(SchedulerError::ConfigurationError(format!(
                    "Model '{}' declares a zero-byte footprint",
                    descriptor.id
                )));
            }

            if aliases.insert(descriptor.id.clone(), descriptor.id.clone()).is_some() {
                return Err(SchedulerError::ConfigurationError(format!(
                    "Duplicate model id '{}'",
                    descriptor.id
                )));
            }

            for alias in &descriptor.aliases {
                if aliases.insert(alias.clone(), descriptor.id.clone()).is_some() {
                    return Err(SchedulerError::ConfigurationError(format!(
                        "Alias '{}' is claimed by more than one model",
                        alias
                    )));
                }
            }

            by_id.insert(descriptor.id.clone(), descriptor);
        }

        Ok(Self { descriptors: by_id, aliases })
    }

    /// Resolves an alias or canonical id to its descriptor.
    #[must_use]
    pub fn resolve(&self, alias_or_id: &str) -> Option<&ModelDescriptor> {
        let id = self.aliases.get(alias_or_id)?;
        self.descriptors.get(id)
    }

    /// Iterates over all catalog entries.
    pub fn descriptors(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.descriptors.values()
    }

    /// Number of cataloged models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, aliases: &[&str]) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            size_bytes: 1024,
            affinity: TierAffinity::Either,
            priority: PriorityClass::Preferred,
            est_load_latency: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_resolve_by_id_and_alias() {
        let registry =
            ModelRegistry::new(vec![descriptor("scout-7b", &["scout", "default"])]).unwrap();

        assert_eq!(registry.resolve("scout-7b").unwrap().id, "scout-7b");
        assert_eq!(registry.resolve("scout").unwrap().id, "scout-7b");
        assert_eq!(registry.resolve("default").unwrap().id, "scout-7b");
        assert!(registry.resolve("ghost").is_none());
    }

    #[test]
    fn test_duplicate_alias_fails_fast() {
        let result = ModelRegistry::new(vec![
            descriptor("scout-7b", &["default"]),
            descriptor("archivist-3b", &["default"]),
        ]);
        assert!(matches!(result, Err(SchedulerError::ConfigurationError(_))));
    }

    #[test]
    fn test_duplicate_id_fails_fast() {
        let result =
            ModelRegistry::new(vec![descriptor("scout-7b", &[]), descriptor("scout-7b", &[])]);
        assert!(matches!(result, Err(SchedulerError::ConfigurationError(_))));
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut bad = descriptor("scout-7b", &[]);
        bad.size_bytes = 0;
        assert!(ModelRegistry::new(vec![bad]).is_err());
    }

    #[test]
    fn test_tier_order_respects_affinity() {
        assert_eq!(TierAffinity::FastOnly.tier_order(None), vec![MemoryTier::Fast]);
        assert_eq!(TierAffinity::SlowOnly.tier_order(Some(MemoryTier::Fast)), vec![
            MemoryTier::Slow
        ]);
        assert_eq!(TierAffinity::Either.tier_order(Some(MemoryTier::Slow)), vec![
            MemoryTier::Slow,
            MemoryTier::Fast
        ]);
    }

    #[test]
    fn test_affinity_allows() {
        assert!(TierAffinity::FastOnly.allows(MemoryTier::Fast));
        assert!(!TierAffinity::FastOnly.allows(MemoryTier::Slow));
        assert!(TierAffinity::Either.allows(MemoryTier::Slow));
    }
}
