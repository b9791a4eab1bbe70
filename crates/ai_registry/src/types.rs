//! Type definitions for the AI Registry module

use gasbal_ai_core::ModelKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Default deadline for loading one entity, in milliseconds (0 = none)
    pub load_timeout_ms: u64,
    /// Check artifact bytes against the manifest digests
    pub verify_hashes: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: 5_000,
            verify_hashes: true,
        }
    }
}

impl RegistryConfig {
    pub fn load_timeout(&self) -> Option<Duration> {
        (self.load_timeout_ms > 0).then(|| Duration::from_millis(self.load_timeout_ms))
    }
}

/// A kind that is declared in the manifest but could not be loaded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadFailure {
    pub kind: ModelKind,
    pub reason: String,
}

/// Registry counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryStats {
    /// Entities currently cached
    pub cached_entities: usize,
    /// Completed entity loads (success or per-kind failure)
    pub loads: u64,
    /// Lookups served from cache
    pub cache_hits: u64,
    /// Lookups that hit their deadline
    pub timeouts: u64,
    /// Individual kinds that failed to load
    pub failed_models: u64,
}
