//! Configuration for formula contexts

use serde::{Deserialize, Serialize};

/// Member cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of type buckets kept
    pub capacity: usize,
    /// Whether member lookups are cached at all
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Large cache for workloads touching many host types
    pub fn high_performance() -> Self {
        Self {
            capacity: 1024,
            enabled: true,
        }
    }

    /// Small cache for constrained environments
    pub fn low_memory() -> Self {
        Self {
            capacity: 16,
            enabled: true,
        }
    }

    /// Tiny cache that evicts early, for exercising eviction in tests
    pub fn testing() -> Self {
        Self {
            capacity: 2,
            enabled: true,
        }
    }

    /// No caching
    pub fn disabled() -> Self {
        Self {
            capacity: 0,
            enabled: false,
        }
    }

    /// Whether lookups go through the cache
    pub fn is_active(&self) -> bool {
        self.enabled && self.capacity > 0
    }
}

/// Context wide configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaConfig {
    /// Member cache settings
    pub cache: CacheConfig,
    /// Resolve unregistered type aliases by scanning known type names
    pub type_deduction: bool,
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            type_deduction: true,
        }
    }
}

impl FormulaConfig {
    /// Only registered aliases name types
    pub fn strict() -> Self {
        Self {
            type_deduction: false,
            ..Self::default()
        }
    }

    /// Small cache to exercise eviction
    pub fn testing() -> Self {
        Self {
            cache: CacheConfig::testing(),
            ..Self::default()
        }
    }

    /// Replace the cache settings
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}
