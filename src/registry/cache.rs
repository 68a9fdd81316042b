// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded LRU cache of resolved members
//!
//! Entries are grouped in one bucket per owner type. Capacity counts buckets;
//! inserting a new bucket past capacity evicts the least recently used one.

use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;

use super::member::{MemberLookup, ResolvedMember, resolve_member};
use super::types::TypeRegistry;
use crate::config::CacheConfig;
use crate::model::TypeInfo;

type Bucket = FxHashMap<String, ResolvedMember>;

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to resolve
    pub misses: u64,
    /// Buckets evicted for capacity
    pub evictions: u64,
}

impl CacheStats {
    /// Hit ratio as a percentage
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct Inner {
    buckets: LruCache<TypeInfo, Bucket>,
    stats: CacheStats,
}

/// Thread-safe member cache keyed by (type, member name)
pub struct MemberCache {
    inner: Option<Mutex<Inner>>,
}

impl MemberCache {
    /// Create a cache from configuration. An inactive configuration yields a
    /// pass-through cache.
    pub fn new(config: &CacheConfig) -> Self {
        let inner = NonZeroUsize::new(config.capacity)
            .filter(|_| config.enabled)
            .map(|capacity| {
                Mutex::new(Inner {
                    buckets: LruCache::new(capacity),
                    stats: CacheStats::default(),
                })
            });
        Self { inner }
    }

    /// Cached member, marking its type bucket most recently used
    pub fn get(&self, owner: &TypeInfo, name: &str) -> Option<ResolvedMember> {
        let mut inner = self.inner.as_ref()?.lock();
        let found = inner
            .buckets
            .get(owner)
            .and_then(|bucket| bucket.get(name))
            .cloned();
        match found {
            Some(_) => inner.stats.hits += 1,
            None => inner.stats.misses += 1,
        }
        found
    }

    /// Store a resolved member
    pub fn insert(&self, owner: &TypeInfo, name: &str, member: ResolvedMember) {
        let Some(inner) = &self.inner else {
            return;
        };
        let mut inner = inner.lock();
        if let Some(bucket) = inner.buckets.get_mut(owner) {
            bucket.insert(name.to_string(), member);
            return;
        }
        let mut bucket = Bucket::default();
        bucket.insert(name.to_string(), member);
        if let Some((evicted, _)) = inner.buckets.push(owner.clone(), bucket) {
            if &evicted != owner {
                inner.stats.evictions += 1;
                log::debug!("Member cache evicted bucket for {evicted}");
            }
        }
    }

    /// Cached lookup that resolves and stores on a miss. Only found members
    /// are stored.
    pub fn lookup(&self, owner: &TypeInfo, name: &str, types: &TypeRegistry) -> MemberLookup {
        if let Some(member) = self.get(owner, name) {
            return MemberLookup::Found(member);
        }
        let lookup = resolve_member(owner, name, types);
        if let MemberLookup::Found(member) = &lookup {
            self.insert(owner, name, member.clone());
        }
        lookup
    }

    /// Drop the bucket of one type
    pub fn evict(&self, owner: &TypeInfo) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.lock().buckets.pop(owner).is_some())
    }

    /// Drop every bucket and reset statistics
    pub fn clear(&self) {
        if let Some(inner) = &self.inner {
            let mut inner = inner.lock();
            inner.buckets.clear();
            inner.stats = CacheStats::default();
        }
    }

    /// Number of cached type buckets
    pub fn len(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.lock().buckets.len())
    }

    /// True when no bucket is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of type buckets, zero when disabled
    pub fn capacity(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.lock().buckets.cap().get())
    }

    /// Whether a bucket for `owner` is cached, without touching recency
    pub fn contains(&self, owner: &TypeInfo) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.lock().buckets.contains(owner))
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        self.inner
            .as_ref()
            .map(|inner| inner.lock().stats.clone())
            .unwrap_or_default()
    }
}

impl Default for MemberCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl std::fmt::Debug for MemberCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberCache")
            .field("buckets", &self.len())
            .field("capacity", &self.capacity())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;
    use crate::registry::types::TypeDescriptor;

    fn types() -> TypeRegistry {
        let mut types = TypeRegistry::with_builtins();
        for name in ["A", "B", "C"] {
            types.register(
                TypeDescriptor::host(name).with_member("x", TypeInfo::Number, |_| {
                    Ok(Value::from(1.0))
                }),
                &[],
            );
        }
        types
    }

    fn host(name: &str) -> TypeInfo {
        TypeInfo::Host(name.into())
    }

    #[test]
    fn test_hits_and_misses() {
        let cache = MemberCache::new(&CacheConfig::testing());
        let types = types();
        assert!(matches!(cache.lookup(&host("A"), "x", &types), MemberLookup::Found(_)));
        assert!(matches!(cache.lookup(&host("A"), "x", &types), MemberLookup::Found(_)));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.hit_ratio(), 50.0);
    }

    #[test]
    fn test_lru_bucket_eviction() {
        let cache = MemberCache::new(&CacheConfig::testing());
        let types = types();
        cache.lookup(&host("A"), "x", &types);
        cache.lookup(&host("B"), "x", &types);
        // touching A makes B the least recently used bucket
        cache.lookup(&host("A"), "x", &types);
        cache.lookup(&host("C"), "x", &types);

        assert!(cache.contains(&host("A")));
        assert!(!cache.contains(&host("B")));
        assert!(cache.contains(&host("C")));
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_misses_are_not_stored() {
        let cache = MemberCache::default();
        let types = types();
        assert!(matches!(
            cache.lookup(&TypeInfo::Number, "x", &types),
            MemberLookup::Missing
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_cache() {
        let cache = MemberCache::new(&CacheConfig::disabled());
        let types = types();
        assert!(matches!(cache.lookup(&host("A"), "x", &types), MemberLookup::Found(_)));
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.capacity(), 0);
        assert!(!cache.evict(&host("A")));
    }
}
