// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Granule query result caching

use std::sync::Arc;

use super::{CacheConfig, CacheStats, SoftCache};
use crate::catalog::{GranuleDescriptor, GranuleQuery, Hints};
use crate::store::SortBy;

/// Normalized form of a granule query
///
/// The filter is keyed by its canonical text and volatile hints are dropped,
/// so two queries that can only produce the same result share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryCacheKey {
    pub type_name: Option<String>,
    pub filter: String,
    pub sort_by: Vec<SortBy>,
    pub hints: Hints,
    pub max_features: Option<usize>,
}

impl QueryCacheKey {
    pub fn from_query(query: &GranuleQuery) -> Self {
        Self {
            type_name: query.type_name.clone(),
            // Structural form: literals keep every coordinate and the geometry kind
            filter: format!("{:?}", query.filter),
            sort_by: query.sort_by.clone(),
            hints: query.hints.normalized(),
            max_features: query.max_features,
        }
    }
}

/// Cached granule lists keyed by normalized query
pub struct QueryResultCache {
    entries: SoftCache<QueryCacheKey, Arc<Vec<Arc<GranuleDescriptor>>>>,
    max_granules: usize,
}

impl QueryResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: SoftCache::new("granule query", config.max_entries, Some(config.max_age)),
            max_granules: config.max_granules_per_entry,
        }
    }

    /// Largest result that will be stored
    pub fn max_granules(&self) -> usize {
        self.max_granules
    }

    pub fn get(&self, key: &QueryCacheKey) -> Option<Arc<Vec<Arc<GranuleDescriptor>>>> {
        self.entries.get(key)
    }

    /// Store a complete result; oversized results are ignored
    pub fn store(&self, key: QueryCacheKey, granules: Vec<Arc<GranuleDescriptor>>) -> bool {
        if granules.len() > self.max_granules {
            return false;
        }
        self.entries.insert(key, Arc::new(granules));
        true
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn release(&self) {
        self.entries.release();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}
