// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result caching around a catalog
//!
//! Query results are cached under the normalized query. A miss streams the
//! delegate while recording granules; only a stream consumed to the end,
//! without errors and within the per-entry cap, is stored. Any mutation
//! clears the cache.

use log::debug;
use std::sync::Arc;

use super::DelegatingCatalog;
use crate::cache::{CacheConfig, CacheStats, QueryCacheKey, QueryResultCache};
use crate::catalog::{
    CatalogError, CatalogResult, GranuleCatalog, GranuleDescriptor, GranuleIter, GranuleQuery,
    QueryCapabilities,
};
use crate::geometry::Envelope;
use crate::store::{Record, Schema, Transaction};

/// Passes granules through while recording them for the cache
struct RecordingIter<'a> {
    inner: GranuleIter<'a>,
    cache: &'a QueryResultCache,
    key: Option<QueryCacheKey>,
    /// `None` once the result can no longer be cached
    recorded: Option<Vec<Arc<GranuleDescriptor>>>,
}

impl Iterator for RecordingIter<'_> {
    type Item = CatalogResult<Arc<GranuleDescriptor>>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next();
        match &item {
            Some(Ok(granule)) => {
                let full = self
                    .recorded
                    .as_ref()
                    .is_some_and(|r| r.len() >= self.cache.max_granules());
                if full {
                    self.recorded = None;
                } else if let Some(recorded) = &mut self.recorded {
                    recorded.push(granule.clone());
                }
            }
            Some(Err(_)) => self.recorded = None,
            None => {
                if let (Some(key), Some(recorded)) = (self.key.take(), self.recorded.take()) {
                    let size = recorded.len();
                    if self.cache.store(key, recorded) {
                        debug!("Cached query result with {} granules", size);
                    }
                }
            }
        }
        item
    }
}

pub struct CachingCatalog {
    base: DelegatingCatalog,
    cache: QueryResultCache,
}

impl CachingCatalog {
    pub fn new(inner: Arc<dyn GranuleCatalog>, owns_inner: bool, config: &CacheConfig) -> Self {
        Self {
            base: DelegatingCatalog::new(inner, owns_inner),
            cache: QueryResultCache::new(config),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cached_queries(&self) -> usize {
        self.cache.len()
    }

    /// Drop cached results under memory pressure
    pub fn release_cache(&self) {
        self.cache.release();
    }

    fn invalidating<T>(&self, result: CatalogResult<T>) -> CatalogResult<T> {
        self.cache.clear();
        result
    }
}

impl GranuleCatalog for CachingCatalog {
    fn stream(&self, query: &GranuleQuery) -> CatalogResult<GranuleIter<'_>> {
        let inner = self.base.active()?;
        let key = QueryCacheKey::from_query(query);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Result cache hit for {}", query);
            let granules: Vec<Arc<GranuleDescriptor>> = hit.as_ref().clone();
            return Ok(Box::new(granules.into_iter().map(Ok::<_, CatalogError>)));
        }

        debug!("Result cache miss for {}", query);
        Ok(Box::new(RecordingIter {
            inner: inner.stream(query)?,
            cache: &self.cache,
            key: Some(key),
            recorded: Some(Vec::new()),
        }))
    }

    fn add_granules(
        &self,
        type_name: &str,
        records: Vec<Record>,
        txn: &Transaction,
    ) -> CatalogResult<usize> {
        self.invalidating(self.base.add_granules(type_name, records, txn))
    }

    fn remove_granules(&self, query: &GranuleQuery, txn: &Transaction) -> CatalogResult<usize> {
        self.invalidating(self.base.remove_granules(query, txn))
    }

    fn commit(&self, txn: &Transaction) -> CatalogResult<usize> {
        self.invalidating(self.base.commit(txn))
    }

    fn create_type(&self, schema: Schema) -> CatalogResult<()> {
        self.invalidating(self.base.create_type(schema))
    }

    fn remove_type(&self, type_name: &str) -> CatalogResult<()> {
        self.invalidating(self.base.remove_type(type_name))
    }

    fn type_names(&self) -> CatalogResult<Vec<String>> {
        self.base.type_names()
    }

    fn schema(&self, type_name: &str) -> CatalogResult<Schema> {
        self.base.schema(type_name)
    }

    fn bounds(&self, type_name: &str) -> CatalogResult<Option<Envelope>> {
        self.base.bounds(type_name)
    }

    fn query_capabilities(&self, type_name: &str) -> CatalogResult<QueryCapabilities> {
        self.base.query_capabilities(type_name)
    }

    fn dispose(&self) -> CatalogResult<()> {
        self.cache.release();
        self.base.dispose()
    }

    fn is_disposed(&self) -> bool {
        self.base.is_disposed()
    }
}
