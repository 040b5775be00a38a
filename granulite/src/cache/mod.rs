// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Caching primitives
//!
//! This module provides the caches shared by the catalog and footprint layers:
//! - Soft caches: bounded + TTL maps whose entries may vanish at any time
//! - The granule query result cache used by the caching decorator
//!
//! Eviction triggers are explicit: the entry bound (LRU), the time-to-live,
//! and `release()`, which callers invoke under memory pressure.

pub mod cache_config;
pub mod result_cache;
pub mod soft_cache;

pub use cache_config::CacheConfig;
pub use result_cache::{QueryCacheKey, QueryResultCache};
pub use soft_cache::SoftCache;

use std::time::{Duration, Instant};

/// Cache entry metadata
#[derive(Debug, Clone)]
pub struct CacheEntryMetadata {
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub access_count: u32,
    pub ttl: Option<Duration>,
}

impl CacheEntryMetadata {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            created_at: now,
            last_accessed: now,
            access_count: 0,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Expired entries are never served
    pub fn is_expired(&self) -> bool {
        if let Some(ttl) = self.ttl {
            self.created_at.elapsed() > ttl
        } else {
            false
        }
    }

    pub fn update_access(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }
}

impl Default for CacheEntryMetadata {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub releases: u64,
    pub total_requests: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_requests as f64
        }
    }
}
