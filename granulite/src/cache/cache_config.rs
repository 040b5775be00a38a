// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of the granule query result cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable/disable the result cache entirely
    pub enabled: bool,

    /// Maximum number of cached queries
    pub max_entries: usize,

    /// Entries older than this are never served
    pub max_age: Duration,

    /// Results with more granules than this are streamed but not cached
    pub max_granules_per_entry: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 128,
            max_age: Duration::from_secs(5),
            max_granules_per_entry: 1000,
        }
    }
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_max_granules_per_entry(mut self, max_granules: usize) -> Self {
        self.max_granules_per_entry = max_granules;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.max_entries == 0 {
            return Err("Result cache must have max_entries > 0".to_string());
        }
        if self.max_age.is_zero() {
            return Err("Result cache max_age must be positive".to_string());
        }
        if self.max_granules_per_entry == 0 {
            return Err("Result cache must allow at least one granule per entry".to_string());
        }
        Ok(())
    }
}
