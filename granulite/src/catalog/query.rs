// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Granule query descriptor and hints

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::filter::Filter;
use crate::geometry::Envelope;
use crate::store::SortBy;

/// Query hint map
///
/// Only the keys in [`Hints::SEMANTIC_KEYS`] change query results; every other
/// key is volatile and ignored when queries are compared for caching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hints(BTreeMap<String, String>);

impl Hints {
    /// Name of the coverage a query targets
    pub const TARGET_COVERAGE_NAME: &'static str = "mosaic.target_coverage";
    /// Whether the caller asked for native (unreprojected) bounds
    pub const REQUEST_NATIVE_BOUNDS: &'static str = "mosaic.native_bounds";

    pub const SEMANTIC_KEYS: [&'static str; 2] =
        [Self::TARGET_COVERAGE_NAME, Self::REQUEST_NATIVE_BOUNDS];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Add every default not already present; caller hints always win
    pub fn merge_defaults(&mut self, defaults: &Hints) {
        for (key, value) in &defaults.0 {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Copy keeping only the semantic keys
    pub fn normalized(&self) -> Hints {
        Hints(
            self.0
                .iter()
                .filter(|(k, _)| SEMANTIC_KEY_SET.contains(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn target_coverage(&self) -> Option<&str> {
        self.get(Self::TARGET_COVERAGE_NAME)
    }

    pub fn native_bounds_requested(&self) -> bool {
        self.get(Self::REQUEST_NATIVE_BOUNDS)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

static SEMANTIC_KEY_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| Hints::SEMANTIC_KEYS.into_iter().collect());

impl fmt::Display for Hints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Query against a granule catalog
#[derive(Debug, Clone, PartialEq)]
pub struct GranuleQuery {
    /// Target type; `None` selects the catalog's default type
    pub type_name: Option<String>,
    pub filter: Filter,
    pub sort_by: Vec<SortBy>,
    pub hints: Hints,
    pub max_features: Option<usize>,
}

impl GranuleQuery {
    pub fn new() -> Self {
        Self {
            type_name: None,
            filter: Filter::Include,
            sort_by: Vec::new(),
            hints: Hints::new(),
            max_features: None,
        }
    }

    pub fn for_type(type_name: impl Into<String>) -> Self {
        Self::new().with_type_name(type_name)
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Restrict to granules intersecting an envelope, keeping the existing filter
    pub fn with_bbox(mut self, envelope: Envelope) -> Self {
        let filter = std::mem::take(&mut self.filter);
        self.filter = filter.and(Filter::bbox(envelope));
        self
    }

    pub fn with_sort(mut self, sort_by: SortBy) -> Self {
        self.sort_by.push(sort_by);
        self
    }

    pub fn with_hint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.hints.insert(key, value);
        self
    }

    pub fn with_max_features(mut self, max: usize) -> Self {
        self.max_features = Some(max);
        self
    }
}

impl Default for GranuleQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GranuleQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} WHERE {}",
            self.type_name.as_deref().unwrap_or("<default>"),
            self.filter
        )?;
        if !self.sort_by.is_empty() {
            let keys: Vec<String> = self.sort_by.iter().map(|s| s.to_string()).collect();
            write!(f, " ORDER BY {}", keys.join(", "))?;
        }
        if let Some(max) = self.max_features {
            write!(f, " LIMIT {}", max)?;
        }
        Ok(())
    }
}
