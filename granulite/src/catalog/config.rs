// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Catalog configuration
//!
//! A configuration is built once, validated, and then shared read-only by
//! every layer of the catalog stack.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::query::Hints;
use crate::cache::CacheConfig;

pub const DEFAULT_LOCATION_ATTRIBUTE: &str = "location";

/// How granule locations stored in records are turned into paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PathType {
    /// Locations are used as-is
    #[default]
    Absolute,
    /// Locations are relative to the configured parent location
    Relative,
    /// Locations are URIs resolved through the resolver registry
    Uri,
}

impl PathType {
    pub fn resolve(
        &self,
        location: &str,
        parent: Option<&Path>,
        resolvers: &UriResolverRegistry,
    ) -> Result<String, String> {
        if location.is_empty() {
            return Err("empty location".to_string());
        }
        match self {
            PathType::Absolute => Ok(location.to_string()),
            PathType::Relative => {
                let parent = parent.ok_or_else(|| "no parent location configured".to_string())?;
                Ok(parent.join(location).to_string_lossy().into_owned())
            }
            PathType::Uri => resolvers.resolve(location),
        }
    }
}

/// What to delete alongside the records of removed granules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GranuleRemovalPolicy {
    /// Only the catalog records
    #[default]
    None,
    /// Records plus footprint sidecars
    Metadata,
    /// Records, footprint sidecars and the granule files
    All,
}

/// Resolves a URI to a local location
pub trait UriResolver: Send + Sync {
    fn resolve(&self, uri: &str) -> Option<String>;
}

/// Resolver for `file://` URIs
#[derive(Debug, Default)]
pub struct FileUriResolver;

impl UriResolver for FileUriResolver {
    fn resolve(&self, uri: &str) -> Option<String> {
        uri.strip_prefix("file://").map(str::to_string)
    }
}

/// Scheme-keyed set of URI resolvers passed in at construction
#[derive(Clone)]
pub struct UriResolverRegistry {
    resolvers: HashMap<String, Arc<dyn UriResolver>>,
}

impl UriResolverRegistry {
    pub fn empty() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    pub fn register(&mut self, scheme: impl Into<String>, resolver: Arc<dyn UriResolver>) {
        self.resolvers
            .insert(scheme.into().to_ascii_lowercase(), resolver);
    }

    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.resolvers.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    pub fn resolve(&self, uri: &str) -> Result<String, String> {
        let scheme = uri
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| format!("'{}' is not a URI", uri))?;
        let resolver = self
            .resolvers
            .get(&scheme)
            .ok_or_else(|| format!("no resolver registered for scheme '{}'", scheme))?;
        resolver
            .resolve(uri)
            .ok_or_else(|| format!("resolver for '{}' rejected {}", scheme, uri))
    }
}

impl Default for UriResolverRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("file", Arc::new(FileUriResolver));
        registry
    }
}

impl fmt::Debug for UriResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UriResolverRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Mosaic type names; empty means "pick the first valid schema"
    pub type_names: Vec<String>,

    /// Attribute holding the granule location
    pub location_attribute: String,

    pub path_type: PathType,

    /// Base directory for relative locations
    pub parent_location: Option<PathBuf>,

    /// Raster format name suggested to granule readers
    pub suggested_format: Option<String>,

    /// Reader implementation suggested to granule readers
    pub suggested_reader: Option<String>,

    /// Wrap the catalog with the spatial index and result cache
    pub caching: bool,

    /// Granules may differ in format, resolution or CRS
    pub heterogeneous: bool,

    /// Match configured type names to store names case-insensitively
    pub wrap_store: bool,

    pub removal_policy: GranuleRemovalPolicy,

    pub cache: CacheConfig,

    /// Hints added to every query unless the caller sets them
    pub default_hints: Hints,

    #[serde(skip)]
    pub uri_resolvers: UriResolverRegistry,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            type_names: Vec::new(),
            location_attribute: DEFAULT_LOCATION_ATTRIBUTE.to_string(),
            path_type: PathType::Absolute,
            parent_location: None,
            suggested_format: None,
            suggested_reader: None,
            caching: false,
            heterogeneous: false,
            wrap_store: false,
            removal_policy: GranuleRemovalPolicy::None,
            cache: CacheConfig::default(),
            default_hints: Hints::new(),
            uri_resolvers: UriResolverRegistry::default(),
        }
    }
}

impl CatalogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_names.push(type_name.into());
        self
    }

    pub fn with_location_attribute(mut self, name: impl Into<String>) -> Self {
        self.location_attribute = name.into();
        self
    }

    pub fn with_path_type(mut self, path_type: PathType) -> Self {
        self.path_type = path_type;
        self
    }

    /// Resolve locations relative to `parent`
    pub fn with_parent_location(mut self, parent: impl Into<PathBuf>) -> Self {
        self.parent_location = Some(parent.into());
        self.path_type = PathType::Relative;
        self
    }

    pub fn with_suggested_format(mut self, format: impl Into<String>) -> Self {
        self.suggested_format = Some(format.into());
        self
    }

    pub fn with_suggested_reader(mut self, reader: impl Into<String>) -> Self {
        self.suggested_reader = Some(reader.into());
        self
    }

    pub fn with_caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }

    pub fn with_heterogeneous(mut self, heterogeneous: bool) -> Self {
        self.heterogeneous = heterogeneous;
        self
    }

    pub fn with_wrap_store(mut self, wrap_store: bool) -> Self {
        self.wrap_store = wrap_store;
        self
    }

    pub fn with_removal_policy(mut self, policy: GranuleRemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_default_hint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_hints.insert(key, value);
        self
    }

    pub fn with_uri_resolver(mut self, scheme: &str, resolver: Arc<dyn UriResolver>) -> Self {
        self.uri_resolvers.register(scheme, resolver);
        self
    }

    /// Resolve a stored location according to the path policy
    pub fn resolve_location(&self, location: &str) -> Result<String, String> {
        self.path_type
            .resolve(location, self.parent_location.as_deref(), &self.uri_resolvers)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.location_attribute.trim().is_empty() {
            return Err("location attribute name must not be empty".to_string());
        }
        if self.path_type == PathType::Relative && self.parent_location.is_none() {
            return Err("relative paths require a parent location".to_string());
        }
        if self.type_names.iter().any(|t| t.trim().is_empty()) {
            return Err("type names must not be empty".to_string());
        }
        self.cache.validate()
    }
}
