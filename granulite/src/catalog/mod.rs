// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Granule catalog
//!
//! The catalog answers spatial and attribute queries over the granules of a
//! raster mosaic. It is composed from layers that all implement
//! [`GranuleCatalog`]:
//!
//! - [`StoreGranuleCatalog`]: binds the contract to a record store
//! - [`StrTreeGranuleCatalog`]: bulk-loaded R-tree for bounding-box pruning
//! - [`decorators`]: locking, result caching and default hint merging
//!
//! [`CatalogFactory`] composes the stack from a [`CatalogConfig`].

pub mod config;
pub mod decorators;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod query;
pub mod spatial_index;
pub mod store_backed;
pub mod traits;

pub use config::{
    CatalogConfig, FileUriResolver, GranuleRemovalPolicy, PathType, UriResolver,
    UriResolverRegistry, DEFAULT_LOCATION_ATTRIBUTE,
};
pub use decorators::{CachingCatalog, DelegatingCatalog, HintMergingCatalog, LockingCatalog};
pub use descriptor::GranuleDescriptor;
pub use error::{CatalogError, CatalogResult};
pub use factory::{CatalogFactory, CatalogStack};
pub use query::{GranuleQuery, Hints};
pub use spatial_index::{IndexState, StrTreeGranuleCatalog, TypeIndex};
pub use store_backed::{is_mosaic_schema, StoreGranuleCatalog, StoreHandle};
pub use traits::{
    aggregate_granules, Aggregate, AggregateResult, GranuleCatalog, GranuleIter, GranuleVisitor,
    QueryCapabilities, VisitControl,
};
