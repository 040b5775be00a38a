// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Granulite - granule catalog and spatial index engine for raster mosaics
//!
//! A mosaic is a large set of georeferenced raster tiles ("granules") served
//! as one coverage. Granulite catalogs the granules and answers the spatial
//! and attribute queries that drive tile serving.
//!
//! # Features
//!
//! - **Catalog stack**: store-backed catalog wrapped by a bulk-loaded R-tree,
//!   a result cache, default hint merging and readers/writer locking
//! - **Filters**: CQL-like text predicates over attributes and geometry
//! - **Footprints**: per-granule regions of interest from sidecars, a shared
//!   vector file or an injected raster mask source, with inset policies and
//!   per-overview alignment
//! - **Soft caches**: bounded, TTL-limited caches with explicit release
//!
//! # Usage
//!
//! ```rust,ignore
//! use granulite::{CatalogConfig, CatalogFactory, GranuleQuery, StoreHandle, Envelope};
//!
//! let stack = CatalogFactory::create(
//!     CatalogConfig::new().with_caching(true),
//!     StoreHandle::Owned(store),
//!     None,
//! )?;
//! let granules = stack
//!     .catalog()
//!     .granules(&GranuleQuery::new().with_bbox(Envelope::new(0.0, 0.0, 10.0, 10.0)))?;
//! ```

pub mod cache;
pub mod catalog;
pub mod filter;
pub mod footprint;
pub mod geometry;
pub mod store;

pub use catalog::{
    Aggregate, AggregateResult, CatalogConfig, CatalogError, CatalogFactory, CatalogResult,
    CatalogStack, GranuleCatalog, GranuleDescriptor, GranuleQuery, GranuleVisitor, Hints,
    StoreHandle, VisitControl,
};
pub use filter::{Filter, FilterError};
pub use footprint::{FootprintConfig, FootprintError, FootprintInsetPolicy, MultiLevelRoi};
pub use geometry::Envelope;
pub use store::{MemoryRecordStore, Record, RecordStore, Schema, Transaction, Value};

/// Granulite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Granulite crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
