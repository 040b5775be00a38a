// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the granule catalog

use thiserror::Error;

use crate::filter::FilterError;
use crate::footprint::FootprintError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// The catalog was disposed; never retried
    #[error("Catalog has been disposed")]
    Disposed,

    #[error("Store error during {context}: {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("Invalid granule record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("Failed to load footprint for {path}: {source}")]
    Footprint {
        path: String,
        #[source]
        source: FootprintError,
    },

    #[error("Schema resolution failed: {0}")]
    SchemaResolution(String),

    #[error("Type not found: {0}")]
    TypeNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Visitor failed: {0}")]
    Visitor(String),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl CatalogError {
    /// Wrap a store error with the operation that raised it
    pub fn store(context: impl Into<String>) -> impl FnOnce(StoreError) -> CatalogError {
        let context = context.into();
        move |source| CatalogError::Store { context, source }
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, CatalogError::Disposed)
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
