// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Forwarding base shared by the catalog decorators

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::catalog::traits::ensure_active;
use crate::catalog::{
    Aggregate, AggregateResult, CatalogResult, GranuleCatalog, GranuleIter, GranuleQuery,
    QueryCapabilities,
};
use crate::geometry::Envelope;
use crate::store::{Record, Schema, Transaction};

/// Forwards every call to an inner catalog
///
/// Tracks its own disposed state; the inner catalog is disposed along with it
/// only when owned.
pub struct DelegatingCatalog {
    inner: Arc<dyn GranuleCatalog>,
    owns_inner: bool,
    disposed: AtomicBool,
}

impl DelegatingCatalog {
    pub fn new(inner: Arc<dyn GranuleCatalog>, owns_inner: bool) -> Self {
        Self {
            inner,
            owns_inner,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &Arc<dyn GranuleCatalog> {
        &self.inner
    }

    pub fn owns_inner(&self) -> bool {
        self.owns_inner
    }

    /// The inner catalog, failing once disposed
    pub fn active(&self) -> CatalogResult<&Arc<dyn GranuleCatalog>> {
        ensure_active(self.is_disposed())?;
        Ok(&self.inner)
    }
}

impl GranuleCatalog for DelegatingCatalog {
    fn stream(&self, query: &GranuleQuery) -> CatalogResult<GranuleIter<'_>> {
        self.active()?.stream(query)
    }

    fn add_granules(
        &self,
        type_name: &str,
        records: Vec<Record>,
        txn: &Transaction,
    ) -> CatalogResult<usize> {
        self.active()?.add_granules(type_name, records, txn)
    }

    fn remove_granules(&self, query: &GranuleQuery, txn: &Transaction) -> CatalogResult<usize> {
        self.active()?.remove_granules(query, txn)
    }

    fn commit(&self, txn: &Transaction) -> CatalogResult<usize> {
        self.active()?.commit(txn)
    }

    fn create_type(&self, schema: Schema) -> CatalogResult<()> {
        self.active()?.create_type(schema)
    }

    fn remove_type(&self, type_name: &str) -> CatalogResult<()> {
        self.active()?.remove_type(type_name)
    }

    fn type_names(&self) -> CatalogResult<Vec<String>> {
        self.active()?.type_names()
    }

    fn schema(&self, type_name: &str) -> CatalogResult<Schema> {
        self.active()?.schema(type_name)
    }

    fn bounds(&self, type_name: &str) -> CatalogResult<Option<Envelope>> {
        self.active()?.bounds(type_name)
    }

    fn query_capabilities(&self, type_name: &str) -> CatalogResult<QueryCapabilities> {
        self.active()?.query_capabilities(type_name)
    }

    fn dispose(&self) -> CatalogResult<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.owns_inner {
            self.inner.dispose()?;
        }
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn count(&self, query: &GranuleQuery) -> CatalogResult<usize> {
        self.active()?.count(query)
    }

    fn aggregate(&self, query: &GranuleQuery, function: &Aggregate) -> CatalogResult<AggregateResult> {
        self.active()?.aggregate(query, function)
    }
}
