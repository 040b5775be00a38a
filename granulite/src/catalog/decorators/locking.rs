// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Readers/writer locking around a catalog
//!
//! Queries and descriptions take a read permit, mutations and dispose take
//! the write permit. A stream keeps its read permit until it is dropped, so
//! no mutation can interleave with a running visit.

use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;

use super::DelegatingCatalog;
use crate::catalog::{
    Aggregate, AggregateResult, CatalogResult, GranuleCatalog, GranuleDescriptor, GranuleIter,
    GranuleQuery, QueryCapabilities,
};
use crate::geometry::Envelope;
use crate::store::{Record, Schema, Transaction};

/// Stream that holds a read permit while it lives
struct GuardedIter<'a> {
    // Declared first so it drops before the permit
    inner: GranuleIter<'a>,
    _permit: RwLockReadGuard<'a, ()>,
}

impl Iterator for GuardedIter<'_> {
    type Item = CatalogResult<Arc<GranuleDescriptor>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

pub struct LockingCatalog {
    base: DelegatingCatalog,
    lock: RwLock<()>,
}

impl LockingCatalog {
    pub fn new(inner: Arc<dyn GranuleCatalog>, owns_inner: bool) -> Self {
        Self {
            base: DelegatingCatalog::new(inner, owns_inner),
            lock: RwLock::new(()),
        }
    }
}

impl GranuleCatalog for LockingCatalog {
    fn stream(&self, query: &GranuleQuery) -> CatalogResult<GranuleIter<'_>> {
        let permit = self.lock.read_recursive();
        let inner = self.base.stream(query)?;
        Ok(Box::new(GuardedIter {
            inner,
            _permit: permit,
        }))
    }

    fn add_granules(
        &self,
        type_name: &str,
        records: Vec<Record>,
        txn: &Transaction,
    ) -> CatalogResult<usize> {
        let _permit = self.lock.write();
        self.base.add_granules(type_name, records, txn)
    }

    fn remove_granules(&self, query: &GranuleQuery, txn: &Transaction) -> CatalogResult<usize> {
        let _permit = self.lock.write();
        self.base.remove_granules(query, txn)
    }

    fn commit(&self, txn: &Transaction) -> CatalogResult<usize> {
        let _permit = self.lock.write();
        self.base.commit(txn)
    }

    fn create_type(&self, schema: Schema) -> CatalogResult<()> {
        let _permit = self.lock.write();
        self.base.create_type(schema)
    }

    fn remove_type(&self, type_name: &str) -> CatalogResult<()> {
        let _permit = self.lock.write();
        self.base.remove_type(type_name)
    }

    fn type_names(&self) -> CatalogResult<Vec<String>> {
        let _permit = self.lock.read_recursive();
        self.base.type_names()
    }

    fn schema(&self, type_name: &str) -> CatalogResult<Schema> {
        let _permit = self.lock.read_recursive();
        self.base.schema(type_name)
    }

    fn bounds(&self, type_name: &str) -> CatalogResult<Option<Envelope>> {
        let _permit = self.lock.read_recursive();
        self.base.bounds(type_name)
    }

    fn query_capabilities(&self, type_name: &str) -> CatalogResult<QueryCapabilities> {
        let _permit = self.lock.read_recursive();
        self.base.query_capabilities(type_name)
    }

    fn dispose(&self) -> CatalogResult<()> {
        let _permit = self.lock.write();
        self.base.dispose()
    }

    fn is_disposed(&self) -> bool {
        self.base.is_disposed()
    }

    fn count(&self, query: &GranuleQuery) -> CatalogResult<usize> {
        let _permit = self.lock.read_recursive();
        self.base.count(query)
    }

    fn aggregate(&self, query: &GranuleQuery, function: &Aggregate) -> CatalogResult<AggregateResult> {
        let _permit = self.lock.read_recursive();
        self.base.aggregate(query, function)
    }
}
