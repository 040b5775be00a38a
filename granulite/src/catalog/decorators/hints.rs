// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Default hint merging
//!
//! Adds the configured default hints to every query; hints the caller set
//! are never overwritten.

use std::borrow::Cow;
use std::sync::Arc;

use super::DelegatingCatalog;
use crate::catalog::{
    Aggregate, AggregateResult, CatalogResult, GranuleCatalog, GranuleIter, GranuleQuery, Hints,
    QueryCapabilities,
};
use crate::geometry::Envelope;
use crate::store::{Record, Schema, Transaction};

pub struct HintMergingCatalog {
    base: DelegatingCatalog,
    defaults: Hints,
}

impl HintMergingCatalog {
    pub fn new(inner: Arc<dyn GranuleCatalog>, owns_inner: bool, defaults: Hints) -> Self {
        Self {
            base: DelegatingCatalog::new(inner, owns_inner),
            defaults,
        }
    }

    pub fn defaults(&self) -> &Hints {
        &self.defaults
    }

    fn merged<'q>(&self, query: &'q GranuleQuery) -> Cow<'q, GranuleQuery> {
        if self.defaults.iter().all(|(key, _)| query.hints.contains(key)) {
            return Cow::Borrowed(query);
        }
        let mut merged = query.clone();
        merged.hints.merge_defaults(&self.defaults);
        Cow::Owned(merged)
    }
}

impl GranuleCatalog for HintMergingCatalog {
    fn stream(&self, query: &GranuleQuery) -> CatalogResult<GranuleIter<'_>> {
        self.base.stream(&self.merged(query))
    }

    fn add_granules(
        &self,
        type_name: &str,
        records: Vec<Record>,
        txn: &Transaction,
    ) -> CatalogResult<usize> {
        self.base.add_granules(type_name, records, txn)
    }

    fn remove_granules(&self, query: &GranuleQuery, txn: &Transaction) -> CatalogResult<usize> {
        self.base.remove_granules(&self.merged(query), txn)
    }

    fn commit(&self, txn: &Transaction) -> CatalogResult<usize> {
        self.base.commit(txn)
    }

    fn create_type(&self, schema: Schema) -> CatalogResult<()> {
        self.base.create_type(schema)
    }

    fn remove_type(&self, type_name: &str) -> CatalogResult<()> {
        self.base.remove_type(type_name)
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
        self.base.dispose()
    }

    fn is_disposed(&self) -> bool {
        self.base.is_disposed()
    }

    fn count(&self, query: &GranuleQuery) -> CatalogResult<usize> {
        self.base.count(&self.merged(query))
    }

    fn aggregate(&self, query: &GranuleQuery, function: &Aggregate) -> CatalogResult<AggregateResult> {
        self.base.aggregate(&self.merged(query), function)
    }
}
