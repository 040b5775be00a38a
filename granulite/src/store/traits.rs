// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Record store trait
//!
//! All record stores must implement this trait so the store-backed catalog can
//! work against any backend.

use super::transaction::PendingWrite;
use super::types::{Record, Schema, SortBy, StoreError, StoreResult};
use crate::filter::Filter;
use crate::geometry::Envelope;

/// Lazy sequence of records returned by a store query
pub type RecordIter<'a> = Box<dyn Iterator<Item = StoreResult<Record>> + Send + 'a>;

/// Query sent to a record store
#[derive(Debug, Clone)]
pub struct StoreQuery {
    pub filter: Filter,
    pub sort_by: Vec<SortBy>,
    pub max_features: Option<usize>,
}

impl StoreQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            sort_by: Vec::new(),
            max_features: None,
        }
    }

    pub fn all() -> Self {
        Self::new(Filter::Include)
    }
}

/// Pluggable store of georeferenced records
pub trait RecordStore: Send + Sync {
    /// Names of all record types held by the store
    fn type_names(&self) -> StoreResult<Vec<String>>;

    /// Describe one record type
    fn schema(&self, type_name: &str) -> StoreResult<Schema>;

    fn create_schema(&self, schema: Schema) -> StoreResult<()>;

    /// Drop a record type and all its records
    fn remove_schema(&self, type_name: &str) -> StoreResult<()>;

    /// Query records of a type
    fn query(&self, type_name: &str, query: &StoreQuery) -> StoreResult<RecordIter<'_>>;

    /// Insert records, returning the assigned identifiers
    fn insert(&self, type_name: &str, records: Vec<Record>) -> StoreResult<Vec<String>>;

    /// Delete records matching a filter, returning how many were deleted
    fn delete(&self, type_name: &str, filter: &Filter) -> StoreResult<usize>;

    /// Apply a batch of writes atomically: either all apply or none do
    fn apply(&self, writes: Vec<PendingWrite>) -> StoreResult<usize>;

    /// Release backend resources; further calls fail with [`StoreError::Closed`]
    fn close(&self) -> StoreResult<()>;

    fn count(&self, type_name: &str, query: &StoreQuery) -> StoreResult<usize> {
        let mut count = 0;
        for record in self.query(type_name, query)? {
            record?;
            count += 1;
        }
        Ok(count)
    }

    /// Union of the default geometry envelopes of a type
    fn bounds(&self, type_name: &str) -> StoreResult<Option<Envelope>> {
        let schema = self.schema(type_name)?;
        let geometry_attribute = schema.geometry_attribute.ok_or_else(|| {
            StoreError::InvalidSchema(format!("{} has no geometry attribute", type_name))
        })?;
        let mut bounds = Envelope::empty();
        for record in self.query(type_name, &StoreQuery::all())? {
            let record = record?;
            if let Some(env) = record
                .geometry(&geometry_attribute)
                .and_then(Envelope::of_geometry)
            {
                bounds.expand_to_include(&env);
            }
        }
        Ok((!bounds.is_empty()).then_some(bounds))
    }
}
