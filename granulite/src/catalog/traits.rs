// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Granule catalog trait
//!
//! Every layer of the catalog stack (store-backed catalog, spatial index,
//! locking, result cache, hint merging) implements [`GranuleCatalog`] and
//! forwards to an inner instance where it does not handle a call itself.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::descriptor::GranuleDescriptor;
use super::error::{CatalogError, CatalogResult};
use super::query::GranuleQuery;
use crate::geometry::Envelope;
use crate::store::{Record, Schema, Transaction, Value};

/// Lazy, forward-only sequence of granules
///
/// Dropping the iterator cancels the query.
pub type GranuleIter<'a> =
    Box<dyn Iterator<Item = CatalogResult<Arc<GranuleDescriptor>>> + Send + 'a>;

/// Whether a visit should go on after the current granule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitControl {
    Continue,
    /// Stop early; this is a normal outcome, not a failure
    Complete,
}

/// Receives granules during [`GranuleCatalog::visit`]
///
/// Returning an error aborts the visit and the error propagates to the caller.
pub trait GranuleVisitor {
    fn visit(&mut self, granule: &GranuleDescriptor) -> CatalogResult<VisitControl>;
}

impl<F> GranuleVisitor for F
where
    F: FnMut(&GranuleDescriptor) -> CatalogResult<VisitControl>,
{
    fn visit(&mut self, granule: &GranuleDescriptor) -> CatalogResult<VisitControl> {
        self(granule)
    }
}

/// Aggregate function over one attribute of the matching granules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregate {
    Min(String),
    Max(String),
    Unique(String),
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateResult {
    /// Min/max; `None` when no granule had a comparable value
    Value(Option<Value>),
    /// Distinct values in first-seen order
    Values(Vec<Value>),
    Count(usize),
}

/// What a catalog can do with queries of one type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCapabilities {
    pub sortable_attributes: Vec<String>,
    pub supports_max_features: bool,
    pub supports_paging: bool,
}

impl QueryCapabilities {
    pub fn supports_sorting(&self, attribute: &str) -> bool {
        self.sortable_attributes.iter().any(|a| a == attribute)
    }
}

pub trait GranuleCatalog: Send + Sync {
    /// Lazily stream the granules matching a query
    fn stream(&self, query: &GranuleQuery) -> CatalogResult<GranuleIter<'_>>;

    fn add_granules(
        &self,
        type_name: &str,
        records: Vec<Record>,
        txn: &Transaction,
    ) -> CatalogResult<usize>;

    /// Remove the granules matching a query, returning how many matched
    fn remove_granules(&self, query: &GranuleQuery, txn: &Transaction) -> CatalogResult<usize>;

    /// Apply the staged writes of an explicit transaction
    fn commit(&self, txn: &Transaction) -> CatalogResult<usize>;

    fn create_type(&self, schema: Schema) -> CatalogResult<()>;

    /// Drop a type and all its granules
    fn remove_type(&self, type_name: &str) -> CatalogResult<()>;

    /// Names of the valid mosaic types
    fn type_names(&self) -> CatalogResult<Vec<String>>;

    fn schema(&self, type_name: &str) -> CatalogResult<Schema>;

    /// Union of all granule envelopes of a type
    fn bounds(&self, type_name: &str) -> CatalogResult<Option<Envelope>>;

    fn query_capabilities(&self, type_name: &str) -> CatalogResult<QueryCapabilities>;

    /// Release resources; idempotent
    fn dispose(&self) -> CatalogResult<()>;

    fn is_disposed(&self) -> bool;

    /// Eager form of [`GranuleCatalog::stream`]
    fn granules(&self, query: &GranuleQuery) -> CatalogResult<Vec<Arc<GranuleDescriptor>>> {
        self.stream(query)?.collect()
    }

    /// Drive a visitor over the granules matching a query
    fn visit(&self, query: &GranuleQuery, visitor: &mut dyn GranuleVisitor) -> CatalogResult<()> {
        for granule in self.stream(query)? {
            let granule = granule?;
            if visitor.visit(&granule)? == VisitControl::Complete {
                break;
            }
        }
        Ok(())
    }

    fn count(&self, query: &GranuleQuery) -> CatalogResult<usize> {
        let mut count = 0;
        for granule in self.stream(query)? {
            granule?;
            count += 1;
        }
        Ok(count)
    }

    fn aggregate(&self, query: &GranuleQuery, function: &Aggregate) -> CatalogResult<AggregateResult> {
        aggregate_granules(self.stream(query)?, function)
    }
}

/// Compute an aggregate over a granule sequence
pub fn aggregate_granules(
    granules: GranuleIter<'_>,
    function: &Aggregate,
) -> CatalogResult<AggregateResult> {
    match function {
        Aggregate::Count => {
            let mut count = 0;
            for granule in granules {
                granule?;
                count += 1;
            }
            Ok(AggregateResult::Count(count))
        }
        Aggregate::Min(attr) | Aggregate::Max(attr) => {
            let want_max = matches!(function, Aggregate::Max(_));
            let mut best: Option<Value> = None;
            for granule in granules {
                let granule = granule?;
                let Some(value) = granule.attribute(attr).filter(|v| !v.is_null()) else {
                    continue;
                };
                let replace = match &best {
                    None => value.compare(value).is_some(),
                    Some(current) => match value.compare(current) {
                        Some(ord) if want_max => ord.is_gt(),
                        Some(ord) => ord.is_lt(),
                        None => false,
                    },
                };
                if replace {
                    best = Some(value.clone());
                }
            }
            Ok(AggregateResult::Value(best))
        }
        Aggregate::Unique(attr) => {
            let mut values: Vec<Value> = Vec::new();
            for granule in granules {
                let granule = granule?;
                if let Some(value) = granule.attribute(attr).filter(|v| !v.is_null()) {
                    if !values.iter().any(|v| v.loosely_equals(value)) {
                        values.push(value.clone());
                    }
                }
            }
            Ok(AggregateResult::Values(values))
        }
    }
}

/// Fail with [`CatalogError::Disposed`] once a catalog was disposed
pub(crate) fn ensure_active(disposed: bool) -> CatalogResult<()> {
    if disposed {
        Err(CatalogError::Disposed)
    } else {
        Ok(())
    }
}
