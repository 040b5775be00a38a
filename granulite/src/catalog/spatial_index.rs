// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory spatial index over a granule catalog
//!
//! The index is an R-tree bulk loaded once per type from every granule of
//! the wrapped catalog. Queries use it to prune by bounding box, then apply
//! the full filter, sort and cap. Mutations drop the index instead of
//! patching it; the next query rebuilds.
//!
//! Rebuilds are coordinated through one mutex guarding a per-type
//! [`IndexState`] and a condition variable. Exactly one thread builds for a
//! given generation while others wait, and a build that raced with an
//! invalidation is thrown away and retried.

use log::{debug, info};
use parking_lot::{Condvar, Mutex, MutexGuard};
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::descriptor::GranuleDescriptor;
use super::error::{CatalogError, CatalogResult};
use super::query::GranuleQuery;
use super::traits::{ensure_active, GranuleCatalog, GranuleIter, QueryCapabilities};
use crate::filter::Filter;
use crate::geometry::Envelope;
use crate::store::{sort_records, Record, Schema, Transaction};

/// One indexed granule
#[derive(Debug, Clone)]
pub struct IndexEntry {
    envelope: Envelope,
    /// Position in the wrapped catalog's natural order
    seq: usize,
    granule: Arc<GranuleDescriptor>,
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope.to_aabb()
    }
}

/// Bulk-loaded index of one granule type
pub struct TypeIndex {
    tree: RTree<IndexEntry>,
    geometry_attribute: String,
    generation: u64,
}

impl TypeIndex {
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Candidates for a filter in natural order
    fn candidates(&self, filter: &Filter) -> Vec<&IndexEntry> {
        let mut candidates: Vec<&IndexEntry> = match filter.spatial_envelope(&self.geometry_attribute) {
            Some(envelope) if envelope.is_empty() => Vec::new(),
            Some(envelope) => self
                .tree
                .locate_in_envelope_intersecting(&envelope.to_aabb())
                .collect(),
            None => self.tree.iter().collect(),
        };
        candidates.sort_unstable_by_key(|entry| entry.seq);
        candidates
    }
}

/// Build state of one type's index
#[derive(Clone)]
pub enum IndexState {
    Missing,
    Building(u64),
    Ready(u64, Arc<TypeIndex>),
}

struct IndexSlots {
    generation: u64,
    states: HashMap<String, IndexState>,
}

impl IndexSlots {
    fn state(&self, type_name: &str) -> IndexState {
        self.states
            .get(type_name)
            .cloned()
            .unwrap_or(IndexState::Missing)
    }
}

pub struct StrTreeGranuleCatalog {
    inner: Arc<dyn GranuleCatalog>,
    slots: Mutex<IndexSlots>,
    built: Condvar,
    builds: AtomicUsize,
    disposed: AtomicBool,
}

impl StrTreeGranuleCatalog {
    pub fn new(inner: Arc<dyn GranuleCatalog>) -> Self {
        Self {
            inner,
            slots: Mutex::new(IndexSlots {
                generation: 0,
                states: HashMap::new(),
            }),
            built: Condvar::new(),
            builds: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    /// Number of completed index builds
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Acquire)
    }

    /// Current generation; bumped by every invalidation
    pub fn generation(&self) -> u64 {
        self.slots.lock().generation
    }

    /// Whether a ready index is held for a type
    pub fn is_indexed(&self, type_name: &str) -> bool {
        matches!(self.slots.lock().state(type_name), IndexState::Ready(..))
    }

    /// Drop every built index under memory pressure; the next query rebuilds
    pub fn release_index(&self) {
        let mut slots = self.slots.lock();
        let before = slots.states.len();
        slots
            .states
            .retain(|_, state| matches!(state, IndexState::Building(_)));
        debug!("Released {} spatial indexes", before - slots.states.len());
    }

    /// Drop all indexes and start a new generation
    pub fn invalidate(&self) {
        let mut slots = self.slots.lock();
        slots.generation += 1;
        slots.states.clear();
        debug!("Spatial index invalidated, generation {}", slots.generation);
        self.built.notify_all();
    }

    fn canonical_type(&self, requested: Option<&str>) -> CatalogResult<String> {
        match requested {
            Some(name) => Ok(self.inner.schema(name)?.type_name),
            None => self
                .inner
                .type_names()?
                .into_iter()
                .next()
                .ok_or_else(|| CatalogError::TypeNotFound("no mosaic type available".to_string())),
        }
    }

    fn build(&self, type_name: &str, generation: u64) -> CatalogResult<TypeIndex> {
        let started = Instant::now();
        let schema = self.inner.schema(type_name)?;
        let granules = self
            .inner
            .stream(&GranuleQuery::for_type(type_name))?
            .collect::<CatalogResult<Vec<_>>>()?;

        let entries: Vec<IndexEntry> = granules
            .into_par_iter()
            .enumerate()
            .filter(|(_, granule)| !granule.envelope().is_empty())
            .map(|(seq, granule)| IndexEntry {
                envelope: *granule.envelope(),
                seq,
                granule,
            })
            .collect();
        let indexed = entries.len();
        let tree = RTree::bulk_load(entries);

        self.builds.fetch_add(1, Ordering::AcqRel);
        info!(
            "Built spatial index for {} with {} granules in {:?}",
            type_name,
            indexed,
            started.elapsed()
        );
        Ok(TypeIndex {
            tree,
            geometry_attribute: schema.geometry_attribute.unwrap_or_default(),
            generation,
        })
    }

    /// Ready index of a type, building it if needed
    pub fn index(&self, type_name: &str) -> CatalogResult<Arc<TypeIndex>> {
        let mut slots = self.slots.lock();
        loop {
            match slots.state(type_name) {
                IndexState::Ready(_, index) => return Ok(index),
                IndexState::Building(_) => self.built.wait(&mut slots),
                IndexState::Missing => {
                    let generation = slots.generation;
                    slots
                        .states
                        .insert(type_name.to_string(), IndexState::Building(generation));
                    let result = MutexGuard::unlocked(&mut slots, || self.build(type_name, generation));

                    if slots.generation != generation {
                        debug!("Discarding index of {} built for stale generation {}", type_name, generation);
                        self.built.notify_all();
                        result?;
                        continue;
                    }
                    match result {
                        Ok(index) => {
                            let index = Arc::new(index);
                            slots.states.insert(
                                type_name.to_string(),
                                IndexState::Ready(generation, index.clone()),
                            );
                            self.built.notify_all();
                            return Ok(index);
                        }
                        Err(e) => {
                            slots.states.remove(type_name);
                            self.built.notify_all();
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    fn after_mutation<T>(&self, result: CatalogResult<T>) -> CatalogResult<T> {
        if result.is_ok() {
            self.invalidate();
        }
        result
    }
}

impl GranuleCatalog for StrTreeGranuleCatalog {
    fn stream(&self, query: &GranuleQuery) -> CatalogResult<GranuleIter<'_>> {
        ensure_active(self.is_disposed())?;
        if query.filter == Filter::Exclude {
            return Ok(Box::new(std::iter::empty::<CatalogResult<Arc<GranuleDescriptor>>>()));
        }
        let type_name = self.canonical_type(query.type_name.as_deref())?;
        let index = self.index(&type_name)?;

        let filter = query.filter.with_default_geometry(&index.geometry_attribute);
        let mut matches: Vec<Arc<GranuleDescriptor>> = index
            .candidates(&filter)
            .into_iter()
            .filter(|entry| filter.evaluate(entry.granule.record()))
            .map(|entry| entry.granule.clone())
            .collect();
        if !query.sort_by.is_empty() {
            sort_records(&mut matches, &query.sort_by, |g| g.record());
        }
        if let Some(max) = query.max_features {
            matches.truncate(max);
        }
        debug!("Index query on {} returned {} granules", type_name, matches.len());
        Ok(Box::new(matches.into_iter().map(Ok::<_, CatalogError>)))
    }

    fn add_granules(
        &self,
        type_name: &str,
        records: Vec<Record>,
        txn: &Transaction,
    ) -> CatalogResult<usize> {
        ensure_active(self.is_disposed())?;
        self.after_mutation(self.inner.add_granules(type_name, records, txn))
    }

    fn remove_granules(&self, query: &GranuleQuery, txn: &Transaction) -> CatalogResult<usize> {
        ensure_active(self.is_disposed())?;
        self.after_mutation(self.inner.remove_granules(query, txn))
    }

    fn commit(&self, txn: &Transaction) -> CatalogResult<usize> {
        ensure_active(self.is_disposed())?;
        self.after_mutation(self.inner.commit(txn))
    }

    fn create_type(&self, schema: Schema) -> CatalogResult<()> {
        ensure_active(self.is_disposed())?;
        self.after_mutation(self.inner.create_type(schema))
    }

    fn remove_type(&self, type_name: &str) -> CatalogResult<()> {
        ensure_active(self.is_disposed())?;
        self.after_mutation(self.inner.remove_type(type_name))
    }

    fn type_names(&self) -> CatalogResult<Vec<String>> {
        ensure_active(self.is_disposed())?;
        self.inner.type_names()
    }

    fn schema(&self, type_name: &str) -> CatalogResult<Schema> {
        ensure_active(self.is_disposed())?;
        self.inner.schema(type_name)
    }

    fn bounds(&self, type_name: &str) -> CatalogResult<Option<Envelope>> {
        ensure_active(self.is_disposed())?;
        self.inner.bounds(type_name)
    }

    fn query_capabilities(&self, type_name: &str) -> CatalogResult<QueryCapabilities> {
        ensure_active(self.is_disposed())?;
        self.inner.query_capabilities(type_name)
    }

    fn dispose(&self) -> CatalogResult<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.invalidate();
        self.inner.dispose()
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
