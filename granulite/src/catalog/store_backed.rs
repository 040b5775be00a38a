// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Store-backed granule catalog
//!
//! Binds the catalog contract to one [`RecordStore`]. Queries are translated
//! into store queries and every returned record is turned into a
//! [`GranuleDescriptor`], with the footprint attached when a provider is set.

use log::{debug, info, warn};
use parking_lot::RwLock;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::config::{CatalogConfig, GranuleRemovalPolicy};
use super::descriptor::GranuleDescriptor;
use super::error::{CatalogError, CatalogResult};
use super::query::GranuleQuery;
use super::traits::{ensure_active, GranuleCatalog, GranuleIter, QueryCapabilities};
use crate::filter::Filter;
use crate::footprint::{GranuleContext, MultiLevelRoiProvider};
use crate::geometry::Envelope;
use crate::store::{PendingWrite, Record, RecordStore, Schema, StoreQuery, Transaction};

/// A record store together with who is responsible for closing it
#[derive(Clone)]
pub enum StoreHandle {
    /// Created for this catalog; closed on dispose
    Owned(Arc<dyn RecordStore>),
    /// Shared with the caller; never closed by the catalog
    Borrowed(Arc<dyn RecordStore>),
}

impl StoreHandle {
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        match self {
            StoreHandle::Owned(store) | StoreHandle::Borrowed(store) => store,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, StoreHandle::Owned(_))
    }
}

/// Whether a schema can describe mosaic granules
pub fn is_mosaic_schema(schema: &Schema, location_attribute: &str) -> bool {
    schema.geometry_attribute.is_some() && schema.has_attribute(location_attribute)
}

pub struct StoreGranuleCatalog {
    config: Arc<CatalogConfig>,
    store: StoreHandle,
    footprints: Option<Arc<dyn MultiLevelRoiProvider>>,
    type_names: RwLock<Vec<String>>,
    disposed: AtomicBool,
}

impl StoreGranuleCatalog {
    pub fn new(
        config: Arc<CatalogConfig>,
        store: StoreHandle,
        footprints: Option<Arc<dyn MultiLevelRoiProvider>>,
    ) -> CatalogResult<Self> {
        config.validate().map_err(CatalogError::InvalidParameters)?;
        let type_names = resolve_type_names(&config, store.store().as_ref())?;
        info!(
            "Opened granule catalog over {} store with types {:?}",
            if store.is_owned() { "owned" } else { "borrowed" },
            type_names
        );
        Ok(Self {
            config,
            store,
            footprints,
            type_names: RwLock::new(type_names),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn footprints(&self) -> Option<&Arc<dyn MultiLevelRoiProvider>> {
        self.footprints.as_ref()
    }

    pub(crate) fn store(&self) -> &Arc<dyn RecordStore> {
        self.store.store()
    }

    fn names_match(&self, a: &str, b: &str) -> bool {
        if self.config.wrap_store {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    /// Store name of a requested type; `None` picks the first mosaic type
    fn resolve_type(&self, requested: Option<&str>) -> CatalogResult<String> {
        let names = self.type_names.read();
        match requested {
            None => names
                .first()
                .cloned()
                .ok_or_else(|| CatalogError::TypeNotFound("no mosaic type available".to_string())),
            Some(name) => names
                .iter()
                .find(|n| self.names_match(n, name))
                .cloned()
                .ok_or_else(|| CatalogError::TypeNotFound(name.to_string())),
        }
    }

    fn describe(&self, type_name: &str) -> CatalogResult<Schema> {
        self.store()
            .schema(type_name)
            .map_err(CatalogError::store(format!("describe {}", type_name)))
    }

    /// Turn a record into a descriptor; `Ok(None)` for malformed records
    fn build_descriptor(
        &self,
        schema: &Schema,
        record: Record,
    ) -> CatalogResult<Option<GranuleDescriptor>> {
        let location = match record.get(&self.config.location_attribute).and_then(|v| v.as_str()) {
            Some(location) if !location.is_empty() => location.to_string(),
            _ => {
                warn!("Skipping granule {}: no {} attribute", record.id, self.config.location_attribute);
                return Ok(None);
            }
        };
        let geometry = schema
            .geometry_attribute
            .as_deref()
            .and_then(|name| record.geometry(name));
        let Some(envelope) = geometry.and_then(Envelope::of_geometry) else {
            warn!("Skipping granule {}: no geometry", record.id);
            return Ok(None);
        };
        let resolved = match self.config.resolve_location(&location) {
            Ok(resolved) => resolved,
            Err(reason) => {
                warn!("Skipping granule {}: cannot resolve {}: {}", record.id, location, reason);
                return Ok(None);
            }
        };

        let roi = match &self.footprints {
            Some(provider) => {
                let context = GranuleContext {
                    record: &record,
                    location: &location,
                    resolved_location: &resolved,
                    envelope: &envelope,
                };
                provider
                    .roi(&context)
                    .map_err(|source| CatalogError::Footprint {
                        path: resolved.clone(),
                        source,
                    })?
            }
            None => None,
        };

        Ok(Some(
            GranuleDescriptor::new(record, location, resolved, envelope)
                .with_suggestions(
                    self.config.suggested_format.clone(),
                    self.config.suggested_reader.clone(),
                )
                .with_heterogeneous(self.config.heterogeneous)
                .with_roi(roi),
        ))
    }

    fn check_record(&self, record: &Record) -> CatalogResult<()> {
        match record.get(&self.config.location_attribute).and_then(|v| v.as_str()) {
            Some(location) if !location.is_empty() => Ok(()),
            _ => Err(CatalogError::InvalidRecord {
                id: record.id.clone(),
                reason: format!("missing {} attribute", self.config.location_attribute),
            }),
        }
    }

    /// Files to delete along with the records matching `filter`
    fn removal_targets(&self, type_name: &str, filter: &Filter) -> CatalogResult<Vec<PathBuf>> {
        let policy = self.config.removal_policy;
        if policy == GranuleRemovalPolicy::None {
            return Ok(Vec::new());
        }
        let schema = self.describe(type_name)?;
        let records = self
            .store()
            .query(type_name, &StoreQuery::new(filter.clone()))
            .map_err(CatalogError::store(format!("query {}", type_name)))?;

        let mut targets = Vec::new();
        for record in records {
            let record = record.map_err(CatalogError::store(format!("query {}", type_name)))?;
            let Some(location) = record
                .get(&self.config.location_attribute)
                .and_then(|v| v.as_str())
                .map(str::to_string)
            else {
                continue;
            };
            let Ok(resolved) = self.config.resolve_location(&location) else {
                continue;
            };
            let envelope = schema
                .geometry_attribute
                .as_deref()
                .and_then(|name| record.geometry(name))
                .and_then(Envelope::of_geometry)
                .unwrap_or_else(Envelope::empty);
            if let Some(provider) = &self.footprints {
                let context = GranuleContext {
                    record: &record,
                    location: &location,
                    resolved_location: &resolved,
                    envelope: &envelope,
                };
                targets.extend(provider.sidecar_files(&context));
            }
            if policy == GranuleRemovalPolicy::All {
                targets.push(PathBuf::from(resolved));
            }
        }
        Ok(targets)
    }

    fn purge_files(&self, files: Vec<PathBuf>) {
        if files.is_empty() {
            return;
        }
        for file in &files {
            match fs::remove_file(file) {
                Ok(()) => debug!("Deleted {}", file.display()),
                Err(e) => warn!("Could not delete {}: {}", file.display(), e),
            }
        }
        if let Some(provider) = &self.footprints {
            provider.release();
        }
    }
}

fn resolve_type_names(config: &CatalogConfig, store: &dyn RecordStore) -> CatalogResult<Vec<String>> {
    let available = store
        .type_names()
        .map_err(CatalogError::store("list types"))?;
    let is_valid = |name: &str| -> CatalogResult<bool> {
        let schema = store
            .schema(name)
            .map_err(CatalogError::store(format!("describe {}", name)))?;
        Ok(is_mosaic_schema(&schema, &config.location_attribute))
    };

    if config.type_names.is_empty() {
        for name in &available {
            if is_valid(name)? {
                debug!("Using {} as the mosaic type", name);
                return Ok(vec![name.clone()]);
            }
        }
        debug!("Store has no mosaic type yet");
        return Ok(Vec::new());
    }

    let mut resolved = Vec::with_capacity(config.type_names.len());
    for wanted in &config.type_names {
        let found = available.iter().find(|name| {
            if config.wrap_store {
                name.eq_ignore_ascii_case(wanted)
            } else {
                *name == wanted
            }
        });
        let Some(name) = found else {
            return Err(CatalogError::SchemaResolution(format!(
                "configured type {} does not exist in the store",
                wanted
            )));
        };
        if !is_valid(name)? {
            return Err(CatalogError::SchemaResolution(format!(
                "type {} lacks a geometry or the {} attribute",
                name, config.location_attribute
            )));
        }
        resolved.push(name.clone());
    }
    Ok(resolved)
}

impl GranuleCatalog for StoreGranuleCatalog {
    fn stream(&self, query: &GranuleQuery) -> CatalogResult<GranuleIter<'_>> {
        ensure_active(self.is_disposed())?;
        let type_name = self.resolve_type(query.type_name.as_deref())?;
        let schema = self.describe(&type_name)?;
        debug!("Store query on {}: {}", type_name, query);

        let store_query = StoreQuery {
            filter: query.filter.clone(),
            sort_by: query.sort_by.clone(),
            max_features: None,
        };
        let records = self
            .store()
            .query(&type_name, &store_query)
            .map_err(CatalogError::store(format!("query {}", type_name)))?;

        let context = format!("query {}", type_name);
        let granules = records.filter_map(move |record| {
            let record = match record {
                Ok(record) => record,
                Err(e) => return Some(Err(CatalogError::store(context.clone())(e))),
            };
            self.build_descriptor(&schema, record)
                .map(|d| d.map(Arc::new))
                .transpose()
        });
        Ok(match query.max_features {
            Some(max) => Box::new(granules.take(max)),
            None => Box::new(granules),
        })
    }

    fn add_granules(
        &self,
        type_name: &str,
        records: Vec<Record>,
        txn: &Transaction,
    ) -> CatalogResult<usize> {
        ensure_active(self.is_disposed())?;
        let type_name = self.resolve_type(Some(type_name))?;
        for record in &records {
            self.check_record(record)?;
        }
        let count = records.len();
        if txn.is_auto_commit() {
            self.store()
                .insert(&type_name, records)
                .map_err(CatalogError::store(format!("add granules to {}", type_name)))?;
            debug!("Added {} granules to {}", count, type_name);
        } else {
            txn.stage(PendingWrite::Add {
                type_name: type_name.clone(),
                records,
            })
            .map_err(CatalogError::store("stage add"))?;
            debug!("Staged {} granules for {} in {}", count, type_name, txn.id());
        }
        Ok(count)
    }

    fn remove_granules(&self, query: &GranuleQuery, txn: &Transaction) -> CatalogResult<usize> {
        ensure_active(self.is_disposed())?;
        let type_name = self.resolve_type(query.type_name.as_deref())?;
        let filter = query.filter.clone();

        if txn.is_auto_commit() {
            let targets = self.removal_targets(&type_name, &filter)?;
            let removed = self
                .store()
                .delete(&type_name, &filter)
                .map_err(CatalogError::store(format!("remove granules from {}", type_name)))?;
            self.purge_files(targets);
            debug!("Removed {} granules from {}", removed, type_name);
            Ok(removed)
        } else {
            let matching = self
                .store()
                .count(&type_name, &StoreQuery::new(filter.clone()))
                .map_err(CatalogError::store(format!("count {}", type_name)))?;
            txn.stage(PendingWrite::Remove { type_name, filter })
                .map_err(CatalogError::store("stage remove"))?;
            Ok(matching)
        }
    }

    fn commit(&self, txn: &Transaction) -> CatalogResult<usize> {
        ensure_active(self.is_disposed())?;
        if txn.is_auto_commit() {
            return Ok(0);
        }
        let writes = txn.take_staged().map_err(CatalogError::store("commit"))?;

        let targets = writes
            .iter()
            .filter_map(|write| match write {
                PendingWrite::Remove { type_name, filter } => {
                    Some(self.removal_targets(type_name, filter))
                }
                PendingWrite::Add { .. } => None,
            })
            .collect::<CatalogResult<Vec<_>>>()
            .map(|files| files.concat());
        let targets = match targets {
            Ok(targets) => targets,
            Err(e) => {
                txn.restore_staged(writes);
                return Err(e);
            }
        };

        match self.store().apply(writes.clone()) {
            Ok(affected) => {
                txn.mark_committed();
                self.purge_files(targets);
                info!("Committed {} ({} writes, {} records)", txn.id(), writes.len(), affected);
                Ok(affected)
            }
            Err(e) => {
                txn.restore_staged(writes);
                Err(CatalogError::store(format!("commit {}", txn.id()))(e))
            }
        }
    }

    fn create_type(&self, schema: Schema) -> CatalogResult<()> {
        ensure_active(self.is_disposed())?;
        if !is_mosaic_schema(&schema, &self.config.location_attribute) {
            return Err(CatalogError::InvalidParameters(format!(
                "type {} needs a geometry and a {} attribute",
                schema.type_name, self.config.location_attribute
            )));
        }
        let type_name = schema.type_name.clone();
        self.store()
            .create_schema(schema)
            .map_err(CatalogError::store(format!("create {}", type_name)))?;
        self.type_names.write().push(type_name.clone());
        info!("Created granule type {}", type_name);
        Ok(())
    }

    fn remove_type(&self, type_name: &str) -> CatalogResult<()> {
        ensure_active(self.is_disposed())?;
        let type_name = self.resolve_type(Some(type_name))?;
        self.store()
            .remove_schema(&type_name)
            .map_err(CatalogError::store(format!("remove {}", type_name)))?;
        self.type_names.write().retain(|n| *n != type_name);
        info!("Removed granule type {}", type_name);
        Ok(())
    }

    fn type_names(&self) -> CatalogResult<Vec<String>> {
        ensure_active(self.is_disposed())?;
        Ok(self.type_names.read().clone())
    }

    fn schema(&self, type_name: &str) -> CatalogResult<Schema> {
        ensure_active(self.is_disposed())?;
        let type_name = self.resolve_type(Some(type_name))?;
        self.describe(&type_name)
    }

    fn bounds(&self, type_name: &str) -> CatalogResult<Option<Envelope>> {
        ensure_active(self.is_disposed())?;
        let type_name = self.resolve_type(Some(type_name))?;
        self.store()
            .bounds(&type_name)
            .map_err(CatalogError::store(format!("bounds of {}", type_name)))
    }

    fn query_capabilities(&self, type_name: &str) -> CatalogResult<QueryCapabilities> {
        let schema = self.schema(type_name)?;
        Ok(QueryCapabilities {
            sortable_attributes: schema
                .attributes
                .iter()
                .filter(|a| a.kind.is_comparable())
                .map(|a| a.name.clone())
                .collect(),
            supports_max_features: true,
            supports_paging: false,
        })
    }

    fn dispose(&self) -> CatalogResult<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(provider) = &self.footprints {
            provider.release();
        }
        if self.store.is_owned() {
            self.store()
                .close()
                .map_err(CatalogError::store("close store"))?;
        }
        info!("Disposed granule catalog");
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PathType;
    use crate::store::{AttributeKind, MemoryRecordStore};
    use geo::{Geometry, Rect};

    fn tile_schema(name: &str) -> Schema {
        Schema::new(name)
            .with_geometry("the_geom")
            .with_attribute("location", AttributeKind::String)
            .with_attribute("time", AttributeKind::Timestamp)
    }

    fn tile(location: &str, x: f64) -> Record {
        Record::new()
            .with("location", location)
            .with("the_geom", Geometry::Rect(Rect::new((x, 0.0), (x + 1.0, 1.0))))
    }

    fn store_with_tiles() -> Arc<MemoryRecordStore> {
        let store = Arc::new(MemoryRecordStore::new());
        store.create_schema(tile_schema("tiles")).unwrap();
        store
            .insert("tiles", vec![tile("a.tif", 0.0), tile("b.tif", 2.0)])
            .unwrap();
        store
    }

    #[test]
    fn test_picks_first_valid_schema() {
        let store = store_with_tiles();
        store
            .create_schema(Schema::new("aaa_no_geometry").with_attribute("location", AttributeKind::String))
            .unwrap();
        let catalog = StoreGranuleCatalog::new(
            Arc::new(CatalogConfig::new()),
            StoreHandle::Borrowed(store),
            None,
        )
        .unwrap();
        assert_eq!(catalog.type_names().unwrap(), vec!["tiles".to_string()]);
    }

    #[test]
    fn test_configured_missing_type_is_fatal() {
        let result = StoreGranuleCatalog::new(
            Arc::new(CatalogConfig::new().with_type_name("nope")),
            StoreHandle::Borrowed(store_with_tiles()),
            None,
        );
        assert!(matches!(result, Err(CatalogError::SchemaResolution(_))));
    }

    #[test]
    fn test_wrap_store_matches_case_insensitively() {
        let catalog = StoreGranuleCatalog::new(
            Arc::new(CatalogConfig::new().with_type_name("TILES").with_wrap_store(true)),
            StoreHandle::Borrowed(store_with_tiles()),
            None,
        )
        .unwrap();
        assert_eq!(catalog.granules(&GranuleQuery::for_type("Tiles")).unwrap().len(), 2);
    }

    #[test]
    fn test_descriptors_resolve_relative_paths() {
        let config = CatalogConfig::new()
            .with_parent_location("/mosaic")
            .with_suggested_format("GeoTIFF");
        let catalog = StoreGranuleCatalog::new(
            Arc::new(config),
            StoreHandle::Borrowed(store_with_tiles()),
            None,
        )
        .unwrap();
        let granules = catalog.granules(&GranuleQuery::new()).unwrap();
        assert_eq!(granules[0].location(), "a.tif");
        assert_eq!(granules[0].resolved_location(), "/mosaic/a.tif");
        assert_eq!(granules[0].suggested_format(), Some("GeoTIFF"));
        assert_eq!(catalog.config().path_type, PathType::Relative);
    }

    #[test]
    fn test_malformed_records_skipped() {
        let store = store_with_tiles();
        store
            .insert("tiles", vec![Record::new().with("location", "nogeom.tif")])
            .unwrap();
        let catalog = StoreGranuleCatalog::new(
            Arc::new(CatalogConfig::new()),
            StoreHandle::Borrowed(store),
            None,
        )
        .unwrap();
        assert_eq!(catalog.count(&GranuleQuery::new()).unwrap(), 2);
    }

    #[test]
    fn test_invalid_record_rejected_on_add() {
        let catalog = StoreGranuleCatalog::new(
            Arc::new(CatalogConfig::new()),
            StoreHandle::Borrowed(store_with_tiles()),
            None,
        )
        .unwrap();
        let result = catalog.add_granules(
            "tiles",
            vec![Record::new().with("the_geom", Geometry::Rect(Rect::new((0.0, 0.0), (1.0, 1.0))))],
            &Transaction::auto_commit(),
        );
        assert!(matches!(result, Err(CatalogError::InvalidRecord { .. })));
    }

    #[test]
    fn test_owned_store_closed_on_dispose() {
        let owned = store_with_tiles();
        let catalog = StoreGranuleCatalog::new(
            Arc::new(CatalogConfig::new()),
            StoreHandle::Owned(owned.clone()),
            None,
        )
        .unwrap();
        catalog.dispose().unwrap();
        catalog.dispose().unwrap();
        assert!(owned.is_closed());

        let borrowed = store_with_tiles();
        let catalog = StoreGranuleCatalog::new(
            Arc::new(CatalogConfig::new()),
            StoreHandle::Borrowed(borrowed.clone()),
            None,
        )
        .unwrap();
        catalog.dispose().unwrap();
        assert!(!borrowed.is_closed());
        assert!(catalog.granules(&GranuleQuery::new()).unwrap_err().is_disposed());
    }
}
