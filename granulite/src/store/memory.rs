// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory record store
//!
//! Used by tests, benches and the vector-file footprint source.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use super::traits::{RecordIter, RecordStore, StoreQuery};
use super::transaction::PendingWrite;
use super::types::{sort_records, Record, Schema, StoreError, StoreResult};
use crate::filter::Filter;

#[derive(Debug, Clone)]
struct TypeTable {
    schema: Schema,
    records: BTreeMap<u64, Record>,
    next_id: u64,
}

impl TypeTable {
    fn new(schema: Schema) -> Self {
        Self {
            schema,
            records: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn insert(&mut self, records: Vec<Record>) -> StoreResult<Vec<String>> {
        for record in &records {
            if let Some(unknown) = record
                .attributes
                .keys()
                .find(|name| !self.schema.has_attribute(name))
            {
                return Err(StoreError::UnknownAttribute {
                    type_name: self.schema.type_name.clone(),
                    attribute: unknown.clone(),
                });
            }
        }
        let mut ids = Vec::with_capacity(records.len());
        for mut record in records {
            let seq = self.next_id;
            self.next_id += 1;
            record.id = format!("{}.{}", self.schema.type_name, seq);
            ids.push(record.id.clone());
            self.records.insert(seq, record);
        }
        Ok(ids)
    }

    /// Bind default-geometry predicates to this table's geometry attribute
    fn resolve(&self, filter: &Filter) -> Filter {
        match &self.schema.geometry_attribute {
            Some(geometry) => filter.with_default_geometry(geometry),
            None => filter.clone(),
        }
    }

    fn matching<'a>(&'a self, filter: &Filter) -> impl Iterator<Item = &'a Record> + 'a {
        let filter = self.resolve(filter);
        self.records.values().filter(move |record| filter.evaluate(record))
    }

    fn delete(&mut self, filter: &Filter) -> usize {
        let filter = self.resolve(filter);
        let before = self.records.len();
        self.records.retain(|_, record| !filter.evaluate(record));
        before - self.records.len()
    }
}

/// In-memory record store backed by a map of type tables
pub struct MemoryRecordStore {
    tables: RwLock<HashMap<String, TypeTable>>,
    closed: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_write(tables: &mut HashMap<String, TypeTable>, write: PendingWrite) -> StoreResult<usize> {
    let table = tables
        .get_mut(write.type_name())
        .ok_or_else(|| StoreError::TypeNotFound(write.type_name().to_string()))?;
    match write {
        PendingWrite::Add { records, .. } => table.insert(records).map(|ids| ids.len()),
        PendingWrite::Remove { filter, .. } => Ok(table.delete(&filter)),
    }
}

impl RecordStore for MemoryRecordStore {
    fn type_names(&self) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn schema(&self, type_name: &str) -> StoreResult<Schema> {
        self.ensure_open()?;
        self.tables
            .read()
            .get(type_name)
            .map(|t| t.schema.clone())
            .ok_or_else(|| StoreError::TypeNotFound(type_name.to_string()))
    }

    fn create_schema(&self, schema: Schema) -> StoreResult<()> {
        self.ensure_open()?;
        if schema.type_name.is_empty() {
            return Err(StoreError::InvalidSchema("empty type name".to_string()));
        }
        if let Some(geom) = &schema.geometry_attribute {
            if !schema.has_attribute(geom) {
                return Err(StoreError::InvalidSchema(format!(
                    "geometry attribute {} is not declared",
                    geom
                )));
            }
        }
        let mut tables = self.tables.write();
        if tables.contains_key(&schema.type_name) {
            return Err(StoreError::TypeExists(schema.type_name));
        }
        tables.insert(schema.type_name.clone(), TypeTable::new(schema));
        Ok(())
    }

    fn remove_schema(&self, type_name: &str) -> StoreResult<()> {
        self.ensure_open()?;
        self.tables
            .write()
            .remove(type_name)
            .map(|_| ())
            .ok_or_else(|| StoreError::TypeNotFound(type_name.to_string()))
    }

    fn query(&self, type_name: &str, query: &StoreQuery) -> StoreResult<RecordIter<'_>> {
        self.ensure_open()?;
        let tables = self.tables.read();
        let table = tables
            .get(type_name)
            .ok_or_else(|| StoreError::TypeNotFound(type_name.to_string()))?;
        let mut matches: Vec<Record> = table.matching(&query.filter).cloned().collect();
        sort_records(&mut matches, &query.sort_by, |r| r);
        if let Some(max) = query.max_features {
            matches.truncate(max);
        }
        Ok(Box::new(matches.into_iter().map(Ok)))
    }

    fn insert(&self, type_name: &str, records: Vec<Record>) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(type_name)
            .ok_or_else(|| StoreError::TypeNotFound(type_name.to_string()))?;
        table.insert(records)
    }

    fn delete(&self, type_name: &str, filter: &Filter) -> StoreResult<usize> {
        self.ensure_open()?;
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(type_name)
            .ok_or_else(|| StoreError::TypeNotFound(type_name.to_string()))?;
        Ok(table.delete(filter))
    }

    fn apply(&self, writes: Vec<PendingWrite>) -> StoreResult<usize> {
        self.ensure_open()?;
        let mut tables = self.tables.write();
        // Work on a copy so a failing write leaves the store untouched
        let mut staged = tables.clone();
        let mut affected = 0;
        for write in writes {
            affected += apply_write(&mut staged, write)?;
        }
        *tables = staged;
        Ok(affected)
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        self.tables.write().clear();
        Ok(())
    }

    fn count(&self, type_name: &str, query: &StoreQuery) -> StoreResult<usize> {
        self.ensure_open()?;
        let tables = self.tables.read();
        let table = tables
            .get(type_name)
            .ok_or_else(|| StoreError::TypeNotFound(type_name.to_string()))?;
        let count = table.matching(&query.filter).count();
        Ok(query.max_features.map_or(count, |max| count.min(max)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{AttributeKind, Value};
    use geo::{Geometry, Rect};

    fn tiles_schema() -> Schema {
        Schema::new("tiles")
            .with_attribute("location", AttributeKind::String)
            .with_geometry("the_geom")
    }

    fn tile(location: &str, x: f64) -> Record {
        let rect = Rect::new((x, 0.0), (x + 1.0, 1.0));
        Record::new()
            .with("location", location)
            .with("the_geom", Geometry::Rect(rect))
    }

    #[test]
    fn test_insert_assigns_ids_and_query_filters() {
        let store = MemoryRecordStore::new();
        store.create_schema(tiles_schema()).unwrap();
        let ids = store
            .insert("tiles", vec![tile("a.tif", 0.0), tile("b.tif", 1.0)])
            .unwrap();
        assert_eq!(ids, vec!["tiles.1".to_string(), "tiles.2".to_string()]);

        let filter = Filter::parse("location = 'b.tif'").unwrap();
        let found: Vec<Record> = store
            .query("tiles", &StoreQuery::new(filter))
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("location"), Some(&Value::from("b.tif")));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let store = MemoryRecordStore::new();
        store.create_schema(tiles_schema()).unwrap();
        let err = store
            .insert("tiles", vec![tile("a.tif", 0.0).with("bogus", 1i64)])
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownAttribute { .. }));
        assert_eq!(store.count("tiles", &StoreQuery::all()).unwrap(), 0);
    }

    #[test]
    fn test_apply_is_atomic() {
        let store = MemoryRecordStore::new();
        store.create_schema(tiles_schema()).unwrap();
        let writes = vec![
            PendingWrite::Add {
                type_name: "tiles".into(),
                records: vec![tile("a.tif", 0.0)],
            },
            PendingWrite::Add {
                type_name: "missing".into(),
                records: vec![tile("b.tif", 0.0)],
            },
        ];
        assert!(store.apply(writes).is_err());
        assert_eq!(store.count("tiles", &StoreQuery::all()).unwrap(), 0);
    }

    #[test]
    fn test_bounds_and_close() {
        let store = MemoryRecordStore::new();
        store.create_schema(tiles_schema()).unwrap();
        store
            .insert("tiles", vec![tile("a.tif", 0.0), tile("b.tif", 4.0)])
            .unwrap();
        let bounds = store.bounds("tiles").unwrap().unwrap();
        assert_eq!(bounds.min_x, 0.0);
        assert_eq!(bounds.max_x, 5.0);

        store.close().unwrap();
        assert!(matches!(store.type_names(), Err(StoreError::Closed)));
    }
}
