//! Record store wrapper counting the queries that reach the store

use granulite::filter::Filter;
use granulite::store::{PendingWrite, RecordIter, StoreQuery, StoreResult};
use granulite::{Envelope, MemoryRecordStore, Record, RecordStore, Schema};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct CountingStore {
    inner: Arc<MemoryRecordStore>,
    queries: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryRecordStore>) -> Self {
        Self {
            inner,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl RecordStore for CountingStore {
    fn type_names(&self) -> StoreResult<Vec<String>> {
        self.inner.type_names()
    }

    fn schema(&self, type_name: &str) -> StoreResult<Schema> {
        self.inner.schema(type_name)
    }

    fn create_schema(&self, schema: Schema) -> StoreResult<()> {
        self.inner.create_schema(schema)
    }

    fn remove_schema(&self, type_name: &str) -> StoreResult<()> {
        self.inner.remove_schema(type_name)
    }

    fn query(&self, type_name: &str, query: &StoreQuery) -> StoreResult<RecordIter<'_>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(type_name, query)
    }

    fn insert(&self, type_name: &str, records: Vec<Record>) -> StoreResult<Vec<String>> {
        self.inner.insert(type_name, records)
    }

    fn delete(&self, type_name: &str, filter: &Filter) -> StoreResult<usize> {
        self.inner.delete(type_name, filter)
    }

    fn apply(&self, writes: Vec<PendingWrite>) -> StoreResult<usize> {
        self.inner.apply(writes)
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }

    fn bounds(&self, type_name: &str) -> StoreResult<Option<Envelope>> {
        self.inner.bounds(type_name)
    }
}
