//! Mosaic fixture for Granulite integration tests
//!
//! Builds an in-memory store holding a `tiles` type and composes a catalog
//! stack over it through the public factory. `tiles` carries two geometries:
//! the default `the_geom` and a secondary `aoi`.

use geo::{Geometry, Rect};
use granulite::catalog::{CatalogStack, StoreHandle};
use granulite::footprint::MultiLevelRoiProvider;
use granulite::store::AttributeKind;
use granulite::{
    CatalogConfig, CatalogFactory, Envelope, GranuleCatalog, GranuleQuery, MemoryRecordStore,
    Record, RecordStore, Schema, Transaction,
};
use std::sync::Arc;

pub const TILES: &str = "tiles";

/// Schema of the fixture type
pub fn tiles_schema() -> Schema {
    Schema::new(TILES)
        .with_geometry("the_geom")
        .with_attribute("location", AttributeKind::String)
        .with_attribute("rank", AttributeKind::Integer)
        .with_attribute("elevation", AttributeKind::Double)
        .with_attribute("aoi", AttributeKind::Geometry)
}

/// Granule record whose geometry is the rectangle `[x1, x2] x [y1, y2]`
pub fn tile(location: &str, x1: f64, y1: f64, x2: f64, y2: f64) -> Record {
    Record::new()
        .with("location", location)
        .with("the_geom", Geometry::Rect(Rect::new((x1, y1), (x2, y2))))
}

/// Set the secondary `aoi` geometry of a tile
pub fn with_aoi(record: Record, x1: f64, y1: f64, x2: f64, y2: f64) -> Record {
    record.with("aoi", Geometry::Rect(Rect::new((x1, y1), (x2, y2))))
}

/// Unit-high tile starting at `x`, ranked for sort tests
pub fn ranked_tile(location: &str, x: f64, rank: i64) -> Record {
    tile(location, x, 0.0, x + 1.0, 1.0).with("rank", rank)
}

/// Sorted locations of the granules matching a query
pub fn locations(catalog: &dyn GranuleCatalog, query: &GranuleQuery) -> Vec<String> {
    let mut found: Vec<String> = catalog
        .granules(query)
        .expect("query failed")
        .iter()
        .map(|g| g.location().to_string())
        .collect();
    found.sort();
    found
}

pub fn bbox(x1: f64, y1: f64, x2: f64, y2: f64) -> GranuleQuery {
    GranuleQuery::new().with_bbox(Envelope::new(x1, y1, x2, y2))
}

/// Memory store plus a catalog stack composed over it
pub struct MosaicFixture {
    store: Arc<MemoryRecordStore>,
    stack: CatalogStack,
}

impl MosaicFixture {
    /// Fixture with caching enabled and no footprints
    pub fn new() -> Self {
        Self::with_config(CatalogConfig::new().with_caching(true))
    }

    pub fn with_config(config: CatalogConfig) -> Self {
        Self::build(config, None)
    }

    pub fn with_footprints(config: CatalogConfig, footprints: Arc<dyn MultiLevelRoiProvider>) -> Self {
        Self::build(config, Some(footprints))
    }

    fn build(config: CatalogConfig, footprints: Option<Arc<dyn MultiLevelRoiProvider>>) -> Self {
        let store = Arc::new(MemoryRecordStore::new());
        store
            .create_schema(tiles_schema())
            .expect("Failed to create tiles schema");
        let stack = CatalogFactory::create(
            config,
            StoreHandle::Borrowed(store.clone()),
            footprints,
        )
        .expect("Failed to compose catalog stack");
        Self { store, stack }
    }

    pub fn store(&self) -> &Arc<MemoryRecordStore> {
        &self.store
    }

    pub fn stack(&self) -> &CatalogStack {
        &self.stack
    }

    pub fn catalog(&self) -> &dyn GranuleCatalog {
        self.stack.catalog().as_ref()
    }

    /// Add granules through the catalog in an auto-commit transaction
    pub fn add(&self, records: Vec<Record>) -> usize {
        self.catalog()
            .add_granules(TILES, records, &Transaction::auto_commit())
            .expect("Failed to add granules")
    }

    pub fn locations(&self, query: &GranuleQuery) -> Vec<String> {
        locations(self.catalog(), query)
    }
}
