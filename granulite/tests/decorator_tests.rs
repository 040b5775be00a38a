//! Catalog decorator integration tests
//!
//! Result caching, default hint merging and readers/writer locking as seen
//! through the composed catalog stack.

#[path = "testutils/mod.rs"]
mod testutils;

use granulite::cache::CacheConfig;
use geo::{coord, Geometry, Rect, Triangle};
use granulite::catalog::{CachingCatalog, HintMergingCatalog, StoreGranuleCatalog, StoreHandle};
use granulite::{
    CatalogConfig, CatalogError, CatalogFactory, CatalogResult, Filter, GranuleCatalog,
    GranuleDescriptor, GranuleQuery, Hints, MemoryRecordStore, RecordStore, Transaction,
    VisitControl,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use testutils::counting_store::CountingStore;
use testutils::mosaic_fixture::{bbox, ranked_tile, tile, tiles_schema, MosaicFixture, TILES};

fn three_tiles() -> Vec<granulite::Record> {
    vec![
        ranked_tile("a.tif", 0.0, 1),
        ranked_tile("b.tif", 1.0, 2),
        ranked_tile("c.tif", 2.0, 3),
    ]
}

fn cached_fixture(cache: CacheConfig) -> MosaicFixture {
    let fixture = MosaicFixture::with_config(CatalogConfig::new().with_caching(true).with_cache(cache));
    fixture.add(three_tiles());
    fixture
}

fn result_cache(fixture: &MosaicFixture) -> &Arc<CachingCatalog> {
    fixture
        .stack()
        .result_cache()
        .expect("caching enables the result cache")
}

#[test]
fn test_repeated_query_served_from_cache_until_expiry() {
    testutils::init_logging();
    let memory = Arc::new(MemoryRecordStore::new());
    memory.create_schema(tiles_schema()).unwrap();
    memory.insert(TILES, three_tiles()).unwrap();
    let store = Arc::new(CountingStore::new(memory));

    let base = StoreGranuleCatalog::new(
        Arc::new(CatalogConfig::new()),
        StoreHandle::Borrowed(store.clone()),
        None,
    )
    .unwrap();
    let catalog = CachingCatalog::new(
        Arc::new(base),
        true,
        &CacheConfig::default().with_max_age(Duration::from_millis(500)),
    );
    let query = bbox(0.0, 0.0, 10.0, 1.0);

    let before = store.queries();
    assert_eq!(catalog.granules(&query).unwrap().len(), 3);
    let after_first = store.queries();
    assert!(after_first > before);

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(catalog.granules(&query).unwrap().len(), 3);
    assert_eq!(store.queries(), after_first);

    std::thread::sleep(Duration::from_millis(600));
    assert_eq!(catalog.granules(&query).unwrap().len(), 3);
    assert!(store.queries() > after_first);

    let stats = catalog.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.expirations, 1);
}

#[test]
fn test_mutation_clears_cached_results() {
    let fixture = cached_fixture(CacheConfig::default());
    let query = bbox(0.0, 0.0, 10.0, 1.0);
    assert_eq!(fixture.locations(&query).len(), 3);
    assert_eq!(result_cache(&fixture).cached_queries(), 1);

    fixture.add(vec![ranked_tile("d.tif", 3.0, 4)]);
    assert_eq!(result_cache(&fixture).cached_queries(), 0);
    assert_eq!(fixture.locations(&query).len(), 4);
}

#[test]
fn test_oversized_results_are_streamed_but_not_cached() {
    let fixture = cached_fixture(CacheConfig::default().with_max_granules_per_entry(2));
    assert_eq!(fixture.locations(&bbox(0.0, 0.0, 10.0, 1.0)).len(), 3);
    assert_eq!(result_cache(&fixture).cached_queries(), 0);

    assert_eq!(fixture.locations(&bbox(0.0, 0.0, 0.5, 1.0)), vec!["a.tif"]);
    assert_eq!(result_cache(&fixture).cached_queries(), 1);
}

#[test]
fn test_partially_consumed_stream_is_not_cached() {
    let fixture = cached_fixture(CacheConfig::default());
    let query = bbox(0.0, 0.0, 10.0, 1.0);

    {
        let mut stream = fixture.catalog().stream(&query).unwrap();
        assert!(stream.next().unwrap().is_ok());
    }
    assert_eq!(result_cache(&fixture).cached_queries(), 0);

    let consumed = fixture.catalog().stream(&query).unwrap().count();
    assert_eq!(consumed, 3);
    assert_eq!(result_cache(&fixture).cached_queries(), 1);
}

#[test]
fn test_default_hints_never_override_caller_hints() {
    let fixture = MosaicFixture::with_config(
        CatalogConfig::new()
            .with_caching(true)
            .with_default_hint(Hints::TARGET_COVERAGE_NAME, "dem"),
    );
    fixture.add(three_tiles());
    let query = bbox(0.0, 0.0, 10.0, 1.0);

    fixture.catalog().granules(&query).unwrap();
    // Explicitly asking for the default coverage shares the merged cache key
    fixture
        .catalog()
        .granules(&query.clone().with_hint(Hints::TARGET_COVERAGE_NAME, "dem"))
        .unwrap();
    assert_eq!(result_cache(&fixture).cache_stats().hits, 1);

    // A caller hint survives merging, so this is a different query
    fixture
        .catalog()
        .granules(&query.clone().with_hint(Hints::TARGET_COVERAGE_NAME, "ortho"))
        .unwrap();
    let stats = result_cache(&fixture).cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);

    // Volatile hints do not split the cache
    fixture
        .catalog()
        .granules(&query.clone().with_hint("mosaic.request_id", "42"))
        .unwrap();
    assert_eq!(result_cache(&fixture).cache_stats().hits, 2);
}

#[test]
fn test_geometry_literals_with_same_envelope_cached_apart() {
    let fixture = MosaicFixture::new();
    fixture.add(vec![tile("rect.tif", 0.0, 0.0, 2.0, 2.0)]);

    let rect = Geometry::Rect(Rect::new((0.0, 0.0), (2.0, 2.0)));
    let triangle = Geometry::Triangle(Triangle::new(
        coord! { x: 0.0, y: 0.0 },
        coord! { x: 2.0, y: 0.0 },
        coord! { x: 0.0, y: 2.0 },
    ));
    let equals = |g: Geometry<f64>| GranuleQuery::new().with_filter(Filter::equals("the_geom", g));

    assert_eq!(fixture.locations(&equals(rect)), vec!["rect.tif"]);
    assert!(fixture.locations(&equals(triangle)).is_empty());
    assert_eq!(result_cache(&fixture).cached_queries(), 2);
}

#[test]
fn test_merged_defaults_are_part_of_the_cache_key() {
    let memory = Arc::new(MemoryRecordStore::new());
    memory.create_schema(tiles_schema()).unwrap();
    memory.insert(TILES, three_tiles()).unwrap();
    let store = Arc::new(CountingStore::new(memory));

    let base = StoreGranuleCatalog::new(
        Arc::new(CatalogConfig::new()),
        StoreHandle::Borrowed(store.clone()),
        None,
    )
    .unwrap();
    let cache = Arc::new(CachingCatalog::new(Arc::new(base), true, &CacheConfig::default()));
    let dem = HintMergingCatalog::new(
        cache.clone(),
        false,
        Hints::new().with(Hints::TARGET_COVERAGE_NAME, "dem"),
    );
    let ortho = HintMergingCatalog::new(
        cache.clone(),
        false,
        Hints::new().with(Hints::TARGET_COVERAGE_NAME, "ortho"),
    );
    let query = bbox(0.0, 0.0, 10.0, 1.0);

    assert_eq!(dem.granules(&query).unwrap().len(), 3);
    let after_dem = store.queries();
    // Same caller query, different merged default: must reach the store
    assert_eq!(ortho.granules(&query).unwrap().len(), 3);
    assert!(store.queries() > after_dem);
    assert_eq!(cache.cached_queries(), 2);
    assert_eq!(cache.cache_stats().hits, 0);

    let after_ortho = store.queries();
    dem.granules(&query).unwrap();
    ortho.granules(&query).unwrap();
    assert_eq!(store.queries(), after_ortho);
    assert_eq!(cache.cache_stats().hits, 2);
}

#[test]
fn test_open_stream_blocks_writers() {
    let fixture = cached_fixture(CacheConfig::disabled());
    let written = AtomicBool::new(false);

    let stream = fixture.catalog().stream(&GranuleQuery::new()).unwrap();
    // A second reader on the same thread is not blocked by the first
    assert_eq!(fixture.catalog().count(&GranuleQuery::new()).unwrap(), 3);

    std::thread::scope(|scope| {
        let writer = scope.spawn(|| {
            fixture.add(vec![ranked_tile("d.tif", 3.0, 4)]);
            written.store(true, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(150));
        assert!(!written.load(Ordering::SeqCst), "writer ran during a visit");

        assert_eq!(stream.count(), 3);
        writer.join().unwrap();
    });

    assert!(written.load(Ordering::SeqCst));
    assert_eq!(fixture.catalog().count(&GranuleQuery::new()).unwrap(), 4);
}

#[test]
fn test_concurrent_readers_and_writers() {
    let fixture = cached_fixture(CacheConfig::default());

    std::thread::scope(|scope| {
        for w in 0..2 {
            let fixture = &fixture;
            scope.spawn(move || {
                for i in 0..20 {
                    let x = 10.0 + (w * 20 + i) as f64;
                    fixture.add(vec![ranked_tile(&format!("w{}_{}.tif", w, i), x, i)]);
                }
            });
        }
        for _ in 0..4 {
            let fixture = &fixture;
            scope.spawn(move || {
                for _ in 0..50 {
                    let found = fixture.catalog().granules(&GranuleQuery::new()).unwrap();
                    assert!(found.len() >= 3 && found.len() <= 43);
                }
            });
        }
    });

    assert_eq!(fixture.catalog().count(&GranuleQuery::new()).unwrap(), 43);
}

#[test]
fn test_visit_stops_early_on_complete() {
    let fixture = cached_fixture(CacheConfig::default());
    let mut seen = Vec::new();
    let mut visitor = |granule: &GranuleDescriptor| -> CatalogResult<VisitControl> {
        seen.push(granule.location().to_string());
        Ok(if seen.len() == 2 {
            VisitControl::Complete
        } else {
            VisitControl::Continue
        })
    };
    fixture
        .catalog()
        .visit(&GranuleQuery::new(), &mut visitor)
        .unwrap();
    assert_eq!(seen.len(), 2);
}

#[test]
fn test_visitor_error_propagates() {
    let fixture = cached_fixture(CacheConfig::default());
    let mut visited = 0;
    let mut visitor = |_: &GranuleDescriptor| -> CatalogResult<VisitControl> {
        visited += 1;
        Err(CatalogError::Visitor("rejected granule".to_string()))
    };
    let result = fixture.catalog().visit(&GranuleQuery::new(), &mut visitor);
    assert!(matches!(result, Err(CatalogError::Visitor(_))));
    assert_eq!(visited, 1);
}

#[test]
fn test_dispose_is_idempotent_and_final() {
    let fixture = cached_fixture(CacheConfig::default());
    let catalog = fixture.catalog();
    catalog.dispose().unwrap();
    catalog.dispose().unwrap();
    assert!(catalog.is_disposed());

    assert!(matches!(
        catalog.granules(&GranuleQuery::new()),
        Err(CatalogError::Disposed)
    ));
    assert!(matches!(
        catalog.add_granules(TILES, three_tiles(), &Transaction::auto_commit()),
        Err(CatalogError::Disposed)
    ));
    assert!(matches!(catalog.type_names(), Err(CatalogError::Disposed)));
    assert!(matches!(catalog.bounds(TILES), Err(CatalogError::Disposed)));

    // Borrowed store outlives the catalog
    assert!(!fixture.store().is_closed());
    assert_eq!(fixture.store().type_names().unwrap(), vec![TILES.to_string()]);
}

#[test]
fn test_dispose_closes_owned_store() {
    let store = Arc::new(MemoryRecordStore::new());
    store.create_schema(tiles_schema()).unwrap();
    let stack = CatalogFactory::create(
        CatalogConfig::new().with_caching(true),
        StoreHandle::Owned(store.clone()),
        None,
    )
    .unwrap();

    stack.dispose().unwrap();
    assert!(store.is_closed());
    stack.dispose().unwrap();
}
