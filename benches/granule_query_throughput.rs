/// Benchmark for granule query throughput
///
/// Measures bounding-box queries against a tiled mosaic through three stacks:
/// the plain store-backed catalog, the spatial index alone, and the spatial
/// index plus the result cache.

use geo::{Geometry, Rect};
use granulite::cache::CacheConfig;
use granulite::catalog::{CatalogStack, StoreHandle};
use granulite::store::AttributeKind;
use granulite::{
    CatalogConfig, CatalogFactory, Envelope, GranuleQuery, MemoryRecordStore, Record, RecordStore,
    Schema,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const GRID: usize = 100;

fn build_store() -> Arc<MemoryRecordStore> {
    let store = Arc::new(MemoryRecordStore::new());
    store
        .create_schema(
            Schema::new("tiles")
                .with_geometry("the_geom")
                .with_attribute("location", AttributeKind::String),
        )
        .expect("Failed to create schema");

    let mut records = Vec::with_capacity(GRID * GRID);
    for row in 0..GRID {
        for col in 0..GRID {
            let (x, y) = (col as f64, row as f64);
            records.push(
                Record::new()
                    .with("location", format!("tile_{}_{}.tif", row, col))
                    .with("the_geom", Geometry::Rect(Rect::new((x, y), (x + 1.0, y + 1.0)))),
            );
        }
    }
    store.insert("tiles", records).expect("Failed to insert tiles");
    store
}

fn stack(store: &Arc<MemoryRecordStore>, caching: bool, cache: CacheConfig) -> CatalogStack {
    CatalogFactory::create(
        CatalogConfig::new().with_caching(caching).with_cache(cache),
        StoreHandle::Borrowed(store.clone()),
        None,
    )
    .expect("Failed to compose catalog stack")
}

/// Run `iterations` queries, returning elapsed time and granules seen
fn run(stack: &CatalogStack, queries: &[GranuleQuery], iterations: usize) -> (Duration, usize) {
    let start = Instant::now();
    let mut seen = 0;
    for i in 0..iterations {
        let query = &queries[i % queries.len()];
        seen += stack
            .catalog()
            .granules(query)
            .expect("Query failed")
            .len();
    }
    (start.elapsed(), seen)
}

fn report(label: &str, iterations: usize, duration: Duration, seen: usize) {
    let ops_per_sec = iterations as f64 / duration.as_secs_f64();
    println!("📊 {}", label);
    println!("  Iterations: {}", iterations);
    println!("  Time: {:?}", duration);
    println!("  Granules returned: {}", seen);
    println!("  Throughput: {:.0} queries/sec", ops_per_sec);
    println!();
}

fn main() {
    println!("=== Granule Query Throughput Benchmark ===\n");

    println!("📋 Setup: Creating a {}x{} tile mosaic...", GRID, GRID);
    let store = build_store();
    println!("  Created {} granules\n", GRID * GRID);

    let mut rng = fastrand::Rng::with_seed(42);
    let queries: Vec<GranuleQuery> = (0..64)
        .map(|_| {
            let x = rng.f64() * (GRID as f64 - 5.0);
            let y = rng.f64() * (GRID as f64 - 5.0);
            GranuleQuery::new().with_bbox(Envelope::new(x, y, x + 4.0, y + 4.0))
        })
        .collect();

    let plain = stack(&store, false, CacheConfig::default());
    let iterations = 50;
    let (duration, seen) = run(&plain, &queries, iterations);
    report("Store scan (no index)", iterations, duration, seen);
    let scan_duration = duration;

    let indexed = stack(&store, true, CacheConfig::disabled());
    let build_start = Instant::now();
    run(&indexed, &queries[..1], 1);
    println!("📋 Spatial index build: {:?}\n", build_start.elapsed());

    let iterations = 5_000;
    let (duration, seen) = run(&indexed, &queries, iterations);
    report("Spatial index", iterations, duration, seen);
    let index_duration = duration;

    let cached = stack(&store, true, CacheConfig::default().with_max_age(Duration::from_secs(60)));
    let (duration, seen) = run(&cached, &queries, iterations);
    report("Spatial index + result cache", iterations, duration, seen);

    println!("=== Summary ===");
    let scan_per_query = scan_duration.as_secs_f64() / 50.0;
    let index_per_query = index_duration.as_secs_f64() / iterations as f64;
    let cached_per_query = duration.as_secs_f64() / iterations as f64;
    println!("  Scan:   {:.1} µs/query", scan_per_query * 1e6);
    println!("  Index:  {:.1} µs/query ({:.0}x faster)", index_per_query * 1e6, scan_per_query / index_per_query);
    println!("  Cached: {:.1} µs/query ({:.0}x faster)", cached_per_query * 1e6, scan_per_query / cached_per_query);
    println!("\n✅ Benchmark complete");
}
