//! Catalog lifecycle integration tests
//!
//! Type management, transactions, bounds and aggregates. Every test runs
//! against both the plain store-backed stack and the indexed, cached stack.

#[path = "testutils/mod.rs"]
mod testutils;

use granulite::store::{AttributeKind, TransactionStatus};
use granulite::{
    Aggregate, AggregateResult, CatalogConfig, CatalogError, Envelope, Filter, GranuleCatalog,
    GranuleQuery, Schema, Transaction, Value,
};
use testutils::mosaic_fixture::{bbox, ranked_tile, tile, MosaicFixture, TILES};

fn fixtures() -> Vec<(bool, MosaicFixture)> {
    [false, true]
        .into_iter()
        .map(|caching| {
            let fixture = MosaicFixture::with_config(CatalogConfig::new().with_caching(caching));
            fixture.add(vec![
                ranked_tile("a.tif", 0.0, 3).with("elevation", 120.5),
                ranked_tile("b.tif", 1.0, 1).with("elevation", 80.0),
                ranked_tile("c.tif", 2.0, 2).with("elevation", 120.5),
                tile("d.tif", 10.0, 10.0, 12.0, 14.0),
            ]);
            (caching, fixture)
        })
        .collect()
}

#[test]
fn test_default_type_and_schema() {
    testutils::init_logging();
    for (caching, fixture) in fixtures() {
        let catalog = fixture.catalog();
        assert_eq!(catalog.type_names().unwrap(), vec![TILES.to_string()], "caching={}", caching);

        let schema = catalog.schema(TILES).unwrap();
        assert_eq!(schema.geometry_attribute.as_deref(), Some("the_geom"));

        // A query without a type name targets the first mosaic type
        assert_eq!(catalog.count(&GranuleQuery::new()).unwrap(), 4);
        assert!(matches!(
            catalog.granules(&GranuleQuery::for_type("missing")),
            Err(CatalogError::TypeNotFound(_))
        ));
    }
}

#[test]
fn test_bounds_cover_every_granule() {
    for (_, fixture) in fixtures() {
        let bounds = fixture.catalog().bounds(TILES).unwrap().unwrap();
        assert_eq!(bounds, Envelope::new(0.0, 0.0, 12.0, 14.0));
    }
}

#[test]
fn test_aggregates_over_matching_granules() {
    for (caching, fixture) in fixtures() {
        let catalog = fixture.catalog();
        let near = bbox(0.0, 0.0, 5.0, 5.0);

        assert_eq!(
            catalog.aggregate(&near, &Aggregate::Max("rank".into())).unwrap(),
            AggregateResult::Value(Some(Value::Integer(3))),
            "caching={}",
            caching
        );
        assert_eq!(
            catalog.aggregate(&near, &Aggregate::Min("rank".into())).unwrap(),
            AggregateResult::Value(Some(Value::Integer(1)))
        );
        assert_eq!(
            catalog.aggregate(&near, &Aggregate::Unique("elevation".into())).unwrap(),
            AggregateResult::Values(vec![Value::Double(120.5), Value::Double(80.0)])
        );
        assert_eq!(
            catalog.aggregate(&GranuleQuery::new(), &Aggregate::Count).unwrap(),
            AggregateResult::Count(4)
        );
        // d.tif has no rank and is skipped
        assert_eq!(
            catalog
                .aggregate(&bbox(9.0, 9.0, 20.0, 20.0), &Aggregate::Min("rank".into()))
                .unwrap(),
            AggregateResult::Value(None)
        );
    }
}

#[test]
fn test_query_capabilities_list_sortable_attributes() {
    for (_, fixture) in fixtures() {
        let capabilities = fixture.catalog().query_capabilities(TILES).unwrap();
        assert!(capabilities.supports_sorting("rank"));
        assert!(capabilities.supports_sorting("location"));
        assert!(!capabilities.supports_sorting("the_geom"));
        assert!(capabilities.supports_max_features);
    }
}

#[test]
fn test_create_and_remove_type() {
    for (caching, fixture) in fixtures() {
        let catalog = fixture.catalog();
        catalog
            .create_type(
                Schema::new("overviews")
                    .with_geometry("footprint")
                    .with_attribute("location", AttributeKind::String),
            )
            .unwrap();
        assert_eq!(
            catalog.type_names().unwrap(),
            vec![TILES.to_string(), "overviews".to_string()],
            "caching={}",
            caching
        );

        catalog
            .add_granules(
                "overviews",
                vec![granulite::Record::new()
                    .with("location", "ov.tif")
                    .with("footprint", geo::Geometry::Rect(geo::Rect::new((0.0, 0.0), (50.0, 50.0))))],
                &Transaction::auto_commit(),
            )
            .unwrap();
        let query = GranuleQuery::for_type("overviews").with_bbox(Envelope::new(40.0, 40.0, 60.0, 60.0));
        assert_eq!(fixture.locations(&query), vec!["ov.tif"]);
        // Types are indexed and cached independently
        assert_eq!(fixture.locations(&bbox(40.0, 40.0, 60.0, 60.0)), Vec::<String>::new());

        catalog.remove_type("overviews").unwrap();
        assert_eq!(catalog.type_names().unwrap(), vec![TILES.to_string()]);
        assert!(catalog.granules(&GranuleQuery::for_type("overviews")).is_err());
    }
}

#[test]
fn test_type_without_location_rejected() {
    for (_, fixture) in fixtures() {
        let result = fixture
            .catalog()
            .create_type(Schema::new("plain").with_geometry("the_geom"));
        assert!(matches!(result, Err(CatalogError::InvalidParameters(_))));
    }
}

#[test]
fn test_rolled_back_transaction_leaves_catalog_unchanged() {
    for (_, fixture) in fixtures() {
        let catalog = fixture.catalog();
        let txn = Transaction::explicit();
        catalog
            .add_granules(TILES, vec![ranked_tile("e.tif", 5.0, 9)], &txn)
            .unwrap();
        let matched = catalog
            .remove_granules(
                &GranuleQuery::new().with_filter(Filter::equals("location", "a.tif")),
                &txn,
            )
            .unwrap();
        assert_eq!(matched, 1);
        assert_eq!(txn.staged_len(), 2);

        txn.rollback();
        assert_eq!(txn.status(), TransactionStatus::RolledBack);
        assert_eq!(txn.staged_len(), 0);
        assert_eq!(
            fixture.locations(&GranuleQuery::new()),
            vec!["a.tif", "b.tif", "c.tif", "d.tif"]
        );
    }
}

#[test]
fn test_committed_transaction_applies_all_writes() {
    for (_, fixture) in fixtures() {
        let catalog = fixture.catalog();
        let txn = Transaction::explicit();
        catalog
            .add_granules(TILES, vec![ranked_tile("e.tif", 5.0, 9)], &txn)
            .unwrap();
        catalog
            .remove_granules(
                &GranuleQuery::new().with_filter(Filter::parse("rank < 2").unwrap()),
                &txn,
            )
            .unwrap();

        let affected = catalog.commit(&txn).unwrap();
        assert_eq!(affected, 2);
        assert_eq!(txn.status(), TransactionStatus::Committed);
        assert_eq!(
            fixture.locations(&GranuleQuery::new()),
            vec!["a.tif", "c.tif", "d.tif", "e.tif"]
        );
    }
}

#[test]
fn test_invalid_record_rejected() {
    for (_, fixture) in fixtures() {
        let result = fixture.catalog().add_granules(
            TILES,
            vec![granulite::Record::new().with("rank", 1i64)],
            &Transaction::auto_commit(),
        );
        assert!(matches!(result, Err(CatalogError::InvalidRecord { .. })));
        assert_eq!(fixture.catalog().count(&GranuleQuery::new()).unwrap(), 4);
    }
}
