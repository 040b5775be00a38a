//! Test utilities for Granulite integration tests
//!
//! - MosaicFixture: a memory store with a `tiles` type plus a composed catalog stack
//! - CountingStore: a record store wrapper that counts queries reaching the store
//! - GatedCatalog: a catalog wrapper that holds one stream open on demand

#![allow(dead_code)]

pub mod counting_store;
pub mod gated_catalog;
pub mod mosaic_fixture;

/// Route `log` output through the test harness; safe to call repeatedly
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
