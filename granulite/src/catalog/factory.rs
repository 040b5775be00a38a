// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Catalog stack composition

use log::info;
use std::sync::Arc;

use super::config::CatalogConfig;
use super::decorators::{CachingCatalog, HintMergingCatalog, LockingCatalog};
use super::error::{CatalogError, CatalogResult};
use super::spatial_index::StrTreeGranuleCatalog;
use super::store_backed::{StoreGranuleCatalog, StoreHandle};
use super::traits::GranuleCatalog;
use crate::footprint::MultiLevelRoiProvider;

/// A composed catalog plus handles on its soft-state layers
pub struct CatalogStack {
    catalog: Arc<dyn GranuleCatalog>,
    spatial_index: Option<Arc<StrTreeGranuleCatalog>>,
    result_cache: Option<Arc<CachingCatalog>>,
    footprints: Option<Arc<dyn MultiLevelRoiProvider>>,
}

impl CatalogStack {
    /// Outermost catalog; all operations go through it
    pub fn catalog(&self) -> &Arc<dyn GranuleCatalog> {
        &self.catalog
    }

    pub fn spatial_index(&self) -> Option<&Arc<StrTreeGranuleCatalog>> {
        self.spatial_index.as_ref()
    }

    pub fn result_cache(&self) -> Option<&Arc<CachingCatalog>> {
        self.result_cache.as_ref()
    }

    /// Drop every soft-held structure; later queries recompute them
    pub fn release(&self) {
        if let Some(index) = &self.spatial_index {
            index.release_index();
        }
        if let Some(cache) = &self.result_cache {
            cache.release_cache();
        }
        if let Some(footprints) = &self.footprints {
            footprints.release();
        }
    }

    pub fn dispose(&self) -> CatalogResult<()> {
        self.catalog.dispose()
    }
}

pub struct CatalogFactory;

impl CatalogFactory {
    /// Compose the catalog stack for a configuration
    ///
    /// Layers, outermost first: locking, hint merging, then the result cache
    /// and spatial index when caching is enabled, then the store-backed
    /// catalog. Every layer owns the one below it.
    pub fn create(
        config: CatalogConfig,
        store: StoreHandle,
        footprints: Option<Arc<dyn MultiLevelRoiProvider>>,
    ) -> CatalogResult<CatalogStack> {
        config.validate().map_err(CatalogError::InvalidParameters)?;
        let config = Arc::new(config);

        let mut catalog: Arc<dyn GranuleCatalog> = Arc::new(StoreGranuleCatalog::new(
            config.clone(),
            store,
            footprints.clone(),
        )?);

        let mut spatial_index = None;
        let mut result_cache = None;
        if config.caching {
            let index = Arc::new(StrTreeGranuleCatalog::new(catalog));
            catalog = index.clone();
            spatial_index = Some(index);

            if config.cache.enabled {
                let cache = Arc::new(CachingCatalog::new(catalog, true, &config.cache));
                catalog = cache.clone();
                result_cache = Some(cache);
            }
        }

        catalog = Arc::new(HintMergingCatalog::new(
            catalog,
            true,
            config.default_hints.clone(),
        ));
        catalog = Arc::new(LockingCatalog::new(catalog, true));

        info!(
            "Created catalog stack (spatial index: {}, result cache: {}, footprints: {})",
            spatial_index.is_some(),
            result_cache.is_some(),
            footprints.as_ref().map_or("none", |f| f.name())
        );
        Ok(CatalogStack {
            catalog,
            spatial_index,
            result_cache,
            footprints,
        })
    }
}
