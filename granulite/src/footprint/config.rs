// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Footprint configuration
//!
//! Read from `footprints.properties` in the mosaic directory, or defaulted
//! when that file is absent.

use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::{FootprintError, FootprintResult};
use super::inset::FootprintInsetPolicy;
use super::loader::LoaderRegistry;
use super::properties::Properties;
use super::provider::{
    MultiLevelRoiProvider, MultiSidecarRoiProvider, RasterMaskKind, RasterMaskRoiProvider,
    RasterMaskSource, SidecarRoiProvider, VectorFileRoiProvider,
};
use crate::filter::Filter;

pub const FOOTPRINT_PROPERTIES_FILE: &str = "footprints.properties";
pub const DEFAULT_FOOTPRINT_FILE: &str = "footprints.geojson";
pub const DEFAULT_OVERVIEW_SUFFIX_FORMAT: &str = "_%d";

pub const KEY_SOURCE: &str = "footprint_source";
pub const KEY_FILTER: &str = "footprint_filter";
pub const KEY_INSET: &str = "footprint_inset";
pub const KEY_INSET_TYPE: &str = "footprint_inset_type";
pub const KEY_LOADER: &str = "footprintLoader";
pub const KEY_OVERVIEW_SUFFIX: &str = "overviewsSuffixFormat";
pub const KEY_OVERVIEWS_IN_RASTER_SPACE: &str = "overviewsRoiInRasterSpace";

#[derive(Debug, Clone, PartialEq)]
pub enum FootprintSource {
    Sidecar,
    MultiSidecar,
    /// Shared GeoJSON FeatureCollection
    VectorFile(PathBuf),
    Raster,
    RasterMask,
}

impl FootprintSource {
    /// Parse a `footprint_source` value; anything else is a vector file path
    pub fn parse(value: &str, mosaic_dir: &Path) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "sidecar" => FootprintSource::Sidecar,
            "multisidecar" => FootprintSource::MultiSidecar,
            "raster" => FootprintSource::Raster,
            "raster-mask" | "rastermask" => FootprintSource::RasterMask,
            _ => FootprintSource::VectorFile(mosaic_dir.join(value.trim())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FootprintConfig {
    pub source: FootprintSource,
    /// Selects footprints of a vector file per granule
    pub filter: Option<Filter>,
    pub inset: f64,
    pub inset_policy: FootprintInsetPolicy,
    /// Pins sidecar probing to one loader
    pub loader: Option<String>,
    pub overview_suffix_format: String,
    pub overviews_in_raster_space: bool,
    /// A granule without a footprint is an error rather than unclipped
    pub required: bool,
}

impl Default for FootprintConfig {
    fn default() -> Self {
        Self {
            source: FootprintSource::Sidecar,
            filter: None,
            inset: 0.0,
            inset_policy: FootprintInsetPolicy::Full,
            loader: None,
            overview_suffix_format: DEFAULT_OVERVIEW_SUFFIX_FORMAT.to_string(),
            overviews_in_raster_space: false,
            required: false,
        }
    }
}

impl FootprintConfig {
    pub fn new(source: FootprintSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_inset(mut self, inset: f64, policy: FootprintInsetPolicy) -> Self {
        self.inset = inset;
        self.inset_policy = policy;
        self
    }

    pub fn with_loader(mut self, loader: impl Into<String>) -> Self {
        self.loader = Some(loader.into());
        self
    }

    pub fn with_overview_suffix_format(mut self, format: impl Into<String>) -> Self {
        self.overview_suffix_format = format.into();
        self
    }

    pub fn with_overviews_in_raster_space(mut self, raster_space: bool) -> Self {
        self.overviews_in_raster_space = raster_space;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Build from parsed properties; relative vector paths resolve against `mosaic_dir`
    pub fn from_properties(props: &Properties, mosaic_dir: &Path) -> FootprintResult<Self> {
        let mut config = FootprintConfig::default();
        if let Some(source) = props.get_trimmed(KEY_SOURCE) {
            config.source = FootprintSource::parse(source, mosaic_dir);
            config.required = true;
        }
        if let Some(filter) = props.get_trimmed(KEY_FILTER) {
            config.filter = Some(Filter::parse(filter)?);
        }
        if let Some(inset) = props.get_f64(KEY_INSET)? {
            config.inset = inset;
        }
        if let Some(policy) = props.get_trimmed(KEY_INSET_TYPE) {
            config.inset_policy = policy.parse().map_err(FootprintError::Config)?;
        }
        config.loader = props.get_trimmed(KEY_LOADER).map(str::to_string);
        if let Some(format) = props.get_trimmed(KEY_OVERVIEW_SUFFIX) {
            config.overview_suffix_format = format.to_string();
        }
        if let Some(raster_space) = props.get_bool(KEY_OVERVIEWS_IN_RASTER_SPACE)? {
            config.overviews_in_raster_space = raster_space;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FootprintResult<()> {
        if !self.inset.is_finite() || self.inset < 0.0 {
            return Err(FootprintError::Config(format!(
                "{} must be a non-negative number, got {}",
                KEY_INSET, self.inset
            )));
        }
        if self.source == FootprintSource::MultiSidecar && !self.overview_suffix_format.contains("%d") {
            return Err(FootprintError::Config(format!(
                "{} must contain %d, got '{}'",
                KEY_OVERVIEW_SUFFIX, self.overview_suffix_format
            )));
        }
        Ok(())
    }

    /// Instantiate the provider for this configuration
    ///
    /// `raster_source` is required for the raster and raster-mask sources.
    pub fn build_provider(
        &self,
        registry: &LoaderRegistry,
        raster_source: Option<Arc<dyn RasterMaskSource>>,
    ) -> FootprintResult<Arc<dyn MultiLevelRoiProvider>> {
        self.validate()?;
        let registry = match &self.loader {
            Some(name) => registry.pinned(name)?,
            None => registry.clone(),
        };

        let provider: Arc<dyn MultiLevelRoiProvider> = match &self.source {
            FootprintSource::Sidecar => Arc::new(
                SidecarRoiProvider::new(registry, self.inset, self.inset_policy)
                    .with_required(self.required),
            ),
            FootprintSource::MultiSidecar => Arc::new(
                MultiSidecarRoiProvider::new(
                    registry,
                    self.inset,
                    self.inset_policy,
                    self.overview_suffix_format.clone(),
                    self.overviews_in_raster_space,
                )
                .with_required(self.required),
            ),
            FootprintSource::VectorFile(path) => {
                let filter = match &self.filter {
                    Some(filter) => filter.clone(),
                    None => Filter::parse(VectorFileRoiProvider::DEFAULT_FILTER)?,
                };
                Arc::new(
                    VectorFileRoiProvider::open(path.clone(), filter, self.inset, self.inset_policy)?
                        .with_required(self.required),
                )
            }
            FootprintSource::Raster | FootprintSource::RasterMask => {
                let source = raster_source.ok_or_else(|| {
                    FootprintError::Config("raster footprints need a raster mask source".to_string())
                })?;
                let kind = if self.source == FootprintSource::Raster {
                    RasterMaskKind::Raster
                } else {
                    RasterMaskKind::Mask
                };
                Arc::new(
                    RasterMaskRoiProvider::new(source, kind, self.inset, self.inset_policy)
                        .with_required(self.required),
                )
            }
        };
        info!(
            "Footprint provider {} (inset {} {})",
            provider.name(),
            self.inset,
            self.inset_policy
        );
        Ok(provider)
    }
}

/// Footprint provider for a mosaic directory
///
/// Uses `footprints.properties` when present, otherwise `footprints.geojson`
/// as a shared vector file, otherwise per-granule sidecars.
pub fn load_provider(
    mosaic_dir: &Path,
    registry: &LoaderRegistry,
    raster_source: Option<Arc<dyn RasterMaskSource>>,
) -> FootprintResult<Arc<dyn MultiLevelRoiProvider>> {
    let properties = mosaic_dir.join(FOOTPRINT_PROPERTIES_FILE);
    let config = if properties.is_file() {
        debug!("Reading footprint configuration {}", properties.display());
        FootprintConfig::from_properties(&Properties::load(&properties)?, mosaic_dir)?
    } else {
        let shared = mosaic_dir.join(DEFAULT_FOOTPRINT_FILE);
        if shared.is_file() {
            FootprintConfig::new(FootprintSource::VectorFile(shared))
        } else {
            FootprintConfig::default()
        }
    };
    config.build_provider(registry, raster_source)
}
