// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Multi-level regions of interest
//!
//! A [`MultiLevelRoi`] carries a granule's footprint, its inset version and
//! optionally one footprint per overview level. Readers ask for the ROI of a
//! level rasterized into the pixel window they read; results are simplified
//! and cached per transform.

use geo::{AffineOps, AffineTransform, Area, BoundingRect, MultiPolygon, Rect, Simplify};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::{FootprintError, FootprintResult};
use super::inset::FootprintInsetPolicy;
use crate::cache::SoftCache;
use crate::geometry::{chain, Envelope, ReadWindow, TransformKey};

/// Simplification tolerance for rasterized ROIs, in output pixels
pub const ROI_SIMPLIFY_TOLERANCE: f64 = 0.25;

const ROI_CACHE_ENTRIES: usize = 32;
const ROI_CACHE_TTL: Duration = Duration::from_secs(300);

/// Coordinate space an overview footprint is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoiSpace {
    /// Same model coordinates as the base footprint
    Model,
    /// Pixel coordinates of the overview raster itself
    Raster,
}

/// Footprint of one overview level (levels start at 1)
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewFootprint {
    pub level: usize,
    pub geometry: MultiPolygon<f64>,
    pub space: RoiSpace,
}

pub struct MultiLevelRoi {
    original: MultiPolygon<f64>,
    footprint: MultiPolygon<f64>,
    inset: f64,
    policy: FootprintInsetPolicy,
    overviews: Vec<OverviewFootprint>,
    roi_cache: SoftCache<(TransformKey, usize), Arc<MultiPolygon<f64>>>,
}

impl MultiLevelRoi {
    /// Build from a footprint, applying the inset against the granule extent
    pub fn new(
        original: MultiPolygon<f64>,
        granule_bounds: &Rect<f64>,
        inset: f64,
        policy: FootprintInsetPolicy,
    ) -> Self {
        let footprint = policy.apply(&original, granule_bounds, inset);
        Self {
            original,
            footprint,
            inset: inset.max(0.0),
            policy,
            overviews: Vec::new(),
            roi_cache: SoftCache::new("roi", ROI_CACHE_ENTRIES, Some(ROI_CACHE_TTL)),
        }
    }

    pub fn with_overviews(mut self, mut overviews: Vec<OverviewFootprint>) -> Self {
        overviews.sort_by_key(|o| o.level);
        self.overviews = overviews;
        self
    }

    /// Footprint as loaded
    pub fn original(&self) -> &MultiPolygon<f64> {
        &self.original
    }

    /// Footprint with the inset applied; equal to the original without inset
    pub fn footprint(&self) -> &MultiPolygon<f64> {
        &self.footprint
    }

    pub fn inset_footprint(&self) -> Option<&MultiPolygon<f64>> {
        (self.inset > 0.0).then_some(&self.footprint)
    }

    pub fn inset(&self) -> f64 {
        self.inset
    }

    pub fn policy(&self) -> FootprintInsetPolicy {
        self.policy
    }

    pub fn overviews(&self) -> &[OverviewFootprint] {
        &self.overviews
    }

    pub fn overview(&self, level: usize) -> Option<&OverviewFootprint> {
        self.overviews.iter().find(|o| o.level == level)
    }

    pub fn envelope(&self) -> Option<Envelope> {
        self.footprint.bounding_rect().map(Envelope::from)
    }

    pub fn is_empty(&self) -> bool {
        self.footprint.unsigned_area() <= 0.0
    }

    /// ROI of `level` in the pixel space of a read window
    ///
    /// `world_to_grid` maps model coordinates to the pixel grid of the level
    /// being read; `window` selects the read offset and subsampling. Levels
    /// without their own footprint fall back to the base footprint.
    pub fn transformed_roi(
        &self,
        world_to_grid: &AffineTransform<f64>,
        level: usize,
        window: &ReadWindow,
    ) -> FootprintResult<Arc<MultiPolygon<f64>>> {
        if !window.is_valid() {
            return Err(FootprintError::InvalidGeometry(format!(
                "invalid read window scale {}x{}",
                window.x_scale, window.y_scale
            )));
        }
        let alignment = window.alignment();
        let (source, source_level, transform) = match self.overview(level).filter(|_| level > 0) {
            Some(overview) if overview.space == RoiSpace::Raster => {
                (&overview.geometry, level, alignment)
            }
            Some(overview) => (&overview.geometry, level, chain(world_to_grid, &alignment)),
            None => (&self.footprint, 0, chain(world_to_grid, &alignment)),
        };

        let key = (TransformKey::of(&transform), source_level);
        self.roi_cache.get_or_try_insert_with(&key, || {
            let rasterized = source.affine_transform(&transform);
            Ok(Arc::new(rasterized.simplify(ROI_SIMPLIFY_TOLERANCE)))
        })
    }

    /// Drop cached rasterized ROIs
    pub fn release(&self) {
        self.roi_cache.release();
    }

    pub fn cached_rois(&self) -> usize {
        self.roi_cache.len()
    }
}

impl fmt::Debug for MultiLevelRoi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiLevelRoi")
            .field("envelope", &self.envelope())
            .field("inset", &self.inset)
            .field("policy", &self.policy)
            .field("overviews", &self.overviews.len())
            .finish()
    }
}
