// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Footprint inset policies
//!
//! An inset shrinks a footprint inward so that collars and resampling
//! artifacts along granule edges do not show in the mosaic. The result is
//! always a subset of the input and an inset of zero is the identity.

use geo::{Area, BooleanOps, Buffer, LineString, MultiLineString, MultiPolygon, Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Polygons smaller than this are slivers left over by boolean ops
const SLIVER_AREA: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FootprintInsetPolicy {
    /// Shrink every edge
    #[default]
    Full,
    /// Shrink only edges strictly inside the granule rectangle
    Border,
}

impl FromStr for FootprintInsetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(FootprintInsetPolicy::Full),
            "border" => Ok(FootprintInsetPolicy::Border),
            other => Err(format!(
                "Unknown footprint inset type: {}. Valid options: full, border",
                other
            )),
        }
    }
}

impl fmt::Display for FootprintInsetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FootprintInsetPolicy::Full => f.write_str("full"),
            FootprintInsetPolicy::Border => f.write_str("border"),
        }
    }
}

impl FootprintInsetPolicy {
    /// Shrink `footprint` by `inset` model units
    ///
    /// `granule_bounds` is the granule's rectangular extent; the border policy
    /// leaves footprint edges lying on it untouched.
    pub fn apply(
        &self,
        footprint: &MultiPolygon<f64>,
        granule_bounds: &Rect<f64>,
        inset: f64,
    ) -> MultiPolygon<f64> {
        if inset <= 0.0 || !inset.is_finite() || footprint.0.is_empty() {
            return footprint.clone();
        }
        let shrunk = match self {
            FootprintInsetPolicy::Full => full_inset(footprint, inset),
            FootprintInsetPolicy::Border => border_inset(footprint, granule_bounds, inset),
        };
        drop_slivers(shrunk)
    }
}

/// Convenience wrapper over [`FootprintInsetPolicy::apply`]
pub fn apply_inset(
    footprint: &MultiPolygon<f64>,
    granule_bounds: &Rect<f64>,
    inset: f64,
    policy: FootprintInsetPolicy,
) -> MultiPolygon<f64> {
    policy.apply(footprint, granule_bounds, inset)
}

fn full_inset(footprint: &MultiPolygon<f64>, inset: f64) -> MultiPolygon<f64> {
    let buffered = footprint.buffer(-inset);
    // Clip back to the input so rounding in the buffer never grows it
    buffered.intersection(footprint)
}

fn border_inset(footprint: &MultiPolygon<f64>, granule_bounds: &Rect<f64>, inset: f64) -> MultiPolygon<f64> {
    let tolerance = (inset * 1e-3).max(1e-9);
    let frame = MultiLineString::new(vec![granule_bounds.to_polygon().exterior().clone()]);
    let frame_band = frame.buffer(tolerance);

    let rings: Vec<LineString<f64>> = footprint
        .iter()
        .flat_map(|polygon| {
            std::iter::once(polygon.exterior().clone()).chain(polygon.interiors().iter().cloned())
        })
        .collect();
    let interior_edges = frame_band.clip(&MultiLineString::new(rings), true);
    if interior_edges.0.iter().all(|line| line.0.len() < 2) {
        return footprint.clone();
    }

    let eroded = interior_edges.buffer(inset);
    footprint.difference(&eroded)
}

fn drop_slivers(polygons: MultiPolygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(
        polygons
            .into_iter()
            .filter(|p: &Polygon<f64>| p.unsigned_area() > SLIVER_AREA)
            .collect(),
    )
}
