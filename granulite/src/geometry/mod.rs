// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Geometry primitives shared by the catalog and footprint engine

pub mod envelope;
pub mod transform;

pub use envelope::Envelope;
pub use transform::{chain, world_to_grid, ReadWindow, TransformKey};

use geo::{Geometry, MultiPolygon};
use geozero::ToWkt;

/// WKT text of a geometry
pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    geometry
        .to_wkt()
        .unwrap_or_else(|_| "GEOMETRYCOLLECTION EMPTY".to_string())
}

/// Collect the polygonal parts of a geometry
///
/// Points, lines and empty collections contribute nothing.
pub fn polygonal_parts(geometry: &Geometry<f64>) -> MultiPolygon<f64> {
    let mut polygons = Vec::new();
    collect_polygons(geometry, &mut polygons);
    MultiPolygon::new(polygons)
}

fn collect_polygons(geometry: &Geometry<f64>, out: &mut Vec<geo::Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.iter() {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}
