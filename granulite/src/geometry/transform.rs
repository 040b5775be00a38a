// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Affine transform helpers used when rasterizing footprints

use geo::AffineTransform;
use serde::{Deserialize, Serialize};

/// Apply `first`, then `then`
///
/// Coefficients follow the `[[a, b, xoff], [d, e, yoff]]` layout.
pub fn chain(first: &AffineTransform<f64>, then: &AffineTransform<f64>) -> AffineTransform<f64> {
    let a = then.a() * first.a() + then.b() * first.d();
    let b = then.a() * first.b() + then.b() * first.e();
    let xoff = then.a() * first.xoff() + then.b() * first.yoff() + then.xoff();
    let d = then.d() * first.a() + then.e() * first.d();
    let e = then.d() * first.b() + then.e() * first.e();
    let yoff = then.d() * first.xoff() + then.e() * first.yoff() + then.yoff();
    AffineTransform::new(a, b, xoff, d, e, yoff)
}

/// Build the world-to-grid transform for a raster whose upper-left corner sits
/// at `(origin_x, origin_y)` with the given pixel sizes (y axis pointing down)
pub fn world_to_grid(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> AffineTransform<f64> {
    AffineTransform::new(
        1.0 / pixel_width,
        0.0,
        -origin_x / pixel_width,
        0.0,
        -1.0 / pixel_height,
        origin_y / pixel_height,
    )
}

/// Hashable identity of an affine transform
///
/// Floats are compared bitwise; two transforms computed the same way map to
/// the same key, which is all the ROI cache needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformKey([u64; 6]);

impl TransformKey {
    pub fn of(transform: &AffineTransform<f64>) -> Self {
        let normalize = |v: f64| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
        Self([
            normalize(transform.a()),
            normalize(transform.b()),
            normalize(transform.xoff()),
            normalize(transform.d()),
            normalize(transform.e()),
            normalize(transform.yoff()),
        ])
    }
}

/// Pixel window being read from one raster level
///
/// `x_offset`/`y_offset` are the window origin in that level's pixel space;
/// `x_scale`/`y_scale` are the subsampling factors applied by the read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadWindow {
    pub x_offset: f64,
    pub y_offset: f64,
    pub x_scale: f64,
    pub y_scale: f64,
}

impl ReadWindow {
    pub fn new(x_offset: f64, y_offset: f64, x_scale: f64, y_scale: f64) -> Self {
        Self {
            x_offset,
            y_offset,
            x_scale,
            y_scale,
        }
    }

    /// Transform mapping level pixels into window pixels
    pub fn alignment(&self) -> AffineTransform<f64> {
        AffineTransform::new(
            1.0 / self.x_scale,
            0.0,
            -self.x_offset / self.x_scale,
            0.0,
            1.0 / self.y_scale,
            -self.y_offset / self.y_scale,
        )
    }

    pub fn is_valid(&self) -> bool {
        self.x_scale.is_finite()
            && self.y_scale.is_finite()
            && self.x_scale > 0.0
            && self.y_scale > 0.0
    }
}

impl Default for ReadWindow {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, AffineOps, Coord, Point};

    fn apply(t: &AffineTransform<f64>, c: Coord<f64>) -> Coord<f64> {
        Point::from(c).affine_transform(t).0
    }

    #[test]
    fn test_chain_applies_first_then_second() {
        let translate = AffineTransform::translate(10.0, 0.0);
        let scale = AffineTransform::new(2.0, 0.0, 0.0, 0.0, 2.0, 0.0);
        let combined = chain(&translate, &scale);
        let out = apply(&combined, coord! { x: 1.0, y: 1.0 });
        assert_eq!(out, coord! { x: 22.0, y: 2.0 });
    }

    #[test]
    fn test_world_to_grid_maps_corners() {
        let t = world_to_grid(100.0, 50.0, 0.5, 0.5);
        assert_eq!(apply(&t, coord! { x: 100.0, y: 50.0 }), coord! { x: 0.0, y: 0.0 });
        assert_eq!(apply(&t, coord! { x: 101.0, y: 49.0 }), coord! { x: 2.0, y: 2.0 });
    }

    #[test]
    fn test_window_alignment() {
        let window = ReadWindow::new(10.0, 20.0, 2.0, 2.0);
        let out = apply(&window.alignment(), coord! { x: 14.0, y: 30.0 });
        assert_eq!(out, coord! { x: 2.0, y: 5.0 });
        assert!(window.is_valid());
        assert!(!ReadWindow::new(0.0, 0.0, 0.0, 1.0).is_valid());
    }

    #[test]
    fn test_transform_key_equality() {
        let a = world_to_grid(0.0, 10.0, 1.0, 1.0);
        let b = world_to_grid(0.0, 10.0, 1.0, 1.0);
        let c = world_to_grid(0.0, 10.0, 2.0, 1.0);
        assert_eq!(TransformKey::of(&a), TransformKey::of(&b));
        assert_ne!(TransformKey::of(&a), TransformKey::of(&c));
    }
}
