// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Footprint sidecar loaders
//!
//! A sidecar is a small vector file sitting next to a granule and holding its
//! footprint. Loaders are tried in a fixed order (GeoJSON, WKB, WKT); the
//! registry is passed in at construction and may be pinned to one loader.

use geo::Geometry;
use geozero::geojson::GeoJson;
use geozero::wkb::Wkb;
use geozero::wkt::Wkt;
use geozero::ToGeo;
use log::debug;
use parking_lot::Mutex;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::{FootprintError, FootprintResult};

/// Decodes one sidecar format
pub trait FootprintLoader: Send + Sync {
    /// Name used by the `footprintLoader` setting
    fn name(&self) -> &'static str;

    /// File extension of the sidecar, without the dot
    fn extension(&self) -> &'static str;

    fn load(&self, path: &Path) -> FootprintResult<Geometry<f64>>;
}

fn decode_error(path: &Path, format: &'static str, reason: impl ToString) -> FootprintError {
    FootprintError::Decode {
        path: path.to_path_buf(),
        format,
        reason: reason.to_string(),
    }
}

/// Extract the geometry object of a GeoJSON document
///
/// Accepts a bare geometry, a feature, or a feature collection whose first
/// feature carries the geometry.
pub(crate) fn geojson_geometry(document: &serde_json::Value) -> Option<&serde_json::Value> {
    match document.get("type")?.as_str()? {
        "FeatureCollection" => document
            .get("features")?
            .as_array()?
            .iter()
            .find_map(|feature| feature.get("geometry").filter(|g| !g.is_null())),
        "Feature" => document.get("geometry").filter(|g| !g.is_null()),
        _ => Some(document),
    }
}

/// Decode a GeoJSON geometry object
pub(crate) fn decode_geojson_geometry(
    geometry: &serde_json::Value,
) -> Result<Geometry<f64>, String> {
    let text = serde_json::to_string(geometry).map_err(|e| e.to_string())?;
    GeoJson(text.as_str()).to_geo().map_err(|e| e.to_string())
}

#[derive(Debug, Default)]
pub struct GeoJsonFootprintLoader;

impl FootprintLoader for GeoJsonFootprintLoader {
    fn name(&self) -> &'static str {
        "geojson"
    }

    fn extension(&self) -> &'static str {
        "geojson"
    }

    fn load(&self, path: &Path) -> FootprintResult<Geometry<f64>> {
        let text = fs::read_to_string(path).map_err(FootprintError::io(path))?;
        let document: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| decode_error(path, "GeoJSON", e))?;
        let geometry = geojson_geometry(&document)
            .ok_or_else(|| decode_error(path, "GeoJSON", "no geometry in document"))?;
        decode_geojson_geometry(geometry).map_err(|e| decode_error(path, "GeoJSON", e))
    }
}

#[derive(Debug, Default)]
pub struct WkbFootprintLoader;

impl FootprintLoader for WkbFootprintLoader {
    fn name(&self) -> &'static str {
        "wkb"
    }

    fn extension(&self) -> &'static str {
        "wkb"
    }

    fn load(&self, path: &Path) -> FootprintResult<Geometry<f64>> {
        let bytes = fs::read(path).map_err(FootprintError::io(path))?;
        Wkb(bytes).to_geo().map_err(|e| decode_error(path, "WKB", e))
    }
}

#[derive(Debug, Default)]
pub struct WktFootprintLoader;

impl FootprintLoader for WktFootprintLoader {
    fn name(&self) -> &'static str {
        "wkt"
    }

    fn extension(&self) -> &'static str {
        "wkt"
    }

    fn load(&self, path: &Path) -> FootprintResult<Geometry<f64>> {
        let text = fs::read_to_string(path).map_err(FootprintError::io(path))?;
        Wkt(text.trim().to_string())
            .to_geo()
            .map_err(|e| decode_error(path, "WKT", e))
    }
}

/// Ordered set of sidecar loaders
#[derive(Clone)]
pub struct LoaderRegistry {
    loaders: Vec<Arc<dyn FootprintLoader>>,
}

impl LoaderRegistry {
    pub fn new(loaders: Vec<Arc<dyn FootprintLoader>>) -> Self {
        Self { loaders }
    }

    /// Look up a loader by its configured name
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn FootprintLoader>> {
        self.loaders
            .iter()
            .find(|l| l.name().eq_ignore_ascii_case(name.trim()))
            .cloned()
    }

    /// Registry restricted to the named loader
    pub fn pinned(&self, name: &str) -> FootprintResult<LoaderRegistry> {
        let loader = self.by_name(name).ok_or_else(|| {
            FootprintError::Config(format!(
                "unknown footprint loader '{}'; available: {}",
                name,
                self.names().join(", ")
            ))
        })?;
        Ok(LoaderRegistry::new(vec![loader]))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    pub fn loaders(&self) -> &[Arc<dyn FootprintLoader>] {
        &self.loaders
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(GeoJsonFootprintLoader),
            Arc::new(WkbFootprintLoader),
            Arc::new(WktFootprintLoader),
        ])
    }
}

/// `base` with `.ext` appended, keeping any dots already in the name
pub(crate) fn with_appended_extension(base: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Granule path with its extension stripped
pub(crate) fn sidecar_base(granule_path: &str) -> PathBuf {
    Path::new(granule_path).with_extension("")
}

/// Probes sidecars through a registry, remembering the last loader that worked
pub struct SidecarProbe {
    registry: LoaderRegistry,
    last_success: Mutex<Option<usize>>,
}

impl SidecarProbe {
    pub fn new(registry: LoaderRegistry) -> Self {
        Self {
            registry,
            last_success: Mutex::new(None),
        }
    }

    fn probe_order(&self) -> Vec<usize> {
        let first = *self.last_success.lock();
        let mut order: Vec<usize> = first.into_iter().collect();
        order.extend((0..self.registry.loaders.len()).filter(|i| Some(*i) != first));
        order
    }

    /// Load the sidecar for `base` (a path without extension)
    ///
    /// Returns `Ok(None)` when no sidecar exists; a sidecar that exists but
    /// cannot be decoded is an error.
    pub fn load(&self, base: &Path) -> FootprintResult<Option<Geometry<f64>>> {
        for idx in self.probe_order() {
            let loader = &self.registry.loaders[idx];
            let candidate = with_appended_extension(base, loader.extension());
            if !candidate.is_file() {
                continue;
            }
            let geometry = loader.load(&candidate)?;
            debug!("Loaded footprint {} with {} loader", candidate.display(), loader.name());
            *self.last_success.lock() = Some(idx);
            return Ok(Some(geometry));
        }
        Ok(None)
    }

    /// Existing sidecar files for `base`
    pub fn existing_files(&self, base: &Path) -> Vec<PathBuf> {
        self.registry
            .loaders
            .iter()
            .map(|l| with_appended_extension(base, l.extension()))
            .filter(|p| p.is_file())
            .collect()
    }

    pub fn last_loader(&self) -> Option<&'static str> {
        let idx = (*self.last_success.lock())?;
        self.registry.loaders.get(idx).map(|l| l.name())
    }
}
