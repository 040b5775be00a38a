// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Footprint providers
//!
//! A provider turns a granule into its [`MultiLevelRoi`]. Footprints come
//! from sidecar files, per-overview sidecars, a shared vector file, or an
//! injected raster-mask source. Every provider caches results in a soft
//! cache keyed by the granule location and extent, plus whatever else selects
//! the footprint. A granule without a footprint yields `None`,
//! unless the provider requires footprints, in which case it is an error.

use geo::{BooleanOps, Geometry, MultiPolygon};
use log::{debug, info};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::error::{FootprintError, FootprintResult};
use super::inset::FootprintInsetPolicy;
use super::loader::{decode_geojson_geometry, sidecar_base, LoaderRegistry, SidecarProbe};
use super::roi::{MultiLevelRoi, OverviewFootprint, RoiSpace};
use crate::cache::SoftCache;
use crate::filter::Filter;
use crate::geometry::{polygonal_parts, Envelope};
use crate::store::{AttributeKind, MemoryRecordStore, Record, RecordStore, Schema, StoreQuery, Value};

/// Highest overview level probed by the multi-sidecar provider
pub const MAX_OVERVIEW_LEVELS: usize = 64;

/// Record type holding the features of a vector footprint file
pub const FOOTPRINT_TYPE_NAME: &str = "footprints";
/// Geometry attribute of the footprint records
pub const FOOTPRINT_GEOMETRY_ATTRIBUTE: &str = "the_geom";

const FOOTPRINT_CACHE_ENTRIES: usize = 4096;
const FOOTPRINT_CACHE_TTL: Duration = Duration::from_secs(600);

/// The granule a footprint is requested for
#[derive(Debug, Clone, Copy)]
pub struct GranuleContext<'a> {
    pub record: &'a Record,
    /// Location as stored in the record
    pub location: &'a str,
    /// Location after path resolution
    pub resolved_location: &'a str,
    pub envelope: &'a Envelope,
}

pub trait MultiLevelRoiProvider: Send + Sync {
    /// Short name of the footprint source
    fn name(&self) -> &'static str;

    /// Footprint of a granule, `None` when it has none
    fn roi(&self, granule: &GranuleContext<'_>) -> FootprintResult<Option<Arc<MultiLevelRoi>>>;

    /// Footprint files owned by a granule, deleted with it on removal
    fn sidecar_files(&self, _granule: &GranuleContext<'_>) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Drop cached footprints
    fn release(&self) {}
}

/// Cache key of a granule's footprint
///
/// The extent frames the border inset, so a granule re-added at the same
/// location with new bounds gets a fresh entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RoiKey {
    location: String,
    frame: [u64; 4],
    selection: String,
}

impl RoiKey {
    fn new(granule: &GranuleContext<'_>, selection: String) -> Self {
        let env = granule.envelope;
        Self {
            location: granule.resolved_location.to_string(),
            frame: [env.min_x, env.min_y, env.max_x, env.max_y].map(f64::to_bits),
            selection,
        }
    }
}

/// Inset settings plus the footprint cache
struct RoiFactory {
    inset: f64,
    policy: FootprintInsetPolicy,
    required: bool,
    cache: SoftCache<RoiKey, Option<Arc<MultiLevelRoi>>>,
}

impl RoiFactory {
    fn new(inset: f64, policy: FootprintInsetPolicy) -> Self {
        Self {
            inset,
            policy,
            required: false,
            cache: SoftCache::new("footprint", FOOTPRINT_CACHE_ENTRIES, Some(FOOTPRINT_CACHE_TTL)),
        }
    }

    fn cached(
        &self,
        granule: &GranuleContext<'_>,
        load: impl FnOnce() -> FootprintResult<Option<MultiLevelRoi>>,
    ) -> FootprintResult<Option<Arc<MultiLevelRoi>>> {
        self.cached_with(RoiKey::new(granule, String::new()), load)
    }

    fn cached_with(
        &self,
        key: RoiKey,
        load: impl FnOnce() -> FootprintResult<Option<MultiLevelRoi>>,
    ) -> FootprintResult<Option<Arc<MultiLevelRoi>>> {
        self.cache
            .get_or_try_insert_with(&key, || Ok(load()?.map(Arc::new)))
    }

    /// Outcome for a granule that has no footprint
    fn missing(&self, granule: &GranuleContext<'_>, source: &str) -> FootprintResult<Option<MultiLevelRoi>> {
        if self.required {
            return Err(FootprintError::NotFound(granule.resolved_location.to_string()));
        }
        debug!("No footprint in {} for {}", source, granule.resolved_location);
        Ok(None)
    }

    fn build(&self, granule: &GranuleContext<'_>, footprint: MultiPolygon<f64>) -> MultiLevelRoi {
        MultiLevelRoi::new(footprint, &granule.envelope.to_rect(), self.inset, self.policy)
    }

    fn release(&self) {
        self.cache.release();
    }
}

fn polygonal(geometry: &Geometry<f64>, source: &str) -> FootprintResult<MultiPolygon<f64>> {
    let parts = polygonal_parts(geometry);
    if parts.0.is_empty() {
        return Err(FootprintError::InvalidGeometry(format!(
            "footprint {} has no polygonal part",
            source
        )));
    }
    Ok(parts)
}

/// Footprints read from a sidecar next to each granule
pub struct SidecarRoiProvider {
    probe: SidecarProbe,
    factory: RoiFactory,
}

impl SidecarRoiProvider {
    pub fn new(registry: LoaderRegistry, inset: f64, policy: FootprintInsetPolicy) -> Self {
        Self {
            probe: SidecarProbe::new(registry),
            factory: RoiFactory::new(inset, policy),
        }
    }
}

impl SidecarRoiProvider {
    /// Treat a granule without a sidecar as an error
    pub fn with_required(mut self, required: bool) -> Self {
        self.factory.required = required;
        self
    }
}

impl MultiLevelRoiProvider for SidecarRoiProvider {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    fn roi(&self, granule: &GranuleContext<'_>) -> FootprintResult<Option<Arc<MultiLevelRoi>>> {
        self.factory.cached(granule, || {
            let base = sidecar_base(granule.resolved_location);
            match self.probe.load(&base)? {
                Some(geometry) => {
                    let footprint = polygonal(&geometry, granule.resolved_location)?;
                    Ok(Some(self.factory.build(granule, footprint)))
                }
                None => self.factory.missing(granule, "sidecar"),
            }
        })
    }

    fn sidecar_files(&self, granule: &GranuleContext<'_>) -> Vec<PathBuf> {
        self.probe
            .existing_files(&sidecar_base(granule.resolved_location))
    }

    fn release(&self) {
        self.factory.release();
    }
}

/// Sidecar footprints plus one sidecar per overview level
///
/// Overview sidecars are named by appending the suffix format, with `%d`
/// replaced by the level, to the granule base name: `tile_1.wkt`,
/// `tile_2.wkt` and so on. Probing stops at the first missing level.
pub struct MultiSidecarRoiProvider {
    probe: SidecarProbe,
    factory: RoiFactory,
    suffix_format: String,
    space: RoiSpace,
}

impl MultiSidecarRoiProvider {
    pub fn new(
        registry: LoaderRegistry,
        inset: f64,
        policy: FootprintInsetPolicy,
        suffix_format: impl Into<String>,
        raster_space: bool,
    ) -> Self {
        Self {
            probe: SidecarProbe::new(registry),
            factory: RoiFactory::new(inset, policy),
            suffix_format: suffix_format.into(),
            space: if raster_space {
                RoiSpace::Raster
            } else {
                RoiSpace::Model
            },
        }
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.factory.required = required;
        self
    }

    fn overview_base(&self, base: &Path, level: usize) -> PathBuf {
        let mut name = OsString::from(base.as_os_str());
        name.push(self.suffix_format.replace("%d", &level.to_string()));
        PathBuf::from(name)
    }

    fn load_overviews(&self, base: &Path) -> FootprintResult<Vec<OverviewFootprint>> {
        let mut overviews = Vec::new();
        for level in 1..=MAX_OVERVIEW_LEVELS {
            let overview_base = self.overview_base(base, level);
            let Some(geometry) = self.probe.load(&overview_base)? else {
                break;
            };
            overviews.push(OverviewFootprint {
                level,
                geometry: polygonal(&geometry, &overview_base.to_string_lossy())?,
                space: self.space,
            });
        }
        Ok(overviews)
    }
}

impl MultiLevelRoiProvider for MultiSidecarRoiProvider {
    fn name(&self) -> &'static str {
        "multisidecar"
    }

    fn roi(&self, granule: &GranuleContext<'_>) -> FootprintResult<Option<Arc<MultiLevelRoi>>> {
        self.factory.cached(granule, || {
            let base = sidecar_base(granule.resolved_location);
            let Some(geometry) = self.probe.load(&base)? else {
                return self.factory.missing(granule, "sidecar");
            };
            let footprint = polygonal(&geometry, granule.resolved_location)?;
            let overviews = self.load_overviews(&base)?;
            debug!(
                "Loaded footprint for {} with {} overview levels",
                granule.resolved_location,
                overviews.len()
            );
            Ok(Some(self.factory.build(granule, footprint).with_overviews(overviews)))
        })
    }

    fn sidecar_files(&self, granule: &GranuleContext<'_>) -> Vec<PathBuf> {
        let base = sidecar_base(granule.resolved_location);
        let mut files = self.probe.existing_files(&base);
        for level in 1..=MAX_OVERVIEW_LEVELS {
            let level_files = self.probe.existing_files(&self.overview_base(&base, level));
            if level_files.is_empty() {
                break;
            }
            files.extend(level_files);
        }
        files
    }

    fn release(&self) {
        self.factory.release();
    }
}

fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map(Value::Double).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

/// Load the features of a GeoJSON FeatureCollection into `store`
fn load_feature_collection(path: &Path, store: &MemoryRecordStore) -> FootprintResult<usize> {
    let decode_error = |reason: String| FootprintError::Decode {
        path: path.to_path_buf(),
        format: "GeoJSON",
        reason,
    };
    let text = fs::read_to_string(path).map_err(FootprintError::io(path))?;
    let document: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| decode_error(e.to_string()))?;
    let features = document
        .get("features")
        .and_then(|f| f.as_array())
        .ok_or_else(|| decode_error("expected a FeatureCollection".to_string()))?;

    let mut kinds: BTreeMap<String, AttributeKind> = BTreeMap::new();
    let mut records = Vec::with_capacity(features.len());
    for (idx, feature) in features.iter().enumerate() {
        let geometry = feature
            .get("geometry")
            .filter(|g| !g.is_null())
            .ok_or_else(|| decode_error(format!("feature {} has no geometry", idx)))?;
        let geometry = decode_geojson_geometry(geometry)
            .map_err(|e| decode_error(format!("feature {}: {}", idx, e)))?;

        let mut record = Record::new().with(FOOTPRINT_GEOMETRY_ATTRIBUTE, geometry);
        if let Some(properties) = feature.get("properties").and_then(|p| p.as_object()) {
            for (name, raw) in properties {
                if name == FOOTPRINT_GEOMETRY_ATTRIBUTE {
                    continue;
                }
                let value = json_to_value(raw);
                if let Some(kind) = value.kind() {
                    kinds.entry(name.clone()).or_insert(kind);
                } else {
                    kinds.entry(name.clone()).or_insert(AttributeKind::String);
                }
                record.set(name.clone(), value);
            }
        }
        records.push(record);
    }

    let schema = kinds.into_iter().fold(
        Schema::new(FOOTPRINT_TYPE_NAME).with_geometry(FOOTPRINT_GEOMETRY_ATTRIBUTE),
        |schema, (name, kind)| schema.with_attribute(name, kind),
    );
    store.create_schema(schema)?;
    Ok(store.insert(FOOTPRINT_TYPE_NAME, records)?.len())
}

/// Footprints selected per granule from a shared vector file
///
/// The filter may reference granule attributes as `granule/<attr>`; they are
/// bound for each granule before the footprint store is queried. All matching
/// footprints are unioned.
pub struct VectorFileRoiProvider {
    path: PathBuf,
    store: MemoryRecordStore,
    filter: Filter,
    factory: RoiFactory,
}

impl VectorFileRoiProvider {
    pub const DEFAULT_FILTER: &'static str = "location = granule/location";

    pub fn open(
        path: impl Into<PathBuf>,
        filter: Filter,
        inset: f64,
        policy: FootprintInsetPolicy,
    ) -> FootprintResult<Self> {
        let path = path.into();
        let store = MemoryRecordStore::new();
        let loaded = load_feature_collection(&path, &store)?;
        info!("Loaded {} footprints from {}", loaded, path.display());
        Ok(Self {
            path,
            store,
            filter,
            factory: RoiFactory::new(inset, policy),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.factory.required = required;
        self
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    fn matching_footprint(&self, bound: Filter) -> FootprintResult<Option<MultiPolygon<f64>>> {
        let mut footprint: Option<MultiPolygon<f64>> = None;
        for record in self.store.query(FOOTPRINT_TYPE_NAME, &StoreQuery::new(bound))? {
            let record = record?;
            let Some(geometry) = record.geometry(FOOTPRINT_GEOMETRY_ATTRIBUTE) else {
                continue;
            };
            let parts = polygonal_parts(geometry);
            footprint = Some(match footprint {
                Some(acc) => acc.union(&parts),
                None => parts,
            });
        }
        Ok(footprint.filter(|f| !f.0.is_empty()))
    }
}

impl MultiLevelRoiProvider for VectorFileRoiProvider {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn roi(&self, granule: &GranuleContext<'_>) -> FootprintResult<Option<Arc<MultiLevelRoi>>> {
        // The bound filter depends on the granule's attributes
        let bound = self.filter.bind(granule.record);
        let key = RoiKey::new(granule, format!("{:?}", bound));
        self.factory.cached_with(key, || {
            match self.matching_footprint(bound)? {
                Some(footprint) => Ok(Some(self.factory.build(granule, footprint))),
                None => self.factory.missing(granule, &self.path.to_string_lossy()),
            }
        })
    }

    fn release(&self) {
        self.factory.release();
    }
}

/// Which raster band the mask source reads the footprint from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterMaskKind {
    /// The granule's own nodata / alpha
    Raster,
    /// A dedicated mask band or mask file
    Mask,
}

/// Source of footprints vectorized from raster masks
///
/// Raster decoding lives outside this crate; callers inject an implementation.
pub trait RasterMaskSource: Send + Sync {
    fn footprint(
        &self,
        resolved_location: &str,
        kind: RasterMaskKind,
    ) -> FootprintResult<Option<Geometry<f64>>>;
}

pub struct RasterMaskRoiProvider {
    source: Arc<dyn RasterMaskSource>,
    kind: RasterMaskKind,
    factory: RoiFactory,
}

impl RasterMaskRoiProvider {
    pub fn new(
        source: Arc<dyn RasterMaskSource>,
        kind: RasterMaskKind,
        inset: f64,
        policy: FootprintInsetPolicy,
    ) -> Self {
        Self {
            source,
            kind,
            factory: RoiFactory::new(inset, policy),
        }
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.factory.required = required;
        self
    }
}

impl MultiLevelRoiProvider for RasterMaskRoiProvider {
    fn name(&self) -> &'static str {
        match self.kind {
            RasterMaskKind::Raster => "raster",
            RasterMaskKind::Mask => "raster-mask",
        }
    }

    fn roi(&self, granule: &GranuleContext<'_>) -> FootprintResult<Option<Arc<MultiLevelRoi>>> {
        self.factory.cached(granule, || {
            match self.source.footprint(granule.resolved_location, self.kind)? {
                Some(geometry) => {
                    let footprint = polygonal(&geometry, granule.resolved_location)?;
                    Ok(Some(self.factory.build(granule, footprint)))
                }
                None => self.factory.missing(granule, self.name()),
            }
        })
    }

    fn release(&self) {
        self.factory.release();
    }
}

impl fmt::Debug for dyn MultiLevelRoiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MultiLevelRoiProvider({})", self.name())
    }
}
