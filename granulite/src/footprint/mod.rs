// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Footprint engine
//!
//! Loads granule footprints, applies insets, and produces per-level regions
//! of interest aligned to read windows.

pub mod config;
pub mod error;
pub mod inset;
pub mod loader;
pub mod properties;
pub mod provider;
pub mod roi;

pub use config::{load_provider, FootprintConfig, FootprintSource};
pub use error::{FootprintError, FootprintResult};
pub use inset::{apply_inset, FootprintInsetPolicy};
pub use loader::{
    FootprintLoader, GeoJsonFootprintLoader, LoaderRegistry, SidecarProbe, WkbFootprintLoader,
    WktFootprintLoader,
};
pub use properties::Properties;
pub use provider::{
    GranuleContext, MultiLevelRoiProvider, MultiSidecarRoiProvider, RasterMaskKind,
    RasterMaskRoiProvider, RasterMaskSource, SidecarRoiProvider, VectorFileRoiProvider,
};
pub use roi::{MultiLevelRoi, OverviewFootprint, RoiSpace, ROI_SIMPLIFY_TOLERANCE};
