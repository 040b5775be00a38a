// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Footprint error types

use std::path::PathBuf;
use thiserror::Error;

use crate::filter::FilterError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum FootprintError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decode {format} footprint {path}: {reason}")]
    Decode {
        path: PathBuf,
        format: &'static str,
        reason: String,
    },

    #[error("No footprint found for {0}")]
    NotFound(String),

    #[error("Invalid footprint geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid footprint configuration: {0}")]
    Config(String),

    #[error("Malformed properties at line {line}: {reason}")]
    Properties { line: usize, reason: String },

    #[error("Footprint filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Footprint store error: {0}")]
    Store(#[from] StoreError),

    #[error("Raster mask source failed: {0}")]
    RasterMask(String),
}

impl FootprintError {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> FootprintError {
        let path = path.into();
        move |source| FootprintError::Io { path, source }
    }
}

pub type FootprintResult<T> = Result<T, FootprintError>;
